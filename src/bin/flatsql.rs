//! # FlatSQL CLI Entry Point
//!
//! Pipe size-prefixed records into stdin, query them with SQL.
//!
//! ## Usage
//!
//! ```bash
//! cat data.bin | flatsql --schema app.fbs --map USER=User \
//!     --query 'SELECT COUNT(*) FROM User'
//! ```
//!
//! Stream format: `[4-byte size LE][payload][4-byte size LE][payload]...`
//! where payload bytes [4..8) carry the 4-byte file identifier used for
//! `--map` routing. stdin is read in 64 KiB chunks; a frame split across
//! chunks is carried over and completed by the next read. Progress goes to
//! stderr, query rows go to stdout as TAB-separated lines.

use eyre::{bail, Result, WrapErr};
use std::env;
use std::io::{IsTerminal, Read, Write};
use std::path::PathBuf;

use flatsql::Database;

const CHUNK_SIZE: usize = 64 * 1024;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

struct CliOptions {
    schema: PathBuf,
    mappings: Vec<(String, String)>,
    query: Option<String>,
    load: Option<PathBuf>,
    export: Option<PathBuf>,
    stats: bool,
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let options = match parse_args(&args)? {
        Some(options) => options,
        None => return Ok(()),
    };

    let schema_source = std::fs::read_to_string(&options.schema)
        .wrap_err_with(|| format!("cannot read schema file {:?}", options.schema))?;
    let mut db = Database::from_schema(&schema_source, "cli")?;

    for (file_id, table) in &options.mappings {
        db.register_file_id(file_id, table)
            .wrap_err_with(|| format!("cannot map {}={}", file_id, table))?;
    }

    if let Some(load_path) = &options.load {
        let blob = std::fs::read(load_path)
            .wrap_err_with(|| format!("cannot read load file {:?}", load_path))?;
        let report = db.load_and_rebuild(&blob)?;
        eprintln!(
            "Loaded {} records ({} bytes) from {:?}",
            report.records_processed, report.bytes_consumed, load_path
        );
    }

    ingest_stdin(&mut db)?;

    if options.stats {
        print_stats(&db);
    }

    if let Some(sql) = &options.query {
        let result = db.query(sql)?;
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{}", result.columns.join("\t"))?;
        for row in &result.rows {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(out, "{}", cells.join("\t"))?;
        }
    }

    if let Some(export_path) = &options.export {
        let blob = db.export_data();
        std::fs::write(export_path, &blob)
            .wrap_err_with(|| format!("cannot write export file {:?}", export_path))?;
        eprintln!("Exported {} bytes to {:?}", blob.len(), export_path);
    }

    Ok(())
}

fn parse_args(args: &[String]) -> Result<Option<CliOptions>> {
    let mut schema: Option<PathBuf> = None;
    let mut mappings = Vec::new();
    let mut query = None;
    let mut load = None;
    let mut export = None;
    let mut stats = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage(&args[0]);
                return Ok(None);
            }
            "--schema" => {
                i += 1;
                schema = Some(PathBuf::from(expect_value(args, i, "--schema")?));
            }
            "--map" => {
                i += 1;
                let mapping = expect_value(args, i, "--map")?;
                let Some((file_id, table)) = mapping.split_once('=') else {
                    bail!("--map expects FILEID=TABLE, got {:?}", mapping);
                };
                mappings.push((file_id.to_string(), table.to_string()));
            }
            "--query" => {
                i += 1;
                query = Some(expect_value(args, i, "--query")?.to_string());
            }
            "--load" => {
                i += 1;
                load = Some(PathBuf::from(expect_value(args, i, "--load")?));
            }
            "--export" => {
                i += 1;
                export = Some(PathBuf::from(expect_value(args, i, "--export")?));
            }
            "--stats" => {
                stats = true;
            }
            other => bail!("unknown option: {}", other),
        }
        i += 1;
    }

    let Some(schema) = schema else {
        eprintln!("Error: --schema is required\n");
        print_usage(&args[0]);
        bail!("missing --schema");
    };

    Ok(Some(CliOptions {
        schema,
        mappings,
        query,
        load,
        export,
        stats,
    }))
}

fn expect_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| eyre::eyre!("{} expects a value", flag))
}

/// Reads concatenated frames from stdin in chunks, carrying any trailing
/// partial frame across reads.
fn ingest_stdin(db: &mut Database) -> Result<()> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(());
    }

    let mut handle = stdin.lock();
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut pending: Vec<u8> = Vec::new();
    let mut total_records = 0usize;

    loop {
        let n = handle.read(&mut chunk).wrap_err("stdin read failed")?;
        if n == 0 {
            break;
        }
        pending.extend_from_slice(&chunk[..n]);
        let report = db.ingest(&pending)?;
        pending.drain(..report.bytes_consumed);
        if report.records_processed > 0 {
            total_records += report.records_processed;
            eprintln!("Ingested {} records", total_records);
        }
    }

    if !pending.is_empty() {
        eprintln!("Warning: {} trailing bytes do not form a complete frame", pending.len());
    }
    Ok(())
}

fn print_stats(db: &Database) {
    eprintln!("\nDatabase statistics:");
    for stat in db.stats() {
        let file_id = stat
            .file_id
            .map(|id| format!(" (file_id: {})", id))
            .unwrap_or_default();
        let indexes = if stat.indexes.is_empty() {
            String::new()
        } else {
            format!(", indexes: {}", stat.indexes.join(", "))
        };
        eprintln!(
            "  Table: {}{} - {} records{}",
            stat.table_name, file_id, stat.record_count, indexes
        );
    }
}

fn print_usage(prog: &str) {
    eprintln!("Usage: {} [options]", prog);
    eprintln!();
    eprintln!("Streaming record SQL engine - pipe size-prefixed records to stdin");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --schema <file>     Schema file (IDL format, required)");
    eprintln!("  --map <id>=<table>  Map a 4-byte file identifier to a table (repeatable)");
    eprintln!("  --query <sql>       SQL query to run after ingesting");
    eprintln!("  --load <file>       Load an exported storage file before stdin");
    eprintln!("  --export <file>     Export storage to a file after ingesting");
    eprintln!("  --stats             Print statistics after ingesting");
    eprintln!("  --help              Show this help");
    eprintln!();
    eprintln!("Example:");
    eprintln!(
        "  cat data.bin | {} --schema app.fbs --map USER=User --query 'SELECT COUNT(*) FROM User'",
        prog
    );
}
