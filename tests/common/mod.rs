//! Shared fixtures: a User/Post schema, binary record builders, and the
//! matching field extractors.
//!
//! Test records follow the wire contract the engine routes by — a 4-byte
//! word at [0..4) (standing in for the root offset), the 4-byte file
//! identifier at [4..8) — followed by a fixed scalar section and
//! length-prefixed strings:
//!
//! ```text
//! User: [root u32][\"USER\"][id i32][age i32][name: len u32, bytes][email: len u32, bytes][pad]
//! Post: [root u32][\"POST\"][id i32][user_id i32][title: len u32, bytes][pad]
//! ```
//!
//! The extractors read these layouts zero-copy, borrowing string slices
//! straight from the payload, exactly as a generated-code extractor would.

#![allow(dead_code)]

use flatsql::{Database, FieldExtractor, Value};
use zerocopy::little_endian::{I32, U32};
use zerocopy::FromBytes;

pub const SCHEMA: &str = r#"
    table User {
        id: int (id);
        name: string;
        email: string (key);
        age: int (key);
    }

    table Post {
        id: int (id);
        user_id: int (key);
        title: string;
    }

    file_identifier "USER";
    root_type User;
"#;

const SCALARS: usize = 8;

fn push_str(out: &mut Vec<u8>, text: &str) {
    out.extend_from_slice(&(text.len() as u32).to_le_bytes());
    out.extend_from_slice(text.as_bytes());
}

/// Bare User payload (no size prefix), optionally zero-padded to an exact
/// size.
pub fn user_record(id: i32, name: &str, email: &str, age: i32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&12u32.to_le_bytes());
    out.extend_from_slice(b"USER");
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&age.to_le_bytes());
    push_str(&mut out, name);
    push_str(&mut out, email);
    out
}

pub fn user_record_sized(id: i32, name: &str, email: &str, age: i32, size: usize) -> Vec<u8> {
    let mut out = user_record(id, name, email, age);
    assert!(out.len() <= size, "record does not fit in {} bytes", size);
    out.resize(size, 0);
    out
}

pub fn post_record(id: i32, user_id: i32, title: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&12u32.to_le_bytes());
    out.extend_from_slice(b"POST");
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&user_id.to_le_bytes());
    push_str(&mut out, title);
    out
}

/// Wraps a payload in the stream frame format.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = (payload.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(payload);
    out
}

fn read_i32(data: &[u8], offset: usize) -> Option<i32> {
    data.get(offset..offset + 4)
        .and_then(|b| I32::read_from_bytes(b).ok())
        .map(|v| v.get())
}

fn read_len_prefixed(data: &[u8], offset: usize) -> Option<(&str, usize)> {
    let len = data
        .get(offset..offset + 4)
        .and_then(|b| U32::read_from_bytes(b).ok())?
        .get() as usize;
    let bytes = data.get(offset + 4..offset + 4 + len)?;
    let text = std::str::from_utf8(bytes).ok()?;
    Some((text, offset + 4 + len))
}

pub struct UserExtractor;

impl FieldExtractor for UserExtractor {
    fn extract<'a>(&self, data: &'a [u8], column: &str) -> Value<'a> {
        let scalars = SCALARS;
        match column {
            "id" => read_i32(data, scalars).map_or(Value::Null, Value::Int32),
            "age" => read_i32(data, scalars + 4).map_or(Value::Null, Value::Int32),
            "name" => read_len_prefixed(data, scalars + 8)
                .map_or(Value::Null, |(s, _)| Value::Str(s.into())),
            "email" => read_len_prefixed(data, scalars + 8)
                .and_then(|(_, next)| read_len_prefixed(data, next))
                .map_or(Value::Null, |(s, _)| Value::Str(s.into())),
            _ => Value::Null,
        }
    }
}

pub struct PostExtractor;

impl FieldExtractor for PostExtractor {
    fn extract<'a>(&self, data: &'a [u8], column: &str) -> Value<'a> {
        match column {
            "id" => read_i32(data, SCALARS).map_or(Value::Null, Value::Int32),
            "user_id" => read_i32(data, SCALARS + 4).map_or(Value::Null, Value::Int32),
            "title" => read_len_prefixed(data, SCALARS + 8)
                .map_or(Value::Null, |(s, _)| Value::Str(s.into())),
            _ => Value::Null,
        }
    }
}

/// Database with both tables routed and extractors registered.
pub fn test_db() -> Database {
    let mut db = Database::from_schema(SCHEMA, "test").unwrap();
    db.register_file_id("POST", "Post").unwrap();
    db.set_field_extractor("User", Box::new(UserExtractor)).unwrap();
    db.set_field_extractor("Post", Box::new(PostExtractor)).unwrap();
    db
}
