//! # Runtime Value Representation
//!
//! `Value<'a>` is the tagged cell value flowing between field extractors,
//! indexes, predicates, and query results. String and byte variants use
//! `Cow` so extractors can hand out slices borrowed straight from the log
//! buffer; `to_owned` promotes a cell to `'static` when it has to outlive
//! the borrow (index keys, query results).
//!
//! ## Comparison Semantics
//!
//! `compare_values` defines one total order shared by every index and every
//! predicate:
//!
//! 1. Null sorts before every non-null; two nulls are equal.
//! 2. Two integer variants compare as signed 64-bit. Unsigned 64-bit values
//!    above `i64::MAX` wrap.
//! 3. Any other numeric pair (mixed int/float) compares as `f64`.
//! 4. Strings compare lexicographically over their UTF-8 bytes.
//! 5. Byte blobs compare lexicographically, then by length.
//! 6. `false < true`.
//! 7. Unrelated tag pairs order by tag index, keeping the order total.

use std::borrow::Cow;
use std::cmp::Ordering;

/// Declared type of a column or index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    Bytes,
}

impl ValueType {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ValueType::Int8
                | ValueType::Int16
                | ValueType::Int32
                | ValueType::Int64
                | ValueType::UInt8
                | ValueType::UInt16
                | ValueType::UInt32
                | ValueType::UInt64
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, ValueType::Float32 | ValueType::Float64)
    }
}

/// Runtime cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Str(Cow<'a, str>),
    Bytes(Cow<'a, [u8]>),
}

impl<'a> Value<'a> {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int8(_) => ValueType::Int8,
            Value::Int16(_) => ValueType::Int16,
            Value::Int32(_) => ValueType::Int32,
            Value::Int64(_) => ValueType::Int64,
            Value::UInt8(_) => ValueType::UInt8,
            Value::UInt16(_) => ValueType::UInt16,
            Value::UInt32(_) => ValueType::UInt32,
            Value::UInt64(_) => ValueType::UInt64,
            Value::Float32(_) => ValueType::Float32,
            Value::Float64(_) => ValueType::Float64,
            Value::Str(_) => ValueType::String,
            Value::Bytes(_) => ValueType::Bytes,
        }
    }

    /// Tag index used as the last-resort ordering between unrelated variants.
    fn tag(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int8(_) => 2,
            Value::Int16(_) => 3,
            Value::Int32(_) => 4,
            Value::Int64(_) => 5,
            Value::UInt8(_) => 6,
            Value::UInt16(_) => 7,
            Value::UInt32(_) => 8,
            Value::UInt64(_) => 9,
            Value::Float32(_) => 10,
            Value::Float64(_) => 11,
            Value::Str(_) => 12,
            Value::Bytes(_) => 13,
        }
    }

    /// Clones this value to a fully-owned static lifetime.
    pub fn to_owned_static(&self) -> Value<'static> {
        match self {
            Value::Null => Value::Null,
            Value::Bool(b) => Value::Bool(*b),
            Value::Int8(i) => Value::Int8(*i),
            Value::Int16(i) => Value::Int16(*i),
            Value::Int32(i) => Value::Int32(*i),
            Value::Int64(i) => Value::Int64(*i),
            Value::UInt8(i) => Value::UInt8(*i),
            Value::UInt16(i) => Value::UInt16(*i),
            Value::UInt32(i) => Value::UInt32(*i),
            Value::UInt64(i) => Value::UInt64(*i),
            Value::Float32(f) => Value::Float32(*f),
            Value::Float64(f) => Value::Float64(*f),
            Value::Str(s) => Value::Str(Cow::Owned(s.to_string())),
            Value::Bytes(b) => Value::Bytes(Cow::Owned(b.to_vec())),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Int8(i) => write!(f, "{}", i),
            Value::Int16(i) => write!(f, "{}", i),
            Value::Int32(i) => write!(f, "{}", i),
            Value::Int64(i) => write!(f, "{}", i),
            Value::UInt8(i) => write!(f, "{}", i),
            Value::UInt16(i) => write!(f, "{}", i),
            Value::UInt32(i) => write!(f, "{}", i),
            Value::UInt64(i) => write!(f, "{}", i),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "[{} bytes]", b.len()),
        }
    }
}

/// Widens any integer variant to i64. Variants are checked most-common-first;
/// Int32 dominates because it is the default scalar width in the wire format.
#[inline]
pub fn try_int64(v: &Value) -> Option<i64> {
    match v {
        Value::Int32(i) => Some(*i as i64),
        Value::Int64(i) => Some(*i),
        Value::UInt32(i) => Some(*i as i64),
        Value::UInt64(i) => Some(*i as i64),
        Value::Int16(i) => Some(*i as i64),
        Value::UInt16(i) => Some(*i as i64),
        Value::Int8(i) => Some(*i as i64),
        Value::UInt8(i) => Some(*i as i64),
        _ => None,
    }
}

/// Widens any numeric variant (integer or float) to f64.
#[inline]
pub fn try_float64(v: &Value) -> Option<f64> {
    match v {
        Value::Float64(f) => Some(*f),
        Value::Float32(f) => Some(*f as f64),
        _ => try_int64(v).map(|i| i as f64),
    }
}

/// Total order over cell values with cross-type numeric coercion.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }

    if let (Some(x), Some(y)) = (try_int64(a), try_int64(b)) {
        return x.cmp(&y);
    }

    if let (Some(x), Some(y)) = (try_float64(a), try_float64(b)) {
        // NaN is unordered; treating it as equal keeps the order total.
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }

    match (a, b) {
        (Value::Str(x), Value::Str(y)) => x.as_bytes().cmp(y.as_bytes()),
        (Value::Bytes(x), Value::Bytes(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.tag().cmp(&b.tag()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sorts_before_every_non_null() {
        let values = [
            Value::Bool(false),
            Value::Int32(i32::MIN),
            Value::Float64(f64::NEG_INFINITY),
            Value::Str(Cow::Borrowed("")),
            Value::Bytes(Cow::Borrowed(&[][..])),
        ];
        for v in &values {
            assert_eq!(compare_values(&Value::Null, v), Ordering::Less);
            assert_eq!(compare_values(v, &Value::Null), Ordering::Greater);
        }
        assert_eq!(compare_values(&Value::Null, &Value::Null), Ordering::Equal);
    }

    #[test]
    fn mixed_width_integers_compare_as_signed_64() {
        assert_eq!(
            compare_values(&Value::Int8(-1), &Value::Int64(0)),
            Ordering::Less
        );
        assert_eq!(
            compare_values(&Value::UInt16(300), &Value::Int32(300)),
            Ordering::Equal
        );
        assert_eq!(
            compare_values(&Value::UInt32(4_000_000_000), &Value::Int64(5)),
            Ordering::Greater
        );
    }

    #[test]
    fn mixed_int_float_compares_as_double() {
        assert_eq!(
            compare_values(&Value::Int32(2), &Value::Float64(2.5)),
            Ordering::Less
        );
        assert_eq!(
            compare_values(&Value::Float32(3.0), &Value::Int64(3)),
            Ordering::Equal
        );
    }

    #[test]
    fn strings_compare_over_utf8_bytes() {
        let a = Value::Str(Cow::Borrowed("apple"));
        let b = Value::Str(Cow::Borrowed("banana"));
        assert_eq!(compare_values(&a, &b), Ordering::Less);

        let e1 = Value::Str(Cow::Borrowed("café"));
        let e2 = Value::Str(Cow::Borrowed("cafz"));
        // 'é' encodes as 0xC3 0xA9, above any ASCII byte
        assert_eq!(compare_values(&e1, &e2), Ordering::Greater);
    }

    #[test]
    fn bytes_compare_lexicographically_then_by_length() {
        let short = Value::Bytes(Cow::Borrowed(&[1u8, 2][..]));
        let long = Value::Bytes(Cow::Borrowed(&[1u8, 2, 0][..]));
        assert_eq!(compare_values(&short, &long), Ordering::Less);
    }

    #[test]
    fn unrelated_tags_order_by_tag_index() {
        let s = Value::Str(Cow::Borrowed("x"));
        let b = Value::Bytes(Cow::Borrowed(&b"x"[..]));
        assert_eq!(compare_values(&s, &b), Ordering::Less);
        assert_eq!(compare_values(&b, &s), Ordering::Greater);

        let i = Value::Int32(7);
        assert_eq!(compare_values(&i, &s), Ordering::Less);
    }

    #[test]
    fn unsigned_64_beyond_signed_range_wraps() {
        let big = Value::UInt64(u64::MAX);
        let neg = Value::Int64(-1);
        // u64::MAX reinterpreted as i64 is -1
        assert_eq!(compare_values(&big, &neg), Ordering::Equal);
    }
}
