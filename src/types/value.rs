//! The decoded RESP3 value and the small conversion trait used to turn it
//! into caller-facing Rust types.

use crate::error::{Error, ErrorKind};
use bytes::Bytes;
use std::{collections::HashMap, convert::TryFrom};

/// A Redis key. Newtype over [`Bytes`] so cluster hashing and cache-key
/// composition can stay byte-oriented without forcing UTF-8 everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(pub Bytes);

impl Key {
  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }

  /// The hash-tagged portion of the key used for cluster slot routing
  /// (spec §4.5.3): the substring between the first `{` and the next
  /// non-empty `}`, or the whole key if no tag is present.
  pub fn hash_tag(&self) -> &[u8] {
    let bytes = self.as_bytes();
    if let Some(open) = bytes.iter().position(|&b| b == b'{') {
      if let Some(close_rel) = bytes[open + 1 ..].iter().position(|&b| b == b'}') {
        if close_rel > 0 {
          return &bytes[open + 1 .. open + 1 + close_rel];
        }
      }
    }
    bytes
  }
}

impl From<&str> for Key {
  fn from(value: &str) -> Self {
    Key(Bytes::copy_from_slice(value.as_bytes()))
  }
}

impl From<String> for Key {
  fn from(value: String) -> Self {
    Key(Bytes::from(value.into_bytes()))
  }
}

impl From<Bytes> for Key {
  fn from(value: Bytes) -> Self {
    Key(value)
  }
}

impl std::fmt::Display for Key {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", String::from_utf8_lossy(&self.0))
  }
}

/// A RESP3 verbatim-string format tag (`txt` or `mkd`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbatimFormat {
  Text,
  Markdown,
}

/// A fully decoded RESP3 value (spec §3, §4.1).
///
/// `Null` is a distinct variant from an empty `BlobString`/`Array` — the
/// codec never collapses them, matching the wire format's own distinction
/// between `$-1\r\n`/`*-1\r\n` and `$0\r\n\r\n`/`*0\r\n`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  /// `+` simple string.
  SimpleString(String),
  /// `-` simple error: kind token plus message, already split.
  SimpleError(String, String),
  /// `:` signed 64-bit integer.
  Integer(i64),
  /// `$` bulk string. Opaque bytes — not required to be UTF-8.
  BlobString(Bytes),
  /// `*` array. `None` represents a null array (`*-1\r\n`), distinct from `Some(vec![])`.
  Array(Option<Vec<Value>>),
  /// `%` map: ordered key/value pairs.
  Map(Vec<(Value, Value)>),
  /// `~` set: unordered in principle, preserved in wire order.
  Set(Vec<Value>),
  /// `,` double. Carries `inf`/`-inf`/`nan` as the corresponding `f64` values.
  Double(f64),
  /// `#` boolean.
  Boolean(bool),
  /// `(` big integer, kept as its decimal ASCII representation.
  BigNumber(String),
  /// `=` verbatim string with its 3-byte format tag.
  Verbatim(VerbatimFormat, String),
  /// `_` null.
  Null,
  /// `>` push message. Never returned to a command caller — consumed by the
  /// connection's push queue (spec §4.1) and only constructed internally.
  Push(Vec<Value>),
}

impl Value {
  pub fn is_null(&self) -> bool {
    matches!(self, Value::Null | Value::Array(None))
  }

  /// True if this is a server error reply.
  pub fn is_error(&self) -> bool {
    matches!(self, Value::SimpleError(_, _))
  }

  /// Convert a `SimpleError` into a typed [`Error`], or `None` if this isn't one.
  pub fn as_error(&self) -> Option<Error> {
    match self {
      Value::SimpleError(kind, message) => {
        if message.is_empty() {
          Some(Error::from_server_error(kind.clone()))
        } else {
          Some(Error::from_server_error(format!("{} {}", kind, message)))
        }
      },
      _ => None,
    }
  }

  /// The push message name (first array element), if this is a push frame.
  pub fn push_kind(&self) -> Option<&str> {
    match self {
      Value::Push(items) => match items.first() {
        Some(Value::SimpleString(s)) => Some(s.as_str()),
        _ => None,
      },
      _ => None,
    }
  }

  pub fn into_array(self) -> Option<Vec<Value>> {
    match self {
      Value::Array(inner) => inner,
      Value::Set(items) => Some(items),
      Value::Push(items) => Some(items),
      _ => None,
    }
  }

  pub fn as_bytes(&self) -> Option<&[u8]> {
    match self {
      Value::BlobString(b) => Some(b),
      Value::SimpleString(s) => Some(s.as_bytes()),
      Value::Verbatim(_, s) => Some(s.as_bytes()),
      _ => None,
    }
  }

  pub fn as_i64(&self) -> Option<i64> {
    match self {
      Value::Integer(i) => Some(*i),
      Value::SimpleString(s) => s.parse().ok(),
      Value::BlobString(b) => std::str::from_utf8(b).ok().and_then(|s| s.parse().ok()),
      _ => None,
    }
  }

  pub fn as_f64(&self) -> Option<f64> {
    match self {
      Value::Double(d) => Some(*d),
      Value::Integer(i) => Some(*i as f64),
      Value::BlobString(b) => std::str::from_utf8(b).ok().and_then(|s| s.parse().ok()),
      Value::SimpleString(s) => s.parse().ok(),
      _ => None,
    }
  }
}

/// Conversion from a decoded [`Value`] into a caller-facing type. Mirrors
/// the teacher's `FromValue`/`FromRedisValue`-shaped conversion layer that
/// backs its per-command wrapper return types.
pub trait FromValue: Sized {
  fn from_value(value: Value) -> Result<Self, Error>;
}

fn parse_err(expected: &'static str) -> Error {
  Error::new(ErrorKind::Parse, format!("expected {expected}"))
}

impl FromValue for Value {
  fn from_value(value: Value) -> Result<Self, Error> {
    Ok(value)
  }
}

impl FromValue for () {
  fn from_value(value: Value) -> Result<Self, Error> {
    if let Some(err) = value.as_error() {
      Err(err)
    } else {
      Ok(())
    }
  }
}

impl FromValue for i64 {
  fn from_value(value: Value) -> Result<Self, Error> {
    if let Some(err) = value.as_error() {
      return Err(err);
    }
    value.as_i64().ok_or_else(|| parse_err("integer"))
  }
}

impl FromValue for f64 {
  fn from_value(value: Value) -> Result<Self, Error> {
    if let Some(err) = value.as_error() {
      return Err(err);
    }
    value.as_f64().ok_or_else(|| parse_err("double"))
  }
}

impl FromValue for bool {
  fn from_value(value: Value) -> Result<Self, Error> {
    match value {
      Value::Boolean(b) => Ok(b),
      Value::Integer(i) => Ok(i != 0),
      Value::SimpleString(s) => Ok(s == "OK" || s == "1"),
      other => {
        if let Some(err) = other.as_error() {
          Err(err)
        } else {
          Err(parse_err("boolean"))
        }
      },
    }
  }
}

impl FromValue for String {
  fn from_value(value: Value) -> Result<Self, Error> {
    if let Some(err) = value.as_error() {
      return Err(err);
    }
    match value {
      Value::BigNumber(s) | Value::Verbatim(_, s) | Value::SimpleString(s) => Ok(s),
      Value::BlobString(b) => String::from_utf8(b.to_vec()).map_err(|_| parse_err("utf8 string")),
      Value::Integer(i) => Ok(i.to_string()),
      Value::Double(d) => Ok(d.to_string()),
      _ => Err(parse_err("string")),
    }
  }
}

impl FromValue for Bytes {
  fn from_value(value: Value) -> Result<Self, Error> {
    if let Some(err) = value.as_error() {
      return Err(err);
    }
    match value {
      Value::BlobString(b) => Ok(b),
      Value::SimpleString(s) | Value::BigNumber(s) | Value::Verbatim(_, s) => Ok(Bytes::from(s.into_bytes())),
      _ => Err(parse_err("bytes")),
    }
  }
}

impl<T: FromValue> FromValue for Option<T> {
  fn from_value(value: Value) -> Result<Self, Error> {
    match value {
      Value::Null | Value::Array(None) => Ok(None),
      other => T::from_value(other).map(Some),
    }
  }
}

impl<T: FromValue> FromValue for Vec<T> {
  fn from_value(value: Value) -> Result<Self, Error> {
    if let Some(err) = value.as_error() {
      return Err(err);
    }
    let items = value.into_array().ok_or_else(|| parse_err("array"))?;
    items.into_iter().map(T::from_value).collect()
  }
}

impl<K, V> FromValue for HashMap<K, V>
where
  K: FromValue + std::hash::Hash + Eq,
  V: FromValue,
{
  fn from_value(value: Value) -> Result<Self, Error> {
    if let Some(err) = value.as_error() {
      return Err(err);
    }
    match value {
      Value::Map(pairs) => pairs
        .into_iter()
        .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
        .collect(),
      Value::Array(Some(items)) => {
        let mut out = HashMap::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
          out.insert(K::from_value(k)?, V::from_value(v)?);
        }
        Ok(out)
      },
      _ => Err(parse_err("map")),
    }
  }
}

impl TryFrom<Value> for Key {
  type Error = Error;

  fn try_from(value: Value) -> Result<Self, Self::Error> {
    Bytes::from_value(value).map(Key)
  }
}
