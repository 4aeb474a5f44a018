//! RESP3 encoder and decoder (spec §4.1).
//!
//! The decoder is a `tokio_util::codec::Decoder` built directly against the
//! wire grammar: it must tolerate partial reads (returning `Ok(None)` until
//! a full frame is buffered), never read past a length-framed payload's
//! declared end, and treat `\r` occurring *inside* a bulk string's payload
//! as ordinary data rather than a line terminator. Nested aggregates
//! (array/map/set/push) recurse through the same entry point.

use crate::{
  error::{Error, ErrorKind},
  protocol::command::Command,
  types::{VerbatimFormat, Value},
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Suggested read-chunk size (spec §4.1 "Buffered reader").
pub const READ_CHUNK_BYTES: usize = 16 * 1024;

/// Encodes one or more [`Command`]s into the wire's array-of-bulk-strings
/// form. A pipeline calls `encode` once per queued command against the same
/// buffer so the whole batch goes out in a single write (spec §4.2, §4.3).
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandEncoder;

impl Encoder<&Command> for CommandEncoder {
  type Error = Error;

  fn encode(&mut self, command: &Command, dst: &mut BytesMut) -> Result<(), Error> {
    dst.reserve(command.encoded_len());
    dst.put_slice(b"*");
    write_usize(dst, command.args.len() + 1);
    dst.put_slice(b"\r\n");
    write_bulk(dst, command.name.as_bytes());
    for arg in &command.args {
      match arg {
        crate::protocol::command::Argument::Bytes(b) => write_bulk(dst, b),
        crate::protocol::command::Argument::Integer(i) => write_bulk(dst, i.to_string().as_bytes()),
      }
    }
    Ok(())
  }
}

fn write_usize(dst: &mut BytesMut, value: usize) {
  let mut buf = itoa_buf();
  let s = format_usize(value, &mut buf);
  dst.put_slice(s);
}

fn itoa_buf() -> [u8; 20] {
  [0u8; 20]
}

fn format_usize(mut value: usize, buf: &mut [u8; 20]) -> &[u8] {
  if value == 0 {
    buf[19] = b'0';
    return &buf[19 ..];
  }
  let mut i = 20;
  while value > 0 {
    i -= 1;
    buf[i] = b'0' + (value % 10) as u8;
    value /= 10;
  }
  &buf[i ..]
}

fn write_bulk(dst: &mut BytesMut, payload: &[u8]) {
  dst.put_slice(b"$");
  write_usize(dst, payload.len());
  dst.put_slice(b"\r\n");
  dst.put_slice(payload);
  dst.put_slice(b"\r\n");
}

/// Decodes one complete RESP3 value per `decode()` call, per the type-byte
/// dispatch table in spec §4.1.
#[derive(Debug, Default, Clone, Copy)]
pub struct Resp3Decoder;

/// Search `buf[start..]` for `\r\n`, returning the index of `\r`.
fn find_crlf(buf: &[u8], start: usize) -> Option<usize> {
  let mut i = start;
  while i + 1 < buf.len() {
    if buf[i] == b'\r' && buf[i + 1] == b'\n' {
      return Some(i);
    }
    i += 1;
  }
  None
}

/// Parse an ASCII signed decimal line without an intermediate `String`
/// allocation (spec §4.1 "scan for ASCII signed integers").
fn parse_i64(line: &[u8]) -> Result<i64, Error> {
  if line.is_empty() {
    return Err(Error::protocol("empty integer line"));
  }
  let (neg, digits) = if line[0] == b'-' {
    (true, &line[1 ..])
  } else {
    (false, line)
  };
  if digits.is_empty() {
    return Err(Error::protocol("malformed integer line"));
  }
  let mut value: i64 = 0;
  for &b in digits {
    if !b.is_ascii_digit() {
      return Err(Error::protocol("non-digit in integer line"));
    }
    value = value
      .checked_mul(10)
      .and_then(|v| v.checked_add((b - b'0') as i64))
      .ok_or_else(|| Error::protocol("integer overflow"))?;
  }
  Ok(if neg { -value } else { value })
}

fn parse_f64(line: &[u8]) -> Result<f64, Error> {
  let s = std::str::from_utf8(line).map_err(|_| Error::protocol("non-utf8 double"))?;
  match s {
    "inf" | "+inf" => Ok(f64::INFINITY),
    "-inf" => Ok(f64::NEG_INFINITY),
    "nan" => Ok(f64::NAN),
    other => other.parse().map_err(|_| Error::protocol("malformed double")),
  }
}

/// Attempt to decode exactly one value starting at `buf[0]`. Returns
/// `Ok(None)` if the buffer doesn't yet contain a complete frame, in which
/// case no bytes are consumed. Recursion depth is bounded by `depth` to
/// reject pathological nesting from a misbehaving peer.
fn decode_value(buf: &mut BytesMut, depth: u32) -> Result<Option<Value>, Error> {
  if depth > 128 {
    return Err(Error::protocol("exceeded maximum nesting depth"));
  }
  if buf.is_empty() {
    return Ok(None);
  }
  let type_byte = buf[0];
  let line_end = match find_crlf(buf, 1) {
    Some(idx) => idx,
    None => return Ok(None),
  };

  match type_byte {
    b'+' => {
      let s = String::from_utf8_lossy(&buf[1 .. line_end]).into_owned();
      buf.advance(line_end + 2);
      Ok(Some(Value::SimpleString(s)))
    },
    b'-' => {
      let raw = String::from_utf8_lossy(&buf[1 .. line_end]).into_owned();
      buf.advance(line_end + 2);
      let mut parts = raw.splitn(2, ' ');
      let kind = parts.next().unwrap_or("").to_string();
      let message = parts.next().unwrap_or("").to_string();
      Ok(Some(Value::SimpleError(kind, message)))
    },
    b':' => {
      let n = parse_i64(&buf[1 .. line_end])?;
      buf.advance(line_end + 2);
      Ok(Some(Value::Integer(n)))
    },
    b'#' => {
      let val = match &buf[1 .. line_end] {
        b"t" => true,
        b"f" => false,
        _ => return Err(Error::protocol("malformed boolean")),
      };
      buf.advance(line_end + 2);
      Ok(Some(Value::Boolean(val)))
    },
    b',' => {
      let n = parse_f64(&buf[1 .. line_end])?;
      buf.advance(line_end + 2);
      Ok(Some(Value::Double(n)))
    },
    b'(' => {
      let s = String::from_utf8_lossy(&buf[1 .. line_end]).into_owned();
      buf.advance(line_end + 2);
      Ok(Some(Value::BigNumber(s)))
    },
    b'_' => {
      buf.advance(line_end + 2);
      Ok(Some(Value::Null))
    },
    b'$' | b'=' => decode_blob(buf, line_end, type_byte == b'='),
    b'*' => decode_aggregate(buf, line_end, depth, AggregateShape::Array),
    b'%' => decode_aggregate(buf, line_end, depth, AggregateShape::Map),
    b'~' => decode_aggregate(buf, line_end, depth, AggregateShape::Set),
    b'>' => decode_aggregate(buf, line_end, depth, AggregateShape::Push),
    other => Err(Error::protocol(format!("unknown RESP3 type byte: {}", other as char))),
  }
}

fn decode_blob(buf: &mut BytesMut, line_end: usize, verbatim: bool) -> Result<Option<Value>, Error> {
  let len = parse_i64(&buf[1 .. line_end])?;
  if len < 0 {
    // `$-1\r\n`: a null bulk string, distinct from an empty one.
    buf.advance(line_end + 2);
    return Ok(Some(Value::Null));
  }
  let len = len as usize;
  let payload_start = line_end + 2;
  let needed = payload_start + len + 2;
  if buf.len() < needed {
    return Ok(None);
  }
  let payload = Bytes::copy_from_slice(&buf[payload_start .. payload_start + len]);
  if &buf[payload_start + len .. needed] != b"\r\n" {
    return Err(Error::protocol("bulk string missing trailing CRLF"));
  }
  buf.advance(needed);

  if verbatim {
    if payload.len() < 4 || payload[3] != b':' {
      return Err(Error::protocol("malformed verbatim string header"));
    }
    let format = match &payload[0 .. 3] {
      b"txt" => VerbatimFormat::Text,
      b"mkd" => VerbatimFormat::Markdown,
      _ => return Err(Error::protocol("unknown verbatim string format")),
    };
    let text = String::from_utf8_lossy(&payload[4 ..]).into_owned();
    Ok(Some(Value::Verbatim(format, text)))
  } else {
    Ok(Some(Value::BlobString(payload)))
  }
}

enum AggregateShape {
  Array,
  Map,
  Set,
  Push,
}

fn decode_aggregate(
  buf: &mut BytesMut,
  line_end: usize,
  depth: u32,
  shape: AggregateShape,
) -> Result<Option<Value>, Error> {
  let count = parse_i64(&buf[1 .. line_end])?;
  if count < 0 {
    // `*-1\r\n`: null array. Only arrays carry a null variant on the wire.
    buf.advance(line_end + 2);
    return Ok(Some(Value::Array(None)));
  }
  let header_len = line_end + 2;
  let elements = match shape {
    AggregateShape::Map => count as usize * 2,
    _ => count as usize,
  };

  // Speculatively decode starting after the header, on a cursor we only
  // commit (via `buf.advance`) once every element parsed successfully —
  // this keeps a partially-buffered aggregate from corrupting `buf`.
  let mut cursor = BytesMut::from(&buf[header_len ..]);
  let mut items = Vec::with_capacity(elements.min(4096));
  for _ in 0 .. elements {
    match decode_value(&mut cursor, depth + 1)? {
      Some(v) => items.push(v),
      None => return Ok(None),
    }
  }
  let consumed = buf.len() - header_len - cursor.len();
  buf.advance(header_len + consumed);

  match shape {
    AggregateShape::Array => Ok(Some(Value::Array(Some(items)))),
    AggregateShape::Set => Ok(Some(Value::Set(items))),
    AggregateShape::Push => Ok(Some(Value::Push(items))),
    AggregateShape::Map => {
      let mut pairs = Vec::with_capacity(items.len() / 2);
      let mut iter = items.into_iter();
      while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
        pairs.push((k, v));
      }
      Ok(Some(Value::Map(pairs)))
    },
  }
}

impl Decoder for Resp3Decoder {
  type Item = Value;
  type Error = Error;

  fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Value>, Error> {
    decode_value(src, 0)
  }
}

impl<'a> Encoder<&'a Command> for Resp3Decoder {
  type Error = Error;

  fn encode(&mut self, item: &'a Command, dst: &mut BytesMut) -> Result<(), Error> {
    CommandEncoder.encode(item, dst)
  }
}

/// True if `value` is a server error that should surface as
/// [`ErrorKind::Command`] (or a cluster-specific variant) rather than a
/// success value.
pub fn value_error(value: &Value) -> Option<Error> {
  value.as_error()
}
