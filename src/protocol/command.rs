//! The wire-level command request model (spec §3, §4.1).
//!
//! A [`Command`] is an ordered sequence of byte-string arguments, the first
//! of which is the command name. Encoding always uses the array-of-bulk-
//! strings form regardless of argument shape (spec §6).

use crate::protocol::types::ClusterHash;
use bytes::Bytes;
use std::borrow::Cow;

/// One argument to a command. Implemented for the primitive types command
/// wrappers are built from; arbitrary byte payloads go through `Bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
  Bytes(Bytes),
  Integer(i64),
}

impl Argument {
  pub fn into_bytes(self) -> Bytes {
    match self {
      Argument::Bytes(b) => b,
      Argument::Integer(i) => Bytes::from(i.to_string().into_bytes()),
    }
  }

  pub fn len(&self) -> usize {
    match self {
      Argument::Bytes(b) => b.len(),
      Argument::Integer(i) => int_len(*i),
    }
  }
}

fn int_len(i: i64) -> usize {
  if i == 0 {
    return 1;
  }
  let mut n = i.unsigned_abs();
  let mut len = if i < 0 { 1 } else { 0 };
  while n > 0 {
    len += 1;
    n /= 10;
  }
  len
}

pub trait IntoArgument {
  fn into_argument(self) -> Argument;
}

impl IntoArgument for Argument {
  fn into_argument(self) -> Argument {
    self
  }
}

impl IntoArgument for &str {
  fn into_argument(self) -> Argument {
    Argument::Bytes(Bytes::copy_from_slice(self.as_bytes()))
  }
}

impl IntoArgument for String {
  fn into_argument(self) -> Argument {
    Argument::Bytes(Bytes::from(self.into_bytes()))
  }
}

impl IntoArgument for Bytes {
  fn into_argument(self) -> Argument {
    Argument::Bytes(self)
  }
}

impl IntoArgument for Vec<u8> {
  fn into_argument(self) -> Argument {
    Argument::Bytes(Bytes::from(self))
  }
}

impl IntoArgument for &crate::types::Key {
  fn into_argument(self) -> Argument {
    Argument::Bytes(self.0.clone())
  }
}

impl IntoArgument for crate::types::Key {
  fn into_argument(self) -> Argument {
    Argument::Bytes(self.0)
  }
}

macro_rules! impl_into_argument_int {
  ($($ty:ty),*) => {
    $(
      impl IntoArgument for $ty {
        fn into_argument(self) -> Argument {
          Argument::Integer(self as i64)
        }
      }
    )*
  };
}

impl_into_argument_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl IntoArgument for f64 {
  fn into_argument(self) -> Argument {
    Argument::Bytes(Bytes::from(format!("{}", self).into_bytes()))
  }
}

/// A fully-built command request ready to encode.
#[derive(Debug, Clone)]
pub struct Command {
  pub name:    Cow<'static, str>,
  pub args:    Vec<Argument>,
  pub hash:    ClusterHash,
  /// Read commands may be routed to a replica (spec §4.5.3); writes cannot.
  pub is_read: bool,
  /// Commands not allowed to be retried by the default policy even on a
  /// retryable transport error (e.g. non-idempotent without care, or
  /// explicitly marked by the caller).
  pub no_retry: bool,
}

impl Command {
  pub fn new(name: &'static str) -> Self {
    Command {
      name: Cow::Borrowed(name),
      args: Vec::new(),
      hash: ClusterHash::Random,
      is_read: false,
      no_retry: false,
    }
  }

  pub fn arg(mut self, value: impl IntoArgument) -> Self {
    self.args.push(value.into_argument());
    self
  }

  pub fn args(mut self, values: impl IntoIterator<Item = impl IntoArgument>) -> Self {
    self.args.extend(values.into_iter().map(IntoArgument::into_argument));
    self
  }

  pub fn read(mut self) -> Self {
    self.is_read = true;
    self
  }

  /// Opt this command out of the default retry policy (spec §4.6's
  /// "a caller may mark a command non-idempotent").
  pub fn no_retry(mut self) -> Self {
    self.no_retry = true;
    self
  }

  /// Mark the command as keyed by its first argument, which is the
  /// overwhelmingly common case for cluster slot routing.
  pub fn hash_first_key(mut self) -> Self {
    self.hash = ClusterHash::FirstKey;
    self
  }

  pub fn pin_slot(mut self, slot: u16) -> Self {
    self.hash = ClusterHash::Slot(slot);
    self
  }

  /// The key this command should hash on for cluster routing, if any.
  pub fn cluster_key(&self) -> Option<&[u8]> {
    match self.hash {
      ClusterHash::FirstKey => self.args.first().and_then(|a| match a {
        Argument::Bytes(b) => Some(b.as_ref()),
        Argument::Integer(_) => None,
      }),
      _ => None,
    }
  }

  /// Number of bytes the encoded frame will occupy, used to preallocate the
  /// write buffer exactly once per command.
  pub fn encoded_len(&self) -> usize {
    let header = format!("*{}\r\n", self.args.len() + 1).len();
    let name_frame = bulk_frame_len(self.name.len());
    let args_frame: usize = self.args.iter().map(|a| bulk_frame_len(a.len())).sum();
    header + name_frame + args_frame
  }
}

fn bulk_frame_len(payload_len: usize) -> usize {
  // `$<len>\r\n<payload>\r\n`
  1 + digit_count(payload_len) + 2 + payload_len + 2
}

fn digit_count(mut n: usize) -> usize {
  if n == 0 {
    return 1;
  }
  let mut count = 0;
  while n > 0 {
    count += 1;
    n /= 10;
  }
  count
}

/// Zero-argument command (e.g. `PING`, `MULTI`).
pub fn cmd0(name: &'static str) -> Command {
  Command::new(name)
}

/// One-argument fast path (e.g. `GET key`), avoiding the `Vec` push loop
/// `Command::args` would otherwise take for the hottest single-key
/// commands.
pub fn cmd1(name: &'static str, a: impl IntoArgument) -> Command {
  let mut cmd = Command::new(name);
  cmd.args = vec![a.into_argument()];
  cmd
}

/// Two-argument fast path (e.g. `SET key value`, `GET`+`HGET` field lookups).
pub fn cmd2(name: &'static str, a: impl IntoArgument, b: impl IntoArgument) -> Command {
  let mut cmd = Command::new(name);
  cmd.args = vec![a.into_argument(), b.into_argument()];
  cmd
}

/// Three-argument fast path (e.g. `SET key value EX`, `HSET key field value`).
pub fn cmd3(name: &'static str, a: impl IntoArgument, b: impl IntoArgument, c: impl IntoArgument) -> Command {
  let mut cmd = Command::new(name);
  cmd.args = vec![a.into_argument(), b.into_argument(), c.into_argument()];
  cmd
}
