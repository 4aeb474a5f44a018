//! Pipelining: queue commands, flush them as one write, then read back one
//! reply per queued command (spec §4.3).

use crate::{connection::connection::Connection, error::Error, protocol::command::Command, types::Value};

/// A batch of commands queued against one connection. Borrowing the
/// connection mutably for the pipeline's lifetime keeps the request/reply
/// ordering invariant (spec §4.3 "replies arrive in the same order the
/// commands were queued") enforced by the type system rather than by
/// convention.
pub struct Pipeline<'c> {
  connection: &'c mut Connection,
  commands:   Vec<Command>,
}

impl<'c> Pipeline<'c> {
  pub fn new(connection: &'c mut Connection) -> Self {
    Pipeline {
      connection,
      commands: Vec::new(),
    }
  }

  pub fn queue(&mut self, command: Command) -> &mut Self {
    self.commands.push(command);
    self
  }

  pub fn len(&self) -> usize {
    self.commands.len()
  }

  pub fn is_empty(&self) -> bool {
    self.commands.is_empty()
  }

  /// Flush the batch and collect every reply, success or error, aligned
  /// 1:1 with the queued commands. A single command's error reply never
  /// short-circuits the others (design decision: see `Pipeline::exec_all`
  /// for the raise-first-error convenience).
  pub async fn exec(&mut self) -> Result<Vec<Result<Value, Error>>, Error> {
    if self.commands.is_empty() {
      return Ok(Vec::new());
    }

    self.connection.write_pipeline(&self.commands).await?;

    let mut replies = Vec::with_capacity(self.commands.len());
    for _ in 0 .. self.commands.len() {
      let value = self.connection.read_reply().await?;
      replies.push(match value.as_error() {
        Some(err) => Err(err),
        None => Ok(value),
      });
    }

    self.commands.clear();
    Ok(replies)
  }

  /// Convenience over [`Self::exec`] for callers who want the pipeline to
  /// behave like a single fallible operation: the first error reply (if
  /// any) is raised via `?` and discards the rest.
  pub async fn exec_all(&mut self) -> Result<Vec<Value>, Error> {
    self.exec().await?.into_iter().collect()
  }
}

// `Pipeline::exec`/`exec_all` need a live connection to exercise (queueing,
// the ordering guarantee, and the raise-first-error convenience are all
// about the write/read roundtrip) — covered in the integration suite
// rather than here.
