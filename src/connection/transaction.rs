//! `MULTI`/`EXEC`/`DISCARD` transactions (spec §4.3).

use crate::{
  connection::connection::Connection,
  error::Error,
  protocol::{cmd0, command::Command},
  types::Value,
};

/// A queued `MULTI` transaction against one connection. `WATCH` is issued by
/// the caller directly against the same `Connection` before constructing a
/// `Transaction` — it is a plain command, not part of this type's surface.
pub struct Transaction<'c> {
  connection: &'c mut Connection,
  commands:   Vec<Command>,
}

impl<'c> Transaction<'c> {
  pub fn new(connection: &'c mut Connection) -> Self {
    Transaction {
      connection,
      commands: Vec::new(),
    }
  }

  pub fn queue(&mut self, command: Command) -> &mut Self {
    self.commands.push(command);
    self
  }

  /// Send `MULTI`, queue every buffered command, then `EXEC`. Returns
  /// `Ok(None)` if the transaction was aborted because a watched key
  /// changed (`EXEC` replying with a null array), matching the server's own
  /// null-vs-empty-array distinction rather than collapsing it to an error.
  pub async fn exec(&mut self) -> Result<Option<Vec<Value>>, Error> {
    self.connection.roundtrip(&cmd0("MULTI")).await?;

    for command in &self.commands {
      let queued = self.connection.roundtrip(command).await;
      if let Err(err) = queued {
        // The server rejects a malformed command at queue time rather than
        // at EXEC time; abort the transaction so the connection isn't left
        // mid-MULTI for the next caller.
        let _ = self.connection.roundtrip(&cmd0("DISCARD")).await;
        self.commands.clear();
        return Err(err);
      }
    }

    let reply = self.connection.roundtrip(&cmd0("EXEC")).await;
    self.commands.clear();

    match reply? {
      Value::Array(None) => Ok(None),
      Value::Array(Some(items)) => Ok(Some(items)),
      _ => Err(Error::protocol("EXEC did not reply with an array")),
    }
  }

  pub async fn discard(&mut self) -> Result<(), Error> {
    self.commands.clear();
    self.connection.roundtrip(&cmd0("DISCARD")).await.map(|_| ())
  }
}
