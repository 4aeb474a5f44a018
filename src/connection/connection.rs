//! A single logical connection: transport plus the RESP3 prelude, push
//! demultiplexing, and the write/read path a command travels through
//! (spec §4.2).

use crate::{
  connection::transport::{Transport, TransportAddr},
  error::Error,
  protocol::{
    cmd0, cmd1,
    codec::{CommandEncoder, Resp3Decoder},
    command::Command,
    types::RespVersion,
  },
  types::{
    config::{Config, ConnectionConfig, Server, ServerConfig},
    Value,
  },
};
use bytes::BytesMut;
use std::{io, time::Duration};
use tokio::{
  io::{AsyncReadExt, AsyncWriteExt},
  sync::broadcast,
  time::timeout,
};
use tokio_util::codec::{Decoder, Encoder};

/// Where a [`Connection`] is in its checkout lifecycle. The pool owns the
/// transitions; the connection itself only exposes the information needed
/// to make them (liveness, fork poisoning).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
  Created,
  Connected,
  InUse,
  Idle,
  Closed,
}

/// A single TCP/TLS/Unix connection to one Redis server, past its RESP3
/// handshake and ready to carry commands.
pub struct Connection {
  pub(crate) server: Server,
  transport: Transport,
  write_buf: BytesMut,
  read_buf: BytesMut,
  encoder: CommandEncoder,
  decoder: Resp3Decoder,
  push_tx: broadcast::Sender<Value>,
  created_pid: u32,
  read_chunk_bytes: usize,
  state: ConnectionState,
}

impl Connection {
  /// Open a transport to `server` and run it through the RESP3 handshake
  /// (spec §4.2: `HELLO 3` → `SELECT` → `CLIENT SETNAME`).
  pub async fn connect(server: &Server, config: &Config, conn_cfg: &ConnectionConfig) -> Result<Self, Error> {
    let use_tls = config.tls.is_some();
    let addr = TransportAddr::Tcp {
      host: server.host.clone(),
      port: server.port,
      tls:  use_tls,
    };

    let transport = timeout(conn_cfg.connect_timeout, Transport::connect(&addr, config.tls.as_ref()))
      .await
      .map_err(|_| Error::timeout())??;

    let (push_tx, _) = broadcast::channel(256);
    let mut connection = Connection {
      server: server.clone(),
      transport,
      write_buf: BytesMut::with_capacity(4096),
      read_buf: BytesMut::with_capacity(16 * 1024),
      encoder: CommandEncoder,
      decoder: Resp3Decoder::default(),
      push_tx,
      created_pid: std::process::id(),
      read_chunk_bytes: 16 * 1024,
      state: ConnectionState::Created,
    };

    connection.run_prelude(config, conn_cfg).await?;
    connection.state = ConnectionState::Connected;
    Ok(connection)
  }

  /// Open a connection against a Unix domain socket (spec §4.2, "Unix
  /// socket with same-machine servers").
  #[cfg(feature = "unix-sockets")]
  pub async fn connect_unix(path: &std::path::Path, config: &Config, conn_cfg: &ConnectionConfig) -> Result<Self, Error> {
    let addr = TransportAddr::Unix { path: path.to_path_buf() };
    let transport = timeout(conn_cfg.connect_timeout, Transport::connect(&addr, None))
      .await
      .map_err(|_| Error::timeout())??;

    let (push_tx, _) = broadcast::channel(256);
    let mut connection = Connection {
      server: Server::new(path.display().to_string(), 0),
      transport,
      write_buf: BytesMut::with_capacity(4096),
      read_buf: BytesMut::with_capacity(16 * 1024),
      encoder: CommandEncoder,
      decoder: Resp3Decoder::default(),
      push_tx,
      created_pid: std::process::id(),
      read_chunk_bytes: 16 * 1024,
      state: ConnectionState::Created,
    };

    connection.run_prelude(config, conn_cfg).await?;
    connection.state = ConnectionState::Connected;
    Ok(connection)
  }

  async fn run_prelude(&mut self, config: &Config, conn_cfg: &ConnectionConfig) -> Result<(), Error> {
    let has_credentials = config.username.is_some() || config.password.is_some();
    let mut hello = cmd1("HELLO", "3");
    if let Some(username) = &config.username {
      hello = hello.arg("AUTH").arg(username.as_str()).arg(config.password.as_deref().unwrap_or(""));
    } else if let Some(password) = &config.password {
      hello = hello.arg("AUTH").arg("default").arg(password.as_str());
    }

    let combined = timeout(conn_cfg.internal_command_timeout, self.roundtrip(&hello)).await.map_err(|_| Error::timeout())?;
    match combined {
      Ok(reply) if reply.as_error().is_none() => {},
      // The combined `HELLO 3 AUTH ...` form isn't understood by every server
      // build; fall back to a bare `AUTH` followed by a credential-less
      // `HELLO 3` before giving up (spec §4.2). Only a rejected reply (not a
      // transport-level failure) warrants the fallback.
      Ok(_) if has_credentials => self.auth_then_hello(config, conn_cfg).await?,
      Ok(reply) => return Err(Error::config(format!("HELLO 3 rejected: {}", reply.as_error().unwrap()))),
      Err(err) => return Err(err),
    }

    // Redis Cluster only ever serves database 0 (`SELECT` is rejected against
    // a clustered node), so every other topology — which ultimately resolves
    // to one standalone-shaped master endpoint — issues `SELECT` when a
    // non-zero database was requested (spec §4.2: "if a non-zero database
    // was requested, SELECT <db>" — database 0 is already the connection's
    // default, so selecting it is a wasted round trip).
    if !matches!(&config.server, ServerConfig::Clustered { .. }) {
      if let Some(database) = config.database {
        if database != 0 {
          let select = cmd1("SELECT", database as i64);
          let reply = timeout(conn_cfg.internal_command_timeout, self.roundtrip(&select)).await.map_err(|_| Error::timeout())??;
          if let Some(err) = reply.as_error() {
            return Err(err);
          }
        }
      }
    }

    if let Some(name) = &config.client_name {
      let setname = crate::protocol::cmd2("CLIENT", "SETNAME", name.as_str());
      let reply = timeout(conn_cfg.internal_command_timeout, self.roundtrip(&setname)).await.map_err(|_| Error::timeout())??;
      if let Some(err) = reply.as_error() {
        return Err(err);
      }
    }

    Ok(())
  }

  /// Fallback prelude for servers that reject the combined `HELLO 3 AUTH`
  /// form: issue a bare `AUTH`, then retry `HELLO 3` without credentials
  /// (spec §4.2: "fall back to AUTH then HELLO 3 if the server rejects
  /// combined form").
  async fn auth_then_hello(&mut self, config: &Config, conn_cfg: &ConnectionConfig) -> Result<(), Error> {
    let auth = match &config.username {
      Some(username) => crate::protocol::cmd2("AUTH", username.as_str(), config.password.as_deref().unwrap_or("")),
      None => cmd1("AUTH", config.password.as_deref().unwrap_or("")),
    };
    let reply = timeout(conn_cfg.internal_command_timeout, self.roundtrip(&auth)).await.map_err(|_| Error::timeout())??;
    if let Some(err) = reply.as_error() {
      return Err(Error::config(format!("AUTH rejected: {err}")));
    }

    let hello = cmd1("HELLO", "3");
    let reply = timeout(conn_cfg.internal_command_timeout, self.roundtrip(&hello)).await.map_err(|_| Error::timeout())??;
    if let Some(err) = reply.as_error() {
      return Err(Error::config(format!("HELLO 3 rejected after AUTH fallback: {err}")));
    }
    Ok(())
  }

  /// Version negotiated during the prelude. `HELLO 3` always succeeds or the
  /// connection never leaves `Created`, so this is always RESP3.
  pub fn version(&self) -> RespVersion {
    RespVersion::Resp3
  }

  pub fn server(&self) -> &Server {
    &self.server
  }

  pub fn state(&self) -> ConnectionState {
    self.state
  }

  pub fn set_state(&mut self, state: ConnectionState) {
    self.state = state;
  }

  /// Whether this connection was created by a different OS process than the
  /// one observing it now — the classic post-`fork()` shared-socket hazard.
  /// A pool must discard (never reuse) a connection for which this is true.
  pub fn is_poisoned_by_fork(&self) -> bool {
    self.created_pid != std::process::id()
  }

  /// Subscribe to out-of-band push frames (invalidation messages, pub/sub
  /// delivery) demultiplexed out of the reply stream.
  pub fn subscribe_push(&self) -> broadcast::Receiver<Value> {
    self.push_tx.subscribe()
  }

  pub(crate) async fn write_command(&mut self, command: &Command) -> Result<(), Error> {
    self.write_buf.clear();
    self.encoder.encode(command, &mut self.write_buf)?;
    self.flush_write_buf().await
  }

  pub(crate) async fn write_pipeline(&mut self, commands: &[Command]) -> Result<(), Error> {
    self.write_buf.clear();
    for command in commands {
      self.encoder.encode(command, &mut self.write_buf)?;
    }
    self.flush_write_buf().await
  }

  async fn flush_write_buf(&mut self) -> Result<(), Error> {
    self.transport.write_all(&self.write_buf).await.map_err(classify_io_error)?;
    self.transport.flush().await.map_err(classify_io_error)
  }

  /// Read exactly one top-level reply, transparently draining any push
  /// frames encountered ahead of it into the push channel (spec §4.1: "any
  /// push value encountered while decoding a reply is removed from the
  /// stream and delivered out of band").
  pub(crate) async fn read_reply(&mut self) -> Result<Value, Error> {
    loop {
      if let Some(value) = self.decoder.decode(&mut self.read_buf)? {
        if matches!(value, Value::Push(_)) {
          let _ = self.push_tx.send(value);
          continue;
        }
        return Ok(value);
      }

      let mut chunk = vec![0u8; self.read_chunk_bytes];
      let n = self.transport.read(&mut chunk).await.map_err(classify_io_error)?;
      if n == 0 {
        return Err(Error::io(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by peer")));
      }
      self.read_buf.extend_from_slice(&chunk[.. n]);
    }
  }

  /// Write one command and read its reply, surfacing a server error reply
  /// as `Err` (spec §4.2 "Result<Value, Error>").
  pub async fn roundtrip(&mut self, command: &Command) -> Result<Value, Error> {
    self.write_command(command).await?;
    let value = self.read_reply().await?;
    match value.as_error() {
      Some(err) => Err(err),
      None => Ok(value),
    }
  }

  /// [`Self::roundtrip`] bounded by an explicit deadline, converting an
  /// elapsed timer into `ErrorKind::Timeout` (spec §4.2, §4.6).
  pub async fn call(&mut self, command: &Command, command_timeout: Duration) -> Result<Value, Error> {
    timeout(command_timeout, self.roundtrip(command)).await.map_err(|_| Error::timeout())?
  }

  pub async fn ping(&mut self) -> Result<(), Error> {
    self.roundtrip(&cmd0("PING")).await.map(|_| ())
  }

  pub async fn close(mut self) -> Result<(), Error> {
    self.transport.shutdown().await.map_err(classify_io_error)
  }
}

/// Map a transport-level I/O failure onto the error taxonomy (spec §7);
/// today this is a direct passthrough but keeps the connection/error layers
/// decoupled if finer-grained classification (e.g. reset vs. refused) is
/// added later.
fn classify_io_error(source: io::Error) -> Error {
  Error::io(source)
}
