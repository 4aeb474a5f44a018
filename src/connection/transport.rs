//! The byte-oriented transport union: plain TCP, TLS over TCP, or a Unix
//! domain socket (spec §4.2). All three expose the same `AsyncRead +
//! AsyncWrite` contract to the codec so the connection layer above never
//! branches on transport kind.

use crate::{error::Error, types::config::TlsConfig};
use std::{
  io,
  pin::Pin,
  task::{Context, Poll},
};
use tokio::{
  io::{AsyncRead, AsyncWrite, ReadBuf},
  net::TcpStream,
};

/// A connectable endpoint plus the transport kind to use for it.
#[derive(Debug, Clone)]
pub enum TransportAddr {
  Tcp { host: String, port: u16, tls: bool },
  #[cfg(feature = "unix-sockets")]
  Unix { path: std::path::PathBuf },
}

pub enum Transport {
  Tcp(TcpStream),
  #[cfg(feature = "enable-rustls")]
  Rustls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
  #[cfg(feature = "enable-native-tls")]
  NativeTls(Box<tokio_native_tls::TlsStream<TcpStream>>),
  #[cfg(feature = "unix-sockets")]
  Unix(tokio::net::UnixStream),
}

impl Transport {
  /// Open a new transport, applying `TCP_NODELAY` on the underlying TCP
  /// socket regardless of whether it ends up wrapped in TLS (spec §4.2:
  /// "small writes are not held by Nagle's algorithm").
  pub async fn connect(addr: &TransportAddr, tls: Option<&TlsConfig>) -> Result<Self, Error> {
    match addr {
      TransportAddr::Tcp { host, port, tls: use_tls } => {
        let stream = TcpStream::connect((host.as_str(), *port))
          .await
          .map_err(Error::io)?;
        apply_tcp_options(&stream)?;

        if *use_tls {
          let _ = tls;
          #[cfg(feature = "enable-rustls")]
          {
            if let Some(cfg) = tls.and_then(|t| t.rustls.clone()) {
              let connector = tokio_rustls::TlsConnector::from(cfg);
              let server_name = tokio_rustls::rustls::pki_types::ServerName::try_from(host.clone())
                .map_err(|_| Error::config("invalid TLS server name"))?;
              let tls_stream = connector
                .connect(server_name, stream)
                .await
                .map_err(|e| Error::io(io::Error::new(io::ErrorKind::Other, e)))?;
              return Ok(Transport::Rustls(Box::new(tls_stream)));
            }
          }
          #[cfg(feature = "enable-native-tls")]
          {
            if let Some(connector) = tls.and_then(|t| t.native_tls.clone()) {
              let connector = tokio_native_tls::TlsConnector::from(connector);
              let tls_stream = connector
                .connect(host, stream)
                .await
                .map_err(|e| Error::io(io::Error::new(io::ErrorKind::Other, e)))?;
              return Ok(Transport::NativeTls(Box::new(tls_stream)));
            }
          }
          return Err(Error::config("TLS requested but no TLS backend is configured"));
        }

        Ok(Transport::Tcp(stream))
      },
      #[cfg(feature = "unix-sockets")]
      TransportAddr::Unix { path } => {
        let stream = tokio::net::UnixStream::connect(path).await.map_err(Error::io)?;
        Ok(Transport::Unix(stream))
      },
    }
  }
}

fn apply_tcp_options(stream: &TcpStream) -> Result<(), Error> {
  stream.set_nodelay(true).map_err(Error::io)
}

impl AsyncRead for Transport {
  fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
    match self.get_mut() {
      Transport::Tcp(s) => Pin::new(s).poll_read(cx, buf),
      #[cfg(feature = "enable-rustls")]
      Transport::Rustls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
      #[cfg(feature = "enable-native-tls")]
      Transport::NativeTls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
      #[cfg(feature = "unix-sockets")]
      Transport::Unix(s) => Pin::new(s).poll_read(cx, buf),
    }
  }
}

impl AsyncWrite for Transport {
  fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
    match self.get_mut() {
      Transport::Tcp(s) => Pin::new(s).poll_write(cx, buf),
      #[cfg(feature = "enable-rustls")]
      Transport::Rustls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
      #[cfg(feature = "enable-native-tls")]
      Transport::NativeTls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
      #[cfg(feature = "unix-sockets")]
      Transport::Unix(s) => Pin::new(s).poll_write(cx, buf),
    }
  }

  fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
    match self.get_mut() {
      Transport::Tcp(s) => Pin::new(s).poll_flush(cx),
      #[cfg(feature = "enable-rustls")]
      Transport::Rustls(s) => Pin::new(s.as_mut()).poll_flush(cx),
      #[cfg(feature = "enable-native-tls")]
      Transport::NativeTls(s) => Pin::new(s.as_mut()).poll_flush(cx),
      #[cfg(feature = "unix-sockets")]
      Transport::Unix(s) => Pin::new(s).poll_flush(cx),
    }
  }

  fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
    match self.get_mut() {
      Transport::Tcp(s) => Pin::new(s).poll_shutdown(cx),
      #[cfg(feature = "enable-rustls")]
      Transport::Rustls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
      #[cfg(feature = "enable-native-tls")]
      Transport::NativeTls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
      #[cfg(feature = "unix-sockets")]
      Transport::Unix(s) => Pin::new(s).poll_shutdown(cx),
    }
  }
}
