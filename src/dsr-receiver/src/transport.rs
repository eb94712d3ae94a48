// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Network endpoint that yields raw stream chunks.
//!
//! TCP connects out to the demodulator's sink server and reads an unframed
//! byte stream. UDP binds locally and treats each datagram as one chunk.

use std::io;
use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tracing::info;

use crate::config::TransportKind;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// One received unit from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Data(Bytes),
    /// Peer closed the connection (TCP only).
    Eof,
}

#[derive(Debug)]
pub enum Transport {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

impl Transport {
    /// Open the endpoint: connect for TCP, bind for UDP.
    pub async fn connect(kind: TransportKind, host: &str, port: u16) -> Result<Self, TransportError> {
        let addr = format!("{}:{}", host, port);
        match kind {
            TransportKind::Tcp => {
                info!("Connecting to digital sink server at {}", addr);
                let stream = TcpStream::connect(&addr)
                    .await
                    .map_err(|source| TransportError::Connect {
                        addr: addr.clone(),
                        source,
                    })?;
                info!("Connected to digital stream at {}", addr);
                Ok(Transport::Tcp(stream))
            }
            TransportKind::Udp => {
                let bind_addr = resolve_first(&addr).await?;
                let socket = UdpSocket::bind(bind_addr)
                    .await
                    .map_err(|source| TransportError::Bind {
                        addr: addr.clone(),
                        source,
                    })?;
                info!("UDP socket listening on {}", bind_addr);
                Ok(Transport::Udp(socket))
            }
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::Tcp(_) => TransportKind::Tcp,
            Transport::Udp(_) => TransportKind::Udp,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Transport::Tcp(stream) => stream.local_addr(),
            Transport::Udp(socket) => socket.local_addr(),
        }
    }

    /// Receive the next chunk of at most `max_len` bytes.
    ///
    /// UDP returns exactly one datagram (truncated to `max_len`) and never
    /// reports [`Chunk::Eof`].
    pub async fn recv_chunk(&mut self, max_len: usize) -> io::Result<Chunk> {
        let mut buf = BytesMut::zeroed(max_len);
        let n = match self {
            Transport::Tcp(stream) => {
                let n = stream.read(&mut buf).await?;
                if n == 0 {
                    return Ok(Chunk::Eof);
                }
                n
            }
            Transport::Udp(socket) => socket.recv_from(&mut buf).await?.0,
        };
        buf.truncate(n);
        Ok(Chunk::Data(buf.freeze()))
    }
}

async fn resolve_first(addr: &str) -> Result<SocketAddr, TransportError> {
    let mut addrs = lookup_host(addr)
        .await
        .map_err(|source| TransportError::Resolve {
            addr: addr.to_string(),
            source,
        })?;
    addrs.next().ok_or_else(|| TransportError::Resolve {
        addr: addr.to_string(),
        source: io::Error::new(io::ErrorKind::NotFound, "no addresses"),
    })
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn test_tcp_reads_then_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(&[1, 2, 3]).await.unwrap();
        });

        let mut transport = Transport::connect(TransportKind::Tcp, "127.0.0.1", port)
            .await
            .unwrap();
        assert_eq!(transport.kind(), TransportKind::Tcp);
        server.await.unwrap();

        let mut data = Vec::new();
        loop {
            match transport.recv_chunk(4096).await.unwrap() {
                Chunk::Data(bytes) => data.extend_from_slice(&bytes),
                Chunk::Eof => break,
            }
        }
        assert_eq!(data, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_tcp_refused_is_connect_error() {
        // Grab a free port, then close the listener so nothing accepts.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = Transport::connect(TransportKind::Tcp, "127.0.0.1", port)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[tokio::test]
    async fn test_udp_datagram_is_one_chunk() {
        let mut transport = Transport::connect(TransportKind::Udp, "127.0.0.1", 0)
            .await
            .unwrap();
        let addr = transport.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&[9, 8, 7, 6], addr).await.unwrap();

        let chunk = transport.recv_chunk(4096).await.unwrap();
        assert_eq!(chunk, Chunk::Data(Bytes::from_static(&[9, 8, 7, 6])));
    }

    #[tokio::test]
    async fn test_udp_bind_conflict_is_bind_error() {
        let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let err = Transport::connect(TransportKind::Udp, "127.0.0.1", port)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Bind { .. }));
    }
}
