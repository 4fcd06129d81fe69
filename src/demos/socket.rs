//! Socket echo over TCP loopback or a Unix-domain socket pair
//!
//! One side echoes whatever it reads until end of stream; the other sends a
//! message, half-closes its write side and reads the echo back.

use crate::config::SOCKET_IO_TIMEOUT;
use crate::error::{ensure, DemoError, DemoResult, IoContext};
use clap::ValueEnum;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UnixStream};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SocketDomain {
    /// TCP over 127.0.0.1
    Inet,
    /// Connected AF_UNIX stream pair
    Unix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketReport {
    pub domain: SocketDomain,
    pub peer: String,
    pub bytes: usize,
    pub echoed: Vec<u8>,
}

pub fn run(domain: SocketDomain, message: &str) -> DemoResult<SocketReport> {
    if message.is_empty() {
        return Err(DemoError::validation("message", "must not be empty"));
    }
    info!(?domain, len = message.len(), "socket demo starting");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .io_context("build runtime")?;

    let report = runtime.block_on(async {
        tokio::time::timeout(SOCKET_IO_TIMEOUT, exchange(domain, message.as_bytes()))
            .await
            .map_err(|_| DemoError::invariant(format!("echo not completed within {SOCKET_IO_TIMEOUT:?}")))?
    })?;

    println!("{:?} peer: {}", report.domain, report.peer);
    println!(
        "sent {} bytes, echoed {:?}",
        report.bytes,
        String::from_utf8_lossy(&report.echoed)
    );
    ensure(report.echoed == message.as_bytes(), || {
        format!("echo {:?} differs from {message:?}", String::from_utf8_lossy(&report.echoed))
    })?;
    Ok(report)
}

async fn exchange(domain: SocketDomain, payload: &[u8]) -> DemoResult<SocketReport> {
    match domain {
        SocketDomain::Inet => {
            let listener = TcpListener::bind("127.0.0.1:0")
                .await
                .io_context("bind 127.0.0.1:0")?;
            let addr = listener.local_addr().io_context("local_addr")?;
            debug!(%addr, "listening");

            let server = tokio::spawn(async move {
                let (stream, client) = listener.accept().await?;
                debug!(%client, "accepted");
                echo(stream).await
            });

            let client = TcpStream::connect(addr)
                .await
                .io_context("connect")?;
            let echoed = send_and_collect(client, payload).await?;
            join_server(server).await?;

            Ok(SocketReport {
                domain,
                peer: addr.to_string(),
                bytes: payload.len(),
                echoed,
            })
        }
        SocketDomain::Unix => {
            let (client, server_end) = UnixStream::pair().io_context("socketpair")?;
            let server = tokio::spawn(echo(server_end));
            let echoed = send_and_collect(client, payload).await?;
            join_server(server).await?;

            Ok(SocketReport {
                domain,
                peer: "socketpair".to_string(),
                bytes: payload.len(),
                echoed,
            })
        }
    }
}

/// Copy everything read back to the peer; returns the byte count
async fn echo<S>(stream: S) -> std::io::Result<u64>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let copied = tokio::io::copy(&mut reader, &mut writer).await?;
    writer.shutdown().await?;
    Ok(copied)
}

async fn send_and_collect<S>(mut stream: S, payload: &[u8]) -> DemoResult<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(payload).await.io_context("send")?;
    // Half-close so the echo side sees end of stream
    stream.shutdown().await.io_context("shutdown write")?;

    let mut echoed = Vec::with_capacity(payload.len());
    stream.read_to_end(&mut echoed).await.io_context("receive")?;
    Ok(echoed)
}

async fn join_server(server: tokio::task::JoinHandle<std::io::Result<u64>>) -> DemoResult<()> {
    let copied = server
        .await
        .map_err(|err| DemoError::invariant(format!("echo task failed: {err}")))?
        .io_context("echo")?;
    debug!(copied, "echo side done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inet_echo() {
        let report = run(SocketDomain::Inet, "hello socket").unwrap();
        assert_eq!(report.echoed, b"hello socket".to_vec());
        assert_eq!(report.bytes, 12);
        assert!(report.peer.starts_with("127.0.0.1:"));
    }

    #[test]
    fn test_unix_echo() {
        let report = run(SocketDomain::Unix, "over a pair").unwrap();
        assert_eq!(report.echoed, b"over a pair".to_vec());
        assert_eq!(report.peer, "socketpair");
    }

    #[test]
    fn test_empty_message_rejected() {
        let err = run(SocketDomain::Unix, "").unwrap_err();
        assert!(matches!(err, DemoError::Validation { .. }));
    }
}
