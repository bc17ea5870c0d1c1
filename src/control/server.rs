//! Control-panel HTTP listener
//!
//! Connections are served one at a time: read the request, run it through
//! the handler under the context lock, write the response, then half-close
//! and drain the socket so the client sees the whole answer.

use crate::config::ServerConfig;
use crate::control::handler::SharedContext;
use crate::control::request::{read_request, RequestLimits};
use crate::error::{Result, ServerError};
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time;
use tracing::{debug, error, info, warn};

/// Ports tried in order when none is configured; 0 lets the system pick
pub fn candidate_ports() -> Vec<u16> {
    (8080..=8089)
        .chain(32000..=32009)
        .chain(42000..=42009)
        .chain(std::iter::once(0))
        .collect()
}

/// Control server bound to a local port
pub struct ControlServer {
    listener: TcpListener,
    context: SharedContext,
    limits: RequestLimits,
}

impl ControlServer {
    /// Bind the configured port, or the first free candidate
    pub async fn bind(config: &ServerConfig, context: SharedContext) -> Result<Self> {
        let ip: IpAddr = config.bind_address.parse().map_err(|_| {
            ServerError::Config(format!("Invalid bind address: {}", config.bind_address))
        })?;
        let ports = if config.port != 0 {
            vec![config.port]
        } else {
            candidate_ports()
        };

        let mut last_error = None;
        for port in ports {
            match TcpListener::bind(SocketAddr::new(ip, port)).await {
                Ok(listener) => {
                    info!("Control panel listening on {}", listener.local_addr()?);
                    return Ok(Self {
                        listener,
                        context,
                        limits: config.request_limits(),
                    });
                }
                Err(e) => {
                    debug!("Port {} unavailable: {}", port, e);
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => ServerError::Io(e),
            None => ServerError::Config("No port to bind".to_string()),
        })
    }

    /// Address actually bound
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// URL of the landing page
    pub fn url(&self) -> Result<String> {
        Ok(format!("http://{}/", self.local_addr()?))
    }

    /// Shared handler context
    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    /// Accept connections until a `quit` command or `shutdown` completes
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, closing listener");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            debug!("Connection from {}", peer);
            if self.handle_connection(stream).await {
                info!("Quit requested, closing listener");
                break;
            }
        }

        Ok(())
    }

    /// Serve one connection; returns whether the server should stop
    async fn handle_connection(&self, stream: TcpStream) -> bool {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let Some(request) = read_request(&mut reader, &self.limits).await else {
            return false;
        };
        debug!("{} {:?}", request.method, request.target);

        let reply = {
            let mut context = self.context.lock().await;
            context.handle(request)
        };

        if let Some(response) = &reply.response {
            debug!("Answering {}", response.status);
            if let Err(e) = write_half.write_all(&response.to_bytes()).await {
                warn!("Failed to send response: {}", e);
            }
        }
        if let Err(e) = write_half.shutdown().await {
            debug!("Half-close failed: {}", e);
        }
        drain(&mut reader, self.limits.timeout).await;

        reply.quit
    }
}

/// Discard whatever the client still sends until it closes or goes idle
async fn drain<R>(reader: &mut R, timeout: Duration)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 1024];
    loop {
        match time::timeout(timeout, reader.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => continue,
            _ => break,
        }
    }
}
