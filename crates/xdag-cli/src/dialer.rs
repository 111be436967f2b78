//! Plain TCP dialer backing the connection scheduler.
//!
//! Each dial runs on its own task: connect with a timeout, register the
//! channel, hold it until the remote closes, then unregister. The block
//! exchange protocol is not spoken here; the connection only occupies a
//! slot so the scheduler's ceiling and backoff behave as in a full node.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use xdag_discovery::now_millis;
use xdag_net::{ActiveChannels, Dialer, NodeRecord};

/// Opens outbound TCP connections and tracks them in [`ActiveChannels`].
#[derive(Debug, Clone)]
pub struct TcpDialer {
    channels: Arc<ActiveChannels>,
    timeout: Duration,
    runtime: Handle,
}

impl TcpDialer {
    /// Dialer registering connections in `channels`.
    pub fn new(channels: Arc<ActiveChannels>, timeout: Duration, runtime: Handle) -> Self {
        Self {
            channels,
            timeout,
            runtime,
        }
    }
}

impl Dialer for TcpDialer {
    fn dial(&self, node: NodeRecord) {
        let channels = self.channels.clone();
        let timeout = self.timeout;
        self.runtime.spawn(async move {
            let addr = node.address();
            let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    debug!(%addr, error = %e, "Connect failed");
                    return;
                }
                Err(_) => {
                    debug!(%addr, "Connect timed out");
                    return;
                }
            };
            info!(%addr, "Connected");
            channels.register(node, now_millis());
            hold(stream, addr).await;
            channels.unregister(&addr);
            info!(%addr, "Disconnected");
        });
    }
}

async fn hold(mut stream: TcpStream, addr: SocketAddr) {
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) => return,
            Ok(_) => {}
            Err(e) => {
                warn!(%addr, error = %e, "Connection error");
                return;
            }
        }
    }
}
