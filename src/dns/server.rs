use crate::dns::handlers::Handler;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, error, warn};

/// Receive buffer size. Queries this server answers are far smaller; anything longer is
/// truncated by the socket and fails to parse.
const RECV_BUF_LEN: usize = 4096;

/// A bound UDP listener serving one [`Handler`].
pub struct Server {
    socket: Arc<UdpSocket>,
    handler: Handler,
}

impl Server {
    /// The bound address, useful when binding port 0.
    ///
    /// # Errors
    ///
    /// Returns the socket's IO error.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive datagrams forever, answering each in its own task. Receive and send errors are
    /// logged and never stop the loop.
    pub async fn block_until_done(self) {
        let mut buf = vec![0u8; RECV_BUF_LEN];
        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(err) => {
                    warn!("UDP receive failed: {err}");
                    continue;
                }
            };
            let packet = buf[..len].to_vec();
            let socket = Arc::clone(&self.socket);
            let handler = self.handler.clone();
            tokio::spawn(async move {
                let response = handler.handle_request(&packet).await;
                match socket.send_to(&response, peer).await {
                    Ok(sent) => debug!(%peer, sent, "sent response"),
                    Err(err) => error!(%peer, "UDP send failed: {err}"),
                }
            });
        }
    }
}

/// Bind `addr` for UDP and return a [`Server`] that answers with `handler`.
///
/// # Errors
///
/// Returns the IO error when the socket can't be bound.
pub async fn new(addr: SocketAddr, handler: Handler) -> std::io::Result<Server> {
    let socket = UdpSocket::bind(addr).await?;
    Ok(Server {
        socket: Arc::new(socket),
        handler,
    })
}
