//! `tcp::TcpServerConnector` provides a `ServerConnector` for TCP connections

use log::debug;
use tokio::net::TcpStream;

use crate::connect::{starttls, BoxedIo, ServerConnector};
use crate::Error;

/// Connect via TCP to an XMPP server, upgrading to TLS with rustls when
/// the server offers StartTLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpServerConnector;

impl ServerConnector for TcpServerConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<BoxedIo, Error> {
        debug!("Connecting to {}:{}", host, port);
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }

    async fn starttls(&self, io: BoxedIo, domain: &str) -> Result<BoxedIo, Error> {
        let tls_stream = starttls::rustls_upgrade(io, domain).await?;
        Ok(Box::new(tls_stream))
    }
}
