//! `ServerConnector` provides byte streams for XMPP clients

use tokio::io::{AsyncRead, AsyncWrite};

use crate::Error;

pub mod starttls;
pub use starttls::StartTlsError;

pub mod tcp;
pub use tcp::TcpServerConnector;

/// trait returned wrapped in XmppStream by ServerConnector
pub trait AsyncReadAndWrite: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncReadAndWrite for T {}

/// A type-erased transport, so that a plaintext connection can be swapped
/// for its TLS-wrapped self mid-handshake.
pub type BoxedIo = Box<dyn AsyncReadAndWrite>;

/// Trait called to open connections to an XMPP server and secure them.
pub trait ServerConnector: Send + Sync + 'static {
    /// Open a raw byte stream to `host:port`.
    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> impl core::future::Future<Output = Result<BoxedIo, Error>> + Send;

    /// Run a TLS client handshake over `io`, an already connected stream on
    /// which the server just answered `<proceed/>`.
    fn starttls(
        &self,
        io: BoxedIo,
        domain: &str,
    ) -> impl core::future::Future<Output = Result<BoxedIo, Error>> + Send;
}
