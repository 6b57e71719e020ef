//! TLS upgrade of an established connection, after `<proceed/>`

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;

use tokio_rustls::{
    client::TlsStream,
    rustls::pki_types::{InvalidDnsNameError, ServerName},
    rustls::{ClientConfig, RootCertStore},
    TlsConnector,
};

use crate::connect::BoxedIo;

/// Wrap `stream` in a rustls client session verified against the webpki
/// roots for `domain`.
pub async fn rustls_upgrade(stream: BoxedIo, domain: &str) -> Result<TlsStream<BoxedIo>, StartTlsError> {
    let domain = ServerName::try_from(domain.to_owned()).map_err(StartTlsError::DnsNameError)?;
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let tls_stream = TlsConnector::from(Arc::new(config))
        .connect(domain, stream)
        .await
        .map_err(StartTlsError::Handshake)?;
    Ok(tls_stream)
}

/// StartTLS negotiation error
#[derive(Debug)]
pub enum StartTlsError {
    /// The server answered `<starttls/>` with `<failure/>`
    Refused,
    /// The server answered `<starttls/>` with something else
    UnexpectedElement(String),
    /// Encryption is required locally but the server does not offer it
    NotOffered,
    /// The server requires encryption but it is disabled locally
    RequiredByServer,
    /// The server sent data after `<proceed/>` before the TLS handshake
    BufferedData,
    /// TLS handshake error
    Handshake(io::Error),
    /// DNS name parsing error
    DnsNameError(InvalidDnsNameError),
}

impl fmt::Display for StartTlsError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Refused => write!(fmt, "server refused StartTLS"),
            Self::UnexpectedElement(name) => {
                write!(fmt, "unexpected <{}/> in answer to StartTLS", name)
            }
            Self::NotOffered => write!(fmt, "TLS required but not offered by the server"),
            Self::RequiredByServer => write!(fmt, "server requires TLS but it is disabled"),
            Self::BufferedData => write!(fmt, "unencrypted data received after <proceed/>"),
            Self::Handshake(e) => write!(fmt, "TLS error: {}", e),
            Self::DnsNameError(e) => write!(fmt, "DNS name error: {}", e),
        }
    }
}

impl StdError for StartTlsError {}

impl From<InvalidDnsNameError> for StartTlsError {
    fn from(e: InvalidDnsNameError) -> Self {
        Self::DnsNameError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_invalid_domain() {
        let (client, _server) = tokio::io::duplex(64);
        match rustls_upgrade(Box::new(client), "not a domain!").await {
            Err(StartTlsError::DnsNameError(_)) => (),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }
}
