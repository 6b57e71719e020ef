// Copyright (c) 2024 Jonas Schäfer <jonas@zombofant.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::time::Duration;

use crate::client::handshake::HandshakeConfig;
use crate::client::security::MechanismKind;

/// Default port for client-to-server connections.
pub const DEFAULT_PORT: u16 = 5222;

/// Resource used for legacy authentication when the credentials carry none.
pub const DEFAULT_RESOURCE: &str = "xmpp-session";

/// Whether StartTLS is negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityMode {
    /// Fail unless the stream is encrypted before authenticating.
    Required,

    /// Use StartTLS whenever the server offers it.
    #[default]
    Enabled,

    /// Never negotiate StartTLS.
    Disabled,
}

/// Connection settings for a [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct Config {
    /// Host name or address of the server to connect to.
    pub host: String,

    /// TCP port of the server.
    pub port: u16,

    /// XMPP domain, if it differs from `host`.
    ///
    /// This is what the stream is addressed to and what the TLS
    /// certificate and the DIGEST-MD5 `digest-uri` are checked against.
    pub domain: Option<String>,

    /// Value of `xml:lang` on the stream header.
    pub locale: Option<String>,

    /// StartTLS policy.
    pub security: SecurityMode,

    /// SASL mechanisms which may be used.
    pub mechanisms: Vec<MechanismKind>,

    /// Resource for legacy authentication when the credentials have none.
    pub default_resource: String,

    /// Timeout for `send_and_wait` when the caller passes none.
    ///
    /// `None` waits forever.
    pub reply_timeout: Option<Duration>,

    /// How long `disconnect` waits for the reader task to finish.
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Settings for `host` with every default applied.
    pub fn new<H: Into<String>>(host: H) -> Config {
        Config {
            host: host.into(),
            port: DEFAULT_PORT,
            domain: None,
            locale: None,
            security: SecurityMode::default(),
            mechanisms: MechanismKind::ALL.to_vec(),
            default_resource: DEFAULT_RESOURCE.to_owned(),
            reply_timeout: None,
            shutdown_timeout: Duration::new(5, 0),
        }
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Config {
        self.port = port;
        self
    }

    /// Set the XMPP domain.
    pub fn with_domain<D: Into<String>>(mut self, domain: D) -> Config {
        self.domain = Some(domain.into());
        self
    }

    /// Set the stream locale.
    pub fn with_locale<L: Into<String>>(mut self, locale: L) -> Config {
        self.locale = Some(locale.into());
        self
    }

    /// Set the StartTLS policy.
    pub fn with_security(mut self, security: SecurityMode) -> Config {
        self.security = security;
        self
    }

    /// Restrict the SASL mechanisms.
    pub fn with_mechanisms<I: IntoIterator<Item = MechanismKind>>(mut self, mechanisms: I) -> Config {
        self.mechanisms = mechanisms.into_iter().collect();
        self
    }

    /// Set the resource legacy authentication falls back to.
    pub fn with_default_resource<R: Into<String>>(mut self, resource: R) -> Config {
        self.default_resource = resource.into();
        self
    }

    /// Set the default reply timeout.
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Config {
        self.reply_timeout = Some(timeout);
        self
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Config {
        self.shutdown_timeout = timeout;
        self
    }

    /// The XMPP domain: `domain` if set, `host` otherwise.
    pub fn domain(&self) -> &str {
        self.domain.as_deref().unwrap_or(&self.host)
    }

    pub(crate) fn handshake(&self) -> HandshakeConfig {
        HandshakeConfig {
            domain: self.domain().to_owned(),
            locale: self.locale.clone(),
            security: self.security,
            mechanisms: self.mechanisms.clone(),
            default_resource: self.default_resource.clone(),
        }
    }
}
