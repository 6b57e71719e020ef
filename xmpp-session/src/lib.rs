// Copyright (c) 2017 Astro <astro@spaceboyz.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Client-side [XMPP](https://xmpp.org/) session establishment with asynchronous I/O using [tokio](https://tokio.rs/).
//!
//! # Getting started
//!
//! A [`Client`] opens a byte stream to the server through a
//! [`connect::ServerConnector`], then [`Client::authenticate`] negotiates
//! StartTLS, authenticates with SASL (DIGEST-MD5 or PLAIN) or legacy
//! `jabber:iq:auth`, and binds a resource. Afterwards a single background
//! reader task routes every inbound stanza either to the caller waiting on
//! its id ([`Client::send_and_wait`]) or to the registered
//! [`Listener`]s.
//!
//! ```no_run
//! use xmpp_session::{Client, Config, Credentials};
//! use xmpp_session::connect::TcpServerConnector;
//!
//! # async fn run() -> Result<(), xmpp_session::Error> {
//! let config = Config::new("example.org");
//! let mut client = Client::connect(TcpServerConnector, config).await?;
//! client
//!     .authenticate(Credentials::new("romeo", "pencil", "balcony"))
//!     .await?;
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! Supported authentication paths:
//! - [x] StartTLS (tokio-rustls, webpki roots)
//! - [x] SASL DIGEST-MD5 and PLAIN
//! - [x] Legacy `jabber:iq:auth` (digest and plaintext)
//! - [x] Resource binding and legacy session establishment
//! - [ ] SCRAM, EXTERNAL, ANONYMOUS
//! - [ ] DNS SRV resolution

#![deny(unsafe_code, missing_docs, bare_trait_objects)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod connect;
pub mod ns;
pub mod proto;
pub mod stanza_error;

mod client;
pub use client::{
    context::SessionContext,
    credentials::Credentials,
    driver::Listener,
    features::FeatureSet,
    handshake::{HandshakeConfig, HandshakeEngine},
    queue::{QueueError, ReplyQueue, ReplyToken},
    security::{MechanismKind, SecurityStep},
    Client, ClientHandle,
};

mod config;
pub use config::{Config, SecurityMode};

mod stanza;
pub use stanza::Stanza;

/// Detailed error types
pub mod error;

#[doc(inline)]
/// Generic xmpp_session Error
pub use crate::error::Error;

// Re-exports
pub use minidom;
pub use xmpp_parsers as parsers;
pub use xmpp_parsers::jid;
