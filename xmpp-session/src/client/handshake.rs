// Copyright (c) 2017 Astro <astro@spaceboyz.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Session establishment: stream opening, security negotiation and
//! resource binding.

use log::debug;

use crate::client::bind::bind;
use crate::client::context::SessionContext;
use crate::client::credentials::Credentials;
use crate::client::features::FeatureSet;
use crate::client::security::{select_step, MechanismKind, SecurityStep, StepOutcome};
use crate::config::SecurityMode;
use crate::connect::ServerConnector;
use crate::error::{Error, ProtocolError};
use crate::ns;
use crate::proto::XmppStream;

/// Everything the handshake needs to know besides the credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// XMPP domain the stream is addressed to.
    pub domain: String,
    /// `xml:lang` to announce.
    pub locale: Option<String>,
    /// StartTLS policy.
    pub security: SecurityMode,
    /// SASL mechanisms which may be selected.
    pub mechanisms: Vec<MechanismKind>,
    /// Resource for legacy authentication when the credentials have none.
    pub default_resource: String,
}

/// Drives a fresh stream to an authenticated, bound session.
///
/// The engine never retries: the first failure aborts the handshake and is
/// returned as is.
#[derive(Debug, Clone)]
pub struct HandshakeEngine {
    config: HandshakeConfig,
}

fn at_least_1_0(version: &str) -> bool {
    version
        .split('.')
        .next()
        .and_then(|major| major.trim().parse::<u32>().ok())
        .map_or(false, |major| major >= 1)
}

impl HandshakeEngine {
    /// Constructor
    pub fn new(config: HandshakeConfig) -> HandshakeEngine {
        HandshakeEngine { config }
    }

    /// The configuration this engine was built with.
    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Send our stream header, read the server's and, for XMPP 1.0
    /// servers, its `<stream:features/>`.
    ///
    /// Returns `None` when the server sent no features at all.
    pub async fn open(
        &self,
        stream: &mut XmppStream,
        context: &mut SessionContext,
    ) -> Result<Option<FeatureSet>, Error> {
        let host = context
            .host
            .clone()
            .unwrap_or_else(|| self.config.domain.clone());
        stream.send_header(&host, self.config.locale.as_deref()).await?;

        let attrs = stream.recv_header().await?;
        if !attrs.contains_key("xmlns") {
            return Err(ProtocolError::NoStreamNamespace.into());
        }
        if attrs.get("xmlns:stream").map_or(false, |stream_ns| stream_ns != ns::STREAM) {
            return Err(ProtocolError::InvalidStreamStart.into());
        }
        let stream_id = attrs.get("id").ok_or(ProtocolError::NoStreamId)?;

        context.stream_id = Some(stream_id.clone());
        context.version = attrs.get("version").cloned();
        context.host = Some(attrs.get("from").cloned().unwrap_or(host));
        context.locale = attrs
            .get("xml:lang")
            .cloned()
            .or_else(|| self.config.locale.clone());
        debug!(
            "Stream {} opened, version {:?}",
            stream_id, context.version
        );

        if !context.version.as_deref().map_or(false, at_least_1_0) {
            return Ok(None);
        }
        let features = stream.recv_element().await?;
        Ok(Some(FeatureSet::from_element(&features)?))
    }

    /// Run the handshake on a freshly connected stream.
    ///
    /// Returns the stream of the established session along with the
    /// features its last generation advertised.
    pub async fn establish<C: ServerConnector>(
        &self,
        mut stream: XmppStream,
        connector: &C,
        context: &mut SessionContext,
        credentials: &mut Credentials,
    ) -> Result<(XmppStream, Option<FeatureSet>), Error> {
        if context.host.is_none() {
            context.host = Some(self.config.domain.clone());
        }
        let mut tls_done = false;
        let mut authenticated = false;

        loop {
            let features = self.open(&mut stream, context).await?;
            if authenticated {
                bind(&mut stream, features.as_ref(), context, credentials).await?;
                return Ok((stream, features));
            }

            let step = select_step(features.as_ref(), tls_done, &self.config)?;
            debug!("Selected {:?}", step);
            let (next, outcome) = step
                .attempt(stream, connector, &self.config, context, credentials)
                .await?;
            stream = next;
            match (step, outcome) {
                (_, StepOutcome::Established) => return Ok((stream, features)),
                (SecurityStep::StartTls, StepOutcome::Restart) => tls_done = true,
                (_, StepOutcome::Restart) => authenticated = true,
            }
        }
    }
}
