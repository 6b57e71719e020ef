// Copyright (c) 2017 Astro <astro@spaceboyz.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use base64::{engine::general_purpose::STANDARD as Base64, Engine};
use log::debug;
use minidom::Element;
use sasl::client::mechanisms::{DigestMd5, Plain};
use sasl::client::Mechanism;
use sasl::common::Credentials as SaslCredentials;

use crate::client::context::SessionContext;
use crate::client::credentials::Credentials;
use crate::client::security::MechanismKind;
use crate::error::{AuthError, Error, ProtocolError};
use crate::ns;
use crate::parsers::sasl::{Challenge, Failure, Response, Success};
use crate::proto::XmppStream;

/// Service name DIGEST-MD5 binds its `digest-uri` to.
const SERVICE: &str = "xmpp";

/// `<auth/>` is built by hand: the typed mechanism attribute has no
/// DIGEST-MD5.
fn auth(mechanism: &str, initial: &[u8]) -> Element {
    let data = if initial.is_empty() {
        None
    } else {
        Some(Base64.encode(initial))
    };
    Element::builder("auth", ns::SASL)
        .attr("mechanism", mechanism)
        .append_all(data)
        .build()
}

pub(crate) fn mechanism(
    kind: MechanismKind,
    context: &SessionContext,
    credentials: &Credentials,
) -> Result<Box<dyn Mechanism + Send>, Error> {
    let secret = credentials.secret().ok_or(AuthError::NoSecret)?;
    let creds = SaslCredentials::default()
        .with_username(credentials.username())
        .with_password(secret);
    let host = context.host.as_deref().unwrap_or_default();
    let mechanism: Box<dyn Mechanism + Send> = match kind {
        MechanismKind::DigestMd5 => Box::new(DigestMd5::from_credentials(creds, SERVICE, host)?),
        MechanismKind::Plain => Box::new(Plain::from_credentials(creds)?),
    };
    Ok(mechanism)
}

pub(crate) async fn authenticate(
    stream: &mut XmppStream,
    kind: MechanismKind,
    context: &SessionContext,
    credentials: &Credentials,
) -> Result<(), Error> {
    let mechanism = mechanism(kind, context, credentials)?;
    run(stream, mechanism).await
}

/// Drive one SASL exchange to `<success/>` or `<failure/>`.
pub(crate) async fn run(
    stream: &mut XmppStream,
    mut mechanism: Box<dyn Mechanism + Send>,
) -> Result<(), Error> {
    debug!("Authenticating with SASL {}", mechanism.name());
    let initial = mechanism.initial();
    stream
        .send_stanza(auth(mechanism.name(), &initial))
        .await?;

    loop {
        let elem = stream.recv_element().await?;
        if elem.is("challenge", ns::SASL) {
            let challenge = Challenge::try_from(elem).map_err(ProtocolError::from)?;
            let response = mechanism.response(&challenge.data)?;
            stream.send_stanza(Response { data: response }).await?;
        } else if elem.is("success", ns::SASL) {
            let success = Success::try_from(elem).map_err(ProtocolError::from)?;
            mechanism.success(&success.data)?;
            debug!("SASL {} succeeded", mechanism.name());
            return Ok(());
        } else if elem.is("failure", ns::SASL) {
            let failure = Failure::try_from(elem).map_err(ProtocolError::from)?;
            return Err(AuthError::Fail(failure.defined_condition).into());
        } else {
            return Err(ProtocolError::UnexpectedElement(elem.name().to_owned()).into());
        }
    }
}
