// Copyright (c) 2017 Astro <astro@spaceboyz.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! [XEP-0078](https://xmpp.org/extensions/xep-0078.html) non-SASL
//! authentication.

use log::debug;
use minidom::Element;
use sha1::{Digest, Sha1};

use crate::client::context::SessionContext;
use crate::client::credentials::Credentials;
use crate::client::handshake::HandshakeConfig;
use crate::client::iq::{exchange, IqRequest, IqResponse};
use crate::error::{AuthError, Error, Rejection};
use crate::jid::Jid;
use crate::ns;
use crate::proto::XmppStream;
use crate::stanza_error::StanzaError;

/// `hex(sha1(stream_id ++ secret))`
pub(crate) fn digest(stream_id: &str, secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(stream_id.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn field(name: &str, value: &str) -> Element {
    Element::builder(name, ns::AUTH).append(value).build()
}

fn rejected(error: StanzaError) -> Error {
    AuthError::Rejected(Rejection::Error(error)).into()
}

pub(crate) async fn authenticate(
    stream: &mut XmppStream,
    config: &HandshakeConfig,
    context: &mut SessionContext,
    credentials: &Credentials,
) -> Result<(), Error> {
    let secret = credentials.secret().ok_or(AuthError::NoSecret)?;
    let username = credentials.username();
    let resource = match credentials.resource() {
        "" => config.default_resource.as_str(),
        resource => resource,
    };
    let to = context.host.as_deref().map(Jid::new).transpose()?;

    let fields = Element::builder("query", ns::AUTH)
        .append(field("username", username))
        .build();
    let offered = match exchange(stream, to.as_ref(), IqRequest::Get(fields)).await? {
        IqResponse::Result(payload) => payload.filter(|query| query.is("query", ns::AUTH)),
        IqResponse::Error(error) => return Err(rejected(error)),
    };

    let offers = |name: &str| {
        offered
            .as_ref()
            .map_or(false, |query| query.get_child(name, ns::AUTH).is_some())
    };
    let proof = if offers("digest") {
        let stream_id = context.stream_id.as_deref().unwrap_or_default();
        field("digest", &digest(stream_id, secret))
    } else if offers("password") {
        field("password", secret)
    } else {
        return Err(AuthError::Rejected(Rejection::NoSupportedMethods).into());
    };
    debug!("Legacy authentication using <{}/>", proof.name());

    let query = Element::builder("query", ns::AUTH)
        .append(field("username", username))
        .append(proof)
        .append(field("resource", resource))
        .build();
    if let IqResponse::Error(error) = exchange(stream, to.as_ref(), IqRequest::Set(query)).await? {
        return Err(rejected(error));
    }

    context.username = Some(username.to_owned());
    context.resource = Some(resource.to_owned());
    Ok(())
}
