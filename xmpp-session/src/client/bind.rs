// Copyright (c) 2017 Astro <astro@spaceboyz.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use log::{debug, warn};
use minidom::Element;

use crate::client::context::SessionContext;
use crate::client::credentials::Credentials;
use crate::client::features::FeatureSet;
use crate::client::iq::{exchange, IqRequest, IqResponse};
use crate::error::{Error, ProtocolError};
use crate::jid::{FullJid, Jid};
use crate::ns;
use crate::parsers::bind::{BindQuery, BindResponse};
use crate::proto::XmppStream;

/// Bind a resource after SASL, then establish the legacy session if the
/// server insists on it.
pub(crate) async fn bind(
    stream: &mut XmppStream,
    features: Option<&FeatureSet>,
    context: &mut SessionContext,
    credentials: &Credentials,
) -> Result<(), Error> {
    let features = features.cloned().unwrap_or_default();
    if !features.bind_available {
        warn!("Server offers no resource binding, keeping the requested identity");
        context.username = Some(credentials.username().to_owned());
        context.resource = Some(credentials.resource().to_owned()).filter(|r| !r.is_empty());
        return Ok(());
    }

    let resource = Some(credentials.resource())
        .filter(|resource| !resource.is_empty())
        .map(str::to_owned);
    let request = Element::from(BindQuery::new(resource));
    let jid: FullJid = match exchange(stream, None, IqRequest::Set(request)).await? {
        IqResponse::Result(Some(payload)) => BindResponse::try_from(payload)
            .map_err(|_| ProtocolError::InvalidBindResponse)?
            .into(),
        IqResponse::Result(None) => return Err(ProtocolError::InvalidBindResponse.into()),
        IqResponse::Error(error) => return Err(ProtocolError::BindFailed(error).into()),
    };
    debug!("Bound to {}", jid);
    let username = jid
        .node()
        .map_or(credentials.username(), |node| node.as_str());
    context.username = Some(username.to_owned());
    context.resource = Some(jid.resource().as_str().to_owned());

    if features.session_available {
        let to = context.host.as_deref().map(Jid::new).transpose()?;
        let session = Element::builder("session", ns::SESSION).build();
        match exchange(stream, to.as_ref(), IqRequest::Set(session)).await? {
            IqResponse::Result(_) => (),
            IqResponse::Error(error) => {
                return Err(ProtocolError::SessionFailed(error).into());
            }
        }
    }
    Ok(())
}
