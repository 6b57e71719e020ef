// Copyright (c) 2017 Astro <astro@spaceboyz.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use log::debug;
use minidom::Element;

use crate::connect::{ServerConnector, StartTlsError};
use crate::error::Error;
use crate::ns;
use crate::proto::XmppStream;

/// Performs `<starttls/>` on an XmppStream and returns a new XmppStream
/// over the encrypted connection.
///
/// The old codec is dropped with everything it buffered; only the raw
/// connection is carried over.
pub(crate) async fn negotiate<C: ServerConnector>(
    mut stream: XmppStream,
    connector: &C,
    domain: &str,
) -> Result<XmppStream, Error> {
    stream
        .send_stanza(Element::builder("starttls", ns::TLS).build())
        .await?;

    let answer = stream.recv_element().await?;
    if answer.is("failure", ns::TLS) {
        return Err(StartTlsError::Refused.into());
    }
    if !answer.is("proceed", ns::TLS) {
        return Err(StartTlsError::UnexpectedElement(answer.name().to_owned()).into());
    }

    let (io, buffered) = stream.into_inner();
    if buffered.iter().any(|b| !b.is_ascii_whitespace()) {
        return Err(StartTlsError::BufferedData.into());
    }
    debug!("Starting TLS handshake with {}", domain);
    let io = connector.starttls(io, domain).await?;
    Ok(XmppStream::new(io))
}
