// Copyright (c) 2025 Jonas Schäfer <jonas@zombofant.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! IQ round trips run directly on the stream while the handshake owns it.

use log::trace;
use minidom::Element;

use crate::error::{Error, ProtocolError};
use crate::jid::Jid;
use crate::ns;
use crate::parsers::iq::{Iq, IqType};
use crate::proto::XmppStream;
use crate::stanza::make_id;
use crate::stanza_error::StanzaError;

/// An IQ request payload
pub(crate) enum IqRequest {
    /// Payload for a `type="get"` request
    Get(Element),

    /// Payload for a `type="set"` request
    Set(Element),
}

impl From<IqRequest> for IqType {
    fn from(other: IqRequest) -> IqType {
        match other {
            IqRequest::Get(v) => Self::Get(v),
            IqRequest::Set(v) => Self::Set(v),
        }
    }
}

/// An IQ response payload
#[derive(Debug)]
pub(crate) enum IqResponse {
    /// Payload for a `type="result"` response.
    Result(Option<Element>),

    /// Payload for a `type="error"` response. Pre-XMPP 1.0 servers send
    /// errors with a bare `code`, so these go through the local table.
    Error(StanzaError),
}

/// Send a request and wait for the `result` or `error` carrying its id.
///
/// Anything else arriving in between is a protocol violation at this
/// stage of the session.
pub(crate) async fn exchange(
    stream: &mut XmppStream,
    to: Option<&Jid>,
    request: IqRequest,
) -> Result<IqResponse, Error> {
    let id = make_id();
    let iq = Iq {
        from: None,
        to: to.cloned(),
        id: id.clone(),
        payload: request.into(),
    };
    stream.send_stanza(iq).await?;

    let reply = stream.recv_element().await?;
    if !reply.is("iq", ns::JABBER_CLIENT) || reply.attr("id") != Some(id.as_str()) {
        return Err(ProtocolError::UnexpectedElement(reply.name().to_owned()).into());
    }
    trace!("Got IQ response {}", id);
    match reply.attr("type") {
        Some("result") => (),
        Some("error") => return Ok(IqResponse::Error(StanzaError::from_stanza(&reply))),
        _ => return Err(ProtocolError::UnexpectedElement(reply.name().to_owned()).into()),
    }
    match Iq::try_from(reply).map_err(ProtocolError::from)?.payload {
        IqType::Result(payload) => Ok(IqResponse::Result(payload)),
        _ => Err(ProtocolError::UnexpectedElement("iq".to_owned()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::client::test_util::pipe;
    use crate::stanza_error::DefinedCondition;

    fn query() -> Element {
        Element::builder("query", ns::AUTH).build()
    }

    #[tokio::test]
    async fn result_payload() {
        let (mut stream, mut server) = pipe();
        let to = Jid::new("example.org").unwrap();

        let client = exchange(&mut stream, Some(&to), IqRequest::Get(query()));
        let script = async {
            let iq = server.element().await;
            assert!(iq.is("iq", ns::JABBER_CLIENT));
            assert_eq!(iq.attr("type"), Some("get"));
            assert_eq!(iq.attr("to"), Some("example.org"));
            assert!(iq.get_child("query", ns::AUTH).is_some());
            server
                .reply(&iq, "<query xmlns='jabber:iq:auth'><digest/></query>")
                .await;
        };
        let (result, ()) = tokio::join!(client, script);

        match result.unwrap() {
            IqResponse::Result(Some(payload)) => assert!(payload.is("query", ns::AUTH)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn code_only_error() {
        let (mut stream, mut server) = pipe();

        let client = exchange(&mut stream, None, IqRequest::Set(query()));
        let script = async {
            let iq = server.element().await;
            assert_eq!(iq.attr("type"), Some("set"));
            assert_eq!(iq.attr("to"), None);
            server.reply_error(&iq, "<error code='406'/>").await;
        };
        let (result, ()) = tokio::join!(client, script);

        match result.unwrap() {
            IqResponse::Error(error) => {
                assert_eq!(error.defined_condition, DefinedCondition::NotAcceptable);
                assert_eq!(error.code, Some(406));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn reply_to_another_request() {
        let (mut stream, mut server) = pipe();

        let client = exchange(&mut stream, None, IqRequest::Get(query()));
        let script = async {
            server.element().await;
            server.write("<iq type='result' id='other'/>").await;
        };
        let (result, ()) = tokio::join!(client, script);

        assert!(matches!(
            result,
            Err(Error::Protocol(ProtocolError::UnexpectedElement(name))) if name == "iq"
        ));
    }
}
