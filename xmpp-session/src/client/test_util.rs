// Copyright (c) 2024 Jonas Schäfer <jonas@zombofant.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A scripted server on the other end of an in-memory pipe.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use minidom::Element;
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio_util::codec::FramedRead;

use crate::connect::{BoxedIo, ServerConnector};
use crate::proto::{Packet, XmppCodec, XmppStream};
use crate::Error;

pub(crate) const DOMAIN: &str = "example.org";

/// Honour `RUST_LOG` in tests, e.g. `RUST_LOG=xmpp_session=trace`.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Hands out one end of a duplex pipe; StartTLS leaves the bytes as they
/// are and only counts the upgrade.
pub(crate) struct ScriptedConnector {
    io: Mutex<Option<DuplexStream>>,
    pub upgrades: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new() -> (ScriptedConnector, Server) {
        init_logging();
        let (client, server) = tokio::io::duplex(65536);
        let connector = ScriptedConnector {
            io: Mutex::new(Some(client)),
            upgrades: Arc::new(AtomicUsize::new(0)),
        };
        (connector, Server::new(server))
    }

    pub fn upgrades(&self) -> usize {
        self.upgrades.load(Ordering::SeqCst)
    }
}

impl ServerConnector for ScriptedConnector {
    async fn connect(&self, _host: &str, _port: u16) -> Result<BoxedIo, Error> {
        let io = self.io.lock().unwrap().take();
        match io {
            Some(io) => Ok(Box::new(io)),
            None => Err(Error::Disconnected),
        }
    }

    async fn starttls(&self, io: BoxedIo, _domain: &str) -> Result<BoxedIo, Error> {
        self.upgrades.fetch_add(1, Ordering::SeqCst);
        Ok(io)
    }
}

/// A fresh client stream together with the server end.
pub(crate) fn pipe() -> (XmppStream, Server) {
    init_logging();
    let (client, server) = tokio::io::duplex(65536);
    (XmppStream::new(Box::new(client)), Server::new(server))
}

pub(crate) struct Server {
    reader: FramedRead<ReadHalf<DuplexStream>, XmppCodec>,
    writer: WriteHalf<DuplexStream>,
}

impl Server {
    pub fn new(io: DuplexStream) -> Server {
        let (reader, writer) = tokio::io::split(io);
        Server {
            reader: FramedRead::new(reader, XmppCodec::new()),
            writer,
        }
    }

    pub async fn write(&mut self, data: &str) {
        self.writer.write_all(data.as_bytes()).await.unwrap();
    }

    pub async fn header(&mut self) -> BTreeMap<String, String> {
        match self.reader.next().await {
            Some(Ok(Packet::StreamStart(attrs))) => attrs,
            other => panic!("expected a stream header, got {:?}", other),
        }
    }

    pub async fn element(&mut self) -> Element {
        match self.reader.next().await {
            Some(Ok(Packet::Stanza(elem))) => elem,
            other => panic!("expected an element, got {:?}", other),
        }
    }

    pub async fn stream_end(&mut self) {
        match self.reader.next().await {
            Some(Ok(Packet::StreamEnd)) | None => (),
            other => panic!("expected the end of the stream, got {:?}", other),
        }
    }

    /// Read the client's header and answer with an XMPP 1.0 header and
    /// `features`.
    pub async fn open(&mut self, id: &str, features: &str) -> BTreeMap<String, String> {
        let attrs = self.header().await;
        self.write(&format!(
            "<?xml version='1.0'?><stream:stream xmlns='jabber:client' xmlns:stream='http://etherx.jabber.org/streams' id='{}' from='{}' version='1.0'>",
            id, DOMAIN
        ))
        .await;
        self.write(&format!("<stream:features>{}</stream:features>", features))
            .await;
        attrs
    }

    /// Script a PLAIN login followed by resource binding to `jid`.
    pub async fn accept_session(&mut self, jid: &str) {
        self.open(
            "s1",
            "<mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><mechanism>PLAIN</mechanism></mechanisms>",
        )
        .await;
        self.element().await;
        self.write("<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>")
            .await;
        self.open("s2", "<bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/>")
            .await;
        let iq = self.element().await;
        self.reply(
            &iq,
            &format!(
                "<bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'><jid>{}</jid></bind>",
                jid
            ),
        )
        .await;
    }

    /// Answer the pending request `iq` with `payload`.
    pub async fn reply(&mut self, iq: &Element, payload: &str) {
        let id = iq.attr("id").unwrap();
        self.write(&format!("<iq type='result' id='{}'>{}</iq>", id, payload))
            .await;
    }

    /// Answer the pending request `iq` with an error.
    pub async fn reply_error(&mut self, iq: &Element, error: &str) {
        let id = iq.attr("id").unwrap();
        self.write(&format!("<iq type='error' id='{}'>{}</iq>", id, error))
            .await;
    }
}
