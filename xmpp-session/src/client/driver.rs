// Copyright (c) 2024 Jonas Schäfer <jonas@zombofant.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The single reader of an established session, and the lock all writers
//! share.

use core::ops::ControlFlow;
use std::sync::{Arc, RwLock};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use tokio::sync::Mutex;

use crate::client::queue::ReplyQueue;
use crate::client::ClientHandle;
use crate::error::{Error, ProtocolError};
use crate::ns;
use crate::proto::{stream_error_condition, Packet, XmppStream};
use crate::stanza::Stanza;

/// Receives the inbound stanzas nobody waits for.
///
/// Callbacks run on the reader task: a listener that blocks stalls the
/// whole session. Replies should go through a spawned task using the
/// [`ClientHandle`].
pub trait Listener: Send + Sync + 'static {
    /// An unclaimed stanza arrived.
    fn on_stanza(&self, stanza: &Stanza, client: &ClientHandle);

    /// The session ended, with the error that ended it if any.
    fn closed(&self, error: Option<&Error>) {
        let _ = error;
    }
}

pub(crate) type Listeners = Arc<RwLock<Vec<Arc<dyn Listener>>>>;

/// Write half of the stream behind a lock, so that concurrent senders
/// never interleave partial writes.
pub(crate) struct StanzaWriter {
    sink: Mutex<SplitSink<XmppStream, Packet>>,
}

impl StanzaWriter {
    pub fn new(sink: SplitSink<XmppStream, Packet>) -> StanzaWriter {
        StanzaWriter {
            sink: Mutex::new(sink),
        }
    }

    pub async fn send(&self, stanza: Stanza) -> Result<(), Error> {
        let mut sink = self.sink.lock().await;
        sink.send(Packet::Stanza(stanza.into_element())).await
    }

    /// Send `</stream:stream>` and close our side of the transport.
    pub async fn close(&self) -> Result<(), Error> {
        let mut sink = self.sink.lock().await;
        sink.send(Packet::StreamEnd).await?;
        sink.close().await
    }
}

pub(crate) struct ConnectionDriver {
    client: ClientHandle,
    listeners: Listeners,
}

impl ConnectionDriver {
    pub fn new(client: ClientHandle, listeners: Listeners) -> ConnectionDriver {
        ConnectionDriver { client, listeners }
    }

    fn queue(&self) -> &ReplyQueue {
        self.client.queue()
    }

    fn listeners(&self) -> Vec<Arc<dyn Listener>> {
        match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn dispatch(&self, stanza: Stanza) {
        let stanza = match self.queue().deliver(stanza) {
            ControlFlow::Break(()) => return,
            ControlFlow::Continue(stanza) => stanza,
        };
        if stanza.is_error() {
            warn!(
                "Unsolicited error <{}/> with id {:?}",
                stanza.name(),
                stanza.id()
            );
        }
        let listeners = self.listeners();
        if listeners.is_empty() {
            debug!("No listener for <{}/>, dropping it", stanza.name());
        }
        for listener in listeners {
            listener.on_stanza(&stanza, &self.client);
        }
    }

    /// Read until the stream ends, routing every stanza in wire order.
    ///
    /// When the loop ends the reply queue is shut down and every listener
    /// is told why.
    pub async fn run(self, mut reader: SplitStream<XmppStream>) -> Result<(), Error> {
        let result = loop {
            match reader.next().await {
                Some(Ok(Packet::Stanza(elem))) if elem.is("error", ns::STREAM) => {
                    let condition = stream_error_condition(&elem);
                    warn!("Received stream error: {}", condition);
                    break Err(ProtocolError::StreamError(condition).into());
                }
                Some(Ok(Packet::Stanza(elem))) => self.dispatch(Stanza::from(elem)),
                Some(Ok(Packet::StreamStart(_))) => {
                    break Err(ProtocolError::InvalidStreamStart.into())
                }
                Some(Ok(Packet::StreamEnd)) | None => {
                    debug!("Stream closed by the server");
                    break Ok(());
                }
                Some(Err(e)) => break Err(e),
            }
        };

        self.queue().shutdown();
        for listener in self.listeners() {
            listener.closed(result.as_ref().err());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use minidom::Element;
    use tokio::sync::mpsc;

    use crate::client::test_util::pipe;

    struct Recorder {
        tag: &'static str,
        seen: mpsc::UnboundedSender<(&'static str, Option<String>)>,
    }

    impl Listener for Recorder {
        fn on_stanza(&self, stanza: &Stanza, _client: &ClientHandle) {
            self.seen
                .send((self.tag, stanza.id().map(str::to_owned)))
                .unwrap();
        }

        fn closed(&self, error: Option<&Error>) {
            self.seen
                .send((self.tag, error.map(|e| e.to_string())))
                .unwrap();
        }
    }

    #[tokio::test]
    async fn routes_in_order() {
        let (stream, mut server) = pipe();
        let (sink, reader) = stream.split();
        let client = ClientHandle::new(StanzaWriter::new(sink), ReplyQueue::new(), None);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listeners: Listeners = Arc::new(RwLock::new(vec![
            Arc::new(Recorder {
                tag: "first",
                seen: tx.clone(),
            }) as Arc<dyn Listener>,
            Arc::new(Recorder {
                tag: "second",
                seen: tx,
            }),
        ]));
        let token = client.queue().register("r1").unwrap();

        server
            .write("<message id='m1'/><iq type='result' id='r1'/><presence id='p1'/></stream:stream>")
            .await;
        let driver = ConnectionDriver::new(client.clone(), listeners);
        driver.run(reader).await.unwrap();

        let reply = token.await.unwrap();
        assert_eq!(reply.id(), Some("r1"));
        let mut seen = Vec::new();
        while let Ok(entry) = rx.try_recv() {
            seen.push(entry);
        }
        assert_eq!(
            seen,
            vec![
                ("first", Some("m1".to_owned())),
                ("second", Some("m1".to_owned())),
                ("first", Some("p1".to_owned())),
                ("second", Some("p1".to_owned())),
                ("first", None),
                ("second", None),
            ]
        );
        assert!(client.queue().is_closed());
    }

    #[tokio::test]
    async fn stream_error_ends_session() {
        let (stream, mut server) = pipe();
        let (sink, reader) = stream.split();
        let client = ClientHandle::new(StanzaWriter::new(sink), ReplyQueue::new(), None);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listeners: Listeners = Arc::new(RwLock::new(vec![Arc::new(Recorder {
            tag: "only",
            seen: tx,
        }) as Arc<dyn Listener>]));
        let pending = client.queue().register("r1").unwrap();

        server
            .write("<stream:error><conflict xmlns='urn:ietf:params:xml:ns:xmpp-streams'/></stream:error>")
            .await;
        let result = ConnectionDriver::new(client.clone(), listeners)
            .run(reader)
            .await;

        match result {
            Err(Error::Protocol(ProtocolError::StreamError(condition))) => {
                assert_eq!(condition, "conflict")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            pending.await.unwrap_err(),
            crate::client::queue::QueueError::Cancelled
        );
        let (tag, error) = rx.try_recv().unwrap();
        assert_eq!(tag, "only");
        assert!(error.unwrap().contains("conflict"));
    }

    #[tokio::test]
    async fn writes_are_whole() {
        let (stream, mut server) = pipe();
        let (sink, _reader) = stream.split();
        let writer = Arc::new(StanzaWriter::new(sink));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let writer = writer.clone();
                tokio::spawn(async move {
                    let body = Element::builder("body", ns::JABBER_CLIENT)
                        .append("x".repeat(1024))
                        .build();
                    let message = Element::builder("message", ns::JABBER_CLIENT)
                        .attr("id", format!("m{}", i))
                        .append(body)
                        .build();
                    writer.send(message.into()).await.unwrap();
                })
            })
            .collect();
        let mut ids = Vec::new();
        for _ in 0..16 {
            let message = server.element().await;
            let body = message.get_child("body", ns::JABBER_CLIENT).unwrap();
            assert_eq!(body.text().len(), 1024);
            ids.push(message.attr("id").unwrap().to_owned());
        }
        for task in tasks {
            task.await.unwrap();
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 16);

        writer.close().await.unwrap();
        server.stream_end().await;
    }
}
