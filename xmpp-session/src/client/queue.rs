// Copyright (c) 2025 Jonas Schäfer <jonas@zombofant.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Correlation of outbound requests with their inbound replies.

use core::fmt;
use core::future::Future;
use core::ops::ControlFlow;
use core::pin::Pin;
use core::task::{Context, Poll};
use core::time::Duration;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::sync::{Arc, Mutex, Weak};

use log::{debug, trace};
use tokio::sync::oneshot;

use crate::client::driver::StanzaWriter;
use crate::stanza::Stanza;
use crate::Error;

/// Ways waiting for a reply can end without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// No reply arrived in time.
    Timeout,
    /// The queue was shut down, usually because the connection closed.
    Cancelled,
    /// A reply is already pending for this id.
    DuplicateId(String),
}

impl fmt::Display for QueueError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueueError::Timeout => write!(fmt, "timed out waiting for a reply"),
            QueueError::Cancelled => write!(fmt, "reply queue shut down"),
            QueueError::DuplicateId(id) => write!(fmt, "a reply to {:?} is already pending", id),
        }
    }
}

impl StdError for QueueError {}

#[derive(Default)]
struct Table {
    pending: BTreeMap<String, oneshot::Sender<Stanza>>,
    closed: bool,
}

struct EntryHandle {
    id: String,
    table: Weak<Mutex<Table>>,
}

impl Drop for EntryHandle {
    fn drop(&mut self) {
        let Some(table) = self.table.upgrade() else {
            return;
        };
        let Ok(mut table) = table.lock() else {
            return;
        };
        table.pending.remove(&self.id);
    }
}

/// Handle for awaiting the reply to one request.
///
/// Awaiting the token directly waits without a timeout; see
/// [`ReplyQueue::wait`] for the bounded form. Dropping the token removes
/// the pending entry.
pub struct ReplyToken {
    entry: EntryHandle,
    inner: oneshot::Receiver<Stanza>,
}

impl ReplyToken {
    /// The correlation id this token waits for.
    pub fn id(&self) -> &str {
        &self.entry.id
    }
}

impl fmt::Debug for ReplyToken {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("ReplyToken")
            .field("id", &self.entry.id)
            .finish()
    }
}

impl Future for ReplyToken {
    type Output = Result<Stanza, QueueError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // The sender is dropped by `shutdown()`.
        Pin::new(&mut self.inner)
            .poll(cx)
            .map(|result| result.map_err(|_| QueueError::Cancelled))
    }
}

/// Table of requests waiting for their reply.
///
/// Cloning yields another handle to the same table.
#[derive(Clone, Default)]
pub struct ReplyQueue {
    table: Arc<Mutex<Table>>,
}

impl fmt::Debug for ReplyQueue {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let table = self.table.lock().unwrap();
        fmt.debug_struct("ReplyQueue")
            .field("pending", &table.pending.keys().collect::<Vec<_>>())
            .field("closed", &table.closed)
            .finish()
    }
}

impl ReplyQueue {
    /// Create a new empty queue.
    pub fn new() -> ReplyQueue {
        ReplyQueue::default()
    }

    /// Start tracking a reply to `id`.
    pub fn register<I: Into<String>>(&self, id: I) -> Result<ReplyToken, QueueError> {
        let id = id.into();
        let mut table = self.table.lock().unwrap();
        if table.closed {
            return Err(QueueError::Cancelled);
        }
        if table.pending.contains_key(&id) {
            return Err(QueueError::DuplicateId(id));
        }
        let (tx, rx) = oneshot::channel();
        table.pending.insert(id.clone(), tx);
        trace!("Waiting for a reply to {}", id);
        Ok(ReplyToken {
            entry: EntryHandle {
                id,
                table: Arc::downgrade(&self.table),
            },
            inner: rx,
        })
    }

    /// Write `stanza` and, if `expect_reply`, register for its reply.
    ///
    /// The stanza gets an id if it has none. Registration happens before
    /// the write so that even an immediate reply finds its entry.
    pub(crate) async fn enqueue(
        &self,
        writer: &StanzaWriter,
        mut stanza: Stanza,
        expect_reply: bool,
    ) -> Result<Option<ReplyToken>, Error> {
        if self.is_closed() {
            return Err(QueueError::Cancelled.into());
        }
        let id = stanza.ensure_id().to_owned();
        let token = if expect_reply {
            Some(self.register(id)?)
        } else {
            None
        };
        // On failure the token is dropped and takes its entry with it.
        writer.send(stanza).await?;
        Ok(token)
    }

    /// Wait for the reply `token` stands for.
    ///
    /// Returns exactly one of the reply, [`QueueError::Timeout`] or
    /// [`QueueError::Cancelled`]. The entry is gone from the table in all
    /// three cases. A reply delivered before [`ReplyQueue::shutdown`] is
    /// still returned.
    pub async fn wait(
        &self,
        token: ReplyToken,
        timeout: Option<Duration>,
    ) -> Result<Stanza, QueueError> {
        match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, token).await {
                Ok(result) => result,
                Err(_) => Err(QueueError::Timeout),
            },
            None => token.await,
        }
    }

    /// Hand an inbound stanza to whoever waits for it.
    ///
    /// Returns the stanza untouched if nobody does. Requests (`get` and
    /// `set` iqs) are never treated as replies.
    pub fn deliver(&self, stanza: Stanza) -> ControlFlow<(), Stanza> {
        let is_request = stanza.is_iq()
            && matches!(stanza.element().attr("type"), Some("get") | Some("set"));
        let id = match stanza.id() {
            Some(id) if !is_request => id.to_owned(),
            _ => return ControlFlow::Continue(stanza),
        };
        let mut table = self.table.lock().unwrap();
        let Some(sender) = table.pending.remove(&id) else {
            trace!("No pending request for {}", id);
            return ControlFlow::Continue(stanza);
        };
        match sender.send(stanza) {
            Ok(()) => ControlFlow::Break(()),
            // The waiter gave up while we were looking it up.
            Err(stanza) => ControlFlow::Continue(stanza),
        }
    }

    /// Close the queue and release every waiter with
    /// [`QueueError::Cancelled`]. Idempotent.
    pub fn shutdown(&self) {
        let mut table = self.table.lock().unwrap();
        if !table.closed {
            debug!(
                "Shutting down reply queue, {} requests pending",
                table.pending.len()
            );
        }
        table.closed = true;
        table.pending.clear();
    }

    /// Whether [`ReplyQueue::shutdown`] has been called.
    pub fn is_closed(&self) -> bool {
        self.table.lock().unwrap().closed
    }

    /// Number of requests still waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.table.lock().unwrap().pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::StreamExt;
    use minidom::Element;

    use crate::client::test_util::pipe;
    use crate::ns;

    fn iq(type_: &str, id: &str) -> Stanza {
        Element::builder("iq", ns::JABBER_CLIENT)
            .attr("type", type_)
            .attr("id", id)
            .build()
            .into()
    }

    #[tokio::test]
    async fn reply_by_id() {
        let (stream, mut server) = pipe();
        let (sink, _reader) = stream.split();
        let writer = StanzaWriter::new(sink);
        let queue = ReplyQueue::new();

        let token = queue
            .enqueue(&writer, iq("get", "id_001"), true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token.id(), "id_001");
        assert_eq!(server.element().await.attr("id"), Some("id_001"));
        assert_eq!(queue.pending_count(), 1);

        let reply = iq("result", "id_001");
        assert_eq!(queue.deliver(reply.clone()), ControlFlow::Break(()));
        assert_eq!(queue.wait(token, None).await.unwrap(), reply);
        assert_eq!(queue.pending_count(), 0);
    }

    #[tokio::test]
    async fn assigns_missing_id() {
        let (stream, mut server) = pipe();
        let (sink, _reader) = stream.split();
        let writer = StanzaWriter::new(sink);
        let queue = ReplyQueue::new();

        let request = Element::builder("iq", ns::JABBER_CLIENT)
            .attr("type", "get")
            .build();
        let token = queue
            .enqueue(&writer, request.into(), true)
            .await
            .unwrap()
            .unwrap();
        let sent = server.element().await;
        assert_eq!(sent.attr("id"), Some(token.id()));

        let none = queue.enqueue(&writer, iq("set", "x"), false).await.unwrap();
        assert!(none.is_none());
        assert_eq!(queue.pending_count(), 1);
    }

    #[test]
    fn unknown_id_is_returned() {
        let queue = ReplyQueue::new();
        let _token = queue.register("a").unwrap();
        let stanza = iq("result", "b");
        assert_eq!(queue.deliver(stanza.clone()), ControlFlow::Continue(stanza));
        assert_eq!(queue.pending_count(), 1);

        let unidentified: Stanza = Element::builder("message", ns::JABBER_CLIENT)
            .build()
            .into();
        assert!(queue.deliver(unidentified).is_continue());
    }

    #[test]
    fn requests_are_not_replies() {
        let queue = ReplyQueue::new();
        let _token = queue.register("a").unwrap();
        assert!(queue.deliver(iq("get", "a")).is_continue());
        assert!(queue.deliver(iq("set", "a")).is_continue());
        assert!(queue.deliver(iq("error", "a")).is_break());
    }

    #[tokio::test]
    async fn each_waiter_gets_its_own_reply() {
        let queue = ReplyQueue::new();
        let ids: Vec<String> = (0..8).map(|i| format!("req{}", i)).collect();
        let tokens: Vec<_> = ids.iter().map(|id| queue.register(id.as_str()).unwrap()).collect();

        for id in ids.iter().rev() {
            assert!(queue.deliver(iq("result", id)).is_break());
        }
        for (id, token) in ids.iter().zip(tokens) {
            let reply = queue.wait(token, None).await.unwrap();
            assert_eq!(reply.id(), Some(id.as_str()));
        }
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn duplicate_id() {
        let queue = ReplyQueue::new();
        let token = queue.register("a").unwrap();
        assert_eq!(
            queue.register("a").unwrap_err(),
            QueueError::DuplicateId("a".to_owned())
        );
        drop(token);
        assert_eq!(queue.pending_count(), 0);
        queue.register("a").unwrap();
    }

    #[tokio::test]
    async fn timeout_removes_entry() {
        let queue = ReplyQueue::new();
        let token = queue.register("slow").unwrap();
        assert_eq!(
            queue
                .wait(token, Some(Duration::from_millis(10)))
                .await
                .unwrap_err(),
            QueueError::Timeout
        );
        assert_eq!(queue.pending_count(), 0);
        assert!(queue.deliver(iq("result", "slow")).is_continue());
    }

    #[tokio::test]
    async fn shutdown_releases_all_waiters() {
        let queue = ReplyQueue::new();
        let waiters: Vec<_> = (0..4)
            .map(|i| {
                let token = queue.register(format!("w{}", i)).unwrap();
                let queue = queue.clone();
                tokio::spawn(async move { queue.wait(token, None).await })
            })
            .collect();
        tokio::task::yield_now().await;

        queue.shutdown();
        queue.shutdown();
        for waiter in waiters {
            assert_eq!(waiter.await.unwrap().unwrap_err(), QueueError::Cancelled);
        }
        assert_eq!(queue.pending_count(), 0);
        assert_eq!(queue.register("late").unwrap_err(), QueueError::Cancelled);
    }

    #[tokio::test]
    async fn closed_queue_fails_fast() {
        let (stream, _server) = pipe();
        let (sink, _reader) = stream.split();
        let writer = StanzaWriter::new(sink);
        let queue = ReplyQueue::new();
        let token = queue.register("a").unwrap();
        queue.shutdown();

        assert_eq!(queue.wait(token, None).await.unwrap_err(), QueueError::Cancelled);
        assert!(matches!(
            queue.enqueue(&writer, iq("get", "b"), true).await,
            Err(Error::Queue(QueueError::Cancelled))
        ));
    }

    #[tokio::test]
    async fn reply_delivered_before_shutdown_is_kept() {
        let queue = ReplyQueue::new();
        let token = queue.register("r1").unwrap();
        let reply = iq("result", "r1");
        assert!(queue.deliver(reply.clone()).is_break());
        queue.shutdown();

        assert_eq!(queue.wait(token, None).await.unwrap(), reply);
        assert_eq!(queue.pending_count(), 0);
    }
}
