// Copyright (c) 2019 Emmanuel Gil Peyrot <linkmauve@linkmauve.fr>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::mem;
use core::time::Duration;
use std::sync::{Arc, RwLock};

use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::connect::{ServerConnector, TcpServerConnector};
use crate::error::Error;
use crate::proto::XmppStream;
use crate::Stanza;

use self::context::SessionContext;
use self::credentials::Credentials;
use self::driver::{ConnectionDriver, Listener, Listeners, StanzaWriter};
use self::features::FeatureSet;
use self::handshake::HandshakeEngine;
use self::queue::ReplyQueue;

mod bind;
pub(crate) mod context;
pub(crate) mod credentials;
pub(crate) mod driver;
pub(crate) mod features;
pub(crate) mod handshake;
mod iq;
pub(crate) mod queue;
pub(crate) mod security;

#[cfg(test)]
pub(crate) mod test_util;

/// Cheap handle for sending on an established session.
///
/// Listeners get one with every stanza so that they can answer it.
#[derive(Clone)]
pub struct ClientHandle {
    writer: Arc<StanzaWriter>,
    queue: ReplyQueue,
    reply_timeout: Option<Duration>,
}

impl ClientHandle {
    pub(crate) fn new(
        writer: StanzaWriter,
        queue: ReplyQueue,
        reply_timeout: Option<Duration>,
    ) -> ClientHandle {
        ClientHandle {
            writer: Arc::new(writer),
            queue,
            reply_timeout,
        }
    }

    /// Send a stanza without waiting for anything but the write.
    ///
    /// An ID is assigned if the stanza has none.
    pub async fn send<S: Into<Stanza>>(&self, stanza: S) -> Result<(), Error> {
        self.queue
            .enqueue(&self.writer, stanza.into(), false)
            .await
            .map(|_| ())
    }

    /// Send a stanza and wait for the inbound stanza with the same ID.
    ///
    /// `timeout` falls back to the configured reply timeout; with neither,
    /// this waits until the reply arrives or the session ends.
    pub async fn send_and_wait<S: Into<Stanza>>(
        &self,
        stanza: S,
        timeout: Option<Duration>,
    ) -> Result<Stanza, Error> {
        let token = self
            .queue
            .enqueue(&self.writer, stanza.into(), true)
            .await?
            .ok_or(Error::InvalidState)?;
        Ok(self.queue.wait(token, timeout.or(self.reply_timeout)).await?)
    }

    /// The reply queue of this session.
    pub fn queue(&self) -> &ReplyQueue {
        &self.queue
    }
}

enum State {
    /// Transport open, handshake not run yet.
    Connected(XmppStream),
    Online {
        handle: ClientHandle,
        reader: JoinHandle<Result<(), Error>>,
    },
    Closed,
}

/// XMPP client connection and state
///
/// [`Client::connect`] opens the transport, [`Client::authenticate`] runs
/// the handshake and starts the reader task. Stanzas are then sent with
/// [`Client::send`] and [`Client::send_and_wait`]; everything nobody waits
/// for goes to the registered [`Listener`]s.
pub struct Client<C: ServerConnector = TcpServerConnector> {
    connector: C,
    config: Config,
    state: State,
    context: SessionContext,
    features: Option<FeatureSet>,
    listeners: Listeners,
}

impl<C: ServerConnector> Client<C> {
    /// Open the transport to `config.host`.
    pub async fn connect(connector: C, config: Config) -> Result<Self, Error> {
        debug!("Connecting to {}:{}", config.host, config.port);
        let io = connector.connect(&config.host, config.port).await?;
        Ok(Client {
            context: SessionContext::new(config.domain()),
            connector,
            config,
            state: State::Connected(XmppStream::new(io)),
            features: None,
            listeners: Arc::new(RwLock::new(Vec::new())),
        })
    }

    /// Run the handshake and start routing inbound stanzas.
    ///
    /// Any failure closes the connection.
    pub async fn authenticate(&mut self, mut credentials: Credentials) -> Result<(), Error> {
        let stream = match mem::replace(&mut self.state, State::Closed) {
            State::Connected(stream) => stream,
            other => {
                self.state = other;
                return Err(Error::InvalidState);
            }
        };

        let engine = HandshakeEngine::new(self.config.handshake());
        let (stream, features) = engine
            .establish(stream, &self.connector, &mut self.context, &mut credentials)
            .await?;
        if let Some(jid) = self.context.jid() {
            debug!("Session established as {}", jid);
        }
        self.features = features;

        let (sink, reader) = stream.split();
        let handle = ClientHandle::new(
            StanzaWriter::new(sink),
            ReplyQueue::new(),
            self.config.reply_timeout,
        );
        let driver = ConnectionDriver::new(handle.clone(), self.listeners.clone());
        let reader = tokio::spawn(driver.run(reader));
        self.state = State::Online { handle, reader };
        Ok(())
    }

    /// A handle for sending, usable from other tasks.
    pub fn handle(&self) -> Result<ClientHandle, Error> {
        match self.state {
            State::Online { ref handle, .. } => Ok(handle.clone()),
            _ => Err(Error::InvalidState),
        }
    }

    /// See [`ClientHandle::send_and_wait`].
    pub async fn send_and_wait<S: Into<Stanza>>(
        &self,
        stanza: S,
        timeout: Option<Duration>,
    ) -> Result<Stanza, Error> {
        self.handle()?.send_and_wait(stanza, timeout).await
    }

    /// See [`ClientHandle::send`].
    pub async fn send<S: Into<Stanza>>(&self, stanza: S) -> Result<(), Error> {
        self.handle()?.send(stanza).await
    }

    /// Register a listener for unclaimed stanzas.
    ///
    /// Listeners are called in registration order and may be added before
    /// or after authentication.
    pub fn add_listener<L: Listener>(&self, listener: L) {
        let mut listeners = match self.listeners.write() {
            Ok(listeners) => listeners,
            Err(poisoned) => poisoned.into_inner(),
        };
        listeners.push(Arc::new(listener));
    }

    /// Release all waiters, end the stream and wait for the reader to
    /// finish, at most for the configured shutdown timeout.
    pub async fn disconnect(&mut self) -> Result<(), Error> {
        let result = match mem::replace(&mut self.state, State::Closed) {
            State::Connected(mut stream) => stream.close().await,
            State::Online { handle, mut reader } => {
                handle.queue.shutdown();
                let closed = handle.writer.close().await;
                match tokio::time::timeout(self.config.shutdown_timeout, &mut reader).await {
                    Ok(Ok(Ok(()))) => (),
                    Ok(Ok(Err(e))) => debug!("Reader ended with {}", e),
                    Ok(Err(e)) => warn!("Reader task failed: {}", e),
                    Err(_) => {
                        warn!("Reader did not finish in time, aborting it");
                        reader.abort();
                    }
                }
                closed
            }
            State::Closed => Ok(()),
        };
        self.context.reset();
        self.features = None;
        match result {
            Err(Error::Disconnected) => Ok(()),
            result => result,
        }
    }

    /// What is known about the session so far.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Features of the last stream generation.
    pub fn features(&self) -> Option<&FeatureSet> {
        self.features.as_ref()
    }

    /// Whether the transport is still open.
    pub fn is_connected(&self) -> bool {
        match self.state {
            State::Connected(_) => true,
            State::Online { ref reader, .. } => !reader.is_finished(),
            State::Closed => false,
        }
    }
}

impl<C: ServerConnector> Drop for Client<C> {
    fn drop(&mut self) {
        if let State::Online { ref handle, ref reader } = self.state {
            handle.queue.shutdown();
            reader.abort();
        }
    }
}
