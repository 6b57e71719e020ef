//! `XmppStream` provides encoding/decoding for XMPP

use bytes::BytesMut;
use futures::{
    sink::{Send, SinkExt},
    stream::StreamExt,
    task::Poll,
    Sink, Stream,
};
use minidom::Element;
use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::Context;
use tokio_util::codec::Framed;

use crate::connect::BoxedIo;
use crate::error::{Error, ProtocolError};
use crate::ns;
use crate::proto::{Packet, XmppCodec};

/// Wraps a binary stream (tokio's `AsyncRead + AsyncWrite`) to decode
/// and encode XMPP packets.
///
/// Implements `Sink + Stream`
pub struct XmppStream {
    /// Codec instance
    pub stream: Framed<BoxedIo, XmppCodec>,
}

impl XmppStream {
    /// Wrap a fresh transport in a new codec.
    pub fn new(io: BoxedIo) -> Self {
        XmppStream {
            stream: Framed::new(io, XmppCodec::new()),
        }
    }

    /// Send a `<stream:stream>` start tag addressed to `to`.
    pub async fn send_header(&mut self, to: &str, lang: Option<&str>) -> Result<(), Error> {
        let mut attrs = BTreeMap::new();
        attrs.insert("to".to_owned(), to.to_owned());
        attrs.insert("version".to_owned(), "1.0".to_owned());
        attrs.insert("xmlns".to_owned(), ns::JABBER_CLIENT.to_owned());
        attrs.insert("xmlns:stream".to_owned(), ns::STREAM.to_owned());
        if let Some(lang) = lang {
            attrs.insert("xml:lang".to_owned(), lang.to_owned());
        }
        self.send(Packet::StreamStart(attrs)).await
    }

    /// Wait for the remote `<stream:stream>` start tag and return its
    /// attributes.
    pub async fn recv_header(&mut self) -> Result<BTreeMap<String, String>, Error> {
        match self.next().await {
            Some(Ok(Packet::StreamStart(attrs))) => Ok(attrs),
            Some(Ok(Packet::Stanza(stanza))) if stanza.is("error", ns::STREAM) => {
                Err(ProtocolError::StreamError(stream_error_condition(&stanza)).into())
            }
            Some(Ok(Packet::Stanza(_))) => Err(ProtocolError::InvalidStreamStart.into()),
            Some(Ok(Packet::StreamEnd)) | None => Err(Error::Disconnected),
            Some(Err(e)) => Err(e),
        }
    }

    /// Wait for the next element.
    ///
    /// A `<stream:error/>` turns into [`ProtocolError::StreamError`], the
    /// end of the stream into [`Error::Disconnected`].
    pub async fn recv_element(&mut self) -> Result<Element, Error> {
        match self.next().await {
            Some(Ok(Packet::Stanza(stanza))) if stanza.is("error", ns::STREAM) => {
                Err(ProtocolError::StreamError(stream_error_condition(&stanza)).into())
            }
            Some(Ok(Packet::Stanza(stanza))) => Ok(stanza),
            Some(Ok(Packet::StreamStart(_))) => Err(ProtocolError::InvalidStreamStart.into()),
            Some(Ok(Packet::StreamEnd)) | None => Err(Error::Disconnected),
            Some(Err(e)) => Err(e),
        }
    }

    /// Unwraps the inner stream, along with whatever was already read
    /// from it but not decoded yet.
    pub fn into_inner(self) -> (BoxedIo, BytesMut) {
        let parts = self.stream.into_parts();
        (parts.io, parts.read_buf)
    }
}

impl XmppStream {
    /// Convenience method
    pub fn send_stanza<E: Into<Element>>(&mut self, e: E) -> Send<Self, Packet> {
        self.send(Packet::Stanza(e.into()))
    }
}

/// Name of the defined condition inside a `<stream:error/>`.
pub(crate) fn stream_error_condition(error: &Element) -> String {
    error
        .children()
        .find(|child| child.has_ns(ns::XMPP_STREAMS) && child.name() != "text")
        .map(|child| child.name().to_owned())
        .unwrap_or_else(|| "undefined-condition".to_owned())
}

/// Proxy to self.stream
impl Sink<Packet> for XmppStream {
    type Error = crate::Error;

    fn poll_ready(mut self: Pin<&mut Self>, ctx: &mut Context) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.stream).poll_ready(ctx)
    }

    fn start_send(mut self: Pin<&mut Self>, item: Packet) -> Result<(), Self::Error> {
        Pin::new(&mut self.stream).start_send(item)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.stream).poll_close(cx)
    }
}

/// Proxy to self.stream
impl Stream for XmppStream {
    type Item = Result<Packet, crate::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.stream).poll_next(cx)
    }
}
