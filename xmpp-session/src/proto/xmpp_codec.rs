// Copyright (c) 2017 Astro <astro@spaceboyz.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! XML stream parser for XMPP

use bytes::{Buf, BytesMut};
use core::fmt::Write;
use log::{debug, trace};
use minidom::Element;
use std::collections::BTreeMap;
use tokio_util::codec::{Decoder, Encoder};

use super::framing::{Frame, FrameScanner};
use crate::error::{Error, ProtocolError};
use crate::ns;

/// Anything that can be sent or received on an XMPP/XML stream
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// `<stream:stream>` start tag
    StreamStart(BTreeMap<String, String>),
    /// A complete element nested within the stream
    Stanza(Element),
    /// `</stream:stream>` closing tag
    StreamEnd,
}

/// Largest incomplete frame the decoder buffers before giving up.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1 << 20;

/// Stateful encoder/decoder for a bytestream from/to XMPP `Packet`
pub struct XmppCodec {
    /// Default namespace of the stream, taken from the last header seen
    ns: String,
    scanner: FrameScanner,
    max_frame_size: usize,
}

impl XmppCodec {
    /// Constructor
    pub fn new() -> Self {
        XmppCodec {
            ns: ns::JABBER_CLIENT.to_owned(),
            scanner: FrameScanner::default(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Refuse frames larger than `max_frame_size` bytes.
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Elements are parsed inside a synthetic stream root so that the
    /// `stream:` prefix and the default namespace resolve as they do on
    /// the wire.
    fn parse_element(&self, fragment: &[u8]) -> Result<Element, Error> {
        let fragment = core::str::from_utf8(fragment).map_err(|_| ProtocolError::InvalidToken)?;
        let wrapped = format!(
            "<stream:stream xmlns='{}' xmlns:stream='{}'>{}</stream:stream>",
            quick_xml::escape::escape(self.ns.as_str()),
            ns::STREAM,
            fragment
        );
        let root: Element = wrapped.parse()?;
        root.children()
            .next()
            .cloned()
            .ok_or(ProtocolError::InvalidToken.into())
    }
}

impl Default for XmppCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for XmppCodec {
    type Item = Packet;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if !self.scanner.in_progress() {
            let whitespace = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
            buf.advance(whitespace);
        }
        if buf.is_empty() {
            return Ok(None);
        }

        let (frame, consumed) = match self.scanner.next_frame(buf)? {
            Some(found) => found,
            None if buf.len() > self.max_frame_size => {
                return Err(ProtocolError::FrameTooLarge(buf.len()).into())
            }
            None => return Ok(None),
        };
        let packet = match frame {
            Frame::StreamStart(attrs) => {
                if let Some(ns) = attrs.get("xmlns") {
                    self.ns = ns.clone();
                }
                Packet::StreamStart(attrs)
            }
            Frame::Element(range) => Packet::Stanza(self.parse_element(&buf[range])?),
            Frame::StreamEnd => Packet::StreamEnd,
        };
        if log::log_enabled!(log::Level::Trace) {
            trace!("<< {}", String::from_utf8_lossy(&buf[..consumed]));
        }
        buf.advance(consumed);
        Ok(Some(packet))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(packet) => Ok(Some(packet)),
            None if buf.is_empty() => Ok(None),
            None => {
                debug!("{} bytes of an incomplete element at end of stream", buf.len());
                buf.clear();
                Err(Error::Disconnected)
            }
        }
    }
}

impl Encoder<Packet> for XmppCodec {
    type Error = Error;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut out = String::new();
        match item {
            Packet::StreamStart(start_attrs) => {
                out.push_str("<?xml version='1.0'?><stream:stream");
                for (name, value) in start_attrs {
                    write!(out, " {}='{}'", name, quick_xml::escape::escape(value.as_str()))
                        .map_err(|_| ProtocolError::InvalidToken)?;
                    if name == "xmlns" {
                        self.ns = value;
                    }
                }
                out.push('>');
            }
            Packet::Stanza(stanza) => out = String::from(&stanza),
            Packet::StreamEnd => out.push_str("</stream:stream>"),
        }
        trace!(">> {}", out);
        dst.extend_from_slice(out.as_bytes());
        Ok(())
    }
}
