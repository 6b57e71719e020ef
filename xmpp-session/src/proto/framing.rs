// Copyright (c) 2017 Astro <astro@spaceboyz.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Boundary detection for top-level elements on an XMPP byte stream.

use core::ops::Range;
use std::collections::BTreeMap;

use quick_xml::errors::SyntaxError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;

use crate::error::ProtocolError;

/// A complete unit found at the start of the buffer.
#[derive(Debug, PartialEq)]
pub(crate) enum Frame {
    /// `<stream:stream ...>` with its attributes.
    StreamStart(BTreeMap<String, String>),
    /// A complete top-level element at this byte range.
    Element(Range<usize>),
    /// `</stream:stream>`
    StreamEnd,
}

fn is_stream_tag(name: QName) -> bool {
    name.as_ref() == b"stream:stream" || name.local_name().as_ref() == b"stream"
}

fn stream_attributes(start: &BytesStart) -> Result<BTreeMap<String, String>, ProtocolError> {
    let mut attrs = BTreeMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

/// Incremental search for the first complete frame of a buffer.
///
/// Bytes that were already scanned are not looked at again when more data
/// arrives: the scanner resumes at the start of the event it could not
/// finish. The buffer must only grow at its end between calls; once a
/// frame is returned the scanner starts over.
#[derive(Debug, Default)]
pub(crate) struct FrameScanner {
    scanned: usize,
    depth: u32,
    element_start: usize,
}

impl FrameScanner {
    /// Find the first complete frame in `buffer`.
    ///
    /// Returns the frame and the number of bytes it spans, or `None` if more
    /// data is needed. Whitespace between frames is skipped and counted as
    /// consumed.
    pub fn next_frame(&mut self, buffer: &[u8]) -> Result<Option<(Frame, usize)>, ProtocolError> {
        let found = self.scan(buffer);
        if !matches!(found, Ok(None)) {
            *self = FrameScanner::default();
        }
        found
    }

    /// Whether a partial frame has been scanned already.
    pub fn in_progress(&self) -> bool {
        self.scanned > 0
    }

    fn scan(&mut self, buffer: &[u8]) -> Result<Option<(Frame, usize)>, ProtocolError> {
        let offset = self.scanned.min(buffer.len());
        let mut reader = Reader::from_reader(&buffer[offset..]);
        reader.config_mut().trim_text(false);
        reader.config_mut().check_end_names = false;
        // `</stream:stream>` closes a start tag this reader never saw.
        reader.config_mut().allow_unmatched_ends = true;

        loop {
            let pos = offset + reader.buffer_position() as usize;
            self.scanned = pos;

            match reader.read_event() {
                Ok(Event::Decl(_)) | Ok(Event::PI(_)) | Ok(Event::Comment(_)) => continue,
                Ok(Event::DocType(_)) => return Err(ProtocolError::InvalidToken),
                Ok(Event::Start(start)) => {
                    if self.depth == 0 {
                        if is_stream_tag(start.name()) {
                            let attrs = stream_attributes(&start)?;
                            let end = offset + reader.buffer_position() as usize;
                            return Ok(Some((Frame::StreamStart(attrs), end)));
                        }
                        self.element_start = pos;
                    }
                    self.depth += 1;
                }
                Ok(Event::Empty(start)) => {
                    if self.depth == 0 {
                        if is_stream_tag(start.name()) {
                            return Err(ProtocolError::InvalidStreamStart);
                        }
                        let end = offset + reader.buffer_position() as usize;
                        return Ok(Some((Frame::Element(pos..end), end)));
                    }
                }
                Ok(Event::End(end_tag)) => {
                    let end = offset + reader.buffer_position() as usize;
                    if self.depth == 0 {
                        if is_stream_tag(end_tag.name()) {
                            return Ok(Some((Frame::StreamEnd, end)));
                        }
                        return Err(ProtocolError::InvalidToken);
                    }
                    self.depth -= 1;
                    if self.depth == 0 {
                        return Ok(Some((Frame::Element(self.element_start..end), end)));
                    }
                }
                Ok(Event::Text(text)) => {
                    if self.depth == 0 && !text.iter().all(u8::is_ascii_whitespace) {
                        return Err(ProtocolError::InvalidToken);
                    }
                }
                Ok(Event::CData(_)) => {
                    if self.depth == 0 {
                        return Err(ProtocolError::InvalidToken);
                    }
                }
                Ok(Event::Eof) => return Ok(None),
                Err(quick_xml::Error::Syntax(SyntaxError::InvalidBangMarkup)) => {
                    return Err(ProtocolError::InvalidToken)
                }
                // The buffer ends inside a tag, comment or declaration.
                Err(quick_xml::Error::Syntax(_)) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
    }
}
