// Copyright (c) 2017 Astro <astro@spaceboyz.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use sasl::client::MechanismError as SaslMechanismError;
use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;
use xso::error::FromElementError;

use crate::client::queue::QueueError;
use crate::connect::StartTlsError;
use crate::parsers::sasl::DefinedCondition as SaslDefinedCondition;
use crate::stanza_error::StanzaError;
use crate::{jid, minidom};

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(IoError),
    /// Error parsing Jabber-Id
    JidParse(jid::Error),
    /// Protocol-level error
    Protocol(ProtocolError),
    /// StartTLS negotiation error
    Tls(StartTlsError),
    /// Authentication error
    Auth(AuthError),
    /// Waiting for a reply failed
    Queue(QueueError),
    /// Connection closed
    Disconnected,
    /// Operation not allowed in the current connection state
    InvalidState,
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(fmt, "IO error: {}", e),
            Error::JidParse(e) => write!(fmt, "jid parse error: {}", e),
            Error::Protocol(e) => write!(fmt, "protocol error: {}", e),
            Error::Tls(e) => write!(fmt, "StartTLS error: {}", e),
            Error::Auth(e) => write!(fmt, "authentication error: {}", e),
            Error::Queue(e) => write!(fmt, "reply error: {}", e),
            Error::Disconnected => write!(fmt, "disconnected"),
            Error::InvalidState => write!(fmt, "invalid state"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::JidParse(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Tls(e) => Some(e),
            Error::Auth(e) => Some(e),
            Error::Queue(e) => Some(e),
            Error::Disconnected | Error::InvalidState => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

impl From<jid::Error> for Error {
    fn from(e: jid::Error) -> Self {
        Error::JidParse(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<StartTlsError> for Error {
    fn from(e: StartTlsError) -> Self {
        Error::Tls(e)
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Error::Auth(e)
    }
}

impl From<QueueError> for Error {
    fn from(e: QueueError) -> Self {
        Error::Queue(e)
    }
}

impl From<minidom::Error> for Error {
    fn from(e: minidom::Error) -> Self {
        ProtocolError::Parser(e).into()
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        ProtocolError::Xml(e).into()
    }
}

/// XMPP protocol-level error
#[derive(Debug)]
pub enum ProtocolError {
    /// XML parser error
    Parser(minidom::Error),
    /// Error with expected stanza schema
    Parsers(xso::error::Error),
    /// Stream framing error
    Xml(quick_xml::Error),
    /// Invalid response to resource binding
    InvalidBindResponse,
    /// The server refused to bind the resource
    BindFailed(StanzaError),
    /// The server refused to establish the session
    SessionFailed(StanzaError),
    /// No xmlns attribute in <stream:stream>
    NoStreamNamespace,
    /// No id attribute in <stream:stream>
    NoStreamId,
    /// Encountered an unexpected XML token
    InvalidToken,
    /// Unexpected <stream:stream> (shouldn't occur)
    InvalidStreamStart,
    /// An incomplete frame grew past the decoder's limit
    FrameTooLarge(usize),
    /// An element arrived which the current step does not expect
    UnexpectedElement(String),
    /// The server closed the stream with `<stream:error/>`
    StreamError(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProtocolError::Parser(e) => write!(fmt, "XML parser error: {}", e),
            ProtocolError::Parsers(e) => write!(fmt, "error with expected stanza schema: {}", e),
            ProtocolError::Xml(e) => write!(fmt, "XML framing error: {}", e),
            ProtocolError::InvalidBindResponse => {
                write!(fmt, "invalid response to resource binding")
            }
            ProtocolError::BindFailed(e) => write!(fmt, "resource binding failed: {}", e),
            ProtocolError::SessionFailed(e) => {
                write!(fmt, "session establishment failed: {}", e)
            }
            ProtocolError::NoStreamNamespace => {
                write!(fmt, "no xmlns attribute in <stream:stream>")
            }
            ProtocolError::NoStreamId => write!(fmt, "no id attribute in <stream:stream>"),
            ProtocolError::InvalidToken => write!(fmt, "encountered an unexpected XML token"),
            ProtocolError::InvalidStreamStart => write!(fmt, "unexpected <stream:stream>"),
            ProtocolError::FrameTooLarge(size) => {
                write!(fmt, "incomplete frame of {} bytes exceeds the limit", size)
            }
            ProtocolError::UnexpectedElement(name) => {
                write!(fmt, "unexpected element <{}/>", name)
            }
            ProtocolError::StreamError(condition) => {
                write!(fmt, "stream error from the server: {}", condition)
            }
        }
    }
}

impl StdError for ProtocolError {}

impl From<minidom::Error> for ProtocolError {
    fn from(e: minidom::Error) -> Self {
        ProtocolError::Parser(e)
    }
}

impl From<quick_xml::Error> for ProtocolError {
    fn from(e: quick_xml::Error) -> Self {
        ProtocolError::Xml(e)
    }
}

impl From<xso::error::Error> for ProtocolError {
    fn from(e: xso::error::Error) -> Self {
        ProtocolError::Parsers(e)
    }
}

impl From<FromElementError> for ProtocolError {
    fn from(e: FromElementError) -> Self {
        match e {
            FromElementError::Mismatch(elem) => {
                ProtocolError::UnexpectedElement(elem.name().to_owned())
            }
            FromElementError::Invalid(e) => ProtocolError::Parsers(e),
        }
    }
}

impl From<FromElementError> for Error {
    fn from(e: FromElementError) -> Self {
        ProtocolError::from(e).into()
    }
}

/// Why the server turned down a legacy `jabber:iq:auth` attempt.
#[derive(Debug)]
pub enum Rejection {
    /// The server answered with an error stanza.
    Error(StanzaError),
    /// The server offers neither digest nor plaintext authentication.
    NoSupportedMethods,
}

impl fmt::Display for Rejection {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Rejection::Error(e) => write!(fmt, "{}", e),
            Rejection::NoSupportedMethods => {
                write!(fmt, "server offers neither digest nor password authentication")
            }
        }
    }
}

/// Authentication error
#[derive(Debug)]
pub enum AuthError {
    /// No matching SASL mechanism available
    NoMechanism,
    /// Neither SASL nor legacy authentication is offered
    NoAuthPath,
    /// The credentials carry no secret any more
    NoSecret,
    /// Local SASL implementation error
    Sasl(SaslMechanismError),
    /// SASL `<failure/>` from the server
    Fail(SaslDefinedCondition),
    /// Legacy authentication was turned down
    Rejected(Rejection),
}

impl StdError for AuthError {}

impl fmt::Display for AuthError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthError::NoMechanism => write!(fmt, "no matching SASL mechanism available"),
            AuthError::NoAuthPath => write!(fmt, "server offers no way to authenticate"),
            AuthError::NoSecret => write!(fmt, "credentials carry no secret"),
            AuthError::Sasl(s) => write!(fmt, "local SASL implementation error: {}", s),
            AuthError::Fail(c) => write!(fmt, "failure from the server: {:?}", c),
            AuthError::Rejected(r) => write!(fmt, "legacy authentication rejected: {}", r),
        }
    }
}

impl From<SaslMechanismError> for AuthError {
    fn from(e: SaslMechanismError) -> Self {
        AuthError::Sasl(e)
    }
}

impl From<SaslMechanismError> for Error {
    fn from(e: SaslMechanismError) -> Self {
        AuthError::Sasl(e).into()
    }
}
