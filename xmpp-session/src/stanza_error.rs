// Copyright (c) 2017 Emmanuel Gil Peyrot <linkmauve@linkmauve.fr>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Stanza errors, including the numeric codes of pre-RFC 3920 servers
//! ([XEP-0086](https://xmpp.org/extensions/xep-0086.html)).

use core::fmt;
use core::str::FromStr;

use minidom::Element;

use crate::ns;

/// The type of the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    /// Retry after providing credentials.
    Auth,

    /// Do not retry (the error cannot be remedied).
    Cancel,

    /// Proceed (the condition was only a warning).
    Continue,

    /// Retry after changing the data sent.
    Modify,

    /// Retry after waiting (the error is temporary).
    Wait,
}

impl ErrorType {
    /// The attribute value for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Auth => "auth",
            ErrorType::Cancel => "cancel",
            ErrorType::Continue => "continue",
            ErrorType::Modify => "modify",
            ErrorType::Wait => "wait",
        }
    }
}

impl FromStr for ErrorType {
    type Err = ();

    fn from_str(s: &str) -> Result<ErrorType, ()> {
        Ok(match s {
            "auth" => ErrorType::Auth,
            "cancel" => ErrorType::Cancel,
            "continue" => ErrorType::Continue,
            "modify" => ErrorType::Modify,
            "wait" => ErrorType::Wait,
            _ => return Err(()),
        })
    }
}

macro_rules! defined_conditions {
    ($($(#[$meta:meta])* $variant:ident => $name:literal,)+) => {
        /// List of valid error conditions.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum DefinedCondition {
            $(
                $(#[$meta])*
                $variant,
            )+
        }

        impl DefinedCondition {
            /// The element name of this condition.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(DefinedCondition::$variant => $name,)+
                }
            }
        }

        impl FromStr for DefinedCondition {
            type Err = ();

            fn from_str(s: &str) -> Result<DefinedCondition, ()> {
                Ok(match s {
                    $($name => DefinedCondition::$variant,)+
                    _ => return Err(()),
                })
            }
        }
    };
}

defined_conditions! {
    /// The request was malformed.
    BadRequest => "bad-request",
    /// An existing resource uses the same name or address.
    Conflict => "conflict",
    /// The feature is not implemented by the recipient.
    FeatureNotImplemented => "feature-not-implemented",
    /// The sender lacks the permissions for this action.
    Forbidden => "forbidden",
    /// The recipient can no longer be contacted at this address.
    Gone => "gone",
    /// The server hit an internal error.
    InternalServerError => "internal-server-error",
    /// The addressed JID or item cannot be found.
    ItemNotFound => "item-not-found",
    /// The address is malformed.
    JidMalformed => "jid-malformed",
    /// The request does not meet the recipient's criteria.
    NotAcceptable => "not-acceptable",
    /// Nobody is allowed to perform this action.
    NotAllowed => "not-allowed",
    /// Credentials are missing or wrong.
    NotAuthorized => "not-authorized",
    /// Payment is required (RFC 3920 only).
    PaymentRequired => "payment-required",
    /// A local service policy was violated.
    PolicyViolation => "policy-violation",
    /// The recipient is temporarily unavailable.
    RecipientUnavailable => "recipient-unavailable",
    /// The recipient moved temporarily.
    Redirect => "redirect",
    /// Registration is required first.
    RegistrationRequired => "registration-required",
    /// The remote server does not exist.
    RemoteServerNotFound => "remote-server-not-found",
    /// The remote server did not answer in time.
    RemoteServerTimeout => "remote-server-timeout",
    /// The recipient lacks the resources to serve the request.
    ResourceConstraint => "resource-constraint",
    /// The service is not provided.
    ServiceUnavailable => "service-unavailable",
    /// A subscription is required first.
    SubscriptionRequired => "subscription-required",
    /// Anything else.
    UndefinedCondition => "undefined-condition",
    /// The request came at an unexpected point in the exchange.
    UnexpectedRequest => "unexpected-request",
}

impl fmt::Display for DefinedCondition {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

/// The fixed mapping between legacy numeric codes and conditions.
///
/// Several codes share a condition; a reverse lookup takes the first row
/// matching both condition and type, then the first matching the condition.
const LEGACY_CODES: &[(u16, DefinedCondition, ErrorType)] = &[
    (302, DefinedCondition::Redirect, ErrorType::Modify),
    (400, DefinedCondition::BadRequest, ErrorType::Modify),
    (401, DefinedCondition::NotAuthorized, ErrorType::Auth),
    (402, DefinedCondition::PaymentRequired, ErrorType::Auth),
    (403, DefinedCondition::Forbidden, ErrorType::Auth),
    (404, DefinedCondition::ItemNotFound, ErrorType::Cancel),
    (405, DefinedCondition::NotAllowed, ErrorType::Cancel),
    (406, DefinedCondition::NotAcceptable, ErrorType::Modify),
    (407, DefinedCondition::RegistrationRequired, ErrorType::Auth),
    (408, DefinedCondition::RemoteServerTimeout, ErrorType::Wait),
    (409, DefinedCondition::Conflict, ErrorType::Cancel),
    (500, DefinedCondition::InternalServerError, ErrorType::Wait),
    (501, DefinedCondition::FeatureNotImplemented, ErrorType::Cancel),
    (502, DefinedCondition::ServiceUnavailable, ErrorType::Wait),
    (503, DefinedCondition::ServiceUnavailable, ErrorType::Cancel),
    (504, DefinedCondition::RemoteServerTimeout, ErrorType::Wait),
    (510, DefinedCondition::ServiceUnavailable, ErrorType::Cancel),
];

/// Maps a legacy numeric code onto its condition and type.
///
/// Unknown codes map to `undefined-condition` of type `cancel`.
pub fn condition_from_code(code: u16) -> (DefinedCondition, ErrorType) {
    LEGACY_CODES
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|&(_, condition, type_)| (condition, type_))
        .unwrap_or((DefinedCondition::UndefinedCondition, ErrorType::Cancel))
}

/// Maps a condition (and its type) back onto a legacy numeric code.
pub fn code_from_condition(condition: DefinedCondition, type_: ErrorType) -> Option<u16> {
    LEGACY_CODES
        .iter()
        .find(|&&(_, c, t)| c == condition && t == type_)
        .or_else(|| LEGACY_CODES.iter().find(|&&(_, c, _)| c == condition))
        .map(|&(code, _, _)| code)
}

/// The representation of a stanza error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StanzaError {
    /// The type of this error.
    pub type_: ErrorType,

    /// A protocol-defined condition.
    pub defined_condition: DefinedCondition,

    /// The legacy numeric code, if the server sent one or one is known for
    /// the condition.
    pub code: Option<u16>,

    /// Human-readable description.
    pub text: Option<String>,
}

impl StanzaError {
    /// Create a new stanza error, filling in the legacy code from the
    /// condition table.
    pub fn new(type_: ErrorType, defined_condition: DefinedCondition) -> StanzaError {
        StanzaError {
            type_,
            defined_condition,
            code: code_from_condition(defined_condition, type_),
            text: None,
        }
    }

    /// Create the error a legacy server means with a bare numeric code.
    pub fn from_code(code: u16) -> StanzaError {
        let (defined_condition, type_) = condition_from_code(code);
        StanzaError {
            type_,
            defined_condition,
            code: Some(code),
            text: None,
        }
    }

    /// Set the human-readable text.
    pub fn with_text<T: Into<String>>(mut self, text: T) -> StanzaError {
        self.text = Some(text.into());
        self
    }

    /// Extract the error carried by a `type="error"` stanza.
    ///
    /// Missing pieces are reconstructed from the legacy code when there is
    /// one, so servers speaking either dialect produce the same value.
    pub fn from_stanza(stanza: &Element) -> StanzaError {
        match stanza.get_child("error", ns::JABBER_CLIENT) {
            Some(error) => StanzaError::from_element(error),
            None => StanzaError::new(ErrorType::Cancel, DefinedCondition::UndefinedCondition),
        }
    }

    /// Parse an `<error/>` element.
    pub fn from_element(elem: &Element) -> StanzaError {
        let code = elem.attr("code").and_then(|code| code.trim().parse::<u16>().ok());
        let mut defined_condition = None;
        let mut text = None;
        for child in elem.children() {
            if child.is("text", ns::XMPP_STANZAS) {
                text = Some(child.text());
            } else if child.has_ns(ns::XMPP_STANZAS) && defined_condition.is_none() {
                defined_condition = child.name().parse::<DefinedCondition>().ok();
            }
        }
        // Legacy errors carry their description as character data.
        if text.is_none() && defined_condition.is_none() {
            let legacy = elem.text();
            if !legacy.trim().is_empty() {
                text = Some(legacy.trim().to_owned());
            }
        }
        let type_ = elem.attr("type").and_then(|t| t.parse::<ErrorType>().ok());

        let (defined_condition, type_) = match (defined_condition, type_, code) {
            (Some(condition), Some(type_), _) => (condition, type_),
            (Some(condition), None, Some(code)) => (condition, condition_from_code(code).1),
            (Some(condition), None, None) => (condition, ErrorType::Cancel),
            (None, type_, Some(code)) => {
                let (condition, code_type) = condition_from_code(code);
                (condition, type_.unwrap_or(code_type))
            }
            (None, type_, None) => (
                DefinedCondition::UndefinedCondition,
                type_.unwrap_or(ErrorType::Cancel),
            ),
        };

        StanzaError {
            type_,
            defined_condition,
            code: code.or_else(|| code_from_condition(defined_condition, type_)),
            text,
        }
    }
}

impl fmt::Display for StanzaError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{} ({})", self.defined_condition, self.type_.as_str())?;
        if let Some(code) = self.code {
            write!(fmt, " [{}]", code)?;
        }
        if let Some(ref text) = self.text {
            write!(fmt, ": {}", text)?;
        }
        Ok(())
    }
}

impl From<StanzaError> for Element {
    fn from(err: StanzaError) -> Element {
        Element::builder("error", ns::JABBER_CLIENT)
            .attr("type", err.type_.as_str())
            .attr("code", err.code.map(|code| code.to_string()))
            .append(Element::builder(err.defined_condition.as_str(), ns::XMPP_STANZAS))
            .append_all(
                err.text
                    .map(|text| Element::builder("text", ns::XMPP_STANZAS).append(text)),
            )
            .build()
    }
}
