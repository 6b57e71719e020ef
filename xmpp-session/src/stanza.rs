// Copyright (c) 2024 Jonas Schäfer <jonas@zombofant.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use minidom::Element;
use rand::{thread_rng, Rng};

use crate::ns;

pub(crate) fn make_id() -> String {
    let id: u64 = thread_rng().gen();
    format!("{}", id)
}

/// A stanza sent/received over the stream.
///
/// The session core only looks at the correlation `id` and whether the
/// stanza is an error; everything else is left to the application.
#[derive(Debug, Clone, PartialEq)]
pub struct Stanza(Element);

impl Stanza {
    /// The `id` attribute, if any.
    pub fn id(&self) -> Option<&str> {
        self.0.attr("id")
    }

    /// Whether this stanza carries `type="error"`.
    pub fn is_error(&self) -> bool {
        self.0.attr("type") == Some("error")
    }

    /// Assign a random ID to the stanza, if no ID has been assigned yet.
    pub fn ensure_id(&mut self) -> &str {
        if self.0.attr("id").map_or(true, str::is_empty) {
            self.0.set_attr("id", make_id());
        }
        self.0.attr("id").unwrap_or_default()
    }

    /// Local name of the top-level element (`iq`, `message`, ...).
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Whether this is an `<iq/>` in the client namespace.
    pub fn is_iq(&self) -> bool {
        self.0.is("iq", ns::JABBER_CLIENT)
    }

    /// Borrow the underlying element.
    pub fn element(&self) -> &Element {
        &self.0
    }

    /// Unwrap into the underlying element.
    pub fn into_element(self) -> Element {
        self.0
    }
}

impl From<Element> for Stanza {
    fn from(other: Element) -> Self {
        Self(other)
    }
}

impl From<Stanza> for Element {
    fn from(other: Stanza) -> Self {
        other.0
    }
}
