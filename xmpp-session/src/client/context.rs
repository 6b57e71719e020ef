// Copyright (c) 2017 Astro <astro@spaceboyz.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::jid::Jid;

/// What the current stream generation has established about the session.
///
/// Only the handshake writes to it; once the session is established it is
/// read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    /// The domain the stream is addressed to.
    pub host: Option<String>,
    /// `id` of the remote stream header.
    pub stream_id: Option<String>,
    /// `version` of the remote stream header, `None` for pre-1.0 servers.
    pub version: Option<String>,
    /// Authenticated user name.
    pub username: Option<String>,
    /// Bound resource.
    pub resource: Option<String>,
    /// `xml:lang` of the stream.
    pub locale: Option<String>,
}

impl SessionContext {
    /// A context for a stream addressed to `host`.
    pub fn new<H: Into<String>>(host: H) -> SessionContext {
        SessionContext {
            host: Some(host.into()),
            ..SessionContext::default()
        }
    }

    /// Clear every field.
    pub fn reset(&mut self) {
        *self = SessionContext::default();
    }

    /// Clear every field but `host`, as a stream restart does.
    pub fn reset_keep_host(&mut self) {
        let host = self.host.take();
        self.reset();
        self.host = host;
    }

    /// `username@host/resource`, as far as it is known.
    ///
    /// `None` until a host is known, or if the parts do not form a valid
    /// JID.
    pub fn jid(&self) -> Option<Jid> {
        let host = self.host.as_deref()?;
        let bare = match self.username {
            Some(ref username) => format!("{}@{}", username, host),
            None => host.to_owned(),
        };
        let jid = match self.resource {
            Some(ref resource) => Jid::new(&format!("{}/{}", bare, resource)),
            None => Jid::new(&bare),
        };
        jid.ok()
    }
}
