// Copyright (c) 2017 Emmanuel Gil Peyrot <linkmauve@linkmauve.fr>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! XML namespaces used during session establishment.

/// RFC 6120: XMPP Core
pub const JABBER_CLIENT: &str = "jabber:client";

/// RFC 6120: XMPP Core
pub const STREAM: &str = "http://etherx.jabber.org/streams";

/// RFC 6120: XMPP Core
pub const XMPP_STREAMS: &str = "urn:ietf:params:xml:ns:xmpp-streams";

/// RFC 6120: XMPP Core
pub const XMPP_STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";

/// RFC 6120: XMPP Core
pub const TLS: &str = "urn:ietf:params:xml:ns:xmpp-tls";

/// RFC 6120: XMPP Core
pub const SASL: &str = "urn:ietf:params:xml:ns:xmpp-sasl";

/// RFC 6120: XMPP Core
pub const BIND: &str = "urn:ietf:params:xml:ns:xmpp-bind";

/// RFC 3921: XMPP Instant Messaging and Presence
pub const SESSION: &str = "urn:ietf:params:xml:ns:xmpp-session";

/// XEP-0078: Non-SASL Authentication
pub const AUTH: &str = "jabber:iq:auth";

/// XEP-0078: Non-SASL Authentication, stream feature
pub const AUTH_FEATURE: &str = "http://jabber.org/features/iq-auth";
