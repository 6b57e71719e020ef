// Copyright (c) 2017 Astro <astro@spaceboyz.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::BTreeSet;

use minidom::Element;

use crate::error::ProtocolError;
use crate::ns;
use crate::parsers::stream_features::StreamFeatures;

/// What the server advertised in `<stream:features/>` for the current
/// stream generation.
///
/// A fresh set is parsed after every stream (re)start and replaces the
/// previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet {
    /// `<starttls/>` is offered.
    pub tls_available: bool,
    /// `<starttls/>` carries `<required/>`.
    pub tls_required: bool,
    /// Names of the offered SASL mechanisms.
    pub sasl_mechanisms: BTreeSet<String>,
    /// Legacy `jabber:iq:auth` is advertised.
    pub legacy_auth_available: bool,
    /// Resource binding is offered.
    pub bind_available: bool,
    /// A non-optional RFC 3921 session has to be established.
    pub session_available: bool,
}

impl From<StreamFeatures> for FeatureSet {
    fn from(features: StreamFeatures) -> FeatureSet {
        let tls_required = features
            .starttls
            .as_ref()
            .map_or(false, |starttls| starttls.required.is_some());
        let mut set = FeatureSet {
            tls_available: features.can_starttls(),
            tls_required,
            sasl_mechanisms: features
                .sasl_mechanisms
                .mechanisms
                .iter()
                .map(|name| name.trim().to_owned())
                .filter(|name| !name.is_empty())
                .collect(),
            bind_available: features.can_bind(),
            ..FeatureSet::default()
        };
        // Pre-RFC 6120 features have no typed equivalent.
        for other in &features.others {
            if other.is("auth", ns::AUTH_FEATURE) {
                set.legacy_auth_available = true;
            } else if other.is("session", ns::SESSION) {
                set.session_available = other.get_child("optional", ns::SESSION).is_none();
            }
        }
        set
    }
}

impl FeatureSet {
    /// Parse a `<stream:features/>` element; unknown features are ignored.
    pub fn from_element(elem: &Element) -> Result<FeatureSet, ProtocolError> {
        Ok(StreamFeatures::try_from(elem.clone())?.into())
    }

    /// Whether nothing the handshake cares about was advertised.
    pub fn is_empty(&self) -> bool {
        *self == FeatureSet::default()
    }

    /// Whether `name` is among the offered SASL mechanisms.
    pub fn can_sasl(&self, name: &str) -> bool {
        self.sasl_mechanisms.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full() {
        let elem: Element = "<stream:features xmlns:stream='http://etherx.jabber.org/streams'>\
            <starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'><required/></starttls>\
            <mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
            <mechanism>DIGEST-MD5</mechanism><mechanism>PLAIN</mechanism>\
            </mechanisms>\
            <auth xmlns='http://jabber.org/features/iq-auth'/>\
            </stream:features>"
            .parse()
            .unwrap();
        let features = FeatureSet::from_element(&elem).unwrap();
        assert!(features.tls_available);
        assert!(features.tls_required);
        assert!(features.can_sasl("DIGEST-MD5"));
        assert!(features.can_sasl("PLAIN"));
        assert!(!features.can_sasl("SCRAM-SHA-1"));
        assert!(features.legacy_auth_available);
        assert!(!features.bind_available);
    }

    #[test]
    fn parse_bind_and_session() {
        let elem: Element = "<stream:features xmlns:stream='http://etherx.jabber.org/streams'>\
            <bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/>\
            <session xmlns='urn:ietf:params:xml:ns:xmpp-session'><optional/></session>\
            </stream:features>"
            .parse()
            .unwrap();
        let features = FeatureSet::from_element(&elem).unwrap();
        assert!(features.bind_available);
        assert!(!features.session_available);
        assert!(features.sasl_mechanisms.is_empty());
    }

    #[test]
    fn empty() {
        let elem: Element = "<stream:features xmlns:stream='http://etherx.jabber.org/streams'/>"
            .parse()
            .unwrap();
        assert!(FeatureSet::from_element(&elem).unwrap().is_empty());
    }

    #[test]
    fn not_features() {
        let elem: Element = "<proceed xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>"
            .parse()
            .unwrap();
        assert!(matches!(
            FeatureSet::from_element(&elem),
            Err(ProtocolError::UnexpectedElement(name)) if name == "proceed"
        ));
    }
}
