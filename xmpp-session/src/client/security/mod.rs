// Copyright (c) 2017 Astro <astro@spaceboyz.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The negotiation actions run between stream (re)starts.

use core::fmt;
use core::str::FromStr;

use crate::client::context::SessionContext;
use crate::client::credentials::Credentials;
use crate::client::features::FeatureSet;
use crate::client::handshake::HandshakeConfig;
use crate::config::SecurityMode;
use crate::connect::{ServerConnector, StartTlsError};
use crate::error::{AuthError, Error};
use crate::proto::XmppStream;

mod legacy;
mod sasl;
mod starttls;

/// SASL mechanisms this crate can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MechanismKind {
    /// RFC 2831
    DigestMd5,
    /// RFC 4616
    Plain,
}

impl MechanismKind {
    /// Every mechanism, most preferred first.
    pub const ALL: [MechanismKind; 2] = [MechanismKind::DigestMd5, MechanismKind::Plain];

    /// The name servers advertise this mechanism under.
    pub fn name(&self) -> &'static str {
        match self {
            MechanismKind::DigestMd5 => "DIGEST-MD5",
            MechanismKind::Plain => "PLAIN",
        }
    }
}

impl fmt::Display for MechanismKind {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(self.name())
    }
}

impl FromStr for MechanismKind {
    type Err = ();

    fn from_str(s: &str) -> Result<MechanismKind, ()> {
        MechanismKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or(())
    }
}

/// One negotiation action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityStep {
    /// Upgrade the connection to TLS; the stream restarts afterwards.
    StartTls,
    /// Authenticate with SASL; the stream restarts afterwards.
    Sasl(MechanismKind),
    /// Authenticate with `jabber:iq:auth`; the session is established
    /// without a restart.
    Legacy,
}

/// What happens after a successful step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    /// Open a new stream generation.
    Restart,
    /// The session is established.
    Established,
}

/// Choose the next step from what the server offered.
///
/// `features` is `None` when the server sent no `<stream:features/>` at
/// all.
pub fn select_step(
    features: Option<&FeatureSet>,
    tls_done: bool,
    config: &HandshakeConfig,
) -> Result<SecurityStep, Error> {
    let Some(features) = features.filter(|features| !features.is_empty()) else {
        if config.security == SecurityMode::Required && !tls_done {
            return Err(StartTlsError::NotOffered.into());
        }
        return Ok(SecurityStep::Legacy);
    };

    if !tls_done {
        match config.security {
            SecurityMode::Disabled if features.tls_required => {
                return Err(StartTlsError::RequiredByServer.into())
            }
            SecurityMode::Disabled => (),
            _ if features.tls_available => return Ok(SecurityStep::StartTls),
            SecurityMode::Required => return Err(StartTlsError::NotOffered.into()),
            SecurityMode::Enabled => (),
        }
    }

    if !features.sasl_mechanisms.is_empty() {
        return MechanismKind::ALL
            .into_iter()
            .filter(|kind| config.mechanisms.contains(kind))
            .find(|kind| features.can_sasl(kind.name()))
            .map(SecurityStep::Sasl)
            .ok_or(AuthError::NoMechanism.into());
    }

    if features.legacy_auth_available {
        return Ok(SecurityStep::Legacy);
    }

    Err(AuthError::NoAuthPath.into())
}

impl SecurityStep {
    /// Run this step on `stream`.
    ///
    /// Consumes the stream because StartTLS replaces it.
    pub(crate) async fn attempt<C: ServerConnector>(
        self,
        mut stream: XmppStream,
        connector: &C,
        config: &HandshakeConfig,
        context: &mut SessionContext,
        credentials: &mut Credentials,
    ) -> Result<(XmppStream, StepOutcome), Error> {
        match self {
            SecurityStep::StartTls => {
                let stream = starttls::negotiate(stream, connector, &config.domain).await?;
                context.reset_keep_host();
                Ok((stream, StepOutcome::Restart))
            }
            SecurityStep::Sasl(kind) => {
                sasl::authenticate(&mut stream, kind, context, credentials).await?;
                context.reset_keep_host();
                credentials.discard_secret();
                Ok((stream, StepOutcome::Restart))
            }
            SecurityStep::Legacy => {
                legacy::authenticate(&mut stream, config, context, credentials).await?;
                credentials.discard_secret();
                Ok((stream, StepOutcome::Established))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn sasl(mechanisms: &[&str]) -> FeatureSet {
        FeatureSet {
            sasl_mechanisms: mechanisms.iter().map(|m| m.to_string()).collect(),
            ..FeatureSet::default()
        }
    }

    fn config() -> HandshakeConfig {
        Config::new("example.org").handshake()
    }

    #[test]
    fn prefers_digest_md5() {
        for offered in [
            &["DIGEST-MD5", "PLAIN"][..],
            &["PLAIN", "DIGEST-MD5"][..],
            &["SCRAM-SHA-1", "PLAIN", "DIGEST-MD5"][..],
        ] {
            let step = select_step(Some(&sasl(offered)), false, &config()).unwrap();
            assert_eq!(step, SecurityStep::Sasl(MechanismKind::DigestMd5));
        }
    }

    #[test]
    fn plain_only_without_digest() {
        let step = select_step(Some(&sasl(&["PLAIN", "SCRAM-SHA-1"])), false, &config()).unwrap();
        assert_eq!(step, SecurityStep::Sasl(MechanismKind::Plain));
    }

    #[test]
    fn disabled_mechanism_is_skipped() {
        let mut config = config();
        config.mechanisms = vec![MechanismKind::Plain];
        let step = select_step(Some(&sasl(&["DIGEST-MD5", "PLAIN"])), false, &config).unwrap();
        assert_eq!(step, SecurityStep::Sasl(MechanismKind::Plain));
    }

    #[test]
    fn no_common_mechanism() {
        assert!(matches!(
            select_step(Some(&sasl(&["SCRAM-SHA-1"])), false, &config()),
            Err(Error::Auth(AuthError::NoMechanism))
        ));
    }

    #[test]
    fn missing_or_empty_features_route_to_legacy() {
        assert_eq!(select_step(None, false, &config()).unwrap(), SecurityStep::Legacy);
        assert_eq!(
            select_step(Some(&FeatureSet::default()), false, &config()).unwrap(),
            SecurityStep::Legacy
        );
        let legacy = FeatureSet {
            legacy_auth_available: true,
            ..FeatureSet::default()
        };
        assert_eq!(select_step(Some(&legacy), true, &config()).unwrap(), SecurityStep::Legacy);
    }

    #[test]
    fn tls_first() {
        let features = FeatureSet {
            tls_available: true,
            ..sasl(&["PLAIN"])
        };
        assert_eq!(
            select_step(Some(&features), false, &config()).unwrap(),
            SecurityStep::StartTls
        );
        assert_eq!(
            select_step(Some(&features), true, &config()).unwrap(),
            SecurityStep::Sasl(MechanismKind::Plain)
        );
    }

    #[test]
    fn tls_policy() {
        let mut disabled = config();
        disabled.security = SecurityMode::Disabled;
        let offered = FeatureSet {
            tls_available: true,
            ..sasl(&["PLAIN"])
        };
        assert_eq!(
            select_step(Some(&offered), false, &disabled).unwrap(),
            SecurityStep::Sasl(MechanismKind::Plain)
        );

        let required_by_server = FeatureSet {
            tls_required: true,
            ..offered.clone()
        };
        assert!(matches!(
            select_step(Some(&required_by_server), false, &disabled),
            Err(Error::Tls(StartTlsError::RequiredByServer))
        ));

        let mut required = config();
        required.security = SecurityMode::Required;
        assert!(matches!(
            select_step(Some(&sasl(&["PLAIN"])), false, &required),
            Err(Error::Tls(StartTlsError::NotOffered))
        ));
        assert!(matches!(
            select_step(None, false, &required),
            Err(Error::Tls(StartTlsError::NotOffered))
        ));
    }

    #[test]
    fn nothing_usable() {
        let features = FeatureSet {
            bind_available: true,
            ..FeatureSet::default()
        };
        assert!(matches!(
            select_step(Some(&features), true, &config()),
            Err(Error::Auth(AuthError::NoAuthPath))
        ));
    }

    #[test]
    fn mechanism_names() {
        assert_eq!("DIGEST-MD5".parse::<MechanismKind>(), Ok(MechanismKind::DigestMd5));
        assert_eq!("PLAIN".parse::<MechanismKind>(), Ok(MechanismKind::Plain));
        assert!("SCRAM-SHA-1".parse::<MechanismKind>().is_err());
    }
}
