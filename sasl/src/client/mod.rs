// Copyright (c) 2017 lumi <lumi@pew.im>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Client-side SASL mechanisms.

use core::fmt;

pub mod mechanisms;

/// An error emitted by a mechanism while processing the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MechanismError {
    /// PLAIN needs both a username and a password.
    PlainRequiresUsernameAndPassword,

    /// DIGEST-MD5 needs both a username and a password.
    DigestMd5RequiresUsernameAndPassword,

    /// The system random number generator failed.
    CannotGenerateNonce,

    /// The challenge was not valid UTF-8 or not a valid directive list.
    CannotDecodeChallenge,

    /// A required directive was missing from the challenge.
    MissingDirective(&'static str),

    /// The server does not offer the `auth` quality of protection.
    UnsupportedQop,

    /// The server asked for an algorithm other than `md5-sess`.
    UnsupportedAlgorithm,

    /// A challenge arrived after the exchange was already complete.
    UnexpectedChallenge,

    /// The server's `rspauth` did not match the expected value, so the
    /// server could not prove knowledge of the password.
    InvalidServerProof,
}

impl fmt::Display for MechanismError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MechanismError::PlainRequiresUsernameAndPassword => {
                write!(fmt, "PLAIN requires a username and a password")
            }
            MechanismError::DigestMd5RequiresUsernameAndPassword => {
                write!(fmt, "DIGEST-MD5 requires a username and a password")
            }
            MechanismError::CannotGenerateNonce => write!(fmt, "can't generate nonce"),
            MechanismError::CannotDecodeChallenge => write!(fmt, "can't decode challenge"),
            MechanismError::MissingDirective(name) => {
                write!(fmt, "challenge is missing the `{}` directive", name)
            }
            MechanismError::UnsupportedQop => {
                write!(fmt, "server does not offer the `auth` quality of protection")
            }
            MechanismError::UnsupportedAlgorithm => {
                write!(fmt, "server requested an algorithm other than md5-sess")
            }
            MechanismError::UnexpectedChallenge => {
                write!(fmt, "received a challenge after the exchange completed")
            }
            MechanismError::InvalidServerProof => write!(fmt, "server proof is invalid"),
        }
    }
}

impl core::error::Error for MechanismError {}

#[cfg(feature = "digest-md5")]
impl From<getrandom::Error> for MechanismError {
    fn from(_err: getrandom::Error) -> MechanismError {
        MechanismError::CannotGenerateNonce
    }
}

/// A trait which defines SASL mechanisms.
pub trait Mechanism {
    /// The name of the mechanism, as advertised by the server.
    fn name(&self) -> &str;

    /// Provides initial payload of the SASL mechanism.
    fn initial(&mut self) -> Vec<u8> {
        Vec::new()
    }

    /// Creates a response to the SASL challenge.
    fn response(&mut self, _challenge: &[u8]) -> Result<Vec<u8>, MechanismError> {
        Ok(Vec::new())
    }

    /// Verifies the server success response, if there is one.
    fn success(&mut self, _data: &[u8]) -> Result<(), MechanismError> {
        Ok(())
    }
}
