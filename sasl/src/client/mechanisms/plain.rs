// Copyright (c) 2017 lumi <lumi@pew.im>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Provides the SASL "PLAIN" mechanism.

use crate::client::{Mechanism, MechanismError};
use crate::common::Credentials;

/// A struct for the SASL PLAIN mechanism.
pub struct Plain {
    authzid: Option<String>,
    username: String,
    password: String,
}

impl Plain {
    /// Constructs a new struct for authenticating using the SASL PLAIN mechanism.
    ///
    /// It is recommended that instead you use a `Credentials` struct and turn it into the
    /// requested mechanism using `from_credentials`.
    pub fn new<N: Into<String>, P: Into<String>>(username: N, password: P) -> Plain {
        Plain {
            authzid: None,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Builds the mechanism from credentials holding both a username and a
    /// password.
    pub fn from_credentials(credentials: Credentials) -> Result<Plain, MechanismError> {
        match credentials {
            Credentials {
                username: Some(username),
                password: Some(password),
                authzid,
            } => Ok(Plain {
                authzid,
                username,
                password,
            }),
            _ => Err(MechanismError::PlainRequiresUsernameAndPassword),
        }
    }
}

impl Mechanism for Plain {
    fn name(&self) -> &str {
        "PLAIN"
    }

    fn initial(&mut self) -> Vec<u8> {
        let mut auth = Vec::new();
        if let Some(ref authzid) = self.authzid {
            auth.extend(authzid.bytes());
        }
        auth.push(0);
        auth.extend(self.username.bytes());
        auth.push(0);
        auth.extend(self.password.bytes());
        auth
    }
}
