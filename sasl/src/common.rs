// Copyright (c) 2017 lumi <lumi@pew.im>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Types shared by all mechanisms.

/// The credentials a mechanism authenticates with.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// The authentication identity.
    pub username: Option<String>,

    /// The password belonging to `username`.
    pub password: Option<String>,

    /// The identity to act as, if different from `username`.
    pub authzid: Option<String>,
}

impl Credentials {
    /// Sets the username.
    pub fn with_username<N: Into<String>>(mut self, username: N) -> Credentials {
        self.username = Some(username.into());
        self
    }

    /// Sets the password.
    pub fn with_password<P: Into<String>>(mut self, password: P) -> Credentials {
        self.password = Some(password.into());
        self
    }

    /// Sets the authorization identity.
    pub fn with_authzid<A: Into<String>>(mut self, authzid: A) -> Credentials {
        self.authzid = Some(authzid.into());
        self
    }
}

// Never print the password.
impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("authzid", &self.authzid)
            .finish()
    }
}
