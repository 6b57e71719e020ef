// Copyright (c) 2017 Astro <astro@spaceboyz.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::fmt;

use zeroize::Zeroize;

/// Who to authenticate as, and with what.
///
/// The secret is wiped from memory as soon as authentication succeeds.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    secret: Option<String>,
    resource: String,
}

impl Credentials {
    /// Credentials for `username` with `secret`, binding `resource`.
    ///
    /// An empty resource lets the server pick one.
    pub fn new<U, S, R>(username: U, secret: S, resource: R) -> Credentials
    where
        U: Into<String>,
        S: Into<String>,
        R: Into<String>,
    {
        Credentials {
            username: username.into(),
            secret: Some(secret.into()),
            resource: resource.into(),
        }
    }

    /// The user name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The secret, unless it was already discarded.
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    /// The resource to bind.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Overwrite and drop the secret.
    pub fn discard_secret(&mut self) {
        if let Some(mut secret) = self.secret.take() {
            secret.zeroize();
        }
    }
}

impl Drop for Credentials {
    fn drop(&mut self) {
        self.discard_secret();
    }
}

// Never print the secret.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("resource", &self.resource)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discard() {
        let mut creds = Credentials::new("romeo", "pw", "Home");
        assert_eq!(creds.secret(), Some("pw"));
        creds.discard_secret();
        assert_eq!(creds.secret(), None);
        assert_eq!(creds.username(), "romeo");
        assert_eq!(creds.resource(), "Home");
    }

    #[test]
    fn debug_hides_secret() {
        let creds = Credentials::new("romeo", "hunter2", "Home");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("romeo"));
        assert!(!printed.contains("hunter2"));
    }
}
