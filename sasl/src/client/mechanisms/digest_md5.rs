// Copyright (c) 2017 lumi <lumi@pew.im>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Provides the SASL "DIGEST-MD5" mechanism, as described in RFC 2831.
//!
//! Only the `auth` quality of protection is supported; integrity and
//! confidentiality layers are left to TLS.

use std::collections::HashMap;

use getrandom::getrandom;
use md5::{Digest, Md5};

use crate::client::{Mechanism, MechanismError};
use crate::common::Credentials;

const NONCE_COUNT: &str = "00000001";
const QOP_AUTH: &str = "auth";

enum State {
    /// Waiting for the server's digest-challenge.
    Initial,

    /// Our digest-response was sent; the server has to prove it knows the
    /// password with the given `rspauth`.
    ResponseSent { rspauth: String },

    /// The server proof was checked.
    Verified,
}

/// A struct for the SASL DIGEST-MD5 mechanism.
pub struct DigestMd5 {
    username: String,
    password: String,
    authzid: Option<String>,
    service: String,
    host: String,
    cnonce: Option<String>,
    state: State,
}

impl DigestMd5 {
    /// Constructs a new struct for authenticating using DIGEST-MD5.
    ///
    /// `service` and `host` make up the `digest-uri` the response is bound
    /// to, e.g. `xmpp` and `example.org`.
    pub fn new<N, P, S, H>(username: N, password: P, service: S, host: H) -> DigestMd5
    where
        N: Into<String>,
        P: Into<String>,
        S: Into<String>,
        H: Into<String>,
    {
        DigestMd5 {
            username: username.into(),
            password: password.into(),
            authzid: None,
            service: service.into(),
            host: host.into(),
            cnonce: None,
            state: State::Initial,
        }
    }

    /// Builds the mechanism from credentials holding both a username and a
    /// password.
    pub fn from_credentials<S: Into<String>, H: Into<String>>(
        credentials: Credentials,
        service: S,
        host: H,
    ) -> Result<DigestMd5, MechanismError> {
        match credentials {
            Credentials {
                username: Some(username),
                password: Some(password),
                authzid,
            } => {
                let mut mech = DigestMd5::new(username, password, service, host);
                mech.authzid = authzid;
                Ok(mech)
            }
            _ => Err(MechanismError::DigestMd5RequiresUsernameAndPassword),
        }
    }

    /// Use a fixed client nonce instead of a random one.
    ///
    /// This makes the response reproducible and is only useful for testing.
    pub fn with_cnonce<C: Into<String>>(mut self, cnonce: C) -> DigestMd5 {
        self.cnonce = Some(cnonce.into());
        self
    }

    fn digest_uri(&self) -> String {
        format!("{}/{}", self.service, self.host)
    }

    fn ha1(&self, realm: &str, nonce: &str, cnonce: &str) -> String {
        let secret = Md5::digest(format!("{}:{}:{}", self.username, realm, self.password));
        let mut a1 = secret.to_vec();
        a1.extend_from_slice(format!(":{}:{}", nonce, cnonce).as_bytes());
        if let Some(ref authzid) = self.authzid {
            a1.extend_from_slice(format!(":{}", authzid).as_bytes());
        }
        hex::encode(Md5::digest(&a1))
    }

    fn kd(ha1: &str, nonce: &str, cnonce: &str, a2: &str) -> String {
        let ha2 = hex::encode(Md5::digest(a2));
        hex::encode(Md5::digest(format!(
            "{}:{}:{}:{}:{}:{}",
            ha1, nonce, NONCE_COUNT, cnonce, QOP_AUTH, ha2
        )))
    }

    fn respond_to_digest_challenge(
        &mut self,
        directives: &HashMap<String, String>,
    ) -> Result<Vec<u8>, MechanismError> {
        let nonce = directives
            .get("nonce")
            .ok_or(MechanismError::MissingDirective("nonce"))?;
        // RFC 2831 § 2.1.1: an absent qop means "auth".
        if let Some(qop) = directives.get("qop") {
            if !qop.split(',').any(|q| q.trim() == QOP_AUTH) {
                return Err(MechanismError::UnsupportedQop);
            }
        }
        match directives.get("algorithm") {
            Some(algorithm) if algorithm == "md5-sess" => (),
            Some(_) => return Err(MechanismError::UnsupportedAlgorithm),
            None => return Err(MechanismError::MissingDirective("algorithm")),
        }
        let realm = directives
            .get("realm")
            .cloned()
            .unwrap_or_else(|| self.host.clone());
        let cnonce = match self.cnonce {
            Some(ref cnonce) => cnonce.clone(),
            None => {
                let mut raw = [0u8; 16];
                getrandom(&mut raw)?;
                hex::encode(raw)
            }
        };

        let digest_uri = self.digest_uri();
        let ha1 = self.ha1(&realm, nonce, &cnonce);
        let response = Self::kd(
            &ha1,
            nonce,
            &cnonce,
            &format!("AUTHENTICATE:{}", digest_uri),
        );
        let rspauth = Self::kd(&ha1, nonce, &cnonce, &format!(":{}", digest_uri));

        let mut out = format!(
            "username={},realm={},nonce={},cnonce={},nc={},qop={},digest-uri={},response={}",
            quote(&self.username),
            quote(&realm),
            quote(nonce),
            quote(&cnonce),
            NONCE_COUNT,
            QOP_AUTH,
            quote(&digest_uri),
            response,
        );
        if directives.get("charset").map(String::as_str) == Some("utf-8") {
            out.push_str(",charset=utf-8");
        }
        if let Some(ref authzid) = self.authzid {
            out.push_str(",authzid=");
            out.push_str(&quote(authzid));
        }

        self.state = State::ResponseSent { rspauth };
        Ok(out.into_bytes())
    }

    fn verify(&mut self, data: &[u8]) -> Result<(), MechanismError> {
        let expected = match self.state {
            State::ResponseSent { ref rspauth } => rspauth.clone(),
            _ => return Err(MechanismError::UnexpectedChallenge),
        };
        let directives = parse_directives(data)?;
        match directives.get("rspauth") {
            Some(received) if *received == expected => {
                self.state = State::Verified;
                Ok(())
            }
            Some(_) => Err(MechanismError::InvalidServerProof),
            None => Err(MechanismError::MissingDirective("rspauth")),
        }
    }
}

impl Mechanism for DigestMd5 {
    fn name(&self) -> &str {
        "DIGEST-MD5"
    }

    fn response(&mut self, challenge: &[u8]) -> Result<Vec<u8>, MechanismError> {
        match self.state {
            State::Initial => {
                let directives = parse_directives(challenge)?;
                self.respond_to_digest_challenge(&directives)
            }
            // The second challenge only carries the server proof, and is
            // acknowledged with an empty response.
            State::ResponseSent { .. } => {
                self.verify(challenge)?;
                Ok(Vec::new())
            }
            State::Verified => Err(MechanismError::UnexpectedChallenge),
        }
    }

    fn success(&mut self, data: &[u8]) -> Result<(), MechanismError> {
        match self.state {
            State::Verified => Ok(()),
            State::ResponseSent { .. } if !data.is_empty() => self.verify(data),
            // Some servers skip the proof altogether.
            State::ResponseSent { .. } => Ok(()),
            State::Initial => Err(MechanismError::InvalidServerProof),
        }
    }
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Parses a comma-separated list of `key=value` or `key="quoted value"`
/// directives.
fn parse_directives(data: &[u8]) -> Result<HashMap<String, String>, MechanismError> {
    let input = core::str::from_utf8(data).map_err(|_| MechanismError::CannotDecodeChallenge)?;
    let mut directives = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' {
                break;
            }
            key.push(c);
            chars.next();
        }
        if chars.next() != Some('=') {
            return Err(MechanismError::CannotDecodeChallenge);
        }
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            return Err(MechanismError::CannotDecodeChallenge);
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(escaped) => value.push(escaped),
                        None => return Err(MechanismError::CannotDecodeChallenge),
                    },
                    Some('"') => break,
                    Some(c) => value.push(c),
                    None => return Err(MechanismError::CannotDecodeChallenge),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                value.push(c);
                chars.next();
            }
            value = value.trim().to_owned();
        }

        // First occurrence wins.
        directives.entry(key).or_insert(value);
    }

    Ok(directives)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC_CHALLENGE: &[u8] = b"realm=\"elwood.innosoft.com\",nonce=\"OA6MG9tEQGm2hh\",qop=\"auth\",algorithm=md5-sess,charset=utf-8";

    fn response_directives(response: &[u8]) -> HashMap<String, String> {
        parse_directives(response).unwrap()
    }

    #[test]
    fn rfc2831_example() {
        let mut mech = DigestMd5::new("chris", "secret", "imap", "elwood.innosoft.com")
            .with_cnonce("OA6MHXh6VqTrRk");
        let response = mech.response(RFC_CHALLENGE).unwrap();
        let directives = response_directives(&response);
        assert_eq!(
            directives["response"],
            "d388dad90d4bbd760a152321f2143af7"
        );
        assert_eq!(directives["digest-uri"], "imap/elwood.innosoft.com");
        assert_eq!(directives["nc"], "00000001");
        assert_eq!(directives["qop"], "auth");
        assert_eq!(directives["charset"], "utf-8");

        let proof = mech
            .response(b"rspauth=ea40f60335c427b5527b84dbabcdfffd")
            .unwrap();
        assert!(proof.is_empty());
        mech.success(b"").unwrap();
    }

    #[test]
    fn fixed_inputs_are_reproducible() {
        let challenge = b"realm=\"example.net\",nonce=\"abcdef0123\",qop=\"auth\",algorithm=md5-sess";
        let run = || {
            DigestMd5::new("romeo", "pw", "xmpp", "example.net")
                .with_cnonce("fixed-cnonce")
                .response(challenge)
                .unwrap()
        };
        let first = run();
        assert_eq!(first, run());
        let directives = response_directives(&first);
        assert_eq!(directives["username"], "romeo");
        assert_eq!(directives["realm"], "example.net");
        assert_eq!(directives["digest-uri"], "xmpp/example.net");
        assert!(!directives.contains_key("charset"));
    }

    #[test]
    fn realm_defaults_to_host() {
        let mut mech =
            DigestMd5::new("romeo", "pw", "xmpp", "example.net").with_cnonce("c");
        let response = mech
            .response(b"nonce=\"n\",qop=\"auth\",algorithm=md5-sess")
            .unwrap();
        assert_eq!(response_directives(&response)["realm"], "example.net");
    }

    #[test]
    fn wrong_server_proof() {
        let mut mech = DigestMd5::new("chris", "secret", "imap", "elwood.innosoft.com")
            .with_cnonce("OA6MHXh6VqTrRk");
        mech.response(RFC_CHALLENGE).unwrap();
        assert_eq!(
            mech.response(b"rspauth=00000000000000000000000000000000"),
            Err(MechanismError::InvalidServerProof)
        );
    }

    #[test]
    fn proof_in_success_data() {
        let mut mech = DigestMd5::new("chris", "secret", "imap", "elwood.innosoft.com")
            .with_cnonce("OA6MHXh6VqTrRk");
        mech.response(RFC_CHALLENGE).unwrap();
        mech.success(b"rspauth=ea40f60335c427b5527b84dbabcdfffd")
            .unwrap();
    }

    #[test]
    fn rejects_auth_int_only() {
        let mut mech = DigestMd5::new("romeo", "pw", "xmpp", "example.net");
        assert_eq!(
            mech.response(b"nonce=\"n\",qop=\"auth-int\",algorithm=md5-sess"),
            Err(MechanismError::UnsupportedQop)
        );
    }

    #[test]
    fn missing_nonce() {
        let mut mech = DigestMd5::new("romeo", "pw", "xmpp", "example.net");
        assert_eq!(
            mech.response(b"realm=\"x\",algorithm=md5-sess"),
            Err(MechanismError::MissingDirective("nonce"))
        );
    }

    #[test]
    fn directive_parsing() {
        let parsed =
            parse_directives(b" a=\"quoted, with comma\" , b=plain,c=\"esc\\\"aped\"").unwrap();
        assert_eq!(parsed["a"], "quoted, with comma");
        assert_eq!(parsed["b"], "plain");
        assert_eq!(parsed["c"], "esc\"aped");
        assert!(parse_directives(b"novalue").is_err());
        assert!(parse_directives(b"a=\"unterminated").is_err());
    }

    #[test]
    fn quoting() {
        assert_eq!(quote("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }
}
