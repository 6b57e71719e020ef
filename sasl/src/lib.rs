// Copyright (c) 2017 lumi <lumi@pew.im>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! This crate provides a way to perform the client side of SASL
//! authentication, independently of the protocol carrying the exchange.
//!
//! # Examples
//!
//! ```rust
//! use sasl::client::Mechanism;
//! use sasl::client::mechanisms::Plain;
//!
//! let mut mechanism = Plain::new("user", "pencil");
//!
//! assert_eq!(mechanism.name(), "PLAIN");
//! assert_eq!(mechanism.initial(), b"\0user\0pencil");
//! ```
//!
//! DIGEST-MD5 needs the service name and host the digest is bound to:
//!
//! ```rust
//! use sasl::client::Mechanism;
//! use sasl::client::mechanisms::DigestMd5;
//!
//! let mut mechanism = DigestMd5::new("user", "pencil", "xmpp", "example.org");
//! assert_eq!(mechanism.name(), "DIGEST-MD5");
//! assert!(mechanism.initial().is_empty());
//! ```

#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod client;
pub mod common;
