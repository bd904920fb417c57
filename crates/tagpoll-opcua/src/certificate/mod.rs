// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client identity for the secure channel.
//!
//! Every connection attempt gets a fresh self-signed identity. Nothing is
//! written to a persistent location; the protocol stack reads the pair from a
//! temporary PKI directory that disappears with the session.
//!
//! # Architecture
//!
//! ```text
//! IdentityProvider (trait)
//!         │
//!         └── SelfSignedProvider ── ClientIdentity
//!                                        │
//!                                        └── EphemeralPki (temp dir staging)
//!
//! inspect: server certificate decoding for endpoint diagnostics
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use tagpoll_opcua::certificate::{IdentityProvider, SelfSignedProvider};
//!
//! let identity = SelfSignedProvider::new().provision("tagpoll").await?;
//! assert!(identity.application_uri.starts_with("urn:tagpoll:client-"));
//! ```

mod inspect;
mod provider;
mod store;

pub use inspect::{inspect_certificate, log_server_certificate, ServerCertificateInfo};
pub use provider::{
    application_uri, ClientIdentity, IdentityProvider, SelfSignedProvider, DEFAULT_KEY_BITS,
    DEFAULT_VALIDITY_DAYS,
};
pub use store::EphemeralPki;
