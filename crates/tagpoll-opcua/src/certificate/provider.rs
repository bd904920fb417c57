// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client identity provisioning.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose,
    IsCa, KeyPair, KeyUsagePurpose, SanType,
};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;

use crate::error::{CertificateError, OpcUaError, OpcUaResult, OperationError};

/// RSA modulus size for generated keys.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Validity horizon of generated certificates.
pub const DEFAULT_VALIDITY_DAYS: i64 = 3650;

const URI_SUFFIX_LEN: usize = 8;

// =============================================================================
// ClientIdentity
// =============================================================================

/// A certificate and private key presented on the secure channel.
#[derive(Clone)]
pub struct ClientIdentity {
    /// Certificate (DER).
    pub certificate_der: Vec<u8>,
    /// Private key (PKCS#8 PEM).
    pub private_key_pem: String,
    /// Application URI bound into the certificate's SAN.
    pub application_uri: String,
    /// Subject common name.
    pub common_name: String,
    /// Not valid before.
    pub not_before: DateTime<Utc>,
    /// Not valid after.
    pub not_after: DateTime<Utc>,
}

impl ClientIdentity {
    /// Returns `true` if the certificate is currently valid.
    pub fn is_valid(&self) -> bool {
        let now = Utc::now();
        now >= self.not_before && now <= self.not_after
    }

    /// Returns the number of days until expiration.
    pub fn days_until_expiration(&self) -> i64 {
        (self.not_after - Utc::now()).num_days()
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("application_uri", &self.application_uri)
            .field("common_name", &self.common_name)
            .field("certificate_len", &self.certificate_der.len())
            .field("private_key", &"<redacted>")
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish()
    }
}

// =============================================================================
// IdentityProvider
// =============================================================================

/// Source of client identities.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Produces an identity whose application URI embeds `hint`.
    async fn provision(&self, hint: &str) -> OpcUaResult<ClientIdentity>;
}

/// Generates a fresh self-signed RSA identity per call.
#[derive(Debug, Clone)]
pub struct SelfSignedProvider {
    key_bits: usize,
    validity_days: i64,
}

impl SelfSignedProvider {
    /// Creates a provider with a 2048-bit key and a 10 year validity.
    pub fn new() -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
            validity_days: DEFAULT_VALIDITY_DAYS,
        }
    }

    /// Sets the validity horizon in days.
    pub fn with_validity_days(mut self, days: i64) -> Self {
        self.validity_days = days;
        self
    }

    /// Generates an identity on the current thread.
    ///
    /// RSA key generation is CPU heavy; async callers go through
    /// [`IdentityProvider::provision`], which runs this on the blocking pool.
    pub fn generate(&self, hint: &str) -> OpcUaResult<ClientIdentity> {
        let uri = application_uri(hint)?;
        let common_name = format!("{} client", hint);

        let mut rng = rand::thread_rng();
        let rsa_key = RsaPrivateKey::new(&mut rng, self.key_bits)
            .map_err(|e| CertificateError::key_generation(e.to_string()))?;
        let private_key_pem = rsa_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CertificateError::encoding(format!("PKCS#8 encoding: {}", e)))?
            .to_string();

        let key_pair = KeyPair::from_pem_and_sign_algo(&private_key_pem, &rcgen::PKCS_RSA_SHA256)
            .map_err(|e| CertificateError::encoding(format!("Key import: {}", e)))?;

        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, &common_name);
        params.distinguished_name = dn;

        let not_before = ::time::OffsetDateTime::now_utc();
        let not_after = not_before + ::time::Duration::days(self.validity_days);
        params.not_before = not_before;
        params.not_after = not_after;

        params.subject_alt_names = vec![SanType::URI(
            uri.clone()
                .try_into()
                .map_err(|e: rcgen::Error| CertificateError::invalid_uri(&uri, e.to_string()))?,
        )];
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::ContentCommitment,
            KeyUsagePurpose::KeyEncipherment,
            KeyUsagePurpose::DataEncipherment,
            KeyUsagePurpose::KeyCertSign,
        ];
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];

        let certificate = params
            .self_signed(&key_pair)
            .map_err(|e| CertificateError::encoding(format!("Self-signing: {}", e)))?;

        Ok(ClientIdentity {
            certificate_der: certificate.der().to_vec(),
            private_key_pem,
            application_uri: uri,
            common_name,
            not_before: to_chrono(not_before)?,
            not_after: to_chrono(not_after)?,
        })
    }
}

impl Default for SelfSignedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for SelfSignedProvider {
    async fn provision(&self, hint: &str) -> OpcUaResult<ClientIdentity> {
        let provider = self.clone();
        let hint = hint.to_string();

        let identity = tokio::task::spawn_blocking(move || provider.generate(&hint))
            .await
            .map_err(|e| {
                OpcUaError::operation(OperationError::worker_failed("provision", e.to_string()))
            })??;

        tracing::debug!(
            application_uri = %identity.application_uri,
            not_after = %identity.not_after,
            "Provisioned client identity"
        );
        Ok(identity)
    }
}

/// Builds `urn:<hint>:client-<8 random alphanumerics>`.
///
/// The hint must be non-empty and limited to ASCII letters, digits, `-`, `_`
/// and `.`.
pub fn application_uri(hint: &str) -> OpcUaResult<String> {
    let valid = !hint.is_empty()
        && hint
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(CertificateError::invalid_uri(
            format!("urn:{}:client-", hint),
            "identity hint must be non-empty ASCII letters, digits, '-', '_' or '.'",
        )
        .into());
    }

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(URI_SUFFIX_LEN)
        .map(char::from)
        .collect();

    Ok(format!("urn:{}:client-{}", hint, suffix))
}

fn to_chrono(t: ::time::OffsetDateTime) -> OpcUaResult<DateTime<Utc>> {
    DateTime::from_timestamp(t.unix_timestamp(), 0)
        .ok_or_else(|| CertificateError::encoding("validity out of range").into())
}

// =============================================================================
// Tests
// =============================================================================
