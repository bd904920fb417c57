// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Server certificate decoding for endpoint diagnostics.

use std::net::{Ipv4Addr, Ipv6Addr};

use serde::Serialize;
use x509_parser::extensions::GeneralName;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::{parse_x509_certificate, X509Certificate};

use crate::error::{CertificateError, OpcUaResult};

/// The parts of a server certificate worth logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerCertificateInfo {
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Not valid before.
    pub not_before: String,
    /// Not valid after.
    pub not_after: String,
    /// DNS subject alternative names.
    pub dns_names: Vec<String>,
    /// IP address subject alternative names.
    pub ip_addresses: Vec<String>,
    /// URI subject alternative names.
    pub uris: Vec<String>,
}

/// Decodes a DER or PEM certificate.
pub fn inspect_certificate(bytes: &[u8]) -> OpcUaResult<ServerCertificateInfo> {
    if bytes.starts_with(b"-----BEGIN") {
        let (_, pem) = parse_x509_pem(bytes)
            .map_err(|e| CertificateError::server_certificate(format!("PEM: {}", e)))?;
        let cert = pem
            .parse_x509()
            .map_err(|e| CertificateError::server_certificate(e.to_string()))?;
        return Ok(describe(&cert));
    }

    let (_, cert) = parse_x509_certificate(bytes)
        .map_err(|e| CertificateError::server_certificate(e.to_string()))?;
    Ok(describe(&cert))
}

fn describe(cert: &X509Certificate<'_>) -> ServerCertificateInfo {
    let mut info = ServerCertificateInfo {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        not_before: cert.validity().not_before.to_string(),
        not_after: cert.validity().not_after.to_string(),
        dns_names: Vec::new(),
        ip_addresses: Vec::new(),
        uris: Vec::new(),
    };

    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            match name {
                GeneralName::DNSName(dns) => info.dns_names.push(dns.to_string()),
                GeneralName::URI(uri) => info.uris.push(uri.to_string()),
                GeneralName::IPAddress(ip) => info.ip_addresses.push(format_ip(ip)),
                _ => {}
            }
        }
    }

    info
}

fn format_ip(bytes: &[u8]) -> String {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        Ipv4Addr::from(octets).to_string()
    } else if let Ok(octets) = <[u8; 16]>::try_from(bytes) {
        Ipv6Addr::from(octets).to_string()
    } else {
        format!("{:02x?}", bytes)
    }
}

/// Logs the server certificate of an endpoint.
///
/// Decoding failures are logged and otherwise ignored.
pub fn log_server_certificate(endpoint_url: &str, bytes: &[u8]) {
    if bytes.is_empty() {
        tracing::info!(endpoint = %endpoint_url, "  Server certificate: none");
        return;
    }

    match inspect_certificate(bytes) {
        Ok(info) => tracing::info!(
            endpoint = %endpoint_url,
            subject = %info.subject,
            not_before = %info.not_before,
            not_after = %info.not_after,
            dns_names = ?info.dns_names,
            ip_addresses = ?info.ip_addresses,
            uris = ?info.uris,
            "  Server certificate"
        ),
        Err(e) => tracing::error!(
            endpoint = %endpoint_url,
            error = %e,
            "  Failed to decode server certificate"
        ),
    }
}
