// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Endpoint selection and discovery diagnostics.

use crate::certificate::log_server_certificate;
use crate::types::{AuthMode, EndpointDescription};

/// Picks the most secure endpoint that accepts `auth_mode`.
///
/// Endpoints are filtered on their advertised user token policies, then the
/// highest `security_level` wins. Ties keep the first-seen endpoint.
///
/// # Examples
///
/// ```
/// use tagpoll_opcua::endpoint::select_endpoint;
/// use tagpoll_opcua::types::{AuthMode, EndpointDescription, UserTokenKind, UserTokenPolicy};
///
/// let endpoints = vec![
///     EndpointDescription::new("opc.tcp://plc:4840")
///         .with_token(UserTokenPolicy::new("anon", UserTokenKind::Anonymous)),
/// ];
///
/// assert!(select_endpoint(&endpoints, AuthMode::Anonymous).is_some());
/// assert!(select_endpoint(&endpoints, AuthMode::UsernamePassword).is_none());
/// ```
pub fn select_endpoint(
    endpoints: &[EndpointDescription],
    auth_mode: AuthMode,
) -> Option<&EndpointDescription> {
    endpoints
        .iter()
        .filter(|endpoint| endpoint.supports(auth_mode))
        .fold(None, |best: Option<&EndpointDescription>, candidate| match best {
            Some(current) if current.security_level >= candidate.security_level => Some(current),
            _ => Some(candidate),
        })
}

/// Logs every discovered endpoint with its server and token details.
pub fn log_endpoints(endpoints: &[EndpointDescription]) {
    tracing::info!(count = endpoints.len(), "Discovered endpoints");

    for (index, endpoint) in endpoints.iter().enumerate() {
        tracing::info!(
            index,
            endpoint = %endpoint.endpoint_url,
            security_mode = %endpoint.security_mode,
            security_policy = %endpoint.security_policy_name(),
            security_level = endpoint.security_level,
            transport_profile = %endpoint.transport_profile_uri,
            "Endpoint"
        );

        let server = &endpoint.server;
        tracing::info!(
            application_uri = %server.application_uri,
            product_uri = %server.product_uri,
            application_name = %server.application_name,
            application_type = %server.application_type,
            gateway_server_uri = %server.gateway_server_uri,
            discovery_profile_uri = %server.discovery_profile_uri,
            discovery_urls = ?server.discovery_urls,
            "  Server"
        );

        log_server_certificate(&endpoint.endpoint_url, &endpoint.server_certificate);

        for policy in &endpoint.user_identity_tokens {
            tracing::info!(
                policy_id = %policy.policy_id,
                token_type = %policy.token_type,
                issued_token_type = %policy.issued_token_type,
                issuer_endpoint_url = %policy.issuer_endpoint_url,
                security_policy = %policy.security_policy_uri,
                "  User token policy"
            );
        }
    }
}
