// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA status codes used by the connector.
//!
//! Only the codes the connector reasons about are named here. Everything else
//! is carried around as a raw `u32` and rendered in hex.

/// Good.
pub const GOOD: u32 = 0x0000_0000;
/// Generic bad.
pub const BAD: u32 = 0x8000_0000;
/// BadUnexpectedError.
pub const BAD_UNEXPECTED_ERROR: u32 = 0x8001_0000;
/// BadInternalError.
pub const BAD_INTERNAL_ERROR: u32 = 0x8002_0000;
/// BadCommunicationError.
pub const BAD_COMMUNICATION_ERROR: u32 = 0x8005_0000;
/// BadDecodingError.
pub const BAD_DECODING_ERROR: u32 = 0x8007_0000;
/// BadTimeout.
pub const BAD_TIMEOUT: u32 = 0x800A_0000;
/// BadServiceUnsupported.
pub const BAD_SERVICE_UNSUPPORTED: u32 = 0x800B_0000;
/// BadShutdown.
pub const BAD_SHUTDOWN: u32 = 0x800C_0000;
/// BadServerNotConnected.
pub const BAD_SERVER_NOT_CONNECTED: u32 = 0x800D_0000;
/// BadTooManyOperations.
pub const BAD_TOO_MANY_OPERATIONS: u32 = 0x8010_0000;
/// BadCertificateInvalid.
pub const BAD_CERTIFICATE_INVALID: u32 = 0x8012_0000;
/// BadSecurityChecksFailed.
pub const BAD_SECURITY_CHECKS_FAILED: u32 = 0x8013_0000;
/// BadUserAccessDenied.
pub const BAD_USER_ACCESS_DENIED: u32 = 0x801F_0000;
/// BadIdentityTokenInvalid.
pub const BAD_IDENTITY_TOKEN_INVALID: u32 = 0x8020_0000;
/// BadIdentityTokenRejected.
pub const BAD_IDENTITY_TOKEN_REJECTED: u32 = 0x8021_0000;
/// BadSessionIdInvalid.
pub const BAD_SESSION_ID_INVALID: u32 = 0x8025_0000;
/// BadSessionClosed.
pub const BAD_SESSION_CLOSED: u32 = 0x8026_0000;
/// BadSessionNotActivated.
pub const BAD_SESSION_NOT_ACTIVATED: u32 = 0x8027_0000;
/// BadNodeIdInvalid.
pub const BAD_NODE_ID_INVALID: u32 = 0x8033_0000;
/// BadNodeIdUnknown.
pub const BAD_NODE_ID_UNKNOWN: u32 = 0x8034_0000;
/// BadAttributeIdInvalid. Reported when an attribute does not apply to a node class.
pub const BAD_ATTRIBUTE_ID_INVALID: u32 = 0x8035_0000;
/// BadNotReadable.
pub const BAD_NOT_READABLE: u32 = 0x803A_0000;
/// BadNothingToDo.
pub const BAD_NOTHING_TO_DO: u32 = 0x800F_0000;
/// BadWaitingForInitialData.
pub const BAD_WAITING_FOR_INITIAL_DATA: u32 = 0x8032_0000;
/// BadNoCommunication.
pub const BAD_NO_COMMUNICATION: u32 = 0x8031_0000;
/// BadTcpEndpointUrlInvalid.
pub const BAD_TCP_ENDPOINT_URL_INVALID: u32 = 0x8083_0000;
/// BadConnectionRejected.
pub const BAD_CONNECTION_REJECTED: u32 = 0x80AC_0000;
/// BadDisconnect.
pub const BAD_DISCONNECT: u32 = 0x80AD_0000;
/// BadConnectionClosed.
pub const BAD_CONNECTION_CLOSED: u32 = 0x80AE_0000;

/// Status codes after which the session is unusable and must be rebuilt.
pub const SESSION_FATAL: [u32; 5] = [
    BAD_SESSION_ID_INVALID,
    BAD_COMMUNICATION_ERROR,
    BAD_CONNECTION_CLOSED,
    BAD_TIMEOUT,
    BAD_CONNECTION_REJECTED,
];

/// Mask selecting the status code proper, without info bits.
const CODE_MASK: u32 = 0xFFFF_0000;

/// Returns `true` when `code` forces the session to be torn down.
pub fn is_session_fatal(code: u32) -> bool {
    SESSION_FATAL.contains(&(code & CODE_MASK))
}

/// Returns `true` if the severity bits of `code` are Good.
#[inline]
pub fn is_good(code: u32) -> bool {
    code & 0xC000_0000 == 0
}

/// Returns `true` if the severity bits of `code` are Bad.
#[inline]
pub fn is_bad(code: u32) -> bool {
    code & 0x8000_0000 != 0
}

/// Returns the symbolic name of a status code, or `"Unknown"`.
pub fn status_code_name(code: u32) -> &'static str {
    match code & CODE_MASK {
        GOOD => "Good",
        BAD => "Bad",
        BAD_UNEXPECTED_ERROR => "BadUnexpectedError",
        BAD_INTERNAL_ERROR => "BadInternalError",
        BAD_COMMUNICATION_ERROR => "BadCommunicationError",
        BAD_DECODING_ERROR => "BadDecodingError",
        BAD_TIMEOUT => "BadTimeout",
        BAD_SERVICE_UNSUPPORTED => "BadServiceUnsupported",
        BAD_SHUTDOWN => "BadShutdown",
        BAD_SERVER_NOT_CONNECTED => "BadServerNotConnected",
        BAD_NOTHING_TO_DO => "BadNothingToDo",
        BAD_TOO_MANY_OPERATIONS => "BadTooManyOperations",
        BAD_CERTIFICATE_INVALID => "BadCertificateInvalid",
        BAD_SECURITY_CHECKS_FAILED => "BadSecurityChecksFailed",
        BAD_USER_ACCESS_DENIED => "BadUserAccessDenied",
        BAD_IDENTITY_TOKEN_INVALID => "BadIdentityTokenInvalid",
        BAD_IDENTITY_TOKEN_REJECTED => "BadIdentityTokenRejected",
        BAD_SESSION_ID_INVALID => "BadSessionIdInvalid",
        BAD_SESSION_CLOSED => "BadSessionClosed",
        BAD_SESSION_NOT_ACTIVATED => "BadSessionNotActivated",
        BAD_NO_COMMUNICATION => "BadNoCommunication",
        BAD_WAITING_FOR_INITIAL_DATA => "BadWaitingForInitialData",
        BAD_NODE_ID_INVALID => "BadNodeIdInvalid",
        BAD_NODE_ID_UNKNOWN => "BadNodeIdUnknown",
        BAD_ATTRIBUTE_ID_INVALID => "BadAttributeIdInvalid",
        BAD_NOT_READABLE => "BadNotReadable",
        BAD_TCP_ENDPOINT_URL_INVALID => "BadTcpEndpointUrlInvalid",
        BAD_CONNECTION_REJECTED => "BadConnectionRejected",
        BAD_DISCONNECT => "BadDisconnect",
        BAD_CONNECTION_CLOSED => "BadConnectionClosed",
        _ => "Unknown",
    }
}

// =============================================================================
// Tests
// =============================================================================
