// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client layer.
//!
//! - **Transport**: the [`UaTransport`] / [`UaSession`] seam over the protocol stack
//! - **Session management**: [`SessionManager`] owns the single live session
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      SessionManager                             │
//! │      (connect sequence, state machine, exclusive ownership)     │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 UaTransport  ──opens──▶  UaSession              │
//! │     RealOpcUaTransport (feature `real-transport`) or a mock     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod session;
pub mod transport;

#[cfg(feature = "real-transport")]
mod real_transport;

pub use session::{SessionManager, SessionState, SessionStats};
pub use transport::{
    cancellable, DataValue, OpcUaValue, ReadValueId, ReferenceDescription, SessionOptions,
    UaSession, UaTransport,
};

#[cfg(feature = "real-transport")]
pub use real_transport::RealOpcUaTransport;
