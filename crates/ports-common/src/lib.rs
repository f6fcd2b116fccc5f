//! Ports Common Library
//!
//! Shared types, utilities, and error handling for the ports ingestion workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`PortsError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup driven by [`logging::LogConfig`]
//! - **Types**: the [`types::Port`] record and the [`types::Keyed`] capability
//!   used to restore identifiers that the source encoding keeps apart from the payload
//!
//! # Example
//!
//! ```
//! use ports_common::types::{inject_key, Keyed, Port};
//!
//! let mut port = Port::default();
//! inject_key(&mut port, "AEAJM");
//! assert_eq!(port.key(), "AEAJM");
//! ```
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{PortsError, Result};
