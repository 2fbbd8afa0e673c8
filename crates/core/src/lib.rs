//! Keywheel core - shared identifier and secret primitives
//!
//! Foundation types used across the rotation engine:
//!
//! - Validated identifiers ([`SecretId`]) and UUID-backed record ids
//!   ([`ExecutionId`], [`RequestId`], [`AuditEntryId`])
//! - [`SecretString`] with closure-scoped access and automatic zeroization

pub mod error;
pub mod id;
pub mod secret;

pub use crate::error::ValidationError;
pub use crate::id::{AuditEntryId, ExecutionId, RequestId, SecretId};
pub use crate::secret::SecretString;
