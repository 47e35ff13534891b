//! Engine error taxonomy.

use std::path::PathBuf;
use thiserror::Error;

use crate::node::NodeId;

/// Closed set of errors raised by public operations on [`crate::server::Server`]
/// and its nodes.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A numeric value was outside the valid range for the property/argument.
    #[error("value {value} out of range [{min}, {max}] for {what}")]
    Range {
        /// What the out-of-range value was for (property name, argument, etc).
        what: String,
        /// The rejected value.
        value: f64,
        /// Minimum accepted value.
        min: f64,
        /// Maximum accepted value.
        max: f64,
    },

    /// A `NodeId`/handle did not refer to a live node.
    #[error("invalid node handle {0:?}")]
    InvalidHandle(NodeId),

    /// A property slot index did not exist on the target node.
    #[error("node {node:?} has no property at slot {slot}")]
    InvalidProperty {
        /// The node the caller addressed.
        node: NodeId,
        /// The property slot index that does not exist.
        slot: u32,
    },

    /// A property was addressed with the wrong [`crate::property::PropertyValue`] variant.
    #[error("type mismatch on node {node:?} property {slot}: expected {expected}, got {got}")]
    TypeMismatch {
        /// The node the caller addressed.
        node: NodeId,
        /// The property slot index.
        slot: u32,
        /// The type the property actually holds.
        expected: &'static str,
        /// The type the caller supplied.
        got: &'static str,
    },

    /// The requested edge would introduce a cycle into the node graph.
    #[error("adding this edge would create a cycle in the node graph")]
    GraphCycle,

    /// An I/O operation (reading an HRTF dataset, a config file) failed.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A binary format (HRTF dataset, etc) failed to parse.
    #[error("unrecognized or corrupt format: {0}")]
    UnknownFormat(String),

    /// An internal invariant was violated. Never expected in correct usage;
    /// recorded instead of panicking so the audio thread never unwinds.
    #[error("internal engine error: {0}")]
    Internal(String),
}

/// Numeric error code for any future ABI-style boundary. `EngineError` is
/// losslessly convertible to this — no information is required to flow the
/// other way, since no ABI surface is preserved by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    /// See [`EngineError::Range`].
    Range = 1,
    /// See [`EngineError::InvalidHandle`].
    InvalidHandle = 2,
    /// See [`EngineError::InvalidProperty`].
    InvalidProperty = 3,
    /// See [`EngineError::TypeMismatch`].
    TypeMismatch = 4,
    /// See [`EngineError::GraphCycle`].
    GraphCycle = 5,
    /// See [`EngineError::Io`].
    Io = 6,
    /// See [`EngineError::UnknownFormat`].
    UnknownFormat = 7,
    /// See [`EngineError::Internal`].
    Internal = 8,
}

impl EngineError {
    /// Maps this error to its numeric [`ErrorCode`].
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            EngineError::Range { .. } => ErrorCode::Range,
            EngineError::InvalidHandle(_) => ErrorCode::InvalidHandle,
            EngineError::InvalidProperty { .. } => ErrorCode::InvalidProperty,
            EngineError::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            EngineError::GraphCycle => ErrorCode::GraphCycle,
            EngineError::Io { .. } => ErrorCode::Io,
            EngineError::UnknownFormat(_) => ErrorCode::UnknownFormat,
            EngineError::Internal(_) => ErrorCode::Internal,
        }
    }
}

/// Convenience alias used throughout the crate's public API.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping_is_total() {
        let errors = [
            EngineError::Range { what: "x".into(), value: 2.0, min: 0.0, max: 1.0 },
            EngineError::GraphCycle,
            EngineError::Internal("oops".into()),
        ];
        for e in &errors {
            let _code = e.to_error_code();
        }
    }

    #[test]
    fn test_display_includes_context() {
        let e = EngineError::InvalidProperty { node: NodeId::new(3, 1), slot: 7 };
        let msg = format!("{e}");
        assert!(msg.contains('7'));
    }
}
