//! Typed errors for the cases callers branch on.
//!
//! Everything else propagates as `anyhow::Error` with context.

use std::path::PathBuf;
use thiserror::Error;

/// JSON-RPC 2.0 error codes used by the tool protocol.
pub mod codes {
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Input errors raised before any validator runs.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("project path does not exist: {}", .0.display())]
    ProjectNotFound(PathBuf),

    #[error("project path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to prepare docs directory {}: {reason}", path.display())]
    DocsDirUnavailable { path: PathBuf, reason: String },

    #[error("unknown validator: {0}")]
    UnknownValidator(String),
}

/// Failure of a tool call, mapped onto a protocol error code.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid parameters for '{tool}': {message}")]
    InvalidParams { tool: String, message: String },

    #[error("{0}")]
    Internal(String),
}

impl ToolError {
    pub fn invalid_params(tool: &str, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            tool: tool.to_string(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::UnknownTool(_) => codes::METHOD_NOT_FOUND,
            Self::InvalidParams { .. } => codes::INVALID_PARAMS,
            Self::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Classify an error returned by a tool. Engine input errors count as
    /// invalid parameters; anything else is internal.
    pub fn classify(tool: &str, error: anyhow::Error) -> Self {
        let error = match error.downcast::<ToolError>() {
            Ok(tool_error) => return tool_error,
            Err(e) => e,
        };
        match error.downcast_ref::<EngineError>() {
            Some(EngineError::ProjectNotFound(_))
            | Some(EngineError::NotADirectory(_))
            | Some(EngineError::UnknownValidator(_)) => {
                Self::invalid_params(tool, error.to_string())
            }
            _ => Self::Internal(format!("{:#}", error)),
        }
    }
}
