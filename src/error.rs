//! Error types for routing and template processing.

use thiserror::Error;

/// Template pipeline errors. All of these are logged when they occur; they
/// are echoed into the response body only in dev mode.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to load template '{path}': {reason}")]
    Load { path: String, reason: String },

    #[error("failed to parse template '{path}': {reason}")]
    Parse { path: String, reason: String },

    #[error("failed to render template '{path}': {reason}")]
    Exec { path: String, reason: String },
}

impl TemplateError {
    pub fn load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn parse(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn exec(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Exec {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Logical path of the template that failed.
    pub fn path(&self) -> &str {
        match self {
            Self::Load { path, .. } | Self::Parse { path, .. } | Self::Exec { path, .. } => path,
        }
    }
}

/// Errors detected while building the route table at startup.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route path must not be empty")]
    EmptyPath,

    #[error("route '{path}' refers to unknown controller '{controller}'")]
    UnknownController { path: String, controller: String },
}
