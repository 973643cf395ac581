//! Errors raised while validating endpoints and encoding share links.

use thiserror::Error;

/// Errors from the address resolver and the protocol encoders.
///
/// `EmptyHost`, `InvalidPort` and `UnsupportedParameter` are validation
/// failures: always local, never retried. `Encoding` means credential
/// material could not be serialized; it is fatal to one link only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("host is empty")]
    EmptyHost,

    #[error("invalid port {0}, expected 1-65535")]
    InvalidPort(u32),

    #[error("unsupported parameter {name}: {value}")]
    UnsupportedParameter { name: String, value: String },

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl LinkError {
    pub fn unsupported(name: &str, value: impl Into<String>) -> Self {
        LinkError::UnsupportedParameter {
            name: name.to_string(),
            value: value.into(),
        }
    }

    /// A required parameter that was not set.
    pub fn missing(name: &str) -> Self {
        Self::unsupported(name, "<missing>")
    }

    pub fn is_validation(&self) -> bool {
        !matches!(self, LinkError::Encoding(_))
    }
}
