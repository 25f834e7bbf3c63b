//! Error types for soistamp-devices.

use thiserror::Error;

use crate::soi::size::GeometryFault;

#[derive(Debug, Error)]
pub enum Error {
    /// Effective geometry collapsed to a non-positive value. Aborts the pass.
    #[error("model {model}, instance {instance}: {fault}")]
    FatalGeometry {
        model: String,
        instance: String,
        fault: GeometryFault,
    },

    #[error("invalid device parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("unknown instance: {0}")]
    UnknownInstance(String),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("duplicate model: {0}")]
    DuplicateModel(String),

    #[error("duplicate instance: {0}")]
    DuplicateInstance(String),

    /// Stamp requested before matrix handles were acquired.
    #[error("instance {0} has no matrix handles; call setup first")]
    NotSetUp(String),
}

impl Error {
    /// Errors that must abort the whole stamping pass rather than be
    /// recorded against a single instance.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::FatalGeometry { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let fatal = Error::FatalGeometry {
            model: "nch".into(),
            instance: "M1".into(),
            fault: GeometryFault::EffectiveLength { value: 0.0 },
        };
        assert!(fatal.is_fatal());
        assert!(fatal.to_string().contains("M1"));

        let soft = Error::NotSetUp("M1".into());
        assert!(!soft.is_fatal());
    }
}
