//! Error taxonomy of the switching engine.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use limbswitch_scene_core::{LiteralError, Plug, SceneError};

/// Structural problems in a limb descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("{field}: {reason}")]
    BadName { field: &'static str, reason: String },
    #[error("fk_controls must list 3 or 4 controls, found {0}")]
    FkControlCount(usize),
    #[error("{field} must list {expected} entries, found {found}")]
    ListLength {
        field: &'static str,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum SwitchError {
    /// A described node or attribute does not exist in the scene.
    #[error("reference error")]
    Reference(#[from] SceneError),
    /// A required authored attribute is absent or unparsable.
    #[error("data error on '{plug}': {reason}")]
    Data { plug: Plug, reason: String },
    #[error("invalid limb descriptor")]
    Descriptor(#[from] DescriptorError),
}

impl SwitchError {
    pub(crate) fn literal(plug: &Plug, err: LiteralError) -> Self {
        SwitchError::Data {
            plug: plug.clone(),
            reason: err.to_string(),
        }
    }
}

pub type SwitchResult<T> = Result<T, SwitchError>;

/// Formats an error followed by every `source()` below it, `: `-separated.
pub struct ErrorChain<'a>(pub &'a (dyn StdError + 'static));

impl fmt::Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}
