//! Typed builders for the administrative `api` commands.
//!
//! Each builder renders, through `Display`, the exact text that follows
//! `api ` on the wire. Arguments that must be a single word (profile and
//! gateway names) are checked by [`ApiCommand::validate`] before sending.

pub mod reload;
pub mod sofia;

pub use reload::{ReloadAcl, ReloadXml, Rescan, Status};
pub use sofia::{ProfileAction, Sofia, SofiaProfile};

use crate::error::{EslError, EslResult};
use std::fmt::Display;

/// A command that can be issued with `api <command>`.
pub trait ApiCommand: Display {
    /// Reject arguments that would change the meaning of the command line.
    fn validate(&self) -> EslResult<()> {
        Ok(())
    }
}

/// Plain command text passes through as-is; framing is checked by the codec.
impl ApiCommand for str {}

impl ApiCommand for String {}

/// Fail unless `value` is one non-empty word.
pub(crate) fn single_word(name: &'static str, value: &str) -> EslResult<()> {
    if value.is_empty() || value.contains(char::is_whitespace) {
        return Err(EslError::InvalidArgument {
            name,
            value: value.to_string(),
        });
    }
    Ok(())
}
