//! Builders for `sofia` (SIP stack) commands.

use super::{single_word, ApiCommand};
use crate::error::EslResult;
use std::fmt;

/// Free-form sofia command against a profile: `sofia <profile> <command>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sofia {
    /// Profile name, or a sofia keyword such as `status`.
    pub profile: String,
    /// Remainder of the command line.
    pub command: String,
}

impl fmt::Display for Sofia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sofia {} {}", self.profile, self.command)
    }
}

impl ApiCommand for Sofia {
    fn validate(&self) -> EslResult<()> {
        single_word("profile", &self.profile)
    }
}

/// Profile-level operation for [`SofiaProfile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileAction {
    /// Tear down and restart the profile, dropping its registrations.
    Restart,
    /// Pick up new or changed gateways without a restart.
    Rescan,
    /// Remove one gateway so the next rescan re-creates it.
    KillGateway(String),
}

/// `sofia profile <profile> restart|rescan|killgw <gateway>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SofiaProfile {
    pub profile: String,
    pub action: ProfileAction,
}

impl SofiaProfile {
    pub fn restart(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            action: ProfileAction::Restart,
        }
    }

    pub fn rescan(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            action: ProfileAction::Rescan,
        }
    }

    pub fn kill_gateway(profile: impl Into<String>, gateway: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            action: ProfileAction::KillGateway(gateway.into()),
        }
    }
}

impl fmt::Display for SofiaProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sofia profile {} ", self.profile)?;
        match &self.action {
            ProfileAction::Restart => f.write_str("restart"),
            ProfileAction::Rescan => f.write_str("rescan"),
            ProfileAction::KillGateway(gateway) => write!(f, "killgw {}", gateway),
        }
    }
}

impl ApiCommand for SofiaProfile {
    fn validate(&self) -> EslResult<()> {
        single_word("profile", &self.profile)?;
        if let ProfileAction::KillGateway(gateway) = &self.action {
            single_word("gateway", gateway)?;
        }
        Ok(())
    }
}
