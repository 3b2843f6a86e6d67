//! Argument-less commands that reload configuration or report status.
//!
//! The reload commands are synchronous on the FreeSWITCH side: once the
//! reply is in, the new configuration is live.

use super::ApiCommand;
use std::fmt;

/// Re-read the XML configuration tree: `reloadxml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReloadXml;

impl fmt::Display for ReloadXml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("reloadxml")
    }
}

impl ApiCommand for ReloadXml {}

/// Reload access control lists: `reloadacl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReloadAcl;

impl fmt::Display for ReloadAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("reloadacl")
    }
}

impl ApiCommand for ReloadAcl {}

/// Rescan all sofia profiles for new gateways: `rescan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rescan;

impl fmt::Display for Rescan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("rescan")
    }
}

impl ApiCommand for Rescan {}

/// Uptime and session counters: `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status;

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("status")
    }
}

impl ApiCommand for Status {}
