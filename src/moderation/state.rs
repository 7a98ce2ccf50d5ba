//! Spot lifecycle transitions.
//!
//! ```text
//! Pending ──approve──▶ Approved
//!    │
//!    └────reject────▶ Rejected
//! ```
//!
//! Both targets are terminal.

use crate::store::records::SpotStatus;
use std::fmt;
use std::str::FromStr;

/// A moderator decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModerationAction {
    /// Publish the spot and pay the author.
    Approve,
    /// Refuse the spot.
    Reject,
}

impl ModerationAction {
    /// Status the spot ends up in.
    pub fn target(self) -> SpotStatus {
        match self {
            ModerationAction::Approve => SpotStatus::Approved,
            ModerationAction::Reject => SpotStatus::Rejected,
        }
    }
}

impl fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModerationAction::Approve => "approve",
            ModerationAction::Reject => "reject",
        })
    }
}

impl FromStr for ModerationAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(ModerationAction::Approve),
            "reject" => Ok(ModerationAction::Reject),
            _ => Err(()),
        }
    }
}

/// Next status, or `None` when the transition is not defined.
pub fn transition(current: SpotStatus, action: ModerationAction) -> Option<SpotStatus> {
    if current.is_terminal() {
        None
    } else {
        Some(action.target())
    }
}
