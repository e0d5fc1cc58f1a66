//! Admin moderation actions shared by talents, communities and products

use serde::Deserialize;
use std::fmt;

use crate::models::ModerationStatus;
use crate::services::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Approve,
    Reject,
    Ban,
    Unban,
}

impl ModerationAction {
    pub fn target(self) -> ModerationStatus {
        match self {
            ModerationAction::Approve | ModerationAction::Unban => ModerationStatus::Approved,
            ModerationAction::Reject => ModerationStatus::Rejected,
            ModerationAction::Ban => ModerationStatus::Banned,
        }
    }

    /// The status `current` moves to, or a validation error naming both ends.
    ///
    /// `approve` is for pending and rejected records; a banned record comes
    /// back only through `unban`.
    pub fn apply(self, current: ModerationStatus) -> ServiceResult<ModerationStatus> {
        let next = self.target();
        let allowed = match self {
            ModerationAction::Unban => current == ModerationStatus::Banned,
            ModerationAction::Approve => current != ModerationStatus::Banned && current.can_transition_to(next),
            _ => current.can_transition_to(next),
        };

        if allowed {
            Ok(next)
        } else {
            Err(ServiceError::bad_transition(current, next))
        }
    }
}

impl fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModerationAction::Approve => "approve",
            ModerationAction::Reject => "reject",
            ModerationAction::Ban => "ban",
            ModerationAction::Unban => "unban",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ModerationStatus::*;

    #[test]
    fn test_actions_follow_state_machine() {
        assert_eq!(ModerationAction::Approve.apply(Pending).unwrap(), Approved);
        assert_eq!(ModerationAction::Approve.apply(Rejected).unwrap(), Approved);
        assert_eq!(ModerationAction::Reject.apply(Pending).unwrap(), Rejected);
        assert_eq!(ModerationAction::Ban.apply(Approved).unwrap(), Banned);
        assert_eq!(ModerationAction::Unban.apply(Banned).unwrap(), Approved);
    }

    #[test]
    fn test_disallowed_actions() {
        assert!(ModerationAction::Ban.apply(Pending).is_err());
        assert!(ModerationAction::Unban.apply(Pending).is_err());
        assert!(ModerationAction::Approve.apply(Banned).is_err());
        assert!(ModerationAction::Approve.apply(Approved).is_err());
        assert!(ModerationAction::Reject.apply(Approved).is_err());
    }

    #[test]
    fn test_error_names_both_statuses() {
        let err = ModerationAction::Ban.apply(Pending).unwrap_err();
        assert!(err.to_string().contains("pending"));
        assert!(err.to_string().contains("banned"));
    }
}
