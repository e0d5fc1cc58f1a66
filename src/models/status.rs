//! Lifecycle status enums and their allowed transitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Review state of talents, communities and products.
///
/// Only `Approved` records are publicly visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Banned,
}

impl ModerationStatus {
    pub const ALL: [ModerationStatus; 4] = [
        ModerationStatus::Pending,
        ModerationStatus::Approved,
        ModerationStatus::Rejected,
        ModerationStatus::Banned,
    ];

    /// Transitions an admin may apply
    pub fn can_transition_to(self, next: ModerationStatus) -> bool {
        use ModerationStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Banned)
                | (Banned, Approved)
                | (Rejected, Approved)
        )
    }

    /// Status after the owner edits the record, or `None` when editing is not allowed
    pub fn after_owner_edit(self) -> Option<ModerationStatus> {
        match self {
            ModerationStatus::Rejected => Some(ModerationStatus::Pending),
            ModerationStatus::Banned => None,
            other => Some(other),
        }
    }

    pub fn is_public(self) -> bool {
        self == ModerationStatus::Approved
    }
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModerationStatus::Pending => write!(f, "pending"),
            ModerationStatus::Approved => write!(f, "approved"),
            ModerationStatus::Rejected => write!(f, "rejected"),
            ModerationStatus::Banned => write!(f, "banned"),
        }
    }
}

impl FromStr for ModerationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ModerationStatus::Pending),
            "approved" => Ok(ModerationStatus::Approved),
            "rejected" => Ok(ModerationStatus::Rejected),
            "banned" => Ok(ModerationStatus::Banned),
            _ => Err(anyhow::anyhow!("Invalid moderation status: {}", s)),
        }
    }
}

/// Article lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    #[default]
    Draft,
    Published,
    /// Taken down by an admin; the author can no longer edit or republish it
    Banned,
}

impl ArticleStatus {
    pub const ALL: [ArticleStatus; 3] = [
        ArticleStatus::Draft,
        ArticleStatus::Published,
        ArticleStatus::Banned,
    ];

    /// Whether `self -> next` is allowed for the given kind of actor
    pub fn can_transition_to(self, next: ArticleStatus, by_admin: bool) -> bool {
        use ArticleStatus::*;
        match (self, next) {
            (Draft, Published) | (Published, Draft) => true,
            (Published, Banned) | (Banned, Published) => by_admin,
            _ => false,
        }
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArticleStatus::Draft => write!(f, "draft"),
            ArticleStatus::Published => write!(f, "published"),
            ArticleStatus::Banned => write!(f, "banned"),
        }
    }
}

impl FromStr for ArticleStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(ArticleStatus::Draft),
            "published" => Ok(ArticleStatus::Published),
            "banned" => Ok(ArticleStatus::Banned),
            _ => Err(anyhow::anyhow!("Invalid article status: {}", s)),
        }
    }
}

/// Zhub listing lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HubStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

impl HubStatus {
    pub const ALL: [HubStatus; 3] = [HubStatus::Draft, HubStatus::Active, HubStatus::Archived];

    pub fn can_transition_to(self, next: HubStatus) -> bool {
        use HubStatus::*;
        matches!(
            (self, next),
            (Draft, Active) | (Active, Archived) | (Archived, Active) | (Active, Draft)
        )
    }
}

impl fmt::Display for HubStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubStatus::Draft => write!(f, "draft"),
            HubStatus::Active => write!(f, "active"),
            HubStatus::Archived => write!(f, "archived"),
        }
    }
}

impl FromStr for HubStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(HubStatus::Draft),
            "active" => Ok(HubStatus::Active),
            "archived" => Ok(HubStatus::Archived),
            _ => Err(anyhow::anyhow!("Invalid hub status: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moderation_transitions() {
        use ModerationStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Banned));
        assert!(Banned.can_transition_to(Approved));
        assert!(Rejected.can_transition_to(Approved));

        assert!(!Pending.can_transition_to(Banned));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Banned.can_transition_to(Pending));
        assert!(!Rejected.can_transition_to(Pending));
    }

    #[test]
    fn test_owner_edit_resubmits_rejected() {
        use ModerationStatus::*;
        assert_eq!(Rejected.after_owner_edit(), Some(Pending));
        assert_eq!(Pending.after_owner_edit(), Some(Pending));
        assert_eq!(Approved.after_owner_edit(), Some(Approved));
        assert_eq!(Banned.after_owner_edit(), None);
    }

    #[test]
    fn test_article_transitions() {
        use ArticleStatus::*;
        assert!(Draft.can_transition_to(Published, false));
        assert!(Published.can_transition_to(Draft, false));
        assert!(!Published.can_transition_to(Banned, false));
        assert!(Published.can_transition_to(Banned, true));
        assert!(!Banned.can_transition_to(Published, false));
        assert!(Banned.can_transition_to(Published, true));
        assert!(!Draft.can_transition_to(Banned, true));
        assert!(!Banned.can_transition_to(Draft, true));
    }

    #[test]
    fn test_hub_transitions() {
        use HubStatus::*;
        assert!(Draft.can_transition_to(Active));
        assert!(Active.can_transition_to(Archived));
        assert!(Archived.can_transition_to(Active));
        assert!(Active.can_transition_to(Draft));
        assert!(!Draft.can_transition_to(Archived));
        assert!(!Archived.can_transition_to(Draft));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("APPROVED".parse::<ModerationStatus>().unwrap(), ModerationStatus::Approved);
        assert_eq!("Published".parse::<ArticleStatus>().unwrap(), ArticleStatus::Published);
        assert_eq!("archived".parse::<HubStatus>().unwrap(), HubStatus::Archived);
        assert!("deleted".parse::<ModerationStatus>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&ModerationStatus::Rejected).unwrap();
        assert_eq!(json, "\"rejected\"");
        let status: HubStatus = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(status, HubStatus::Active);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn moderation() -> impl Strategy<Value = ModerationStatus> {
        prop::sample::select(ModerationStatus::ALL.to_vec())
    }

    fn article() -> impl Strategy<Value = ArticleStatus> {
        prop::sample::select(ArticleStatus::ALL.to_vec())
    }

    fn hub() -> impl Strategy<Value = HubStatus> {
        prop::sample::select(HubStatus::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn no_status_transitions_to_itself(m in moderation(), a in article(), h in hub(), admin in any::<bool>()) {
            prop_assert!(!m.can_transition_to(m));
            prop_assert!(!a.can_transition_to(a, admin));
            prop_assert!(!h.can_transition_to(h));
        }

        #[test]
        fn display_parses_back(m in moderation(), a in article(), h in hub()) {
            prop_assert_eq!(m.to_string().parse::<ModerationStatus>().unwrap(), m);
            prop_assert_eq!(a.to_string().parse::<ArticleStatus>().unwrap(), a);
            prop_assert_eq!(h.to_string().parse::<HubStatus>().unwrap(), h);
        }

        #[test]
        fn authors_never_touch_banned(a in article()) {
            prop_assert!(!a.can_transition_to(ArticleStatus::Banned, false));
            prop_assert!(!ArticleStatus::Banned.can_transition_to(a, false));
        }

        #[test]
        fn nothing_moderates_back_to_pending(m in moderation()) {
            prop_assert!(!m.can_transition_to(ModerationStatus::Pending));
        }
    }
}
