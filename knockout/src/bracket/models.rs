//! Bracket data models: categories, participants, matches, slots and relations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category ID type
pub type CategoryId = i64;

/// Participant ID type
pub type ParticipantId = i64;

/// Club ID type
pub type ClubId = i64;

/// Match ID type
pub type MatchId = i64;

/// Match slot ID type
pub type SlotId = i64;

/// Match relation ID type
pub type RelationId = i64;

/// Competition bracket container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category ID
    pub id: CategoryId,
    /// Display name (e.g. "Under 12 - Blue Belt")
    pub name: String,
    /// Ordering key within the event
    pub order: i32,
    /// Whether the category still accepts sign-ups
    pub can_sign_up: bool,
    /// Bracket-structured (true) or flat match list (false)
    pub is_bracket: bool,
}

/// Entrant belonging to exactly one club
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub club_id: ClubId,
    pub name: String,
}

/// Per-category enrollment of a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub participant_id: ParticipantId,
    pub category_id: CategoryId,
    /// Seed within the category (1 is strongest)
    pub seed: Option<i32>,
}

/// Enrolled participant together with its category seed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryParticipant {
    pub participant: Participant,
    pub seed: Option<i32>,
}

/// Match lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Created, waiting for a result
    Scheduled,
    /// Reserved; no engine operation enters or leaves this state
    Ongoing,
    /// Result recorded (terminal)
    Completed,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Ongoing => "ongoing",
            MatchStatus::Completed => "completed",
        }
    }
}

/// Slot role within a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotRole {
    #[default]
    Competitor,
    /// Non-competing occupant (referee, official, ...)
    Other,
}

impl SlotRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotRole::Competitor => "competitor",
            SlotRole::Other => "other",
        }
    }
}

/// Outcome of a slot once its match completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    Win,
    Loss,
    Draw,
    Dq,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::Win => "win",
            ResultType::Loss => "loss",
            ResultType::Draw => "draw",
            ResultType::Dq => "dq",
        }
    }
}

/// Error returned when a stored enum label is not recognized
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} label: {label}")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub label: String,
}

impl FromStr for MatchStatus {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(MatchStatus::Scheduled),
            "ongoing" => Ok(MatchStatus::Ongoing),
            "completed" => Ok(MatchStatus::Completed),
            _ => Err(UnknownLabel {
                kind: "match status",
                label: s.to_string(),
            }),
        }
    }
}

impl FromStr for SlotRole {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "competitor" => Ok(SlotRole::Competitor),
            "other" => Ok(SlotRole::Other),
            _ => Err(UnknownLabel {
                kind: "slot role",
                label: s.to_string(),
            }),
        }
    }
}

impl FromStr for ResultType {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "win" => Ok(ResultType::Win),
            "loss" => Ok(ResultType::Loss),
            "draw" => Ok(ResultType::Draw),
            "dq" => Ok(ResultType::Dq),
            _ => Err(UnknownLabel {
                kind: "result type",
                label: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node in the bracket graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub category_id: CategoryId,
    /// Round number (None for flat lists)
    pub round: Option<i32>,
    /// Ordering within the round
    pub match_number: Option<i32>,
    pub start_time: Option<DateTime<Utc>>,
    pub status: MatchStatus,
}

/// One participant's placement in one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSlot {
    pub id: SlotId,
    pub match_id: MatchId,
    pub participant_id: ParticipantId,
    pub role: SlotRole,
    /// Free-form seed or lane label
    pub position: Option<String>,
    pub score: Option<f64>,
    /// Finishing rank (1 = winner)
    pub rank: Option<i32>,
    pub result_type: Option<ResultType>,
}

/// Directed advancement edge `source -> target`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRelation {
    pub id: RelationId,
    pub source_match_id: MatchId,
    pub target_match_id: MatchId,
    /// Finishing rank in the source that advances along this edge
    pub qualifier_rank: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels_round_trip() {
        for status in [
            MatchStatus::Scheduled,
            MatchStatus::Ongoing,
            MatchStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<MatchStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_unknown_status_label() {
        let err = "finished".parse::<MatchStatus>().unwrap_err();
        assert_eq!(err.label, "finished");
        assert!(err.to_string().contains("match status"));
    }

    #[test]
    fn test_role_defaults_to_competitor() {
        assert_eq!(SlotRole::default(), SlotRole::Competitor);
        assert_eq!("other".parse::<SlotRole>(), Ok(SlotRole::Other));
    }

    #[test]
    fn test_result_type_serde_labels() {
        let json = serde_json::to_string(&ResultType::Dq).unwrap();
        assert_eq!(json, "\"dq\"");
        assert_eq!("loss".parse::<ResultType>(), Ok(ResultType::Loss));
    }
}
