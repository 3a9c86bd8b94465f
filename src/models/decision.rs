use serde::{Deserialize, Serialize};

/// What the user did with the displayed card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DecisionKind {
    Skip,
    Like,
    LikeWithMessage,
}

impl DecisionKind {
    /// Whether this decision must carry an intro message.
    pub fn requires_message(&self) -> bool {
        matches!(self, DecisionKind::LikeWithMessage)
    }
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionKind::Skip => write!(f, "skip"),
            DecisionKind::Like => write!(f, "like"),
            DecisionKind::LikeWithMessage => write!(f, "like with message"),
        }
    }
}

/// A decision write in flight against the backend.
///
/// Never cached: the slot it targets may not be reused until the write has
/// completed or failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingDecision {
    #[serde(rename = "eventId")]
    pub candidate_id: i64,
    #[serde(rename = "decision")]
    pub kind: DecisionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
