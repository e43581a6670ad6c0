//! Unified task status and provider-status normalization.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The only four states exposed outward, regardless of how many
/// provider-specific sub-states exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// Accepted by the provider, not yet running.
    #[default]
    Pending,
    /// The provider is actively generating.
    Processing,
    /// Generation finished successfully; result URLs are final.
    Completed,
    /// Generation failed; error fields are final.
    Failed,
}

impl GenerationStatus {
    /// Check if this is a terminal state (no further transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Collapse a provider's raw status string into the unified model.
    ///
    /// Matching is case-insensitive. Unknown or missing raw statuses default
    /// to `Pending`: an unrecognized vocabulary word must never be mistaken
    /// for completion or failure.
    pub fn normalize(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Pending;
        };

        match raw.trim().to_lowercase().as_str() {
            "pending" | "queued" | "waiting" => Self::Pending,
            "processing" | "running" => Self::Processing,
            "completed" | "success" | "succeeded" => Self::Completed,
            "failed" | "cancelled" | "fail" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for GenerationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid generation status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_documented_vocabulary_maps_totally() {
        let cases = [
            ("pending", GenerationStatus::Pending),
            ("queued", GenerationStatus::Pending),
            ("waiting", GenerationStatus::Pending),
            ("processing", GenerationStatus::Processing),
            ("running", GenerationStatus::Processing),
            ("completed", GenerationStatus::Completed),
            ("success", GenerationStatus::Completed),
            ("succeeded", GenerationStatus::Completed),
            ("failed", GenerationStatus::Failed),
            ("cancelled", GenerationStatus::Failed),
            ("fail", GenerationStatus::Failed),
        ];
        for (raw, expected) in cases {
            assert_eq!(GenerationStatus::normalize(Some(raw)), expected, "{raw}");
        }
    }

    #[test]
    fn test_normalize_is_case_insensitive() {
        assert_eq!(
            GenerationStatus::normalize(Some("SUCCEEDED")),
            GenerationStatus::Completed
        );
        assert_eq!(
            GenerationStatus::normalize(Some("Running")),
            GenerationStatus::Processing
        );
    }

    #[test]
    fn test_missing_status_defaults_to_pending() {
        assert_eq!(GenerationStatus::normalize(None), GenerationStatus::Pending);
    }

    #[test]
    fn test_terminal_states() {
        assert!(GenerationStatus::Completed.is_terminal());
        assert!(GenerationStatus::Failed.is_terminal());
        assert!(!GenerationStatus::Pending.is_terminal());
        assert!(!GenerationStatus::Processing.is_terminal());
    }

    #[test]
    fn test_display_from_str_round_trip() {
        for status in [
            GenerationStatus::Pending,
            GenerationStatus::Processing,
            GenerationStatus::Completed,
            GenerationStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<GenerationStatus>(), Ok(status));
        }
    }

    proptest! {
        #[test]
        fn prop_unknown_status_never_terminal(raw in "[a-z_]{1,24}") {
            let known = [
                "pending", "queued", "waiting", "processing", "running",
                "completed", "success", "succeeded", "failed", "cancelled", "fail",
            ];
            prop_assume!(!known.contains(&raw.as_str()));
            prop_assert!(!GenerationStatus::normalize(Some(&raw)).is_terminal());
        }
    }
}
