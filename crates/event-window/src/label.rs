//! Cycling Event Labels

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Cycling event detected by the helmet.
///
/// Variants are declared in alphabetical order; the derived `Ord` is the
/// class order used for label encoding and for every exported artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLabel {
    /// Hard braking
    Brake,
    /// Road bump or pothole
    Bump,
    /// Crash / fall
    Crash,
    /// Regular riding
    Normal,
    /// Turning
    Turn,
}

/// Label string that is not one of the known events
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized event label: {0:?}")]
pub struct ParseLabelError(pub String);

impl EventLabel {
    /// All labels in class order
    pub const ALL: [EventLabel; 5] = [
        EventLabel::Brake,
        EventLabel::Bump,
        EventLabel::Crash,
        EventLabel::Normal,
        EventLabel::Turn,
    ];

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EventLabel::Brake => "brake",
            EventLabel::Bump => "bump",
            EventLabel::Crash => "crash",
            EventLabel::Normal => "normal",
            EventLabel::Turn => "turn",
        }
    }
}

impl fmt::Display for EventLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventLabel {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        EventLabel::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == normalized)
            .ok_or_else(|| ParseLabelError(s.to_string()))
    }
}
