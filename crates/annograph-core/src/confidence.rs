//! Trust ranking of computed values.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// How much a value (an anchor offset, a label) can be trusted.
///
/// Variants are ordered ascending by trust, so `Confidence::Manual` compares
/// greater than every other level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// No rating at all.
    #[default]
    None,
    /// Filled in by a default rule such as even spacing.
    Default,
    /// Produced by an automatic process (aligner, recogniser).
    Automatic,
    /// Entered or checked by a person.
    Manual,
}

impl Confidence {
    /// Numeric rating used by external tools.
    pub fn value(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Default => 10,
            Self::Automatic => 50,
            Self::Manual => 100,
        }
    }

    /// Maps a numeric rating onto the highest level it reaches.
    pub fn from_value(value: u8) -> Self {
        match value {
            100.. => Self::Manual,
            50.. => Self::Automatic,
            10.. => Self::Default,
            _ => Self::None,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Default => "default",
            Self::Automatic => "automatic",
            Self::Manual => "manual",
        };
        f.write_str(name)
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "default" => Ok(Self::Default),
            "automatic" => Ok(Self::Automatic),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown confidence `{other}`")),
        }
    }
}
