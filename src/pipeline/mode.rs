use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

use crate::search::QueryRule;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Shopping,
    Recycling,
}

impl Mode {
    /// Lenient parse used by the eco-score form: anything that is not
    /// `shopping` gets the recycling template.
    pub fn from_form_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("shopping") {
            Mode::Shopping
        } else {
            Mode::Recycling
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Shopping => "shopping",
            Mode::Recycling => "recycling",
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("shopping") {
            Ok(Mode::Shopping)
        } else if s.eq_ignore_ascii_case("recycling") {
            Ok(Mode::Recycling)
        } else {
            Err(format!("unknown mode `{}`, expected `shopping` or `recycling`", s))
        }
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that varies between the shopping and recycling pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeProfile {
    pub mode: Mode,
    pub rule: QueryRule,
    pub top_k: usize,
}

impl ModeProfile {
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Shopping => Self {
                mode,
                rule: QueryRule::ParenthesizedItem,
                top_k: 5,
            },
            Mode::Recycling => Self {
                mode,
                rule: QueryRule::RecyclePrefix,
                top_k: 5,
            },
        }
    }

    /// The hyphen-suffix shopping variant searches fewer results.
    pub fn with_rule(self, rule: QueryRule) -> Self {
        let top_k = match rule {
            QueryRule::HyphenSuffix => 3,
            _ => self.top_k,
        };
        Self { rule, top_k, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_value_defaults_to_recycling() {
        assert_eq!(Mode::from_form_value("Shopping"), Mode::Shopping);
        assert_eq!(Mode::from_form_value("recycling"), Mode::Recycling);
        assert_eq!(Mode::from_form_value(""), Mode::Recycling);
    }

    #[test]
    fn deserializes_any_case() {
        let mode: Mode = serde_json::from_str("\"recycling\"").unwrap();
        assert_eq!(mode, Mode::Recycling);
        let mode: Mode = serde_json::from_str("\"Recycling\"").unwrap();
        assert_eq!(mode, Mode::Recycling);
        let mode: Mode = serde_json::from_str("\"SHOPPING\"").unwrap();
        assert_eq!(mode, Mode::Shopping);
        assert!(serde_json::from_str::<Mode>("\"compost\"").is_err());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Recycling).unwrap(), "\"recycling\"");
    }

    #[test]
    fn hyphen_rule_narrows_top_k() {
        let profile = ModeProfile::for_mode(Mode::Shopping).with_rule(QueryRule::HyphenSuffix);
        assert_eq!(profile.top_k, 3);
        assert_eq!(profile.mode, Mode::Shopping);

        let profile = ModeProfile::for_mode(Mode::Recycling).with_rule(QueryRule::ParenthesizedItem);
        assert_eq!(profile.top_k, 5);
    }
}
