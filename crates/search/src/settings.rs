use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;

/// Which lines count as a hit for the search term.
///
/// Two incompatible predicates exist in the wild, so the choice is always
/// explicit. See [`Matcher`](crate::Matcher) for the exact rules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Case-insensitive substring, or an exact `"term"` / ` term ` token.
    #[default]
    Lenient,
    /// Only exact `"term"` or ` term ` tokens (case-sensitive).
    Boundary,
    /// Case-sensitive substring.
    Literal,
}

/// What to do with a line that isn't valid UTF-8.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fallback {
    /// Decode byte-for-byte as ISO-8859-1. Never fails.
    #[default]
    Latin1,
    /// Skip the line.
    None,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Lenient => "lenient",
            MatchMode::Boundary => "boundary",
            MatchMode::Literal => "literal",
        }
    }
}
impl Display for MatchMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
impl FromStr for MatchMode {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lenient" | "default" => Ok(MatchMode::Lenient),
            "boundary" | "exact" => Ok(MatchMode::Boundary),
            "literal" | "substring" => Ok(MatchMode::Literal),
            _ => exn::bail!(ErrorKind::UnknownSetting {
                setting: "match mode",
                value: s.to_string()
            }),
        }
    }
}

impl FromStr for Fallback {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "latin1" | "latin-1" | "iso-8859-1" => Ok(Fallback::Latin1),
            "none" => Ok(Fallback::None),
            _ => exn::bail!(ErrorKind::UnknownSetting {
                setting: "fallback encoding",
                value: s.to_string()
            }),
        }
    }
}

/// Tuning knobs for a [`StreamingScanner`](crate::StreamingScanner).
///
/// None of these change the event contract, only its cadence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanSettings {
    /// Objects requested per listing call.
    pub page_size: usize,
    /// Emit a keepalive once nothing has been emitted for this long.
    pub keepalive_interval: Duration,
    /// Emit progress every N processed objects...
    pub progress_every: u64,
    /// ...or once this long has passed since the last progress event.
    pub progress_interval: Duration,
    /// Reconnect backoff suggested to the client in the retry hint.
    pub retry_hint: Duration,
    /// Only objects whose key ends with this are fetched.
    pub suffix: String,
    pub match_mode: MatchMode,
    pub fallback: Fallback,
}
impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            page_size: 1000,
            keepalive_interval: Duration::from_secs(15),
            progress_every: 10,
            progress_interval: Duration::from_secs(10),
            retry_hint: Duration::from_millis(30_000),
            suffix: ".txt".to_string(),
            match_mode: MatchMode::default(),
            fallback: Fallback::default(),
        }
    }
}
