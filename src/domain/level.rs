use crate::config::ConfigError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Severity of a log event.
///
/// Levels are compared purely by their numeric value, so a threshold is just a
/// `Level` and `event.level >= threshold` decides whether the event passes.
/// The custom `TRACE` level sits between `INFO` and `WARNING` by default; its
/// value is configurable through [`Level::trace_at`].
#[derive(Debug, Clone, Copy)]
pub struct Level {
    value: u8,
    name: &'static str,
}

impl Level {
    pub const DEBUG: Level = Level::named(10, "DEBUG");
    pub const INFO: Level = Level::named(20, "INFO");
    pub const TRACE: Level = Level::named(DEFAULT_TRACE_VALUE, "TRACE");
    pub const WARNING: Level = Level::named(30, "WARNING");
    pub const ERROR: Level = Level::named(40, "ERROR");
    pub const CRITICAL: Level = Level::named(50, "CRITICAL");

    const fn named(value: u8, name: &'static str) -> Self {
        Self { value, name }
    }

    /// The custom trace level placed at `value` on the numeric scale.
    pub const fn trace_at(value: u8) -> Self {
        Self::named(value, "TRACE")
    }

    /// Builds a level from its numeric value. Unknown values get a
    /// `Level <n>` style name when rendered.
    pub fn from_value(value: u8) -> Self {
        match value {
            10 => Self::DEBUG,
            20 => Self::INFO,
            30 => Self::WARNING,
            40 => Self::ERROR,
            50 => Self::CRITICAL,
            v if v == DEFAULT_TRACE_VALUE => Self::TRACE,
            v => Self::named(v, ""),
        }
    }

    pub const fn value(self) -> u8 {
        self.value
    }

    pub fn is_trace(self) -> bool {
        self.name == "TRACE"
    }

    pub fn name(self) -> String {
        if self.name.is_empty() {
            format!("Level {}", self.value)
        } else {
            self.name.to_string()
        }
    }

    pub fn is_builtin_value(value: u8) -> bool {
        matches!(value, 10 | 20 | 30 | 40 | 50)
    }
}

/// Default numeric position of `TRACE`: just below `WARNING`.
pub const DEFAULT_TRACE_VALUE: u8 = 25;

impl PartialEq for Level {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Level {}

impl PartialOrd for Level {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Level {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl Hash for Level {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "Level {}", self.value)
        } else {
            f.write_str(self.name)
        }
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::DEBUG),
            "info" => Ok(Self::INFO),
            "trace" | "tracing" => Ok(Self::TRACE),
            "warn" | "warning" => Ok(Self::WARNING),
            "error" => Ok(Self::ERROR),
            "critical" | "fatal" => Ok(Self::CRITICAL),
            other => other
                .parse::<u8>()
                .map(Self::from_value)
                .map_err(|_| ConfigError::InvalidLevel(trimmed.to_string())),
        }
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Name(String),
            Value(u8),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Name(name) => name.parse().map_err(serde::de::Error::custom),
            Raw::Value(value) => Ok(Level::from_value(value)),
        }
    }
}
