//! Configuration value types
//!
//! Small validated value types referenced by the configuration crate and by
//! the synchronization core.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Strategy applied to conflicting records during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Local value wins; remote-originated deletions are overridden
    UseLocal,
    /// The record with the higher embedded last-modified timestamp wins,
    /// ties fall back to local
    UseNewest,
    /// Remote value wins; locally-originated deletions are overridden
    UseRemote,
    /// Any conflict aborts the whole run; nothing is applied
    DoNothing,
}

impl Default for MergeStrategy {
    fn default() -> Self {
        Self::UseNewest
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UseLocal => "use_local",
            Self::UseNewest => "use_newest",
            Self::UseRemote => "use_remote",
            Self::DoNothing => "do_nothing",
        };
        f.write_str(name)
    }
}

/// Minimum wall-clock time between two local backup snapshots
///
/// Written in config files as `<count><unit>` with unit one of `s`, `m`,
/// `h` or `d`, e.g. `30m` or `1d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupInterval(Duration);

impl BackupInterval {
    /// Create an interval from a duration
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    /// The interval as a duration
    pub fn as_duration(self) -> Duration {
        self.0
    }
}

impl Default for BackupInterval {
    fn default() -> Self {
        Self(Duration::from_secs(24 * 60 * 60))
    }
}

impl FromStr for BackupInterval {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        // Split on the last character's byte index, not the last byte
        let (unit_at, unit) = value
            .char_indices()
            .last()
            .ok_or_else(|| format!("invalid interval '{value}': expected <count><unit>"))?;
        let count: u64 = value[..unit_at]
            .parse()
            .map_err(|_| format!("invalid interval '{value}': expected <count><unit>"))?;
        let per_unit: u64 = match unit {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 60 * 60 * 24,
            _ => {
                return Err(format!(
                    "invalid interval unit in '{value}': expected one of s, m, h, d"
                ))
            }
        };
        let seconds = count
            .checked_mul(per_unit)
            .ok_or_else(|| format!("invalid interval '{value}': count is too large"))?;
        Ok(Self(Duration::from_secs(seconds)))
    }
}

impl fmt::Display for BackupInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        if secs % (60 * 60 * 24) == 0 && secs > 0 {
            write!(f, "{}d", secs / (60 * 60 * 24))
        } else if secs % (60 * 60) == 0 && secs > 0 {
            write!(f, "{}h", secs / (60 * 60))
        } else if secs % 60 == 0 && secs > 0 {
            write!(f, "{}m", secs / 60)
        } else {
            write!(f, "{secs}s")
        }
    }
}

impl Serialize for BackupInterval {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BackupInterval {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_strategy_config_names() {
        assert_eq!(
            serde_json::from_str::<MergeStrategy>("\"use_newest\"").unwrap(),
            MergeStrategy::UseNewest
        );
        assert_eq!(
            serde_json::to_string(&MergeStrategy::DoNothing).unwrap(),
            "\"do_nothing\""
        );
        assert_eq!(MergeStrategy::UseLocal.to_string(), "use_local");
    }

    #[test]
    fn test_interval_parsing() {
        assert_eq!(
            "30s".parse::<BackupInterval>().unwrap().as_duration(),
            Duration::from_secs(30)
        );
        assert_eq!(
            "15m".parse::<BackupInterval>().unwrap().as_duration(),
            Duration::from_secs(900)
        );
        assert_eq!(
            "6h".parse::<BackupInterval>().unwrap().as_duration(),
            Duration::from_secs(6 * 3600)
        );
        assert_eq!(
            "1d".parse::<BackupInterval>().unwrap().as_duration(),
            Duration::from_secs(86_400)
        );
    }

    #[test]
    fn test_interval_rejects_garbage() {
        assert!("".parse::<BackupInterval>().is_err());
        assert!("1w".parse::<BackupInterval>().is_err());
        assert!("abc".parse::<BackupInterval>().is_err());
        assert!("d".parse::<BackupInterval>().is_err());
        // Multi-byte trailing character must not split mid-codepoint
        assert!("1µ".parse::<BackupInterval>().is_err());
        // A count whose seconds would overflow u64
        assert!("200000000000000000d".parse::<BackupInterval>().is_err());
        assert!("18446744073709551615d".parse::<BackupInterval>().is_err());
    }

    #[test]
    fn test_interval_display_round_trip() {
        for text in ["45s", "90m", "12h", "2d"] {
            let interval: BackupInterval = text.parse().unwrap();
            assert_eq!(interval.to_string(), text);
            assert_eq!(interval.to_string().parse::<BackupInterval>().unwrap(), interval);
        }
    }
}
