use std::fmt::Display;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Wall-clock time as the number of seconds elapsed since the Unix epoch.
///
/// Block headers carry timestamps at second granularity, and miners are free
/// to advance it while searching for a nonce.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Timestamp {
        // A clock set before 1970 is treated as the epoch itself.
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Timestamp(seconds)
    }

    pub const fn seconds(secs: u64) -> Timestamp {
        Timestamp(secs)
    }

    pub const fn to_seconds(self) -> u64 {
        self.0
    }

    /// Format as RFC-3339 in UTC, or as raw seconds if out of chrono's range.
    pub fn standard_format(&self) -> String {
        i64::try_from(self.0)
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| format!("{}s", self.0))
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.standard_format())
    }
}

impl From<u64> for Timestamp {
    fn from(secs: u64) -> Self {
        Timestamp(secs)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn now_is_after_2024() {
        // 2024-01-01T00:00:00Z
        assert!(Timestamp::now() > Timestamp::seconds(1_704_067_200));
    }

    #[test]
    fn standard_format_is_rfc3339() {
        assert_eq!(
            "2024-01-01T00:00:00+00:00",
            Timestamp::seconds(1_704_067_200).standard_format()
        );
    }

    #[test]
    fn standard_format_survives_huge_values() {
        assert_eq!(format!("{}s", u64::MAX), Timestamp(u64::MAX).standard_format());
    }
}
