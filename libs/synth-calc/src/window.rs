//! Trailing time windows for statistical functions
//!
//! A window is written as a short code in the expression (`avg("voltage", "1h")`)
//! and resolves to the range `[window_start(t), t]` for a reference time `t`.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;

use crate::error::{CalcError, Result};

/// Supported trailing windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeWindow {
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    TwentyFourHours,
    SevenDays,
    ThirtyDays,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 6] = [
        TimeWindow::FiveMinutes,
        TimeWindow::FifteenMinutes,
        TimeWindow::OneHour,
        TimeWindow::TwentyFourHours,
        TimeWindow::SevenDays,
        TimeWindow::ThirtyDays,
    ];

    /// Parse a window code such as `"15m"` or `"7d"` (case-insensitive, trimmed)
    pub fn from_code(code: &str) -> Result<Self> {
        let normalized = code.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|window| window.code() == normalized)
            .ok_or_else(|| {
                CalcError::parse(format!(
                    "Unknown time window '{}'. Valid options: 5m, 15m, 1h, 24h, 7d, 30d",
                    code
                ))
            })
    }

    pub fn code(self) -> &'static str {
        match self {
            TimeWindow::FiveMinutes => "5m",
            TimeWindow::FifteenMinutes => "15m",
            TimeWindow::OneHour => "1h",
            TimeWindow::TwentyFourHours => "24h",
            TimeWindow::SevenDays => "7d",
            TimeWindow::ThirtyDays => "30d",
        }
    }

    /// Window length in whole minutes
    pub fn minutes(self) -> i64 {
        match self {
            TimeWindow::FiveMinutes => 5,
            TimeWindow::FifteenMinutes => 15,
            TimeWindow::OneHour => 60,
            TimeWindow::TwentyFourHours => 24 * 60,
            TimeWindow::SevenDays => 7 * 24 * 60,
            TimeWindow::ThirtyDays => 30 * 24 * 60,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// Start of the window ending at `reference`; never later than `reference`
    pub fn window_start(self, reference: DateTime<Utc>) -> DateTime<Utc> {
        reference
            .checked_sub_signed(self.duration())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for TimeWindow {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_code(s)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_from_code_valid() {
        assert_eq!(TimeWindow::from_code("5m").unwrap(), TimeWindow::FiveMinutes);
        assert_eq!(TimeWindow::from_code("15m").unwrap(), TimeWindow::FifteenMinutes);
        assert_eq!(TimeWindow::from_code("1h").unwrap(), TimeWindow::OneHour);
        assert_eq!(TimeWindow::from_code("24h").unwrap(), TimeWindow::TwentyFourHours);
        assert_eq!(TimeWindow::from_code("7d").unwrap(), TimeWindow::SevenDays);
        assert_eq!(TimeWindow::from_code("30d").unwrap(), TimeWindow::ThirtyDays);
    }

    #[test]
    fn test_from_code_case_and_whitespace() {
        assert_eq!(TimeWindow::from_code("1H").unwrap(), TimeWindow::OneHour);
        assert_eq!(TimeWindow::from_code("  15m ").unwrap(), TimeWindow::FifteenMinutes);
        assert_eq!("7D".parse::<TimeWindow>().unwrap(), TimeWindow::SevenDays);
    }

    #[test]
    fn test_from_code_invalid() {
        for code in ["10m", "2h", "", "invalid"] {
            let err = TimeWindow::from_code(code).unwrap_err();
            assert!(matches!(err, CalcError::Parse(_)), "{code}");
        }
    }

    #[test]
    fn test_window_start() {
        let now = ts("2025-11-11T12:00:00Z");
        assert_eq!(TimeWindow::FiveMinutes.window_start(now), ts("2025-11-11T11:55:00Z"));
        assert_eq!(TimeWindow::OneHour.window_start(now), ts("2025-11-11T11:00:00Z"));
        assert_eq!(TimeWindow::TwentyFourHours.window_start(now), ts("2025-11-10T12:00:00Z"));
        assert_eq!(TimeWindow::SevenDays.window_start(now), ts("2025-11-04T12:00:00Z"));
    }

    #[test]
    fn test_window_start_never_after_reference() {
        let reference = DateTime::<Utc>::MIN_UTC;
        for window in TimeWindow::ALL {
            assert!(window.window_start(reference) <= reference);
        }
    }

    #[test]
    fn test_display_round_trip() {
        for window in TimeWindow::ALL {
            assert_eq!(TimeWindow::from_code(&window.to_string()).unwrap(), window);
        }
    }
}
