use crate::domain::errors::PipelineError;
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

pub const MINUTE_MS: i64 = 60_000;

/// Aggregation granularities supported by the pipeline.
///
/// Calendar timeframes (month and above) have no fixed length; their minute count is the
/// conventional approximation used for parsing and labels only. Window completion and
/// window end for them are always decided on calendar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    OneMin,
    ThreeMin,
    FiveMin,
    FifteenMin,
    ThirtyMin,
    OneHour,
    TwoHour,
    FourHour,
    SixHour,
    EightHour,
    TwelveHour,
    OneDay,
    OneWeek,
    OneMonth,
    OneQuarter,
    HalfYear,
    OneYear,
}

impl Timeframe {
    /// Returns the duration of this timeframe in minutes
    pub fn to_minutes(&self) -> u32 {
        match self {
            Timeframe::OneMin => 1,
            Timeframe::ThreeMin => 3,
            Timeframe::FiveMin => 5,
            Timeframe::FifteenMin => 15,
            Timeframe::ThirtyMin => 30,
            Timeframe::OneHour => 60,
            Timeframe::TwoHour => 120,
            Timeframe::FourHour => 240,
            Timeframe::SixHour => 360,
            Timeframe::EightHour => 480,
            Timeframe::TwelveHour => 720,
            Timeframe::OneDay => 1_440,
            Timeframe::OneWeek => 10_080,
            Timeframe::OneMonth => 43_200,
            Timeframe::OneQuarter => 129_600,
            Timeframe::HalfYear => 259_200,
            Timeframe::OneYear => 525_600,
        }
    }

    /// Returns the duration in milliseconds (approximate for calendar timeframes)
    pub fn duration_ms(&self) -> i64 {
        i64::from(self.to_minutes()) * MINUTE_MS
    }

    /// First instant after the window containing `start_ms`, in epoch milliseconds.
    ///
    /// Windows sit on the same UTC grid as [`Timeframe::closes_window_at`], so a window
    /// whose first candle arrives mid-window still ends on its grid boundary. Months and
    /// longer end on the first day of the next calendar period. `None` when the result
    /// is not a representable UTC time.
    pub fn window_end_ms(&self, start_ms: i64) -> Option<i64> {
        const DAY_MS: i64 = 1_440 * MINUTE_MS;

        let start = DateTime::from_timestamp_millis(start_ms)?;
        let day_start = start_ms - start_ms.rem_euclid(DAY_MS);

        let months = match self {
            Timeframe::OneWeek => {
                let days_left = 7 - i64::from(start.weekday().num_days_from_monday());
                return day_start.checked_add(days_left * DAY_MS);
            }
            Timeframe::OneMonth => 1,
            Timeframe::OneQuarter => 3,
            Timeframe::HalfYear => 6,
            Timeframe::OneYear => 12,
            // Every sub-week size divides a day
            _ => {
                let size = self.duration_ms();
                let index = (start_ms - day_start) / size;
                return day_start.checked_add((index + 1) * size);
            }
        };

        let last_month = (start.month0() / months + 1) * months;
        let (year, month) = if last_month == 12 {
            (start.year().checked_add(1)?, 1)
        } else {
            (start.year(), last_month + 1)
        };
        let end = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
        Some(end.and_utc().timestamp_millis())
    }

    /// Short label, also accepted by `FromStr`
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMin => "1m",
            Timeframe::ThreeMin => "3m",
            Timeframe::FiveMin => "5m",
            Timeframe::FifteenMin => "15m",
            Timeframe::ThirtyMin => "30m",
            Timeframe::OneHour => "1h",
            Timeframe::TwoHour => "2h",
            Timeframe::FourHour => "4h",
            Timeframe::SixHour => "6h",
            Timeframe::EightHour => "8h",
            Timeframe::TwelveHour => "12h",
            Timeframe::OneDay => "1d",
            Timeframe::OneWeek => "1w",
            Timeframe::OneMonth => "1M",
            Timeframe::OneQuarter => "3M",
            Timeframe::HalfYear => "6M",
            Timeframe::OneYear => "1y",
        }
    }

    /// Returns all available timeframes in ascending order
    pub fn all() -> Vec<Timeframe> {
        vec![
            Timeframe::OneMin,
            Timeframe::ThreeMin,
            Timeframe::FiveMin,
            Timeframe::FifteenMin,
            Timeframe::ThirtyMin,
            Timeframe::OneHour,
            Timeframe::TwoHour,
            Timeframe::FourHour,
            Timeframe::SixHour,
            Timeframe::EightHour,
            Timeframe::TwelveHour,
            Timeframe::OneDay,
            Timeframe::OneWeek,
            Timeframe::OneMonth,
            Timeframe::OneQuarter,
            Timeframe::HalfYear,
            Timeframe::OneYear,
        ]
    }

    /// Looks up the preset with exactly this many minutes.
    pub fn from_minutes(minutes: u32) -> Result<Self, PipelineError> {
        Self::all()
            .into_iter()
            .find(|tf| tf.to_minutes() == minutes)
            .ok_or_else(|| PipelineError::UnsupportedTimeframe(minutes.to_string()))
    }

    /// Checks whether the 1-minute candle starting at `at` is the last minute of a window.
    ///
    /// Only the candle's own UTC calendar fields are consulted, so historical replays
    /// close windows exactly like live data does.
    pub fn closes_window_at(&self, at: &DateTime<Utc>) -> bool {
        let minute = at.minute();
        let hour = at.hour();
        let end_of_day = hour == 23 && minute == 59;

        match self {
            Timeframe::OneMin
            | Timeframe::ThreeMin
            | Timeframe::FiveMin
            | Timeframe::FifteenMin
            | Timeframe::ThirtyMin => {
                let size = self.to_minutes();
                minute % size == size - 1
            }
            Timeframe::OneHour
            | Timeframe::TwoHour
            | Timeframe::FourHour
            | Timeframe::SixHour
            | Timeframe::EightHour
            | Timeframe::TwelveHour => {
                let hours = self.to_minutes() / 60;
                minute == 59 && hour % hours == hours - 1
            }
            Timeframe::OneDay => end_of_day,
            Timeframe::OneWeek => end_of_day && at.weekday() == Weekday::Sun,
            Timeframe::OneMonth => end_of_day && is_last_day_of_month(at),
            Timeframe::OneQuarter => {
                end_of_day && is_last_day_of_month(at) && at.month() % 3 == 0
            }
            Timeframe::HalfYear => end_of_day && is_last_day_of_month(at) && at.month() % 6 == 0,
            Timeframe::OneYear => end_of_day && at.month() == 12 && at.day() == 31,
        }
    }

    /// Same as [`Timeframe::closes_window_at`] for an epoch-millisecond timestamp.
    ///
    /// Timestamps outside chrono's representable range never close a window.
    pub fn closes_window(&self, timestamp_ms: i64) -> bool {
        match DateTime::from_timestamp_millis(timestamp_ms) {
            Some(at) => self.closes_window_at(&at),
            None => {
                warn!("Timeframe {}: timestamp {} is not a valid UTC time", self, timestamp_ms);
                false
            }
        }
    }
}

fn is_last_day_of_month(at: &DateTime<Utc>) -> bool {
    at.date_naive()
        .succ_opt()
        .map(|next| next.month() != at.month())
        .unwrap_or(true)
}

impl FromStr for Timeframe {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        // Upper-case M is month, lower-case m is minute
        match trimmed {
            "1M" => return Ok(Timeframe::OneMonth),
            "3M" => return Ok(Timeframe::OneQuarter),
            "6M" => return Ok(Timeframe::HalfYear),
            _ => {}
        }

        if let Ok(minutes) = trimmed.parse::<u32>() {
            return Self::from_minutes(minutes);
        }

        match trimmed.to_lowercase().as_str() {
            "1m" | "1min" | "onemin" => Ok(Timeframe::OneMin),
            "3m" | "3min" => Ok(Timeframe::ThreeMin),
            "5m" | "5min" | "fivemin" => Ok(Timeframe::FiveMin),
            "15m" | "15min" | "fifteenmin" => Ok(Timeframe::FifteenMin),
            "30m" | "30min" => Ok(Timeframe::ThirtyMin),
            "1h" | "1hour" | "onehour" => Ok(Timeframe::OneHour),
            "2h" | "2hour" => Ok(Timeframe::TwoHour),
            "4h" | "4hour" | "fourhour" => Ok(Timeframe::FourHour),
            "6h" | "6hour" => Ok(Timeframe::SixHour),
            "8h" | "8hour" => Ok(Timeframe::EightHour),
            "12h" | "12hour" => Ok(Timeframe::TwelveHour),
            "1d" | "1day" | "oneday" => Ok(Timeframe::OneDay),
            "1w" | "1week" | "oneweek" => Ok(Timeframe::OneWeek),
            "1mo" | "1month" | "onemonth" => Ok(Timeframe::OneMonth),
            "3mo" | "3month" | "quarter" => Ok(Timeframe::OneQuarter),
            "6mo" | "6month" | "halfyear" => Ok(Timeframe::HalfYear),
            "1y" | "1year" | "oneyear" => Ok(Timeframe::OneYear),
            _ => Err(PipelineError::UnsupportedTimeframe(trimmed.to_string())),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
