//! Feature rows for one forecast step: calendar fields of the target
//! timestamp plus occupancy lags read from the end of the working series.
//!
//! Column order must match the order the scalers and models were fit on.

use time::{PrimitiveDateTime, Weekday};

/// Lag offsets, in rows back from the current end of the series.
pub const LAG_OFFSETS: [usize; 6] = [1, 2, 3, 18, 19, 20];

/// Rows required before any lag can be read.
pub const MIN_HISTORY: usize = 20;

pub const FEATURE_COUNT: usize = 13;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "Year",
    "Month",
    "Day",
    "DayOfWeek",
    "isWeekend",
    "Hour",
    "Minute",
    "lag_1",
    "lag_2",
    "lag_3",
    "lag_18",
    "lag_19",
    "lag_20",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFeatures {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    /// 0 = Monday .. 6 = Sunday
    pub day_of_week: u8,
    pub is_weekend: bool,
    pub hour: u8,
    pub minute: u8,
}

impl CalendarFeatures {
    pub fn from_timestamp(timestamp: PrimitiveDateTime) -> Self {
        let weekday = timestamp.weekday();
        Self {
            year: timestamp.year(),
            month: u8::from(timestamp.month()),
            day: timestamp.day(),
            day_of_week: weekday.number_days_from_monday(),
            is_weekend: matches!(weekday, Weekday::Saturday | Weekday::Sunday),
            hour: timestamp.hour(),
            minute: timestamp.minute(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub calendar: CalendarFeatures,
    /// Values at [`LAG_OFFSETS`], same order.
    pub lags: [f64; LAG_OFFSETS.len()],
}

impl FeatureVector {
    pub fn to_row(&self) -> [f64; FEATURE_COUNT] {
        let c = &self.calendar;
        [
            f64::from(c.year),
            f64::from(c.month),
            f64::from(c.day),
            f64::from(c.day_of_week),
            if c.is_weekend { 1.0 } else { 0.0 },
            f64::from(c.hour),
            f64::from(c.minute),
            self.lags[0],
            self.lags[1],
            self.lags[2],
            self.lags[3],
            self.lags[4],
            self.lags[5],
        ]
    }

    /// Lag value for one of [`LAG_OFFSETS`].
    pub fn lag(&self, offset: usize) -> Option<f64> {
        LAG_OFFSETS
            .iter()
            .position(|o| *o == offset)
            .map(|i| self.lags[i])
    }
}

/// Read the lag values from the end of `values`, or `None` when shorter than
/// [`MIN_HISTORY`].
pub fn lag_features(values: &[f64]) -> Option<[f64; LAG_OFFSETS.len()]> {
    if values.len() < MIN_HISTORY {
        return None;
    }
    let end = values.len();
    Some(LAG_OFFSETS.map(|offset| values[end - offset]))
}
