// Time-axis unit for charting a window: seconds, hours or days.

use crate::error::QueryError;
use chrono::{DateTime, Utc};
use serde::Serialize;

const SECS_PER_HOUR: f64 = 3600.0;
const SECS_PER_DAY: f64 = 86400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Hours,
    Days,
}

impl TimeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Seconds => "seconds",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        }
    }
}

/// Axis bounds in `unit`. `min` is always 0; data points keep raw timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeAxis {
    pub unit: TimeUnit,
    pub min: f64,
    pub max: f64,
}

/// Picks the unit for a window of `diff_secs` seconds.
pub fn scale_seconds(diff_secs: f64) -> TimeAxis {
    if diff_secs > SECS_PER_DAY {
        TimeAxis {
            unit: TimeUnit::Days,
            min: 0.0,
            max: diff_secs / SECS_PER_DAY,
        }
    } else if diff_secs > SECS_PER_HOUR {
        TimeAxis {
            unit: TimeUnit::Hours,
            min: 0.0,
            max: diff_secs / SECS_PER_HOUR,
        }
    } else {
        TimeAxis {
            unit: TimeUnit::Seconds,
            min: 0.0,
            max: diff_secs,
        }
    }
}

pub fn scale(t1: DateTime<Utc>, t2: DateTime<Utc>) -> Result<TimeAxis, QueryError> {
    if t1 > t2 {
        return Err(QueryError::BadRange {
            t1: t1.to_rfc3339(),
            t2: t2.to_rfc3339(),
        });
    }
    let diff_secs = (t2 - t1).num_milliseconds() as f64 / 1000.0;
    Ok(scale_seconds(diff_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries() {
        assert_eq!(scale_seconds(3600.0).unit, TimeUnit::Seconds);
        assert_eq!(scale_seconds(3601.0).unit, TimeUnit::Hours);
        assert_eq!(scale_seconds(86400.0).unit, TimeUnit::Hours);
        assert_eq!(scale_seconds(86400.0).max, 24.0);
        assert_eq!(scale_seconds(86401.0).unit, TimeUnit::Days);
        assert_eq!(scale_seconds(0.0).max, 0.0);
    }
}
