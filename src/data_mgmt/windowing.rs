use std::fmt;

use chrono::{offset::Utc, DateTime, Duration, NaiveDateTime, NaiveTime, Timelike};
use chrono_tz::Tz;
use thiserror::Error;

const MINUTES_PER_HOUR: u32 = 60;

#[derive(Error, Debug, PartialEq)]
pub enum WindowingError {
    #[error("window width of {0} minutes does not evenly divide an hour")]
    Width(u32),
    #[error("phase offset of {offset} minutes must be smaller than the {width} minute window")]
    PhaseOffset { offset: u32, width: u32 },
}

/// Minute-of-hour label of a window: the window start plus the phase offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Bucket(u32);

impl Bucket {
    pub fn minute(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{:02}", self.0)
    }
}

/// Assigns readings to fixed-width windows on the local wall clock.
#[derive(Clone, Debug)]
pub struct Windowing {
    width_minutes: u32,
    phase_offset_minutes: u32,
    timezone: Tz,
}

impl Windowing {
    pub fn new(
        width_minutes: u32,
        phase_offset_minutes: u32,
        timezone: Tz,
    ) -> Result<Self, WindowingError> {
        if width_minutes == 0 || MINUTES_PER_HOUR % width_minutes != 0 {
            return Err(WindowingError::Width(width_minutes));
        }
        if phase_offset_minutes >= width_minutes {
            return Err(WindowingError::PhaseOffset {
                offset: phase_offset_minutes,
                width: width_minutes,
            });
        }
        Ok(Self {
            width_minutes,
            phase_offset_minutes,
            timezone,
        })
    }

    pub fn width(&self) -> Duration {
        Duration::minutes(i64::from(self.width_minutes))
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn bucket_of(&self, timestamp: DateTime<Utc>) -> Bucket {
        let minute = timestamp.with_timezone(&self.timezone).minute();
        Bucket(minute / self.width_minutes * self.width_minutes + self.phase_offset_minutes)
    }

    /// Instant at which the window containing `timestamp` starts.
    ///
    /// Unlike the local label this keeps increasing across DST changes, so it
    /// orders windows.
    pub fn window_start(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let into_window = timestamp.with_timezone(&self.timezone).minute() % self.width_minutes;
        timestamp
            - Duration::minutes(i64::from(into_window))
            - Duration::seconds(i64::from(timestamp.second()))
            - Duration::nanoseconds(i64::from(timestamp.nanosecond()))
    }

    /// Local date and time of the bucket containing `timestamp`
    pub fn label_of(&self, timestamp: DateTime<Utc>) -> NaiveDateTime {
        let local = timestamp.with_timezone(&self.timezone).naive_local();
        let minutes_into_day = local.hour() * MINUTES_PER_HOUR + self.bucket_of(timestamp).minute();
        local.date().and_time(NaiveTime::MIN) + Duration::minutes(i64::from(minutes_into_day))
    }
}
