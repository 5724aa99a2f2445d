//! Food truck schedule scraping.
//!
//! The schedule lives on a public city web page. A query fetches the page
//! ([`fetch`]), extracts the entries for the current weekday in the
//! downtown area ([`parse`]) and turns them into reply lines ([`format`]).

pub mod fetch;
pub mod format;
pub mod parse;

use std::fmt;

use chrono::{Datelike, Local, Weekday};

pub use fetch::{FetchError, HttpScheduleSource, ScheduleSource};
pub use format::{format_entries, header_line};
pub use parse::{parse_schedule, ParseError};

pub const SCHEDULE_URL: &str =
    "https://www.boston.gov/departments/small-business-development/city-boston-food-trucks-schedule";

/// Only groups whose heading contains this text are reported.
pub const AREA_FILTER: &str = "Downtown";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub location: String,
    pub time_window: String,
    pub item: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];

    /// English long name, as used in the schedule's column labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
            Self::Sunday => "Sunday",
        }
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self, Self::Saturday | Self::Sunday)
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(value: Weekday) -> Self {
        match value {
            Weekday::Mon => Self::Monday,
            Weekday::Tue => Self::Tuesday,
            Weekday::Wed => Self::Wednesday,
            Weekday::Thu => Self::Thursday,
            Weekday::Fri => Self::Friday,
            Weekday::Sat => Self::Saturday,
            Weekday::Sun => Self::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub trait Clock: Send + Sync {
    fn today(&self) -> DayOfWeek;
}

/// Reads the weekday from the host's local time zone.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> DayOfWeek {
        Local::now().weekday().into()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DayOfWeek);

impl Clock for FixedClock {
    fn today(&self) -> DayOfWeek {
        self.0
    }
}
