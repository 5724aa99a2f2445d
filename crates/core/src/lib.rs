pub mod config;
pub mod errors;
pub mod schedule;

pub use errors::ScheduleError;
pub use schedule::{
    format_entries, parse_schedule, Clock, DayOfWeek, FetchError, FixedClock,
    HttpScheduleSource, LocalClock, ParseError, ScheduleEntry, ScheduleSource,
};
