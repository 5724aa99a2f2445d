use super::ScheduleEntry;

/// Slack mrkdwn header for one entry: bold location with the italic window.
pub fn header_line(entry: &ScheduleEntry) -> String {
    format!("*{} [_{}_]:*", entry.location, entry.time_window)
}

/// Lazily yields two reply lines per entry, the header and then the item.
pub fn format_entries(entries: &[ScheduleEntry]) -> impl Iterator<Item = String> + '_ {
    entries.iter().flat_map(|entry| [header_line(entry), entry.item.clone()])
}
