use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use super::{DayOfWeek, ScheduleEntry, AREA_FILTER};

const GROUP_MARKER: &str = "div.dr";
const PLACE_SELECTOR: &str = "p.supporting-text > a";
const TIME_SELECTOR: &str = r#"td[data-label="Time period"]"#;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
    #[error("schedule page has no `div.dr` blocks; the page layout has likely changed")]
    MissingScheduleBlocks,
    #[error(
        "schedule group {group} is misaligned: {places} places, {times} time windows, {items} items"
    )]
    Misaligned { group: usize, places: usize, times: usize, items: usize },
}

/// Extracts the downtown entries for `day` from the schedule page.
///
/// Each `div.dr` block is paired with the element right before it. Groups
/// whose preceding element mentions [`AREA_FILTER`] contribute their places,
/// time windows and the cells labelled with the day name, zipped in document
/// order. A page with schedule blocks but no downtown group yields an empty
/// list.
pub fn parse_schedule(html: &str, day: DayOfWeek) -> Result<Vec<ScheduleEntry>, ParseError> {
    let group_marker = selector(GROUP_MARKER)?;
    let places = selector(PLACE_SELECTOR)?;
    let times = selector(TIME_SELECTOR)?;
    let items = selector(&day_selector(day))?;

    let document = Html::parse_document(html);
    let mut markers = document.select(&group_marker).peekable();
    if markers.peek().is_none() {
        return Err(ParseError::MissingScheduleBlocks);
    }

    let mut entries = Vec::new();
    for (group, marker) in markers.enumerate() {
        let Some(heading) = previous_element(marker) else {
            continue;
        };
        if !element_text(heading).contains(AREA_FILTER) {
            continue;
        }

        let columns = GroupColumns {
            places: heading.select(&places).map(element_text).collect(),
            times: heading.select(&times).map(element_text).collect(),
            items: heading.select(&items).map(element_text).collect(),
        };
        entries.extend(columns.zip(group)?);
    }

    Ok(entries)
}

/// Matches cells whose `data-label` holds the day name as one of its
/// whitespace-separated words.
fn day_selector(day: DayOfWeek) -> String {
    format!(r#"td[data-label~="{}"]"#, day.name())
}

struct GroupColumns {
    places: Vec<String>,
    times: Vec<String>,
    items: Vec<String>,
}

impl GroupColumns {
    fn zip(self, group: usize) -> Result<impl Iterator<Item = ScheduleEntry>, ParseError> {
        let (places, times, items) = (self.places.len(), self.times.len(), self.items.len());
        if places != times || places != items {
            return Err(ParseError::Misaligned { group, places, times, items });
        }

        Ok(self.places.into_iter().zip(self.times).zip(self.items).map(
            |((location, time_window), item)| ScheduleEntry { location, time_window, item },
        ))
    }
}

fn selector(raw: &str) -> Result<Selector, ParseError> {
    Selector::parse(raw).map_err(|error| ParseError::Selector {
        selector: raw.to_owned(),
        reason: error.to_string(),
    })
}

fn previous_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.prev_siblings().find_map(ElementRef::wrap)
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}
