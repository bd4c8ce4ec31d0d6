//! Output rendering for calendar commands.

use std::collections::BTreeMap;
use std::fmt::Write;

use gcalbridge_core::EventRecord;
use serde::Serialize;

use crate::error::{ClientError, ClientResult};

/// How results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Text }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> ClientResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ClientError::Failed(format!("failed to serialize output: {}", e)))
}

/// Renders the calendar id to name mapping.
pub fn calendars(calendars: &BTreeMap<String, String>, format: OutputFormat) -> ClientResult<String> {
    match format {
        OutputFormat::Json => to_json(calendars),
        OutputFormat::Text if calendars.is_empty() => Ok("No calendars".to_string()),
        OutputFormat::Text => {
            let width = calendars.keys().map(|id| id.len()).max().unwrap_or(0);
            Ok(calendars
                .iter()
                .map(|(id, name)| format!("{:width$}  {}", id, name, width = width))
                .collect::<Vec<_>>()
                .join("\n"))
        }
    }
}

/// Renders a list of events, one line each.
pub fn events(events: &[EventRecord], format: OutputFormat) -> ClientResult<String> {
    match format {
        OutputFormat::Json => to_json(events),
        OutputFormat::Text if events.is_empty() => Ok("No upcoming events".to_string()),
        OutputFormat::Text => Ok(events
            .iter()
            .map(event_line)
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

/// Renders a single event with all of its fields.
pub fn event(event: &EventRecord, format: OutputFormat) -> ClientResult<String> {
    match format {
        OutputFormat::Json => to_json(event),
        OutputFormat::Text => Ok(event_details(event)),
    }
}

fn event_line(event: &EventRecord) -> String {
    let mut line = format!(
        "{}  {}",
        event.start.as_deref().unwrap_or("-"),
        event.summary.as_deref().unwrap_or("(no title)")
    );
    if let Some(ref location) = event.location {
        let _ = write!(line, " @ {}", location);
    }
    if let Some(ref id) = event.id {
        let _ = write!(line, "  [{}]", id);
    }
    line
}

fn event_details(event: &EventRecord) -> String {
    let mut rows = vec![
        ("id", event.id.clone()),
        ("summary", event.summary.clone()),
        ("start", event.start.clone()),
        ("end", event.end.clone()),
        ("location", event.location.clone()),
        ("description", event.description.clone()),
    ];
    if !event.attendees.is_empty() {
        rows.push(("attendees", Some(event.attendees.join(", "))));
    }

    rows.into_iter()
        .filter_map(|(label, value)| value.map(|v| format!("{:<12}{}", format!("{}:", label), v)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> EventRecord {
        EventRecord {
            id: Some("evt123".to_string()),
            start: Some("2024-03-15T10:00:00+13:00".to_string()),
            end: Some("2024-03-15T10:15:00+13:00".to_string()),
            summary: Some("Team Standup".to_string()),
            location: Some("Room 4".to_string()),
            description: None,
            attendees: vec!["alice@example.com".to_string(), "bob@example.com".to_string()],
        }
    }

    #[test]
    fn calendars_text_is_aligned() {
        let mut calendars = BTreeMap::new();
        calendars.insert("primary@example.com".to_string(), "Work".to_string());
        calendars.insert("x@example.com".to_string(), "Other".to_string());
        assert_eq!(
            calendars_text(&calendars),
            "primary@example.com  Work\nx@example.com        Other"
        );
    }

    fn calendars_text(calendars: &BTreeMap<String, String>) -> String {
        super::calendars(calendars, OutputFormat::Text).unwrap()
    }

    #[test]
    fn empty_results() {
        assert_eq!(calendars_text(&BTreeMap::new()), "No calendars");
        assert_eq!(
            events(&[], OutputFormat::Text).unwrap(),
            "No upcoming events"
        );
        assert_eq!(events(&[], OutputFormat::Json).unwrap(), "[]");
    }

    #[test]
    fn event_line_text() {
        assert_eq!(
            events(&[record()], OutputFormat::Text).unwrap(),
            "2024-03-15T10:00:00+13:00  Team Standup @ Room 4  [evt123]"
        );
    }

    #[test]
    fn event_details_text() {
        assert_eq!(
            event(&record(), OutputFormat::Text).unwrap(),
            "id:         evt123\n\
             summary:    Team Standup\n\
             start:      2024-03-15T10:00:00+13:00\n\
             end:        2024-03-15T10:15:00+13:00\n\
             location:   Room 4\n\
             attendees:  alice@example.com, bob@example.com"
        );
    }

    #[test]
    fn event_json_keeps_all_keys() {
        let json: serde_json::Value =
            serde_json::from_str(&event(&record(), OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["id"], "evt123");
        assert!(json["description"].is_null());
        assert_eq!(json["attendees"][1], "bob@example.com");
    }
}
