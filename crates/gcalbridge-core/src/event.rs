//! Event types exchanged with the calendar accessor.
//!
//! - [`EventRecord`]: the plain, flattened view of a remote event handed back
//!   to callers. Built fresh on every read, never cached.
//! - [`EventFields`]: the sparse input used to create or patch an event. Only
//!   fields that are `Some` are written.
//! - [`EventDateTime`]: a start or end time, either a timestamp or an all-day
//!   date, with an optional IANA time zone.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A start or end time as the calendar API models it.
///
/// Exactly one of `date_time` (RFC 3339) or `date` (`YYYY-MM-DD`, all-day
/// events) is normally set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    /// A timed start/end, e.g. `2015-05-28T09:00:00`.
    pub fn at(date_time: impl Into<String>) -> Self {
        Self {
            date_time: Some(date_time.into()),
            ..Default::default()
        }
    }

    /// An all-day start/end.
    pub fn all_day(date: NaiveDate) -> Self {
        Self {
            date: Some(date.format("%Y-%m-%d").to_string()),
            ..Default::default()
        }
    }

    /// Sets the time zone.
    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = Some(time_zone.into());
        self
    }

    /// The timestamp, or the all-day date when no timestamp is set.
    pub fn value(&self) -> Option<&str> {
        self.date_time
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.date.as_deref().filter(|s| !s.is_empty()))
    }

    /// Returns true for all-day values.
    pub fn is_all_day(&self) -> bool {
        self.date_time.as_deref().is_none_or(str::is_empty) && self.date.is_some()
    }
}

/// A single reminder override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderOverride {
    /// Delivery method: `"email"` or `"popup"`.
    pub method: String,
    /// Minutes before the event start.
    pub minutes: u32,
}

impl ReminderOverride {
    pub fn email(minutes: u32) -> Self {
        Self {
            method: "email".to_string(),
            minutes,
        }
    }

    pub fn popup(minutes: u32) -> Self {
        Self {
            method: "popup".to_string(),
            minutes,
        }
    }
}

/// Reminder settings for an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    /// Whether the calendar's default reminders apply.
    pub use_default: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<ReminderOverride>,
}

/// Sparse set of event attributes for create and update.
///
/// On update, only the fields that are `Some` overwrite the stored event;
/// everything else is left as the server has it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<EventDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<EventDateTime>,
    /// Attendee email addresses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminders: Option<Reminders>,
}

impl EventFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_start(mut self, start: EventDateTime) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: EventDateTime) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_attendees<I, S>(mut self, attendees: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attendees = Some(attendees.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_reminders(mut self, reminders: Reminders) -> Self {
        self.reminders = Some(reminders);
        self
    }

    /// Returns true when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fills in `time_zone` on start/end values that lack one.
    pub fn apply_default_time_zone(&mut self, time_zone: &str) {
        for when in [self.start.as_mut(), self.end.as_mut()].into_iter().flatten() {
            if when.time_zone.is_none() && when.date_time.is_some() {
                when.time_zone = Some(time_zone.to_string());
            }
        }
    }
}

/// Flattened view of a remote event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Remote event identifier.
    pub id: Option<String>,
    /// Start timestamp, or the all-day date.
    pub start: Option<String>,
    /// End timestamp, or the all-day date.
    pub end: Option<String>,
    pub summary: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    /// Attendee email addresses.
    #[serde(default)]
    pub attendees: Vec<String>,
}
