//! Core types: event records, event fields, calendar references, tracing

pub mod calendar;
pub mod event;
pub mod tracing;

pub use calendar::CalendarRef;
pub use event::{EventDateTime, EventFields, EventRecord, ReminderOverride, Reminders};
pub use crate::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
