//! Calendar accessor: CRUD on calendars and events.

use std::collections::BTreeMap;

use chrono::Utc;
use gcalbridge_core::{CalendarRef, EventFields, EventRecord};
use tracing::{debug, warn};

use crate::client::{ApiEvent, CalendarApi, EventQuery, GoogleCalendarClient};
use crate::config::GoogleConfig;
use crate::credentials::CredentialManager;
use crate::error::ProviderResult;

/// Thin CRUD layer over a [`CalendarApi`].
///
/// Every method that takes a calendar falls back to the configured calendar
/// when given `None`.
pub struct CalendarAccessor {
    api: Box<dyn CalendarApi>,
    default_calendar: CalendarRef,
    time_zone: String,
    max_results: u32,
}

impl CalendarAccessor {
    pub fn new(api: impl CalendarApi + 'static, config: &GoogleConfig) -> Self {
        Self {
            api: Box::new(api),
            default_calendar: config.calendar_id.clone(),
            time_zone: config.time_zone.clone(),
            max_results: config.max_results,
        }
    }

    /// Configures credentials and returns an accessor bound to the resulting
    /// access token.
    ///
    /// Returns `Ok(None)` when no valid token could be obtained.
    pub async fn connect(
        credentials: &CredentialManager,
        verification_code: Option<&str>,
    ) -> ProviderResult<Option<Self>> {
        if !credentials.configure(verification_code).await? {
            return Ok(None);
        }
        let Some(token) = credentials.access_token() else {
            return Ok(None);
        };

        let config = credentials.config();
        let client = GoogleCalendarClient::new(config, token.access_token)?;
        Ok(Some(Self::new(client, config)))
    }

    pub fn default_calendar(&self) -> &CalendarRef {
        &self.default_calendar
    }

    fn calendar<'a>(&'a self, calendar: Option<&'a CalendarRef>) -> &'a CalendarRef {
        calendar.unwrap_or(&self.default_calendar)
    }

    /// Maps calendar id to display name for every calendar of the user.
    pub async fn list_calendars(&self) -> ProviderResult<BTreeMap<String, String>> {
        let entries = self.api.list_calendar_list().await?;
        Ok(entries
            .into_iter()
            .map(|entry| (entry.id, entry.summary))
            .collect())
    }

    /// Upcoming events, earliest first.
    pub async fn list_events(
        &self,
        calendar: Option<&CalendarRef>,
    ) -> ProviderResult<Vec<EventRecord>> {
        let calendar = self.calendar(calendar);
        let query = EventQuery::upcoming(Utc::now(), self.max_results);
        let events = self.api.list_events(calendar, &query).await?;
        Ok(events.iter().map(ApiEvent::to_record).collect())
    }

    /// Fetches one event. Cancelled events and failures yield `None`.
    pub async fn get_event(
        &self,
        event_id: &str,
        calendar: Option<&CalendarRef>,
    ) -> Option<EventRecord> {
        let calendar = self.calendar(calendar);
        match self.api.get_event(calendar, event_id).await {
            Ok(event) if event.is_cancelled() => {
                debug!("event {} in {} is cancelled", event_id, calendar);
                None
            }
            Ok(event) => Some(event.to_record()),
            Err(e) => {
                warn!("failed to get event {} from {}: {}", event_id, calendar, e);
                None
            }
        }
    }

    /// Creates an event from the fields that are set.
    pub async fn add_event(
        &self,
        fields: &EventFields,
        calendar: Option<&CalendarRef>,
    ) -> Option<EventRecord> {
        let calendar = self.calendar(calendar);
        let event = ApiEvent::from_fields(&self.with_time_zone(fields));
        match self.api.insert_event(calendar, &event).await {
            Ok(created) => Some(created.to_record()),
            Err(e) => {
                warn!("failed to add event to {}: {}", calendar, e);
                None
            }
        }
    }

    /// Overwrites the fields that are set and writes the full event back.
    pub async fn update_event(
        &self,
        fields: &EventFields,
        event_id: &str,
        calendar: Option<&CalendarRef>,
    ) -> Option<EventRecord> {
        let calendar = self.calendar(calendar);
        let mut event = match self.api.get_event(calendar, event_id).await {
            Ok(event) => event,
            Err(e) => {
                warn!("failed to fetch event {} for update: {}", event_id, e);
                return None;
            }
        };

        event.apply_fields(&self.with_time_zone(fields));
        match self.api.update_event(calendar, event_id, &event).await {
            Ok(updated) => Some(updated.to_record()),
            Err(e) => {
                warn!("failed to update event {} in {}: {}", event_id, calendar, e);
                None
            }
        }
    }

    /// Deletes an event, returning false on failure.
    pub async fn delete_event(&self, event_id: &str, calendar: Option<&CalendarRef>) -> bool {
        let calendar = self.calendar(calendar);
        match self.api.delete_event(calendar, event_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!("failed to delete event {} from {}: {}", event_id, calendar, e);
                false
            }
        }
    }

    fn with_time_zone(&self, fields: &EventFields) -> EventFields {
        let mut fields = fields.clone();
        fields.apply_default_time_zone(&self.time_zone);
        fields
    }
}
