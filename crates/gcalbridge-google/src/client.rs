//! Google Calendar API v3 client.
//!
//! [`CalendarApi`] is the remote surface the accessor needs;
//! [`GoogleCalendarClient`] implements it over HTTP with a bearer token.

use chrono::{DateTime, SecondsFormat, Utc};
use gcalbridge_core::{CalendarRef, EventDateTime, EventFields, EventRecord, Reminders};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::BoxFuture;
use crate::config::GoogleConfig;
use crate::error::{ProviderError, ProviderResult};

/// Base URL for Google Calendar API v3.
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Remote calendar operations.
pub trait CalendarApi: Send + Sync {
    /// Every calendar in the user's calendar list.
    fn list_calendar_list(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarListEntry>>>;

    fn list_events<'a>(
        &'a self,
        calendar: &'a CalendarRef,
        query: &'a EventQuery,
    ) -> BoxFuture<'a, ProviderResult<Vec<ApiEvent>>>;

    fn get_event<'a>(
        &'a self,
        calendar: &'a CalendarRef,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<ApiEvent>>;

    fn insert_event<'a>(
        &'a self,
        calendar: &'a CalendarRef,
        event: &'a ApiEvent,
    ) -> BoxFuture<'a, ProviderResult<ApiEvent>>;

    /// Replaces the whole event resource.
    fn update_event<'a>(
        &'a self,
        calendar: &'a CalendarRef,
        event_id: &'a str,
        event: &'a ApiEvent,
    ) -> BoxFuture<'a, ProviderResult<ApiEvent>>;

    fn delete_event<'a>(
        &'a self,
        calendar: &'a CalendarRef,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>>;
}

/// Parameters for listing events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub time_min: DateTime<Utc>,
    pub max_results: u32,
    pub order_by_start_time: bool,
    /// Expand recurring events into instances.
    pub single_events: bool,
}

impl EventQuery {
    /// The next `max_results` event instances starting from `now`.
    pub fn upcoming(now: DateTime<Utc>, max_results: u32) -> Self {
        Self {
            time_min: now,
            max_results,
            order_by_start_time: true,
            single_events: true,
        }
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("maxResults", self.max_results.to_string()),
            ("singleEvents", self.single_events.to_string()),
            (
                "timeMin",
                self.time_min.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
        ];
        // the API rejects orderBy=startTime unless singleEvents is set
        if self.order_by_start_time && self.single_events {
            pairs.push(("orderBy", "startTime".to_string()));
        }
        pairs
    }
}

/// An attendee of an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAttendee {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApiAttendee {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            extra: Map::new(),
        }
    }
}

/// An event resource.
///
/// Fields not modelled here are kept in `extra`, so a full-resource update
/// writes back what it read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<ApiAttendee>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminders: Option<Reminders>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApiEvent {
    /// Builds a new event resource from the fields that are set.
    pub fn from_fields(fields: &EventFields) -> Self {
        let mut event = Self::default();
        event.apply_fields(fields);
        event
    }

    /// Overwrites the attributes present in `fields`.
    ///
    /// Attendees already on the event keep their extra attributes (response
    /// status and the like) when their address is listed again.
    pub fn apply_fields(&mut self, fields: &EventFields) {
        if let Some(ref summary) = fields.summary {
            self.summary = Some(summary.clone());
        }
        if let Some(ref location) = fields.location {
            self.location = Some(location.clone());
        }
        if let Some(ref description) = fields.description {
            self.description = Some(description.clone());
        }
        if let Some(ref start) = fields.start {
            self.start = Some(start.clone());
        }
        if let Some(ref end) = fields.end {
            self.end = Some(end.clone());
        }
        if let Some(ref emails) = fields.attendees {
            let existing = self.attendees.take().unwrap_or_default();
            let attendees = emails
                .iter()
                .map(|email| {
                    existing
                        .iter()
                        .find(|a| a.email.as_deref() == Some(email.as_str()))
                        .cloned()
                        .unwrap_or_else(|| ApiAttendee::new(email.clone()))
                })
                .collect();
            self.attendees = Some(attendees);
        }
        if let Some(ref reminders) = fields.reminders {
            self.reminders = Some(reminders.clone());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }

    /// Flattens the resource into the record handed to callers.
    pub fn to_record(&self) -> EventRecord {
        EventRecord {
            id: self.id.clone(),
            start: self
                .start
                .as_ref()
                .and_then(EventDateTime::value)
                .map(String::from),
            end: self
                .end
                .as_ref()
                .and_then(EventDateTime::value)
                .map(String::from),
            summary: self.summary.clone(),
            location: self.location.clone(),
            description: self.description.clone(),
            attendees: self
                .attendees
                .iter()
                .flatten()
                .filter_map(|a| a.email.clone())
                .collect(),
        }
    }
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventList {
    #[serde(default)]
    pub items: Vec<ApiEvent>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// An entry in the user's calendar list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub access_role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Google Calendar API client.
#[derive(Debug)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl GoogleCalendarClient {
    /// Creates a client sending `access_token` as bearer credential.
    pub fn new(config: &GoogleConfig, access_token: impl Into<String>) -> ProviderResult<Self> {
        Ok(Self {
            http_client: config.http_client()?,
            access_token: access_token.into(),
            base_url: CALENDAR_API_BASE.to_string(),
        })
    }

    /// Points the client at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn events_url(&self, calendar: &CalendarRef) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar.as_str())
        )
    }

    fn event_url(&self, calendar: &CalendarRef, event_id: &str) -> String {
        format!(
            "{}/{}",
            self.events_url(calendar),
            urlencoding::encode(event_id)
        )
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> ProviderResult<String> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16(), &body));
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ProviderResult<T> {
        let body = self.send(request).await?;
        parse_body(&body)
    }

    async fn fetch_calendar_list(&self) -> ProviderResult<Vec<CalendarListEntry>> {
        let url = format!("{}/users/me/calendarList", self.base_url);
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http_client.get(&url);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: CalendarListResponse = self.send_json(request).await?;
            calendars.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("fetched {} calendars", calendars.len());
        Ok(calendars)
    }
}

impl CalendarApi for GoogleCalendarClient {
    fn list_calendar_list(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarListEntry>>> {
        Box::pin(self.fetch_calendar_list())
    }

    fn list_events<'a>(
        &'a self,
        calendar: &'a CalendarRef,
        query: &'a EventQuery,
    ) -> BoxFuture<'a, ProviderResult<Vec<ApiEvent>>> {
        Box::pin(async move {
            let request = self
                .http_client
                .get(self.events_url(calendar))
                .query(&query.to_query_pairs());
            let list: EventList = self.send_json(request).await?;
            debug!("fetched {} events from calendar {}", list.items.len(), calendar);
            Ok(list.items)
        })
    }

    fn get_event<'a>(
        &'a self,
        calendar: &'a CalendarRef,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<ApiEvent>> {
        Box::pin(async move {
            let request = self.http_client.get(self.event_url(calendar, event_id));
            self.send_json(request).await
        })
    }

    fn insert_event<'a>(
        &'a self,
        calendar: &'a CalendarRef,
        event: &'a ApiEvent,
    ) -> BoxFuture<'a, ProviderResult<ApiEvent>> {
        Box::pin(async move {
            let request = self.http_client.post(self.events_url(calendar)).json(event);
            self.send_json(request).await
        })
    }

    fn update_event<'a>(
        &'a self,
        calendar: &'a CalendarRef,
        event_id: &'a str,
        event: &'a ApiEvent,
    ) -> BoxFuture<'a, ProviderResult<ApiEvent>> {
        Box::pin(async move {
            let request = self
                .http_client
                .put(self.event_url(calendar, event_id))
                .json(event);
            self.send_json(request).await
        })
    }

    fn delete_event<'a>(
        &'a self,
        calendar: &'a CalendarRef,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            let request = self.http_client.delete(self.event_url(calendar, event_id));
            self.send(request).await.map(|_| ())
        })
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> ProviderResult<T> {
    serde_json::from_str(body)
        .map_err(|e| ProviderError::invalid_response(format!("failed to parse response: {}", e)))
}
