//! Calendar and event commands.

use gcalbridge_core::EventFields;
use gcalbridge_google::CalendarAccessor;
use tracing::debug;

use crate::cli::{EventArgs, calendar_ref};
use crate::commands::auth::credential_manager;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::output::{self, OutputFormat};

/// Connects to the calendar with the stored token, refreshing it if needed.
async fn connect(config: &ClientConfig) -> ClientResult<CalendarAccessor> {
    let credentials = credential_manager(config)?;
    CalendarAccessor::connect(&credentials, None)
        .await?
        .ok_or_else(|| {
            ClientError::AuthRequired(format!(
                "no valid token in {}. Run `gcalbridge auth link`, then `gcalbridge auth configure --code <CODE>`",
                credentials.storage().path().display()
            ))
        })
}

/// List calendars.
pub async fn calendars(config: &ClientConfig, format: OutputFormat) -> ClientResult<()> {
    let accessor = connect(config).await?;
    let calendars = accessor.list_calendars().await?;
    println!("{}", output::calendars(&calendars, format)?);
    Ok(())
}

/// List upcoming events.
pub async fn events(
    config: &ClientConfig,
    calendar: Option<&str>,
    format: OutputFormat,
) -> ClientResult<()> {
    let accessor = connect(config).await?;
    let calendar = calendar_ref(calendar);
    let events = accessor.list_events(calendar.as_ref()).await?;
    println!("{}", output::events(&events, format)?);
    Ok(())
}

/// Show one event.
pub async fn get(
    config: &ClientConfig,
    id: &str,
    calendar: Option<&str>,
    format: OutputFormat,
) -> ClientResult<()> {
    let accessor = connect(config).await?;
    let calendar = calendar_ref(calendar);
    let event = accessor
        .get_event(id, calendar.as_ref())
        .await
        .ok_or_else(|| ClientError::Failed(format!("event {} not found or cancelled", id)))?;
    println!("{}", output::event(&event, format)?);
    Ok(())
}

/// Create an event.
pub async fn add(
    config: &ClientConfig,
    args: &EventArgs,
    calendar: Option<&str>,
    format: OutputFormat,
) -> ClientResult<()> {
    let fields = new_event_fields(args)?;
    let accessor = connect(config).await?;
    let calendar = calendar_ref(calendar);
    let event = accessor
        .add_event(&fields, calendar.as_ref())
        .await
        .ok_or_else(|| ClientError::Failed("failed to add event".to_string()))?;
    println!("{}", output::event(&event, format)?);
    Ok(())
}

/// Change the given fields of an event.
pub async fn update(
    config: &ClientConfig,
    id: &str,
    args: &EventArgs,
    calendar: Option<&str>,
    format: OutputFormat,
) -> ClientResult<()> {
    let fields = args.to_fields().map_err(ClientError::Input)?;
    if fields.is_empty() {
        return Err(ClientError::Input("nothing to update".to_string()));
    }
    debug!("updating event {} with {:?}", id, fields);

    let accessor = connect(config).await?;
    let calendar = calendar_ref(calendar);
    let event = accessor
        .update_event(&fields, id, calendar.as_ref())
        .await
        .ok_or_else(|| ClientError::Failed(format!("failed to update event {}", id)))?;
    println!("{}", output::event(&event, format)?);
    Ok(())
}

/// Delete an event.
pub async fn delete(config: &ClientConfig, id: &str, calendar: Option<&str>) -> ClientResult<()> {
    let accessor = connect(config).await?;
    let calendar = calendar_ref(calendar);
    if !accessor.delete_event(id, calendar.as_ref()).await {
        return Err(ClientError::Failed(format!("failed to delete event {}", id)));
    }
    println!("Deleted event {}", id);
    Ok(())
}

/// Fields for a new event; start and end are required.
fn new_event_fields(args: &EventArgs) -> ClientResult<EventFields> {
    let fields = args.to_fields().map_err(ClientError::Input)?;
    if fields.start.is_none() || fields.end.is_none() {
        return Err(ClientError::Input(
            "--start and --end are required for a new event".to_string(),
        ));
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_needs_start_and_end() {
        let args = EventArgs {
            summary: Some("Lunch".to_string()),
            start: Some("2024-03-15T12:00:00".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            new_event_fields(&args),
            Err(ClientError::Input(_))
        ));

        let args = EventArgs {
            end: Some("2024-03-15T13:00:00".to_string()),
            ..args
        };
        let fields = new_event_fields(&args).unwrap();
        assert_eq!(fields.summary.as_deref(), Some("Lunch"));
    }

    #[tokio::test]
    async fn update_without_fields_is_rejected() {
        let err = update(
            &ClientConfig::default(),
            "evt1",
            &EventArgs::default(),
            None,
            OutputFormat::Text,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::Input(_)));
    }

    #[tokio::test]
    async fn commands_require_authorisation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("client_secret.json"),
            r#"{"web":{"client_id":"id.apps.googleusercontent.com","client_secret":"s"}}"#,
        )
        .unwrap();
        let mut config = ClientConfig {
            source: Some(dir.path().join("config.toml")),
            ..Default::default()
        };
        config.google_calendar.credentials_path = Some("credentials.json".into());

        let err = calendars(&config, OutputFormat::Text).await.unwrap_err();
        assert!(matches!(err, ClientError::AuthRequired(_)));
        assert!(err.to_string().contains("gcalbridge auth configure"));
    }
}
