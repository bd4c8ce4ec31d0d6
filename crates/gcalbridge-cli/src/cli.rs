//! Command-line interface definition.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use gcalbridge_core::{CalendarRef, EventDateTime, EventFields, ReminderOverride, Reminders};

/// gcalbridge - Google Calendar from the command line
#[derive(Debug, Parser)]
#[command(name = "gcalbridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, global = true, env = "GCALBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authorisation commands
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// List calendars (id and name)
    Calendars,

    /// List upcoming events
    Events {
        /// Calendar ID (defaults to the configured calendar)
        #[arg(long)]
        calendar: Option<String>,
    },

    /// Single event commands
    Event {
        #[command(subcommand)]
        action: EventAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Authorisation actions.
#[derive(Debug, Subcommand)]
pub enum AuthAction {
    /// Print the URL where a verification code can be retrieved
    Link {
        /// Print an HTML link instead of the bare URL
        #[arg(long)]
        html: bool,

        /// Open the URL in the default browser
        #[arg(long)]
        open: bool,
    },

    /// Exchange a verification code, or refresh the stored token
    Configure {
        /// Verification code from the consent page
        #[arg(long, env = "GCALBRIDGE_VERIFICATION_CODE")]
        code: Option<String>,
    },

    /// Show whether a valid token is stored
    Status,

    /// Remove the stored token
    Reset,
}

/// Single event actions.
#[derive(Debug, Subcommand)]
pub enum EventAction {
    /// Show an event
    Get {
        /// Event ID
        id: String,

        /// Calendar ID (defaults to the configured calendar)
        #[arg(long)]
        calendar: Option<String>,
    },

    /// Create an event
    Add {
        #[command(flatten)]
        fields: EventArgs,

        /// Calendar ID (defaults to the configured calendar)
        #[arg(long)]
        calendar: Option<String>,
    },

    /// Change the given fields of an event
    Update {
        /// Event ID
        id: String,

        #[command(flatten)]
        fields: EventArgs,

        /// Calendar ID (defaults to the configured calendar)
        #[arg(long)]
        calendar: Option<String>,
    },

    /// Delete an event
    Delete {
        /// Event ID
        id: String,

        /// Calendar ID (defaults to the configured calendar)
        #[arg(long)]
        calendar: Option<String>,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,

    /// Write a `[google_calendar]` table with defaults to the config file
    Init {
        /// Overwrite keys that are already set
        #[arg(long, short)]
        force: bool,
    },
}

/// Event attributes given on the command line.
#[derive(Debug, Clone, Default, Args)]
pub struct EventArgs {
    /// Event title
    #[arg(long)]
    pub summary: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Start: YYYY-MM-DD for all-day events, otherwise YYYY-MM-DDTHH:MM:SS
    /// with optional offset
    #[arg(long)]
    pub start: Option<String>,

    /// End, same format as --start
    #[arg(long)]
    pub end: Option<String>,

    /// Time zone for --start and --end (defaults to the configured one)
    #[arg(long)]
    pub time_zone: Option<String>,

    /// Attendee email address (can be repeated)
    #[arg(long = "attendee", action = clap::ArgAction::Append)]
    pub attendees: Vec<String>,

    /// Reminder as METHOD:MINUTES, e.g. popup:10 (can be repeated)
    #[arg(long = "reminder", action = clap::ArgAction::Append)]
    pub reminders: Vec<String>,

    /// Use the calendar's default reminders
    #[arg(long, conflicts_with = "reminders")]
    pub default_reminders: bool,
}

impl EventArgs {
    /// Converts the arguments into the sparse field set sent to the calendar.
    pub fn to_fields(&self) -> Result<EventFields, String> {
        let mut fields = EventFields {
            summary: self.summary.clone(),
            location: self.location.clone(),
            description: self.description.clone(),
            ..Default::default()
        };

        if let Some(ref start) = self.start {
            fields.start = Some(parse_when(start, self.time_zone.as_deref())?);
        }
        if let Some(ref end) = self.end {
            fields.end = Some(parse_when(end, self.time_zone.as_deref())?);
        }
        if !self.attendees.is_empty() {
            fields.attendees = Some(self.attendees.clone());
        }

        if self.default_reminders {
            fields.reminders = Some(Reminders {
                use_default: true,
                overrides: Vec::new(),
            });
        } else if !self.reminders.is_empty() {
            let overrides = self
                .reminders
                .iter()
                .map(|r| parse_reminder(r))
                .collect::<Result<Vec<_>, _>>()?;
            fields.reminders = Some(Reminders {
                use_default: false,
                overrides,
            });
        }

        Ok(fields)
    }
}

/// Resolves a `--calendar` flag.
pub fn calendar_ref(calendar: Option<&str>) -> Option<CalendarRef> {
    calendar.map(CalendarRef::from)
}

/// Parses a start or end value.
pub fn parse_when(value: &str, time_zone: Option<&str>) -> Result<EventDateTime, String> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(EventDateTime::all_day(date));
    }

    let valid = DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M").is_ok();
    if !valid {
        return Err(format!(
            "{:?} is neither YYYY-MM-DD nor YYYY-MM-DDTHH:MM[:SS][offset]",
            value
        ));
    }

    let when = EventDateTime::at(normalize_seconds(value));
    Ok(match time_zone {
        Some(tz) => when.with_time_zone(tz),
        None => when,
    })
}

/// Appends `:00` to `YYYY-MM-DDTHH:MM`.
fn normalize_seconds(value: &str) -> String {
    if value.len() == 16 && NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M").is_ok() {
        format!("{}:00", value)
    } else {
        value.to_string()
    }
}

/// Parses `METHOD:MINUTES`.
pub fn parse_reminder(value: &str) -> Result<ReminderOverride, String> {
    let (method, minutes) = value
        .split_once(':')
        .ok_or_else(|| format!("reminder {:?} is not METHOD:MINUTES", value))?;
    let minutes: u32 = minutes
        .trim()
        .parse()
        .map_err(|_| format!("reminder minutes {:?} is not a number", minutes))?;

    match method.trim() {
        "email" => Ok(ReminderOverride::email(minutes)),
        "popup" => Ok(ReminderOverride::popup(minutes)),
        other => Err(format!(
            "unknown reminder method {:?} (expected email or popup)",
            other
        )),
    }
}
