//! Configuration commands.

use tracing::info;

use crate::config::{ClientConfig, GoogleCalendarSettings};
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(config: &ClientConfig) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", config.path().display());
    println!("{}", toml_str);

    Ok(())
}

/// Validate the configuration and the client secret it points at.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    let provider_config = config.to_provider_config().map_err(ClientError::Config)?;

    provider_config.load_secrets().map_err(|e| {
        ClientError::Config(format!(
            "invalid client secret {}: {}",
            provider_config.client_secret_path.display(),
            e
        ))
    })?;
    println!("Client secret is valid.");

    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path and the paths derived from it.
pub fn path(config: &ClientConfig) -> ClientResult<()> {
    println!("config: {}", config.path().display());
    println!("base folder: {}", config.base_folder().display());
    println!(
        "client secret: {}",
        config
            .resolve_path(&config.google_calendar.client_secret_path)
            .display()
    );
    println!("token: {}", config.token_path().display());
    Ok(())
}

/// Write the `[google_calendar]` table, keeping existing content.
pub fn init(config: &ClientConfig, force: bool) -> ClientResult<()> {
    let config_path = config.path();

    let content = if config_path.exists() {
        std::fs::read_to_string(&config_path)?
    } else {
        String::new()
    };

    let updated = init_document(&content, &GoogleCalendarSettings::default(), force)?;

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&config_path, updated)?;

    info!("wrote {}", config_path.display());
    println!("Configuration written to {}", config_path.display());
    Ok(())
}

/// Adds the `[google_calendar]` keys of `defaults` to a TOML document.
///
/// Keys already present are kept unless `force` is set.
pub(crate) fn init_document(
    content: &str,
    defaults: &GoogleCalendarSettings,
    force: bool,
) -> ClientResult<String> {
    let mut doc = content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| ClientError::Config(format!("could not parse config.toml: {}", e)))?;

    let defaults = toml_edit::ser::to_document(defaults)
        .map_err(|e| ClientError::Config(format!("failed to serialize defaults: {}", e)))?;

    if !doc.contains_key("google_calendar") {
        doc["google_calendar"] = toml_edit::Item::Table(toml_edit::Table::new());
    }

    let table = doc["google_calendar"].as_table_mut().ok_or_else(|| {
        ClientError::Config("google_calendar in config.toml is not a table".to_string())
    })?;

    for (key, value) in defaults.iter() {
        if force || !table.contains_key(key) {
            table[key] = value.clone();
        }
    }

    Ok(doc.to_string())
}
