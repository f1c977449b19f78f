//! App registry command.

use crate::output::{self, OutputFormat};
use anyhow::{bail, Result};
use reel_config::{current_app, AppConfig, APPS};

fn print_app(app: &AppConfig) {
    output::print_heading(app.name);
    output::print_row("Key", app.key.as_str());
    output::print_row("URL", &app.url());
    output::print_row("Dev port", &app.port.to_string());
    output::print_row("About", app.description);
}

/// List the ReelApps applications, or resolve the one served at `host`.
pub fn apps(host: Option<&str>, format: &OutputFormat) -> Result<()> {
    let selected: Vec<&AppConfig> = match host {
        Some(host) => match current_app(host) {
            Some(app) => vec![app],
            None => bail!("No ReelApps app is served at {}", host),
        },
        None => APPS.iter().collect(),
    };

    match format {
        OutputFormat::Text => selected.into_iter().for_each(print_app),
        OutputFormat::Json => {
            let rows: Vec<_> = selected
                .iter()
                .map(|app| {
                    serde_json::json!({
                        "key": app.key,
                        "name": app.name,
                        "domain": app.domain,
                        "url": app.url(),
                        "port": app.port,
                        "description": app.description,
                    })
                })
                .collect();
            output::print_json(&rows);
        }
    }
    Ok(())
}
