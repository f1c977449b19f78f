//! Output formatting for the CLI.

use clap::ValueEnum;
use reel_session::SessionSnapshot;
use serde::Serialize;

/// Output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print a serializable value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: failed to encode output: {}", e),
    }
}

/// Print a success message.
pub fn print_success(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", message),
        OutputFormat::Json => print_json(&serde_json::json!({
            "status": "success",
            "message": message,
        })),
    }
}

/// Print an error message.
pub fn print_error(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => {
            let body = serde_json::json!({ "status": "error", "message": message });
            eprintln!("{}", body);
        }
    }
}

/// Print a table row.
pub fn print_row(label: &str, value: &str) {
    println!("  {:<16} {}", format!("{}:", label), value);
}

/// Print a divider line.
pub fn print_divider() {
    println!("{}", "-".repeat(50));
}

/// Print a heading.
pub fn print_heading(text: &str) {
    println!("\n{}", text);
    print_divider();
}

/// Print the session snapshot.
pub fn print_snapshot(snapshot: &SessionSnapshot, format: &OutputFormat) {
    if let OutputFormat::Json = format {
        print_json(snapshot);
        return;
    }

    let auth = if snapshot.is_authenticated {
        "logged in"
    } else {
        "logged out"
    };
    print_row("Auth", auth);
    if let Some(user) = &snapshot.user {
        print_row("User", &user.id);
        print_row("Email", &user.email);
    }
    if let Some(profile) = &snapshot.profile {
        print_row("Role", profile.role.as_str());
        if let Some(name) = profile.display_name() {
            print_row("Name", &name);
        }
    } else if snapshot.is_authenticated {
        print_row("Profile", "none");
    }
    if let Some(expires_at) = snapshot.session.as_ref().and_then(|s| s.expires_at) {
        print_row("Expires", &expires_at.to_rfc3339());
    }
    if snapshot.is_blocking() {
        print_row("Loading", "yes");
    }
    if let Some(error) = &snapshot.error {
        match error.status {
            Some(status) => print_row("Error", &format!("{} ({})", error.message, status)),
            None => print_row("Error", &error.message),
        }
    }
}
