//! Profile commands.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::{bail, Result};
use reel_session::{ProfilePatch, Role};

/// Show the signed-in user's profile.
pub fn profile_show(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let snapshot = ctx.store.snapshot();
    if !snapshot.is_authenticated {
        bail!("Not logged in. Run 'reel login' first");
    }

    let Some(profile) = snapshot.profile else {
        match format {
            OutputFormat::Text => println!("No profile found for this account."),
            OutputFormat::Json => println!("null"),
        }
        return Ok(());
    };

    match format {
        OutputFormat::Text => {
            output::print_heading("Profile");
            output::print_row("ID", &profile.id);
            output::print_row("User", &profile.user_id);
            output::print_row("Role", profile.role.as_str());
            output::print_row("First name", profile.first_name.as_deref().unwrap_or("-"));
            output::print_row("Last name", profile.last_name.as_deref().unwrap_or("-"));
            for (key, value) in &profile.extra {
                let rendered = match value.as_str() {
                    Some(s) => s.to_string(),
                    None => value.to_string(),
                };
                output::print_row(key, &rendered);
            }
        }
        OutputFormat::Json => output::print_json(&profile),
    }
    Ok(())
}

/// An empty value clears the column.
fn nullable_column(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn build_patch(
    first_name: Option<String>,
    last_name: Option<String>,
    role: Option<String>,
) -> Result<ProfilePatch> {
    let patch = ProfilePatch {
        first_name: first_name.map(nullable_column),
        last_name: last_name.map(nullable_column),
        role: role.map(|r| r.parse::<Role>()).transpose()?,
        ..Default::default()
    };
    if patch.is_empty() {
        bail!("Nothing to update. Pass --first-name, --last-name or --role");
    }
    Ok(patch)
}

/// Update columns of the signed-in user's profile.
pub async fn profile_update(
    ctx: &Context,
    first_name: Option<String>,
    last_name: Option<String>,
    role: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let patch = build_patch(first_name, last_name, role)?;

    ctx.store
        .update_profile(patch)
        .await
        .map_err(|e| anyhow::anyhow!("Profile update failed: {}", e))?;

    output::print_success("Profile updated", format);
    if let OutputFormat::Text = format {
        if let Some(profile) = ctx.store.snapshot().profile {
            output::print_row("Role", profile.role.as_str());
            if let Some(name) = profile.display_name() {
                output::print_row("Name", &name);
            }
        }
    }
    Ok(())
}
