//! Authentication commands.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::{bail, Result};
use reel_session::{ProfileSeed, Role};
use std::io::{self, Write};

/// Arguments for `reel signup`.
pub struct SignupArgs {
    pub email: String,
    pub role: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl SignupArgs {
    /// Profile seed, present when a role was given.
    fn seed(&self) -> Result<Option<ProfileSeed>> {
        let Some(role) = &self.role else {
            if self.first_name.is_some() || self.last_name.is_some() {
                bail!("--role is required when setting profile names");
            }
            return Ok(None);
        };

        let mut seed = ProfileSeed::new(role.parse::<Role>()?);
        seed.first_name = self.first_name.clone();
        seed.last_name = self.last_name.clone();
        Ok(Some(seed))
    }
}

fn prompt_email() -> Result<String> {
    print!("Email: ");
    io::stdout().flush()?;
    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    Ok(email.trim().to_string())
}

/// Login with email and password.
pub async fn login(ctx: &Context, email: Option<String>, format: &OutputFormat) -> Result<()> {
    let current = ctx.store.snapshot();
    if current.is_authenticated {
        let email = current.user.map(|u| u.email).unwrap_or_default();
        output::print_success(&format!("Already logged in as {}", email), format);
        return Ok(());
    }

    let email = match email {
        Some(email) => email,
        None => prompt_email()?,
    };
    if email.trim().is_empty() {
        bail!("Email is required");
    }

    // Prompt for password (hidden)
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        bail!("Password is required");
    }

    if let OutputFormat::Text = format {
        println!("Logging in...");
    }

    ctx.store
        .login(&email, &password)
        .await
        .map_err(|e| anyhow::anyhow!("Login failed: {}", e))?;

    let snapshot = ctx.store.snapshot();
    match snapshot.user.as_ref() {
        Some(user) => output::print_success(&format!("Logged in as {}", user.email), format),
        None => output::print_success("Logged in successfully", format),
    }
    if snapshot.is_authenticated && snapshot.profile.is_none() {
        if let OutputFormat::Text = format {
            println!("No profile found for this account.");
        }
    }
    Ok(())
}

/// Create an account, optionally with a profile.
pub async fn signup(ctx: &Context, args: SignupArgs, format: &OutputFormat) -> Result<()> {
    let seed = args.seed()?;

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        bail!("Password is required");
    }
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if confirm != password {
        bail!("Passwords do not match");
    }

    let user = ctx
        .store
        .signup(&args.email, &password, seed)
        .await
        .map_err(|e| anyhow::anyhow!("Signup failed: {}", e))?;

    match format {
        OutputFormat::Text => {
            println!("Account created for {}", user.email);
            if !ctx.store.snapshot().is_authenticated {
                println!("Check your inbox to confirm your email address, then run 'reel login'.");
            }
        }
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "status": "success",
            "user_id": user.id,
            "email": user.email,
            "logged_in": ctx.store.snapshot().is_authenticated,
        })),
    }
    Ok(())
}

/// Logout and clear session.
pub async fn logout(ctx: &Context, format: &OutputFormat) -> Result<()> {
    if !ctx.store.snapshot().is_authenticated {
        output::print_success("Not logged in", format);
        return Ok(());
    }

    ctx.store.logout().await;

    let snapshot = ctx.store.snapshot();
    if let Some(error) = snapshot.error {
        bail!("Logout failed: {}", error.message);
    }
    output::print_success("Logged out successfully", format);
    Ok(())
}

/// Request a password reset email.
pub async fn reset_password(ctx: &Context, email: &str, format: &OutputFormat) -> Result<()> {
    ctx.store
        .send_password_reset_email(email)
        .await
        .map_err(|e| anyhow::anyhow!("Password reset failed: {}", e))?;

    output::print_success(
        &format!("If an account exists for {}, a reset link is on its way", email.trim()),
        format,
    );
    Ok(())
}

/// Check authentication status.
pub fn status(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let snapshot = ctx.store.snapshot();

    match format {
        OutputFormat::Text => {
            output::print_heading("Session");
            output::print_snapshot(&snapshot, format);
            if let Some(app) = ctx.config.app {
                output::print_row("App", app.as_str());
            }
            output::print_row("Session file", &ctx.paths.session_file().display().to_string());
        }
        OutputFormat::Json => output::print_snapshot(&snapshot, format),
    }
    Ok(())
}
