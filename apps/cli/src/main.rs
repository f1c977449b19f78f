//! ReelApps CLI - sign in to ReelApps and manage your profile.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use reel_config::{init_logging, DEFAULT_LOG_LEVEL};
use tracing::debug;

/// ReelApps CLI - Authentication and profile management for ReelApps.
#[derive(Parser)]
#[command(name = "reel")]
#[command(about = "ReelApps CLI for authentication and profile management")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level.
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email and password
    Login {
        /// Email address (prompted when omitted)
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Create a new account
    Signup {
        /// Email address
        #[arg(short, long)]
        email: String,
        /// Role for the new profile (candidate, recruiter, admin)
        #[arg(short, long)]
        role: Option<String>,
        /// First name for the new profile
        #[arg(long)]
        first_name: Option<String>,
        /// Last name for the new profile
        #[arg(long)]
        last_name: Option<String>,
    },

    /// Logout and clear session
    Logout,

    /// Email a password reset link
    ResetPassword {
        /// Email address of the account
        #[arg(short, long)]
        email: String,
    },

    /// Check authentication status
    Status,

    /// View or edit your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// List ReelApps applications
    Apps {
        /// Resolve the app served at this host (e.g. reelcv.reelapps.co.za or localhost:5175)
        #[arg(long)]
        host: Option<String>,
    },

    /// Follow session changes until interrupted
    Watch {
        /// Seconds between session checks (refreshes expiring tokens)
        #[arg(short, long, default_value = "60")]
        interval: u64,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show the current profile
    Show,
    /// Update profile columns
    Update {
        /// New first name (empty to clear)
        #[arg(long)]
        first_name: Option<String>,
        /// New last name (empty to clear)
        #[arg(long)]
        last_name: Option<String>,
        /// New role (candidate, recruiter, admin)
        #[arg(short, long)]
        role: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;

    // The registry lookup needs no config or session.
    if let Commands::Apps { host } = &cli.command {
        let level = cli.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL);
        init_logging(level);
        return commands::apps(host.as_deref(), &format);
    }

    let ctx = commands::Context::open(cli.log_level.as_deref()).await?;
    debug!("CLI context ready");

    match cli.command {
        Commands::Login { email } => commands::login(&ctx, email, &format).await,
        Commands::Signup {
            email,
            role,
            first_name,
            last_name,
        } => {
            let args = commands::SignupArgs {
                email,
                role,
                first_name,
                last_name,
            };
            commands::signup(&ctx, args, &format).await
        }
        Commands::Logout => commands::logout(&ctx, &format).await,
        Commands::ResetPassword { email } => commands::reset_password(&ctx, &email, &format).await,
        Commands::Status => commands::status(&ctx, &format),
        Commands::Profile { command } => match command {
            ProfileCommands::Show => commands::profile_show(&ctx, &format),
            ProfileCommands::Update {
                first_name,
                last_name,
                role,
            } => commands::profile_update(&ctx, first_name, last_name, role, &format).await,
        },
        Commands::Watch { interval } => commands::watch(ctx, interval, &format).await,
        Commands::Apps { .. } => Ok(()),
    }
}
