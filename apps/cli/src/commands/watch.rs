//! Follow the session snapshot.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use chrono::Local;
use reel_session::{ReconciliationListener, SessionSnapshot};
use std::time::Duration;
use tracing::{debug, info};

/// Attach the auth event listener and print every committed snapshot until Ctrl-C.
///
/// Every `interval_secs` the session is re-checked, which refreshes a token
/// that is about to expire.
pub async fn watch(ctx: Context, interval_secs: u64, format: &OutputFormat) -> Result<()> {
    let listener = ReconciliationListener::spawn(ctx.store.clone())?;
    let mut snapshots = ctx.store.subscribe();
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    // The first tick completes immediately and the store is already initialized.
    ticker.tick().await;

    info!(interval_secs, "Watching session");
    print_snapshot(&snapshots.borrow_and_update(), format);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                print_snapshot(&snapshot, format);
            }
            _ = ticker.tick() => {
                ctx.store.initialize().await;
            }
        }
    }

    listener.shutdown().await;
    Ok(())
}

fn print_snapshot(snapshot: &SessionSnapshot, format: &OutputFormat) {
    if let OutputFormat::Text = format {
        output::print_heading(&Local::now().format("%H:%M:%S").to_string());
    }
    output::print_snapshot(snapshot, format);
}
