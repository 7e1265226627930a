//! Best-effort neutralization of transient UI blockers.
//!
//! Obstacles are optional and vary per step, so nothing in here is allowed
//! to fail a run: every driver error is absorbed and logged, and the sweep
//! always returns.

use tokio::time::sleep;
use tracing::debug;

use crate::config::EngineConfig;
use crate::driver::PageDriver;
use crate::scripts;

/// Sweep the rendered page before an interaction is attempted: a fixed
/// number of dismissal passes with a settle pause in between, a scroll to
/// the bottom with opportunistic activation of secondary controls, and an
/// interaction marker in client storage keyed by step index.
pub async fn sweep(driver: &dyn PageDriver, config: &EngineConfig, step: u32) {
    for pass in 0..config.sweep_passes {
        match driver.eval(&scripts::dismiss_pass()).await {
            Ok(value) => {
                let clicked = value.as_u64().unwrap_or(0);
                if clicked > 0 {
                    debug!(step, pass, clicked, "dismissed obstacle controls");
                }
            }
            // The page may be mid-navigation; obstacles are optional anyway.
            Err(e) => debug!(step, pass, error = %e, "dismissal pass failed"),
        }
        sleep(config.sweep_pause).await;
    }

    if let Err(e) = driver.eval(&scripts::reveal_secondary()).await {
        debug!(step, error = %e, "secondary-control reveal failed");
    }

    // Some steps gate progress on evidence of interaction, independent of
    // the code itself.
    let marker_key = format!("interaction_step_{step}");
    if let Err(e) = driver
        .storage_set(&marker_key, r#"{"interacted":true}"#)
        .await
    {
        debug!(step, error = %e, "interaction marker write failed");
    }
}
