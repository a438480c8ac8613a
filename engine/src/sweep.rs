//! Periodic sweep for inactive and over-long sessions.
//!
//! The sweeper never touches session state: it reads each handle's activity
//! ticker and sends an `Expire` command for the owning task to act on.

use quizcord_core::clock::Clock;
use quizcord_core::events::{ExpireReason, SessionCommand};
use quizcord_core::registry::SessionRegistry;
use quizcord_core::types::EngineConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

pub fn spawn(
    registry: Arc<SessionRegistry>,
    clock: Arc<dyn Clock>,
    config: &EngineConfig,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(config.sweep_interval_s.max(1));
    let inactivity_s = config.session_inactivity_s as f64;
    let hard_cap_s = config.session_hard_cap_s as f64;

    tokio::spawn(async move {
        loop {
            clock.sleep(interval).await;
            sweep_once(&registry, clock.now(), inactivity_s, hard_cap_s);
        }
    })
}

/// One pass over the registry. Split out so tests can drive it directly.
pub fn sweep_once(
    registry: &SessionRegistry,
    now: f64,
    inactivity_s: f64,
    hard_cap_s: f64,
) -> usize {
    let mut expired = 0;
    for key in registry.active_keys() {
        let Some(handle) = registry.get(key) else {
            continue;
        };
        let reason = if handle.ticker.age_secs(now) > hard_cap_s {
            Some(ExpireReason::HardCap)
        } else if handle.ticker.idle_secs(now) > inactivity_s {
            Some(ExpireReason::Inactivity)
        } else {
            None
        };
        if let Some(reason) = reason {
            info!(
                guild_id = %key.0,
                channel_id = %key.1,
                ?reason,
                "expiring session"
            );
            // A full channel means the owning task has plenty to wake up
            // for already; the next sweep will try again.
            let _ = handle.commands.try_send(SessionCommand::Expire { reason });
            expired += 1;
        }
    }
    expired
}
