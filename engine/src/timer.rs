//! Per-question timer loop: one authoritative deadline task and one
//! display-refresh task, sharing a monotonic cancellation flag.
//!
//! Both tasks sleep in short slices so cancellation is observed within half
//! a second. The display task owns the countdown edits and never blocks the
//! deadline: a failed edit is logged and skipped.

use quizcord_core::clock::Clock;
use quizcord_core::traits::{MessageRef, Presenter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Longest uninterrupted sleep either task takes; bounds how stale a
/// cancellation can be observed.
pub const TIMER_SLICE: Duration = Duration::from_millis(500);

/// Delay between cancelling the timer tasks and editing the reveal, so an
/// in-flight countdown edit cannot overwrite the reveal.
pub const REVEAL_SETTLE: Duration = Duration::from_millis(100);

/// Monotonic cancellation shared by the deadline and display tasks: once
/// set it stays set, and both tasks observe it within one slice.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Redraw interval for the countdown, tightening as time runs out.
pub fn display_interval(remaining_s: f64) -> f64 {
    if remaining_s <= 10.0 {
        1.0
    } else if remaining_s <= 30.0 {
        2.0
    } else {
        3.0
    }
}

/// Handle to one question's timer tasks. The tasks themselves are detached:
/// they exit within one slice of cancellation or deadline expiry.
pub struct QuestionTimer {
    pub cancel: CancelFlag,
    /// Fires exactly once, on natural deadline expiry. Never fires after
    /// cancellation.
    pub deadline: oneshot::Receiver<()>,
}

/// Start the deadline and (for public questions with a message) display
/// tasks for the question that began at `started_at`.
pub fn start(
    clock: Arc<dyn Clock>,
    presenter: Arc<dyn Presenter>,
    started_at: f64,
    timeout_s: u64,
    message: Option<MessageRef>,
) -> QuestionTimer {
    let cancel = CancelFlag::new();
    let deadline_at = started_at + timeout_s as f64;
    let (expiry_tx, expiry_rx) = oneshot::channel();

    {
        let clock = Arc::clone(&clock);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    debug!("deadline task cancelled");
                    return;
                }
                let remaining = deadline_at - clock.now();
                if remaining <= 0.0 {
                    break;
                }
                let slice = Duration::from_secs_f64(remaining.min(TIMER_SLICE.as_secs_f64()));
                clock.sleep(slice).await;
            }
            if !cancel.is_cancelled() {
                let _ = expiry_tx.send(());
            }
        });
    }

    if let Some(message) = message {
        let clock = Arc::clone(&clock);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            run_display(clock, presenter, message, deadline_at, timeout_s, cancel).await;
        });
    }

    QuestionTimer {
        cancel,
        deadline: expiry_rx,
    }
}

/// Countdown redraw loop. Edits are awaited one at a time, so there is
/// never more than one in flight; redraws are skipped while the displayed
/// integer second or the cadence says nothing changed.
async fn run_display(
    clock: Arc<dyn Clock>,
    presenter: Arc<dyn Presenter>,
    message: MessageRef,
    deadline_at: f64,
    timeout_s: u64,
    cancel: CancelFlag,
) {
    let mut last_displayed: i64 = -1;
    let mut last_redraw_at = f64::NEG_INFINITY;

    loop {
        if cancel.is_cancelled() {
            debug!("display task cancelled");
            return;
        }
        let now = clock.now();
        let remaining = deadline_at - now;
        if remaining <= 0.0 {
            break;
        }

        let seconds = remaining.floor() as i64;
        let due = now - last_redraw_at >= display_interval(remaining);
        if seconds != last_displayed && due {
            match presenter
                .update_timer(message, seconds.max(0) as u64, timeout_s)
                .await
            {
                Ok(()) => {
                    last_displayed = seconds;
                    last_redraw_at = now;
                }
                Err(e) => {
                    // Message deleted or rate limited; the deadline task is
                    // unaffected, keep trying on the next tick.
                    warn!(error = %e, "countdown edit failed");
                    if cancel.is_cancelled() {
                        return;
                    }
                }
            }
        }

        let remaining = (deadline_at - clock.now()).max(0.0);
        let slice = Duration::from_secs_f64(remaining.min(TIMER_SLICE.as_secs_f64()).max(0.01));
        clock.sleep(slice).await;
    }

    // Final 0s frame, unless a cancellation means a reveal is imminent.
    if !cancel.is_cancelled() {
        if let Err(e) = presenter.update_timer(message, 0, timeout_s).await {
            warn!(error = %e, "final countdown edit failed");
        }
    }
}
