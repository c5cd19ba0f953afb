use crate::types::Result;
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// Drive `cycle` once per fixed interval, strictly serialized.
///
/// Cycles run inline, so two can never overlap. A trigger that would fire
/// while a cycle is still running is dropped (`MissedTickBehavior::Skip`),
/// never queued; the overrun is logged after the cycle ends. A failed
/// cycle is logged and the loop continues.
///
/// The first cycle fires one full interval after startup.
pub async fn run<F, Fut>(interval: Duration, mut cycle: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut timer = interval_at(Instant::now() + interval, interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("scheduler started, cycle interval {:?}", interval);
    loop {
        timer.tick().await;

        let started = Instant::now();
        info!("running bill check cycle at {}", Utc::now().to_rfc3339());
        if let Err(e) = cycle().await {
            error!("bill check cycle failed: {}", e);
        }

        let elapsed = started.elapsed();
        if elapsed >= interval {
            warn!(
                "cycle ran {:?}, longer than the {:?} interval; intermediate triggers were dropped",
                elapsed, interval
            );
        }
    }
}
