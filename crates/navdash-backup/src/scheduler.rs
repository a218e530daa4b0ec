// ──────────────────────────────────────────────────────────────────────────────
// navdash-backup · scheduler
// ──────────────────────────────────────────────────────────────────────────────
// Single recurring backup timer. Daily runs fire at 03:00 local time, weekly
// runs on Sunday at 03:00. Each firing runs in its own task so a failure or
// panic never stops the timer, and cancelling the timer never aborts a
// backup that already started.
// ──────────────────────────────────────────────────────────────────────────────

use crate::error::BackupError;
use crate::service::BackupService;
use crate::types::BackupFrequency;
use chrono::{DateTime, Datelike, Days, Local, NaiveTime, TimeZone, Weekday};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const FIRE_HOUR: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Armed(BackupFrequency),
}

pub struct BackupScheduler {
    service: Arc<BackupService>,
    state: SchedulerState,
    timer: Option<JoinHandle<()>>,
    live_timers: Arc<AtomicUsize>,
}

impl BackupScheduler {
    pub fn new(service: Arc<BackupService>) -> Self {
        Self {
            service,
            state: SchedulerState::Idle,
            timer: None,
            live_timers: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Number of timer tasks that have not yet been dropped.
    pub fn live_timers(&self) -> usize {
        self.live_timers.load(Ordering::SeqCst)
    }

    /// Cancel the current timer and arm a new one for `frequency`.
    ///
    /// `None` (unknown frequency) and `Off` leave the scheduler idle.
    /// Must be called from within a Tokio runtime.
    pub fn reconfigure(&mut self, frequency: Option<BackupFrequency>) -> SchedulerState {
        self.stop();

        let frequency = match frequency {
            Some(f) if f != BackupFrequency::Off => f,
            _ => {
                info!("backup scheduler idle");
                return self.state;
            }
        };

        let guard = LiveTimer::new(self.live_timers.clone());
        let service = self.service.clone();
        self.timer = Some(tokio::spawn(run_timer(service, frequency, guard)));
        self.state = SchedulerState::Armed(frequency);
        info!("backup scheduler armed: {}", frequency);
        self.state
    }

    /// Re-arm from the frequency currently stored in the config.
    pub async fn reload(&mut self) -> Result<SchedulerState, BackupError> {
        let config = self.service.config_store().get().await?;
        Ok(self.reconfigure(config.backup_frequency))
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
        self.state = SchedulerState::Idle;
    }
}

impl Drop for BackupScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

struct LiveTimer(Arc<AtomicUsize>);

impl LiveTimer {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LiveTimer {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn run_timer(service: Arc<BackupService>, frequency: BackupFrequency, guard: LiveTimer) {
    run_timer_with(service, frequency, guard, Local::now).await
}

async fn run_timer_with<Tz, C>(service: Arc<BackupService>, frequency: BackupFrequency, _guard: LiveTimer, clock: C)
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
    C: Fn() -> DateTime<Tz>,
{
    loop {
        let Some(wait) = time_to_next_fire(frequency, &clock()) else {
            return;
        };
        tokio::time::sleep(wait).await;

        let svc = service.clone();
        let run = tokio::spawn(async move { run_scheduled(&svc).await });
        if let Err(e) = run.await {
            if e.is_panic() {
                error!("scheduled backup panicked");
            }
        }
    }
}

/// Run one scheduled backup, recording failures instead of returning them.
pub async fn run_scheduled(service: &BackupService) {
    match service.backup_now().await {
        Ok(outcome) => info!("scheduled backup complete: {}", outcome.filename),
        Err(e) => {
            warn!("scheduled backup failed: {}", e);
            if let Err(store_err) = service.config_store().record_outcome(&e.failure_status(), None).await {
                error!("could not record backup failure: {}", store_err);
            }
        }
    }
}

fn time_to_next_fire<Tz>(frequency: BackupFrequency, now: &DateTime<Tz>) -> Option<Duration>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let next = next_fire(frequency, now)?;
    let wait = next.clone().signed_duration_since(now.clone()).to_std().unwrap_or_default();
    debug!("next scheduled backup at {} (in {}s)", next, wait.as_secs());
    Some(wait)
}

/// Next firing strictly after `now` in `now`'s time zone.
pub fn next_fire<Tz: TimeZone>(frequency: BackupFrequency, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    if frequency == BackupFrequency::Off {
        return None;
    }
    let at = NaiveTime::from_hms_opt(FIRE_HOUR, 0, 0)?;
    let tz = now.timezone();
    let today = now.date_naive();

    (0..=8u64)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .filter(|day| frequency != BackupFrequency::Weekly || day.weekday() == Weekday::Sun)
        // 03:00 may not exist on a DST transition day; such days are skipped.
        .filter_map(|day| tz.from_local_datetime(&day.and_time(at)).earliest())
        .find(|candidate| candidate > now)
}
