use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::datetime::Clock;
use crate::time_model::TimeModel;
use crate::timeline::{Indicator, TimelineIndicator};
use crate::view_window::DayColumn;

const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Periodic driver for the "now" marker. The marker only moves at
/// minute resolution, so anything faster than a minute is wasted work.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorTicker {
    period: Duration,
}

/// Running ticker. Stop it on teardown; dropping it cancels the task too.
#[derive(Debug)]
pub struct TickerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl IndicatorTicker {
    pub fn new(period: Duration) -> Self {
        if period < MIN_PERIOD {
            warn!(?period, "ticker period too short; using one second");
        }
        Self {
            period: period.max(MIN_PERIOD),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Calls `on_tick` with the clock's time immediately and then once per
    /// period. Must be called from within a tokio runtime.
    pub fn spawn<C, F>(&self, clock: C, mut on_tick: F) -> TickerHandle
    where
        C: Clock + Send + 'static,
        F: FnMut(NaiveDateTime) + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();
        let period = self.period;

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(?period, "indicator ticker started");

            loop {
                tokio::select! {
                    biased;
                    _ = child.cancelled() => break,
                    _ = interval.tick() => on_tick(clock.now()),
                }
            }

            debug!("indicator ticker stopped");
        });

        info!(?period, "spawned indicator ticker");
        TickerHandle {
            token,
            task: Some(task),
        }
    }

    /// Recomputes the indicator for a fixed day window on every tick.
    pub fn spawn_indicator<C, F>(
        &self,
        clock: C,
        days: Vec<DayColumn>,
        model: TimeModel,
        mut on_indicator: F,
    ) -> TickerHandle
    where
        C: Clock + Send + 'static,
        F: FnMut(Indicator) + Send + 'static,
    {
        self.spawn(clock, move |now| {
            on_indicator(TimelineIndicator::compute(now, &days, &model));
        })
    }
}

impl TickerHandle {
    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Cancels the ticker and waits for its task to exit.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            warn!(error = %err, "indicator ticker task failed");
        }
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{NaiveDate, Weekday};
    use tokio::sync::mpsc;

    use super::*;
    use crate::datetime::FixedClock;
    use crate::view_window::{ViewMode, ViewWindow};

    fn clock() -> FixedClock {
        FixedClock(
            NaiveDate::from_ymd_opt(2024, 6, 10)
                .and_then(|date| date.and_hms_opt(14, 5, 0))
                .expect("valid date time"),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let handle = IndicatorTicker::new(Duration::from_secs(60)).spawn(clock(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(150)).await;
        assert!(handle.is_running());
        handle.stop().await;

        // Immediate tick plus the ones at 60s and 120s.
        let seen = ticks.load(Ordering::SeqCst);
        assert_eq!(seen, 3);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_cancels_the_task() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = IndicatorTicker::new(Duration::from_secs(60)).spawn(clock(), move |now| {
            let _ = tx.send(now);
        });

        assert!(rx.recv().await.is_some());
        drop(handle);

        // The task exits and drops the sender.
        while rx.recv().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn indicator_ticks_carry_the_marker() {
        let window = ViewWindow::compute(
            NaiveDate::from_ymd_opt(2024, 6, 10).expect("valid date"),
            ViewMode::Week,
            Weekday::Sun,
        );
        let model = TimeModel::new(5, 23, 60.0).expect("valid model");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = IndicatorTicker::new(Duration::from_secs(60)).spawn_indicator(
            clock(),
            window.days,
            model,
            move |indicator| {
                let _ = tx.send(indicator);
            },
        );

        let indicator = rx.recv().await.expect("first tick");
        handle.stop().await;
        assert!(indicator.visible);
        assert_eq!(indicator.day_index, 1);
        assert_eq!(indicator.top, 545.0);
    }

    #[test]
    fn short_periods_are_raised() {
        let ticker = IndicatorTicker::new(Duration::ZERO);
        assert_eq!(ticker.period(), Duration::from_secs(1));
    }
}
