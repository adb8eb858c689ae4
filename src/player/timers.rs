//! Cancellable periodic and one-shot tasks feeding the app event channel.
//!
//! Every running task has exactly one owner: dropping the handle aborts it.
//! Ticks carry a generation (or sequence) number so a tick that was already
//! queued when its task got cancelled is recognised and ignored.

use crate::app::events::{Event, TimerEvent};
use std::time::Duration;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

/// Owning handle over a spawned task. Aborts the task on drop.
#[derive(Debug)]
pub struct ScheduledTask(JoinHandle<()>);

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Send `make()` every `period`, first after one full period.
pub fn every<T, F>(period: Duration, tx: mpsc::Sender<T>, mut make: F) -> ScheduledTask
where
    T: Send + 'static,
    F: FnMut() -> T + Send + 'static,
{
    ScheduledTask(tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if tx.send(make()).await.is_err() {
                break;
            }
        }
    }))
}

/// Send `event` once after `delay`.
pub fn after<T>(delay: Duration, tx: mpsc::Sender<T>, event: T) -> ScheduledTask
where
    T: Send + 'static,
{
    ScheduledTask(tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(event).await;
    }))
}

/// The two activities that drive the playback clock while playing: the
/// per-frame interpolation step and the once-a-second reconciliation.
/// They always start and stop together.
#[derive(Debug, Default)]
pub struct PlaybackTimers {
    generation: u64,
    frame: Option<ScheduledTask>,
    sync: Option<ScheduledTask>,
}

impl PlaybackTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop whatever is running and start a fresh pair. Returns the new
    /// generation.
    pub fn start(&mut self, tx: &mpsc::Sender<Event>, frame: Duration, sync: Duration) -> u64 {
        self.stop();
        self.generation += 1;
        let generation = self.generation;

        self.frame = Some(every(frame, tx.clone(), move || {
            Event::Timer(TimerEvent::Frame { generation })
        }));
        self.sync = Some(every(sync, tx.clone(), move || {
            Event::Timer(TimerEvent::Sync { generation })
        }));
        generation
    }

    /// Cancel both tasks. Safe to call when nothing is running.
    pub fn stop(&mut self) {
        self.frame = None;
        self.sync = None;
    }

    pub fn is_running(&self) -> bool {
        self.frame.is_some()
    }

    /// Whether a tick of `generation` should still be acted on.
    pub fn is_current(&self, generation: u64) -> bool {
        self.is_running() && generation == self.generation
    }
}

/// Coalesces rapid seek requests so only the last target within the window
/// reaches the backend.
#[derive(Debug)]
pub struct SeekDebouncer {
    delay: Duration,
    seq: u64,
    pending: Option<ScheduledTask>,
}

impl SeekDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            seq: 0,
            pending: None,
        }
    }

    /// Replace any pending commit with one for `target`.
    pub fn schedule(&mut self, target: f64, tx: &mpsc::Sender<Event>) -> u64 {
        self.cancel();
        self.seq += 1;
        let event = Event::Timer(TimerEvent::SeekCommit {
            seq: self.seq,
            target,
        });
        self.pending = Some(after(self.delay, tx.clone(), event));
        self.seq
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Accept the commit for `seq` if it is the latest one. Clears the
    /// pending slot when it is.
    pub fn take(&mut self, seq: u64) -> bool {
        if self.pending.is_some() && seq == self.seq {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn every_ticks_until_dropped() {
        let (tx, mut rx) = mpsc::channel::<u32>(16);
        let mut n = 0;
        let task = every(ms(100), tx, move || {
            n += 1;
            n
        });

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
        drop(task);
        tokio::time::sleep(ms(500)).await;
        // At most one tick already in flight before the abort.
        let mut extra = 0;
        while rx.try_recv().is_ok() {
            extra += 1;
        }
        assert!(extra <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_only_commits_last_target() {
        let (tx, mut rx) = mpsc::channel::<Event>(16);
        let mut seek = SeekDebouncer::new(ms(100));

        seek.schedule(10.0, &tx);
        tokio::time::sleep(ms(40)).await;
        seek.schedule(20.0, &tx);
        tokio::time::sleep(ms(40)).await;
        let last = seek.schedule(30.0, &tx);

        match rx.recv().await {
            Some(Event::Timer(TimerEvent::SeekCommit { seq, target })) => {
                assert_eq!(seq, last);
                assert_eq!(target, 30.0);
                assert!(seek.take(seq));
            }
            other => panic!("unexpected {other:?}"),
        }
        tokio::time::sleep(ms(300)).await;
        assert!(rx.try_recv().is_err());
        assert!(!seek.is_pending());
    }

    #[test]
    fn debouncer_rejects_stale_sequence() {
        let mut seek = SeekDebouncer::new(ms(100));
        assert!(!seek.take(0));
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_timers_invalidates_old_ticks() {
        let (tx, mut rx) = mpsc::channel::<Event>(64);
        let mut timers = PlaybackTimers::new();

        let first = timers.start(&tx, ms(16), ms(1000));
        assert!(timers.is_current(first));
        let second = timers.start(&tx, ms(16), ms(1000));
        assert!(!timers.is_current(first));
        assert!(timers.is_current(second));

        match rx.recv().await {
            Some(Event::Timer(TimerEvent::Frame { generation })) => {
                assert_eq!(generation, second)
            }
            other => panic!("unexpected {other:?}"),
        }

        timers.stop();
        timers.stop();
        assert!(!timers.is_running());
        assert!(!timers.is_current(second));
    }

    #[tokio::test(start_paused = true)]
    async fn sync_ticks_once_per_period() {
        let (tx, mut rx) = mpsc::channel::<Event>(256);
        let mut timers = PlaybackTimers::new();
        timers.start(&tx, ms(1000), ms(250));

        tokio::time::sleep(ms(1010)).await;
        timers.stop();
        let mut frames = 0;
        let mut syncs = 0;
        while let Ok(ev) = rx.try_recv() {
            match ev {
                Event::Timer(TimerEvent::Frame { .. }) => frames += 1,
                Event::Timer(TimerEvent::Sync { .. }) => syncs += 1,
                _ => {}
            }
        }
        assert_eq!(frames, 1);
        assert_eq!(syncs, 4);
    }
}
