//! Interpolated playback position.
//!
//! The backend reports the authoritative position about once a second; in
//! between, the position is extrapolated from a local monotonic anchor. Large
//! disagreements snap the anchor, small ones are left alone so the display
//! never jitters.

use tokio::time::Instant;

/// Result of comparing the interpolated position with the backend's.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reconcile {
    /// Drift exceeded the threshold; the clock now reads `to`.
    Snapped { drift: f64, to: f64 },
    /// Drift within tolerance; nothing changed.
    Kept { drift: f64 },
    /// The clock is stopped, nothing to reconcile.
    Idle,
}

/// Result of one display-refresh step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    Position(f64),
    /// The track reached its end. Reported once per track.
    Finished,
    Idle,
}

#[derive(Debug, Clone)]
pub struct PlaybackClock {
    anchor_wall: Instant,
    anchor_position: f64,
    running: bool,
    finished: bool,
    snap_threshold: f64,
}

impl PlaybackClock {
    pub fn new(snap_threshold: f64) -> Self {
        Self {
            anchor_wall: Instant::now(),
            anchor_position: 0.0,
            running: false,
            finished: false,
            snap_threshold,
        }
    }

    /// Re-anchor at `position` and start running.
    pub fn reset(&mut self, position: f64) {
        self.reset_at(position, Instant::now());
    }

    pub fn reset_at(&mut self, position: f64, now: Instant) {
        self.anchor_wall = now;
        self.anchor_position = position;
        self.running = true;
    }

    /// Re-anchor without running; used while paused or waiting on a seek.
    pub fn hold(&mut self, position: f64) {
        self.anchor_wall = Instant::now();
        self.anchor_position = position;
        self.running = false;
    }

    /// Freeze at the current interpolated position.
    pub fn stop(&mut self) {
        self.stop_at(Instant::now());
    }

    pub fn stop_at(&mut self, now: Instant) {
        self.anchor_position = self.interpolate_at(now);
        self.anchor_wall = now;
        self.running = false;
    }

    /// Arm the end-of-track latch for a new track.
    pub fn rearm(&mut self) {
        self.finished = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn interpolate(&self) -> f64 {
        self.interpolate_at(Instant::now())
    }

    pub fn interpolate_at(&self, now: Instant) -> f64 {
        if !self.running {
            return self.anchor_position;
        }
        self.anchor_position + now.saturating_duration_since(self.anchor_wall).as_secs_f64()
    }

    pub fn reconcile(&mut self, authoritative: f64) -> Reconcile {
        self.reconcile_at(authoritative, Instant::now())
    }

    pub fn reconcile_at(&mut self, authoritative: f64, now: Instant) -> Reconcile {
        if !self.running {
            return Reconcile::Idle;
        }
        let drift = authoritative - self.interpolate_at(now);
        if drift.abs() > self.snap_threshold {
            self.reset_at(authoritative, now);
            Reconcile::Snapped {
                drift,
                to: authoritative,
            }
        } else {
            Reconcile::Kept { drift }
        }
    }

    pub fn tick(&mut self, duration: f64) -> Tick {
        self.tick_at(duration, Instant::now())
    }

    /// Advance one frame. Stops itself at `duration` (when known).
    pub fn tick_at(&mut self, duration: f64, now: Instant) -> Tick {
        if !self.running || self.finished {
            return Tick::Idle;
        }
        let position = self.interpolate_at(now);
        if duration > 0.0 && position >= duration {
            self.finished = true;
            self.anchor_position = duration;
            self.anchor_wall = now;
            self.running = false;
            return Tick::Finished;
        }
        Tick::Position(position)
    }
}
