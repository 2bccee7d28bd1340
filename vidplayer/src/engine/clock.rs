use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// Beyond this many seconds of disagreement a clock resyncs instead of drifting.
pub const NOSYNC_THRESHOLD: f64 = 10.0;

/**
    A read-only view into a [`super::packet_queue::PacketQueue`]'s current serial.

    Clocks need to know "has a flush happened downstream that I haven't caught
    up to yet" without holding a reference back to the queue that owns them —
    the cyclic clock/queue relationship the original keeps is re-expressed here
    as a one-way, lock-free read of a shared atomic counter the queue publishes.
*/
#[derive(Clone)]
pub struct SerialView(Arc<AtomicI64>);

impl SerialView {
    pub(crate) fn new(counter: Arc<AtomicI64>) -> Self {
        Self(counter)
    }

    /// A standalone view that never changes; used by clocks with no backing queue
    /// (the external clock, which "stands alone" per the data model).
    pub fn standalone() -> Self {
        Self(Arc::new(AtomicI64::new(0)))
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }
}

/// Which stream a clock tracks; purely descriptive, used for logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockKind {
    Audio,
    Video,
    External,
}

struct ClockInner {
    pts: f64,
    pts_drift: f64,
    last_updated: f64,
    speed: f64,
    serial: i64,
    paused: bool,
}

/**
    Monotonic playback clock with drift, speed, pause, and serial gating (C1).

    `now()` reports `NaN` whenever the clock's serial has fallen behind its
    backing queue's serial — a discontinuity has happened downstream that this
    clock hasn't observed yet — which lets the sync policy treat "I don't know"
    as a first-class value rather than a stale number.
*/
pub struct Clock {
    kind: ClockKind,
    inner: std::sync::Mutex<ClockInner>,
    serial_view: SerialView,
    epoch: Instant,
}

fn wall_seconds(epoch: Instant) -> f64 {
    epoch.elapsed().as_secs_f64()
}

impl Clock {
    pub fn new(kind: ClockKind, serial_view: SerialView) -> Self {
        let clock = Self {
            kind,
            inner: std::sync::Mutex::new(ClockInner {
                pts: f64::NAN,
                pts_drift: 0.0,
                last_updated: 0.0,
                speed: 1.0,
                serial: -1,
                paused: false,
            }),
            serial_view,
            epoch: Instant::now(),
        };
        clock.set(f64::NAN, -1);
        clock
    }

    pub fn kind(&self) -> ClockKind {
        self.kind
    }

    fn wall(&self) -> f64 {
        wall_seconds(self.epoch)
    }

    /// Current playback position in seconds, or `NaN` if this clock's view of
    /// its queue's serial has fallen behind.
    pub fn now(&self) -> f64 {
        let inner = self.inner.lock().unwrap();
        if inner.serial != self.serial_view.get() {
            return f64::NAN;
        }
        if inner.paused {
            return inner.pts;
        }
        let wall = self.wall();
        inner.pts_drift + wall + (wall - inner.last_updated) * (inner.speed - 1.0)
    }

    fn set_at(&self, pts: f64, serial: i64, wall: f64) {
        let mut inner = self.inner.lock().unwrap();
        inner.pts = pts;
        inner.last_updated = wall;
        inner.pts_drift = pts - wall;
        inner.serial = serial;
    }

    /// Anchor this clock to `pts` at the current wall time, tagged with `serial`.
    pub fn set(&self, pts: f64, serial: i64) {
        let wall = self.wall();
        self.set_at(pts, serial, wall);
    }

    /// Set speed, re-anchoring first so `now()` stays continuous across the change.
    pub fn set_speed(&self, speed: f64) {
        let serial = self.inner.lock().unwrap().serial;
        self.set(self.now(), serial);
        self.inner.lock().unwrap().speed = speed;
    }

    pub fn speed(&self) -> f64 {
        self.inner.lock().unwrap().speed
    }

    pub fn set_paused(&self, paused: bool) {
        self.inner.lock().unwrap().paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().unwrap().paused
    }

    pub fn serial(&self) -> i64 {
        self.inner.lock().unwrap().serial
    }

    /// Pull this clock to match `slave` if they disagree by more than
    /// [`NOSYNC_THRESHOLD`] seconds, or if this clock doesn't have a valid value yet.
    pub fn sync_to(&self, slave: &Clock) {
        let this_now = self.now();
        let slave_now = slave.now();
        if !slave_now.is_nan() && (this_now.is_nan() || (this_now - slave_now).abs() > NOSYNC_THRESHOLD)
        {
            self.set(slave_now, slave.serial());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_reflects_nan_on_serial_mismatch() {
        let counter = Arc::new(AtomicI64::new(0));
        let view = SerialView::new(counter.clone());
        let clock = Clock::new(ClockKind::Video, view);
        clock.set(1.0, 0);
        assert!(!clock.now().is_nan());

        counter.store(1, Ordering::Release);
        assert!(clock.now().is_nan());
    }

    #[test]
    fn paused_clock_reports_pts_verbatim() {
        let view = SerialView::standalone();
        let clock = Clock::new(ClockKind::External, view);
        clock.set(5.0, 0);
        clock.set_paused(true);
        assert_eq!(clock.now(), 5.0);
    }

    #[test]
    fn set_speed_is_continuous() {
        let view = SerialView::standalone();
        let clock = Clock::new(ClockKind::External, view);
        clock.set(0.0, 0);
        let before = clock.now();
        clock.set_speed(2.0);
        let after = clock.now();
        assert!((before - after).abs() < 0.01);
    }

    #[test]
    fn sync_to_pulls_on_large_divergence() {
        let view_a = SerialView::standalone();
        let view_b = SerialView::standalone();
        let a = Clock::new(ClockKind::Video, view_a);
        let b = Clock::new(ClockKind::External, view_b);
        a.set(0.0, 0);
        b.set(100.0, 0);
        a.sync_to(&b);
        assert!((a.now() - b.now()).abs() < 0.01);
    }
}
