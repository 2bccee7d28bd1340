use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration as StdDuration;

use ffmpeg_types::{Packet, Rational};

use super::clock::SerialView;
use super::queue_entry::QueueEntry;

/// Minimum queued packet count below which `has_enough_packets` always reports false.
pub const MIN_FRAMES: i32 = 25;

struct Inner {
    entries: VecDeque<(QueueEntry, i64)>,
    size_bytes: usize,
    duration_units: i64,
    serial: i64,
    abort: bool,
}

/**
    Bounded FIFO of compressed packets with the flush-serial discontinuity
    protocol (C2).

    One mutex, one condition, one producer (the demuxer), one consumer (the
    matching decoder thread). `serial` is published through a lock-free atomic
    so [`super::clock::Clock`]s can read it without touching this queue's mutex.
*/
pub struct PacketQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    serial_counter: Arc<AtomicI64>,
    time_base: Rational,
    is_attached_pic: bool,
}

/// Result of a blocking [`PacketQueue::get`].
pub enum GetOutcome {
    Entry(QueueEntry, i64),
    Aborted,
}

impl PacketQueue {
    pub fn new(time_base: Rational, is_attached_pic: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: VecDeque::new(),
                size_bytes: 0,
                duration_units: 0,
                serial: 0,
                abort: true,
            }),
            not_empty: Condvar::new(),
            serial_counter: Arc::new(AtomicI64::new(0)),
            time_base,
            is_attached_pic,
        }
    }

    /// A read-only handle to this queue's current serial, for clocks to watch.
    pub fn serial_view(&self) -> SerialView {
        SerialView::new(self.serial_counter.clone())
    }

    pub fn serial(&self) -> i64 {
        self.serial_counter.load(Ordering::Acquire)
    }

    fn publish_serial(&self, serial: i64) {
        self.serial_counter.store(serial, Ordering::Release);
    }

    fn put_locked(&self, inner: &mut Inner, entry: QueueEntry) {
        if matches!(entry, QueueEntry::Flush) {
            inner.serial += 1;
            self.publish_serial(inner.serial);
        }
        if let QueueEntry::Data(ref packet) = entry {
            inner.size_bytes += packet.data.len();
            inner.duration_units += packet.duration.0;
        }
        inner.entries.push_back((entry, inner.serial));
        self.not_empty.notify_one();
    }

    /// Append a packet. Returns `false` if the queue is aborted (the caller's
    /// packet is simply dropped).
    pub fn put(&self, packet: Packet) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.abort {
            return false;
        }
        self.put_locked(&mut inner, QueueEntry::Data(packet));
        true
    }

    /// Append the flush sentinel, bumping the serial before insertion.
    pub fn put_flush(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.abort {
            return false;
        }
        self.put_locked(&mut inner, QueueEntry::Flush);
        true
    }

    /// Append an end-of-stream marker for `stream_idx`.
    pub fn put_null(&self, stream_idx: usize) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.abort {
            return false;
        }
        self.put_locked(&mut inner, QueueEntry::Null(stream_idx));
        true
    }

    /// Remove and return the head entry, blocking until one is available or
    /// the queue is aborted.
    pub fn get(&self) -> GetOutcome {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.abort {
                return GetOutcome::Aborted;
            }
            if let Some((entry, serial)) = inner.entries.pop_front() {
                if let QueueEntry::Data(ref packet) = entry {
                    inner.size_bytes -= packet.data.len();
                    inner.duration_units -= packet.duration.0;
                }
                return GetOutcome::Entry(entry, serial);
            }
            inner = self.not_empty.wait(inner).unwrap();
        }
    }

    /// Like [`Self::get`], but gives up after `timeout` and returns `None`
    /// instead of blocking forever — used by the demuxer's transient-error wait.
    pub fn get_timeout(&self, timeout: StdDuration) -> Option<GetOutcome> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.abort {
                return Some(GetOutcome::Aborted);
            }
            if let Some((entry, serial)) = inner.entries.pop_front() {
                if let QueueEntry::Data(ref packet) = entry {
                    inner.size_bytes -= packet.data.len();
                    inner.duration_units -= packet.duration.0;
                }
                return Some(GetOutcome::Entry(entry, serial));
            }
            let (guard, result) = self.not_empty.wait_timeout(inner, timeout).unwrap();
            inner = guard;
            if result.timed_out() {
                return None;
            }
        }
    }

    /// Drop every queued entry; counters reset to zero, serial is unaffected.
    pub fn flush(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.clear();
        inner.size_bytes = 0;
        inner.duration_units = 0;
    }

    /// Clear abort and push the initial flush sentinel (serial 0 -> 1).
    pub fn start(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.abort = false;
        self.put_locked(&mut inner, QueueEntry::Flush);
    }

    pub fn abort(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.abort = true;
        self.not_empty.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.lock().unwrap().abort
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn size_bytes(&self) -> usize {
        self.inner.lock().unwrap().size_bytes
    }

    fn duration_seconds(&self, inner: &Inner) -> f64 {
        self.time_base.to_f64() * inner.duration_units as f64
    }

    /// True if this stream is disabled (queue never started), aborted, an
    /// attached picture, or already holds more than a second of packets.
    ///
    /// The original mixes `>` and `&&` with ambiguous C precedence; the
    /// intended grouping (count over the floor AND the duration condition) is
    /// what's implemented here.
    pub fn has_enough_packets(&self, stream_disabled: bool) -> bool {
        if stream_disabled || self.is_attached_pic {
            return true;
        }
        let inner = self.inner.lock().unwrap();
        if inner.abort {
            return true;
        }
        let count = inner.entries.len() as i32;
        count > MIN_FRAMES && (inner.duration_units == 0 || self.duration_seconds(&inner) > 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffmpeg_types::{Pts, StreamType};

    fn make_packet(size: usize, duration: i64) -> Packet {
        Packet::new(
            vec![0u8; size],
            Some(Pts(0)),
            Some(Pts(0)),
            Pts(duration),
            Rational::new(1, 1),
            true,
            StreamType::Video,
        )
    }

    #[test]
    fn put_get_preserves_sums_and_serial() {
        let q = PacketQueue::new(Rational::new(1, 1), false);
        q.start();
        // drain the initial flush sentinel
        matches!(q.get(), GetOutcome::Entry(QueueEntry::Flush, _));

        q.put(make_packet(10, 2));
        q.put(make_packet(20, 3));
        assert_eq!(q.size_bytes(), 30);

        let serial_before = q.serial();
        match q.get() {
            GetOutcome::Entry(QueueEntry::Data(p), serial) => {
                assert_eq!(p.data.len(), 10);
                assert_eq!(serial, serial_before);
            }
            _ => panic!("expected data entry"),
        }
    }

    #[test]
    fn flush_bumps_serial_before_insertion() {
        let q = PacketQueue::new(Rational::new(1, 1), false);
        q.start();
        let serial_after_start = q.serial();
        q.put_flush();
        assert!(q.serial() > serial_after_start);
    }

    #[test]
    fn has_enough_packets_requires_both_count_and_duration() {
        let q = PacketQueue::new(Rational::new(1, 30), false);
        q.start();
        for _ in 0..30 {
            q.put(make_packet(1, 1));
        }
        // 30 packets at 1/30s each = 1.0s, not > 1.0s, so duration condition fails.
        assert!(!q.has_enough_packets(false));
        q.put(make_packet(1, 5));
        assert!(q.has_enough_packets(false));
    }

    #[test]
    fn disabled_or_attached_pic_always_enough() {
        let q = PacketQueue::new(Rational::new(1, 1), true);
        assert!(q.has_enough_packets(false));
        let q2 = PacketQueue::new(Rational::new(1, 1), false);
        assert!(q2.has_enough_packets(true));
    }
}
