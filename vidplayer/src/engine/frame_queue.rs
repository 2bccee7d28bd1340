use std::sync::{Arc, Condvar, Mutex};

use super::frame::Frame;
use super::packet_queue::PacketQueue;

pub const VIDEO_PICTURE_QUEUE_SIZE: usize = 3;
pub const SAMPLE_QUEUE_SIZE: usize = 9;
pub const SUBPICTURE_QUEUE_SIZE: usize = 16;

struct Inner {
    slots: Vec<Option<Frame>>,
    r_index: usize,
    w_index: usize,
    size: usize,
    r_index_shown: usize,
}

/**
    Fixed-capacity ring of decoded frames with keep-last and writer/reader
    signaling (C3).

    Exactly one producer (a decoder thread) and one consumer (the refresh loop
    or audio callback) per queue; both block on the same mutex/condition pair
    this struct owns, never on the backing [`PacketQueue`]'s own lock.
*/
pub struct FrameQueue {
    inner: Mutex<Inner>,
    cond: Condvar,
    max_size: usize,
    keep_last: bool,
    packet_queue: Arc<PacketQueue>,
}

impl FrameQueue {
    pub fn new(packet_queue: Arc<PacketQueue>, max_size: usize, keep_last: bool) -> Self {
        let mut slots = Vec::with_capacity(max_size);
        slots.resize_with(max_size, || None);
        Self {
            inner: Mutex::new(Inner {
                slots,
                r_index: 0,
                w_index: 0,
                size: 0,
                r_index_shown: 0,
            }),
            cond: Condvar::new(),
            max_size,
            keep_last,
            packet_queue,
        }
    }

    /// Block until there is a free slot or the backing queue aborts; returns
    /// the write index to fill in place via [`Self::push`].
    pub fn peek_writable(&self) -> Option<usize> {
        let mut inner = self.inner.lock().unwrap();
        while inner.size >= self.max_size && !self.packet_queue.is_aborted() {
            inner = self.cond.wait(inner).unwrap();
        }
        if self.packet_queue.is_aborted() {
            return None;
        }
        Some(inner.w_index)
    }

    /// Store `frame` at the slot [`Self::peek_writable`] returned and publish it.
    pub fn push(&self, index: usize, frame: Frame) {
        let mut inner = self.inner.lock().unwrap();
        inner.slots[index] = Some(frame);
        inner.w_index = (inner.w_index + 1) % self.max_size;
        inner.size += 1;
        self.cond.notify_all();
    }

    /// Block until a readable frame exists or the backing queue aborts.
    pub fn peek_readable(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        while inner.size.saturating_sub(inner.r_index_shown) == 0 && !self.packet_queue.is_aborted()
        {
            inner = self.cond.wait(inner).unwrap();
        }
        !self.packet_queue.is_aborted()
    }

    fn slot_at(inner: &Inner, offset: usize) -> Option<Frame> {
        inner.slots[offset % inner.slots.len()].clone()
    }

    /// The currently-displayable frame (read index, adjusted for keep-last).
    pub fn peek(&self) -> Option<Frame> {
        let inner = self.inner.lock().unwrap();
        Self::slot_at(&inner, inner.r_index + inner.r_index_shown)
    }

    pub fn peek_next(&self) -> Option<Frame> {
        let inner = self.inner.lock().unwrap();
        Self::slot_at(&inner, inner.r_index + inner.r_index_shown + 1)
    }

    pub fn peek_last(&self) -> Option<Frame> {
        let inner = self.inner.lock().unwrap();
        inner.slots[inner.r_index].clone()
    }

    /// Advance the read cursor, retaining the last-shown frame one extra slot
    /// if `keep_last` is set and it hasn't been retained yet.
    pub fn next(&self) {
        let mut inner = self.inner.lock().unwrap();
        if self.keep_last && inner.r_index_shown == 0 {
            inner.r_index_shown = 1;
            return;
        }
        inner.slots[inner.r_index] = None;
        inner.r_index = (inner.r_index + 1) % self.max_size;
        inner.size -= 1;
        self.cond.notify_all();
    }

    pub fn remaining(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.size.saturating_sub(inner.r_index_shown)
    }

    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().size
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn r_index_shown(&self) -> usize {
        self.inner.lock().unwrap().r_index_shown
    }

    /// Byte position of the last-shown frame, if its serial still matches the
    /// backing queue's current serial; `-1` otherwise (used to checkpoint seek
    /// targets).
    pub fn last_pos(&self) -> i64 {
        let inner = self.inner.lock().unwrap();
        match &inner.slots[inner.r_index] {
            Some(frame) if inner.r_index_shown == 1 && frame.serial() == self.packet_queue.serial() => {
                frame.pos()
            }
            _ => -1,
        }
    }

    /// The backing [`PacketQueue`]'s current serial, for the presentation
    /// layer to detect frames left over from before a seek/flush.
    pub fn current_serial(&self) -> i64 {
        self.packet_queue.serial()
    }

    pub fn signal(&self) {
        let _inner = self.inner.lock().unwrap();
        self.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::frame::VideoFrame;
    use ffmpeg_types::Rational;

    fn video_frame(pts: f64, serial: i64) -> Frame {
        Frame::Video(VideoFrame {
            data: vec![],
            width: 1,
            height: 1,
            sample_aspect_ratio: 1.0,
            pts,
            duration: 0.04,
            pos: 0,
            serial,
        })
    }

    #[test]
    fn writable_then_readable_round_trip() {
        let pq = Arc::new(PacketQueue::new(Rational::new(1, 1), false));
        pq.start();
        let fq = FrameQueue::new(pq, VIDEO_PICTURE_QUEUE_SIZE, true);

        let idx = fq.peek_writable().unwrap();
        fq.push(idx, video_frame(1.0, 1));
        assert_eq!(fq.size(), 1);
        assert!(fq.peek_readable());

        let peeked = fq.peek().unwrap();
        assert_eq!(peeked.pts(), 1.0);
    }

    #[test]
    fn keep_last_retains_one_extra_slot() {
        let pq = Arc::new(PacketQueue::new(Rational::new(1, 1), false));
        pq.start();
        let fq = FrameQueue::new(pq, VIDEO_PICTURE_QUEUE_SIZE, true);

        let idx = fq.peek_writable().unwrap();
        fq.push(idx, video_frame(1.0, 1));
        fq.next();
        assert_eq!(fq.remaining(), 0);
        let last = fq.peek_last().unwrap();
        assert_eq!(last.pts(), 1.0);
    }

    #[test]
    fn invariants_hold_across_interleaving() {
        let pq = Arc::new(PacketQueue::new(Rational::new(1, 1), false));
        pq.start();
        let fq = FrameQueue::new(pq, VIDEO_PICTURE_QUEUE_SIZE, false);

        for i in 0..VIDEO_PICTURE_QUEUE_SIZE {
            let idx = fq.peek_writable().unwrap();
            fq.push(idx, video_frame(i as f64, 1));
        }
        assert_eq!(fq.size(), VIDEO_PICTURE_QUEUE_SIZE);
        assert!(fq.r_index_shown() <= 1);

        fq.next();
        assert_eq!(fq.size(), VIDEO_PICTURE_QUEUE_SIZE - 1);
        assert_eq!(fq.remaining(), fq.size() - fq.r_index_shown());
    }
}
