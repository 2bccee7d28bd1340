use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use ringbuf::{
    HeapRb,
    traits::{Consumer, Observer, Producer, Split},
};

use crate::engine::clock::{Clock, ClockKind, SerialView};

struct AtomicF32 {
    inner: AtomicU32,
}

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self {
            inner: AtomicU32::new(value.to_bits()),
        }
    }

    fn load(&self, ordering: Ordering) -> f32 {
        f32::from_bits(self.inner.load(ordering))
    }

    fn store(&self, value: f32, ordering: Ordering) {
        self.inner.store(value.to_bits(), ordering);
    }
}

struct AtomicF64 {
    inner: AtomicU64,
}

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self {
            inner: AtomicU64::new(value.to_bits()),
        }
    }

    fn load(&self, ordering: Ordering) -> f64 {
        f64::from_bits(self.inner.load(ordering))
    }

    fn store(&self, value: f64, ordering: Ordering) {
        self.inner.store(value.to_bits(), ordering);
    }
}

const RING_BUFFER_SIZE: usize = 48000 * 2 * 2; // ~2 seconds stereo at 48kHz
/// Interleaved samples per second, matching the stereo/48kHz assumption
/// baked into `RING_BUFFER_SIZE` above.
const SAMPLES_PER_SEC: f64 = 48000.0 * 2.0;

/// End-of-buffer (pts, serial) published by the producer each time it
/// finishes writing a frame's samples; read by the sink callback to correct
/// the audio clock for the samples still sitting in the ring buffer.
struct AudioClockTail {
    end_pts: AtomicF64,
    serial: AtomicI64,
}

impl AudioClockTail {
    fn new() -> Self {
        Self {
            end_pts: AtomicF64::new(0.0),
            serial: AtomicI64::new(-1),
        }
    }

    fn set(&self, end_pts: f64, serial: i64) {
        self.end_pts.store(end_pts, Ordering::Release);
        self.serial.store(serial, Ordering::Release);
    }

    fn get(&self) -> (f64, i64) {
        (self.end_pts.load(Ordering::Acquire), self.serial.load(Ordering::Acquire))
    }
}

pub struct AudioStreamProducer {
    producer: UnsafeCell<ringbuf::HeapProd<f32>>,
    closed: Arc<AtomicBool>,
    tail: Arc<AudioClockTail>,
}

unsafe impl Send for AudioStreamProducer {}
unsafe impl Sync for AudioStreamProducer {}

impl AudioStreamProducer {
    /// Push one frame's samples, publishing `end_pts`/`serial` for the sink
    /// callback to correct the audio clock against once they're actually
    /// played out (see [`AudioStreamConsumer::fill_buffer`]).
    pub fn push(&self, samples: &[f32], end_pts: f64, serial: i64) -> bool {
        let mut offset = 0;
        while offset < samples.len() {
            if self.closed.load(Ordering::Acquire) {
                return false;
            }

            let written = unsafe { (*self.producer.get()).push_slice(&samples[offset..]) };
            offset += written;

            if offset < samples.len() {
                thread::sleep(Duration::from_micros(500));
            }
        }
        self.tail.set(end_pts, serial);
        true
    }

    pub fn available(&self) -> usize {
        unsafe { (*self.producer.get()).vacant_len() }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

pub struct AudioStreamConsumer {
    consumer: UnsafeCell<ringbuf::HeapCons<f32>>,
    volume: AtomicF32,
    closed: Arc<AtomicBool>,
    paused: AtomicBool,
    muted: AtomicBool,
    audio_clock: Arc<Clock>,
    tail: Arc<AudioClockTail>,
}

unsafe impl Send for AudioStreamConsumer {}
unsafe impl Sync for AudioStreamConsumer {}

impl AudioStreamConsumer {
    pub fn volume(&self) -> f32 {
        self.volume.load(Ordering::Relaxed)
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume.store(volume.clamp(0.0, 1.0), Ordering::Relaxed);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn mute(&self) {
        self.muted.store(true, Ordering::Relaxed);
    }

    pub fn unmute(&self) {
        self.muted.store(false, Ordering::Relaxed);
    }

    pub fn toggle_mute(&self) -> bool {
        let was_muted = self.muted.load(Ordering::Relaxed);
        self.muted.store(!was_muted, Ordering::Relaxed);
        !was_muted
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn is_ended(&self) -> bool {
        unsafe { self.closed.load(Ordering::Acquire) && (*self.consumer.get()).is_empty() }
    }

    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn available(&self) -> usize {
        unsafe { (*self.consumer.get()).occupied_len() }
    }

    pub fn fill_buffer(&self, output: &mut [f32]) -> usize {
        if self.paused.load(Ordering::Relaxed) {
            for sample in output.iter_mut() {
                *sample = 0.0;
            }
            return 0;
        }

        let is_muted = self.muted.load(Ordering::Relaxed);
        let volume = self.volume();

        let available = unsafe { (*self.consumer.get()).occupied_len() };
        let to_read = output.len().min(available);

        if to_read > 0 {
            let read = unsafe { (*self.consumer.get()).pop_slice(&mut output[..to_read]) };

            if is_muted {
                for sample in &mut output[..read] {
                    *sample = 0.0;
                }
            } else {
                for sample in &mut output[..read] {
                    *sample *= volume;
                }
            }

            for sample in &mut output[read..] {
                *sample = 0.0;
            }

            self.update_audio_clock(read);
            read
        } else {
            for sample in output.iter_mut() {
                *sample = 0.0;
            }

            0
        }
    }

    /// Correct the audio clock for the samples still sitting in the ring
    /// buffer plus the ones just handed to the hardware, rather than
    /// stamping it with a decoded frame's pts as it's pulled into the ring
    /// buffer (which leads actual playback by however deep the buffer is).
    fn update_audio_clock(&self, just_read: usize) {
        let (end_pts, serial) = self.tail.get();
        if serial < 0 {
            return;
        }
        let remaining = unsafe { (*self.consumer.get()).occupied_len() } as f64;
        let buffered_latency = (remaining + just_read as f64) / SAMPLES_PER_SEC;
        self.audio_clock.set(end_pts - buffered_latency, serial);
    }

    pub fn clear(&self) {
        unsafe {
            let consumer = &mut *self.consumer.get();
            // Clear by popping all available samples
            let available = consumer.occupied_len();
            consumer.skip(available);
        }
    }
}

pub struct AudioStream {
    pub producer: AudioStreamProducer,
    pub consumer: Arc<AudioStreamConsumer>,
}

impl AudioStream {
    /// `audio_clock` is the [`Clock`] the sink callback corrects as samples
    /// actually drain out of the ring buffer (§4.7's buffer-latency term).
    pub fn new(audio_clock: Arc<Clock>) -> Self {
        let rb = HeapRb::<f32>::new(RING_BUFFER_SIZE);
        let (producer, consumer) = rb.split();

        let closed = Arc::new(AtomicBool::new(false));
        let tail = Arc::new(AudioClockTail::new());

        let producer = AudioStreamProducer {
            producer: UnsafeCell::new(producer),
            closed: Arc::clone(&closed),
            tail: tail.clone(),
        };

        let consumer = Arc::new(AudioStreamConsumer {
            consumer: UnsafeCell::new(consumer),
            volume: AtomicF32::new(1.0),
            closed,
            paused: AtomicBool::new(false),
            muted: AtomicBool::new(false),
            audio_clock,
            tail,
        });

        Self { producer, consumer }
    }
}

impl Default for AudioStream {
    /// A placeholder stream with nothing to synchronize against, for hosts
    /// that need a consumer before any source is open.
    fn default() -> Self {
        Self::new(Arc::new(Clock::new(ClockKind::Audio, SerialView::standalone())))
    }
}
