//! The demuxer loop (C6): owns the single [`Source`], fans packets out to the
//! per-stream [`PacketQueue`]s, and applies seek requests and backpressure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ffmpeg_source::Source;
use ffmpeg_types::StreamType;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::decoder::FinishedMark;
use super::error::{EngineError, Result};
use super::frame_queue::FrameQueue;
use super::options::EngineOptions;
use super::packet_queue::PacketQueue;

/// Packets queues fed by a single demuxer; streams the source doesn't carry
/// are simply `None` and never receive packets.
pub struct DemuxQueues {
    pub video: Option<Arc<PacketQueue>>,
    pub audio: Option<Arc<PacketQueue>>,
    pub subtitle: Option<Arc<PacketQueue>>,
}

/// A pending seek, set by the Engine API and consumed by the demux loop on
/// its next iteration.
#[derive(Clone, Copy)]
pub struct SeekRequest {
    pub target: Duration,
    pub by_bytes: bool,
}

/// Shared control surface between the Engine API and the running demux loop.
pub struct DemuxControl {
    pub abort: Arc<AtomicBool>,
    pub seek_req: Mutex<Option<SeekRequest>>,
    pub eof: AtomicBool,
}

impl DemuxControl {
    pub fn new() -> Self {
        Self {
            abort: Arc::new(AtomicBool::new(false)),
            seek_req: Mutex::new(None),
            eof: AtomicBool::new(false),
        }
    }

    pub fn request_seek(&self, target: Duration, by_bytes: bool) {
        *self.seek_req.lock().unwrap() = Some(SeekRequest { target, by_bytes });
    }

    pub fn is_eof(&self) -> bool {
        self.eof.load(Ordering::Acquire)
    }
}

/// The demuxer's view of each active decoder's drained state, used to gate
/// looping/autoexit on "finished for the current serial and frame queue
/// empty" rather than read-EOF alone. Streams the source doesn't carry (or
/// that never receive packets, like subtitles) are `None` and count as
/// already drained.
#[derive(Default)]
pub struct DrainWatch {
    pub video: Option<(Arc<FinishedMark>, Arc<FrameQueue>)>,
    pub audio: Option<(Arc<FinishedMark>, Arc<FrameQueue>)>,
}

fn all_decoders_drained(drain: &DrainWatch, queues: &DemuxQueues) -> bool {
    fn stream_drained(
        watch: &Option<(Arc<FinishedMark>, Arc<FrameQueue>)>,
        packets: &Option<Arc<PacketQueue>>,
    ) -> bool {
        match (watch, packets) {
            (Some((finished, frames)), Some(packets)) => {
                finished.is_finished_for(packets.serial()) && frames.is_empty()
            }
            _ => true,
        }
    }

    stream_drained(&drain.video, &queues.video) && stream_drained(&drain.audio, &queues.audio)
}

/// Backpressure ceiling for the combined packet queues when `infinite_buffer`
/// is off, matching the original's 15 MiB threshold.
const MAX_QUEUE_SIZE_BYTES: usize = 15 * 1024 * 1024;

fn queued_bytes(queues: &DemuxQueues) -> usize {
    [&queues.video, &queues.audio, &queues.subtitle]
        .iter()
        .filter_map(|q| q.as_ref())
        .map(|q| q.size_bytes())
        .sum()
}

fn all_streams_full(queues: &DemuxQueues, options: &EngineOptions) -> bool {
    let checks: [(Option<&Arc<PacketQueue>>, bool); 3] = [
        (queues.video.as_ref(), false),
        (queues.audio.as_ref(), false),
        // Source::next_packet only ever yields Video/Audio stream types, so
        // nothing ever feeds this queue; treat it as disabled rather than
        // letting its permanent zero count block the whole check forever.
        (queues.subtitle.as_ref(), true),
    ];
    checks
        .into_iter()
        .filter_map(|(q, disabled)| q.map(|q| (q, disabled)))
        .all(|(q, disabled)| q.has_enough_packets(disabled))
        || (!options.infinite_buffer && queued_bytes(queues) > MAX_QUEUE_SIZE_BYTES)
}

fn queue_for(queues: &DemuxQueues, stream_type: StreamType) -> Option<&Arc<PacketQueue>> {
    match stream_type {
        StreamType::Video => queues.video.as_ref(),
        StreamType::Audio => queues.audio.as_ref(),
        StreamType::Subtitle => queues.subtitle.as_ref(),
    }
}

fn flush_all(queues: &DemuxQueues) {
    for q in [&queues.video, &queues.audio, &queues.subtitle].into_iter().flatten() {
        q.flush();
        q.put_flush();
    }
}

fn mark_all_eof(queues: &DemuxQueues) {
    for (idx, q) in [&queues.video, &queues.audio, &queues.subtitle]
        .into_iter()
        .flatten()
        .enumerate()
    {
        q.put_null(idx);
    }
}

/// Runs until `control.abort` is set or the source is exhausted and looping
/// is disabled. Intended to be spawned on its own thread by `engine::mod`.
///
/// `options.loop_count` follows ffplay's `-loop` convention: `Some(n)` plays
/// the clip `n` times total (`n - 1` loop-seeks), `None` loops forever.
pub fn run_demuxer(
    mut source: Source,
    queues: DemuxQueues,
    drain: DrainWatch,
    options: EngineOptions,
    control: Arc<DemuxControl>,
    ext_clock: Arc<Clock>,
) -> Result<()> {
    let mut loops_remaining = options.loop_count;
    let start_position = Duration::ZERO;
    let mut eof_seen = false;

    loop {
        if control.abort.load(Ordering::Acquire) {
            return Err(EngineError::Aborted);
        }

        if let Some(seek) = control.seek_req.lock().unwrap().take() {
            match source.seek(seek.target) {
                Ok(actual) => {
                    flush_all(&queues);
                    if seek.by_bytes {
                        ext_clock.set(f64::NAN, ext_clock.serial());
                    } else {
                        ext_clock.set(actual.as_secs_f64(), ext_clock.serial());
                    }
                    control.eof.store(false, Ordering::Release);
                    eof_seen = false;
                    info!("seek landed at {:?}", actual);
                }
                Err(e) => warn!("seek failed: {}", e),
            }
            continue;
        }

        // Read-EOF was hit on a previous iteration: wait for every active
        // decoder to actually drain its frame queue before looping or
        // stopping, rather than truncating whatever is still in flight.
        if eof_seen {
            if !all_decoders_drained(&drain, &queues) {
                thread::sleep(Duration::from_millis(10));
                continue;
            }
            match loops_remaining {
                None => {
                    if source.seek(start_position).is_ok() {
                        flush_all(&queues);
                        control.eof.store(false, Ordering::Release);
                        eof_seen = false;
                    } else {
                        thread::sleep(Duration::from_millis(10));
                    }
                }
                Some(n) if n > 1 => {
                    loops_remaining = Some(n - 1);
                    if source.seek(start_position).is_ok() {
                        flush_all(&queues);
                        control.eof.store(false, Ordering::Release);
                        eof_seen = false;
                    } else {
                        mark_all_eof(&queues);
                        return Ok(());
                    }
                }
                _ => {
                    debug!("demuxer reached end of stream, not looping");
                    return Ok(());
                }
            }
            continue;
        }

        if !options.infinite_buffer && all_streams_full(&queues, &options) {
            thread::sleep(Duration::from_millis(10));
            continue;
        }

        match source.next_packet() {
            Ok(Some(packet)) => {
                if let Some(queue) = queue_for(&queues, packet.stream_type) {
                    queue.put(packet);
                }
            }
            Ok(None) => {
                control.eof.store(true, Ordering::Release);
                mark_all_eof(&queues);
                eof_seen = true;
            }
            Err(e) => {
                warn!("demuxer read error, retrying: {}", e);
                thread::sleep(Duration::from_millis(10));
            }
        }
    }
}
