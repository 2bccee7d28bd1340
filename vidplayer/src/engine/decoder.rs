//! Per-stream decode loops (C4): pull packets from a [`PacketQueue`], push
//! frames into a [`FrameQueue`], honoring the flush/serial discontinuity
//! protocol and end-of-stream bookkeeping.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use bytemuck::cast_slice;
use ffmpeg_decode::{AudioDecoder, VideoDecoder};
use ffmpeg_types::{AudioFrame as RawAudioFrame, VideoFrame as RawVideoFrame};
use ffmpeg_transform::{AudioTransform, VideoTransform};
use tracing::{debug, trace};

use super::frame::{AudioFrame, Frame, VideoFrame};
use super::frame_queue::FrameQueue;
use super::packet_queue::{GetOutcome, PacketQueue};
use super::queue_entry::QueueEntry;

/// Shared "has this decoder drained its current serial" flag, read by the
/// demuxer's auto-loop/autoexit check (§4.6 step 6).
#[derive(Default)]
pub struct FinishedMark(AtomicI64);

impl FinishedMark {
    pub fn new() -> Self {
        Self(AtomicI64::new(-1))
    }

    pub fn mark_finished(&self, serial: i64) {
        self.0.store(serial, Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(-1, Ordering::Release);
    }

    pub fn finished_serial(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn is_finished_for(&self, serial: i64) -> bool {
        self.finished_serial() == serial
    }
}

/// Outcome of pulling the next same-serial packet off a queue, after
/// transparently dropping entries left over from a previous discontinuity.
enum NextPacket {
    Flush,
    Data(ffmpeg_types::Packet),
    Eof,
    Aborted,
}

fn next_same_serial_packet(queue: &PacketQueue, pkt_serial: &mut i64) -> NextPacket {
    loop {
        match queue.get() {
            GetOutcome::Aborted => return NextPacket::Aborted,
            GetOutcome::Entry(entry, serial) => {
                if serial != *pkt_serial && !matches!(entry, QueueEntry::Flush) {
                    // Stale packet from before the last flush; drop and retry.
                    continue;
                }
                match entry {
                    QueueEntry::Flush => {
                        *pkt_serial = serial;
                        return NextPacket::Flush;
                    }
                    QueueEntry::Null(_) => return NextPacket::Eof,
                    QueueEntry::Data(packet) => return NextPacket::Data(packet),
                }
            }
        }
    }
}

/// The video decode loop. Runs until the packet queue aborts; the control-flow
/// bug in the original's equivalent function (a `goto` escaping mis-nested
/// braces) is resolved here as the plainly-intended behavior: loop forever,
/// decoding and pushing frames, until told to stop.
pub fn run_video_decoder(
    packet_queue: Arc<PacketQueue>,
    frame_queue: Arc<FrameQueue>,
    mut decoder: VideoDecoder,
    mut transform: VideoTransform,
    finished: Arc<FinishedMark>,
) {
    let mut pkt_serial = 0i64;

    'outer: loop {
        match next_same_serial_packet(&packet_queue, &mut pkt_serial) {
            NextPacket::Aborted => break,
            NextPacket::Flush => {
                decoder.reset();
                finished.clear();
                continue 'outer;
            }
            NextPacket::Eof => {
                finished.mark_finished(pkt_serial);
                match decoder.flush() {
                    Ok(frames) => push_video_frames(&frame_queue, &mut transform, frames, pkt_serial),
                    Err(e) => debug!("video decoder flush error: {}", e),
                }
                continue 'outer;
            }
            NextPacket::Data(packet) => match decoder.decode(&packet) {
                Ok(frames) => {
                    if !push_video_frames(&frame_queue, &mut transform, frames, pkt_serial) {
                        break 'outer;
                    }
                }
                Err(e) => trace!("video decode error (transient): {}", e),
            },
        }
    }
}

fn push_video_frames(
    frame_queue: &FrameQueue,
    transform: &mut VideoTransform,
    frames: Vec<RawVideoFrame>,
    serial: i64,
) -> bool {
    for raw in frames {
        let scaled = match transform.transform(&raw) {
            Ok(scaled) => scaled,
            Err(e) => {
                debug!("video scale error, dropping frame: {}", e);
                continue;
            }
        };
        let pts = scaled.presentation_time().unwrap_or_default().as_secs_f64();
        let Some(index) = frame_queue.peek_writable() else {
            return false;
        };
        frame_queue.push(
            index,
            Frame::Video(VideoFrame {
                data: scaled.data,
                width: scaled.width,
                height: scaled.height,
                sample_aspect_ratio: 1.0,
                pts,
                duration: 0.0,
                pos: 0,
                serial,
            }),
        );
    }
    true
}

/// The subtitle decode loop.
///
/// No subtitle codec crate is available in the Media Library dependency
/// stack this engine draws from (only `VideoDecoder`/`AudioDecoder` exist),
/// so this loop keeps the pipeline's shape — it drains the subtitle packet
/// queue, honors flush/eof bookkeeping, and keeps the subtitle frame queue's
/// backing serial current — without ever producing a subtitle [`Frame`].
/// Wiring in a real subtitle decoder means giving this function a decode
/// call the same shape as the video/audio ones and filling in frame
/// construction the same way `push_video_frames` does.
pub fn run_subtitle_decoder(packet_queue: Arc<PacketQueue>, finished: Arc<FinishedMark>) {
    let mut pkt_serial = 0i64;
    loop {
        match next_same_serial_packet(&packet_queue, &mut pkt_serial) {
            NextPacket::Aborted => break,
            NextPacket::Flush => finished.clear(),
            NextPacket::Eof => finished.mark_finished(pkt_serial),
            NextPacket::Data(_packet) => {
                trace!("subtitle packet dropped: no subtitle decoder available");
            }
        }
    }
}

/// The audio decode loop, mirroring the video loop's structure. Decoded
/// frames pass through `transform` (resample + channel/format conversion to
/// the sink's playback format) before being handed to the frame queue, the
/// same two-stage shape as the video loop's codec-then-scale pipeline.
pub fn run_audio_decoder(
    packet_queue: Arc<PacketQueue>,
    frame_queue: Arc<FrameQueue>,
    mut decoder: AudioDecoder,
    mut transform: AudioTransform,
    finished: Arc<FinishedMark>,
) {
    let mut pkt_serial = 0i64;

    loop {
        match next_same_serial_packet(&packet_queue, &mut pkt_serial) {
            NextPacket::Aborted => break,
            NextPacket::Flush => {
                decoder.reset();
                finished.clear();
            }
            NextPacket::Eof => {
                finished.mark_finished(pkt_serial);
                match decoder.flush() {
                    Ok(frames) => {
                        if !push_audio_frames(&frame_queue, &mut transform, frames, pkt_serial) {
                            break;
                        }
                    }
                    Err(e) => debug!("audio decoder flush error: {}", e),
                }
            }
            NextPacket::Data(packet) => match decoder.decode(&packet) {
                Ok(frames) => {
                    if !push_audio_frames(&frame_queue, &mut transform, frames, pkt_serial) {
                        break;
                    }
                }
                Err(e) => trace!("audio decode error (transient): {}", e),
            },
        }
    }
}

fn push_audio_frames(
    frame_queue: &FrameQueue,
    transform: &mut AudioTransform,
    frames: Vec<RawAudioFrame>,
    serial: i64,
) -> bool {
    for raw in frames {
        let pts = raw.presentation_time().unwrap_or_default().as_secs_f64();
        let resampled = match transform.transform(&raw) {
            Ok(resampled) => resampled,
            Err(e) => {
                debug!("audio resample error, dropping frame: {}", e);
                continue;
            }
        };
        let channels = resampled.channels.channels();
        let samples: Vec<f32> = cast_slice(&resampled.data).to_vec();
        let duration = samples.len() as f64 / channels.max(1) as f64 / resampled.sample_rate.max(1) as f64;
        let Some(index) = frame_queue.peek_writable() else {
            return false;
        };
        frame_queue.push(
            index,
            Frame::Audio(AudioFrame {
                samples,
                sample_rate: resampled.sample_rate,
                channels,
                pts,
                duration,
                serial,
            }),
        );
    }
    true
}
