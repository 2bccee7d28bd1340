//! The playback engine (C8): owns the demuxer, decoder, and presentation
//! threads for one open source and exposes the surface the UI layer drives
//! (play/pause, seek, volume, stream cycling) without knowing any of that
//! plumbing exists.

pub mod clock;
pub mod decoder;
pub mod demux;
pub mod error;
pub mod frame;
pub mod frame_queue;
pub mod options;
pub mod packet_queue;
pub mod presentation;
pub mod queue_entry;
#[cfg(test)]
mod scenario_tests;
pub mod sync;

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ffmpeg_decode::{AudioDecoder, AudioDecoderConfig, VideoDecoder, VideoDecoderConfig};
use ffmpeg_source::{Source, SourceConfig, StreamFilter};
use ffmpeg_transform::{AudioTransform, AudioTransformConfig, VideoTransform, VideoTransformConfig};
use ffmpeg_types::{MediaInfo, Rational};
use tracing::{info, warn};

use crate::audio::{AudioStream, AudioStreamConsumer, AudioStreamProducer};

use self::clock::{Clock, ClockKind, SerialView};
use self::decoder::FinishedMark;
use self::demux::{DemuxControl, DemuxQueues, DrainWatch};
use self::error::{EngineError, Result};
use self::frame::Frame;
use self::frame_queue::{FrameQueue, SAMPLE_QUEUE_SIZE, SUBPICTURE_QUEUE_SIZE, VIDEO_PICTURE_QUEUE_SIZE};
use self::options::{EngineOptions, ShowMode};
use self::packet_queue::PacketQueue;
use self::presentation::{AudioPullState, ClockSet, RefreshState, VideoRefreshOutcome};
use self::sync::{MasterSyncType, QueueCounts, StreamAvailability};

/// Gross playback state, mirrored from the host-facing façade the UI already
/// calls (`playback::player::VideoPlayer`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Ended,
    Error,
}

/// Which stream kind a host-facing "cycle" request targets. Stream selection
/// beyond "best video/audio track" isn't something the Media Library exposes
/// (`StreamFilter` only distinguishes video/audio/both, not individual track
/// indices), so [`Engine::cycle_stream`] is a documented no-op for now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
}

struct Threads {
    demux: Option<JoinHandle<()>>,
    video_decode: Option<JoinHandle<()>>,
    audio_decode: Option<JoinHandle<()>>,
    subtitle_decode: Option<JoinHandle<()>>,
    audio_feed: Option<JoinHandle<()>>,
}

/// The playback engine: one open source, its three packet queues, three
/// frame queues, three clocks, and the threads feeding them.
pub struct Engine {
    path: PathBuf,
    media_info: MediaInfo,
    options: EngineOptions,
    availability: StreamAvailability,
    master: MasterSyncType,

    video_packet_queue: Option<Arc<PacketQueue>>,
    audio_packet_queue: Option<Arc<PacketQueue>>,
    subtitle_packet_queue: Arc<PacketQueue>,

    video_frame_queue: Option<Arc<FrameQueue>>,
    audio_frame_queue: Option<Arc<FrameQueue>>,
    subtitle_frame_queue: Arc<FrameQueue>,

    clocks: ClockSet,
    demux_control: Arc<DemuxControl>,

    audio_consumer: Arc<AudioStreamConsumer>,

    state: Mutex<PlaybackState>,
    show_mode: Mutex<ShowMode>,
    refresh_state: Mutex<RefreshState>,
    audio_pull_state: Mutex<AudioPullState>,
    threads: Mutex<Threads>,

    epoch: Instant,
}

impl Engine {
    /// Open `path`, spin up the demuxer/decoder/audio-feed threads, and
    /// return a ready-to-drive engine. Playback starts unpaused.
    pub fn open_source<P: AsRef<Path>>(path: P, options: EngineOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let path_str = path
            .to_str()
            .ok_or_else(|| EngineError::fatal("path is not valid UTF-8"))?;

        let mut source = Source::open(
            path_str,
            SourceConfig {
                stream_filter: Some(StreamFilter::Both),
                ..Default::default()
            },
        )?;

        let media_info = source.media_info().clone();
        let availability = StreamAvailability {
            has_audio: source.has_audio(),
            has_video: source.has_video(),
        };
        if !availability.has_audio && !availability.has_video {
            return Err(EngineError::fatal("source has neither audio nor video"));
        }
        let master = sync::master_sync_type(options.video_master, &availability);

        let video_codec_config = source.take_video_codec_config();
        let video_time_base = source.video_time_base();
        let audio_codec_config = source.take_audio_codec_config();
        let audio_time_base = source.audio_time_base();

        let video_packet_queue = video_time_base.map(|tb| Arc::new(PacketQueue::new(tb, false)));
        let audio_packet_queue = audio_time_base.map(|tb| Arc::new(PacketQueue::new(tb, false)));
        let subtitle_packet_queue = Arc::new(PacketQueue::new(Rational::new(1, 1), false));

        let video_frame_queue = video_packet_queue
            .clone()
            .map(|pq| Arc::new(FrameQueue::new(pq, VIDEO_PICTURE_QUEUE_SIZE, true)));
        let audio_frame_queue = audio_packet_queue
            .clone()
            .map(|pq| Arc::new(FrameQueue::new(pq, SAMPLE_QUEUE_SIZE, false)));
        let subtitle_frame_queue = Arc::new(FrameQueue::new(
            subtitle_packet_queue.clone(),
            SUBPICTURE_QUEUE_SIZE,
            false,
        ));

        for pq in [&video_packet_queue, &audio_packet_queue] {
            if let Some(pq) = pq {
                pq.start();
            }
        }
        subtitle_packet_queue.start();

        let audio_serial_view = audio_packet_queue
            .as_ref()
            .map(|q| q.serial_view())
            .unwrap_or_else(SerialView::standalone);
        let video_serial_view = video_packet_queue
            .as_ref()
            .map(|q| q.serial_view())
            .unwrap_or_else(SerialView::standalone);
        let clocks = ClockSet {
            audio: Arc::new(Clock::new(ClockKind::Audio, audio_serial_view)),
            video: Arc::new(Clock::new(ClockKind::Video, video_serial_view)),
            external: Arc::new(Clock::new(ClockKind::External, SerialView::standalone())),
        };
        clocks.external.set_speed(1.0);

        let demux_control = Arc::new(DemuxControl::new());
        let audio_stream = AudioStream::new(clocks.audio.clone());
        let audio_producer = Arc::new(audio_stream.producer);
        let audio_consumer = audio_stream.consumer;
        audio_consumer.set_volume(options.start_volume);

        let mut threads = Threads {
            demux: None,
            video_decode: None,
            audio_decode: None,
            subtitle_decode: None,
            audio_feed: None,
        };

        let mut drain = DrainWatch::default();

        if let (Some(pq), Some(fq), Some(codec_config), Some(time_base)) = (
            video_packet_queue.clone(),
            video_frame_queue.clone(),
            video_codec_config,
            video_time_base,
        ) {
            let width = media_info.video.as_ref().map(|v| v.width).unwrap_or(0);
            let height = media_info.video.as_ref().map(|v| v.height).unwrap_or(0);
            let decoder = VideoDecoder::new(codec_config, time_base, VideoDecoderConfig::with_hw_accel())?;
            let transform = VideoTransform::new(VideoTransformConfig::to_bgra(width, height));
            let finished = Arc::new(FinishedMark::new());
            drain.video = Some((finished.clone(), fq.clone()));
            threads.video_decode = Some(thread::spawn(move || {
                decoder::run_video_decoder(pq, fq, decoder, transform, finished);
            }));
        }

        if let (Some(pq), Some(fq), Some(codec_config), Some(time_base)) = (
            audio_packet_queue.clone(),
            audio_frame_queue.clone(),
            audio_codec_config,
            audio_time_base,
        ) {
            let decoder = AudioDecoder::new(codec_config, time_base, AudioDecoderConfig::new())?;
            let transform = AudioTransform::new(AudioTransformConfig::playback());
            let finished = Arc::new(FinishedMark::new());
            drain.audio = Some((finished.clone(), fq.clone()));
            threads.audio_decode = Some(thread::spawn(move || {
                decoder::run_audio_decoder(pq, fq, decoder, transform, finished);
            }));
        }

        {
            let pq = subtitle_packet_queue.clone();
            let finished = Arc::new(FinishedMark::new());
            threads.subtitle_decode = Some(thread::spawn(move || {
                decoder::run_subtitle_decoder(pq, finished);
            }));
        }

        {
            let queues = DemuxQueues {
                video: video_packet_queue.clone(),
                audio: audio_packet_queue.clone(),
                subtitle: Some(subtitle_packet_queue.clone()),
            };
            let control = demux_control.clone();
            let ext_clock = clocks.external.clone();
            let demux_options = options.clone();
            threads.demux = Some(thread::spawn(move || {
                if let Err(e) = demux::run_demuxer(source, queues, drain, demux_options, control, ext_clock) {
                    if !e.is_aborted() {
                        warn!("demuxer exited: {}", e);
                    }
                }
            }));
        }

        if let Some(audio_fq) = audio_frame_queue.clone() {
            let clocks_for_feed = ClockSet {
                audio: clocks.audio.clone(),
                video: clocks.video.clone(),
                external: clocks.external.clone(),
            };
            let producer = audio_producer.clone();
            threads.audio_feed = Some(thread::spawn(move || {
                audio_feed_loop(audio_fq, clocks_for_feed, master, producer);
            }));
        } else {
            audio_consumer.mark_closed();
        }

        let max_frame_duration = if media_info.video.is_some() { 10.0 } else { 1.0 };

        Ok(Self {
            path,
            media_info,
            options,
            availability,
            master,
            video_packet_queue,
            audio_packet_queue,
            subtitle_packet_queue,
            video_frame_queue,
            audio_frame_queue,
            subtitle_frame_queue,
            clocks,
            demux_control,
            audio_consumer,
            state: Mutex::new(PlaybackState::Playing),
            show_mode: Mutex::new(options.show_mode),
            refresh_state: Mutex::new(RefreshState::new(max_frame_duration)),
            audio_pull_state: Mutex::new(AudioPullState::new()),
            threads: Mutex::new(threads),
            epoch: Instant::now(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn media_info(&self) -> &MediaInfo {
        &self.media_info
    }

    pub fn duration(&self) -> Duration {
        self.media_info.duration.unwrap_or(Duration::ZERO)
    }

    pub fn width(&self) -> u32 {
        self.media_info.video.as_ref().map(|v| v.width).unwrap_or(0)
    }

    pub fn height(&self) -> u32 {
        self.media_info.video.as_ref().map(|v| v.height).unwrap_or(0)
    }

    pub fn aspect_ratio(&self) -> f32 {
        let (w, h) = (self.width(), self.height());
        if h == 0 { 1.0 } else { w as f32 / h as f32 }
    }

    pub fn has_video(&self) -> bool {
        self.availability.has_video
    }

    pub fn has_audio(&self) -> bool {
        self.availability.has_audio
    }

    pub fn position(&self) -> Duration {
        let secs = self.clocks.get_master_clock_value(self.master);
        if secs.is_nan() || secs < 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.lock().unwrap()
    }

    pub fn is_paused(&self) -> bool {
        self.state() == PlaybackState::Paused
    }

    /// True once the demuxer has hit end-of-stream (and isn't looping) and
    /// both frame queues it feeds have drained.
    pub fn is_ended(&self) -> bool {
        if !self.demux_control.is_eof() {
            return false;
        }
        let video_drained = self.video_frame_queue.as_ref().is_none_or(|q| q.is_empty());
        let audio_drained = self.audio_frame_queue.as_ref().is_none_or(|q| q.is_empty());
        video_drained && audio_drained
    }

    pub fn pause(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == PlaybackState::Playing {
            *state = PlaybackState::Paused;
            self.clocks.audio.set_paused(true);
            self.clocks.video.set_paused(true);
            self.clocks.external.set_paused(true);
            self.audio_consumer.pause();
        }
    }

    pub fn resume(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == PlaybackState::Paused {
            *state = PlaybackState::Playing;
            self.clocks.audio.set_paused(false);
            self.clocks.video.set_paused(false);
            self.clocks.external.set_paused(false);
            self.audio_consumer.resume();
        }
    }

    pub fn toggle_pause(&self) {
        if self.is_paused() {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// Advance one frame while paused: force a refresh step even though the
    /// wall clock hasn't actually moved.
    pub fn step_frame(&self) {
        let was_paused = self.is_paused();
        if !was_paused {
            self.pause();
        }
        self.poll_video_frame();
        if !was_paused {
            self.resume();
        }
    }

    pub fn seek(&self, position: Duration) {
        let target = position.min(self.duration());
        self.demux_control.request_seek(target, self.options.seek_by_bytes);
        let mut state = self.state.lock().unwrap();
        if *state == PlaybackState::Ended || *state == PlaybackState::Error {
            *state = PlaybackState::Playing;
        }
        drop(state);
        self.audio_consumer.clear();
        *self.refresh_state.lock().unwrap() = RefreshState::new(if self.has_video() { 10.0 } else { 1.0 });
        *self.audio_pull_state.lock().unwrap() = AudioPullState::new();
    }

    pub fn seek_forward(&self, amount: Duration) {
        self.seek(self.position().saturating_add(amount));
    }

    pub fn seek_backward(&self, amount: Duration) {
        self.seek(self.position().saturating_sub(amount));
    }

    /// Set the free-running external clock's speed. Audio/video decode rate
    /// itself isn't adjustable through the Media Library's decoder surface,
    /// so this only takes effect when neither stream is the sync master.
    pub fn set_speed(&self, speed: f64) {
        self.clocks.external.set_speed(speed.max(0.0));
    }

    pub fn set_volume(&self, volume: f32) {
        self.audio_consumer.set_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.audio_consumer.volume()
    }

    pub fn set_mute(&self, muted: bool) {
        if muted {
            self.audio_consumer.mute();
        } else {
            self.audio_consumer.unmute();
        }
    }

    pub fn toggle_mute(&self) -> bool {
        self.audio_consumer.toggle_mute()
    }

    pub fn is_muted(&self) -> bool {
        self.audio_consumer.is_muted()
    }

    pub fn audio_consumer(&self) -> Arc<AudioStreamConsumer> {
        self.audio_consumer.clone()
    }

    pub fn set_show_mode(&self, mode: ShowMode) {
        *self.show_mode.lock().unwrap() = mode;
    }

    pub fn show_mode(&self) -> ShowMode {
        presentation::effective_show_mode(self.has_video(), *self.show_mode.lock().unwrap())
    }

    /// Count of video frames skipped by the presentation layer's late-drop
    /// policy so far (§4.5 frame-drop, `frame_drops_late`).
    pub fn frame_drops_late(&self) -> u64 {
        self.refresh_state.lock().unwrap().frame_drops_late
    }

    /// The subtitle, if any, due to be composited alongside the current
    /// video frame right now.
    pub fn current_subtitle(&self) -> Option<frame::SubtitleFrame> {
        presentation::active_subtitle(&self.subtitle_frame_queue, self.clocks.video.now())
    }

    /// Stream selection beyond "best track per kind" isn't exposed by the
    /// Media Library (`StreamFilter` picks video/audio/both at open time, not
    /// individual track indices), so there is nothing to cycle to yet.
    pub fn cycle_stream(&self, _kind: StreamKind) {}

    /// One refresh-loop step: returns the frame to paint, if one is due, and
    /// advances the external-clock rubber-banding step alongside it.
    pub fn poll_video_frame(&self) -> Option<frame::VideoFrame> {
        let Some(video_fq) = &self.video_frame_queue else {
            return None;
        };
        let wall_now = self.epoch.elapsed().as_secs_f64();
        let counts = QueueCounts {
            audio: self.audio_frame_queue.as_ref().map(|q| q.size()).unwrap_or(0),
            video: video_fq.size(),
        };
        presentation::tick_external_clock(&self.clocks, counts);

        let mut refresh_state = self.refresh_state.lock().unwrap();
        let outcome = presentation::refresh_video(
            &mut refresh_state,
            video_fq,
            Some(&self.subtitle_frame_queue),
            &self.clocks,
            self.master,
            &self.options,
            wall_now,
        );
        match outcome {
            VideoRefreshOutcome::Show { frame, .. } => Some(frame),
            VideoRefreshOutcome::Wait(_) | VideoRefreshOutcome::Exhausted => None,
        }
    }

    pub fn close(&self) {
        self.demux_control.abort.store(true, Ordering::Release);
        for pq in [
            self.video_packet_queue.as_ref(),
            self.audio_packet_queue.as_ref(),
            Some(&self.subtitle_packet_queue),
        ]
        .into_iter()
        .flatten()
        {
            pq.abort();
        }
        for fq in [
            self.video_frame_queue.as_ref(),
            self.audio_frame_queue.as_ref(),
            Some(&self.subtitle_frame_queue),
        ]
        .into_iter()
        .flatten()
        {
            fq.signal();
        }
        self.audio_consumer.mark_closed();

        let mut threads = self.threads.lock().unwrap();
        for handle in [
            threads.demux.take(),
            threads.video_decode.take(),
            threads.audio_decode.take(),
            threads.subtitle_decode.take(),
            threads.audio_feed.take(),
        ]
        .into_iter()
        .flatten()
        {
            let _ = handle.join();
        }
        info!("engine closed for {:?}", self.path);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pulls decoded audio frames off the audio frame queue and pushes their
/// samples into the sink's ring buffer, blocking naturally on
/// [`FrameQueue::peek_readable`] rather than busy-polling.
fn audio_feed_loop(
    queue: Arc<FrameQueue>,
    clocks: ClockSet,
    master: MasterSyncType,
    producer: Arc<AudioStreamProducer>,
) {
    const RING_BUFFER_BYTES: f64 = (48000 * 2 * 2 * 4) as f64;
    const BYTES_PER_SEC: f64 = (48000 * 2 * 4) as f64;

    let mut state = AudioPullState::new();
    loop {
        match presentation::pull_audio_frame(
            &mut state,
            &queue,
            &clocks,
            master,
            RING_BUFFER_BYTES,
            BYTES_PER_SEC,
        ) {
            Some((Frame::Audio(af), wanted)) => {
                let samples = if wanted == 0 {
                    af.samples.clone()
                } else {
                    presentation::stretch_samples(&af.samples, af.channels, wanted)
                };
                if !producer.push(&samples, af.pts + af.duration, af.serial) {
                    break;
                }
            }
            Some(_) => continue,
            None => break,
        }
    }
    producer.close();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_clocks() -> ClockSet {
        let view = SerialView::standalone();
        ClockSet {
            audio: Arc::new(Clock::new(ClockKind::Audio, view.clone())),
            video: Arc::new(Clock::new(ClockKind::Video, view.clone())),
            external: Arc::new(Clock::new(ClockKind::External, view)),
        }
    }

    fn bare_engine() -> Engine {
        let subtitle_packet_queue = Arc::new(PacketQueue::new(Rational::new(1, 1), false));
        subtitle_packet_queue.start();
        let subtitle_frame_queue = Arc::new(FrameQueue::new(subtitle_packet_queue.clone(), 4, false));
        let audio_stream = AudioStream::default();
        Engine {
            path: PathBuf::new(),
            media_info: MediaInfo::default(),
            options: EngineOptions::default(),
            availability: StreamAvailability { has_audio: false, has_video: false },
            master: MasterSyncType::External,
            video_packet_queue: None,
            audio_packet_queue: None,
            subtitle_packet_queue,
            video_frame_queue: None,
            audio_frame_queue: None,
            subtitle_frame_queue,
            clocks: bare_clocks(),
            demux_control: Arc::new(DemuxControl::new()),
            audio_consumer: audio_stream.consumer,
            state: Mutex::new(PlaybackState::Playing),
            show_mode: Mutex::new(ShowMode::Video),
            refresh_state: Mutex::new(RefreshState::new(1.0)),
            audio_pull_state: Mutex::new(AudioPullState::new()),
            threads: Mutex::new(Threads {
                demux: None,
                video_decode: None,
                audio_decode: None,
                subtitle_decode: None,
                audio_feed: None,
            }),
            epoch: Instant::now(),
        }
    }

    #[test]
    fn toggle_pause_flips_state_and_clocks() {
        let engine = bare_engine();
        assert!(!engine.is_paused());
        engine.toggle_pause();
        assert!(engine.is_paused());
        assert!(engine.clocks.external.is_paused());
        engine.toggle_pause();
        assert!(!engine.is_paused());
        assert!(!engine.clocks.external.is_paused());
    }

    #[test]
    fn is_ended_requires_eof_and_drained_queues() {
        let engine = bare_engine();
        assert!(!engine.is_ended());
        engine.demux_control.eof.store(true, Ordering::Release);
        // No video/audio frame queues on this bare engine, so both sides
        // count as already drained once eof is set.
        assert!(engine.is_ended());
    }

    #[test]
    fn set_volume_reaches_audio_consumer() {
        let engine = bare_engine();
        engine.set_volume(0.5);
        assert_eq!(engine.volume(), 0.5);
    }
}
