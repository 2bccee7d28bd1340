//! Presentation scheduling (C7): the video refresh step and the audio pull
//! callback, both driven against the master clock chosen by [`super::sync`].

use std::sync::Arc;

use tracing::trace;

use super::clock::{Clock, ClockKind};
use super::frame::{Frame, SubtitleFrame, VideoFrame};
use super::frame_queue::FrameQueue;
use super::options::{EngineOptions, ShowMode, VideoMasterPreference};
use super::sync::{
    self, AudioDiffAccumulator, MasterSyncType, QueueCounts, StreamAvailability,
};

/// The three clocks an engine instance owns, grouped for convenience.
pub struct ClockSet {
    pub audio: Arc<Clock>,
    pub video: Arc<Clock>,
    pub external: Arc<Clock>,
}

impl ClockSet {
    pub fn get_master_clock_value(&self, master: MasterSyncType) -> f64 {
        match master {
            MasterSyncType::Video => self.video.now(),
            MasterSyncType::Audio => self.audio.now(),
            MasterSyncType::External => self.external.now(),
        }
    }

    pub fn master_type(
        &self,
        preference: VideoMasterPreference,
        availability: &StreamAvailability,
    ) -> MasterSyncType {
        sync::master_sync_type(preference, availability)
    }
}

/// Mutable scheduling state the refresh loop carries across calls; owned by
/// whichever thread drives the presentation step (the UI's frame callback).
pub struct RefreshState {
    pub frame_timer: f64,
    pub max_frame_duration: f64,
    pub last_shown_pts: f64,
    pub last_shown_serial: i64,
    /// Count of frames skipped by the late-drop branch below, for diagnostics
    /// and the `frame_drops_early + frame_drops_late <= N` style properties.
    pub frame_drops_late: u64,
}

impl RefreshState {
    pub fn new(max_frame_duration: f64) -> Self {
        Self {
            frame_timer: 0.0,
            max_frame_duration,
            last_shown_pts: 0.0,
            last_shown_serial: -1,
            frame_drops_late: 0,
        }
    }
}

/// What the caller should do after one [`refresh_video`] step.
pub enum VideoRefreshOutcome {
    /// Nothing to show yet; sleep for this long (seconds) and call again.
    Wait(f64),
    /// Display this frame, then sleep for this long before the next call.
    Show { frame: VideoFrame, next_wait: f64 },
    /// The frame queue is empty and the stream has ended.
    Exhausted,
}

/// One iteration of the video refresh loop: decide whether the next queued
/// frame is due yet, dropping stale/late ones per the frame-drop policy, and
/// hand back either a frame to paint or a wait duration.
pub fn refresh_video(
    state: &mut RefreshState,
    queue: &FrameQueue,
    subtitle_queue: Option<&FrameQueue>,
    clocks: &ClockSet,
    master: MasterSyncType,
    options: &EngineOptions,
    wall_now: f64,
) -> VideoRefreshOutcome {
    if queue.is_empty() {
        return VideoRefreshOutcome::Exhausted;
    }

    let Some(current) = queue.peek() else {
        return VideoRefreshOutcome::Exhausted;
    };
    let Frame::Video(current_vf) = &current else {
        return VideoRefreshOutcome::Wait(0.01);
    };

    // A frame enqueued before the last seek/flush but not yet consumed: drop
    // it and retry against whatever the backing packet queue's serial has
    // moved on to, rather than presenting stale content.
    if current_vf.serial != queue.current_serial() {
        queue.next();
        return refresh_video(state, queue, subtitle_queue, clocks, master, options, wall_now);
    }

    if state.last_shown_serial != current_vf.serial {
        state.frame_timer = wall_now;
        state.last_shown_serial = current_vf.serial;
    }

    let last_duration = sync::vp_duration(
        state.last_shown_pts,
        state.last_shown_serial,
        current_vf.pts,
        current_vf.serial,
        current_vf.duration.max(0.04),
        state.max_frame_duration,
    );

    let master_is_video = master == MasterSyncType::Video;
    let master_now = clocks.get_master_clock_value(master);
    let diff = current_vf.pts - master_now;
    let delay = sync::compute_target_delay(last_duration, master_is_video, diff);

    let due_at = state.frame_timer + delay;
    if wall_now < due_at {
        let wait = (due_at - wall_now).min(delay);
        return VideoRefreshOutcome::Wait(wait.max(0.0));
    }

    state.frame_timer = due_at;
    if delay > 0.0 && wall_now - state.frame_timer > sync::AV_SYNC_THRESHOLD_MAX {
        state.frame_timer = wall_now;
    }

    clocks.video.set(current_vf.pts, current_vf.serial);
    clocks.external.sync_to(&clocks.video);

    // Frame-drop: if we're already behind the *next* frame's own duration and
    // there's a next frame queued, skip straight to it rather than showing a
    // stale one. Compared against `next_duration`, not a fixed threshold, per
    // "wall > frameTimer + nextDuration".
    if options.frame_drop && !master_is_video {
        if let Some(Frame::Video(next_vf)) = queue.peek_next() {
            let next_duration = sync::vp_duration(
                current_vf.pts,
                current_vf.serial,
                next_vf.pts,
                next_vf.serial,
                next_vf.duration.max(0.04),
                state.max_frame_duration,
            );
            let behind = wall_now - due_at;
            if behind > next_duration && next_vf.serial == current_vf.serial {
                trace!("dropping late video frame, behind by {:.3}s", behind);
                state.frame_drops_late += 1;
                queue.next();
                return refresh_video(state, queue, subtitle_queue, clocks, master, options, wall_now);
            }
        }
    }

    if let Some(sub_queue) = subtitle_queue {
        advance_expired_subtitles(sub_queue, clocks.video.now());
    }

    state.last_shown_pts = current_vf.pts;
    let shown = current_vf.clone();
    queue.next();

    let next_wait = if let Some(Frame::Video(next_vf)) = queue.peek() {
        let next_duration = sync::vp_duration(
            shown.pts,
            shown.serial,
            next_vf.pts,
            next_vf.serial,
            next_vf.duration.max(0.04),
            state.max_frame_duration,
        );
        sync::compute_target_delay(next_duration, master_is_video, next_vf.pts - master_now)
    } else {
        0.01
    };

    VideoRefreshOutcome::Show { frame: shown, next_wait }
}

/// Drop subtitle frames from `queue` whose display window has already
/// elapsed against the video clock, per §4.7's "advance subtitle queue past
/// expired subtitles" step.
pub fn advance_expired_subtitles(queue: &FrameQueue, video_clock_now: f64) {
    while let Some(Frame::Subtitle(sub)) = queue.peek() {
        if sub.serial != queue.current_serial() || sub.is_expired(video_clock_now) {
            queue.next();
        } else {
            break;
        }
    }
}

/// The subtitle, if any, that should currently be composited alongside the
/// last-shown video frame.
pub fn active_subtitle(queue: &FrameQueue, video_clock_now: f64) -> Option<SubtitleFrame> {
    match queue.peek() {
        Some(Frame::Subtitle(sub)) if sub.is_active(video_clock_now) => Some(sub),
        _ => None,
    }
}

/// What show mode to fall back to when there's no video to display.
pub fn effective_show_mode(has_video: bool, requested: ShowMode) -> ShowMode {
    if has_video {
        ShowMode::Video
    } else {
        requested
    }
}

/// Per-sink resampling/stretch state carried across audio callback invocations.
pub struct AudioPullState {
    pub diff_acc: AudioDiffAccumulator,
    pub audio_clock_kind: ClockKind,
}

impl AudioPullState {
    pub fn new() -> Self {
        Self {
            diff_acc: AudioDiffAccumulator::default(),
            audio_clock_kind: ClockKind::Audio,
        }
    }
}

/// Pull the next audio frame due for output and compute how many samples the
/// sink should actually consume this callback (the resample-stretch
/// correction from [`sync::synchronize_audio`], applied by the caller via
/// [`stretch_samples`]); the audio clock itself is written downstream, once
/// samples actually drain out of the ring buffer.
pub fn pull_audio_frame(
    state: &mut AudioPullState,
    queue: &FrameQueue,
    clocks: &ClockSet,
    master: MasterSyncType,
    hw_buf_bytes: f64,
    bytes_per_sec: f64,
) -> Option<(Frame, u32)> {
    if !queue.peek_readable() {
        return None;
    }
    let frame = queue.peek()?;

    // Skip samples left over from before a seek/flush: their serial has
    // fallen behind the backing packet queue's current one.
    if frame.serial() != queue.current_serial() {
        queue.next();
        return pull_audio_frame(state, queue, clocks, master, hw_buf_bytes, bytes_per_sec);
    }

    let Frame::Audio(af) = &frame else {
        queue.next();
        return Some((frame, 0));
    };

    let master_is_audio = master == MasterSyncType::Audio;
    let nb_samples = af.samples.len() as u32 / af.channels.max(1) as u32;
    let wanted = sync::synchronize_audio(
        nb_samples,
        af.pts,
        clocks.get_master_clock_value(master),
        af.sample_rate as f64,
        hw_buf_bytes,
        bytes_per_sec,
        master_is_audio,
        &mut state.diff_acc,
    );

    // The audio clock itself is corrected for ring-buffer latency by
    // `AudioStreamConsumer::update_audio_clock`, the actual "audio callback"
    // writer per §5's single-writer-per-clock rule — this feed loop only
    // computes the resample-stretch request; [`stretch_samples`] is what
    // actually applies it before the samples reach the ring buffer.
    queue.next();
    Some((frame, wanted))
}

/// Resample a frame's samples to `wanted_frames` per channel via a simple
/// nearest-neighbor mapping — the runtime effect of `sync::synchronize_audio`'s
/// resync request (§4.5 "audio resample stretch", §4.7 "set resampler
/// compensation"). The Media Library's `AudioTransform` exposes no swr-style
/// compensation hook the way the original wires into its resampler context,
/// so this stands in for it directly on the already-resampled samples.
pub fn stretch_samples(samples: &[f32], channels: u16, wanted_frames: u32) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    let nb_frames = samples.len() / channels;
    let wanted_frames = wanted_frames as usize;
    if nb_frames == 0 || wanted_frames == 0 || wanted_frames == nb_frames {
        return samples.to_vec();
    }

    let mut out = Vec::with_capacity(wanted_frames * channels);
    for i in 0..wanted_frames {
        let src_frame = (i * nb_frames / wanted_frames).min(nb_frames - 1);
        let start = src_frame * channels;
        out.extend_from_slice(&samples[start..start + channels]);
    }
    out
}

/// Compute the external-clock speed correction for one tick of the
/// rubber-banding step (§4.5), based on current queue occupancy.
pub fn tick_external_clock(clocks: &ClockSet, counts: QueueCounts) {
    let new_speed = sync::check_external_clock_speed(clocks.external.speed(), &counts);
    if (new_speed - clocks.external.speed()).abs() > f64::EPSILON {
        clocks.external.set_speed(new_speed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::packet_queue::PacketQueue;
    use ffmpeg_types::Rational;

    fn clocks() -> ClockSet {
        let view = crate::engine::clock::SerialView::standalone();
        ClockSet {
            audio: Arc::new(Clock::new(ClockKind::Audio, view.clone())),
            video: Arc::new(Clock::new(ClockKind::Video, view.clone())),
            external: Arc::new(Clock::new(ClockKind::External, view)),
        }
    }

    #[test]
    fn refresh_reports_exhausted_on_empty_queue() {
        let pq = Arc::new(PacketQueue::new(Rational::new(1, 1), false));
        pq.start();
        let fq = FrameQueue::new(pq, 3, true);
        let mut state = RefreshState::new(10.0);
        let c = clocks();
        let outcome = refresh_video(
            &mut state,
            &fq,
            None,
            &c,
            MasterSyncType::Audio,
            &EngineOptions::default(),
            0.0,
        );
        assert!(matches!(outcome, VideoRefreshOutcome::Exhausted));
    }

    #[test]
    fn expired_subtitles_are_dropped_but_active_ones_kept() {
        use crate::engine::frame::SubtitleFrame;

        let pq = Arc::new(PacketQueue::new(Rational::new(1, 1), false));
        pq.start();
        let fq = FrameQueue::new(pq, 4, false);

        let idx = fq.peek_writable().unwrap();
        fq.push(
            idx,
            Frame::Subtitle(SubtitleFrame {
                regions: vec![],
                pts: 1.0,
                start_display_time: 0.0,
                end_display_time: 0.5,
                serial: 1,
            }),
        );

        assert!(active_subtitle(&fq, 1.2).is_some());
        assert!(active_subtitle(&fq, 2.0).is_none());

        advance_expired_subtitles(&fq, 2.0);
        assert!(fq.is_empty());
    }

    #[test]
    fn effective_show_mode_falls_back_without_video() {
        assert_eq!(effective_show_mode(true, ShowMode::WaveAudio), ShowMode::Video);
        assert_eq!(effective_show_mode(false, ShowMode::WaveAudio), ShowMode::WaveAudio);
    }
}
