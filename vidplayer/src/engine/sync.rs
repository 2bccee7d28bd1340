//! Master-clock selection, frame scheduling, and audio/external-clock resync
//! math (C5). Every formula here is the direct Rust transliteration of the
//! corresponding function in the original C++ reference player.

use super::clock::NOSYNC_THRESHOLD;
use super::options::VideoMasterPreference;

pub const AV_SYNC_THRESHOLD_MIN: f64 = 0.04;
pub const AV_SYNC_THRESHOLD_MAX: f64 = 0.10;
pub const AV_SYNC_FRAMEDUP_THRESHOLD: f64 = 0.10;
pub const AUDIO_DIFF_AVG_NB: u32 = 20;
pub const SAMPLE_CORRECTION_PERCENT_MAX: f64 = 10.0;

/// Which clock the presentation layer treats as authoritative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MasterSyncType {
    Audio,
    Video,
    External,
}

/// Availability of the audio/video streams, used to decide the master clock.
pub struct StreamAvailability {
    pub has_audio: bool,
    pub has_video: bool,
}

/// `masterSyncType` — prefer audio; fall back to video if no audio stream;
/// otherwise external. A configured video-master preference uses video if
/// available, else audio.
pub fn master_sync_type(
    preference: VideoMasterPreference,
    availability: &StreamAvailability,
) -> MasterSyncType {
    match preference {
        VideoMasterPreference::Video => {
            if availability.has_video {
                MasterSyncType::Video
            } else if availability.has_audio {
                MasterSyncType::Audio
            } else {
                MasterSyncType::External
            }
        }
        VideoMasterPreference::Audio => {
            if availability.has_audio {
                MasterSyncType::Audio
            } else if availability.has_video {
                MasterSyncType::Video
            } else {
                MasterSyncType::External
            }
        }
    }
}

/// `computeTargetDelay` — how long to hold the current frame before advancing,
/// adjusted against the master clock's drift.
///
/// Implemented per the spec's stated formula (`diff <= -sync_threshold` for
/// the speed-up branch) rather than the sign-flipped condition found in some
/// literal ports of this function — see DESIGN.md's Decided Open Questions.
pub fn compute_target_delay(last_duration: f64, master_is_video: bool, diff: f64) -> f64 {
    let diff = if master_is_video { 0.0 } else { diff };

    let sync_threshold = last_duration.clamp(AV_SYNC_THRESHOLD_MIN, AV_SYNC_THRESHOLD_MAX);
    let max_frame_duration = 10.0; // matches the demuxer's "discontinuous" duration ceiling

    if diff.abs() < max_frame_duration {
        if diff <= -sync_threshold {
            (last_duration + diff).max(0.0)
        } else if diff >= sync_threshold && last_duration > AV_SYNC_THRESHOLD_MAX {
            last_duration + diff
        } else if diff >= sync_threshold {
            2.0 * last_duration
        } else {
            last_duration
        }
    } else {
        last_duration
    }
}

/// `vpDuration` — the gap between two displayed video frames' PTS, clamped to
/// something sane when a discontinuity makes the raw difference meaningless.
pub fn vp_duration(
    last_pts: f64,
    last_serial: i64,
    next_pts: f64,
    next_serial: i64,
    fallback_duration: f64,
    max_frame_duration: f64,
) -> f64 {
    if last_serial == next_serial {
        let duration = next_pts - last_pts;
        if duration.is_nan() || duration <= 0.0 || duration > max_frame_duration {
            fallback_duration
        } else {
            duration
        }
    } else {
        fallback_duration
    }
}

/// Accumulated state for [`synchronize_audio`]'s exponential moving average.
#[derive(Default)]
pub struct AudioDiffAccumulator {
    diff_cum: f64,
    count: u32,
}

impl AudioDiffAccumulator {
    fn avg_coef() -> f64 {
        (0.01_f64.ln() / AUDIO_DIFF_AVG_NB as f64).exp()
    }

    pub fn reset(&mut self) {
        self.diff_cum = 0.0;
        self.count = 0;
    }
}

/// `synchronizeAudio` — stretch or shrink the number of samples requested from
/// the resampler so the audio clock slides back toward the master clock
/// instead of jumping.
pub fn synchronize_audio(
    nb_samples: u32,
    audio_clock: f64,
    master_clock: f64,
    src_freq: f64,
    hw_buf_bytes: f64,
    bytes_per_sec: f64,
    master_is_audio: bool,
    acc: &mut AudioDiffAccumulator,
) -> u32 {
    if master_is_audio {
        return nb_samples;
    }

    let diff = audio_clock - master_clock;
    if diff.is_nan() || diff.abs() >= NOSYNC_THRESHOLD {
        acc.reset();
        return nb_samples;
    }

    let avg_coef = AudioDiffAccumulator::avg_coef();
    acc.diff_cum = diff + avg_coef * acc.diff_cum;
    acc.count += 1;

    if acc.count < AUDIO_DIFF_AVG_NB {
        return nb_samples;
    }

    let avg_diff = acc.diff_cum * (1.0 - avg_coef);
    let diff_threshold = if bytes_per_sec > 0.0 {
        hw_buf_bytes / bytes_per_sec
    } else {
        0.0
    };

    if avg_diff.abs() < diff_threshold {
        return nb_samples;
    }

    let wanted = nb_samples as f64 + diff * src_freq;
    let min = nb_samples as f64 * (1.0 - SAMPLE_CORRECTION_PERCENT_MAX / 100.0);
    let max = nb_samples as f64 * (1.0 + SAMPLE_CORRECTION_PERCENT_MAX / 100.0);
    wanted.clamp(min, max).round() as u32
}

/// Current queued-packet counts for the rubber-banding step.
pub struct QueueCounts {
    pub audio: usize,
    pub video: usize,
}

/// `checkExternalClockSpeed` — nudges the external clock's speed toward 0.900
/// when either queue is starved, toward 1.010 when both are comfortably full,
/// and decays back toward 1.0 otherwise. Returns the new speed.
pub fn check_external_clock_speed(current_speed: f64, counts: &QueueCounts) -> f64 {
    const STEP: f64 = 0.001;
    const MIN_SPEED: f64 = 0.900;
    const MAX_SPEED: f64 = 1.010;

    if counts.video <= 2 || counts.audio <= 2 {
        (current_speed - STEP).max(MIN_SPEED)
    } else if counts.video > 10 && counts.audio > 10 {
        (current_speed + STEP).min(MAX_SPEED)
    } else if current_speed != 1.0 {
        current_speed + STEP * (1.0 - current_speed).signum()
    } else {
        current_speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_delay_matches_branch_table() {
        // diff far negative -> speed up, floored at 0.
        assert_eq!(compute_target_delay(0.04, false, -1.0).max(0.0), 0.0);
        // diff within threshold -> unchanged.
        let d = compute_target_delay(0.04, false, 0.0);
        assert_eq!(d, 0.04);
        // large positive diff with small duration -> doubled.
        let d = compute_target_delay(0.02, false, 0.09);
        assert_eq!(d, 0.04);
        // large positive diff with large duration -> additive.
        let d = compute_target_delay(0.2, false, 0.15);
        assert_eq!(d, 0.2 + 0.15);
    }

    #[test]
    fn target_delay_is_nonnegative() {
        for diff in [-5.0, -0.5, -0.05, 0.0, 0.05, 0.5, 5.0] {
            assert!(compute_target_delay(0.04, false, diff) >= 0.0);
        }
    }

    #[test]
    fn synchronize_audio_stays_within_ten_percent() {
        let mut acc = AudioDiffAccumulator::default();
        for _ in 0..30 {
            let result = synchronize_audio(1024, 5.0, 4.0, 48000.0, 8192.0, 192000.0, false, &mut acc);
            assert!(result as f64 >= 1024.0 * 0.9 - 1.0);
            assert!(result as f64 <= 1024.0 * 1.1 + 1.0);
        }
    }

    #[test]
    fn master_is_audio_is_passthrough() {
        let mut acc = AudioDiffAccumulator::default();
        let result = synchronize_audio(1024, 5.0, 0.0, 48000.0, 8192.0, 192000.0, true, &mut acc);
        assert_eq!(result, 1024);
    }

    #[test]
    fn external_clock_speed_clamps_to_bounds() {
        let mut speed = 1.0;
        for _ in 0..200 {
            speed = check_external_clock_speed(speed, &QueueCounts { audio: 1, video: 1 });
        }
        assert_eq!(speed, 0.900);

        let mut speed = 0.900;
        for _ in 0..200 {
            speed = check_external_clock_speed(speed, &QueueCounts { audio: 20, video: 20 });
        }
        assert_eq!(speed, 1.010);
    }

    #[test]
    fn master_sync_prefers_audio_by_default() {
        let both = StreamAvailability { has_audio: true, has_video: true };
        assert_eq!(
            master_sync_type(VideoMasterPreference::Audio, &both),
            MasterSyncType::Audio
        );
        let video_only = StreamAvailability { has_audio: false, has_video: true };
        assert_eq!(
            master_sync_type(VideoMasterPreference::Audio, &video_only),
            MasterSyncType::Video
        );
        let neither = StreamAvailability { has_audio: false, has_video: false };
        assert_eq!(
            master_sync_type(VideoMasterPreference::Audio, &neither),
            MasterSyncType::External
        );
    }
}
