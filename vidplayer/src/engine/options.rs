/**
    Show mode for the presentation layer: what the refresh loop renders when
    there is no video stream to display.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShowMode {
    None,
    Video,
    WaveAudio,
}

/**
    Which stream kind the sync policy should prefer as the master clock when
    the caller has expressed a preference (rather than letting availability
    decide, see [`crate::engine::sync::master_sync_type`]).
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoMasterPreference {
    /// Prefer audio; this is ffplay's historical default.
    Audio,
    /// Prefer video when both are present.
    Video,
}

/**
    Construction-time engine configuration.

    Replaces the static option dictionaries and global sentinel state the
    original carries as process-wide statics: every knob the engine reads is
    threaded through explicitly from here instead.
*/
#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// Seek using byte offsets rather than timestamps (for sources without a
    /// reliable time index).
    pub seek_by_bytes: bool,
    /// Disable the 15 MiB / `hasEnoughPackets` backpressure ceiling.
    pub infinite_buffer: bool,
    /// Total play count, matching ffplay's `-loop` flag: `Some(1)` plays once
    /// (no looping), `Some(n)` plays `n` times (`n - 1` loop-seeks), `None`
    /// loops forever.
    pub loop_count: Option<u32>,
    /// Allow the presentation layer to drop late video frames.
    pub frame_drop: bool,
    pub video_master: VideoMasterPreference,
    pub show_mode: ShowMode,
    pub start_volume: f32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            seek_by_bytes: false,
            infinite_buffer: false,
            loop_count: Some(1),
            frame_drop: true,
            video_master: VideoMasterPreference::Audio,
            show_mode: ShowMode::Video,
            start_volume: 1.0,
        }
    }
}

impl EngineOptions {
    pub fn with_loop_count(mut self, count: Option<u32>) -> Self {
        self.loop_count = count;
        self
    }

    pub fn with_frame_drop(mut self, enabled: bool) -> Self {
        self.frame_drop = enabled;
        self
    }

    pub fn with_start_volume(mut self, volume: f32) -> Self {
        self.start_volume = volume.clamp(0.0, 1.0);
        self
    }
}
