use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gpui::RenderImage;
use image::{Frame as ImageFrame, RgbaImage};

use crate::audio::AudioStreamConsumer;
use crate::engine::frame::VideoFrame;
use crate::engine::options::EngineOptions;
use crate::engine::{Engine, PlaybackState as EnginePlaybackState};

pub use crate::engine::PlaybackState;

/// Host-facing façade over [`crate::engine::Engine`]. This is the thin shell
/// the UI layer already calls (`ui::player_view`, `ui::video_element`); it
/// owns the cached decoded-frame-to-`RenderImage` conversion the engine has
/// no reason to know about, and nothing else.
pub struct VideoPlayer {
    engine: Engine,
    cached_render_image: Mutex<Option<Arc<RenderImage>>>,
    frame_generation: AtomicU64,
}

impl VideoPlayer {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, crate::engine::error::EngineError> {
        let engine = Engine::open_source(path, EngineOptions::default())?;
        Ok(Self {
            engine,
            cached_render_image: Mutex::new(None),
            frame_generation: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        self.engine.path()
    }

    pub fn duration(&self) -> Duration {
        self.engine.duration()
    }

    pub fn position(&self) -> Duration {
        self.engine.position()
    }

    pub fn state(&self) -> PlaybackState {
        match self.engine.state() {
            EnginePlaybackState::Playing => PlaybackState::Playing,
            EnginePlaybackState::Paused => PlaybackState::Paused,
            EnginePlaybackState::Ended => PlaybackState::Ended,
            EnginePlaybackState::Error => PlaybackState::Error,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.state() == PlaybackState::Ended || self.engine.is_ended()
    }

    pub fn is_paused(&self) -> bool {
        self.engine.is_paused()
    }

    pub fn width(&self) -> u32 {
        self.engine.width()
    }

    pub fn height(&self) -> u32 {
        self.engine.height()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.engine.aspect_ratio()
    }

    pub fn pause(&self) {
        self.engine.pause();
    }

    pub fn resume(&self) {
        self.engine.resume();
    }

    pub fn toggle_pause(&self) {
        self.engine.toggle_pause();
    }

    pub fn audio_consumer(&self) -> Option<Arc<AudioStreamConsumer>> {
        if self.engine.has_audio() {
            Some(self.engine.audio_consumer())
        } else {
            None
        }
    }

    pub fn set_volume(&self, volume: f32) {
        self.engine.set_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.engine.volume()
    }

    pub fn has_audio(&self) -> bool {
        self.engine.has_audio()
    }

    pub fn mute(&self) {
        self.engine.set_mute(true);
    }

    pub fn unmute(&self) {
        self.engine.set_mute(false);
    }

    pub fn toggle_mute(&self) -> bool {
        self.engine.toggle_mute()
    }

    pub fn is_muted(&self) -> bool {
        self.engine.is_muted()
    }

    pub fn seek_to(&self, position: Duration) {
        self.engine.seek(position.min(self.engine.duration()));
        *self.cached_render_image.lock().unwrap() = None;
        self.frame_generation.fetch_add(1, Ordering::Relaxed);
    }

    pub fn seek_forward(&self, amount: Duration) {
        self.engine.seek_forward(amount);
        self.frame_generation.fetch_add(1, Ordering::Relaxed);
    }

    pub fn seek_backward(&self, amount: Duration) {
        self.engine.seek_backward(amount);
        self.frame_generation.fetch_add(1, Ordering::Relaxed);
    }

    /// One paint-driven refresh step (C7's refresh loop, called once per
    /// animation frame by [`crate::ui::video_element::VideoElement`]): pulls
    /// the next due picture from the engine, if any, and returns the
    /// `(current, old)` image pair gpui expects so it can drop the previous
    /// texture after painting the new one.
    pub fn get_render_image(&self) -> (Option<Arc<RenderImage>>, Option<Arc<RenderImage>>) {
        let mut cached = self.cached_render_image.lock().unwrap();

        if let Some(frame) = self.engine.poll_video_frame() {
            let old = cached.take();
            if let Some(render_image) = frame_to_render_image(&frame) {
                *cached = Some(Arc::new(render_image));
                self.frame_generation.fetch_add(1, Ordering::Relaxed);
            }
            return (cached.clone(), old);
        }

        (cached.clone(), None)
    }

    pub fn stop(&self) {
        self.engine.close();
    }
}

fn frame_to_render_image(frame: &VideoFrame) -> Option<RenderImage> {
    // Note: Despite the name, RgbaImage just holds raw bytes.
    // GPUI expects BGRA on macOS, which is what the video transform provides.
    let image = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())?;
    let img_frame = ImageFrame::new(image);
    Some(RenderImage::new(vec![img_frame]))
}
