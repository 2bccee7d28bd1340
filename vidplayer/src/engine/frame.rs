/**
    A decoded unit handed from a [`super::decoder`] loop to a
    [`super::frame_queue::FrameQueue`] slot.

    "Serial" is the discontinuity tag the producing packet carried at enqueue
    time (see [`super::packet_queue`] §4.2); the presentation layer compares it
    against the backing queue's current serial to detect stale frames left over
    from before a seek.
*/
#[derive(Clone)]
pub enum Frame {
    Video(VideoFrame),
    Audio(AudioFrame),
    Subtitle(SubtitleFrame),
}

#[derive(Clone)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sample_aspect_ratio: f64,
    pub pts: f64,
    pub duration: f64,
    pub pos: i64,
    pub serial: i64,
}

#[derive(Clone)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub pts: f64,
    pub duration: f64,
    pub serial: i64,
}

/// One decoded subtitle event: a list of text/bitmap regions and the window
/// (relative to `pts`) during which they should be displayed.
#[derive(Clone)]
pub struct SubtitleFrame {
    pub regions: Vec<SubtitleRegion>,
    pub pts: f64,
    pub start_display_time: f64,
    pub end_display_time: f64,
    pub serial: i64,
}

#[derive(Clone)]
pub struct SubtitleRegion {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn serial(&self) -> i64 {
        match self {
            Frame::Video(f) => f.serial,
            Frame::Audio(f) => f.serial,
            Frame::Subtitle(f) => f.serial,
        }
    }

    pub fn pts(&self) -> f64 {
        match self {
            Frame::Video(f) => f.pts,
            Frame::Audio(f) => f.pts,
            Frame::Subtitle(f) => f.pts,
        }
    }

    pub fn duration(&self) -> f64 {
        match self {
            Frame::Video(f) => f.duration,
            Frame::Audio(f) => f.duration,
            Frame::Subtitle(f) => f.end_display_time - f.start_display_time,
        }
    }

    pub fn pos(&self) -> i64 {
        match self {
            Frame::Video(f) => f.pos,
            _ => -1,
        }
    }

    pub fn as_video(&self) -> Option<&VideoFrame> {
        match self {
            Frame::Video(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_subtitle(&self) -> Option<&SubtitleFrame> {
        match self {
            Frame::Subtitle(f) => Some(f),
            _ => None,
        }
    }
}

impl SubtitleFrame {
    /// True once the video clock has passed this subtitle's display window,
    /// i.e. it's due to be dropped from the subtitle frame queue (§4.7:
    /// "advance subtitle queue past expired subtitles").
    pub fn is_expired(&self, video_clock_now: f64) -> bool {
        if video_clock_now.is_nan() {
            return false;
        }
        video_clock_now > self.pts + self.end_display_time
    }

    /// True if `video_clock_now` falls within this subtitle's display window,
    /// i.e. it should currently be rendered.
    pub fn is_active(&self, video_clock_now: f64) -> bool {
        if video_clock_now.is_nan() {
            return false;
        }
        let start = self.pts + self.start_display_time;
        let end = self.pts + self.end_display_time;
        video_clock_now >= start && video_clock_now <= end
    }
}
