mod player;

pub use player::{PlaybackState, VideoPlayer};
