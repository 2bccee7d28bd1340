mod actions;
mod app_state;
mod player_view;
mod root_view;
mod video_element;
mod welcome_view;

pub use actions::register_shortcuts;
pub use app_state::AppState;
pub use root_view::RootView;
