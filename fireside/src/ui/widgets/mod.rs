//! TUI widgets for the inn

pub mod input;
pub mod narrative;
pub mod options;
pub mod status;

pub use input::InputWidget;
pub use narrative::StoryWidget;
pub use options::OptionsWidget;
pub use status::{HotkeyBarWidget, StatusBarWidget};
