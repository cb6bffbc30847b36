//! UI module for the Fireside TUI

pub mod render;
pub mod theme;
pub mod widgets;
