//! Reusable widget components.

pub mod detail;
pub mod status;

pub use detail::{DetailLine, DetailPanel};
pub use status::StatusBar;
