//! Chromium engine over CDP.

mod engine;
mod network;

pub use engine::{ChromeEngine, ChromeSession};
