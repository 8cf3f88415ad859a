pub mod app;
pub mod audio;
pub mod clock;
pub mod config;
pub mod error;
pub mod library;
pub mod loader;
pub mod model;
pub mod playlist;
pub mod samples;
pub mod session;
pub mod ui;
pub mod waveform;
