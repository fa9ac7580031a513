//! Rumble Core - engine sound synthesis for RC vehicles
//!
//! A drivetrain simulation (throttle physics + 3-speed automatic) drives a
//! sample mixer that layers idle/rev loops, diesel knock, jake brake and six
//! effect channels. The control loop and the audio task communicate through
//! relaxed atomics and a lock-free command queue.

pub mod audio;
pub mod config;
pub mod drivetrain;
pub mod effects;
pub mod engine;
pub mod mixer;
pub mod sound_bank;
pub mod types;

pub use types::*;
