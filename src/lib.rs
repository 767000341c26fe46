//! Host simulator for a polled 4x4 matrix-keypad firmware.
//!
//! The firmware core (`keypad`, `controller`, the tone math in `beeper`)
//! is written against the `board::Board` capability, so it runs the same
//! against the simulated matrix as it would against real lines.

pub mod beeper;
pub mod board;
pub mod controller;
pub mod keypad;
pub mod simulator;
pub mod timing;
