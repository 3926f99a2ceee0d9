//! Button-triggered capture: one press, one committed reading.

pub mod controller;
pub mod image;
pub mod loop_worker;
pub mod weight;

pub use controller::CaptureController;
pub use loop_worker::{capture_loop, Kiosk, ShutdownReason};
