//! Capability traits for the kiosk's physical collaborators.
//!
//! The capture loop only ever sees these traits, so the same loop runs
//! against real drivers on the unit and against the simulators in
//! [`sim`] or the fakes in the test suite.

use async_trait::async_trait;

use crate::error::{CameraError, SensorError};

pub mod sim;

/// A load-cell scale that yields one raw, uncalibrated reading on demand.
#[async_trait]
pub trait Scale: Send + Sync {
    async fn read_raw(&self) -> Result<f64, SensorError>;
}

/// A camera that yields one encoded JPEG frame on demand.
#[async_trait]
pub trait Camera: Send + Sync {
    async fn grab_frame(&self) -> Result<Vec<u8>, CameraError>;

    /// Releases the device handle. Must be safe to call more than once,
    /// and to race a late [`Camera::grab_frame`] from a cycle that was
    /// abandoned at shutdown.
    fn release(&self);
}

/// The physical trigger the operator presses to start a cycle.
#[async_trait]
pub trait Button: Send + Sync {
    /// Resolves when the trigger becomes active.
    async fn wait_for_active(&self);

    /// Resolves when the trigger becomes inactive again. Together with
    /// [`Button::wait_for_active`] this consumes exactly one press, so a
    /// held trigger cannot re-fire.
    async fn wait_for_inactive(&self);
}

/// A status indicator lamp.
pub trait StatusLed: Send + Sync {
    fn set(&self, on: bool);
}
