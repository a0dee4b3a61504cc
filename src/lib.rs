//! mount_input - Normalized pointing-command input for camera/sensor mounts
//!
//! This library translates heterogeneous externally-sourced pointing commands
//! (region-of-interest designations, legacy discrete mount commands, and the
//! gimbal-manager v2 attitude protocol) into one normalized [`ControlData`]
//! record that a downstream actuation stage consumes on a fixed polling
//! cadence.
//!
//! # Modules
//!
//! - [`bus`]: In-process topic bus the adapters poll (bounded multi-stream wait)
//! - [`messages`]: Decoded message records and topic constants
//! - [`control`]: The normalized control record (Neutral | Angle | LonLat)
//! - [`geo`]: Geodetic pointing math (bearing, projection, pitch/yaw solver)
//! - [`input`]: The `MountInput` contract and its three adapters
//! - [`core`]: Logging macros
//!
//! # Usage
//!
//! ```ignore
//! use mount_input::{create_input, InputKind, MessageBus, MountParams};
//! use std::time::Duration;
//!
//! let bus = MessageBus::new();
//! let mut input = create_input(
//!     InputKind::GimbalManager { has_v2_gimbal_device: false },
//!     &bus,
//!     MountParams::default(),
//! );
//! input.initialize()?;
//!
//! // In the actuation loop:
//! if let Some(control) = input.update(Duration::from_millis(100))? {
//!     // render `control` into mount motion
//! }
//! ```

pub mod bus;
pub mod control;
pub mod core;
pub mod error;
pub mod geo;
pub mod input;
pub mod messages;

// Re-export the main entry points
pub use bus::{MessageBus, Publisher, Subscription, Topic};
pub use control::{AngleControl, ControlData, ControlFrame, ControlPayload, LonLatControl};
pub use error::{BusError, MountInputError};
pub use input::{create_input, InputKind, MountInput, MountParams};
