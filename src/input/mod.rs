//! Mount input adapters.
//!
//! Three interchangeable adapters translate externally-sourced pointing
//! commands into the normalized control record:
//!
//! - [`RoiInput`]: region-of-interest + position-setpoint events
//! - [`MountCommandInput`]: legacy `DO_MOUNT_CONTROL` / `DO_MOUNT_CONFIGURE`
//! - [`GimbalManagerInput`]: gimbal-manager v2 superset (ROI, setpoints,
//!   attitude-set messages, command-protocol attitude requests)
//!
//! Exactly one adapter is active per process configuration; the caller
//! polls it on a fixed cadence.
//!
//! # Polling model
//!
//! `update` blocks on the bus for at most the caller's timeout, then
//! processes whatever arrived synchronously. A timeout is "no change", not
//! an error. Within one wake-up, streams are inspected in a fixed priority
//! order and a later stream's output overwrites an earlier one's.

mod gimbal_manager;
mod mount_command;
mod roi;

pub use gimbal_manager::GimbalManagerInput;
pub use mount_command::MountCommandInput;
pub use roi::RoiInput;

use std::time::Duration;

use crate::bus::MessageBus;
use crate::control::ControlData;
use crate::error::MountInputError;

/// Rate limit applied to command streams: no more than one update per
/// 10 ms (100 Hz). Without it, this core's own acknowledgements or
/// downstream publications could re-trigger immediate wake-ups and spin
/// the polling loop.
pub(crate) const COMMAND_MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Broadcast component id: commands addressed to it are for everyone.
pub(crate) const BROADCAST_COMPONENT: u8 = 0;

/// Protocol identity parameters, read once at adapter construction from
/// the external parameter store.
#[derive(Debug, Clone, Copy)]
pub struct MountParams {
    pub mav_sys_id: u8,
    pub mav_comp_id: u8,
}

impl Default for MountParams {
    fn default() -> Self {
        Self {
            mav_sys_id: 1,
            mav_comp_id: 1,
        }
    }
}

/// Polymorphic contract shared by the three input adapters.
pub trait MountInput {
    /// Set up subscriptions and perform any startup publication.
    ///
    /// Setup failure is fatal to the adapter.
    fn initialize(&mut self) -> Result<(), MountInputError>;

    /// Poll for new input, blocking for at most `timeout`.
    ///
    /// Returns `Ok(Some(record))` when this cycle observed new input; the
    /// record is borrowed from the adapter and mutated in place on the next
    /// call, so the caller must consume it before polling again.
    /// `Ok(None)` means "no change" and the caller keeps its previous
    /// record.
    fn update(&mut self, timeout: Duration) -> Result<Option<&ControlData>, MountInputError>;

    /// Short description of the active input protocol.
    fn describe(&self) -> &'static str;
}

/// Which input protocol drives the mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Roi,
    MountCommand,
    GimbalManager { has_v2_gimbal_device: bool },
}

/// Construct the configured input adapter. Call `initialize` on the result
/// before polling it.
pub fn create_input(kind: InputKind, bus: &MessageBus, params: MountParams) -> Box<dyn MountInput> {
    match kind {
        InputKind::Roi => Box::new(RoiInput::new(bus)),
        InputKind::MountCommand => Box::new(MountCommandInput::new(bus, params)),
        InputKind::GimbalManager {
            has_v2_gimbal_device,
        } => Box::new(GimbalManagerInput::new(bus, params, has_v2_gimbal_device)),
    }
}
