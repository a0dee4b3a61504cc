//! Decoded message records exchanged over the topic bus.
//!
//! Records arrive already decoded; wire framing, encoding, and timestamping
//! belong to the transport. Field layouts follow the MAVLink conventions the
//! corresponding wire messages use (degrees-E7 already converted, radians
//! internally, `param5`/`param6` widened for geographic coordinates).
//!
//! # Topics
//!
//! Inbound to the adapters: [`VEHICLE_ROI`], [`POSITION_SETPOINT_TRIPLET`],
//! [`VEHICLE_COMMAND`], [`GIMBAL_MANAGER_SET_ATTITUDE`],
//! [`GIMBAL_DEVICE_ATTITUDE_STATUS`], [`VEHICLE_GLOBAL_POSITION`].
//!
//! Outbound: [`VEHICLE_COMMAND_ACK`], [`GIMBAL_DEVICE_INFORMATION`],
//! [`GIMBAL_MANAGER_STATUS`], plus [`VEHICLE_COMMAND`] for the startup
//! device-information request.

use bitflags::bitflags;

use crate::bus::Topic;

/// Region-of-interest pointing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoiMode {
    /// No region of interest; the mount returns to neutral.
    #[default]
    None,
    /// Point at the current mission waypoint.
    NextWaypoint,
    /// Point at a fixed geographic location.
    FixedLocation,
    /// Point at a moving target (accepted, not implemented).
    Target,
}

/// Region-of-interest designation.
#[derive(Debug, Clone, Default)]
pub struct VehicleRoi {
    pub mode: RoiMode,
    /// Geographic target, used in `FixedLocation` mode (degrees / meters).
    pub lat: f64,
    pub lon: f64,
    pub alt: f32,
    /// Pointing biases, used in `NextWaypoint` mode (radians).
    pub roll_offset: f32,
    pub pitch_offset: f32,
    pub yaw_offset: f32,
}

/// One position setpoint (degrees / meters).
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionSetpoint {
    pub lat: f64,
    pub lon: f64,
    pub alt: f32,
}

/// Previous/current/next position setpoints; only `current` is consumed
/// by this core.
#[derive(Debug, Clone, Default)]
pub struct PositionSetpointTriplet {
    pub previous: PositionSetpoint,
    pub current: PositionSetpoint,
    pub next: PositionSetpoint,
}

/// Own-ship global position (degrees / meters, yaw in radians).
#[derive(Debug, Clone, Copy, Default)]
pub struct VehicleGlobalPosition {
    pub lat: f64,
    pub lon: f64,
    pub alt: f32,
    pub yaw: f32,
}

/// Discrete vehicle command variants relevant to mount control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountCommandKind {
    /// Legacy `DO_MOUNT_CONTROL`.
    DoMountControl,
    /// Legacy `DO_MOUNT_CONFIGURE`.
    DoMountConfigure,
    /// Gimbal-manager v2 attitude request over the command protocol.
    DoGimbalManagerAttitude,
    /// Request a specific message from a device (`param1` = message id).
    RequestMessage,
    /// Anything else; carried so unrelated traffic can be skipped.
    Other(u32),
}

/// `DO_MOUNT_CONTROL` sub-mode, decoded from truncated `param7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    Retract,
    Neutral,
    MavlinkTargeting,
    RcTargeting,
    GpsPoint,
}

impl MountMode {
    /// Decode the wire value. Unrecognized or non-finite values yield
    /// `None` (a NaN would otherwise cast to 0 and read as `Retract`).
    pub fn from_param(value: f32) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        match value as i32 {
            0 => Some(MountMode::Retract),
            1 => Some(MountMode::Neutral),
            2 => Some(MountMode::MavlinkTargeting),
            3 => Some(MountMode::RcTargeting),
            4 => Some(MountMode::GpsPoint),
            _ => None,
        }
    }
}

/// Discrete vehicle command record.
///
/// `param5` and `param6` are widened because geographic commands carry
/// latitude/longitude in them.
#[derive(Debug, Clone)]
pub struct VehicleCommand {
    pub command: MountCommandKind,
    pub param1: f32,
    pub param2: f32,
    pub param3: f32,
    pub param4: f32,
    pub param5: f64,
    pub param6: f64,
    pub param7: f32,
    pub target_system: u8,
    pub target_component: u8,
    pub source_system: u8,
    pub source_component: u8,
}

impl Default for VehicleCommand {
    fn default() -> Self {
        Self {
            command: MountCommandKind::Other(0),
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
            param4: 0.0,
            param5: 0.0,
            param6: 0.0,
            param7: 0.0,
            target_system: 0,
            target_component: 0,
            source_system: 0,
            source_component: 0,
        }
    }
}

/// Command acknowledgement outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Accepted,
    TemporarilyRejected,
    Denied,
    Unsupported,
    Failed,
}

/// Acknowledgement for a processed vehicle command, addressed back to the
/// original sender.
#[derive(Debug, Clone)]
pub struct VehicleCommandAck {
    pub command: MountCommandKind,
    pub result: CommandResult,
    pub target_system: u8,
    pub target_component: u8,
}

bitflags! {
    /// Gimbal-manager protocol flags carried by attitude-set messages and
    /// by `param5` of the command-protocol equivalent.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GimbalManagerFlags: u32 {
        const RETRACT = 1;
        const NEUTRAL = 2;
        const NONE = 4;
        const ROLL_LOCK = 8;
        const PITCH_LOCK = 16;
        const YAW_LOCK = 32;
        const NUDGE = 64;
        const OVERRIDE = 128;
    }
}

/// Gimbal-manager attitude-set request.
#[derive(Debug, Clone)]
pub struct GimbalManagerSetAttitude {
    pub flags: GimbalManagerFlags,
    /// Orientation quaternion `[w, x, y, z]`.
    pub q: [f32; 4],
    /// Per-axis angular rates in rad/s; NaN means "no rate requested".
    pub angular_velocity_x: f32,
    pub angular_velocity_y: f32,
    pub angular_velocity_z: f32,
}

impl Default for GimbalManagerSetAttitude {
    fn default() -> Self {
        Self {
            flags: GimbalManagerFlags::empty(),
            q: [1.0, 0.0, 0.0, 0.0],
            angular_velocity_x: f32::NAN,
            angular_velocity_y: f32::NAN,
            angular_velocity_z: f32::NAN,
        }
    }
}

/// Attitude status reported by the gimbal device.
#[derive(Debug, Clone, Copy, Default)]
pub struct GimbalDeviceAttitudeStatus {
    pub device_flags: u16,
}

/// Manager status republished every update cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct GimbalManagerStatus {
    pub flags: u32,
    pub gimbal_device_id: u8,
}

bitflags! {
    /// Gimbal device capability flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GimbalDeviceCapFlags: u16 {
        const HAS_RETRACT = 1;
        const HAS_NEUTRAL = 2;
        const HAS_ROLL_AXIS = 4;
        const HAS_ROLL_FOLLOW = 8;
        const HAS_ROLL_LOCK = 16;
        const HAS_PITCH_AXIS = 32;
        const HAS_PITCH_FOLLOW = 64;
        const HAS_PITCH_LOCK = 128;
        const HAS_YAW_AXIS = 256;
        const HAS_YAW_FOLLOW = 512;
        const HAS_YAW_LOCK = 1024;
        const SUPPORTS_INFINITE_YAW = 2048;
    }
}

/// Gimbal device description, published once at startup (either synthesized
/// locally or relayed from a smart device).
#[derive(Debug, Clone, Default)]
pub struct GimbalDeviceInformation {
    pub vendor_name: String,
    pub model_name: String,
    pub firmware_version: u32,
    pub capability_flags: GimbalDeviceCapFlags,
    /// Pitch range (radians) and rate limit (rad/s).
    pub tilt_max: f32,
    pub tilt_min: f32,
    pub tilt_rate_max: f32,
    /// Yaw range (radians) and rate limit (rad/s).
    pub pan_max: f32,
    pub pan_min: f32,
    pub pan_rate_max: f32,
}

/// Message id requested from a smart gimbal device at startup.
pub const GIMBAL_DEVICE_INFORMATION_MSG_ID: u32 = 283;

pub const VEHICLE_ROI: Topic<VehicleRoi> = Topic::new("vehicle_roi");
pub const POSITION_SETPOINT_TRIPLET: Topic<PositionSetpointTriplet> =
    Topic::new("position_setpoint_triplet");
pub const VEHICLE_COMMAND: Topic<VehicleCommand> = Topic::new("vehicle_command");
pub const VEHICLE_COMMAND_ACK: Topic<VehicleCommandAck> = Topic::new("vehicle_command_ack");
pub const GIMBAL_MANAGER_SET_ATTITUDE: Topic<GimbalManagerSetAttitude> =
    Topic::new("gimbal_manager_set_attitude");
pub const GIMBAL_DEVICE_ATTITUDE_STATUS: Topic<GimbalDeviceAttitudeStatus> =
    Topic::new("gimbal_device_attitude_status");
pub const GIMBAL_DEVICE_INFORMATION: Topic<GimbalDeviceInformation> =
    Topic::new("gimbal_device_information");
pub const GIMBAL_MANAGER_STATUS: Topic<GimbalManagerStatus> = Topic::new("gimbal_manager_status");
pub const VEHICLE_GLOBAL_POSITION: Topic<VehicleGlobalPosition> =
    Topic::new("vehicle_global_position");
