//! The normalized mount control record.
//!
//! One mutable [`ControlData`] lives inside each input adapter. It is
//! overwritten in place on every cycle that produces output and returned to
//! the caller by reference; the caller must not retain it across the next
//! `update` call. The payload is a sum type: only the fields of the active
//! variant are meaningful.

/// Axis indices into [`AngleControl`] arrays.
pub const AXIS_ROLL: usize = 0;
pub const AXIS_PITCH: usize = 1;
pub const AXIS_YAW: usize = 2;

/// Sentinel disabling the fixed-pitch override: strictly below `-PI`, the
/// threshold the override comparison uses.
pub const PITCH_FIXED_UNSET: f32 = -2.0 * std::f32::consts::PI;

/// Reference frame for one mount axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlFrame {
    /// Angle relative to the carrier's own orientation.
    #[default]
    BodyRelativeAngle,
    /// Angular rate instead of an angle.
    AngularRate,
    /// Angle relative to a world/horizon reference.
    AbsoluteAngle,
}

/// Per-axis `(value, frame)` payload for roll, pitch, yaw.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngleControl {
    pub frames: [ControlFrame; 3],
    /// Radians for angle frames, rad/s for the rate frame.
    pub angles: [f32; 3],
}

/// Geographic target payload plus pointing biases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LonLatControl {
    /// Target position (degrees / meters).
    pub lon: f64,
    pub lat: f64,
    pub altitude: f32,
    /// Roll to apply while tracking (radians).
    pub roll_angle: f32,
    /// Additive biases applied after the bearing/elevation computation.
    pub pitch_angle_offset: f32,
    pub yaw_angle_offset: f32,
    /// Used verbatim instead of the computed pitch when `>= -PI`.
    pub pitch_fixed_angle: f32,
}

impl LonLatControl {
    /// Fresh target with offsets cleared and the fixed-pitch override
    /// disabled.
    pub fn at(lon: f64, lat: f64, altitude: f32) -> Self {
        Self {
            lon,
            lat,
            altitude,
            ..Default::default()
        }
    }
}

impl Default for LonLatControl {
    fn default() -> Self {
        Self {
            lon: 0.0,
            lat: 0.0,
            altitude: 0.0,
            roll_angle: 0.0,
            pitch_angle_offset: 0.0,
            yaw_angle_offset: 0.0,
            pitch_fixed_angle: PITCH_FIXED_UNSET,
        }
    }
}

/// Mutually exclusive control payload.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ControlPayload {
    /// Return the mount to its neutral position.
    #[default]
    Neutral,
    /// Direct per-axis angle/rate demand.
    Angle(AngleControl),
    /// Geographic target; converted to `Angle` by the gimbal-manager
    /// adapter before it is surfaced, consumed directly otherwise.
    LonLat(LonLatControl),
}

/// Normalized control record emitted at most once per polling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlData {
    pub payload: ControlPayload,
    /// Per-axis request for external stabilization (legacy protocol only).
    pub stabilize_axis: [bool; 3],
    /// True only on an explicit retract request; cleared at the start of
    /// every cycle that produces output.
    pub gimbal_shutter_retract: bool,
}
