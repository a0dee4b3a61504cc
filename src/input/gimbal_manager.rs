//! Gimbal-manager v2 input adapter.
//!
//! Superset of the ROI adapter: consumes ROI designations, position
//! setpoints, gimbal-manager attitude-set messages, and the
//! command-protocol attitude request. Owns device-information negotiation
//! at startup and republishes the manager status every update cycle.
//! Geographic targets are converted to angle demands immediately via the
//! pointing solver.

use std::f32::consts::{FRAC_PI_2, PI};
use std::time::{Duration, Instant};

use nalgebra::{Quaternion, UnitQuaternion};

use crate::bus::{MessageBus, Publisher, Subscription};
use crate::control::{
    AngleControl, ControlData, ControlFrame, ControlPayload, LonLatControl, AXIS_PITCH, AXIS_ROLL,
    AXIS_YAW,
};
use crate::error::MountInputError;
use crate::geo::PointingSolver;
use crate::messages::{
    CommandResult, GimbalDeviceAttitudeStatus, GimbalDeviceCapFlags, GimbalDeviceInformation,
    GimbalManagerFlags, GimbalManagerSetAttitude, GimbalManagerStatus, MountCommandKind,
    PositionSetpointTriplet, RoiMode, VehicleCommand, VehicleCommandAck, VehicleGlobalPosition,
    VehicleRoi, GIMBAL_DEVICE_ATTITUDE_STATUS, GIMBAL_DEVICE_INFORMATION,
    GIMBAL_DEVICE_INFORMATION_MSG_ID, GIMBAL_MANAGER_SET_ATTITUDE, GIMBAL_MANAGER_STATUS,
    POSITION_SETPOINT_TRIPLET, VEHICLE_COMMAND, VEHICLE_COMMAND_ACK, VEHICLE_GLOBAL_POSITION,
    VEHICLE_ROI,
};

use super::roi::WPNEXT_PITCH_FIXED;
use super::{MountInput, MountParams, BROADCAST_COMPONENT, COMMAND_MIN_INTERVAL};

struct ManagerStreams {
    set_attitude: Subscription<GimbalManagerSetAttitude>,
    roi: Subscription<VehicleRoi>,
    setpoint: Subscription<PositionSetpointTriplet>,
    command: Subscription<VehicleCommand>,
    attitude_status: Subscription<GimbalDeviceAttitudeStatus>,
    global_position: Subscription<VehicleGlobalPosition>,
    ack: Publisher<VehicleCommandAck>,
    manager_status: Publisher<GimbalManagerStatus>,
    device_information: Publisher<GimbalDeviceInformation>,
    command_out: Publisher<VehicleCommand>,
}

/// Gimbal-manager v2 input adapter.
pub struct GimbalManagerInput {
    bus: MessageBus,
    params: MountParams,
    has_v2_gimbal_device: bool,
    streams: Option<ManagerStreams>,
    control: ControlData,
    /// Geographic target cache. Deliberately not reset between ROI events:
    /// a fixed-location ROI reuses whatever offsets and fixed-pitch value
    /// the previous ROI left behind.
    lonlat: LonLatControl,
    cur_roi_mode: RoiMode,
    /// True once any ROI other than "none" was accepted; cleared by "none".
    is_target_set: bool,
    solver: PointingSolver,
    last_attitude_status: GimbalDeviceAttitudeStatus,
}

impl GimbalManagerInput {
    pub fn new(bus: &MessageBus, params: MountParams, has_v2_gimbal_device: bool) -> Self {
        Self {
            bus: bus.clone(),
            params,
            has_v2_gimbal_device,
            streams: None,
            control: ControlData::default(),
            lonlat: LonLatControl::default(),
            cur_roi_mode: RoiMode::None,
            is_target_set: false,
            solver: PointingSolver::new(),
            last_attitude_status: GimbalDeviceAttitudeStatus::default(),
        }
    }

    /// Ask a smart (v2-capable) gimbal device to describe itself.
    fn request_gimbal_device_information(&self) -> Result<(), MountInputError> {
        let Some(streams) = self.streams.as_ref() else {
            return Err(MountInputError::NotInitialized);
        };
        let request = VehicleCommand {
            command: MountCommandKind::RequestMessage,
            param1: GIMBAL_DEVICE_INFORMATION_MSG_ID as f32,
            target_system: 0,
            target_component: 0,
            source_system: self.params.mav_sys_id,
            source_component: self.params.mav_comp_id,
            ..Default::default()
        };
        streams
            .command_out
            .publish(request)
            .map_err(MountInputError::Setup)
    }

    /// Publish a synthesized device description for a mount without its own
    /// v2 protocol support: a generic AUX-style gimbal.
    fn stream_gimbal_device_information(&self) -> Result<(), MountInputError> {
        let Some(streams) = self.streams.as_ref() else {
            return Err(MountInputError::NotInitialized);
        };
        let info = GimbalDeviceInformation {
            vendor_name: "generic".to_string(),
            model_name: "AUX gimbal".to_string(),
            firmware_version: 0,
            capability_flags: GimbalDeviceCapFlags::HAS_NEUTRAL
                | GimbalDeviceCapFlags::HAS_ROLL_LOCK
                | GimbalDeviceCapFlags::HAS_PITCH_AXIS
                | GimbalDeviceCapFlags::HAS_PITCH_LOCK
                | GimbalDeviceCapFlags::HAS_YAW_AXIS
                | GimbalDeviceCapFlags::HAS_YAW_LOCK,
            tilt_max: FRAC_PI_2,
            tilt_min: -FRAC_PI_2,
            tilt_rate_max: 1.0,
            pan_max: PI,
            pan_min: -PI,
            pan_rate_max: 1.0,
        };
        streams
            .device_information
            .publish(info)
            .map_err(MountInputError::Setup)
    }

    /// Republish the manager status from the most recent device attitude
    /// status. Runs once per update cycle regardless of stream activity.
    fn stream_gimbal_manager_status(&mut self) {
        let Some(streams) = self.streams.as_mut() else {
            return;
        };
        if streams.attitude_status.updated() {
            if let Some(status) = streams.attitude_status.copy() {
                self.last_attitude_status = status;
            }
        }
        let status = GimbalManagerStatus {
            flags: u32::from(self.last_attitude_status.device_flags),
            gimbal_device_id: 0,
        };
        if let Err(err) = streams.manager_status.publish(status) {
            crate::log_warn!("failed to publish gimbal manager status: {}", err);
        }
    }

    /// Whether a command-protocol request is addressed to this manager.
    /// Unlike the legacy adapter, a broadcast system id is accepted too.
    fn addressed_to_us(&self, command: &VehicleCommand) -> bool {
        let sysid_correct =
            command.target_system == self.params.mav_sys_id || command.target_system == 0;
        let compid_correct = command.target_component == self.params.mav_comp_id
            || command.target_component == BROADCAST_COMPONENT;
        sysid_correct && compid_correct
    }

    /// Rebuild the control record as an angle demand toward the cached
    /// geographic target.
    fn transform_lon_lat_to_angle(&mut self, carrier: &VehicleGlobalPosition) {
        let (pitch, yaw) = self.solver.angles_to_target(&self.lonlat, carrier);
        let mut angle = AngleControl::default();
        angle.angles[AXIS_ROLL] = 0.0;
        angle.angles[AXIS_PITCH] = pitch;
        angle.angles[AXIS_YAW] = yaw;
        self.control.payload = ControlPayload::Angle(angle);
    }

    /// Apply the gimbal-manager flag/orientation logic. Returns whether
    /// the control record was rewritten.
    #[allow(clippy::too_many_arguments)]
    fn apply_set_attitude(
        &mut self,
        flags: GimbalManagerFlags,
        roll_angle: f32,
        pitch_angle: f32,
        yaw_angle: f32,
        roll_rate: f32,
        pitch_rate: f32,
        yaw_rate: f32,
    ) -> bool {
        if flags.contains(GimbalManagerFlags::RETRACT) {
            // Not representable in the control record.
            return false;
        }
        if flags.contains(GimbalManagerFlags::NEUTRAL) {
            self.control.payload = ControlPayload::Neutral;
            return true;
        }
        if flags.contains(GimbalManagerFlags::NONE) {
            return false;
        }

        let mut frames = [ControlFrame::BodyRelativeAngle; 3];
        let mut angles = match self.control.payload {
            ControlPayload::Angle(angle) => angle.angles,
            _ => [0.0; 3],
        };

        if self.is_target_set && flags.contains(GimbalManagerFlags::NUDGE) {
            // Additive adjustment of the standing target angle.
            angles[AXIS_ROLL] += roll_angle;
            angles[AXIS_PITCH] += pitch_angle;
            angles[AXIS_YAW] += yaw_angle;
        } else {
            angles = [roll_angle, pitch_angle, yaw_angle];
        }

        if self.is_target_set && flags.contains(GimbalManagerFlags::OVERRIDE) {
            // Replaces the tracking angle outright. The ROI offsets are not
            // applied on this path.
            angles = [roll_angle, pitch_angle, yaw_angle];
        }

        // A finite rate switches that axis to rate control, taking
        // precedence over the angle value assigned above.
        if roll_rate.is_finite() {
            frames[AXIS_ROLL] = ControlFrame::AngularRate;
            angles[AXIS_ROLL] = roll_rate;
        }
        if pitch_rate.is_finite() {
            frames[AXIS_PITCH] = ControlFrame::AngularRate;
            angles[AXIS_PITCH] = pitch_rate;
        }
        if yaw_rate.is_finite() {
            frames[AXIS_YAW] = ControlFrame::AngularRate;
            angles[AXIS_YAW] = yaw_rate;
        }

        // Lock flags force the frame to an absolute reference; the value
        // selected above is retained.
        if flags.contains(GimbalManagerFlags::ROLL_LOCK) {
            frames[AXIS_ROLL] = ControlFrame::AbsoluteAngle;
        }
        if flags.contains(GimbalManagerFlags::PITCH_LOCK) {
            frames[AXIS_PITCH] = ControlFrame::AbsoluteAngle;
        }
        if flags.contains(GimbalManagerFlags::YAW_LOCK) {
            frames[AXIS_YAW] = ControlFrame::AbsoluteAngle;
        }

        self.control.payload = ControlPayload::Angle(AngleControl { frames, angles });
        true
    }

    /// Process one ROI designation. Returns `(changed, actionable)`;
    /// a non-actionable event keeps the polling loop going.
    fn handle_roi(
        &mut self,
        roi: &VehicleRoi,
        setpoint: &PositionSetpointTriplet,
        carrier: &VehicleGlobalPosition,
    ) -> (bool, bool) {
        self.control.gimbal_shutter_retract = false;

        match roi.mode {
            RoiMode::None => {
                self.control.payload = ControlPayload::Neutral;
                self.is_target_set = false;
                self.cur_roi_mode = roi.mode;
                (true, true)
            }
            RoiMode::NextWaypoint => {
                self.lonlat.lon = setpoint.current.lon;
                self.lonlat.lat = setpoint.current.lat;
                self.lonlat.altitude = setpoint.current.alt;
                self.lonlat.pitch_fixed_angle = WPNEXT_PITCH_FIXED;
                self.lonlat.roll_angle = roi.roll_offset;
                self.lonlat.pitch_angle_offset = roi.pitch_offset;
                self.lonlat.yaw_angle_offset = roi.yaw_offset;
                self.transform_lon_lat_to_angle(carrier);
                self.is_target_set = true;
                self.cur_roi_mode = roi.mode;
                (true, true)
            }
            RoiMode::FixedLocation => {
                // Offsets and fixed-pitch stay whatever the previous ROI
                // left in the cache.
                self.lonlat.lon = roi.lon;
                self.lonlat.lat = roi.lat;
                self.lonlat.altitude = roi.alt;
                self.transform_lon_lat_to_angle(carrier);
                self.is_target_set = true;
                self.cur_roi_mode = roi.mode;
                (true, true)
            }
            RoiMode::Target => {
                // Not implemented.
                (false, false)
            }
        }
    }

    /// Handle a command-protocol attitude request. The command carries no
    /// roll channel: roll angle 0, roll rate unset.
    fn handle_attitude_command(&mut self, command: &VehicleCommand) -> bool {
        let flags = GimbalManagerFlags::from_bits_truncate(command.param5 as u32);
        self.apply_set_attitude(
            flags,
            0.0,
            command.param1,
            command.param2,
            f32::NAN,
            command.param3,
            command.param4,
        )
    }

    /// Publish an acknowledgement addressed back to the command's sender.
    fn ack_command(&self, command: &VehicleCommand) {
        let Some(streams) = self.streams.as_ref() else {
            return;
        };
        let ack = VehicleCommandAck {
            command: command.command,
            result: CommandResult::Accepted,
            target_system: command.source_system,
            target_component: command.source_component,
        };
        if let Err(err) = streams.ack.publish(ack) {
            crate::log_warn!("failed to publish command ack: {}", err);
        }
    }
}

impl MountInput for GimbalManagerInput {
    fn initialize(&mut self) -> Result<(), MountInputError> {
        let set_attitude = self
            .bus
            .subscribe(&GIMBAL_MANAGER_SET_ATTITUDE)
            .map_err(MountInputError::Setup)?;
        let roi = self
            .bus
            .subscribe(&VEHICLE_ROI)
            .map_err(MountInputError::Setup)?;
        let setpoint = self
            .bus
            .subscribe(&POSITION_SETPOINT_TRIPLET)
            .map_err(MountInputError::Setup)?;
        let mut command = self
            .bus
            .subscribe(&VEHICLE_COMMAND)
            .map_err(MountInputError::Setup)?;
        // Same feedback-loop protection as the legacy command adapter; our
        // own device-information request arrives on this very stream.
        command.set_min_interval(COMMAND_MIN_INTERVAL);
        let attitude_status = self
            .bus
            .subscribe(&GIMBAL_DEVICE_ATTITUDE_STATUS)
            .map_err(MountInputError::Setup)?;
        let global_position = self
            .bus
            .subscribe(&VEHICLE_GLOBAL_POSITION)
            .map_err(MountInputError::Setup)?;

        let ack = self
            .bus
            .advertise(&VEHICLE_COMMAND_ACK)
            .map_err(MountInputError::Setup)?;
        let manager_status = self
            .bus
            .advertise(&GIMBAL_MANAGER_STATUS)
            .map_err(MountInputError::Setup)?;
        let device_information = self
            .bus
            .advertise(&GIMBAL_DEVICE_INFORMATION)
            .map_err(MountInputError::Setup)?;
        let command_out = self
            .bus
            .advertise(&VEHICLE_COMMAND)
            .map_err(MountInputError::Setup)?;

        self.streams = Some(ManagerStreams {
            set_attitude,
            roi,
            setpoint,
            command,
            attitude_status,
            global_position,
            ack,
            manager_status,
            device_information,
            command_out,
        });

        if self.has_v2_gimbal_device {
            // Smart gimbal: ask it for its device information.
            self.request_gimbal_device_information()?;
        } else {
            // Dumb gimbal or v1-only device: synthesize the description.
            self.stream_gimbal_device_information()?;
        }

        crate::log_info!("gimbal manager input ready (smart device: {})", self.has_v2_gimbal_device);
        Ok(())
    }

    fn update(&mut self, timeout: Duration) -> Result<Option<&ControlData>, MountInputError> {
        if self.streams.is_none() {
            return Err(MountInputError::NotInitialized);
        }

        self.stream_gimbal_manager_status();

        let mut changed = false;
        let deadline = Instant::now() + timeout;

        loop {
            let streams = self.streams.as_mut().ok_or(MountInputError::NotInitialized)?;
            let remaining = deadline.saturating_duration_since(Instant::now());
            let woke = self
                .bus
                .wait_any(
                    &[
                        &streams.set_attitude,
                        &streams.roi,
                        &streams.setpoint,
                        &streams.command,
                    ],
                    remaining,
                )
                .map_err(MountInputError::Wait)?;
            if !woke {
                break;
            }

            let mut exit_loop = true;

            // Drain every stream up front; a fixed priority order below
            // decides which result survives the cycle.
            let set_attitude = if streams.set_attitude.updated() {
                streams.set_attitude.copy()
            } else {
                None
            };
            let roi_update = if streams.roi.updated() {
                streams.roi.copy()
            } else {
                None
            };
            let (setpoint, setpoint_updated) = streams.setpoint.drain();
            let setpoint = setpoint.unwrap_or_default();
            let command_update = if streams.command.updated() {
                streams.command.copy()
            } else {
                None
            };
            let carrier = streams.global_position.copy().unwrap_or_default();

            if let Some(set) = set_attitude {
                let quat = UnitQuaternion::from_quaternion(Quaternion::new(
                    set.q[0], set.q[1], set.q[2], set.q[3],
                ));
                let (roll, pitch, yaw) = quat.euler_angles();
                if self.apply_set_attitude(
                    set.flags,
                    roll,
                    pitch,
                    yaw,
                    set.angular_velocity_x,
                    set.angular_velocity_y,
                    set.angular_velocity_z,
                ) {
                    changed = true;
                }
            }

            if let Some(roi) = roi_update {
                let (roi_changed, actionable) = self.handle_roi(&roi, &setpoint, &carrier);
                if roi_changed {
                    changed = true;
                }
                if !actionable {
                    exit_loop = false;
                }
            }

            if setpoint_updated {
                if self.cur_roi_mode == RoiMode::NextWaypoint {
                    self.lonlat.lon = setpoint.current.lon;
                    self.lonlat.lat = setpoint.current.lat;
                    self.lonlat.altitude = setpoint.current.alt;
                    self.transform_lon_lat_to_angle(&carrier);
                    changed = true;
                } else {
                    // Already drained above; nothing to act on.
                    exit_loop = false;
                }
            }

            if let Some(command) = command_update {
                if !self.addressed_to_us(&command) {
                    crate::log_trace!(
                        "skipping command for {}/{}",
                        command.target_system,
                        command.target_component
                    );
                    exit_loop = false;
                } else if command.command == MountCommandKind::DoGimbalManagerAttitude {
                    if self.handle_attitude_command(&command) {
                        changed = true;
                    }
                    self.ack_command(&command);
                } else {
                    exit_loop = false;
                }
            }

            if exit_loop || Instant::now() >= deadline {
                break;
            }
        }

        if changed {
            Ok(Some(&self.control))
        } else {
            Ok(None)
        }
    }

    fn describe(&self) -> &'static str {
        "MAVLink (Gimbal V2)"
    }
}
