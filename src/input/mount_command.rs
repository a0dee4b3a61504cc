//! Legacy mount-command input adapter.
//!
//! Polls the discrete vehicle-command stream for `DO_MOUNT_CONTROL` and
//! `DO_MOUNT_CONFIGURE`, filtering on the configured identity. Commands for
//! other recipients are skipped silently and polling continues within the
//! caller's timeout budget; every dispatched mount command is acknowledged
//! back to its sender.

use std::f32::consts::PI;
use std::time::{Duration, Instant};

use crate::bus::{MessageBus, Publisher, Subscription};
use crate::control::{
    AngleControl, ControlData, ControlFrame, ControlPayload, LonLatControl, AXIS_PITCH, AXIS_ROLL,
    AXIS_YAW,
};
use crate::error::MountInputError;
use crate::messages::{
    CommandResult, MountCommandKind, MountMode, VehicleCommand, VehicleCommandAck, VEHICLE_COMMAND,
    VEHICLE_COMMAND_ACK,
};

use super::{MountInput, MountParams, BROADCAST_COMPONENT, COMMAND_MIN_INTERVAL};

struct CommandStreams {
    command: Subscription<VehicleCommand>,
    ack: Publisher<VehicleCommandAck>,
}

/// Legacy `DO_MOUNT_*` command input adapter.
pub struct MountCommandInput {
    bus: MessageBus,
    params: MountParams,
    streams: Option<CommandStreams>,
    control: ControlData,
    /// Frame selection from the last `DO_MOUNT_CONFIGURE`; retained for
    /// consumers that build angle demands outside this protocol.
    configured_frames: [ControlFrame; 3],
}

impl MountCommandInput {
    pub fn new(bus: &MessageBus, params: MountParams) -> Self {
        Self {
            bus: bus.clone(),
            params,
            streams: None,
            control: ControlData::default(),
            configured_frames: [ControlFrame::BodyRelativeAngle; 3],
        }
    }

    /// Whether the command is addressed to this identity. The broadcast
    /// component id reaches every component on the system.
    fn addressed_to_us(&self, command: &VehicleCommand) -> bool {
        let sysid_correct = command.target_system == self.params.mav_sys_id;
        let compid_correct = command.target_component == self.params.mav_comp_id
            || command.target_component == BROADCAST_COMPONENT;
        sysid_correct && compid_correct
    }

    /// Handle `DO_MOUNT_CONTROL`. Returns whether the control record was
    /// rewritten.
    fn handle_mount_control(&mut self, command: &VehicleCommand) -> bool {
        let Some(mode) = MountMode::from_param(command.param7) else {
            crate::log_warn!("unknown DO_MOUNT_CONTROL sub-mode: {}", command.param7);
            return false;
        };

        match mode {
            MountMode::Retract | MountMode::Neutral => {
                self.control.gimbal_shutter_retract = mode == MountMode::Retract;
                self.control.payload = ControlPayload::Neutral;
                true
            }
            MountMode::MavlinkTargeting => {
                let mut angle = AngleControl::default();
                // The mount convention has roll on channel 0 where the wire
                // format has pitch there, and vice versa; both are degrees.
                angle.angles[AXIS_ROLL] = command.param2.to_radians();
                angle.angles[AXIS_PITCH] = command.param1.to_radians();
                angle.angles[AXIS_YAW] = command.param3.to_radians();

                // We expect yaw in (-PI, PI]. If the input convention is
                // [0, 2*PI) we can fix that.
                if angle.angles[AXIS_YAW] > PI {
                    angle.angles[AXIS_YAW] -= 2.0 * PI;
                }

                self.control.payload = ControlPayload::Angle(angle);
                true
            }
            MountMode::RcTargeting => false,
            MountMode::GpsPoint => {
                self.control.payload = ControlPayload::LonLat(LonLatControl::at(
                    command.param6,
                    command.param5,
                    command.param4,
                ));
                true
            }
        }
    }

    /// Handle `DO_MOUNT_CONFIGURE`: stabilization flags and per-axis frame
    /// selection; the output always switches to neutral.
    fn handle_mount_configure(&mut self, command: &VehicleCommand) {
        self.control.stabilize_axis[AXIS_ROLL] = (command.param2 + 0.5) as i32 == 1;
        self.control.stabilize_axis[AXIS_PITCH] = (command.param3 + 0.5) as i32 == 1;
        self.control.stabilize_axis[AXIS_YAW] = (command.param4 + 0.5) as i32 == 1;

        let selectors = [
            (command.param5 + 0.5) as i32,
            (command.param6 + 0.5) as i32,
            (command.param7 + 0.5) as i32,
        ];
        for (frame, selector) in self.configured_frames.iter_mut().zip(selectors) {
            *frame = match selector {
                0 => ControlFrame::BodyRelativeAngle,
                1 => ControlFrame::AngularRate,
                2 => ControlFrame::AbsoluteAngle,
                // Not supported, fall back to a body-relative angle.
                _ => ControlFrame::BodyRelativeAngle,
            };
        }

        self.control.payload = ControlPayload::Neutral;
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

impl MountInput for MountCommandInput {
    fn initialize(&mut self) -> Result<(), MountInputError> {
        let mut command = self
            .bus
            .subscribe(&VEHICLE_COMMAND)
            .map_err(MountInputError::Setup)?;
        // Rate-limit the command stream so our own acknowledgements (and a
        // command-mode output stage) cannot re-trigger immediate wake-ups
        // and spin the polling loop.
        command.set_min_interval(COMMAND_MIN_INTERVAL);

        let ack = self
            .bus
            .advertise(&VEHICLE_COMMAND_ACK)
            .map_err(MountInputError::Setup)?;

        self.streams = Some(CommandStreams { command, ack });
        Ok(())
    }

    fn update(&mut self, timeout: Duration) -> Result<Option<&ControlData>, MountInputError> {
        if self.streams.is_none() {
            return Err(MountInputError::NotInitialized);
        }

        let mut changed = false;
        let deadline = Instant::now() + timeout;

        // Keep polling until a command for us produces a decision or the
        // timeout budget is spent; skipped traffic only consumes the time
        // it took to wait for it.
        loop {
            let streams = self.streams.as_mut().ok_or(MountInputError::NotInitialized)?;
            let remaining = deadline.saturating_duration_since(Instant::now());
            let woke = self
                .bus
                .wait_any(&[&streams.command], remaining)
                .map_err(MountInputError::Wait)?;
            if !woke {
                break;
            }

            let mut exit_loop = true;

            if streams.command.updated() {
                if let Some(command) = streams.command.copy() {
                    if !self.addressed_to_us(&command) {
                        crate::log_trace!(
                            "skipping command for {}/{}",
                            command.target_system,
                            command.target_component
                        );
                        exit_loop = false;
                    } else {
                        self.control.gimbal_shutter_retract = false;

                        match command.command {
                            MountCommandKind::DoMountControl => {
                                changed = self.handle_mount_control(&command);
                                self.ack_command(&command);
                            }
                            MountCommandKind::DoMountConfigure => {
                                self.handle_mount_configure(&command);
                                changed = true;
                                self.ack_command(&command);
                            }
                            _ => {
                                exit_loop = false;
                            }
                        }
                    }
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
        "MAVLink (CMD_MOUNT)"
    }
}
