//! Integration tests for the gimbal-manager v2 input adapter.

use std::f32::consts::{FRAC_PI_2, PI};
use std::time::Duration;

use approx::assert_relative_eq;
use nalgebra::UnitQuaternion;

use mount_input::input::GimbalManagerInput;
use mount_input::messages::{
    CommandResult, GimbalDeviceAttitudeStatus, GimbalDeviceCapFlags, GimbalDeviceInformation,
    GimbalManagerFlags, GimbalManagerSetAttitude, GimbalManagerStatus, MountCommandKind,
    PositionSetpoint, PositionSetpointTriplet, RoiMode, VehicleCommand, VehicleCommandAck,
    VehicleGlobalPosition, VehicleRoi, GIMBAL_DEVICE_ATTITUDE_STATUS, GIMBAL_DEVICE_INFORMATION,
    GIMBAL_MANAGER_SET_ATTITUDE, GIMBAL_MANAGER_STATUS, POSITION_SETPOINT_TRIPLET, VEHICLE_COMMAND,
    VEHICLE_COMMAND_ACK, VEHICLE_GLOBAL_POSITION, VEHICLE_ROI,
};
use mount_input::{
    ControlFrame, ControlPayload, MessageBus, MountInput, MountParams, Publisher, Subscription,
};

const TIMEOUT: Duration = Duration::from_millis(100);

struct Harness {
    set_attitude: Publisher<GimbalManagerSetAttitude>,
    roi: Publisher<VehicleRoi>,
    setpoint: Publisher<PositionSetpointTriplet>,
    command: Publisher<VehicleCommand>,
    attitude_status: Publisher<GimbalDeviceAttitudeStatus>,
    global_position: Publisher<VehicleGlobalPosition>,
    acks: Subscription<VehicleCommandAck>,
    manager_status: Subscription<GimbalManagerStatus>,
    device_information: Subscription<GimbalDeviceInformation>,
    commands_seen: Subscription<VehicleCommand>,
}

impl Harness {
    fn new(has_v2_gimbal_device: bool) -> (Self, GimbalManagerInput) {
        let bus = MessageBus::new();
        let harness = Self {
            set_attitude: bus.advertise(&GIMBAL_MANAGER_SET_ATTITUDE).unwrap(),
            roi: bus.advertise(&VEHICLE_ROI).unwrap(),
            setpoint: bus.advertise(&POSITION_SETPOINT_TRIPLET).unwrap(),
            command: bus.advertise(&VEHICLE_COMMAND).unwrap(),
            attitude_status: bus.advertise(&GIMBAL_DEVICE_ATTITUDE_STATUS).unwrap(),
            global_position: bus.advertise(&VEHICLE_GLOBAL_POSITION).unwrap(),
            acks: bus.subscribe(&VEHICLE_COMMAND_ACK).unwrap(),
            manager_status: bus.subscribe(&GIMBAL_MANAGER_STATUS).unwrap(),
            device_information: bus.subscribe(&GIMBAL_DEVICE_INFORMATION).unwrap(),
            commands_seen: bus.subscribe(&VEHICLE_COMMAND).unwrap(),
        };
        let mut input = GimbalManagerInput::new(
            &bus,
            MountParams {
                mav_sys_id: 1,
                mav_comp_id: 1,
            },
            has_v2_gimbal_device,
        );
        input.initialize().unwrap();
        (harness, input)
    }

    fn publish_carrier(&self, lat: f64, lon: f64, alt: f32, yaw: f32) {
        self.global_position
            .publish(VehicleGlobalPosition { lat, lon, alt, yaw })
            .unwrap();
    }

    fn publish_fixed_roi(&self, lat: f64, lon: f64, alt: f32) {
        self.roi
            .publish(VehicleRoi {
                mode: RoiMode::FixedLocation,
                lat,
                lon,
                alt,
                ..Default::default()
            })
            .unwrap();
    }

    fn publish_set_attitude(&self, flags: GimbalManagerFlags, yaw: f32) {
        let q = UnitQuaternion::from_euler_angles(0.0, 0.0, yaw);
        self.set_attitude
            .publish(GimbalManagerSetAttitude {
                flags,
                q: [q.w, q.i, q.j, q.k],
                ..Default::default()
            })
            .unwrap();
    }
}

fn angle_payload(payload: &ControlPayload) -> &mount_input::AngleControl {
    match payload {
        ControlPayload::Angle(angle) => angle,
        other => panic!("expected Angle payload, got {:?}", other),
    }
}

#[test]
fn test_dumb_device_gets_synthesized_information() {
    let (mut harness, _input) = Harness::new(false);

    let info = harness.device_information.copy().expect("device info");
    assert_eq!(info.vendor_name, "generic");
    assert_eq!(info.model_name, "AUX gimbal");
    assert!(info.capability_flags.contains(GimbalDeviceCapFlags::HAS_NEUTRAL));
    assert!(info.capability_flags.contains(GimbalDeviceCapFlags::HAS_YAW_LOCK));
    assert!(!info.capability_flags.contains(GimbalDeviceCapFlags::HAS_RETRACT));
    assert_relative_eq!(info.tilt_max, FRAC_PI_2);
    assert_relative_eq!(info.tilt_min, -FRAC_PI_2);
    assert_relative_eq!(info.pan_max, PI);
    assert_relative_eq!(info.pan_min, -PI);
}

#[test]
fn test_smart_device_is_asked_for_information() {
    let (mut harness, _input) = Harness::new(true);

    let request = harness.commands_seen.copy().expect("request");
    assert_eq!(request.command, MountCommandKind::RequestMessage);
    assert_relative_eq!(request.param1, 283.0);
    assert_eq!(request.target_system, 0);
    assert_eq!(request.target_component, 0);
    assert_eq!(request.source_system, 1);
    assert_eq!(request.source_component, 1);
    // No synthesized description in this mode.
    assert!(harness.device_information.copy().is_none());
}

#[test]
fn test_manager_status_published_every_cycle() {
    let (mut harness, mut input) = Harness::new(false);

    // Quiet cycle: still a status, with no device flags yet.
    assert!(input.update(Duration::from_millis(10)).unwrap().is_none());
    let status = harness.manager_status.copy().expect("status");
    assert_eq!(status.flags, 0);
    assert_eq!(status.gimbal_device_id, 0);

    // The device flags are mirrored into the next status.
    harness
        .attitude_status
        .publish(GimbalDeviceAttitudeStatus { device_flags: 33 })
        .unwrap();
    let _ = input.update(Duration::from_millis(10)).unwrap();
    let status = harness.manager_status.copy().expect("status");
    assert_eq!(status.flags, 33);
}

#[test]
fn test_fixed_location_roi_points_at_target() {
    let (harness, mut input) = Harness::new(false);
    harness.publish_carrier(0.0, 0.0, 100.0, 0.0);
    // Target due east at the same altitude.
    harness.publish_fixed_roi(0.0, 0.001, 100.0);

    let control = input.update(TIMEOUT).unwrap().expect("record");
    let angle = angle_payload(&control.payload);
    assert_relative_eq!(angle.angles[2], FRAC_PI_2, epsilon = 1e-4);
    assert_relative_eq!(angle.angles[1], 0.0, epsilon = 1e-4);
    assert_relative_eq!(angle.angles[0], 0.0);
    assert!(!control.gimbal_shutter_retract);
}

#[test]
fn test_fixed_location_reuses_cached_waypoint_bias() {
    let (harness, mut input) = Harness::new(false);
    harness.publish_carrier(0.0, 0.0, 100.0, 0.0);
    // A waypoint ROI leaves the -10 degree fixed pitch and its pitch offset
    // in the target cache.
    harness
        .setpoint
        .publish(PositionSetpointTriplet {
            current: PositionSetpoint {
                lat: 0.0,
                lon: 0.001,
                alt: 100.0,
            },
            ..Default::default()
        })
        .unwrap();
    harness
        .roi
        .publish(VehicleRoi {
            mode: RoiMode::NextWaypoint,
            pitch_offset: 0.2,
            ..Default::default()
        })
        .unwrap();
    let control = input.update(TIMEOUT).unwrap().expect("record");
    let angle = angle_payload(&control.payload);
    assert_relative_eq!(
        angle.angles[1],
        (-10.0f32).to_radians() + 0.2,
        epsilon = 1e-5
    );

    // A fixed-location ROI at the carrier's altitude would be level, but
    // only the position fields are replaced: the cached fixed pitch and
    // offset leak into the output.
    harness.publish_fixed_roi(0.0, -0.001, 100.0);
    let control = input.update(TIMEOUT).unwrap().expect("record");
    let angle = angle_payload(&control.payload);
    assert_relative_eq!(
        angle.angles[1],
        (-10.0f32).to_radians() + 0.2,
        epsilon = 1e-5
    );
    assert_relative_eq!(angle.angles[2], -FRAC_PI_2, epsilon = 1e-4);
}

#[test]
fn test_roi_none_clears_target_and_goes_neutral() {
    let (harness, mut input) = Harness::new(false);
    harness.publish_carrier(0.0, 0.0, 100.0, 0.0);
    harness.publish_fixed_roi(0.0, 0.001, 100.0);
    let _ = input.update(TIMEOUT).unwrap().expect("record");

    harness
        .roi
        .publish(VehicleRoi {
            mode: RoiMode::None,
            ..Default::default()
        })
        .unwrap();
    let control = input.update(TIMEOUT).unwrap().expect("record");
    assert_eq!(control.payload, ControlPayload::Neutral);

    // Without a standing target a nudge is a plain set.
    harness.publish_set_attitude(GimbalManagerFlags::NUDGE, 0.3);
    let control = input.update(TIMEOUT).unwrap().expect("record");
    let angle = angle_payload(&control.payload);
    assert_relative_eq!(angle.angles[2], 0.3, epsilon = 1e-5);
}

#[test]
fn test_nudge_accumulates_on_standing_target() {
    let (harness, mut input) = Harness::new(false);
    // Target at the carrier's own position: baseline angles are all zero.
    harness.publish_carrier(0.0, 0.0, 100.0, 0.0);
    harness.publish_fixed_roi(0.0, 0.0, 100.0);
    let _ = input.update(TIMEOUT).unwrap().expect("record");

    harness.publish_set_attitude(GimbalManagerFlags::NUDGE, 0.3);
    let control = input.update(TIMEOUT).unwrap().expect("record");
    let angle = angle_payload(&control.payload);
    assert_relative_eq!(angle.angles[2], 0.3, epsilon = 1e-5);

    // Nudges stack on the adjusted angle, not the original target.
    harness.publish_set_attitude(GimbalManagerFlags::NUDGE, 0.2);
    let control = input.update(TIMEOUT).unwrap().expect("record");
    let angle = angle_payload(&control.payload);
    assert_relative_eq!(angle.angles[2], 0.5, epsilon = 1e-5);
    assert_eq!(angle.frames, [ControlFrame::BodyRelativeAngle; 3]);
}

#[test]
fn test_override_replaces_rather_than_accumulates() {
    let (harness, mut input) = Harness::new(false);
    harness.publish_carrier(0.0, 0.0, 100.0, 0.0);
    harness.publish_fixed_roi(0.0, 0.001, 100.0); // yaw PI/2 baseline
    let _ = input.update(TIMEOUT).unwrap().expect("record");

    harness.publish_set_attitude(
        GimbalManagerFlags::NUDGE | GimbalManagerFlags::OVERRIDE,
        -0.4,
    );
    let control = input.update(TIMEOUT).unwrap().expect("record");
    let angle = angle_payload(&control.payload);
    assert_relative_eq!(angle.angles[2], -0.4, epsilon = 1e-5);
}

#[test]
fn test_override_skips_roi_offsets() {
    let (harness, mut input) = Harness::new(false);
    harness.publish_carrier(0.0, 0.0, 100.0, 0.0);
    harness
        .setpoint
        .publish(PositionSetpointTriplet {
            current: PositionSetpoint {
                lat: 0.0,
                lon: 0.001,
                alt: 100.0,
            },
            ..Default::default()
        })
        .unwrap();
    harness
        .roi
        .publish(VehicleRoi {
            mode: RoiMode::NextWaypoint,
            yaw_offset: 0.2,
            ..Default::default()
        })
        .unwrap();

    // The ROI path folds the yaw offset into its output.
    let control = input.update(TIMEOUT).unwrap().expect("record");
    let angle = angle_payload(&control.payload);
    assert_relative_eq!(angle.angles[2], FRAC_PI_2 + 0.2, epsilon = 1e-4);

    // An override ignores the standing offsets: the replacement angle is
    // used exactly as sent. Known asymmetry with the ROI path.
    harness.publish_set_attitude(GimbalManagerFlags::OVERRIDE, 0.1);
    let control = input.update(TIMEOUT).unwrap().expect("record");
    let angle = angle_payload(&control.payload);
    assert_relative_eq!(angle.angles[2], 0.1, epsilon = 1e-5);
}

#[test]
fn test_rates_switch_frames_and_locks_force_absolute() {
    let (harness, mut input) = Harness::new(false);
    let q = UnitQuaternion::from_euler_angles(0.0f32, 0.0, 0.0);
    harness
        .set_attitude
        .publish(GimbalManagerSetAttitude {
            flags: GimbalManagerFlags::YAW_LOCK,
            q: [q.w, q.i, q.j, q.k],
            angular_velocity_x: f32::NAN,
            angular_velocity_y: 0.2,
            angular_velocity_z: 0.5,
        })
        .unwrap();

    let control = input.update(TIMEOUT).unwrap().expect("record");
    let angle = angle_payload(&control.payload);
    assert_eq!(angle.frames[0], ControlFrame::BodyRelativeAngle);
    assert_eq!(angle.frames[1], ControlFrame::AngularRate);
    assert_relative_eq!(angle.angles[1], 0.2);
    // The lock overrides the rate frame but keeps the rate value.
    assert_eq!(angle.frames[2], ControlFrame::AbsoluteAngle);
    assert_relative_eq!(angle.angles[2], 0.5);
}

#[test]
fn test_neutral_flag_emits_neutral() {
    let (harness, mut input) = Harness::new(false);
    harness.publish_set_attitude(GimbalManagerFlags::NEUTRAL, 0.7);

    let control = input.update(TIMEOUT).unwrap().expect("record");
    assert_eq!(control.payload, ControlPayload::Neutral);
}

#[test]
fn test_none_and_retract_flags_are_no_change() {
    let (harness, mut input) = Harness::new(false);
    harness.publish_set_attitude(GimbalManagerFlags::NONE, 0.7);
    assert!(input.update(TIMEOUT).unwrap().is_none());

    harness.publish_set_attitude(GimbalManagerFlags::RETRACT, 0.7);
    assert!(input.update(TIMEOUT).unwrap().is_none());
}

#[test]
fn test_attitude_command_is_applied_and_acked() {
    let (mut harness, mut input) = Harness::new(false);
    harness
        .command
        .publish(VehicleCommand {
            command: MountCommandKind::DoGimbalManagerAttitude,
            param1: 0.4,  // pitch
            param2: -0.2, // yaw
            param3: f32::NAN,
            param4: f32::NAN,
            param5: 0.0, // flags
            target_system: 0, // broadcast reaches this manager
            target_component: 0,
            source_system: 42,
            source_component: 7,
            ..Default::default()
        })
        .unwrap();

    let control = input.update(TIMEOUT).unwrap().expect("record");
    let angle = angle_payload(&control.payload);
    assert_relative_eq!(angle.angles[0], 0.0);
    assert_relative_eq!(angle.angles[1], 0.4);
    assert_relative_eq!(angle.angles[2], -0.2);
    assert_eq!(angle.frames, [ControlFrame::BodyRelativeAngle; 3]);

    let ack = harness.acks.copy().expect("ack");
    assert_eq!(ack.command, MountCommandKind::DoGimbalManagerAttitude);
    assert_eq!(ack.result, CommandResult::Accepted);
    assert_eq!(ack.target_system, 42);
    assert_eq!(ack.target_component, 7);
}

#[test]
fn test_command_for_other_system_is_skipped() {
    let (mut harness, mut input) = Harness::new(false);
    harness
        .command
        .publish(VehicleCommand {
            command: MountCommandKind::DoGimbalManagerAttitude,
            param1: 0.4,
            target_system: 9,
            target_component: 1,
            ..Default::default()
        })
        .unwrap();

    assert!(input.update(Duration::from_millis(30)).unwrap().is_none());
    assert!(harness.acks.copy().is_none());
}

#[test]
fn test_waypoint_roi_uses_fixed_look_down_pitch() {
    let (harness, mut input) = Harness::new(false);
    harness.publish_carrier(0.0, 0.0, 100.0, 0.0);
    // Waypoint far above the carrier; geometry would pitch up, but the
    // waypoint mode pins the pitch at -10 degrees.
    harness
        .setpoint
        .publish(PositionSetpointTriplet {
            current: PositionSetpoint {
                lat: 0.0,
                lon: 0.001,
                alt: 500.0,
            },
            ..Default::default()
        })
        .unwrap();
    harness
        .roi
        .publish(VehicleRoi {
            mode: RoiMode::NextWaypoint,
            ..Default::default()
        })
        .unwrap();

    let control = input.update(TIMEOUT).unwrap().expect("record");
    let angle = angle_payload(&control.payload);
    assert_relative_eq!(angle.angles[1], (-10.0f32).to_radians(), epsilon = 1e-5);
    assert_relative_eq!(angle.angles[2], FRAC_PI_2, epsilon = 1e-4);
}

#[test]
fn test_setpoint_refresh_recomputes_waypoint_angles() {
    let (harness, mut input) = Harness::new(false);
    harness.publish_carrier(0.0, 0.0, 100.0, 0.0);
    harness
        .setpoint
        .publish(PositionSetpointTriplet {
            current: PositionSetpoint {
                lat: 0.0,
                lon: 0.001,
                alt: 100.0,
            },
            ..Default::default()
        })
        .unwrap();
    harness
        .roi
        .publish(VehicleRoi {
            mode: RoiMode::NextWaypoint,
            ..Default::default()
        })
        .unwrap();
    let _ = input.update(TIMEOUT).unwrap().expect("record");

    // The mission advances to a waypoint due west; the standing waypoint
    // target follows without a new ROI message.
    harness
        .setpoint
        .publish(PositionSetpointTriplet {
            current: PositionSetpoint {
                lat: 0.0,
                lon: -0.001,
                alt: 100.0,
            },
            ..Default::default()
        })
        .unwrap();
    let control = input.update(TIMEOUT).unwrap().expect("record");
    let angle = angle_payload(&control.payload);
    assert_relative_eq!(angle.angles[2], -FRAC_PI_2, epsilon = 1e-4);
}

#[test]
fn test_timeout_returns_no_change() {
    let (_harness, mut input) = Harness::new(false);
    assert!(input.update(Duration::from_millis(20)).unwrap().is_none());
}

#[test]
fn test_describe_names_the_protocol() {
    let bus = MessageBus::new();
    let input = GimbalManagerInput::new(&bus, MountParams::default(), false);
    assert_eq!(input.describe(), "MAVLink (Gimbal V2)");
}
