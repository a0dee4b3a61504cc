//! Region-of-interest input adapter.
//!
//! Consumes ROI designations and position setpoints and emits the control
//! record as a geographic (`LonLat`) payload; the downstream stage performs
//! the angle conversion. Cross-cycle state is the last-seen ROI mode, so an
//! unrelated setpoint update can refresh a standing waypoint target.

use std::time::Duration;

use crate::bus::{MessageBus, Subscription};
use crate::control::{ControlData, ControlPayload, LonLatControl};
use crate::error::MountInputError;
use crate::messages::{
    PositionSetpointTriplet, RoiMode, VehicleRoi, POSITION_SETPOINT_TRIPLET, VEHICLE_ROI,
};

use super::MountInput;

/// Fixed look-down pitch applied while tracking the next waypoint.
pub(crate) const WPNEXT_PITCH_FIXED: f32 = -0.174_532_92; // -10 degrees

struct RoiStreams {
    roi: Subscription<VehicleRoi>,
    setpoint: Subscription<PositionSetpointTriplet>,
}

/// ROI + position-setpoint input adapter.
pub struct RoiInput {
    bus: MessageBus,
    streams: Option<RoiStreams>,
    control: ControlData,
    /// Persists across payload switches; a waypoint ROI leaves its offsets
    /// behind for later setpoint-driven refreshes.
    lonlat: LonLatControl,
    cur_roi_mode: RoiMode,
}

impl RoiInput {
    pub fn new(bus: &MessageBus) -> Self {
        Self {
            bus: bus.clone(),
            streams: None,
            control: ControlData::default(),
            lonlat: LonLatControl::default(),
            cur_roi_mode: RoiMode::None,
        }
    }
}

impl MountInput for RoiInput {
    fn initialize(&mut self) -> Result<(), MountInputError> {
        let roi = self
            .bus
            .subscribe(&VEHICLE_ROI)
            .map_err(MountInputError::Setup)?;
        let setpoint = self
            .bus
            .subscribe(&POSITION_SETPOINT_TRIPLET)
            .map_err(MountInputError::Setup)?;
        self.streams = Some(RoiStreams { roi, setpoint });
        Ok(())
    }

    fn update(&mut self, timeout: Duration) -> Result<Option<&ControlData>, MountInputError> {
        let streams = self.streams.as_mut().ok_or(MountInputError::NotInitialized)?;

        let woke = self
            .bus
            .wait_any(&[&streams.roi, &streams.setpoint], timeout)
            .map_err(MountInputError::Wait)?;
        if !woke {
            return Ok(None);
        }

        let mut changed = false;

        let roi_update = if streams.roi.updated() {
            streams.roi.copy()
        } else {
            None
        };
        // Latest setpoint, drained in every case so the stream never backs
        // up; the freshness flag comes from the drain itself.
        let (setpoint, setpoint_updated) = streams.setpoint.drain();
        let setpoint = setpoint.unwrap_or_default();

        if let Some(roi) = roi_update {
            self.control.gimbal_shutter_retract = false;

            match roi.mode {
                RoiMode::None => {
                    self.control.payload = ControlPayload::Neutral;
                    changed = true;
                }
                RoiMode::NextWaypoint => {
                    self.lonlat.lon = setpoint.current.lon;
                    self.lonlat.lat = setpoint.current.lat;
                    self.lonlat.altitude = setpoint.current.alt;
                    self.lonlat.pitch_fixed_angle = WPNEXT_PITCH_FIXED;
                    self.lonlat.roll_angle = roi.roll_offset;
                    self.lonlat.pitch_angle_offset = roi.pitch_offset;
                    self.lonlat.yaw_angle_offset = roi.yaw_offset;
                    self.control.payload = ControlPayload::LonLat(self.lonlat);
                    changed = true;
                }
                RoiMode::FixedLocation => {
                    self.lonlat = LonLatControl::at(roi.lon, roi.lat, roi.alt);
                    self.control.payload = ControlPayload::LonLat(self.lonlat);
                    changed = true;
                }
                RoiMode::Target => {
                    // Not implemented; mode is still remembered below.
                }
            }

            self.cur_roi_mode = roi.mode;
        }

        // A fresh setpoint refreshes a standing waypoint target; its output
        // is the final record for cycles that also saw an ROI update.
        if setpoint_updated && self.cur_roi_mode == RoiMode::NextWaypoint {
            self.lonlat.lon = setpoint.current.lon;
            self.lonlat.lat = setpoint.current.lat;
            self.lonlat.altitude = setpoint.current.alt;
            self.control.payload = ControlPayload::LonLat(self.lonlat);
            changed = true;
        }

        if changed {
            Ok(Some(&self.control))
        } else {
            Ok(None)
        }
    }

    fn describe(&self) -> &'static str {
        "MAVLink (ROI)"
    }
}
