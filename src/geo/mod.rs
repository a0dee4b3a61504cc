//! Geodetic pointing math.
//!
//! Converts a geographic target plus the carrier's global position into
//! mount pitch/yaw angles:
//!
//! - yaw = initial great-circle bearing to the target minus carrier heading
//! - pitch = elevation angle from planar distance (azimuthal equidistant
//!   projection) and altitude difference
//!
//! All angles are radians; coordinates are WGS84-equivalent degrees.

use std::f32::consts::PI;

use crate::control::LonLatControl;
use crate::messages::VehicleGlobalPosition;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Wrap an angle in radians to `(-PI, PI]`.
///
/// Non-finite input is returned unchanged.
pub fn wrap_pi(angle: f32) -> f32 {
    if !angle.is_finite() {
        return angle;
    }
    let mut wrapped = angle;
    while wrapped > PI {
        wrapped -= 2.0 * PI;
    }
    while wrapped <= -PI {
        wrapped += 2.0 * PI;
    }
    wrapped
}

/// Initial great-circle bearing from `(lat_now, lon_now)` toward
/// `(lat_next, lon_next)`, in radians wrapped to `(-PI, PI]`.
/// Inputs are degrees.
pub fn bearing_to(lat_now: f64, lon_now: f64, lat_next: f64, lon_next: f64) -> f32 {
    let dlon = (lon_next - lon_now).to_radians();
    let lat_now = lat_now.to_radians();
    let lat_next = lat_next.to_radians();

    let y = dlon.sin() * lat_next.cos();
    let x = lat_now.cos() * lat_next.sin() - lat_now.sin() * lat_next.cos() * dlon.cos();

    wrap_pi(y.atan2(x) as f32)
}

/// Azimuthal equidistant projection anchored at a reference coordinate.
pub struct AzimuthalProjection {
    ref_lat_sin: f64,
    ref_lat_cos: f64,
    ref_lon: f64,
}

impl AzimuthalProjection {
    /// Anchor the projection at `(lat, lon)` degrees.
    pub fn new(lat: f64, lon: f64) -> Self {
        let lat_rad = lat.to_radians();
        Self {
            ref_lat_sin: lat_rad.sin(),
            ref_lat_cos: lat_rad.cos(),
            ref_lon: lon.to_radians(),
        }
    }

    /// Project `(lat, lon)` degrees into local tangent-plane meters,
    /// returned as `(north, east)`.
    pub fn project(&self, lat: f64, lon: f64) -> (f32, f32) {
        let lat_rad = lat.to_radians();
        let dlon = lon.to_radians() - self.ref_lon;
        let sin_lat = lat_rad.sin();
        let cos_lat = lat_rad.cos();

        let cos_c = self.ref_lat_sin * sin_lat + self.ref_lat_cos * cos_lat * dlon.cos();
        let c = cos_c.clamp(-1.0, 1.0).acos();
        let k = if c.abs() > f64::EPSILON { c / c.sin() } else { 1.0 };

        let north = k * (self.ref_lat_cos * sin_lat - self.ref_lat_sin * cos_lat * dlon.cos())
            * EARTH_RADIUS_M;
        let east = k * (cos_lat * dlon.sin()) * EARTH_RADIUS_M;
        (north as f32, east as f32)
    }
}

/// Turns a geographic target into mount pitch/yaw angles.
///
/// The projection is anchored at the first carrier position the solver
/// sees and reused for its whole lifetime, so successive pitch computations
/// stay numerically consistent. One solver lives inside each adapter that
/// performs geographic pointing.
#[derive(Default)]
pub struct PointingSolver {
    projection: Option<AzimuthalProjection>,
}

impl PointingSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute `(pitch, yaw)` pointing the mount at `target` from
    /// `carrier`, with the fixed-pitch override and the additive offsets
    /// applied. Yaw is wrapped to `(-PI, PI]` last.
    pub fn angles_to_target(
        &mut self,
        target: &LonLatControl,
        carrier: &VehicleGlobalPosition,
    ) -> (f32, f32) {
        // A fixed pitch at or above -PI is used verbatim; otherwise the
        // target altitude drives the elevation angle.
        let pitch = if target.pitch_fixed_angle >= -PI {
            target.pitch_fixed_angle
        } else {
            self.calculate_pitch(target.lon, target.lat, target.altitude, carrier)
        };

        let yaw = bearing_to(carrier.lat, carrier.lon, target.lat, target.lon) - carrier.yaw;

        let pitch = pitch + target.pitch_angle_offset;
        let yaw = wrap_pi(yaw + target.yaw_angle_offset);
        (pitch, yaw)
    }

    fn calculate_pitch(
        &mut self,
        lon: f64,
        lat: f64,
        altitude: f32,
        carrier: &VehicleGlobalPosition,
    ) -> f32 {
        let projection = self
            .projection
            .get_or_insert_with(|| AzimuthalProjection::new(carrier.lat, carrier.lon));

        let (tn, te) = projection.project(lat, lon);
        let (cn, ce) = projection.project(carrier.lat, carrier.lon);
        let dn = tn - cn;
        let de = te - ce;
        let distance = (dn * dn + de * de).sqrt();
        let z = altitude - carrier.alt;

        z.atan2(distance)
    }
}
