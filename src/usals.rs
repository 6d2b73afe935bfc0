//! USALS geometry: observer position + orbital slot → rotor angle.
//!
//! The dish sits on a polar mount, so a single rotation about the polar axis
//! selects a satellite on the geostationary arc. The angle is sent to the
//! positioner as a signed count of sixteenths of a degree:
//!
//! ```text
//! byte 1: SIGN | steps[11:8]     SIGN = 0xD0 (angle > 0) or 0xE0 (angle <= 0)
//! byte 2: steps[7:0]
//! ```

use std::fmt;

use crate::error::{CommandError, Result};

/// Equatorial Earth radius (km).
pub const EARTH_RADIUS_KM: f64 = 6378.14;
/// Geostationary orbit radius from Earth's centre (km).
pub const ORBIT_RADIUS_KM: f64 = 42164.57;

/// Angle resolution of the positioner.
pub const STEPS_PER_DEGREE: f64 = 16.0;
/// Largest step count the byte pair can carry (12 bits).
pub const MAX_STEPS: u16 = 0x0FFF;

/// Direction nibble for positive angles.
pub const SIGN_POSITIVE: u8 = 0xD0;
/// Direction nibble for zero and negative angles.
pub const SIGN_NEGATIVE: u8 = 0xE0;

/// Observer position in degrees. Negative latitude is South, negative
/// longitude is West.
///
/// Values are not range-checked: latitude is expected in `[-90, 90]` and
/// longitude in `[-180, 180]`, and keeping them there is the caller's job.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Site {
    pub latitude: f64,
    pub longitude: f64,
}

impl Site {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_southern(&self) -> bool {
        self.latitude < 0.0
    }

    /// `'N'` or `'S'`.
    pub fn hemisphere(&self) -> char {
        if self.is_southern() { 'S' } else { 'N' }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2}° ({}), {:.2}°",
            self.latitude,
            self.hemisphere(),
            self.longitude
        )
    }
}

/// Result of a USALS computation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UsalsSolution {
    /// Signed rotor angle in degrees, hemisphere correction applied.
    pub motor_angle: f64,
    /// Dish declination in degrees. Informational only.
    pub declination: f64,
    /// Encoded angle bytes for the goto-angle command.
    pub bytes: [u8; 2],
}

impl UsalsSolution {
    /// Step count carried in `bytes`.
    pub fn steps(&self) -> u16 {
        steps_of(self.bytes)
    }
}

/// Compute the rotor angle, declination and encoded bytes for pointing a dish
/// at `site` to the satellite at orbital longitude `sat_long`.
///
/// Fails only on non-finite input; finite input always yields `|angle| <= 90`.
pub fn compute_usals(site: Site, sat_long: f64) -> Result<UsalsSolution> {
    check_finite("site latitude", site.latitude)?;
    check_finite("site longitude", site.longitude)?;
    check_finite("satellite longitude", sat_long)?;

    let angle = motor_angle(site, sat_long);
    let solution = UsalsSolution {
        motor_angle: angle,
        declination: declination(site.latitude),
        bytes: encode_angle(angle)?,
    };

    tracing::info!(
        "Lat: {:.2}° ({}), Long: {:.2}°, Sat Long: {:.2}°, Motor Angle: {:.2}°, Declination: {:.2}°",
        site.latitude,
        site.hemisphere(),
        site.longitude,
        sat_long,
        solution.motor_angle,
        solution.declination,
    );
    tracing::info!("RotorCmd: {:02x} {:02x}", solution.bytes[0], solution.bytes[1]);

    Ok(solution)
}

/// Dish declination for an observer at `latitude` degrees.
pub fn declination(latitude: f64) -> f64 {
    let lat = latitude.to_radians();
    let num = EARTH_RADIUS_KM * lat.sin();
    let den = (ORBIT_RADIUS_KM - EARTH_RADIUS_KM) + EARTH_RADIUS_KM * (1.0 - lat.cos());
    (num / den).atan().to_degrees()
}

/// Rotor angle with the Southern Hemisphere sign correction applied.
///
/// South of the equator the polar axis is seen from the other side, so the
/// raw geometric angle must be inverted before encoding.
pub fn motor_angle(site: Site, sat_long: f64) -> f64 {
    let raw = pointing_angle(site, sat_long);
    if site.is_southern() { -raw } else { raw }
}

/// Raw geometric angle between the dish meridian and the satellite, before
/// hemisphere correction.
pub fn pointing_angle(site: Site, sat_long: f64) -> f64 {
    let lat = site.latitude.to_radians();
    let delta = site.longitude.to_radians() - sat_long.to_radians();

    let dish = [EARTH_RADIUS_KM * lat.cos(), 0.0, EARTH_RADIUS_KM * lat.sin()];
    let sat = [ORBIT_RADIUS_KM * delta.cos(), ORBIT_RADIUS_KM * delta.sin(), 0.0];
    let pointing = [sat[0] - dish[0], sat[1] - dish[1], sat[2] - dish[2]];

    angle_from_pointing(pointing[0], pointing[1])
}

/// `atan(y / x)` in degrees, with the `x == 0` singularity resolved to ±90°.
fn angle_from_pointing(x: f64, y: f64) -> f64 {
    if x == 0.0 {
        return if y > 0.0 {
            90.0
        } else if y < 0.0 {
            -90.0
        } else {
            0.0
        };
    }
    (y / x).atan().to_degrees()
}

/// Encode a signed angle as the USALS byte pair.
///
/// Magnitudes beyond [`MAX_STEPS`] sixteenths are rejected rather than
/// truncated.
pub fn encode_angle(angle: f64) -> Result<[u8; 2]> {
    check_finite("motor angle", angle)?;
    let steps = (angle.abs() * STEPS_PER_DEGREE).round();
    if steps > f64::from(MAX_STEPS) {
        return Err(CommandError::ValueOutOfRange {
            what: "USALS step count",
            value: steps as i64,
            min: 0,
            max: i64::from(MAX_STEPS),
        });
    }
    let steps = steps as u16;
    let sign = if angle > 0.0 { SIGN_POSITIVE } else { SIGN_NEGATIVE };
    Ok([sign | (steps >> 8) as u8, (steps & 0xFF) as u8])
}

/// Decode a USALS byte pair back to signed degrees (quantized to 1/16°).
pub fn decode_angle(bytes: [u8; 2]) -> Result<f64> {
    let magnitude = f64::from(steps_of(bytes)) / STEPS_PER_DEGREE;
    match bytes[0] & 0xF0 {
        SIGN_POSITIVE => Ok(magnitude),
        SIGN_NEGATIVE => Ok(-magnitude),
        _ => Err(CommandError::ValueOutOfRange {
            what: "USALS direction byte",
            value: i64::from(bytes[0]),
            min: i64::from(SIGN_POSITIVE),
            max: i64::from(SIGN_NEGATIVE | 0x0F),
        }),
    }
}

fn steps_of(bytes: [u8; 2]) -> u16 {
    (u16::from(bytes[0] & 0x0F) << 8) | u16::from(bytes[1])
}

fn check_finite(what: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CommandError::NonFiniteAngle { what })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn madrid_to_astra_19_2e() {
        let sol = compute_usals(Site::new(40.0, -3.0), 19.2).unwrap();
        assert_close(sol.motor_angle, -25.0078, 1e-3);
        assert_close(sol.declination, 6.2760, 1e-3);
        assert_eq!(sol.bytes, [0xE1, 0x90]);
        assert_eq!(sol.steps(), 400);
    }

    #[test]
    fn london_to_28_2e() {
        let sol = compute_usals(Site::new(51.5, -0.1), -28.2).unwrap();
        assert_close(sol.motor_angle, 30.8693, 1e-3);
        assert_eq!(sol.bytes, [0xD1, 0xEE]);
    }

    #[test]
    fn southern_hemisphere_inverts_sign() {
        let site = Site::new(-33.9, 18.4);
        let raw = pointing_angle(site, 30.5);
        let corrected = motor_angle(site, 30.5);
        assert_close(raw, -13.8185, 1e-3);
        assert_eq!(corrected, -raw);

        let sol = compute_usals(site, 30.5).unwrap();
        assert_eq!(sol.bytes, [0xD0, 0xDD]);
        assert_close(sol.declination, -5.5110, 1e-3);
    }

    #[test]
    fn hemisphere_sign_property() {
        for sat in [-60.0, -30.0, -5.0, 5.0, 30.0, 60.0] {
            for lat in [0.5, 10.0, 45.0, 89.0] {
                let north = Site::new(lat, 0.0);
                let south = Site::new(-lat, 0.0);
                let raw_n = pointing_angle(north, sat);
                let raw_s = pointing_angle(south, sat);

                // North: byte sign follows the raw geometry.
                let bytes = encode_angle(motor_angle(north, sat)).unwrap();
                let expect = if raw_n > 0.0 { SIGN_POSITIVE } else { SIGN_NEGATIVE };
                assert_eq!(bytes[0] & 0xF0, expect, "lat {lat} sat {sat}");

                // South: byte sign is the opposite of the raw geometry.
                let bytes = encode_angle(motor_angle(south, sat)).unwrap();
                let expect = if raw_s > 0.0 { SIGN_NEGATIVE } else { SIGN_POSITIVE };
                assert_eq!(bytes[0] & 0xF0, expect, "lat {} sat {sat}", -lat);
            }
        }
    }

    #[test]
    fn equator_overhead_is_zero() {
        for lon in [-120.0, 0.0, 10.0, 75.5] {
            let sol = compute_usals(Site::new(0.0, lon), lon).unwrap();
            assert_close(sol.motor_angle, 0.0, 1e-9);
            assert_close(sol.declination, 0.0, 1e-9);
            assert_eq!(sol.bytes, [SIGN_NEGATIVE, 0x00]);
        }
    }

    #[test]
    fn singular_pointing_resolves_to_quarter_turn() {
        assert_eq!(angle_from_pointing(0.0, 1234.5), 90.0);
        assert_eq!(angle_from_pointing(0.0, -1234.5), -90.0);
        assert_eq!(angle_from_pointing(0.0, 0.0), 0.0);
        assert_eq!(encode_angle(90.0).unwrap(), [0xD5, 0xA0]);
    }

    #[test]
    fn angle_stays_bounded_across_pointing_singularity() {
        // On the equator pointing.x crosses zero at acos(R_eq / R_sat) ~= 81.2996°.
        let site = Site::new(0.0, 0.0);
        let crossing = (EARTH_RADIUS_KM / ORBIT_RADIUS_KM).acos().to_degrees();
        assert_close(crossing, 81.2996, 1e-3);

        let mut offset = 80.0;
        while offset <= 83.0 {
            let raw = pointing_angle(site, offset);
            assert!(raw.is_finite() && raw.abs() <= 90.0, "offset {offset}: {raw}");
            let sol = compute_usals(site, offset).unwrap();
            assert!(sol.steps() <= 1440, "offset {offset}: {} steps", sol.steps());
            offset += 0.01;
        }

        // Either side of the crossing the angle approaches a quarter turn.
        assert!(pointing_angle(site, 81.29) < -89.9);
        assert!(pointing_angle(site, 81.31) > 89.9);
        let near = compute_usals(site, crossing).unwrap();
        assert_close(near.motor_angle.abs(), 90.0, 0.1);
    }

    #[test]
    fn encode_decode_recovers_steps() {
        for angle in [0.03, -0.5, 1.0, -12.34, 45.0, -79.9, 90.0, 255.9] {
            let bytes = encode_angle(angle).unwrap();
            let steps = ((u16::from(bytes[0]) & 0x0F) << 8) | u16::from(bytes[1]);
            assert_eq!(f64::from(steps), (angle.abs() * 16.0).round(), "angle {angle}");
            let back = decode_angle(bytes).unwrap();
            assert_close(back, angle, 1.0 / 32.0 + 1e-9);
        }
    }

    #[test]
    fn encode_rejects_overflow() {
        // 4095 / 16 = 255.9375 is the last representable magnitude.
        assert!(encode_angle(255.9375).is_ok());
        assert!(matches!(
            encode_angle(256.0),
            Err(CommandError::ValueOutOfRange { value: 4096, .. })
        ));
        assert!(matches!(
            encode_angle(-300.0),
            Err(CommandError::ValueOutOfRange { .. })
        ));
    }

    #[test]
    fn non_finite_rejected() {
        assert!(matches!(
            compute_usals(Site::new(f64::NAN, 0.0), 19.2),
            Err(CommandError::NonFiniteAngle { what: "site latitude" })
        ));
        assert!(matches!(
            compute_usals(Site::new(10.0, 0.0), f64::INFINITY),
            Err(CommandError::NonFiniteAngle { .. })
        ));
        assert!(encode_angle(f64::NAN).is_err());
    }

    #[test]
    fn decode_rejects_unknown_direction() {
        assert!(decode_angle([0x31, 0x00]).is_err());
        assert_eq!(decode_angle([0xE1, 0x90]).unwrap(), -25.0);
        assert_eq!(decode_angle([0xD0, 0x10]).unwrap(), 1.0);
    }

    #[test]
    fn site_display() {
        assert_eq!(Site::new(-33.9, 18.4).to_string(), "-33.90° (S), 18.40°");
        assert_eq!(Site::new(0.0, 0.0).hemisphere(), 'N');
    }
}
