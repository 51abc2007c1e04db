use serde::{Deserialize, Serialize};

use crate::math::{Real, Vec3};

/// WGS84 semi-major axis, meters.
const WGS84_A: Real = 6378137.0;
/// WGS84 first eccentricity squared.
const WGS84_E2: Real = 6.6943799901413165e-3;

/// Converter between geodetic (lat, lon, alt) and a local topocentric frame.
///
/// The topocentric frame is the tangent plane at the reference coordinate:
/// x east, y north, z up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopocentricConverter {
    pub lat: Real,
    pub lon: Real,
    pub alt: Real,
}

impl TopocentricConverter {
    /// Reference at the given geodetic coordinate (degrees, degrees, meters).
    pub fn new(lat: Real, lon: Real, alt: Real) -> Self {
        Self { lat, lon, alt }
    }

    /// Convert `[lat, lon, alt]` into the local topocentric frame.
    pub fn to_topocentric(&self, lla: &Vec3) -> Vec3 {
        let p = ecef_from_lla(lla.x, lla.y, lla.z);
        let r = ecef_from_lla(self.lat, self.lon, self.alt);
        let d = p - r;

        let (sin_lat, cos_lat) = self.lat.to_radians().sin_cos();
        let (sin_lon, cos_lon) = self.lon.to_radians().sin_cos();

        Vec3::new(
            -sin_lon * d.x + cos_lon * d.y,
            -sin_lat * cos_lon * d.x - sin_lat * sin_lon * d.y + cos_lat * d.z,
            cos_lat * cos_lon * d.x + cos_lat * sin_lon * d.y + sin_lat * d.z,
        )
    }
}

impl Default for TopocentricConverter {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// Earth-centered, earth-fixed coordinates of a geodetic coordinate.
fn ecef_from_lla(lat: Real, lon: Real, alt: Real) -> Vec3 {
    let (sin_lat, cos_lat) = lat.to_radians().sin_cos();
    let (sin_lon, cos_lon) = lon.to_radians().sin_cos();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    Vec3::new(
        (n + alt) * cos_lat * cos_lon,
        (n + alt) * cos_lat * sin_lon,
        (n * (1.0 - WGS84_E2) + alt) * sin_lat,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_maps_to_origin() {
        let conv = TopocentricConverter::new(52.0, 13.4, 34.0);
        let o = conv.to_topocentric(&Vec3::new(52.0, 13.4, 34.0));
        assert!(o.norm() < 1e-6, "reference should be the origin: {o}");
    }

    #[test]
    fn altitude_is_up() {
        let conv = TopocentricConverter::new(45.0, 7.0, 100.0);
        let p = conv.to_topocentric(&Vec3::new(45.0, 7.0, 110.0));
        assert!((p.z - 10.0).abs() < 1e-6);
        assert!(p.x.abs() < 1e-6 && p.y.abs() < 1e-6);
    }

    #[test]
    fn north_displacement_is_positive_y() {
        let conv = TopocentricConverter::new(45.0, 7.0, 0.0);
        let p = conv.to_topocentric(&Vec3::new(45.001, 7.0, 0.0));
        assert!(p.y > 100.0, "one millidegree north is ~111 m: {p}");
        assert!(p.x.abs() < 1.0);
    }
}
