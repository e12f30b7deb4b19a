//! UTM zone estimation and transverse Mercator projection
//!
//! Block-group geometries arrive in geographic coordinates (longitude,
//! latitude in degrees). Area and distance based measures need a projected
//! CRS in metres, so each metro is projected to the UTM zone covering the
//! centre of its bounding box.

use std::fmt;

use geo::{BoundingRect, MapCoords};
use geo_types::{Coord, MultiPolygon, Rect};
use serde::{Deserialize, Serialize};

use crate::error::{IncsegError, Result};

/// WGS84 semi-major axis in metres
const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
/// WGS84 flattening
const FLATTENING: f64 = 1.0 / 298.257_223_563;
/// UTM scale factor on the central meridian
const SCALE_FACTOR: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// A UTM zone on the WGS84 ellipsoid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmZone {
    /// Zone number, 1 to 60
    pub zone: u8,
    /// Whether the zone is in the northern hemisphere
    pub north: bool,
}

impl UtmZone {
    /// Zone containing a geographic coordinate
    pub fn for_coord(lon: f64, lat: f64) -> Result<Self> {
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            return Err(IncsegError::Geometry(format!(
                "Coordinate ({lon}, {lat}) is not a longitude/latitude pair"
            )));
        }
        let zone = (((lon + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u8;
        Ok(Self {
            zone,
            north: lat >= 0.0,
        })
    }

    /// Zone covering the centre of a geographic bounding box
    pub fn estimate(bounds: &Rect<f64>) -> Result<Self> {
        let center = bounds.center();
        Self::for_coord(center.x, center.y)
    }

    /// Zone covering the centre of a set of geographic geometries
    pub fn estimate_for<'a>(geometries: impl IntoIterator<Item = &'a MultiPolygon<f64>>) -> Result<Self> {
        let bounds = geometries
            .into_iter()
            .filter_map(BoundingRect::bounding_rect)
            .reduce(|a, b| {
                Rect::new(
                    Coord {
                        x: a.min().x.min(b.min().x),
                        y: a.min().y.min(b.min().y),
                    },
                    Coord {
                        x: a.max().x.max(b.max().x),
                        y: a.max().y.max(b.max().y),
                    },
                )
            })
            .ok_or_else(|| IncsegError::Geometry("Cannot estimate a CRS for empty geometries".into()))?;
        Self::estimate(&bounds)
    }

    /// EPSG code of the zone (326xx north, 327xx south)
    #[must_use]
    pub const fn epsg(self) -> u32 {
        let base = if self.north { 32_600 } else { 32_700 };
        base + self.zone as u32
    }

    /// Longitude of the central meridian in degrees
    #[must_use]
    pub fn central_meridian(self) -> f64 {
        f64::from(self.zone) * 6.0 - 183.0
    }

    /// Project a geographic coordinate to easting/northing in metres
    #[must_use]
    pub fn project(self, coord: Coord<f64>) -> Coord<f64> {
        let e2 = FLATTENING * (2.0 - FLATTENING);
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let ep2 = e2 / (1.0 - e2);

        let phi = coord.y.to_radians();
        let dlam = (coord.x - self.central_meridian()).to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = phi.tan();

        let n = SEMI_MAJOR_AXIS / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = ep2 * cos_phi * cos_phi;
        let a = dlam * cos_phi;

        let m = SEMI_MAJOR_AXIS
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * phi).sin());

        let x = SCALE_FACTOR
            * n
            * (a + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0);
        let y = SCALE_FACTOR
            * (m + n
                * tan_phi
                * (a * a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));

        Coord {
            x: x + FALSE_EASTING,
            y: if self.north { y } else { y + FALSE_NORTHING_SOUTH },
        }
    }

    /// Project every vertex of a geometry
    #[must_use]
    pub fn project_geometry(self, geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        geometry.map_coords(|c| self.project(c))
    }
}

impl std::str::FromStr for UtmZone {
    type Err = IncsegError;

    /// Parse an `EPSG:326xx` or `EPSG:327xx` code
    fn from_str(s: &str) -> Result<Self> {
        let code = s
            .trim()
            .strip_prefix("EPSG:")
            .and_then(|code| code.parse::<u32>().ok())
            .ok_or_else(|| IncsegError::Geometry(format!("'{s}' is not an EPSG code")))?;
        let (north, zone) = match code {
            32_601..=32_660 => (true, code - 32_600),
            32_701..=32_760 => (false, code - 32_700),
            _ => {
                return Err(IncsegError::Geometry(format!(
                    "EPSG:{code} is not a WGS84 UTM zone"
                )));
            }
        };
        Ok(Self {
            zone: zone as u8,
            north,
        })
    }
}

impl fmt::Display for UtmZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    #[test]
    fn test_zone_estimation() {
        let zone = UtmZone::for_coord(-117.5, 34.0).unwrap();
        assert_eq!(zone.zone, 11);
        assert!(zone.north);
        assert_eq!(zone.epsg(), 32611);
        assert_eq!(zone.to_string(), "EPSG:32611");

        let south = UtmZone::for_coord(151.2, -33.9).unwrap();
        assert_eq!(south.epsg(), 32756);
        assert!(UtmZone::for_coord(200.0, 0.0).is_err());

        assert_eq!("EPSG:32756".parse::<UtmZone>().unwrap(), south);
        assert!("EPSG:4326".parse::<UtmZone>().is_err());
    }

    #[test]
    fn test_central_meridian_projects_to_false_easting() {
        let zone = UtmZone { zone: 11, north: true };
        let origin = zone.project(Coord { x: -117.0, y: 0.0 });
        assert!((origin.x - 500_000.0).abs() < 1e-6);
        assert!(origin.y.abs() < 1e-6);

        let la = zone.project(Coord { x: -117.0, y: 34.0 });
        assert!((la.x - 500_000.0).abs() < 1e-6);
        // Meridian arc at 34 degrees scaled by k0, roughly 3.76e6 metres
        assert!((la.y - 3_762_155.0).abs() < 1_000.0);
    }

    #[test]
    fn test_projection_preserves_local_distances() {
        let zone = UtmZone { zone: 11, north: true };
        let a = zone.project(Coord { x: -117.0, y: 34.0 });
        let b = zone.project(Coord { x: -117.0, y: 34.01 });
        // 0.01 degrees of latitude is about 1.11 km
        let d = (b.y - a.y).hypot(b.x - a.x);
        assert!((d - 1_109.0).abs() < 5.0);
    }

    #[test]
    fn test_estimate_from_geometries() {
        let poly = MultiPolygon(vec![polygon![
            (x: -118.0, y: 33.9),
            (x: -117.9, y: 33.9),
            (x: -117.9, y: 34.0),
            (x: -118.0, y: 34.0),
        ]]);
        let zone = UtmZone::estimate_for([&poly]).unwrap();
        assert_eq!(zone.zone, 11);
        let projected = zone.project_geometry(&poly);
        assert_eq!(projected.0[0].exterior().0.len(), poly.0[0].exterior().0.len());
    }
}
