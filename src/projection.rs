//! Coordinate reference system detection and normalization.
//!
//! Every dataset is normalized to EPSG:3857 (spherical Web Mercator) before
//! it reaches the join stage, so overlap areas are computed in a single
//! planar unit (square meters at the equatorial scale). Inputs may arrive
//! either already projected or as geographic WGS84 coordinates.

use std::path::Path;

use geo::{Coord, MapCoords, MultiPolygon};

use crate::error::LoadError;

const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Web Mercator is undefined at the poles; clamp like every tiling stack does.
const MAX_LATITUDE: f64 = 85.051_128;

/// The coordinate reference systems the pipeline understands.
///
/// Anything else (e.g. a State Plane projection) is rejected at load time
/// rather than guessed at, since a wrong guess would produce overlap areas
/// that are quietly wrong everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// EPSG:4326, geographic longitude/latitude in degrees.
    Wgs84,
    /// EPSG:3857, spherical Web Mercator in meters.
    WebMercator,
}

impl Crs {
    /// Parses a user-supplied CRS string such as `"EPSG:4326"` or `"3857"`.
    pub fn parse(s: &str) -> Option<Crs> {
        match s.trim().to_uppercase().trim_start_matches("EPSG:").trim() {
            "4326" => Some(Crs::Wgs84),
            "3857" | "900913" => Some(Crs::WebMercator),
            _ => None,
        }
    }

    /// Sniffs a `.prj` sidecar's WKT.
    ///
    /// Mercator is checked first: its WKT embeds a `GCS_WGS_1984` base, so
    /// the geographic patterns would otherwise match every projected file.
    pub fn from_prj_wkt(wkt: &str) -> Option<Crs> {
        let upper = wkt.to_uppercase();
        let mercator = ["PSEUDO-MERCATOR", "PSEUDO_MERCATOR", "WEB_MERCATOR", "3857"];
        if mercator.iter().any(|p| upper.contains(p)) {
            return Some(Crs::WebMercator);
        }
        let geographic = ["GCS_WGS_1984", "WGS 84", "WGS_1984", "4326"];
        if upper.starts_with("GEOGCS") && geographic.iter().any(|p| upper.contains(p)) {
            return Some(Crs::Wgs84);
        }
        None
    }
}

/// Resolves the CRS for a dataset: explicit override first, then the `.prj`
/// sidecar for shapefiles, then the format default (GeoJSON is WGS84 per
/// RFC 7946). Returns `LoadError::UnknownCrs` when nothing applies.
pub fn resolve_crs(
    path: &Path,
    override_str: Option<&str>,
    format_default: Option<Crs>,
) -> Result<Crs, LoadError> {
    if let Some(s) = override_str {
        return Crs::parse(s).ok_or_else(|| LoadError::UnsupportedCrs {
            path: path.to_path_buf(),
            crs: s.to_string(),
        });
    }

    let prj_path = path.with_extension("prj");
    if prj_path.is_file() {
        let wkt = std::fs::read_to_string(&prj_path).map_err(|source| LoadError::Io {
            path: prj_path.clone(),
            source,
        })?;
        return match Crs::from_prj_wkt(&wkt) {
            Some(crs) => Ok(crs),
            None => Err(LoadError::UnsupportedCrs {
                path: path.to_path_buf(),
                crs: wkt.chars().take(60).collect(),
            }),
        };
    }

    format_default.ok_or_else(|| LoadError::UnknownCrs {
        path: path.to_path_buf(),
    })
}

/// Projects a single WGS84 coordinate to Web Mercator meters.
pub fn lonlat_to_mercator(coord: Coord<f64>) -> Coord<f64> {
    let lat = coord.y.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = EARTH_RADIUS_M * coord.x.to_radians();
    let y = EARTH_RADIUS_M * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0)
        .tan()
        .ln();
    Coord { x, y }
}

/// Normalizes a geometry to Web Mercator. Data already in the target CRS is
/// returned untouched, so normalization is idempotent.
pub fn to_web_mercator(geometry: MultiPolygon<f64>, source: Crs) -> MultiPolygon<f64> {
    match source {
        Crs::WebMercator => geometry,
        Crs::Wgs84 => geometry.map_coords(lonlat_to_mercator),
    }
}
