//! Transit-station buffer analysis.
//!
//! Builds radius buffers around a station point (Diridon Station in the
//! shipped config) and counts, per radius, how many parcels fall inside by
//! centroid and how many of those sit in mixed-use zoning. Membership is
//! by centroid so a parcel is counted in full or not at all, matching how
//! the parcel summaries are read.

use geo::Coord;
use serde::Serialize;
use tracing::info;

use crate::config::StationConfig;
use crate::geometry;
use crate::projection;
use crate::types::JoinedParcel;
use crate::zoning::{self, ZoningClass};

pub const MILE_IN_METERS: f64 = 1_609.344;

const CIRCLE_SEGMENTS: usize = 64;

#[derive(Debug, Clone, Serialize)]
pub struct BufferSummary {
    pub radius_miles: f64,
    pub total_parcels: usize,
    /// Parcels whose assigned zoning classifies as mixed use, i.e. the
    /// urban village / transit residential family the analysis tracks.
    pub mixed_use_parcels: usize,
}

/// One summary per configured radius, in the order configured.
pub fn buffer_summaries(joined: &[JoinedParcel], station: &StationConfig) -> Vec<BufferSummary> {
    let center = projection::lonlat_to_mercator(Coord {
        x: station.lon,
        y: station.lat,
    });

    let centroids: Vec<_> = joined
        .iter()
        .map(|jp| geometry::centroid(&jp.parcel.geometry))
        .collect();

    station
        .radii_miles
        .iter()
        .map(|&radius_miles| {
            let buffer = geometry::circle(center, radius_miles * MILE_IN_METERS, CIRCLE_SEGMENTS);

            let mut total_parcels = 0;
            let mut mixed_use_parcels = 0;
            for (jp, centroid) in joined.iter().zip(&centroids) {
                let inside = centroid
                    .map(|c| geometry::polygon_contains_point(&buffer, c))
                    .unwrap_or(false);
                if !inside {
                    continue;
                }
                total_parcels += 1;
                let mixed_use = jp
                    .zoning_code()
                    .map(|code| zoning::classify(code) == ZoningClass::MixedUse)
                    .unwrap_or(false);
                if mixed_use {
                    mixed_use_parcels += 1;
                }
            }

            info!(
                radius_miles,
                total_parcels, mixed_use_parcels, "station buffer summary"
            );
            BufferSummary {
                radius_miles,
                total_parcels,
                mixed_use_parcels,
            }
        })
        .collect()
}
