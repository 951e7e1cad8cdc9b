//! Spatial join: one zoning assignment per parcel.
//!
//! Candidate districts come from an R-tree over zoning envelopes; the
//! winner is the district with the largest overlap area. Exact ties go to
//! the lexicographically smallest district id so reruns are bit-for-bit
//! deterministic. A parcel overlapping nothing keeps `assignment = None`
//! and is reported under the "unassigned" group downstream; dropping it
//! would silently bias every aggregate count.

use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};
use tracing::{debug, warn};

use crate::geometry;
use crate::types::{EquityTract, JoinedParcel, Parcel, ZoningAssignment, ZoningDistrict};

/// Group label for parcels with no zoning overlap.
pub const UNASSIGNED: &str = "unassigned";

/// Envelope entry pointing back into the district slice.
struct ZoneEnvelope {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for ZoneEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

fn build_index<'a, G, I>(items: I) -> RTree<ZoneEnvelope>
where
    I: Iterator<Item = &'a G>,
    G: HasGeometry + 'a,
{
    let entries: Vec<ZoneEnvelope> = items
        .enumerate()
        .map(|(index, item)| ZoneEnvelope {
            index,
            aabb: geometry::envelope(item.geometry()),
        })
        .collect();
    RTree::bulk_load(entries)
}

trait HasGeometry {
    fn geometry(&self) -> &geo::MultiPolygon<f64>;
}

impl HasGeometry for ZoningDistrict {
    fn geometry(&self) -> &geo::MultiPolygon<f64> {
        &self.geometry
    }
}

impl HasGeometry for EquityTract {
    fn geometry(&self) -> &geo::MultiPolygon<f64> {
        &self.geometry
    }
}

/// Assigns every parcel to exactly one zoning district (or none).
pub fn join_parcels_to_zoning(
    parcels: Vec<Parcel>,
    zoning: &[ZoningDistrict],
) -> Vec<JoinedParcel> {
    let tree = build_index(zoning.iter());

    parcels
        .into_par_iter()
        .map(|parcel| {
            let assignment = assign_zoning(&parcel, zoning, &tree);
            JoinedParcel {
                parcel,
                assignment,
                equity_score: None,
            }
        })
        .collect()
}

fn assign_zoning(
    parcel: &Parcel,
    zoning: &[ZoningDistrict],
    tree: &RTree<ZoneEnvelope>,
) -> Option<ZoningAssignment> {
    let parcel_aabb = geometry::envelope(&parcel.geometry);

    // Envelope hits only; the overlap test below discards false positives.
    let mut candidates: Vec<(f64, &ZoningDistrict)> = Vec::new();
    for entry in tree.locate_in_envelope_intersecting(&parcel_aabb) {
        let district = &zoning[entry.index];
        let overlap = geometry::overlap_area(&parcel.geometry, &district.geometry);
        if overlap > 0.0 {
            candidates.push((overlap, district));
        }
    }

    if candidates.is_empty() {
        debug!(parcel = %parcel.id, "no zoning overlap, leaving unassigned");
        return None;
    }

    if candidates.len() > 1 {
        debug!(
            parcel = %parcel.id,
            candidates = candidates.len(),
            "parcel overlaps multiple zoning districts"
        );
    }

    let (best_overlap, best) = pick_largest_overlap(&candidates);

    // An exact tie is resolved by id, but it is worth a trace since it
    // usually means coincident district boundaries in the source data.
    let tied = candidates
        .iter()
        .filter(|(overlap, d)| *overlap == best_overlap && d.id != best.id)
        .count();
    if tied > 0 {
        warn!(
            parcel = %parcel.id,
            district = %best.id,
            "equal overlap areas, tie broken by smallest district id"
        );
    }

    Some(ZoningAssignment {
        district_id: best.id.clone(),
        code: best.code.clone(),
        overlap_sqm: best_overlap,
    })
}

/// Largest overlap wins; equal overlaps fall back to the smaller id.
fn pick_largest_overlap<'a>(
    candidates: &[(f64, &'a ZoningDistrict)],
) -> (f64, &'a ZoningDistrict) {
    let mut best = candidates[0];
    for &(overlap, district) in &candidates[1..] {
        let (best_overlap, best_district) = best;
        if overlap > best_overlap
            || (overlap == best_overlap && district.id < best_district.id)
        {
            best = (overlap, district);
        }
    }
    best
}

/// Attaches each parcel's tract equity score by centroid containment,
/// mirroring the zoning join's one-output-per-parcel discipline.
pub fn attach_equity_scores(
    joined: Vec<JoinedParcel>,
    tracts: &[EquityTract],
) -> Vec<JoinedParcel> {
    if tracts.is_empty() {
        return joined;
    }
    let tree = build_index(tracts.iter());

    joined
        .into_par_iter()
        .map(|mut jp| {
            jp.equity_score = geometry::centroid(&jp.parcel.geometry).and_then(|centroid| {
                let aabb = AABB::from_point([centroid.x(), centroid.y()]);
                tree.locate_in_envelope_intersecting(&aabb)
                    .map(|entry| &tracts[entry.index])
                    .find(|tract| geometry::contains_point(&tract.geometry, centroid))
                    .map(|tract| tract.score)
            });
            jp
        })
        .collect()
}
