//! Per-group equity metrics over the joined parcels.
//!
//! Grouping is a plain key function so the accumulation logic never needs
//! to know which zoning attribute is being studied. Shares are computed
//! once from the full-precision totals; rounding happens at display time
//! in the reporter, never here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry;
use crate::join::UNASSIGNED;
use crate::types::JoinedParcel;
use crate::zoning;

/// Which zoning attribute the aggregate is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// Raw zoning code ("R-1-5(PD)", "CG", ...).
    ZoningCode,
    /// Expanded urban-village family name ("Urban Village", ...).
    ZoningName,
    /// Coarse class ("Residential", "Mixed Use", ...).
    #[default]
    ZoningClass,
}

/// One row of the final report.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateRecord {
    pub group: String,
    pub parcel_count: usize,
    pub total_area_sqm: f64,
    /// parcel_count / total parcels across all groups.
    pub count_share: f64,
    /// total_area_sqm / total area across all groups.
    pub area_share: f64,
    /// Mean equity-index score over parcels that have one.
    pub mean_equity_score: Option<f64>,
}

#[derive(Default)]
struct GroupAccumulator {
    count: usize,
    area: f64,
    score_sum: f64,
    score_count: usize,
}

/// Groups joined parcels with an arbitrary key function.
///
/// Every parcel lands in exactly one group, so the per-group counts always
/// sum back to the input length. Output order follows the group key, which
/// keeps reruns and report diffs stable.
pub fn aggregate<F>(joined: &[JoinedParcel], key_fn: F) -> Vec<AggregateRecord>
where
    F: Fn(&JoinedParcel) -> String,
{
    let mut groups: BTreeMap<String, GroupAccumulator> = BTreeMap::new();

    for jp in joined {
        let acc = groups.entry(key_fn(jp)).or_default();
        acc.count += 1;
        acc.area += geometry::planar_area(&jp.parcel.geometry);
        if let Some(score) = jp.equity_score {
            acc.score_sum += score;
            acc.score_count += 1;
        }
    }

    let total_count = joined.len();
    let total_area: f64 = groups.values().map(|acc| acc.area).sum();

    groups
        .into_iter()
        .map(|(group, acc)| AggregateRecord {
            group,
            parcel_count: acc.count,
            total_area_sqm: acc.area,
            count_share: ratio(acc.count as f64, total_count as f64),
            area_share: ratio(acc.area, total_area),
            mean_equity_score: if acc.score_count > 0 {
                Some(acc.score_sum / acc.score_count as f64)
            } else {
                None
            },
        })
        .collect()
}

/// Groups by the configured zoning attribute. Unassigned parcels always
/// form their own reportable group.
pub fn aggregate_by(joined: &[JoinedParcel], group_by: GroupBy) -> Vec<AggregateRecord> {
    aggregate(joined, |jp| group_key(jp, group_by))
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

pub fn group_key(jp: &JoinedParcel, group_by: GroupBy) -> String {
    match jp.zoning_code() {
        None => UNASSIGNED.to_string(),
        Some(code) => match group_by {
            GroupBy::ZoningCode => code.to_string(),
            GroupBy::ZoningName => zoning::full_name(code).to_string(),
            GroupBy::ZoningClass => zoning::classify(code).label().to_string(),
        },
    }
}
