//! Parcel and zoning equity analysis for downtown San Jose.
//!
//! One batch pipeline: load parcel and zoning polygons (plus optional
//! equity-index tracts), spatially join them, aggregate equity metrics per
//! zoning group, and export the results. Each stage takes the previous
//! stage's output by value; there is no shared state between stages and no
//! state across runs.

pub mod aggregate;
pub mod config;
pub mod data;
pub mod error;
pub mod geometry;
pub mod join;
pub mod projection;
pub mod report;
pub mod station;
pub mod types;
pub mod zoning;

use tracing::info;

use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::report::PipelineReport;

/// Runs the whole pipeline: load, join, aggregate.
///
/// Fails fast on any load or geometry problem; a partial run cannot
/// produce trustworthy aggregates. Writing the report files is left to the
/// caller so the result stays consumable in memory.
pub fn run_pipeline(config: &AppConfig) -> Result<PipelineReport, PipelineError> {
    let data = data::load_datasets(config)?;

    info!(
        parcels = data.parcels.len(),
        zoning = data.zoning.len(),
        "joining parcels to zoning districts"
    );
    let mut joined = join::join_parcels_to_zoning(data.parcels, &data.zoning);
    joined = join::attach_equity_scores(joined, &data.tracts);

    let records = aggregate::aggregate_by(&joined, config.analysis.group_by);

    let buffer_summaries = match &config.analysis.station {
        Some(station) => station::buffer_summaries(&joined, station),
        None => Vec::new(),
    };

    Ok(PipelineReport::new(joined, records, buffer_summaries))
}
