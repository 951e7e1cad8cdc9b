//! Report assembly and tabular export.
//!
//! The reporter renders and writes what the pipeline computed; it never
//! computes metrics itself. Aggregate records go out as CSV/JSON plus an
//! aligned stdout table, and optionally one row per joined parcel. All
//! display rounding happens here.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::aggregate::AggregateRecord;
use crate::config::AppConfig;
use crate::join::UNASSIGNED;
use crate::station::BufferSummary;
use crate::types::JoinedParcel;
use crate::zoning;
use crate::error::PipelineError;

/// Everything a run produces, ready for export or inline consumption.
#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub total_parcels: usize,
    pub assigned_parcels: usize,
    pub unassigned_parcels: usize,
    pub records: Vec<AggregateRecord>,
    pub buffer_summaries: Vec<BufferSummary>,
    /// Per-parcel join results; exported separately, never serialized here.
    #[serde(skip)]
    pub joined: Vec<JoinedParcel>,
}

impl PipelineReport {
    pub fn new(
        joined: Vec<JoinedParcel>,
        records: Vec<AggregateRecord>,
        buffer_summaries: Vec<BufferSummary>,
    ) -> Self {
        let assigned_parcels = joined.iter().filter(|jp| jp.assignment.is_some()).count();
        PipelineReport {
            total_parcels: joined.len(),
            assigned_parcels,
            unassigned_parcels: joined.len() - assigned_parcels,
            records,
            buffer_summaries,
            joined,
        }
    }
}

/// Writes the configured exports and returns the paths written.
pub fn write_reports(
    report: &PipelineReport,
    config: &AppConfig,
) -> Result<Vec<PathBuf>, PipelineError> {
    let out_dir = &config.output.dir;
    fs::create_dir_all(out_dir)?;

    let mut written = Vec::new();

    if config.output.write_csv {
        let path = out_dir.join("summary.csv");
        write_summary_csv(report, &path)?;
        written.push(path);
    }

    if config.output.write_json {
        let path = out_dir.join("summary.json");
        let file = fs::File::create(&path)?;
        serde_json::to_writer_pretty(file, report)?;
        written.push(path);
    }

    if config.output.write_parcels {
        let path = out_dir.join("parcels_with_zoning.csv");
        write_parcels_csv(report, config, &path)?;
        written.push(path);
    }

    for path in &written {
        info!(path = %path.display(), "wrote report");
    }
    Ok(written)
}

fn write_summary_csv(report: &PipelineReport, path: &PathBuf) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in &report.records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parcels_csv(
    report: &PipelineReport,
    config: &AppConfig,
    path: &PathBuf,
) -> Result<(), PipelineError> {
    let attr_columns = &config.input.columns.parcel_attributes;

    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec![
        "parcel_id",
        "zoning_district",
        "zoning_code",
        "zoning_name",
        "zoning_class",
        "planned_development",
        "overlap_sqm",
        "equity_score",
    ];
    for col in attr_columns {
        header.push(col);
    }
    writer.write_record(&header)?;

    for jp in &report.joined {
        let (district, code) = match &jp.assignment {
            Some(a) => (a.district_id.clone(), a.code.clone()),
            None => (String::new(), String::new()),
        };
        let (name, class, planned) = if code.is_empty() {
            (UNASSIGNED.to_string(), UNASSIGNED.to_string(), String::new())
        } else {
            (
                zoning::full_name(&code).to_string(),
                zoning::classify(&code).label().to_string(),
                zoning::is_planned_development(&code).to_string(),
            )
        };

        let mut row = vec![
            jp.parcel.id.clone(),
            district,
            code,
            name,
            class,
            planned,
            jp.assignment
                .as_ref()
                .map(|a| format!("{:.1}", a.overlap_sqm))
                .unwrap_or_default(),
            jp.equity_score
                .map(|s| format!("{s}"))
                .unwrap_or_default(),
        ];
        for col in attr_columns {
            row.push(jp.parcel.attributes.get(col).cloned().unwrap_or_default());
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Aligned text table for inline display.
pub fn render_table(report: &PipelineReport) -> String {
    let mut out = String::new();

    let group_width = report
        .records
        .iter()
        .map(|r| r.group.len())
        .chain(["group".len()].into_iter())
        .max()
        .unwrap_or(5);

    let _ = writeln!(
        out,
        "{:<group_width$}  {:>8}  {:>8}  {:>16}  {:>10}  {:>12}",
        "group", "parcels", "share", "area_sqm", "area_share", "equity_score",
    );
    for r in &report.records {
        let _ = writeln!(
            out,
            "{:<group_width$}  {:>8}  {:>7.1}%  {:>16.1}  {:>9.1}%  {:>12}",
            r.group,
            r.parcel_count,
            r.count_share * 100.0,
            r.total_area_sqm,
            r.area_share * 100.0,
            r.mean_equity_score
                .map(|s| format!("{s:.2}"))
                .unwrap_or_else(|| "-".to_string()),
        );
    }

    let _ = writeln!(
        out,
        "\n{} parcels total, {} assigned, {} unassigned",
        report.total_parcels, report.assigned_parcels, report.unassigned_parcels
    );

    for b in &report.buffer_summaries {
        let _ = writeln!(
            out,
            "within {:.1} mi of station: {} parcels, {} mixed use",
            b.radius_miles, b.total_parcels, b.mixed_use_parcels
        );
    }

    out
}
