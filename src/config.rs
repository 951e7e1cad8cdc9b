use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::aggregate::GroupBy;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Parcel polygons (.shp or .geojson).
    pub parcels: PathBuf,
    /// Zoning district polygons (.shp or .geojson).
    pub zoning: PathBuf,
    /// Optional equity-index census tracts.
    pub equity_tracts: Option<PathBuf>,
    #[serde(default)]
    pub columns: ColumnConfig,
    /// Per-dataset CRS overrides keyed by "parcels" / "zoning" /
    /// "equity_tracts", e.g. `parcels = "EPSG:3857"`. Used when a shapefile
    /// ships without a .prj sidecar.
    #[serde(default)]
    pub crs: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ColumnConfig {
    /// Parcel identifier column; falls back to the record index.
    pub parcel_id: Option<String>,
    /// Extra parcel columns carried through to the per-parcel export.
    pub parcel_attributes: Vec<String>,
    /// Zoning district identifier column; falls back to the record index.
    pub zoning_id: Option<String>,
    /// Zoning code column.
    pub zoning_code: String,
    pub tract_id: Option<String>,
    /// Numeric equity score column; required when equity_tracts is set.
    pub equity_score: Option<String>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        ColumnConfig {
            parcel_id: None,
            parcel_attributes: Vec::new(),
            zoning_id: None,
            zoning_code: "ZONING".to_string(),
            tract_id: None,
            equity_score: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub group_by: GroupBy,
    /// Optional transit-station buffer analysis.
    pub station: Option<StationConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StationConfig {
    pub lon: f64,
    pub lat: f64,
    #[serde(default = "default_radii")]
    pub radii_miles: Vec<f64>,
}

fn default_radii() -> Vec<f64> {
    vec![1.0, 2.0]
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
    #[serde(default = "default_true")]
    pub write_csv: bool,
    #[serde(default = "default_true")]
    pub write_json: bool,
    /// Also export one row per joined parcel.
    #[serde(default)]
    pub write_parcels: bool,
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }

    pub fn crs_override(&self, dataset: &str) -> Option<&str> {
        self.input.crs.get(dataset).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let toml = r#"
            [input]
            parcels = "data/Parcels.shp"
            zoning = "data/Zoning_Districts.shp"

            [output]
            dir = "output"
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.input.columns.zoning_code, "ZONING");
        assert_eq!(config.analysis.group_by, GroupBy::ZoningClass);
        assert!(config.analysis.station.is_none());
        assert!(config.output.write_csv);
        assert!(!config.output.write_parcels);
    }

    #[test]
    fn parses_full_config() {
        let toml = r#"
            [input]
            parcels = "data/Parcels.shp"
            zoning = "data/Zoning_Districts.shp"
            equity_tracts = "data/Equity_Index_Census_Tracts.shp"

            [input.columns]
            parcel_id = "PARCELID"
            parcel_attributes = ["APN", "LANDUSE"]
            zoning_code = "ZONING"
            equity_score = "EQTY_SCORE"

            [input.crs]
            parcels = "EPSG:3857"

            [analysis]
            group_by = "zoning_code"

            [analysis.station]
            lon = -121.9036
            lat = 37.3292

            [output]
            dir = "output"
            write_parcels = true
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.analysis.group_by, GroupBy::ZoningCode);
        assert_eq!(config.crs_override("parcels"), Some("EPSG:3857"));
        assert_eq!(config.crs_override("zoning"), None);
        let station = config.analysis.station.unwrap();
        assert_eq!(station.radii_miles, vec![1.0, 2.0]);
        assert_eq!(
            config.input.columns.parcel_attributes,
            vec!["APN".to_string(), "LANDUSE".to_string()]
        );
    }
}
