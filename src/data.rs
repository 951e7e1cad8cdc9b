//! Dataset loading and normalization.
//!
//! Each input is read fully into memory, its CRS resolved (config override,
//! then .prj sidecar, then format default), reprojected to Web Mercator and
//! validity-checked before any downstream stage sees it. A load failure is
//! always fatal: the join cannot produce trustworthy numbers from a partial
//! or mis-projected dataset.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use geo::MultiPolygon;
use geojson::GeoJson;
use shapefile::dbase::FieldValue;
use tracing::info;

use crate::config::AppConfig;
use crate::error::{GeometryError, LoadError, PipelineError};
use crate::geometry;
use crate::projection::{self, Crs};
use crate::types::{EquityTract, Parcel, ZoningDistrict};

/// Everything the pipeline reads from disk, already normalized.
#[derive(Debug)]
pub struct LoadedData {
    pub parcels: Vec<Parcel>,
    pub zoning: Vec<ZoningDistrict>,
    pub tracts: Vec<EquityTract>,
}

/// A single attribute value, as loosely typed as the source tables are.
#[derive(Debug, Clone)]
enum AttrValue {
    Text(String),
    Number(f64),
}

impl AttrValue {
    fn as_text(&self) -> String {
        match self {
            AttrValue::Text(s) => s.clone(),
            AttrValue::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) => Some(*n),
            AttrValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Geometry plus the requested attribute columns, in the normalized CRS.
struct RawFeature {
    geometry: MultiPolygon<f64>,
    attrs: HashMap<String, AttrValue>,
}

impl RawFeature {
    fn text(&self, column: &str) -> Option<String> {
        self.attrs.get(column).map(|v| v.as_text())
    }

    fn number(&self, column: &str) -> Option<f64> {
        self.attrs.get(column).and_then(|v| v.as_number())
    }
}

pub fn load_datasets(config: &AppConfig) -> Result<LoadedData, PipelineError> {
    let parcels = load_parcels(config)?;
    info!(count = parcels.len(), "loaded parcels");

    let zoning = load_zoning(config)?;
    info!(count = zoning.len(), "loaded zoning districts");

    let tracts = match &config.input.equity_tracts {
        Some(path) => {
            let tracts = load_equity_tracts(config, path)?;
            info!(count = tracts.len(), "loaded equity tracts");
            tracts
        }
        None => Vec::new(),
    };

    Ok(LoadedData {
        parcels,
        zoning,
        tracts,
    })
}

fn load_parcels(config: &AppConfig) -> Result<Vec<Parcel>, PipelineError> {
    let columns = &config.input.columns;
    let mut wanted: Vec<&str> = Vec::new();
    if let Some(id_col) = &columns.parcel_id {
        wanted.push(id_col);
    }
    for attr in &columns.parcel_attributes {
        wanted.push(attr);
    }

    let features = load_features(
        &config.input.parcels,
        config.crs_override("parcels"),
        &wanted,
    )?;

    let mut parcels = Vec::with_capacity(features.len());
    for (idx, feature) in features.into_iter().enumerate() {
        let id = columns
            .parcel_id
            .as_ref()
            .and_then(|col| feature.text(col))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("parcel-{idx:05}"));

        let attributes = columns
            .parcel_attributes
            .iter()
            .filter_map(|col| feature.text(col).map(|v| (col.clone(), v)))
            .collect();

        ensure_valid("parcels", &id, &feature.geometry)?;
        parcels.push(Parcel {
            id,
            geometry: feature.geometry,
            attributes,
        });
    }
    Ok(parcels)
}

fn load_zoning(config: &AppConfig) -> Result<Vec<ZoningDistrict>, PipelineError> {
    let columns = &config.input.columns;
    let mut wanted: Vec<&str> = vec![&columns.zoning_code];
    if let Some(id_col) = &columns.zoning_id {
        wanted.push(id_col);
    }

    let features = load_features(
        &config.input.zoning,
        config.crs_override("zoning"),
        &wanted,
    )?;

    let mut districts = Vec::with_capacity(features.len());
    for (idx, feature) in features.into_iter().enumerate() {
        let id = columns
            .zoning_id
            .as_ref()
            .and_then(|col| feature.text(col))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("zone-{idx:05}"));
        let code = feature.text(&columns.zoning_code).unwrap_or_default();

        ensure_valid("zoning", &id, &feature.geometry)?;
        districts.push(ZoningDistrict {
            id,
            geometry: feature.geometry,
            code,
        });
    }
    Ok(districts)
}

fn load_equity_tracts(config: &AppConfig, path: &Path) -> Result<Vec<EquityTract>, PipelineError> {
    let columns = &config.input.columns;
    let score_col = columns.equity_score.as_ref().ok_or_else(|| {
        PipelineError::Config(
            "input.columns.equity_score must be set when input.equity_tracts is".to_string(),
        )
    })?;

    let mut wanted: Vec<&str> = vec![score_col];
    if let Some(id_col) = &columns.tract_id {
        wanted.push(id_col);
    }

    let features = load_features(path, config.crs_override("equity_tracts"), &wanted)?;

    let mut tracts = Vec::with_capacity(features.len());
    for (idx, feature) in features.into_iter().enumerate() {
        let id = columns
            .tract_id
            .as_ref()
            .and_then(|col| feature.text(col))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("tract-{idx:05}"));
        let score = feature.number(score_col).ok_or_else(|| LoadError::Malformed {
            path: path.to_path_buf(),
            kind: "equity tract",
            message: format!("record {id}: column {score_col:?} is not numeric"),
        })?;

        ensure_valid("equity_tracts", &id, &feature.geometry)?;
        tracts.push(EquityTract {
            id,
            geometry: feature.geometry,
            score,
        });
    }
    Ok(tracts)
}

fn ensure_valid(
    dataset: &str,
    record_id: &str,
    geometry: &MultiPolygon<f64>,
) -> Result<(), GeometryError> {
    if geometry::is_valid(geometry) {
        Ok(())
    } else {
        Err(GeometryError {
            dataset: dataset.to_string(),
            record_id: record_id.to_string(),
            reason: "invalid or self-intersecting polygon".to_string(),
        })
    }
}

/// Reads one polygon dataset, dispatching on extension, and normalizes it.
fn load_features(
    path: &Path,
    crs_override: Option<&str>,
    columns: &[&str],
) -> Result<Vec<RawFeature>, LoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    let (raw, crs) = match extension.as_str() {
        "shp" => {
            let crs = projection::resolve_crs(path, crs_override, None)?;
            (load_shapefile(path, columns)?, crs)
        }
        "json" | "geojson" => {
            // RFC 7946: GeoJSON is WGS84 unless the caller says otherwise.
            let crs = projection::resolve_crs(path, crs_override, Some(Crs::Wgs84))?;
            (load_geojson(path, columns)?, crs)
        }
        _ => {
            return Err(LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            })
        }
    };

    Ok(raw
        .into_iter()
        .map(|(geometry, attrs)| RawFeature {
            geometry: projection::to_web_mercator(geometry, crs),
            attrs,
        })
        .collect())
}

type RawRecord = (MultiPolygon<f64>, HashMap<String, AttrValue>);

fn load_shapefile(path: &Path, columns: &[&str]) -> Result<Vec<RawRecord>, LoadError> {
    let mut reader =
        shapefile::Reader::from_path(path).map_err(|e| LoadError::Malformed {
            path: path.to_path_buf(),
            kind: "shapefile",
            message: e.to_string(),
        })?;

    let mut records = Vec::new();
    for (idx, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result.map_err(|e| LoadError::Malformed {
            path: path.to_path_buf(),
            kind: "shapefile",
            message: format!("record {idx}: {e}"),
        })?;

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(p) => convert_shape(path, idx, p)?,
            shapefile::Shape::PolygonM(p) => convert_shape(path, idx, p)?,
            shapefile::Shape::PolygonZ(p) => convert_shape(path, idx, p)?,
            other => {
                return Err(LoadError::Malformed {
                    path: path.to_path_buf(),
                    kind: "shapefile",
                    message: format!(
                        "record {idx}: expected polygon, got {:?}",
                        other.shapetype()
                    ),
                })
            }
        };

        let mut attrs = HashMap::new();
        for &column in columns {
            let value = record.get(column).ok_or_else(|| LoadError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            })?;
            if let Some(parsed) = convert_field(path, column, value)? {
                attrs.insert(column.to_string(), parsed);
            }
        }
        records.push((geometry, attrs));
    }
    Ok(records)
}

fn convert_shape<S>(path: &Path, idx: usize, shape: S) -> Result<MultiPolygon<f64>, LoadError>
where
    S: TryInto<MultiPolygon<f64>>,
    S::Error: std::fmt::Debug,
{
    shape.try_into().map_err(|e| LoadError::Malformed {
        path: path.to_path_buf(),
        kind: "shapefile",
        message: format!("record {idx}: polygon conversion failed: {e:?}"),
    })
}

/// Null attribute values come back as `None` and simply stay absent.
fn convert_field(
    path: &Path,
    column: &str,
    value: &FieldValue,
) -> Result<Option<AttrValue>, LoadError> {
    let converted = match value {
        FieldValue::Character(Some(s)) => Some(AttrValue::Text(s.trim().to_string())),
        FieldValue::Character(None) => None,
        FieldValue::Numeric(Some(n)) => Some(AttrValue::Number(*n)),
        FieldValue::Numeric(None) => None,
        FieldValue::Float(Some(f)) => Some(AttrValue::Number(*f as f64)),
        FieldValue::Float(None) => None,
        FieldValue::Integer(i) => Some(AttrValue::Number(*i as f64)),
        FieldValue::Double(d) => Some(AttrValue::Number(*d)),
        FieldValue::Currency(c) => Some(AttrValue::Number(*c)),
        FieldValue::Logical(Some(b)) => Some(AttrValue::Text(b.to_string())),
        FieldValue::Logical(None) => None,
        other => {
            return Err(LoadError::Malformed {
                path: path.to_path_buf(),
                kind: "shapefile",
                message: format!("column {column:?} has unsupported field type {other:?}"),
            })
        }
    };
    Ok(converted)
}

fn load_geojson(path: &Path, columns: &[&str]) -> Result<Vec<RawRecord>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let geojson = GeoJson::from_reader(BufReader::new(file)).map_err(|e| LoadError::Malformed {
        path: path.to_path_buf(),
        kind: "geojson",
        message: e.to_string(),
    })?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => {
            return Err(LoadError::Malformed {
                path: path.to_path_buf(),
                kind: "geojson",
                message: "expected a FeatureCollection".to_string(),
            })
        }
    };

    // The attribute schema is implicit in GeoJSON; insist that the first
    // feature carries every configured column so typos fail loudly instead
    // of yielding a dataset full of fallback ids.
    if let Some(first) = collection.features.first() {
        for &column in columns {
            let present = first
                .properties
                .as_ref()
                .map(|props| props.contains_key(column))
                .unwrap_or(false);
            if !present {
                return Err(LoadError::MissingColumn {
                    path: path.to_path_buf(),
                    column: column.to_string(),
                });
            }
        }
    }

    let mut records = Vec::new();
    for (idx, feature) in collection.features.into_iter().enumerate() {
        let geometry = match feature.geometry {
            Some(geom) => {
                let converted: geo::Geometry<f64> =
                    geom.value.try_into().map_err(|e| LoadError::Malformed {
                        path: path.to_path_buf(),
                        kind: "geojson",
                        message: format!("feature {idx}: geometry conversion failed: {e:?}"),
                    })?;
                match converted {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    other => {
                        return Err(LoadError::Malformed {
                            path: path.to_path_buf(),
                            kind: "geojson",
                            message: format!(
                                "feature {idx}: expected polygon, got {other:?}"
                            ),
                        })
                    }
                }
            }
            None => {
                return Err(LoadError::Malformed {
                    path: path.to_path_buf(),
                    kind: "geojson",
                    message: format!("feature {idx} has no geometry"),
                })
            }
        };

        let mut attrs = HashMap::new();
        if let Some(props) = &feature.properties {
            for &column in columns {
                match props.get(column) {
                    Some(serde_json::Value::String(s)) => {
                        attrs.insert(column.to_string(), AttrValue::Text(s.clone()));
                    }
                    Some(serde_json::Value::Number(n)) => {
                        if let Some(v) = n.as_f64() {
                            attrs.insert(column.to_string(), AttrValue::Number(v));
                        }
                    }
                    Some(serde_json::Value::Bool(b)) => {
                        attrs.insert(column.to_string(), AttrValue::Text(b.to_string()));
                    }
                    _ => {}
                }
            }
        }
        records.push((geometry, attrs));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::GroupBy;
    use crate::config::{AnalysisConfig, ColumnConfig, InputConfig, OutputConfig};
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    fn square_feature(id: &str, code: &str, x: f64, y: f64, size: f64) -> String {
        format!(
            r#"{{"type":"Feature","properties":{{"ID":"{id}","ZONING":"{code}"}},"geometry":{{"type":"Polygon","coordinates":[[[{x},{y}],[{x2},{y}],[{x2},{y2}],[{x},{y2}],[{x},{y}]]]}}}}"#,
            x2 = x + size,
            y2 = y + size,
        )
    }

    fn collection(features: &[String]) -> String {
        format!(
            r#"{{"type":"FeatureCollection","features":[{}]}}"#,
            features.join(",")
        )
    }

    fn test_config(dir: &Path, parcels: &Path, zoning: &Path) -> AppConfig {
        AppConfig {
            input: InputConfig {
                parcels: parcels.to_path_buf(),
                zoning: zoning.to_path_buf(),
                equity_tracts: None,
                columns: ColumnConfig {
                    parcel_id: Some("ID".to_string()),
                    zoning_id: Some("ID".to_string()),
                    ..ColumnConfig::default()
                },
                crs: [
                    ("parcels".to_string(), "EPSG:3857".to_string()),
                    ("zoning".to_string(), "EPSG:3857".to_string()),
                ]
                .into_iter()
                .collect(),
            },
            analysis: AnalysisConfig {
                group_by: GroupBy::ZoningClass,
                station: None,
            },
            output: OutputConfig {
                dir: dir.join("out"),
                write_csv: true,
                write_json: true,
                write_parcels: false,
            },
        }
    }

    #[test]
    fn loads_geojson_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let parcels = write_file(
            dir.path(),
            "parcels.geojson",
            &collection(&[
                square_feature("p1", "", 0.0, 0.0, 1.0),
                square_feature("p2", "", 2.0, 0.0, 1.0),
            ]),
        );
        let zoning = write_file(
            dir.path(),
            "zoning.geojson",
            &collection(&[square_feature("z1", "UV", 0.0, 0.0, 4.0)]),
        );

        let config = test_config(dir.path(), &parcels, &zoning);
        let data = load_datasets(&config).unwrap();
        assert_eq!(data.parcels.len(), 2);
        assert_eq!(data.parcels[0].id, "p1");
        assert_eq!(data.zoning.len(), 1);
        assert_eq!(data.zoning[0].code, "UV");
        assert!(data.tracts.is_empty());
    }

    #[test]
    fn missing_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let parcels = write_file(
            dir.path(),
            "parcels.geojson",
            &collection(&[square_feature("p1", "", 0.0, 0.0, 1.0)]),
        );
        let zoning = write_file(
            dir.path(),
            "zoning.geojson",
            &collection(&[square_feature("z1", "UV", 0.0, 0.0, 4.0)]),
        );

        let mut config = test_config(dir.path(), &parcels, &zoning);
        config.input.columns.parcel_id = Some("NO_SUCH_COLUMN".to_string());

        let err = load_datasets(&config).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Load(LoadError::MissingColumn { .. })
        ));
    }

    #[test]
    fn shapefile_without_prj_or_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let parcels = write_file(dir.path(), "parcels.shp", "");
        let zoning = write_file(
            dir.path(),
            "zoning.geojson",
            &collection(&[square_feature("z1", "UV", 0.0, 0.0, 4.0)]),
        );

        let mut config = test_config(dir.path(), &parcels, &zoning);
        config.input.crs.remove("parcels");

        let err = load_datasets(&config).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Load(LoadError::UnknownCrs { .. })
        ));
    }

    #[test]
    fn non_feature_collection_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let parcels = write_file(
            dir.path(),
            "parcels.geojson",
            r#"{"type":"Point","coordinates":[0.0,0.0]}"#,
        );
        let zoning = write_file(
            dir.path(),
            "zoning.geojson",
            &collection(&[square_feature("z1", "UV", 0.0, 0.0, 4.0)]),
        );

        let config = test_config(dir.path(), &parcels, &zoning);
        let err = load_datasets(&config).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Load(LoadError::Malformed { kind: "geojson", .. })
        ));
    }

    #[test]
    fn self_intersecting_parcel_is_a_geometry_error() {
        let dir = tempfile::tempdir().unwrap();
        let bowtie = r#"{"type":"Feature","properties":{"ID":"p1","ZONING":""},"geometry":{"type":"Polygon","coordinates":[[[0.0,0.0],[2.0,2.0],[2.0,0.0],[0.0,2.0],[0.0,0.0]]]}}"#;
        let parcels = write_file(
            dir.path(),
            "parcels.geojson",
            &collection(&[bowtie.to_string()]),
        );
        let zoning = write_file(
            dir.path(),
            "zoning.geojson",
            &collection(&[square_feature("z1", "UV", 0.0, 0.0, 4.0)]),
        );

        let config = test_config(dir.path(), &parcels, &zoning);
        let err = load_datasets(&config).unwrap_err();
        assert!(matches!(err, PipelineError::Geometry(_)));
    }

    #[test]
    fn equity_tracts_require_a_score_column() {
        let dir = tempfile::tempdir().unwrap();
        let parcels = write_file(
            dir.path(),
            "parcels.geojson",
            &collection(&[square_feature("p1", "", 0.0, 0.0, 1.0)]),
        );
        let zoning = write_file(
            dir.path(),
            "zoning.geojson",
            &collection(&[square_feature("z1", "UV", 0.0, 0.0, 4.0)]),
        );

        let mut config = test_config(dir.path(), &parcels, &zoning);
        config.input.equity_tracts = Some(zoning.clone());

        let err = load_datasets(&config).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
