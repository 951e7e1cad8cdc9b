use std::collections::HashMap;

use geo::MultiPolygon;

/// A land-ownership polygon with its attribute record.
/// Immutable once loaded; geometry is already normalized to Web Mercator.
#[derive(Debug, Clone)]
pub struct Parcel {
    pub id: String,
    pub geometry: MultiPolygon<f64>,
    /// Pass-through attributes requested in the config (APN, land use, ...).
    pub attributes: HashMap<String, String>,
}

/// A municipal zoning polygon.
#[derive(Debug, Clone)]
pub struct ZoningDistrict {
    pub id: String,
    pub geometry: MultiPolygon<f64>,
    /// Raw zoning code as it appears in the source table, e.g. "R-1-5(PD)".
    pub code: String,
}

/// A census tract carrying the city's equity index score.
#[derive(Debug, Clone)]
pub struct EquityTract {
    pub id: String,
    pub geometry: MultiPolygon<f64>,
    pub score: f64,
}

/// The zoning district a parcel landed in, with the overlap that won.
#[derive(Debug, Clone)]
pub struct ZoningAssignment {
    pub district_id: String,
    pub code: String,
    pub overlap_sqm: f64,
}

/// A parcel after the spatial join. Exactly one exists per input parcel;
/// `assignment` is `None` for parcels overlapping no zoning district.
#[derive(Debug, Clone)]
pub struct JoinedParcel {
    pub parcel: Parcel,
    pub assignment: Option<ZoningAssignment>,
    pub equity_score: Option<f64>,
}

impl JoinedParcel {
    pub fn zoning_code(&self) -> Option<&str> {
        self.assignment.as_ref().map(|a| a.code.as_str())
    }
}
