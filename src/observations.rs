//! HST observation listings from the MAST archive.
//!
//! Observations near a position are listed, narrowed by instrument and
//! calibration level, and their science products picked out by file name.
//! Downloading the FITS products themselves is left to the archive tools.

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::json;

use crate::data::loader::parse_json;
use crate::data::model::{CatalogTable, CellValue, Row};
use crate::error::{PipelineError, PipelineResult};
use crate::query::{Angle, SkyCoord};

pub const MAST_INVOKE_URL: &str = "https://mast.stsci.edu/api/v0/invoke";

/// Level 2: calibrated, ready-to-use science data.
pub const CALIBRATED_LEVEL: i64 = 2;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObservationRecord {
    pub obsid: String,
    pub instrument_name: Option<String>,
    pub target_name: Option<String>,
    pub filters: Option<String>,
    /// Exposure time in seconds.
    pub t_exptime: Option<f64>,
    pub calib_level: Option<i64>,
}

fn text(row: &Row, col: &str) -> Option<String> {
    row.get(col)
        .filter(|v| !v.is_null())
        .map(|v| v.to_string())
}

impl ObservationRecord {
    pub fn from_row(row: &Row) -> PipelineResult<Self> {
        let obsid = text(row, "obsid")
            .ok_or_else(|| PipelineError::Format("observation without obsid".into()))?;
        Ok(Self {
            obsid,
            instrument_name: text(row, "instrument_name"),
            target_name: text(row, "target_name"),
            filters: text(row, "filters"),
            t_exptime: row.get("t_exptime").and_then(CellValue::as_f64),
            calib_level: row.get("calib_level").and_then(|v| match v {
                CellValue::Integer(i) => Some(*i),
                other => other.as_f64().map(|f| f as i64),
            }),
        })
    }
}

/// One downloadable file belonging to an observation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProductRecord {
    pub obsid: String,
    pub product_filename: String,
    pub product_group_description: Option<String>,
}

impl ProductRecord {
    pub fn from_row(row: &Row) -> PipelineResult<Self> {
        let obsid = text(row, "obsID")
            .or_else(|| text(row, "obsid"))
            .ok_or_else(|| PipelineError::Format("product without obsID".into()))?;
        let product_filename = text(row, "productFilename")
            .ok_or_else(|| PipelineError::Format(format!("product of {obsid} has no file name")))?;
        Ok(Self {
            obsid,
            product_filename,
            product_group_description: text(row, "productGroupDescription"),
        })
    }
}

pub fn observations_from_table(table: &CatalogTable) -> PipelineResult<Vec<ObservationRecord>> {
    table.rows.iter().map(ObservationRecord::from_row).collect()
}

pub fn products_from_table(table: &CatalogTable) -> PipelineResult<Vec<ProductRecord>> {
    table.rows.iter().map(ProductRecord::from_row).collect()
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

pub fn by_instrument<'a>(
    observations: &'a [ObservationRecord],
    instrument: &str,
) -> Vec<&'a ObservationRecord> {
    observations
        .iter()
        .filter(|o| o.instrument_name.as_deref() == Some(instrument))
        .collect()
}

pub fn by_calib_level(observations: &[ObservationRecord], level: i64) -> Vec<&ObservationRecord> {
    observations
        .iter()
        .filter(|o| o.calib_level == Some(level))
        .collect()
}

/// Science-group products whose file name contains `suffix` (e.g. `drz.fits`),
/// at most `limit` of them.
pub fn science_products<'a>(
    products: &'a [ProductRecord],
    suffix: &str,
    limit: usize,
) -> Vec<&'a ProductRecord> {
    products
        .iter()
        .filter(|p| p.product_group_description.as_deref() == Some("SCIENCE"))
        .filter(|p| p.product_filename.contains(suffix))
        .take(limit)
        .collect()
}

// ---------------------------------------------------------------------------
// MAST requests
// ---------------------------------------------------------------------------

/// Observations of one collection within a cone.
#[derive(Debug, Clone)]
pub struct ObservationQuery {
    pub collection: String,
    pub coord: SkyCoord,
    pub radius: Angle,
}

impl ObservationQuery {
    pub fn hst(coord: SkyCoord, radius: Angle) -> PipelineResult<Self> {
        if !(radius.to_degrees() > 0.0) {
            return Err(PipelineError::Validation(format!(
                "search radius must be positive, got {radius}"
            )));
        }
        Ok(Self {
            collection: "HST".into(),
            coord,
            radius,
        })
    }

    /// MAST `invoke` request body; the radius goes out in degrees.
    pub fn request(&self) -> serde_json::Value {
        let (ra, dec) = self.coord.to_icrs();
        json!({
            "service": "Mast.Caom.Filtered.Position",
            "format": "json",
            "params": {
                "columns": "*",
                "filters": [{"paramName": "obs_collection", "values": [self.collection]}],
                "position": format!("{ra}, {dec}, {}", self.radius.to_degrees()),
            }
        })
    }
}

pub fn products_request(obsids: &[&str]) -> serde_json::Value {
    json!({
        "service": "Mast.Caom.Products",
        "format": "json",
        "params": {"obsid": obsids.join(",")}
    })
}

pub struct MastClient {
    endpoint: String,
    http: Client,
}

impl MastClient {
    pub fn new() -> PipelineResult<Self> {
        let http = Client::builder().timeout(None::<Duration>).build()?;
        Ok(Self {
            endpoint: MAST_INVOKE_URL.to_string(),
            http,
        })
    }

    fn invoke(&self, request: &serde_json::Value) -> PipelineResult<CatalogTable> {
        log::debug!("POST {} request={request}", self.endpoint);
        let response = self
            .http
            .post(&self.endpoint)
            .form(&[("request", request.to_string())])
            .send()
            .map_err(|e| PipelineError::Query(format!("request failed: {e}")))?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(PipelineError::Query(format!("MAST returned {status}")));
        }
        parse_json(&body).map_err(malformed)
    }

    pub fn observations(&self, query: &ObservationQuery) -> PipelineResult<Vec<ObservationRecord>> {
        observations_from_table(&self.invoke(&query.request())?).map_err(malformed)
    }

    pub fn products(&self, observations: &[&ObservationRecord]) -> PipelineResult<Vec<ProductRecord>> {
        if observations.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<&str> = observations.iter().map(|o| o.obsid.as_str()).collect();
        products_from_table(&self.invoke(&products_request(&ids))?).map_err(malformed)
    }
}

fn malformed(e: PipelineError) -> PipelineError {
    PipelineError::Query(format!("malformed MAST response: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OBSERVATIONS: &str = r#"{"status": "COMPLETE", "data": [
        {"obsid": "2003520266", "instrument_name": "ACS/WFC", "target_name": "MAYALL-II", "filters": "F606W", "t_exptime": 1200.0, "calib_level": 2},
        {"obsid": "2003520267", "instrument_name": "ACS/WFC", "target_name": "MAYALL-II", "filters": "F814W", "t_exptime": 1200.0, "calib_level": 3},
        {"obsid": "2003520268", "instrument_name": "WFC3/UVIS", "target_name": "G1", "filters": "F275W", "t_exptime": null, "calib_level": 2}
    ]}"#;

    #[test]
    fn test_instrument_and_level_selection() {
        let obs = observations_from_table(&parse_json(OBSERVATIONS).unwrap()).unwrap();
        assert_eq!(obs.len(), 3);
        assert_eq!(by_instrument(&obs, "ACS/WFC").len(), 2);
        assert_eq!(by_instrument(&obs, "WFC3/UVIS").len(), 1);
        let calibrated = by_calib_level(&obs, CALIBRATED_LEVEL);
        assert_eq!(calibrated.len(), 2);
        assert_eq!(calibrated[1].t_exptime, None);
    }

    #[test]
    fn test_science_products() {
        let json = r#"[
            {"obsID": "1", "productFilename": "j8hm01_drz.fits", "productGroupDescription": "SCIENCE"},
            {"obsID": "1", "productFilename": "j8hm01_flt.fits", "productGroupDescription": "SCIENCE"},
            {"obsID": "2", "productFilename": "j8hm02_drz.fits", "productGroupDescription": "PREVIEW"},
            {"obsID": "3", "productFilename": "j8hm03_drz.fits", "productGroupDescription": "SCIENCE"}
        ]"#;
        let products = products_from_table(&parse_json(json).unwrap()).unwrap();
        let picked = science_products(&products, "drz.fits", 5);
        let names: Vec<&str> = picked.iter().map(|p| p.product_filename.as_str()).collect();
        assert_eq!(names, vec!["j8hm01_drz.fits", "j8hm03_drz.fits"]);
        assert_eq!(science_products(&products, "drz.fits", 1).len(), 1);
    }

    #[test]
    fn test_request_uses_degrees() {
        let coord = SkyCoord::parse("00h32m46.51s", "+39d34m39.7s", crate::query::Frame::Icrs).unwrap();
        let q = ObservationQuery::hst(coord, Angle::arcsec(36.0)).unwrap();
        let req = q.request();
        assert_eq!(req["service"], "Mast.Caom.Filtered.Position");
        assert_eq!(req["params"]["filters"][0]["values"][0], "HST");
        let position = req["params"]["position"].as_str().unwrap();
        assert!(position.ends_with(", 0.01"));

        assert!(ObservationQuery::hst(coord, Angle::arcsec(0.0)).is_err());
    }

    #[test]
    fn test_products_request_joins_ids() {
        let req = products_request(&["1", "2"]);
        assert_eq!(req["params"]["obsid"], "1,2");
    }
}
