use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{PipelineError, PipelineResult};

// ---------------------------------------------------------------------------
// CellValue – a single cell of a catalog export
// ---------------------------------------------------------------------------

/// A dynamically-typed cell as it comes out of CSV, JSON or Parquet.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v:.4}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    /// Numeric view of the cell. NaN counts as missing.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) if !v.is_nan() => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::String(s) => s.trim().parse::<f64>().ok().filter(|v| !v.is_nan()),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            CellValue::Integer(i) => u64::try_from(*i).ok(),
            CellValue::String(s) => s.trim().parse().ok(),
            CellValue::Float(v) if v.fract() == 0.0 && *v >= 0.0 => Some(*v as u64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

/// One row of a catalog export: column name → value.
pub type Row = BTreeMap<String, CellValue>;

fn number(row: &Row, col: &str) -> Option<f64> {
    row.get(col).and_then(CellValue::as_f64)
}

// ---------------------------------------------------------------------------
// CatalogTable – a loaded export before it is typed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct CatalogTable {
    pub rows: Vec<Row>,
    /// Union of column names over all rows, sorted.
    pub column_names: Vec<String>,
}

impl CatalogTable {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let names: BTreeSet<String> = rows.iter().flat_map(|r| r.keys().cloned()).collect();
        CatalogTable {
            rows,
            column_names: names.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_names.iter().any(|c| c == name)
    }
}

// ---------------------------------------------------------------------------
// Gaia source records
// ---------------------------------------------------------------------------

/// One catalog source as returned by the archive. Any measured field may be null.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecord {
    pub source_id: u64,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
    /// Parallax in milliarcseconds.
    pub parallax: Option<f64>,
    pub parallax_error: Option<f64>,
    pub parallax_over_error: Option<f64>,
    pub phot_g_mean_mag: Option<f64>,
    pub phot_bp_mean_mag: Option<f64>,
    pub phot_rp_mean_mag: Option<f64>,
    pub ruwe: Option<f64>,
    pub radial_velocity: Option<f64>,
}

impl RawRecord {
    pub fn from_row(row: &Row) -> PipelineResult<Self> {
        let source_id = row
            .get("source_id")
            .and_then(CellValue::as_u64)
            .ok_or_else(|| PipelineError::Format("row without a valid source_id".into()))?;
        Ok(RawRecord {
            source_id,
            ra: number(row, "ra"),
            dec: number(row, "dec"),
            parallax: number(row, "parallax"),
            parallax_error: number(row, "parallax_error"),
            parallax_over_error: number(row, "parallax_over_error"),
            phot_g_mean_mag: number(row, "phot_g_mean_mag"),
            phot_bp_mean_mag: number(row, "phot_bp_mean_mag"),
            phot_rp_mean_mag: number(row, "phot_rp_mean_mag"),
            ruwe: number(row, "ruwe"),
            radial_velocity: number(row, "radial_velocity"),
        })
    }

    /// Catalog `parallax_over_error`, or the ratio recomputed when the column is null.
    pub fn effective_parallax_over_error(&self) -> Option<f64> {
        self.parallax_over_error.or_else(|| match (self.parallax, self.parallax_error) {
            (Some(p), Some(e)) if e > 0.0 => Some(p / e),
            _ => None,
        })
    }
}

/// A source the calculator can use: photometry and a positive parallax are
/// unwrapped. The quality columns are always present after the quality cuts
/// and may be null when the cuts were switched off.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredRecord {
    pub source_id: u64,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
    pub parallax: f64,
    pub parallax_error: Option<f64>,
    pub parallax_over_error: Option<f64>,
    pub phot_g_mean_mag: f64,
    pub phot_bp_mean_mag: f64,
    pub phot_rp_mean_mag: f64,
    pub ruwe: Option<f64>,
    pub radial_velocity: Option<f64>,
}

impl From<FilteredRecord> for RawRecord {
    fn from(r: FilteredRecord) -> Self {
        RawRecord {
            source_id: r.source_id,
            ra: r.ra,
            dec: r.dec,
            parallax: Some(r.parallax),
            parallax_error: r.parallax_error,
            parallax_over_error: r.parallax_over_error,
            phot_g_mean_mag: Some(r.phot_g_mean_mag),
            phot_bp_mean_mag: Some(r.phot_bp_mean_mag),
            phot_rp_mean_mag: Some(r.phot_rp_mean_mag),
            ruwe: r.ruwe,
            radial_velocity: r.radial_velocity,
        }
    }
}

/// A filtered source with its HR-diagram coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRecord {
    pub source: FilteredRecord,
    /// G_BP - G_RP colour index.
    pub bp_rp_color: f64,
    /// Absolute G magnitude.
    pub abs_g_mag: f64,
}

// ---------------------------------------------------------------------------
// Mass-luminosity records
// ---------------------------------------------------------------------------

/// A star with a known mass and bolometric absolute magnitude.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MassLuminosityRecord {
    pub id: String,
    /// Mass in solar masses.
    pub mass: Option<f64>,
    /// Bolometric absolute magnitude.
    pub m_bol: Option<f64>,
}

impl MassLuminosityRecord {
    /// Accepts `id`/`name` for the identifier and `mass`, `m_bol`/`mbol` columns.
    pub fn from_row(index: usize, row: &Row) -> Self {
        let id = ["id", "name", "source_id"]
            .iter()
            .find_map(|k| row.get(*k).filter(|v| !v.is_null()))
            .map(|v| v.to_string())
            .unwrap_or_else(|| format!("row {index}"));
        MassLuminosityRecord {
            id,
            mass: number(row, "mass"),
            m_bol: number(row, "m_bol").or_else(|| number(row, "mbol")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMassLuminosity {
    pub id: String,
    pub log_mass: f64,
    /// L / L_sun.
    pub luminosity: f64,
    pub log_luminosity: f64,
}
