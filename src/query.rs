use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::filter::QualityThresholds;
use crate::error::{PipelineError, PipelineResult};

/// Gaia DR3 source table queried by the cone search.
pub const GAIA_SOURCE_TABLE: &str = "gaiadr3.gaia_source";

/// Columns needed for an HR diagram plus the quality indicators.
pub const DEFAULT_COLUMNS: &[&str] = &[
    "source_id",
    "ra",
    "dec",
    "parallax",
    "parallax_error",
    "parallax_over_error",
    "phot_g_mean_mag",
    "phot_bp_mean_mag",
    "phot_rp_mean_mag",
    "ruwe",
    "radial_velocity",
];

// ---------------------------------------------------------------------------
// Angles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngularUnit {
    Deg,
    Arcmin,
    Arcsec,
    Mas,
}

impl AngularUnit {
    fn per_degree(self) -> f64 {
        match self {
            AngularUnit::Deg => 1.0,
            AngularUnit::Arcmin => 60.0,
            AngularUnit::Arcsec => 3600.0,
            AngularUnit::Mas => 3_600_000.0,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            AngularUnit::Deg => "deg",
            AngularUnit::Arcmin => "arcmin",
            AngularUnit::Arcsec => "arcsec",
            AngularUnit::Mas => "mas",
        }
    }
}

impl FromStr for AngularUnit {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deg" | "degree" | "degrees" | "d" => Ok(AngularUnit::Deg),
            "arcmin" | "amin" | "'" => Ok(AngularUnit::Arcmin),
            "arcsec" | "asec" | "\"" => Ok(AngularUnit::Arcsec),
            "mas" => Ok(AngularUnit::Mas),
            other => Err(PipelineError::Validation(format!(
                "unrecognised angular unit '{other}'"
            ))),
        }
    }
}

/// An angle with the unit it was given in, e.g. `30 arcmin`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Angle {
    pub value: f64,
    pub unit: AngularUnit,
}

impl Angle {
    pub fn new(value: f64, unit: AngularUnit) -> Self {
        Self { value, unit }
    }

    pub fn degrees(value: f64) -> Self {
        Self::new(value, AngularUnit::Deg)
    }

    pub fn arcmin(value: f64) -> Self {
        Self::new(value, AngularUnit::Arcmin)
    }

    pub fn arcsec(value: f64) -> Self {
        Self::new(value, AngularUnit::Arcsec)
    }

    pub fn to_degrees(&self) -> f64 {
        self.value / self.unit.per_degree()
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit.suffix())
    }
}

/// Parses `"30 arcmin"`, `"5arcsec"` or a bare number (degrees).
impl FromStr for Angle {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
            .unwrap_or(s.len());
        let (num, unit) = s.split_at(split);
        let value: f64 = num
            .trim()
            .parse()
            .map_err(|_| PipelineError::Validation(format!("invalid angle '{s}'")))?;
        let unit = if unit.trim().is_empty() {
            AngularUnit::Deg
        } else {
            unit.parse()?
        };
        Ok(Angle::new(value, unit))
    }
}

impl TryFrom<String> for Angle {
    type Error = PipelineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Angle> for String {
    fn from(a: Angle) -> Self {
        a.to_string()
    }
}

// ---------------------------------------------------------------------------
// Sky coordinates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frame {
    #[default]
    Icrs,
    /// FK5 / J2000, treated as coincident with ICRS at catalog precision.
    Fk5,
    /// Galactic longitude / latitude.
    Galactic,
}

// J2000 position of the north galactic pole and the galactic longitude of
// the north celestial pole.
const NGP_RA_DEG: f64 = 192.859_48;
const NGP_DEC_DEG: f64 = 27.128_25;
const NCP_GAL_LON_DEG: f64 = 122.931_92;

/// A validated sky position. For the galactic frame `lon`/`lat` are l/b.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyCoord {
    lon: f64,
    lat: f64,
    frame: Frame,
}

impl SkyCoord {
    /// Range-checked construction: longitude in [0, 360), latitude in [-90, 90].
    pub fn new(lon_deg: f64, lat_deg: f64, frame: Frame) -> PipelineResult<Self> {
        if !lon_deg.is_finite() || !(0.0..360.0).contains(&lon_deg) {
            return Err(PipelineError::Validation(format!(
                "right ascension {lon_deg} outside [0, 360)"
            )));
        }
        if !lat_deg.is_finite() || !(-90.0..=90.0).contains(&lat_deg) {
            return Err(PipelineError::Validation(format!(
                "declination {lat_deg} outside [-90, 90]"
            )));
        }
        Ok(Self {
            lon: lon_deg,
            lat: lat_deg,
            frame,
        })
    }

    /// Build from text such as `"13h26m47.2s"` / `"-47d28m46s"` or plain degrees.
    pub fn parse(ra: &str, dec: &str, frame: Frame) -> PipelineResult<Self> {
        let lon = match frame {
            Frame::Galactic => parse_degrees(ra)?,
            Frame::Icrs | Frame::Fk5 => parse_ra(ra)?,
        };
        Self::new(lon, parse_degrees(dec)?, frame)
    }

    /// Equatorial (ICRS) right ascension and declination in degrees.
    pub fn to_icrs(&self) -> (f64, f64) {
        match self.frame {
            Frame::Icrs | Frame::Fk5 => (self.lon, self.lat),
            Frame::Galactic => {
                let l = self.lon.to_radians();
                let b = self.lat.to_radians();
                let dec_g = NGP_DEC_DEG.to_radians();
                let dl = NCP_GAL_LON_DEG.to_radians() - l;

                let sin_dec = dec_g.sin() * b.sin() + dec_g.cos() * b.cos() * dl.cos();
                let y = b.cos() * dl.sin();
                let x = dec_g.cos() * b.sin() - dec_g.sin() * b.cos() * dl.cos();
                let ra = (NGP_RA_DEG + y.atan2(x).to_degrees()).rem_euclid(360.0);
                (ra, sin_dec.clamp(-1.0, 1.0).asin().to_degrees())
            }
        }
    }

    pub fn ra(&self) -> f64 {
        self.to_icrs().0
    }

    pub fn dec(&self) -> f64 {
        self.to_icrs().1
    }

    /// Great-circle separation in degrees (haversine form).
    pub fn separation_deg(&self, ra_deg: f64, dec_deg: f64) -> f64 {
        let (ra0, dec0) = self.to_icrs();
        let (ra0, dec0) = (ra0.to_radians(), dec0.to_radians());
        let (ra1, dec1) = (ra_deg.to_radians(), dec_deg.to_radians());
        let h = ((dec1 - dec0) / 2.0).sin().powi(2)
            + dec0.cos() * dec1.cos() * ((ra1 - ra0) / 2.0).sin().powi(2);
        (2.0 * h.sqrt().min(1.0).asin()).to_degrees()
    }
}

fn sexagesimal_parts(s: &str) -> PipelineResult<(f64, Vec<f64>)> {
    let s = s.trim();
    let (sign, body) = match s.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, s.strip_prefix('+').unwrap_or(s)),
    };
    let parts = body
        .split(|c: char| matches!(c, 'h' | 'd' | 'm' | 's' | ':' | ' ' | '°' | '\'' | '"'))
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse::<f64>()
                .map_err(|_| PipelineError::Validation(format!("invalid coordinate '{s}'")))
        })
        .collect::<PipelineResult<Vec<f64>>>()?;
    if parts.is_empty() || parts.len() > 3 {
        return Err(PipelineError::Validation(format!("invalid coordinate '{s}'")));
    }
    Ok((sign, parts))
}

fn combine(parts: &[f64]) -> f64 {
    parts
        .iter()
        .zip([1.0, 60.0, 3600.0])
        .map(|(v, div)| v / div)
        .sum()
}

/// Right ascension in degrees from `"13h26m47.2s"`, `"13:26:47.2"` or degrees.
pub fn parse_ra(s: &str) -> PipelineResult<f64> {
    let hours = s.contains('h') || s.contains(':');
    let (sign, parts) = sexagesimal_parts(s)?;
    let value = sign * combine(&parts);
    Ok(if hours { value * 15.0 } else { value })
}

/// Declination (or any degree-valued angle) from `"-47d28m46s"` or degrees.
pub fn parse_degrees(s: &str) -> PipelineResult<f64> {
    let (sign, parts) = sexagesimal_parts(s)?;
    Ok(sign * combine(&parts))
}

// ---------------------------------------------------------------------------
// QueryParameters
// ---------------------------------------------------------------------------

/// An immutable, validated cone-search request.
#[derive(Debug, Clone)]
pub struct QueryParameters {
    coord: SkyCoord,
    radius: Angle,
    columns: Vec<String>,
    predicate: Option<QualityThresholds>,
    row_limit: Option<usize>,
}

impl QueryParameters {
    pub fn builder(coord: SkyCoord, radius: Angle) -> QueryBuilder {
        QueryBuilder {
            coord,
            radius,
            columns: Vec::new(),
            predicate: None,
            row_limit: None,
        }
    }

    pub fn coord(&self) -> &SkyCoord {
        &self.coord
    }

    pub fn radius(&self) -> Angle {
        self.radius
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Archive-side predicate. Advisory only: results are always re-filtered.
    pub fn predicate(&self) -> Option<&QualityThresholds> {
        self.predicate.as_ref()
    }

    pub fn row_limit(&self) -> Option<usize> {
        self.row_limit
    }

    /// Render as an ADQL cone search over the Gaia DR3 source table.
    pub fn to_adql(&self) -> String {
        let (ra, dec) = self.coord.to_icrs();
        let top = self
            .row_limit
            .map(|n| format!("TOP {n} "))
            .unwrap_or_default();
        let mut adql = format!(
            "SELECT {top}{} FROM {GAIA_SOURCE_TABLE} WHERE 1=CONTAINS(POINT('ICRS', ra, dec), CIRCLE('ICRS', {ra}, {dec}, {}))",
            self.columns.join(", "),
            self.radius.to_degrees()
        );
        if let Some(p) = &self.predicate {
            adql.push_str(&format!(
                " AND parallax_over_error > {} AND ruwe < {}",
                p.min_parallax_over_error, p.max_ruwe
            ));
        }
        adql
    }
}

pub struct QueryBuilder {
    coord: SkyCoord,
    radius: Angle,
    columns: Vec<String>,
    predicate: Option<QualityThresholds>,
    row_limit: Option<usize>,
}

impl QueryBuilder {
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn predicate(mut self, thresholds: QualityThresholds) -> Self {
        self.predicate = Some(thresholds);
        self
    }

    pub fn row_limit(mut self, limit: usize) -> Self {
        self.row_limit = Some(limit);
        self
    }

    pub fn build(self) -> PipelineResult<QueryParameters> {
        let deg = self.radius.to_degrees();
        if !deg.is_finite() || deg <= 0.0 {
            return Err(PipelineError::Validation(format!(
                "search radius must be positive, got {}",
                self.radius
            )));
        }
        if self.row_limit == Some(0) {
            return Err(PipelineError::Validation("row limit must be positive".into()));
        }
        let columns = if self.columns.is_empty() {
            DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect()
        } else {
            self.columns
        };
        Ok(QueryParameters {
            coord: self.coord,
            radius: self.radius,
            columns,
            predicate: self.predicate,
            row_limit: self.row_limit,
        })
    }
}
