use std::path::Path;

use super::ArchiveClient;
use crate::data::loader::load_sources;
use crate::data::model::RawRecord;
use crate::error::PipelineResult;
use crate::query::QueryParameters;

/// Answers cone searches from a catalog export already on disk.
///
/// Rows without a position cannot be placed in a cone and are never
/// returned. The query predicate is ignored; the quality filter runs later.
pub struct FileArchive {
    label: String,
    records: Vec<RawRecord>,
}

impl FileArchive {
    pub fn open(path: &Path) -> PipelineResult<Self> {
        let archive = Self::from_records(path.display().to_string(), load_sources(path)?);
        log::info!("Loaded {} sources from {}", archive.len(), path.display());
        Ok(archive)
    }

    pub fn from_records(label: impl Into<String>, records: Vec<RawRecord>) -> Self {
        Self {
            label: label.into(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ArchiveClient for FileArchive {
    fn name(&self) -> &str {
        &self.label
    }

    fn cone_search(&self, params: &QueryParameters) -> PipelineResult<Vec<RawRecord>> {
        let radius = params.radius().to_degrees();
        let limit = params.row_limit().unwrap_or(usize::MAX);
        let hits: Vec<RawRecord> = self
            .records
            .iter()
            .filter(|r| match (r.ra, r.dec) {
                (Some(ra), Some(dec)) => params.coord().separation_deg(ra, dec) <= radius,
                _ => false,
            })
            .take(limit)
            .cloned()
            .collect();
        log::debug!(
            "{}: {} of {} rows inside {}",
            self.label,
            hits.len(),
            self.records.len(),
            params.radius()
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Angle, Frame, SkyCoord};

    fn at(id: u64, ra: Option<f64>, dec: Option<f64>) -> RawRecord {
        RawRecord {
            source_id: id,
            ra,
            dec,
            ..Default::default()
        }
    }

    #[test]
    fn test_cone_selection_and_row_limit() {
        let archive = FileArchive::from_records(
            "test",
            vec![
                at(1, Some(10.0), Some(20.0)),
                at(2, Some(10.1), Some(20.0)),
                at(3, Some(12.0), Some(20.0)),
                at(4, None, Some(20.0)),
                at(5, Some(9.95), Some(20.05)),
            ],
        );
        let centre = SkyCoord::new(10.0, 20.0, Frame::Icrs).unwrap();

        let q = QueryParameters::builder(centre, Angle::arcmin(30.0)).build().unwrap();
        let ids: Vec<u64> = archive.cone_search(&q).unwrap().iter().map(|r| r.source_id).collect();
        assert_eq!(ids, vec![1, 2, 5]);

        let limited = QueryParameters::builder(centre, Angle::arcmin(30.0))
            .row_limit(2)
            .build()
            .unwrap();
        assert_eq!(archive.cone_search(&limited).unwrap().len(), 2);
    }

    #[test]
    fn test_open_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("omega_cen.csv");
        std::fs::write(
            &path,
            "source_id,ra,dec,parallax\n1,201.69,-47.48,0.2\n2,150.0,10.0,1.0\n",
        )
        .unwrap();
        let archive = FileArchive::open(&path).unwrap();
        assert_eq!(archive.len(), 2);

        let q = QueryParameters::builder(SkyCoord::new(201.6967, -47.4794, Frame::Icrs).unwrap(), Angle::arcmin(30.0))
            .build()
            .unwrap();
        let hits = archive.cone_search(&q).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_id, 1);
    }
}
