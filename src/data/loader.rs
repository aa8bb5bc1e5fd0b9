use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt32Type,
    UInt64Type,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CatalogTable, CellValue, MassLuminosityRecord, RawRecord, Row};
use crate::error::{PipelineError, PipelineResult};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a catalog export.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – one column per catalog field (recommended for large cones)
/// * `.json`    – `[{ "source_id": ..., "ra": ..., ... }, ...]` or `{"data": [...]}`
/// * `.csv`     – header row with column names, empty cells are nulls
pub fn load_table(path: &Path) -> PipelineResult<CatalogTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        "csv" => read_csv(std::fs::File::open(path)?)?,
        other => {
            return Err(PipelineError::Format(format!(
                "unsupported file extension: .{other}"
            )))
        }
    };
    log::debug!(
        "loaded {} rows with columns {:?} from {}",
        table.len(),
        table.column_names,
        path.display()
    );
    Ok(table)
}

/// Load a Gaia-style source export.
pub fn load_sources(path: &Path) -> PipelineResult<Vec<RawRecord>> {
    sources_from_table(&load_table(path)?)
}

/// Load a mass / bolometric magnitude table.
pub fn load_mass_luminosity(path: &Path) -> PipelineResult<Vec<MassLuminosityRecord>> {
    let table = load_table(path)?;
    Ok(table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| MassLuminosityRecord::from_row(i, row))
        .collect())
}

pub fn sources_from_table(table: &CatalogTable) -> PipelineResult<Vec<RawRecord>> {
    table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            RawRecord::from_row(row).map_err(|e| PipelineError::Format(format!("row {i}: {e}")))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON (`df.to_json(orient='records')`), optionally wrapped
/// in an object under `"data"` as archive APIs return it.
fn load_json(path: &Path) -> PipelineResult<CatalogTable> {
    let text = std::fs::read_to_string(path)?;
    parse_json(&text)
}

pub fn parse_json(text: &str) -> PipelineResult<CatalogTable> {
    let root: JsonValue = serde_json::from_str(text)?;
    let records = match &root {
        JsonValue::Array(items) => items,
        JsonValue::Object(obj) => obj
            .get("data")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| PipelineError::Format("expected an array or a 'data' array".into()))?,
        _ => return Err(PipelineError::Format("expected top-level JSON array".into())),
    };

    let rows = records
        .iter()
        .enumerate()
        .map(|(i, rec)| {
            let obj = rec
                .as_object()
                .ok_or_else(|| PipelineError::Format(format!("row {i} is not a JSON object")))?;
            Ok(obj
                .iter()
                .map(|(k, v)| (k.clone(), json_to_cell(v)))
                .collect::<Row>())
        })
        .collect::<PipelineResult<Vec<Row>>>()?;

    Ok(CatalogTable::from_rows(rows))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV with a header row. Also used for TAP `FORMAT=csv` responses.
pub fn read_csv<R: Read>(input: R) -> PipelineResult<CatalogTable> {
    let mut reader = csv::Reader::from_reader(input);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(col, value)| (col.clone(), guess_cell_type(value)))
            .collect();
        rows.push(row);
    }

    let mut table = CatalogTable::from_rows(rows);
    // Keep header order for exports with no rows, so column checks still work.
    if table.is_empty() {
        table.column_names = headers;
    }
    Ok(table)
}

fn guess_cell_type(s: &str) -> CellValue {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("null") || s.eq_ignore_ascii_case("nan") {
        return CellValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return CellValue::Float(f);
    }
    if s == "true" || s == "false" {
        return CellValue::Bool(s == "true");
    }
    CellValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Every column becomes a cell per row; nulls stay nulls.
///
/// Gaia archive Parquet exports load as-is; so do tables written from
/// pandas or polars.
fn load_parquet(path: &Path) -> PipelineResult<CatalogTable> {
    let file = std::fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        let schema = batch.schema();
        let columns: Vec<(String, &Arc<dyn Array>)> = schema
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(f, c)| (f.name().clone(), c))
            .collect();

        for row in 0..batch.num_rows() {
            rows.push(
                columns
                    .iter()
                    .map(|(name, col)| (name.clone(), extract_cell(col, row)))
                    .collect::<Row>(),
            );
        }
    }

    Ok(CatalogTable::from_rows(rows))
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => CellValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => CellValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int8 => CellValue::Integer(col.as_primitive::<Int8Type>().value(row) as i64),
        DataType::Int16 => CellValue::Integer(col.as_primitive::<Int16Type>().value(row) as i64),
        DataType::Int32 => CellValue::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::UInt32 => CellValue::Integer(col.as_primitive::<UInt32Type>().value(row) as i64),
        DataType::UInt64 => {
            let v = col.as_primitive::<UInt64Type>().value(row);
            i64::try_from(v)
                .map(CellValue::Integer)
                .unwrap_or_else(|_| CellValue::String(v.to_string()))
        }
        DataType::Float32 => {
            CellValue::Float(col.as_primitive::<Float32Type>().value(row) as f64)
        }
        DataType::Float64 => CellValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => CellValue::Bool(col.as_boolean().value(row)),
        other => CellValue::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use arrow::array::{Float64Array, Int64Array};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    const GAIA_CSV: &str = "\
source_id,ra,dec,parallax,parallax_error,phot_g_mean_mag,phot_bp_mean_mag,phot_rp_mean_mag,ruwe
1001,201.70,-47.48,2.0,0.1,15.0,15.4,14.5,1.0
1002,201.71,-47.47,,0.2,16.1,,15.2,1.1
";

    #[test]
    fn test_read_csv_with_empty_cells() {
        let table = read_csv(GAIA_CSV.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        let sources = sources_from_table(&table).unwrap();
        assert_eq!(sources[0].source_id, 1001);
        assert_eq!(sources[0].parallax, Some(2.0));
        assert_eq!(sources[1].parallax, None);
        assert_eq!(sources[1].phot_bp_mean_mag, None);
        assert_eq!(sources[1].ruwe, Some(1.1));
    }

    #[test]
    fn test_header_only_csv_keeps_columns() {
        let table = read_csv("source_id,ra,dec\n".as_bytes()).unwrap();
        assert!(table.is_empty());
        assert!(table.has_column("ra"));
    }

    #[test]
    fn test_json_records_and_wrapped_data() {
        let plain = parse_json(r#"[{"source_id": 7, "parallax": null, "ruwe": 1.2}]"#).unwrap();
        let s = sources_from_table(&plain).unwrap();
        assert_eq!(s[0].source_id, 7);
        assert_eq!(s[0].parallax, None);
        assert_eq!(s[0].ruwe, Some(1.2));

        let wrapped = parse_json(r#"{"status": "COMPLETE", "data": [{"obsid": "2003"}]}"#).unwrap();
        assert_eq!(wrapped.len(), 1);
        assert!(parse_json(r#"{"rows": []}"#).is_err());
    }

    #[test]
    fn test_load_table_dispatch_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("cone.csv");
        std::fs::File::create(&csv_path)
            .unwrap()
            .write_all(GAIA_CSV.as_bytes())
            .unwrap();
        assert_eq!(load_sources(&csv_path).unwrap().len(), 2);

        let txt = dir.path().join("cone.txt");
        std::fs::write(&txt, "nope").unwrap();
        assert!(matches!(load_table(&txt), Err(PipelineError::Format(_))));
    }

    #[test]
    fn test_export_without_source_id_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("positions.csv");
        std::fs::write(&path, "ra,dec,parallax\n201.7,-47.5,2.0\n").unwrap();
        match load_sources(&path) {
            Err(PipelineError::Format(msg)) => assert!(msg.contains("row 0")),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_load_parquet_with_nulls() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("source_id", DataType::Int64, false),
            Field::new("parallax", DataType::Float64, true),
            Field::new("ruwe", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(Float64Array::from(vec![Some(1.5), None])),
                Arc::new(Float64Array::from(vec![Some(0.9), Some(1.8)])),
            ],
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cone.parquet");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let sources = load_sources(&path).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].parallax, Some(1.5));
        assert_eq!(sources[1].parallax, None);
        assert_eq!(sources[1].ruwe, Some(1.8));
    }

    #[test]
    fn test_load_mass_luminosity_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binaries.csv");
        std::fs::write(&path, "name,mass,m_bol\nSun,1.0,4.74\nSirius A,2.06,1.35\n").unwrap();
        let rows = load_mass_luminosity(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].id, "Sirius A");
        assert_eq!(rows[0].m_bol, Some(4.74));
    }
}
