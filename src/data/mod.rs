/// Data layer: catalog rows, loading, quality filtering and derived quantities.
///
/// Architecture:
/// ```text
///  TAP response / .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse → CatalogTable → Vec<RawRecord>
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  quality predicates → Vec<FilteredRecord>
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  derive   │  colour, absolute magnitude, log L / log M
///   └──────────┘
/// ```

pub mod derive;
pub mod filter;
pub mod loader;
pub mod model;
