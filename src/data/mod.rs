/// Data layer: core types and loading.
///
/// Architecture:
/// ```text
///  .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │    Dataset    │  Vec<SampleRecord>, analyte order
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ classify  │  records → buckets → SampleGroups
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
