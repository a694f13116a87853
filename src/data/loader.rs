use std::path::Path;

use anyhow::{bail, Context, Result};

use super::model::{Dataset, Measurement, SampleRecord, SampleType, MISSING};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a run of sample records from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.json` – `[{ "name": ..., "sample_type": "Unk", "measurements": [...] }, ...]`
/// * `.csv`  – long format, one row per sample × analyte
pub fn load_file(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }?;

    log::info!(
        "loaded {} samples x {} analytes from {}",
        dataset.len(),
        dataset.analytes.len(),
        path.display()
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (missing readings are `null`):
///
/// ```json
/// [
///   {
///     "method": "ICP-SS",
///     "name": "Soil B run 2",
///     "run_time": "2017-03-01 10:42",
///     "sample_type": "QC",
///     "repeats": 3,
///     "measurements": [
///       { "analyte": "Al", "units": "ppm", "average": 2.11, "std_dev": 0.02, "rsd": 0.9 }
///     ]
///   }
/// ]
/// ```
fn load_json(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let records: Vec<SampleRecord> = serde_json::from_str(&text).context("parsing JSON")?;
    Ok(Dataset::from_records(
        records.into_iter().map(normalize_units).collect(),
    ))
}

/// Rebuild a record with instrument unit aliases replaced.
fn normalize_units(record: SampleRecord) -> SampleRecord {
    if !record.measurements().iter().any(|m| m.units() == "ppm") {
        return record;
    }
    let measurements = record
        .measurements()
        .iter()
        .map(|m| {
            Measurement::new(
                m.analyte_name(),
                clean_units(m.units()),
                m.average(),
                m.std_dev(),
                m.rsd(),
            )
        })
        .collect();
    SampleRecord::new(
        record.method(),
        record.name(),
        record.comment(),
        record.run_timestamp(),
        record.sample_type(),
        record.repeat_count(),
        measurements,
    )
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row, then one row per sample × analyte.
///
/// Required columns: `name`, `sample_type`, `analyte`, `average`.
/// Optional: `method`, `comment`, `run_time`, `repeats`, `units`, `std_dev`,
/// `rsd`. Consecutive rows sharing `name` and `run_time` form one sample; an
/// analyte seen twice starts the next sample, so back-to-back runs with the
/// same name and no timestamp stay apart.
fn load_csv(path: &Path) -> Result<Dataset> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let cols = CsvColumns::locate(&headers)?;

    let mut records = Vec::new();
    let mut pending: Option<PendingSample> = None;

    for (row_no, result) in reader.records().enumerate() {
        let row = result.with_context(|| format!("CSV row {row_no}"))?;
        let field = |idx: Option<usize>| idx.and_then(|i| row.get(i)).unwrap_or("").trim();

        let name = field(Some(cols.name));
        let run_time = field(cols.run_time);
        let analyte = field(Some(cols.analyte));
        let same_sample = pending.as_ref().is_some_and(|p| {
            p.name == name && p.run_time == run_time && !p.has_analyte(analyte)
        });

        if !same_sample {
            if let Some(done) = pending.take() {
                records.push(done.finish());
            }
            let type_code = field(Some(cols.sample_type));
            let sample_type = SampleType::from_code(type_code).with_context(|| {
                format!("Row {row_no}: unexpected sample type '{type_code}'")
            })?;
            let repeats = match field(cols.repeats) {
                "" => 0,
                s => s
                    .parse::<u32>()
                    .with_context(|| format!("Row {row_no}: '{s}' is not a repeat count"))?,
            };
            pending = Some(PendingSample {
                method: field(cols.method).to_string(),
                name: name.to_string(),
                comment: field(cols.comment).to_string(),
                run_time: run_time.to_string(),
                sample_type,
                repeats,
                measurements: Vec::new(),
            });
        }

        let reading = parse_reading(
            field(Some(cols.average)),
            field(cols.std_dev),
            field(cols.rsd),
        )
        .with_context(|| format!("Row {row_no}: bad reading"))?;

        if let Some(p) = pending.as_mut() {
            p.measurements.push(Measurement::new(
                analyte,
                clean_units(field(cols.units)),
                reading.0,
                reading.1,
                reading.2,
            ));
        }
    }

    if let Some(done) = pending.take() {
        records.push(done.finish());
    }

    Ok(Dataset::from_records(records))
}

struct CsvColumns {
    name: usize,
    sample_type: usize,
    analyte: usize,
    average: usize,
    method: Option<usize>,
    comment: Option<usize>,
    run_time: Option<usize>,
    repeats: Option<usize>,
    units: Option<usize>,
    std_dev: Option<usize>,
    rsd: Option<usize>,
}

impl CsvColumns {
    fn locate(headers: &[String]) -> Result<Self> {
        let find = |col: &str| headers.iter().position(|h| h == col);
        let require = |col: &str| find(col).with_context(|| format!("CSV missing '{col}' column"));
        Ok(CsvColumns {
            name: require("name")?,
            sample_type: require("sample_type")?,
            analyte: require("analyte")?,
            average: require("average")?,
            method: find("method"),
            comment: find("comment"),
            run_time: find("run_time"),
            repeats: find("repeats"),
            units: find("units"),
            std_dev: find("std_dev"),
            rsd: find("rsd"),
        })
    }
}

struct PendingSample {
    method: String,
    name: String,
    comment: String,
    run_time: String,
    sample_type: SampleType,
    repeats: u32,
    measurements: Vec<Measurement>,
}

impl PendingSample {
    fn has_analyte(&self, analyte: &str) -> bool {
        self.measurements.iter().any(|m| m.analyte_name() == analyte)
    }

    fn finish(self) -> SampleRecord {
        SampleRecord::new(
            self.method,
            self.name,
            self.comment,
            self.run_time,
            self.sample_type,
            self.repeats,
            self.measurements,
        )
    }
}

// -- Instrument value cleaning --

fn clean_units(units: &str) -> &str {
    if units == "ppm" {
        "mg/L"
    } else {
        units
    }
}

/// Parse (average, std_dev, rsd) as exported by the instrument.
///
/// An average containing `*`, or a std-dev / RSD containing `-`, means the
/// instrument had no usable reading: all three become missing.
fn parse_reading(avg: &str, sd: &str, rsd: &str) -> Result<(f64, f64, f64)> {
    if avg.contains('*') || sd.contains('-') || rsd.contains('-') {
        return Ok((MISSING, MISSING, MISSING));
    }
    Ok((parse_value(avg)?, parse_value(sd)?, parse_value(rsd)?))
}

/// Parse one number, dropping a leading alphabetic flag such as `F 1.23`.
fn parse_value(raw: &str) -> Result<f64> {
    let s = strip_flag(raw.trim());
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return Ok(MISSING);
    }
    s.parse::<f64>()
        .with_context(|| format!("'{raw}' is not a number"))
}

fn strip_flag(s: &str) -> &str {
    match s.split_once(char::is_whitespace) {
        Some((flag, rest)) if flag.chars().all(|c| c.is_ascii_alphabetic()) => rest.trim(),
        _ => s,
    }
}
