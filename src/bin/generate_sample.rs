use rusty_assay::data::model::{Measurement, SampleRecord, SampleType};

const ANALYTES: [&str; 6] = ["Al", "Ca", "Fe", "Mg", "Mn", "Zn"];

/// Deterministic splitmix64 stream; enough for reproducible replicate noise.
struct SimpleRng(u64);

impl SimpleRng {
    fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        ((z ^ (z >> 31)) >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        mean + std_dev * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

/// One sample run: three instrument repeats around `levels`, summarised the
/// way the instrument exports them.
fn run(
    rng: &mut SimpleRng,
    name: &str,
    sample_type: SampleType,
    minute: u32,
    levels: &[f64],
    noise: f64,
) -> SampleRecord {
    let measurements = ANALYTES
        .iter()
        .zip(levels)
        .map(|(analyte, &level)| {
            let repeats: Vec<f64> = (0..3)
                .map(|_| rng.gauss(level, noise.max(level * 0.01)))
                .collect();
            let avg = repeats.iter().sum::<f64>() / 3.0;
            let sd = (repeats.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / 2.0).sqrt();
            let rsd = if avg.abs() > 0.0 { sd / avg * 100.0 } else { 0.0 };
            Measurement::new(*analyte, "mg/L", avg, sd, rsd)
        })
        .collect();
    SampleRecord::new(
        "ICP-SS",
        name,
        "",
        format!("2017-03-01 {:02}:{:02}", 9 + minute / 60, minute % 60),
        sample_type,
        3,
        measurements,
    )
}

fn main() {
    let mut rng = SimpleRng(42);
    let mut records = Vec::new();
    let mut minute = 0;
    let mut next = |rng: &mut SimpleRng, name: &str, ty, levels: &[f64], noise| {
        minute += 4;
        run(rng, name, ty, minute, levels, noise)
    };

    for (i, level) in [0.0, 1.0, 5.0, 10.0].iter().enumerate() {
        let levels = [*level; 6];
        records.push(next(&mut rng, &format!("Std {i}"), SampleType::Calibration, &levels, 0.002));
    }

    let soil_b = [2.1, 4.5, 1.8, 0.9, 0.05, 0.12];
    let ccv = [1.0; 6];
    for round in 1..=3 {
        records.push(next(
            &mut rng,
            &format!("Instrument Blank {round}"),
            SampleType::QC,
            &[0.0; 6],
            0.004,
        ));
        records.push(next(&mut rng, &format!("CCV {round}"), SampleType::QC, &ccv, 0.01));
        records.push(next(
            &mut rng,
            &format!("Soil B run {round}"),
            SampleType::QC,
            &soil_b,
            0.02,
        ));
    }

    let sites: [(&str, [f64; 6]); 3] = [
        ("River", [0.8, 35.0, 0.4, 8.0, 0.02, 0.01]),
        ("Lake", [0.1, 18.0, 0.05, 4.0, 0.004, 0.003]),
        ("Well", [0.02, 60.0, 1.2, 15.0, 0.3, 0.08]),
    ];
    for (site, base) in &sites {
        for rep in 1..=4 {
            // scale all analytes together so the matrices show co-variation
            let dilution = 0.6 + 0.2 * rep as f64;
            let levels: Vec<f64> = base.iter().map(|v| v * dilution).collect();
            records.push(next(
                &mut rng,
                &format!("{site} {rep}"),
                SampleType::Unknown,
                &levels,
                0.005,
            ));
        }
    }

    let output_path = "sample_data.json";
    let file = std::fs::File::create(output_path).expect("Failed to create output file");
    serde_json::to_writer_pretty(file, &records).expect("Failed to write samples");

    println!(
        "Wrote {} samples ({} analytes each) to {output_path}",
        records.len(),
        ANALYTES.len()
    );
}
