use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Omega Centauri, degrees.
const CENTRE: (f64, f64) = (201.6967, -47.4794);
/// About 5.2 kpc.
const CLUSTER_PARALLAX: f64 = 0.19;

const COLUMNS: [&str; 11] = [
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

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// One catalog row; `None` is written as a null.
struct Source {
    source_id: i64,
    values: [Option<f64>; 10],
}

fn star(rng: &mut SimpleRng, id: i64, color: f64, abs_mag: f64) -> Source {
    let parallax = rng.gauss(CLUSTER_PARALLAX, 0.01);
    let parallax_error = rng.uniform(0.015, 0.035);
    let g = abs_mag + 5.0 * (1000.0 / parallax).log10() - 5.0;
    let ra = CENTRE.0 + rng.gauss(0.0, 0.12) / CENTRE.1.to_radians().cos();
    let dec = CENTRE.1 + rng.gauss(0.0, 0.12);
    let rv = (rng.next_f64() < 0.2).then(|| rng.gauss(232.0, 15.0));
    Source {
        source_id: id,
        values: [
            Some(ra),
            Some(dec),
            Some(parallax),
            Some(parallax_error),
            Some(parallax / parallax_error),
            Some(g),
            Some(g + 0.4 * color),
            Some(g - 0.6 * color),
            Some(rng.uniform(0.85, 1.3)),
            rv,
        ],
    }
}

fn generate(rng: &mut SimpleRng) -> Vec<Source> {
    let mut rows = Vec::new();
    let mut id = 6_083_000_000_000_000_000_i64;
    let mut next_id = || {
        id += 1;
        id
    };

    // main sequence and turn-off
    for _ in 0..3000 {
        let c = rng.uniform(0.45, 1.8);
        let m = 3.5 + 4.8 * (c - 0.45) + rng.gauss(0.0, 0.15);
        rows.push(star(rng, next_id(), c, m));
    }
    // red giant branch
    for _ in 0..800 {
        let c = rng.uniform(0.9, 1.6);
        let m = 2.5 - 5.5 * (c - 0.9) + rng.gauss(0.0, 0.2);
        rows.push(star(rng, next_id(), c, m));
    }
    // horizontal branch
    for _ in 0..200 {
        let c = rng.uniform(-0.1, 0.8);
        let m = rng.gauss(0.6, 0.1);
        rows.push(star(rng, next_id(), c, m));
    }

    // rows the quality filter has to remove
    for i in 0..400 {
        let c = rng.uniform(0.5, 1.5);
        let m = rng.uniform(2.0, 7.0);
        let mut s = star(rng, next_id(), c, m);
        match i % 4 {
            0 => s.values[6] = None,
            1 => s.values[8] = Some(rng.uniform(1.5, 4.0)),
            2 => {
                let p = -rng.uniform(0.01, 0.3);
                s.values[2] = Some(p);
                s.values[4] = s.values[3].map(|e| p / e);
            }
            _ => {
                let e = rng.uniform(0.1, 0.5);
                s.values[3] = Some(e);
                s.values[4] = s.values[2].map(|p| p / e);
            }
        }
        rows.push(s);
    }
    rows
}

fn write_parquet(rows: &[Source], path: &Path) -> Result<()> {
    let mut fields = vec![Field::new("source_id", DataType::Int64, false)];
    fields.extend(
        COLUMNS[1..]
            .iter()
            .map(|name| Field::new(*name, DataType::Float64, true)),
    );
    let schema = Arc::new(Schema::new(fields));

    let mut arrays: Vec<ArrayRef> = vec![Arc::new(Int64Array::from(
        rows.iter().map(|r| r.source_id).collect::<Vec<_>>(),
    ))];
    for col in 0..10 {
        arrays.push(Arc::new(Float64Array::from(
            rows.iter().map(|r| r.values[col]).collect::<Vec<_>>(),
        )));
    }

    let batch = RecordBatch::try_new(schema.clone(), arrays)?;
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn write_csv(rows: &[Source], path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(COLUMNS)?;
    for r in rows {
        let mut record = vec![r.source_id.to_string()];
        record.extend(
            r.values
                .iter()
                .map(|v| v.map(|x| format!("{x:.6}")).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Detached binaries with dynamical masses; `L ∝ M^3.5` plus scatter.
fn write_mass_luminosity(rng: &mut SimpleRng, path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["id", "mass", "m_bol"])?;
    for i in 0..60 {
        let mass: f64 = 10f64.powf(rng.uniform(-0.7, 1.2));
        let m_bol = 4.74 - 2.5 * 3.5 * mass.log10() + rng.gauss(0.0, 0.2);
        writer.write_record([format!("binary-{i:02}"), format!("{mass:.4}"), format!("{m_bol:.3}")])?;
    }
    // no dynamical mass
    writer.write_record(["binary-xx", "", "3.100"])?;
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let out_dir = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| ".".into());
    std::fs::create_dir_all(&out_dir)?;
    let mut rng = SimpleRng::new(42);

    let rows = generate(&mut rng);
    write_parquet(&rows, &out_dir.join("sample_cluster.parquet"))?;
    write_csv(&rows, &out_dir.join("sample_cluster.csv"))?;
    write_mass_luminosity(&mut rng, &out_dir.join("sample_mass_luminosity.csv"))?;

    println!(
        "Wrote {} sources around RA {:.4}, Dec {:.4} to {}",
        rows.len(),
        CENTRE.0,
        CENTRE.1,
        out_dir.display()
    );
    Ok(())
}
