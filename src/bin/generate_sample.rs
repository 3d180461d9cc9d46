use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::{json, Value};

const ANTIGENS: &[(&str, &str, &str)] = &[
    ("14846I", "A/VIETNAM/1194/2004-NIBRG-14", "E2"),
    ("2U7GA8", "A/HONG-KONG/213/2003", "SIAT1"),
    ("ARTLF7", "A/TURKEY/1/2005", "E4"),
    ("X8K2Q1", "A/INDONESIA/5/2005", "MDCK2/SIAT3"),
    ("P0LM44", "A/ANHUI/1/2005", "E5"),
    ("Q9E1ZA", "A/EGYPT/321/2007", "SIAT2"),
];

/// `(serum id, long name, antigen raised against)`.
const SERA: &[(&str, &str, &str)] = &[
    ("CC042E", "A/VIETNAM/1194/2004-NIBRG-14 F12", "14846I"),
    ("77POTS", "A/HONG-KONG/213/2003 F3", "2U7GA8"),
    ("M3NB71", "A/INDONESIA/5/2005 F7", "X8K2Q1"),
    ("K2PD09", "A/VIETNAM/1194/2004-NIBRG-14 F15", "14846I"),
];

/// Lowest and highest dilutions read on a plate.
const LOWER_BOUND: u32 = 10;
const UPPER_BOUND: u32 = 1280;

/// SplitMix64, enough for reproducible fixtures.
struct SplitMix(u64);

impl SplitMix {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n
    }
}

/// Homologous pairs start near the top of the plate; each step away from
/// the diagonal loses a few two-fold dilutions.
fn titer_token(homologous: bool, rng: &mut SplitMix) -> String {
    let start: i64 = if homologous { 8 } else { 3 };
    let steps = start - rng.below(5) as i64;
    if steps < 0 {
        return format!("<{LOWER_BOUND}");
    }
    let value = LOWER_BOUND * 2u32.pow(steps as u32);
    if value > UPPER_BOUND {
        format!(">{UPPER_BOUND}")
    } else {
        value.to_string()
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir).context("creating output directory")?;

    let mut rng = SplitMix(42);

    let antigens: Vec<Value> = ANTIGENS
        .iter()
        .map(|&(id, long, passage)| json!({ "id": id, "long": long, "passage": passage, "wildtype": true }))
        .collect();
    let sera: Vec<Value> = SERA
        .iter()
        .map(|&(id, long, strain_id)| json!({ "id": id, "long": long, "strain_id": strain_id }))
        .collect();

    let titers: Vec<Vec<String>> = ANTIGENS
        .iter()
        .map(|&(antigen_id, _, _)| {
            SERA.iter()
                .map(|&(_, _, strain_id)| titer_token(strain_id == antigen_id, &mut rng))
                .collect()
        })
        .collect();

    let results = json!([{
        "results": [{
            "file": "sample_plate.csv",
            "antigen_ids": ANTIGENS.iter().map(|a| a.0).collect::<Vec<_>>(),
            "serum_ids": SERA.iter().map(|s| s.0).collect::<Vec<_>>(),
            "titers": titers,
        }]
    }]);

    for (name, value) in [
        ("antigens.json", Value::from(antigens)),
        ("sera.json", Value::from(sera)),
        ("results.json", results),
    ] {
        let path = out_dir.join(name);
        let text = serde_json::to_string_pretty(&value)?;
        std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    }

    println!(
        "Wrote {} antigens, {} sera and one {}x{} result set to {}",
        ANTIGENS.len(),
        SERA.len(),
        ANTIGENS.len(),
        SERA.len(),
        out_dir.display()
    );
    Ok(())
}
