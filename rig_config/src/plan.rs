//! Reaction sequence CSV.
//!
//! Expected headers: `reaction` followed by one column per pump id.
//!
//! Example:
//! reaction,R1,R3,R4
//! W200-001,5.0,0.5,
//! W200-002,4.5,1.0,0.25
//!
//! Empty cells mean "do not dispense from this pump".
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub code: String,
    /// (pump, volume) in column order; zero volumes are dropped.
    pub doses: Vec<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisPlan {
    pub pumps: Vec<String>,
    pub reactions: Vec<Reaction>,
}

impl SynthesisPlan {
    pub fn len(&self) -> usize {
        self.reactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reactions.is_empty()
    }
}

pub fn load_plan_csv(path: &Path) -> eyre::Result<SynthesisPlan> {
    let f = std::fs::File::open(path).map_err(|e| eyre::eyre!("open plan CSV {:?}: {}", path, e))?;
    parse_plan(f)
}

pub fn parse_plan<R: Read>(reader: R) -> eyre::Result<SynthesisPlan> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read plan headers: {}", e))?
        .clone();
    let mut cols = headers.iter();
    if cols.next() != Some("reaction") {
        eyre::bail!(
            "plan CSV must start with a 'reaction' column, got: {}",
            headers.iter().collect::<Vec<_>>().join(",")
        );
    }
    let pumps: Vec<String> = cols.map(str::to_string).collect();
    if pumps.is_empty() {
        eyre::bail!("plan CSV names no pump columns");
    }
    if let Some(p) = pumps.iter().find(|p| p.is_empty()) {
        eyre::bail!("plan CSV has an unnamed pump column {p:?}");
    }

    let mut reactions = Vec::new();
    for (idx, rec) in rdr.records().enumerate() {
        let line = idx + 2;
        let rec = rec.map_err(|e| eyre::eyre!("invalid plan row {}: {}", line, e))?;
        let code = rec.get(0).unwrap_or_default().to_string();
        if code.is_empty() {
            eyre::bail!("plan row {line} has no reaction code");
        }
        let mut doses = Vec::new();
        for (pump, cell) in pumps.iter().zip(rec.iter().skip(1)) {
            if cell.is_empty() {
                continue;
            }
            let volume: f64 = cell
                .parse()
                .map_err(|_| eyre::eyre!("plan row {line}: {pump} volume {cell:?} is not a number"))?;
            if !volume.is_finite() || volume < 0.0 {
                eyre::bail!("plan row {line}: {pump} volume must be >= 0, got {cell}");
            }
            if volume > 0.0 {
                doses.push((pump.clone(), volume));
            }
        }
        reactions.push(Reaction { code, doses });
    }

    Ok(SynthesisPlan { pumps, reactions })
}
