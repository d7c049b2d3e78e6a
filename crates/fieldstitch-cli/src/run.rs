use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Args;
use fieldstitch_engine::{
    reconstruct_batch, Diagram, Domain, FailedField, FieldPolygon, RawFragment, Reconstruction,
    StitchConfig,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CliError;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Fragment document (YAML or JSON)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Write the JSON report here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Tolerance file (YAML or JSON); flags below override it
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Debug, Default, Args)]
pub struct Overrides {
    /// Endpoint tolerance on temperature
    #[arg(long)]
    pub t_thresh: Option<f64>,
    /// Endpoint tolerance on pressure
    #[arg(long)]
    pub p_thresh: Option<f64>,
    #[arg(long)]
    pub eq_thresh: Option<f64>,
    /// First extrapolation ratio tried when bridging gaps
    #[arg(long)]
    pub extrap_ratio: Option<f64>,
    #[arg(long)]
    pub max_extrap: Option<f64>,
    /// Widest interior gap joined into one loop
    #[arg(long)]
    pub dist_thresh: Option<f64>,
    #[arg(long)]
    pub max_stall: Option<usize>,
}

impl Overrides {
    fn apply(&self, cfg: &mut StitchConfig) {
        let set = |slot: &mut f64, v: Option<f64>| {
            if let Some(v) = v {
                *slot = v;
            }
        };
        set(&mut cfg.t_thresh, self.t_thresh);
        set(&mut cfg.p_thresh, self.p_thresh);
        set(&mut cfg.eq_thresh, self.eq_thresh);
        set(&mut cfg.extrap_ratio, self.extrap_ratio);
        set(&mut cfg.max_extrap, self.max_extrap);
        set(&mut cfg.dist_thresh, self.dist_thresh);
        if let Some(v) = self.max_stall {
            cfg.max_stall = v;
        }
    }
}

/// Input document: a single diagram at the top level, a list of `stages`, or both.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    #[serde(default)]
    domain: Option<Domain>,
    #[serde(default)]
    fragments: Vec<RawFragment>,
    #[serde(default)]
    stages: Vec<Diagram>,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    stages: Vec<StageReport<'a>>,
}

#[derive(Debug, Serialize)]
struct StageReport<'a> {
    name: &'a str,
    polygons: &'a [FieldPolygon],
    failed: &'a [FailedField],
    skipped_fragments: usize,
}

pub fn run(args: RunArgs) -> Result<(), CliError> {
    let cfg = load_config(args.config.as_deref(), &args.overrides)
        .map_err(|e| CliError::input(format!("{e:#}")))?;
    let diagrams = load_diagrams(&args.input).map_err(|e| CliError::input(format!("{e:#}")))?;

    let results = reconstruct_batch(&cfg, &diagrams);
    let mut done: Vec<(&str, Reconstruction)> = Vec::with_capacity(results.len());
    for (diagram, result) in diagrams.iter().zip(results) {
        let out = result.map_err(|e| CliError::input(format!("stage \"{}\": {e}", diagram.name)))?;
        for failed in &out.failed {
            warn!(stage = %diagram.name, label = %failed.label, reason = %failed.reason, "unclosed field");
        }
        info!(
            stage = %diagram.name,
            polygons = out.polygons.len(),
            failed = out.failed.len(),
            "stage reconstructed"
        );
        done.push((diagram.name.as_str(), out));
    }

    let report = Report {
        stages: done
            .iter()
            .map(|(name, out)| StageReport {
                name: *name,
                polygons: &out.polygons,
                failed: &out.failed,
                skipped_fragments: out.skipped_fragments,
            })
            .collect(),
    };
    write_report(&report, args.output.as_deref())
        .map_err(|e| CliError::processing(format!("{e:#}")))
}

fn load_config(path: Option<&Path>, overrides: &Overrides) -> anyhow::Result<StitchConfig> {
    let mut cfg = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("could not read tolerances {}", path.display()))?;
            StitchConfig::from_yaml_str(&raw)
                .with_context(|| format!("invalid tolerances in {}", path.display()))?
        }
        None => StitchConfig::default(),
    };
    overrides.apply(&mut cfg);
    cfg.validate().context("invalid tolerance override")?;
    Ok(cfg)
}

fn load_diagrams(path: &Path) -> anyhow::Result<Vec<Diagram>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("could not read input {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let doc: Document = if is_json {
        serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))?
    } else {
        serde_yaml::from_str(&raw).with_context(|| format!("invalid YAML in {}", path.display()))?
    };

    let mut diagrams = Vec::with_capacity(doc.stages.len() + 1);
    match doc.domain {
        Some(domain) => diagrams.push(Diagram {
            name: stage_name(path),
            domain,
            fragments: doc.fragments,
        }),
        None if !doc.fragments.is_empty() => bail!("fragments given without a domain"),
        None => {}
    }
    diagrams.extend(doc.stages);
    if diagrams.is_empty() {
        bail!("document has neither a domain nor stages");
    }
    Ok(diagrams)
}

fn stage_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("main")
        .to_owned()
}

fn write_report(report: &Report<'_>, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("could not create {}", parent.display()))?;
            }
            let file = File::create(path)
                .with_context(|| format!("could not create {}", path.display()))?;
            let mut w = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut w, report)?;
            w.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut w = stdout.lock();
            serde_json::to_writer_pretty(&mut w, report)?;
            writeln!(w)?;
        }
    }
    Ok(())
}
