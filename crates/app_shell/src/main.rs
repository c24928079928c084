use std::{
    fs::{self, File},
    io::BufReader,
    path::PathBuf,
};

use anyhow::{bail, Context, Result};
use app_shell::DesignSession;
use core_design::{Design, MemoryStore, Module, SegmentStore, StaticCatalog};
use kernel_geo::GeoKernel;
use settings::{DesignerSettings, SettingsStore};
use tracing::{info, warn};

const USAGE: &str = "usage: app_shell [DESIGN.json] [--modules MODULES.json] [--report OUT.json]";

#[derive(Debug, Default)]
struct Args {
    design: Option<PathBuf>,
    modules: Option<PathBuf>,
    report: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--modules" => {
                args.modules = Some(iter.next().context("--modules needs a path")?.into());
            }
            "--report" => {
                args.report = Some(iter.next().context("--report needs a path")?.into());
            }
            "-h" | "--help" => bail!(USAGE),
            flag if flag.starts_with("--") => bail!("unknown flag `{flag}`\n{USAGE}"),
            path => {
                if args.design.replace(path.into()).is_some() {
                    bail!("only one design file may be given\n{USAGE}");
                }
            }
        }
    }
    Ok(args)
}

fn load_settings() -> DesignerSettings {
    match SettingsStore::new() {
        Ok(store) => {
            info!("Settings file: {}", store.path().display());
            store.load_or_default()
        }
        Err(err) => {
            warn!("Using default settings (no settings store): {err}");
            DesignerSettings::default()
        }
    }
}

fn load_design(args: &Args, settings: &DesignerSettings) -> Result<Design> {
    let Some(path) = &args.design else {
        let mut design = Design::new("Untitled");
        design.site = settings.site;
        return Ok(design);
    };
    let file =
        File::open(path).with_context(|| format!("failed to open design {}", path.display()))?;
    Design::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse design {}", path.display()))
}

fn load_modules(args: &Args) -> Result<Vec<Module>> {
    let Some(path) = &args.modules else {
        return Ok(Vec::new());
    };
    let file =
        File::open(path).with_context(|| format!("failed to open modules {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse modules {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = parse_args()?;

    let settings = load_settings();
    let design = load_design(&args, &settings)?;
    let catalog = StaticCatalog::new(load_modules(&args)?);

    let mut store = MemoryStore::new();
    for segment in design.segments() {
        store
            .create(segment)
            .with_context(|| format!("failed to stage segment {}", segment.id))?;
    }

    let session = DesignSession::open(
        design,
        Box::new(store),
        Box::new(catalog),
        Box::new(GeoKernel::default()),
        settings,
    )
    .context("failed to open design session")?;
    let workbench = session.workbench();
    info!(
        "{} workbench ready with {} tools and {} commands",
        workbench.label,
        session.tools().len(),
        session.commands().len()
    );
    let layers = session.shadow_layers();
    if let Some(layer) = layers.first() {
        info!(
            "{} shadow layers, drawn at {:.0}% opacity",
            layers.len(),
            layer.fill_opacity * 100.0
        );
    }

    let reports = session.reports();
    for report in &reports {
        let layout = report
            .layout
            .map(|l| {
                let dc = l
                    .dc_kw
                    .map(|kw| format!(", {kw:.2} kW DC"))
                    .unwrap_or_default();
                format!(
                    "{} modules in {} frames, {:.0}% coverage{}",
                    l.module_count,
                    l.frame_count,
                    l.coverage_ratio * 100.0,
                    dc
                )
            })
            .unwrap_or_else(|| "no module layout".to_string());
        info!(
            "{} ({}): {} wall quads, {} shadow samples, {}",
            report.name, report.area_text, report.wall_quads, report.shadow_samples, layout
        );
        if report.inset_fallback {
            warn!("{}: setback left no buildable area, packed the full outline", report.name);
        }
        if report.layout_truncated {
            warn!("{}: module grid too large, layout covers part of the segment", report.name);
        }
    }

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&reports).context("failed to encode report")?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        info!("Report written to {}", path.display());
    }
    Ok(())
}
