use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use log::info;

use incseg::config::IncsegConfig;
use incseg::dashboard::{self, Dashboard, Selection};
use incseg::models::income::IncomeExtreme;
use incseg::pipeline::{BlockGroupLayer, BuildMode, DatasetBuilder, MetroBatchDriver, StandardIndexCalculator};
use incseg::plot::FigureGenerator;
use incseg::registry::MetroRegistry;
use incseg::utils::logging::{create_spinner, finish_progress_bar, init_logging};
use incseg::utils::test::{SyntheticData, synthetic_workspace};

#[global_allocator]
static ALLOC: snmalloc_rs::SnMalloc = snmalloc_rs::SnMalloc;

/// Income segregation indices for U.S. metropolitan areas
#[derive(Debug, Parser)]
#[command(name = "incseg", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "INCSEG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build datasets and index artifacts for metros
    Build {
        /// CBSA code, may be repeated
        #[arg(long = "metro")]
        metros: Vec<String>,
        /// Build every metro in the registry
        #[arg(long, conflicts_with = "metros")]
        all: bool,
        /// Restrict each metro to its largest connected component
        #[arg(long)]
        islands: bool,
        /// Metros processed concurrently (0 = one per CPU)
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Render PNG figures for a built metro
    Plot {
        #[arg(long)]
        metro: String,
        #[arg(long, default_value_t = 300)]
        dpi: u32,
    },
    /// Write the dashboard page of one metro to a file
    Dashboard {
        #[arg(long)]
        metro: String,
        #[arg(long)]
        group: Option<IncomeExtreme>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Serve the dashboard over HTTP
    Serve {
        /// Address to bind, overrides the configuration
        #[arg(long)]
        addr: Option<String>,
    },
    /// List the metros in the registry
    Metros,
    /// Write a synthetic input workspace
    DemoData {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let command = match cli.command {
        Command::DemoData { out, seed } => return demo_data(&out, seed),
        command => command,
    };

    let config = IncsegConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    info!("{config}");

    match command {
        Command::Build {
            metros,
            all,
            islands,
            jobs,
        } => build(config, metros, all, islands, jobs),
        Command::Plot { metro, dpi } => plot(&config, &metro, dpi),
        Command::Dashboard {
            metro,
            group,
            year,
            out,
        } => {
            let dashboard = Dashboard::load(config)?;
            let view = dashboard.view(&Selection {
                metro: Some(metro),
                group,
                year,
                ..Selection::default()
            })?;
            std::fs::write(&out, dashboard::render_page(&view))
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!("Wrote dashboard for {} to {}", view.title, out.display());
            Ok(())
        }
        Command::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| config.dashboard.addr.clone());
            let dashboard = Arc::new(Dashboard::load(config)?);
            dashboard::serve(dashboard, &addr).await?;
            Ok(())
        }
        Command::Metros => {
            let registry = MetroRegistry::load(&config.paths.registry_path())?;
            for metro in registry.metros() {
                println!("{}\t{}\t{} counties", metro.code, metro.title, metro.counties.len());
            }
            Ok(())
        }
        Command::DemoData { out, seed } => demo_data(&out, seed),
    }
}

fn build(
    mut config: IncsegConfig,
    metros: Vec<String>,
    all: bool,
    islands: bool,
    jobs: Option<usize>,
) -> anyhow::Result<()> {
    if let Some(jobs) = jobs {
        config.analysis.jobs = jobs;
    }
    let registry = MetroRegistry::load(&config.paths.registry_path())?;
    let metros = if all { registry.codes() } else { metros };
    if metros.is_empty() {
        bail!("No metros selected, pass --metro CODE or --all");
    }

    let spinner = create_spinner(Some("Loading block groups"));
    let block_groups = BlockGroupLayer::load(&config.paths.block_groups_path());
    finish_progress_bar(&spinner, None);
    let block_groups = block_groups?;
    let builder = DatasetBuilder::new(&config.paths, &config.analysis, &registry, &block_groups);
    let calculator = StandardIndexCalculator::new(&config.analysis);
    let driver = MetroBatchDriver::new(
        builder,
        calculator,
        &config.paths.output_root(),
        config.analysis.effective_jobs(),
    );

    let mode = if islands || config.analysis.island_handling {
        BuildMode::LargestComponent
    } else {
        BuildMode::Standard
    };
    let report = driver.run_batch(&metros, mode)?;
    println!("{report}");
    if report.has_failures() {
        bail!("{} of {} metros failed", report.failures().len(), metros.len());
    }
    Ok(())
}

fn plot(config: &IncsegConfig, metro: &str, dpi: u32) -> anyhow::Result<()> {
    let registry = MetroRegistry::load(&config.paths.registry_path())?;
    let title = registry.get(metro)?.title.clone();
    let outcomes = FigureGenerator::from_paths(&config.paths).plot_metro(&title, metro, dpi);
    let failed = outcomes.iter().filter(|o| o.is_failure()).count();
    if failed > 0 {
        bail!("{failed} of {} figure sets failed for metro {metro}", outcomes.len());
    }
    Ok(())
}

fn demo_data(out: &Path, seed: u64) -> anyhow::Result<()> {
    let data = SyntheticData::demo(seed);
    let config = synthetic_workspace(out, &data)?;
    let config_path = out.join("incseg.toml");
    std::fs::write(&config_path, toml::to_string(&config)?)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!(
        "Wrote {} metros to {}. Try: incseg --config {} build --all",
        data.metros.len(),
        out.display(),
        config_path.display()
    );
    Ok(())
}
