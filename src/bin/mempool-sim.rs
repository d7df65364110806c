//! Block pool simulator CLI
//!
//! Runs one simulation, or a sweep over fit policies and thresholds

use anyhow::Context;
use clap::Parser;
use mempool_sim::core::fragmentation::analyze;
use mempool_sim::core::sweep::{run_file_name, sweep};
use mempool_sim::{
    FitPolicy, Measure, SimulationBuilder, SimulationConfig, TracingSink, DEFAULT_THRESHOLDS,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "mempool-sim")]
#[command(about = "Simulate allocation traffic and defragmentation on a block pool")]
struct Args {
    /// TOML configuration file (flags override its values)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number of blocks in the pool
    #[arg(short = 'b', long)]
    blocks: Option<usize>,

    /// Random seed for page sizes and requests
    #[arg(short = 's', long)]
    seed: Option<u64>,

    /// Fit policy (first_fit, best_fit)
    #[arg(short = 'p', long)]
    policy: Option<FitPolicy>,

    /// Defragmentation threshold, 0-1 inclusive
    #[arg(short = 't', long)]
    threshold: Option<f64>,

    /// Score fragmentation by pages instead of blocks
    #[arg(long)]
    by_pages: bool,

    /// Number of simulation steps
    #[arg(short = 'n', long)]
    steps: Option<usize>,

    /// Directory for fragmentation logs and summaries
    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,

    /// Run every policy (or only --policy) against every threshold
    #[arg(long)]
    sweep: bool,

    /// Thresholds for --sweep [default: 0.25,0.5,0.75]
    #[arg(long, value_delimiter = ',')]
    thresholds: Vec<f64>,

    /// Log every request and result at debug level
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Args {
    fn to_config(&self) -> anyhow::Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::load(path)
                .with_context(|| format!("failed to load config {:?}", path))?,
            None => SimulationConfig::default(),
        };

        if let Some(blocks) = self.blocks {
            config.pool_size = blocks;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(policy) = self.policy {
            config.policy = policy;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(steps) = self.steps {
            config.steps = steps;
        }
        if self.by_pages {
            config.measure = Measure::Pages;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
    let config = args.to_config()?;

    info!(
        "Pool: {} blocks, seed={:?}, measure={:?}, steps={}",
        config.pool_size, config.seed, config.measure, config.steps
    );

    if args.sweep {
        let policies = match args.policy {
            Some(policy) => vec![policy],
            None => FitPolicy::ALL.to_vec(),
        };
        let thresholds = if args.thresholds.is_empty() {
            DEFAULT_THRESHOLDS.to_vec()
        } else {
            args.thresholds.clone()
        };

        let runs = sweep(&config, &policies, &thresholds, args.output_dir.as_deref())?;
        for run in &runs {
            info!(
                "{} threshold={}: {} allocations, {} failed, {} frees, {} defragmentations, final fragmentation {:.3}",
                run.config.policy,
                run.config.threshold,
                run.report.allocations,
                run.report.failed_allocations,
                run.report.frees,
                run.report.defragmentations,
                run.report.final_fragmentation
            );
        }
        return Ok(());
    }

    let mut builder = SimulationBuilder::from_config(config.clone());
    if let Some(dir) = &args.output_dir {
        builder = builder.output(dir.join(run_file_name(config.policy, config.threshold)));
    }
    if args.verbose {
        builder = builder.with_sink(TracingSink);
    }

    let mut sim = builder.build()?;
    let report = sim.run(config.steps)?;

    let layout = analyze(sim.pool());
    info!(
        "Final layout: {} free blocks in {} regions (largest {}), block score {:.3}, page score {:.3}",
        layout.free_blocks,
        layout.region_count,
        layout.largest_region_blocks,
        layout.block_score,
        layout.page_score
    );
    if let Some(summary) = &report.summary {
        info!("Summary written to {:?}", summary);
    }
    println!("{}", serde_json::to_string(&report)?);

    Ok(())
}
