use clap::{Parser, Subcommand};
use shotbook::{config, output, pipeline};
use std::path::PathBuf;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup — trivial, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "shotbook")]
#[command(about = "Batch catalog builder for timestamped screenshot libraries")]
#[command(long_about = "\
Batch catalog builder for timestamped screenshot libraries

Your filesystem is the data source. Raw screenshots are scanned recursively,
optimized once each into a flat derived directory, and cataloged newest-first
for an external gallery UI.

On-disk layout (paths configurable via shotbook.toml):

  images/                        # Raw screenshots (source of truth, recursive)
  │   Screenshot_2024-12-04_170033.jpg
  │   Screenshot_20240318-082104_Uber Driver.jpg
  │   phone/20240921_135601295.jpeg
  images_optimized/              # Derived artifacts, <basename>.<format>
  optimization-record.json       # basename -> optimization metadata (the cache)
  run-state.json                 # count gate: skip runs when nothing changed
  catalog.json                   # newest-first entries consumed by the gallery

Incremental at three levels: unchanged trees short-circuit at the gate,
known images skip at the catalog level, and optimized images skip at the
record level. External deletions are repaired by the reconciler on the
next pass.

Run 'shotbook gen-config' to generate a documented shotbook.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "shotbook.toml", global = true)]
    config: PathBuf,

    /// Override the raw-image root from config
    #[arg(long, global = true)]
    raw_root: Option<PathBuf>,

    /// Override the derived-images root from config
    #[arg(long, global = true)]
    derived_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: gate, reconcile, optimize, catalog
    Run {
        /// Bypass the run-state gate even if the image count is unchanged
        #[arg(long)]
        force: bool,
        /// Rebuild the catalog from scratch instead of appending new entries
        #[arg(long)]
        full: bool,
    },
    /// Optimize images and update the record store, leaving the catalog alone
    Optimize,
    /// Prune orphaned record entries (standalone reconciler pass)
    Clean,
    /// Bootstrap a record store from images already optimized on disk
    Seed,
    /// Regenerate the catalog from the derived-images directory
    Rebuild,
    /// Show store counts, gate state, and pending drift
    Status,
    /// Print a stock shotbook.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = config::PipelineConfig::load(&cli.config)?;
    if let Some(raw_root) = cli.raw_root {
        config.paths.raw_root = raw_root;
    }
    if let Some(derived_root) = cli.derived_root {
        config.paths.derived_root = derived_root;
    }

    init_thread_pool(&config.processing);

    match cli.command {
        Command::Run { force, full } => {
            let report = pipeline::run(&config, pipeline::RunOptions { force, full })?;
            output::print_run_report(&report);
        }
        Command::Optimize => {
            let summary = pipeline::optimize_only(&config)?;
            output::print_lines(&output::format_run_summary(&summary, false));
        }
        Command::Clean => {
            let (report, warnings) = pipeline::clean(&config)?;
            output::print_lines(&warnings);
            output::print_lines(&output::format_clean_report(&report));
        }
        Command::Seed => {
            let seeded = pipeline::seed(&config)?;
            output::print_lines(&output::format_seed_report(&seeded));
        }
        Command::Rebuild => {
            let report = pipeline::rebuild(&config)?;
            output::print_lines(&output::format_rebuild_report(&report));
        }
        Command::Status => {
            let report = pipeline::status(&config)?;
            output::print_status(&report);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores — user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
