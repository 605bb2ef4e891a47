use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sparkify_loader::cli_style::{get_styles, print_summary};
use sparkify_loader::config::{self, StoreBackend};
use sparkify_loader::pipeline::{connect, run_plan, Stage, StagePlan};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles = get_styles(), version, about)]
struct CliArgs {
    #[command(subcommand)]
    command: Command,

    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory scanned recursively for raw event CSV files.
    #[clap(long, global = true, value_parser = parse_path, default_value = config::DEFAULT_INPUT_DIR)]
    pub input_dir: PathBuf,

    /// Path of the consolidated CSV file.
    #[clap(long, global = true, value_parser = parse_path, default_value = config::DEFAULT_OUTPUT_FILE)]
    pub output_file: PathBuf,

    /// Only raw rows whose `page` equals this value are kept.
    #[clap(long, global = true, default_value = config::DEFAULT_EVENT_FILTER)]
    pub event_filter: String,

    /// Which store to talk to.
    #[clap(long, global = true, value_enum, default_value_t = StoreBackend::Cql)]
    pub store: StoreBackend,

    /// Contact point of the CQL cluster.
    #[clap(long, global = true, default_value = config::DEFAULT_HOST)]
    pub host: String,

    #[clap(long, global = true, default_value_t = config::DEFAULT_PORT)]
    pub port: u16,

    #[clap(long, global = true, default_value = config::DEFAULT_KEYSPACE)]
    pub keyspace: String,

    #[clap(long, global = true, default_value_t = config::DEFAULT_REPLICATION_FACTOR)]
    pub replication_factor: u32,

    /// Seconds to wait for the cluster before giving up.
    #[clap(long, global = true, default_value_t = config::DEFAULT_CONNECT_TIMEOUT_SEC)]
    pub connect_timeout_sec: u64,

    /// Number of consolidated records per write batch.
    #[clap(long, global = true, default_value_t = sparkify_loader::pipeline::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Merges the raw event files into the consolidated CSV file.
    Aggregate,

    /// Creates the keyspace and the three query tables.
    InitSchema,

    /// Loads the consolidated CSV file into every table.
    Load,

    /// Runs the three verification queries and logs their rows.
    Verify,

    /// Drops the three query tables.
    Teardown,

    /// Runs every stage in order.
    Run {
        /// Leave the tables in place once verification is done.
        #[clap(long)]
        keep_tables: bool,
    },
}

impl Command {
    fn plan(self) -> StagePlan {
        match self {
            Command::Aggregate => StagePlan::only(Stage::Aggregate),
            Command::InitSchema => StagePlan::only(Stage::InitSchema),
            Command::Load => StagePlan::only(Stage::Load),
            Command::Verify => StagePlan::only(Stage::Verify),
            Command::Teardown => StagePlan::only(Stage::Teardown),
            Command::Run { keep_tables } => StagePlan::full(keep_tables),
        }
    }
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            input_dir: args.input_dir.clone(),
            output_file: args.output_file.clone(),
            event_filter: args.event_filter.clone(),
            backend: args.store,
            host: args.host.clone(),
            port: args.port,
            keyspace: args.keyspace.clone(),
            replication_factor: args.replication_factor,
            connect_timeout_sec: args.connect_timeout_sec,
            batch_size: args.batch_size,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  input_dir: {:?}", app_config.input_dir);
    info!("  output_file: {:?}", app_config.output_file);
    info!("  store: {:?} at {}", app_config.store.backend, app_config.store.address());
    info!("  keyspace: {}", app_config.store.keyspace);
    info!("  batch_size: {}", app_config.batch_size);

    let plan = cli_args.command.plan();
    let settings = app_config.store.clone();
    let summary = run_plan(app_config, &plan, || async move { connect(&settings).await }).await;

    print_summary(&summary);
    if summary.has_fatal_failure() {
        warn!("Run finished with failed stages");
    }

    Ok(())
}
