//! toposync command-line interface
//!
//! Thin wiring around toposync-core: argument parsing, logging setup, and
//! per-command orchestration. All engine behavior lives in the core crate.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use toposync_core::convert::ConverterRegistry;
use toposync_core::inventory::HttpInventory;
use toposync_core::strategy::StrategyRegistry;

mod commands;

use commands::App;

#[derive(Parser)]
#[command(name = "toposync", version, about = "Reconcile topology definitions against an inventory service")]
struct Cli {
    /// Base URL of the inventory service
    #[arg(long, global = true, default_value = "http://localhost:4000")]
    server: String,

    /// Bag the topology records are stored under
    #[arg(long, global = true, default_value = "topologies")]
    bag: String,

    /// Directory holding local topology definitions and generated packages
    #[arg(long, global = true, default_value = ".")]
    dir: PathBuf,

    /// Provisioning agent command
    #[arg(long, global = true, default_value = "toposync-agent")]
    agent: String,

    /// Package uploader command
    #[arg(long, global = true, default_value = "toposync-package-upload")]
    uploader: String,

    /// Copyright holder named in generated files
    #[arg(long, global = true)]
    copyright: Option<String>,

    /// Increase verbosity; -vv re-raises per-node failures and aborts the run
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a topology on the server from its local definition and
    /// reconcile its nodes
    Create {
        topology: String,
        /// Provision new nodes with the provisioning agent
        #[arg(long)]
        bootstrap: bool,
        /// Re-provision nodes that already exist
        #[arg(long)]
        overwrite: bool,
        /// Do not upload generated configuration packages
        #[arg(long)]
        disable_upload: bool,
        /// Answer yes to confirmation prompts
        #[arg(long)]
        yes: bool,
    },
    /// Push local changes to an existing topology and reconcile its nodes
    Update {
        topology: String,
        #[arg(long)]
        bootstrap: bool,
        #[arg(long)]
        overwrite: bool,
        #[arg(long)]
        disable_upload: bool,
    },
    /// Provision every provisionable node of a topology on the server
    Bootstrap {
        topology: String,
        #[arg(long)]
        overwrite: bool,
    },
    /// Convert a topology file and store it under the local definitions
    /// directory
    Import {
        file: PathBuf,
        /// Import only the named topologies
        names: Vec<String>,
    },
    /// Print topologies as canonical JSON
    Export {
        topology: Option<String>,
        /// Merge the named nodes' current inventory state into the export
        nodes: Vec<String>,
    },
    /// Delete a topology record, detaching its nodes
    Delete {
        topology: String,
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let app = App {
        inventory: HttpInventory::new(&cli.server).with_bag(&cli.bag),
        converters: ConverterRegistry::default(),
        strategies: StrategyRegistry::default(),
        dir: cli.dir,
        agent: cli.agent,
        uploader: cli.uploader,
        copyright: cli.copyright,
        raise_on_failure: cli.verbose >= 2,
    };

    match cli.command {
        Command::Create {
            topology,
            bootstrap,
            overwrite,
            disable_upload,
            yes,
        } => commands::create::run(&app, &topology, bootstrap, overwrite, disable_upload, yes),
        Command::Update {
            topology,
            bootstrap,
            overwrite,
            disable_upload,
        } => commands::update::run(&app, &topology, bootstrap, overwrite, disable_upload),
        Command::Bootstrap {
            topology,
            overwrite,
        } => commands::bootstrap::run(&app, &topology, overwrite),
        Command::Import { file, names } => commands::import::run(&app, &file, &names),
        Command::Export { topology, nodes } => {
            commands::export::run(&app, topology.as_deref(), &nodes)
        }
        Command::Delete { topology, yes } => commands::delete::run(&app, &topology, yes),
    }
}
