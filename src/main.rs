use clap::{Parser, Subcommand};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use wildmere::cli::commands;
use wildmere::config::game::GameConfig;
use wildmere::config::generation::GenerationParams;

#[derive(Parser)]
#[command(name = "wildmere")]
#[command(about = "Seeded survival world: generation, headless LAN sessions and save files")]
#[command(version)]
struct Cli {
    /// Path to the game configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct WorldArgs {
    /// World generation config file; flags below override it
    #[arg(short, long)]
    worldgen: Option<String>,

    /// World seed (0 picks a random one)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Map width in tiles
    #[arg(long)]
    width: Option<u32>,

    /// Map height in tiles
    #[arg(long)]
    height: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a world and print its summary
    Generate {
        #[command(flatten)]
        world: WorldArgs,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,

        /// Print a symbol map of this many rows around the spawn point
        #[arg(long)]
        preview: Option<u32>,
    },

    /// Host a game for LAN clients
    Host {
        #[command(flatten)]
        world: WorldArgs,

        /// Start from this save instead of a fresh world
        #[arg(long)]
        load: Option<String>,

        /// Save under this name on shutdown
        #[arg(long)]
        save_on_exit: Option<String>,
    },

    /// Join a hosted game
    Join {
        /// Host address, e.g. 192.168.1.10:27333
        addr: String,

        /// Must match the host's map size
        #[command(flatten)]
        world: WorldArgs,

        /// Save under this name on shutdown
        #[arg(long)]
        save_on_exit: Option<String>,
    },

    /// Manage save files
    Saves {
        #[command(subcommand)]
        action: SaveAction,
    },
}

#[derive(Subcommand)]
enum SaveAction {
    /// List saves in the save directory
    List,

    /// Show the contents of a save
    Show { name: String },

    /// Delete a save
    Delete { name: String },
}

fn load_config(path: Option<&str>) -> GameConfig {
    let Some(path) = path else {
        return GameConfig::default();
    };
    match GameConfig::from_file(Path::new(path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_params(args: &WorldArgs) -> GenerationParams {
    let mut params = match &args.worldgen {
        Some(path) => match GenerationParams::from_file(Path::new(path)) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Error loading generation config: {}", e);
                std::process::exit(1);
            }
        },
        None => GenerationParams::default(),
    };
    if let Some(seed) = args.seed {
        params.seed = seed;
    }
    if let Some(width) = args.width {
        params.width = width;
    }
    if let Some(height) = args.height {
        params.height = height;
    }
    if let Err(e) = params.validate() {
        eprintln!("Invalid generation parameters:\n{}", e);
        std::process::exit(1);
    }
    params
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());
    init_logging(&config.log_level, cli.log_json);

    let result = match cli.command {
        Commands::Generate {
            world,
            json,
            preview,
        } => commands::generate(&load_params(&world), json, preview),

        Commands::Host {
            world,
            load,
            save_on_exit,
        } => {
            commands::host(
                &config,
                &load_params(&world),
                load.as_deref(),
                save_on_exit.as_deref(),
            )
            .await
        }

        Commands::Join {
            addr,
            world,
            save_on_exit,
        } => {
            commands::join(&config, &load_params(&world), &addr, save_on_exit.as_deref()).await
        }

        Commands::Saves { action } => match action {
            SaveAction::List => commands::list_saves(&config),
            SaveAction::Show { name } => commands::show_save(&config, &name),
            SaveAction::Delete { name } => commands::delete_save(&config, &name),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
