//! hostctl CLI: run a control-plane daemon or talk to one.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hostctl::constants::SEND_REPLY_WINDOW;
use hostctl::{client, daemon, Config};

#[derive(Parser)]
#[command(name = "hostctl", version, about = "Remotely-scriptable control plane")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon until interrupted
    Serve {
        /// Instance name used in event lines
        #[arg(long)]
        instance: Option<String>,
        /// Control socket path
        #[arg(long)]
        socket: Option<PathBuf>,
        /// Command file to run at startup
        #[arg(long)]
        commands: Option<PathBuf>,
        /// Lua script to load at startup
        #[arg(long)]
        lua: Option<PathBuf>,
        /// Also dispatch commands read from stdin
        #[arg(long)]
        stdin: bool,
    },
    /// Send one command and print what comes back
    Send {
        /// Control socket path
        #[arg(long)]
        socket: PathBuf,
        /// Command line, e.g. `set status_message = hi`
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Print every event line until the daemon exits
    Listen {
        /// Control socket path
        #[arg(long)]
        socket: PathBuf,
    },
}

fn init_logging() -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Ok(path) = std::env::var("HOSTCTL_LOG_FILE") {
        let log_file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create log file at {path}"))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }
    builder.format_timestamp_secs().init();
    Ok(())
}

fn client_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")
}

fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            instance,
            socket,
            commands,
            lua,
            stdin,
        } => {
            let mut config = Config::load()?;
            if let Some(instance) = instance {
                config.instance_name = instance;
            }
            if socket.is_some() {
                config.socket_path = socket;
            }
            if lua.is_some() {
                config.lua_script = lua;
            }
            config.read_stdin |= stdin;

            log::info!("hostctl v{} starting as {}", env!("CARGO_PKG_VERSION"), config.instance_name);
            daemon::serve(&config, commands)?;
        }
        Commands::Send { socket, command } => {
            let replies =
                client_runtime()?.block_on(client::send(&socket, &command.join(" "), SEND_REPLY_WINDOW))?;
            for reply in replies {
                println!("{reply}");
            }
        }
        Commands::Listen { socket } => {
            client_runtime()?.block_on(client::listen(&socket, std::io::stdout()))?;
        }
    }

    Ok(())
}
