//! `matrixd` command line: run the daemon or send it a command.

use clap::{Parser, Subcommand};
use matrixd::{CommandMessage, Daemon, Fonts, FrameSink, MemorySink, Settings, TerminalSink};
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// More log output (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Run the display daemon.
    Run(Settings),

    /// Send one command to a running daemon.
    Send {
        /// Command name (start, stop, fireworks, heart, smiley, update_config).
        command: String,

        /// JSON payload, e.g. '{"GRAVITY":0.1}'.
        #[arg(long)]
        data: Option<String>,

        /// Control socket of the daemon.
        #[arg(long, env = "MATRIX_SOCKET", default_value = matrixd::config::DEFAULT_SOCKET)]
        socket: PathBuf,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(settings: &Settings) -> matrixd::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        info!("TLS crypto provider already installed");
    }

    let sink: Box<dyn FrameSink> = if settings.headless {
        Box::new(MemorySink::new(settings.width, settings.height))
    } else {
        Box::new(TerminalSink::new(settings.width, settings.height)?)
    };

    let factory = matrixd::twitch_client_factory(settings);
    let daemon = Daemon::spawn(settings, sink, factory, Fonts::load(settings))?;

    let shutdown = daemon.shutdown_signal();
    signal_hook::flag::register(signal_hook::consts::SIGINT, shutdown.flag())?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, shutdown.flag())?;

    daemon.join();
    Ok(())
}

fn send(command: String, data: Option<&str>, socket: &Path) -> matrixd::Result<()> {
    let data = data.map(serde_json::from_str).transpose()?;
    let message = CommandMessage { command, data };
    let mut stream = UnixStream::connect(socket)?;
    serde_json::to_writer(&mut stream, &message)?;
    stream.flush()?;
    stream.shutdown(std::net::Shutdown::Write)?;
    Ok(())
}

fn main() -> ExitCode {
    // Missing .env is fine; the environment may already carry everything.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        CliCommand::Run(settings) => run(&settings),
        CliCommand::Send {
            command,
            data,
            socket,
        } => send(command, data.as_deref(), &socket),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "matrixd failed");
            ExitCode::FAILURE
        }
    }
}
