use std::io::IsTerminal;
use std::path::PathBuf;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use flightrec::Bridge;
use flightrec::demo;
use flightrec_dcmd::AttachSocket;

#[derive(Parser)]
#[command(name = "flightrec")]
#[command(author, version)]
#[command(about = "Start and inspect flight recordings on a running process")]
struct Cli {
    /// Target JVM process id (default: the current process)
    #[arg(short, long)]
    pid: Option<u32>,

    /// Recording length in seconds
    #[arg(short, long, default_value_t = demo::DEFAULT_DURATION_SECS)]
    duration: u32,

    /// Recording output path (default: record_<millis>.jfr in the working directory)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let pid = cli.pid.unwrap_or_else(std::process::id);
    let commands = match AttachSocket::attach(pid) {
        Ok(commands) => Some(commands),
        Err(err) => {
            warn!("No diagnostic command endpoint for process {pid}: {err}");
            None
        }
    };
    let bridge = Bridge::from_discovery(commands);

    if let Err(err) = demo::run(&bridge, cli.duration, cli.output.as_deref()) {
        eprintln!("Error: {err}");
        std::process::exit(2);
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();
}
