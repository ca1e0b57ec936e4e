use clap::Parser as _;
use perfrelay::applock::InstanceLock;
use perfrelay::config;
use perfrelay::controller::Controller;
use std::path::PathBuf;
use std::process::ExitCode;

const APP_NAME: &str = "perfrelay";

#[derive(clap::Parser)]
#[command(name = "perfrelayd", about = "Forwards host-monitoring performance data to a time-series database")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Skip the instance lock (for use under a supervisor that already
    /// guarantees a single instance).
    #[arg(long)]
    foreground: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config_path = cli.config.unwrap_or_else(|| config::default_config_path(APP_NAME));

    let _lock = if cli.foreground {
        None
    } else {
        let lock_path = PathBuf::from(format!("/var/run/{APP_NAME}/daemon.lock"));
        match InstanceLock::acquire(&lock_path) {
            Ok(lock) => Some(lock),
            Err(err) => {
                eprintln!("{APP_NAME}: could not acquire instance lock: {err}");
                return ExitCode::FAILURE;
            }
        }
    };

    Controller::new(config_path, APP_NAME).run();
    ExitCode::SUCCESS
}
