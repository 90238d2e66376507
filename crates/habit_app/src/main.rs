use clap::Parser;
use habit_app::app::{run, AppConfig, Cli};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let config = AppConfig::from_env().unwrap_or_default();
    let cli = Cli::parse();

    // Notification expiry timers are spawned onto this runtime; the commands
    // themselves are synchronous.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("habit_tracker failed: could not start runtime: {err}");
            std::process::exit(1);
        }
    };
    let _guard = runtime.enter();

    if let Err(err) = run(config, cli) {
        eprintln!("habit_tracker failed: {err:#}");
        std::process::exit(1);
    }
}
