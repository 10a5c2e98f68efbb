use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gateway::runtime::{self, GatewayArgs};

#[derive(Parser, Debug)]
#[command(name = "gateway", about = "Edge IoT gateway")]
#[command(ignore_errors = true)]
struct Args {
    /// Root YAML configuration file
    #[arg(long = "yaml-config", default_value = "config/environments/development.yaml")]
    yaml_config: String,

    /// Gateway log file
    #[arg(long, default_value = "logs/iotgw.log")]
    log_file: String,

    /// trace|debug|info|warn|warning|error|fatal
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the current version and exit
    #[arg(long)]
    print_version: bool,

    /// Write the current version file and exit
    #[arg(long)]
    set_version: Option<String>,
}

#[tokio::main]
async fn main() {
    // Console diagnostics go to stderr so --print-version output stays clean
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,gateway=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let code = runtime::run(GatewayArgs {
        config_yaml: args.yaml_config,
        log_file: args.log_file,
        log_level: args.log_level,
        print_version: args.print_version,
        set_version: args.set_version,
    })
    .await;

    std::process::exit(code);
}
