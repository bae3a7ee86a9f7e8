use clap::Parser;
use tokio::io::{stdin, stdout};

use hostbridge::{
    config::Config,
    core::{container::ServiceContainer, error::BridgeResult, status},
    logging::Logger,
};

#[derive(Parser)]
#[command(name = "hostbridge")]
#[command(about = "Serve host queries to a presentation tier over stdio", long_about = None)]
struct Opt {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    conf: Option<String>,

    /// Validate the configuration and route table, then exit
    #[arg(short, long)]
    test: bool,
}

#[tokio::main]
async fn main() -> BridgeResult<()> {
    // Read command-line arguments
    let opt = Opt::parse();

    // Load configuration with optional override
    let config = Config::load_with_opt_override(opt.conf.as_deref())?;

    // Initialize logging
    let log_sink = Logger::new(config.log.clone()).init_env_logger().await?;

    // Build store, handlers and routes
    log::info!("Loading routes and query handlers...");
    let container = ServiceContainer::build(config)?;
    let router = container.router();
    status::mark_ready(router.len(), container.bus().len());

    if opt.test {
        for channel in router.channels() {
            log::info!("Route {}", channel);
        }
    } else {
        log::info!("Serving on stdio...");
        container.channel_server().serve(stdin(), stdout()).await?;
        log::info!("Ingress closed, shutting down");
    }

    if let Some(sink) = log_sink {
        sink.shutdown().await;
    }
    Ok(())
}
