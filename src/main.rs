use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use clap::Parser;

use announcement_bar::{
    api, ConfigSource, EventDispatcher, InMemoryConfigStore, PollerThread, PollerThreadConfig,
    Resolver, Result, ServerConfig, Snapshot,
};

/// Serve announcement bar decisions to storefront widgets.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the JSON server configuration. Defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!(target: "announcement_bar", "{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };

    let store = Arc::new(InMemoryConfigStore::new());

    // The poller owns a blocking HTTP client, so it is started before the async runtime.
    let poller = match &config.source {
        ConfigSource::File { path } => {
            let count = store.set_snapshot(Snapshot::from_file(path)?);
            log::info!(target: "announcement_bar",
                       count,
                       path:? = path;
                       "loaded bar configuration");
            None
        }
        ConfigSource::Url {
            url,
            poll_interval_secs,
        } => {
            let poller = PollerThread::start(PollerThreadConfig {
                store: store.clone(),
                url: url.clone(),
                poll_interval: Duration::from_secs(*poll_interval_secs),
            })?;
            if let Err(err) = poller.wait_for_configuration() {
                log::warn!(target: "announcement_bar",
                           "serving without bar configuration: {}", err);
            }
            Some(poller)
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let served = runtime.block_on(async {
        let (dispatcher, _delivery) = EventDispatcher::start((&config.events).into());
        let resolver = Resolver::new(store).with_emitter(Arc::new(dispatcher));
        api::serve(&config.listener, Arc::new(resolver)).await
    });

    if let Some(poller) = poller {
        poller.shutdown()?;
    }

    served
}
