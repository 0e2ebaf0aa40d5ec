use camshot::background::flows::Orchestrator;
use camshot::bootstrap::setup::initialize;
use camshot::common::{WORKER_RUNTIME, errors::handle_error};
use camshot::operations::fetch::HttpFetcher;
use log::error;
use std::{process::exit, sync::Arc};

fn main() {
    let (settings, records) = match initialize() {
        Ok(loaded) => loaded,
        Err(_) => exit(1),
    };

    let fetcher = match HttpFetcher::new(settings.fetch_timeout) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(err) => {
            handle_error(err);
            exit(1)
        }
    };

    WORKER_RUNTIME.block_on(async move {
        let orchestrator = Orchestrator::start(records, fetcher);
        orchestrator
            .run_until(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            })
            .await;
    });
}
