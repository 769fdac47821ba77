use ac_runner::AppProcess;
use tracing::debug;

use crate::http::{run_http_server, AppState, HttpServerConfig};

/// HTTP and WebSocket surface of the service.
pub struct AcApi {
    state: AppState,
    config: HttpServerConfig,
}

impl AcApi {
    pub fn new(state: AppState, config: HttpServerConfig) -> Self {
        debug!("Initializing AC API module");
        Self { state, config }
    }

    pub fn into_runner_process(self) -> AppProcess {
        Box::new(move |ctx| {
            Box::pin(async move { run_http_server(self.config, self.state, ctx).await })
        })
    }
}
