use super::{Middleware, Next};
use crate::request::Request;
use crate::resolver::HandlerResult;
use async_trait::async_trait;
use std::time::Instant;
use tracing::{info, warn};

/// Root access log. Control-plane traffic is not logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    async fn handle(&self, request: Request, next: Next<'_>) -> HandlerResult {
        if request.is_control_plane() {
            return next.run(request).await;
        }

        let method = request.method().to_string();
        let path = request.path().to_string();
        let handler = next.handler().name().to_string();
        let start = Instant::now();

        let result = next.run(request).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(response) => info!(
                method = %method,
                path = %path,
                status = response.status(),
                handler = %handler,
                elapsed_ms,
                "{} {} -> {}",
                method,
                path,
                response.status()
            ),
            Err(e) => warn!(
                method = %method,
                path = %path,
                handler = %handler,
                elapsed_ms,
                "{} {} failed: {}",
                method,
                path,
                e
            ),
        }
        result
    }
}
