//! Reference collector endpoint for manual testing.
//!
//! Receives fault reports on `POST /error-report` and logs them. It never
//! rejects a report: unparseable bodies are logged raw and still answered
//! 200, because the collector must not turn a reporting attempt into a
//! failure.
//!
//! ```text
//! FAULTLINE_COLLECTOR_ADDR=127.0.0.1:9219 faultline-collector
//! ```

use axum::Router;
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::routing::post;
use faultline_types::Report;
use tracing::{info, warn};

const ADDR_ENV: &str = "FAULTLINE_COLLECTOR_ADDR";
const DEFAULT_ADDR: &str = "127.0.0.1:9219";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async {
            if let Err(e) = serve().await {
                eprintln!("{e}");
                std::process::exit(1);
            }
        });
}

async fn serve() -> std::io::Result<()> {
    let addr = std::env::var(ADDR_ENV).unwrap_or_else(|_| DEFAULT_ADDR.to_owned());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "collector listening");

    let app = Router::new().route("/error-report", post(receive_report));
    axum::serve(listener, app).await
}

async fn receive_report(body: Bytes) -> StatusCode {
    match facet_json::from_slice::<Report>(&body) {
        Ok(report) => {
            info!(
                error_type = %report.error_type,
                project = %report.project_name,
                environment = %report.environment,
                timestamp = %report.timestamp,
                user_agent = %report.user_agent,
                process = %report.process_name,
                pid = report.pid,
                "{}",
                report.message,
            );
            if let Some(stack) = &report.stack {
                info!("stack:\n{stack}");
            }
        }
        Err(e) => {
            warn!(%e, "unparseable report body");
            info!(raw = %String::from_utf8_lossy(&body), "raw report");
        }
    }
    StatusCode::OK
}
