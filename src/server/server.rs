use anyhow::Result;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::JudgeConfig;
use crate::docker::{ContainerPool, DockerClient};
use crate::judge::{CompilerService, RateLimiter};
use crate::server::{create_router, AppState};
use crate::testcases::FileTestCaseStore;

pub async fn run_rest_server(host: &str, port: u16) -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    info!(
        r#"
cjudge - sandboxed code judging service
Starting REST API on {}:{}
"#,
        host, port
    );

    let config = Arc::new(JudgeConfig::from_env());
    info!(
        "Policy: pool={} containers, {} concurrent compilations, {} req/{}s per client",
        config.pool_size,
        config.max_concurrent_compilations,
        config.rate_limit_max_requests,
        config.rate_limit_window_secs
    );

    let docker = match DockerClient::new(None).await {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to connect to Docker: {}", e);
            error!("The judging engine needs a local Docker daemon for its sandbox pool");
            return Err(e);
        }
    };

    let pool = Arc::new(ContainerPool::new(docker.clone(), (*config).clone()));
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit_max_requests,
        Duration::from_secs(config.rate_limit_window_secs),
    ));
    limiter.start_sweeper();

    let service = Arc::new(CompilerService::new(
        config.clone(),
        docker,
        pool.clone(),
        limiter,
    ));

    let testcase_root = std::env::var("CJUDGE_TESTCASE_ROOT")
        .unwrap_or_else(|_| "./testcases".to_string());
    let store = Arc::new(FileTestCaseStore::new(testcase_root));

    let state = Arc::new(AppState { service, store });
    let app = create_router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    let serve = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutting down cjudge, draining in-flight requests...");
    });

    drain_then_teardown(serve.into_future(), async {
        info!("Removing sandbox containers...");
        pool.teardown().await;
    })
    .await
}

/// Run the server future to completion before tearing the pool down.
/// In-flight requests hold pool containers, so removal must wait until the
/// graceful drain has finished.
async fn drain_then_teardown<S, T>(serve: S, teardown: T) -> Result<()>
where
    S: Future<Output = std::io::Result<()>>,
    T: Future<Output = ()>,
{
    serve.await?;
    teardown.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn pool_teardown_waits_for_the_drain() {
        let events: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let serve_events = events.clone();
        let serve = async move {
            // Simulate requests still completing during the graceful drain.
            tokio::time::sleep(Duration::from_millis(20)).await;
            serve_events.lock().unwrap().push("drained");
            Ok(())
        };
        let teardown_events = events.clone();
        let teardown = async move {
            teardown_events.lock().unwrap().push("torn down");
        };

        drain_then_teardown(serve, teardown).await.unwrap();
        assert_eq!(*events.lock().unwrap(), vec!["drained", "torn down"]);
    }

    #[tokio::test]
    async fn serve_errors_skip_teardown() {
        let torn_down = Arc::new(Mutex::new(false));
        let flag = torn_down.clone();

        let result = drain_then_teardown(
            async { Err(std::io::Error::other("bind lost")) },
            async move {
                *flag.lock().unwrap() = true;
            },
        )
        .await;

        assert!(result.is_err());
        assert!(!*torn_down.lock().unwrap());
    }
}
