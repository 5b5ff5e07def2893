use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::judge::types::{
    CompileRequest, CompileResponse, JudgeFileRequest, JudgeRequest, JudgeResponse,
};
use crate::server::error::ApiResult;
use crate::server::AppState;

/// Rate-limit identifier for a request: the first `X-Forwarded-For` hop when
/// present (the web layer sits in front of us), else the peer address.
fn client_identifier(headers: &HeaderMap, addr: &SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}

pub async fn compile(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<CompileRequest>,
) -> ApiResult<Json<CompileResponse>> {
    let identifier = client_identifier(&headers, &addr);
    info!("Compile request from {} ({} bytes)", identifier, request.code.len());

    let response = state.service.compile_and_run(&request, &identifier).await?;
    Ok(Json(response))
}

pub async fn judge(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<JudgeRequest>,
) -> ApiResult<Json<JudgeResponse>> {
    let identifier = client_identifier(&headers, &addr);
    info!(
        "Judge request from {} ({} test cases)",
        identifier,
        request.test_cases.len()
    );

    let response = state.service.judge(&request, &identifier).await?;
    Ok(Json(response))
}

pub async fn judge_from_file(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<JudgeFileRequest>,
) -> ApiResult<Json<JudgeResponse>> {
    let identifier = client_identifier(&headers, &addr);
    info!(
        "Judge-from-file request from {} (room {}, question {})",
        identifier, request.room_id, request.question_id
    );

    let response = state
        .service
        .judge_from_store(state.store.as_ref(), &request, &identifier)
        .await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.1.2.3, 172.16.0.1".parse().unwrap());
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        assert_eq!(client_identifier(&headers, &addr), "10.1.2.3");
    }

    #[test]
    fn identifier_falls_back_to_peer_address() {
        let headers = HeaderMap::new();
        let addr: SocketAddr = "192.168.1.7:1234".parse().unwrap();
        assert_eq!(client_identifier(&headers, &addr), "192.168.1.7");
    }
}
