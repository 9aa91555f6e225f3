//! 核心中间件模块

use axum::{
    extract::{ConnectInfo, Request},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    BoxError,
};
use std::{any::Any, net::IpAddr, net::SocketAddr, time::Instant};
use tower::timeout::error::Elapsed;
use tracing::{error, info, warn};

use super::response::ApiResponse;

/// 请求 ID 所在的 header
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// 解析后的客户端 IP，由 [`client_ip_middleware`] 写入请求扩展
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

/// 按 True-Client-IP、X-Real-IP、X-Forwarded-For（第一跳）的顺序解析客户端地址，
/// 都不存在时退回到连接的对端地址
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let from_header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .and_then(|v| v.parse::<IpAddr>().ok())
    };

    from_header("true-client-ip")
        .or_else(|| from_header("x-real-ip"))
        .or_else(|| from_header("x-forwarded-for"))
        .map(|ip| ip.to_string())
        .or_else(|| peer.map(|addr| addr.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// 客户端 IP 解析中间件
pub async fn client_ip_middleware(mut req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let ip = resolve_client_ip(req.headers(), peer);
    req.extensions_mut().insert(ClientIp(ip));

    next.run(req).await
}

/// 请求日志中间件
pub async fn request_logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let remote_addr = req
        .extensions()
        .get::<ClientIp>()
        .map(|ip| ip.0.clone())
        .unwrap_or_default();

    let response = next.run(req).await;

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        request_id = %request_id,
        remote_addr = %remote_addr,
        "http request"
    );

    response
}

/// panic 恢复：记录日志并返回统一的 500 响应
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %detail, "request handler panicked");

    ApiResponse::<()>::empty(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        .into_response()
}

/// 中间件错误转换为统一响应：超时返回 504，其余返回 500
pub async fn handle_middleware_error(err: BoxError) -> Response {
    if err.is::<Elapsed>() {
        warn!("request timed out");
        return ApiResponse::<()>::empty(StatusCode::GATEWAY_TIMEOUT, "Request timeout")
            .into_response();
    }

    error!(error = %err, "unhandled middleware error");
    ApiResponse::<()>::empty(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        let peer: SocketAddr = "10.0.0.1:5555".parse().unwrap();

        assert_eq!(resolve_client_ip(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_wins_over_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));

        assert_eq!(resolve_client_ip(&headers, None), "198.51.100.2");
    }

    #[test]
    fn test_falls_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("not-an-ip"));
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();

        assert_eq!(resolve_client_ip(&headers, Some(peer)), "127.0.0.1:40000");
        assert_eq!(resolve_client_ip(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn test_panic_response() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_middleware_error_status() {
        let response = handle_middleware_error(Box::new(Elapsed::new())).await;
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let response = handle_middleware_error(BoxError::from("broken pipe")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
