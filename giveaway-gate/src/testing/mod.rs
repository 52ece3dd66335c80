//! Testing utilities
//!
//! Serves throwaway axum routers on an ephemeral local port so outbound
//! HTTP clients can be exercised against a real socket.

use axum::Router;

/// Serve `app` on `127.0.0.1:0` and return its base URL (no trailing slash)
///
/// The server task lives until the test runtime shuts down.
pub async fn spawn_stub(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub listener address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });

    format!("http://{addr}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    #[tokio::test]
    async fn test_stub_server_answers() {
        let base = spawn_stub(Router::new().route("/", get(|| async { "Hello" }))).await;
        let body = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();
        assert_eq!(body, "Hello");
    }
}
