// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! End-to-end-ish coverage of the HTTP surface (§6) that doesn't require a
//! working `ffmpeg` binary in the test sandbox: CORS preflight, the static
//! frontend fallback, and the fatal-at-start failure path when the encoder
//! binary can't be found.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use tower::ServiceExt;
use wavecast_server::{config::Config, server};

fn unreachable_ffmpeg_config(media_dir: &std::path::Path, hls_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.media_dir = media_dir.display().to_string();
    config.hls_output_dir = hls_dir.display().to_string();
    config.ffmpeg_bin = "wavecast-test-nonexistent-ffmpeg".to_string();
    config
}

#[tokio::test]
async fn missing_encoder_binary_is_fatal_at_start() {
    let dir = tempfile::tempdir().expect("tempdir");
    let media_dir = dir.path().join("media");
    let hls_dir = dir.path().join("hls");
    std::fs::create_dir_all(&media_dir).expect("create media dir");
    std::fs::write(media_dir.join("track.opus"), b"OggS\0\0\0\0\0").expect("write placeholder track");

    let config = unreachable_ffmpeg_config(&media_dir, &hls_dir);
    let result = server::create_app(config).await;
    assert!(result.is_err(), "starting with an unresolvable encoder binary must fail, not hang or panic");
}

#[tokio::test]
async fn an_empty_media_directory_with_no_encoder_available_still_fails_at_start() {
    let dir = tempfile::tempdir().expect("tempdir");
    let media_dir = dir.path().join("media");
    let hls_dir = dir.path().join("hls");
    std::fs::create_dir_all(&media_dir).expect("create empty media dir");

    let config = unreachable_ffmpeg_config(&media_dir, &hls_dir);
    let result = server::create_app(config).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn cors_preflight_on_whep_is_permissive() {
    let router = axum::Router::new().route(
        "/api/whep",
        axum::routing::post(|| async { StatusCode::CREATED }),
    );
    let router = router.layer(tower_http::cors::CorsLayer::new().allow_origin(tower_http::cors::Any).allow_methods(tower_http::cors::Any).allow_headers(tower_http::cors::Any));

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/whep")
        .header(header::ORIGIN, "https://listener.example")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .expect("build preflight request");

    let response = router.oneshot(request).await.expect("router must answer preflight");
    assert!(response.status().is_success());
    assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}
