//! Router construction

use crate::handlers;
use crate::session::session_middleware;
use crate::state::ApiState;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;

/// Room for multipart boundaries and form fields on top of the file itself
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

pub fn create_router(state: ApiState) -> Router {
    let body_limit = state
        .intake
        .policy()
        .max_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/upload", post(handlers::upload))
        .route("/job/{id}", get(handlers::get_job).delete(handlers::delete_job))
        .route("/jobs", get(handlers::list_jobs).delete(handlers::clear_jobs))
        .route("/download/{id}", get(handlers::download))
        .route("/download-all", get(handlers::download_all))
        .route("/thumbnail/{id}", get(handlers::thumbnail))
        .route("/health", get(handlers::health))
        .layer(from_fn_with_state(state.clone(), session_middleware))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().on_response(
                DefaultOnResponse::new()
                    .level(tracing::Level::INFO)
                    .latency_unit(LatencyUnit::Millis),
            ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use mediapress_core::application::{
        IntakePolicy, IntakeService, JobOrchestrator, JobRegistry,
    };
    use mediapress_core::domain::{ImageFormat, JobState, JobUpdate, Preset, SessionId};
    use mediapress_core::port::compressor::mocks::{MockBehavior, MockCompressor};
    use mediapress_core::port::file_store::mocks::MemoryFileStore;
    use mediapress_core::port::id_provider::UuidProvider;
    use mediapress_core::port::time_provider::mocks::ManualClock;
    use mediapress_core::port::{CompressionError, FileStore, MediaCapabilities, Thumbnailer};
    use std::path::Path;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct StubThumbnailer;

    #[async_trait::async_trait]
    impl Thumbnailer for StubThumbnailer {
        async fn thumbnail(&self, source: &Path) -> Result<Vec<u8>, CompressionError> {
            match source.extension().and_then(|e| e.to_str()) {
                Some("jpg") => Ok(vec![0xFF, 0xD8, 0xFF]),
                _ => Err(CompressionError::UnsupportedMedia("x".into())),
            }
        }
    }

    fn app() -> (Router, Arc<JobRegistry>, Arc<MemoryFileStore>) {
        let files = Arc::new(MemoryFileStore::new());
        let ids = Arc::new(UuidProvider);
        let registry = Arc::new(JobRegistry::new(
            files.clone(),
            ids.clone(),
            Arc::new(ManualClock::new(1_700_000_000_000)),
        ));
        let compressor = Arc::new(MockCompressor::new(
            MockBehavior::NoOutput,
            files.clone(),
            "/downloads",
        ));
        let orchestrator = Arc::new(JobOrchestrator::new(
            registry.clone(),
            compressor,
            files.clone(),
        ));
        let intake = Arc::new(IntakeService::new(
            registry.clone(),
            orchestrator,
            files.clone(),
            ids.clone(),
            IntakePolicy {
                upload_dir: "/uploads".into(),
                max_file_size_mb: 1,
            },
        ));
        let state = ApiState {
            registry: registry.clone(),
            intake,
            file_store: files.clone(),
            thumbnailer: Arc::new(StubThumbnailer),
            id_provider: ids,
            capabilities: MediaCapabilities {
                ffmpeg_available: true,
                heic_support: false,
            },
        };
        (create_router(state), registry, files)
    }

    fn cookie(session: &SessionId) -> String {
        format!("session_id={}", session.as_str())
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _) = app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["ffmpeg_available"], true);
        assert_eq!(json["heic_support"], false);
    }

    #[tokio::test]
    async fn test_missing_cookie_is_minted() {
        let (app, _, _) = app();
        let response = app
            .oneshot(Request::get("/jobs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.starts_with("session_id="));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("SameSite=Lax"));
        let token = set_cookie["session_id=".len()..].split(';').next().unwrap();
        assert_eq!(token.len(), 32);
    }

    #[tokio::test]
    async fn test_valid_cookie_is_kept() {
        let (app, _, _) = app();
        let session = SessionId::parse(&"k".repeat(32)).unwrap();
        let response = app
            .oneshot(
                Request::get("/jobs")
                    .header(header::COOKIE, cookie(&session))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(body_json(response).await["jobs"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_malformed_cookie_is_replaced() {
        let (app, _, _) = app();
        let response = app
            .oneshot(
                Request::get("/jobs")
                    .header(header::COOKIE, "session_id=short")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.headers().get(header::SET_COOKIE).is_some());
    }

    #[tokio::test]
    async fn test_foreign_job_is_not_found() {
        let (app, registry, files) = app();
        let owner = SessionId::parse(&"o".repeat(32)).unwrap();
        let intruder = SessionId::parse(&"i".repeat(32)).unwrap();
        files.insert("/uploads/a.jpg", vec![1u8; 10]);
        let job = registry
            .create(owner, "a.jpg", "/uploads/a.jpg", Preset::Facebook, ImageFormat::Jpg)
            .await
            .unwrap();

        for (method, uri) in [
            ("GET", format!("/job/{}", job.id)),
            ("DELETE", format!("/job/{}", job.id)),
            ("GET", format!("/download/{}", job.id)),
            ("GET", format!("/thumbnail/{}", job.id)),
        ] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(&uri)
                        .header(header::COOKIE, cookie(&intruder))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method} {uri}");
            assert_eq!(body_json(response).await["detail"], "Job not found");
        }
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_download_before_completion_is_bad_request() {
        let (app, registry, files) = app();
        let session = SessionId::parse(&"s".repeat(32)).unwrap();
        files.insert("/uploads/a.jpg", vec![1u8; 10]);
        let job = registry
            .create(session.clone(), "a.jpg", "/uploads/a.jpg", Preset::Facebook, ImageFormat::Jpg)
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/download/{}", job.id))
                    .header(header::COOKIE, cookie(&session))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(
                Request::get("/download-all")
                    .header(header::COOKIE, cookie(&session))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["detail"],
            "No completed files to download"
        );
    }

    #[tokio::test]
    async fn test_download_of_vanished_output_is_not_found() {
        let (app, registry, files) = app();
        let session = SessionId::parse(&"s".repeat(32)).unwrap();
        files.insert("/uploads/a.jpg", vec![1u8; 10]);
        files.insert("/downloads/compressed_a.jpg", vec![9u8; 4]);
        let job = registry
            .create(session.clone(), "a.jpg", "/uploads/a.jpg", Preset::Facebook, ImageFormat::Jpg)
            .await
            .unwrap();
        registry
            .update(&job.id, JobUpdate::new().state(JobState::Processing))
            .await
            .unwrap();
        registry
            .update(
                &job.id,
                JobUpdate::new()
                    .state(JobState::Completed)
                    .progress(100)
                    .output_path("/downloads/compressed_a.jpg"),
            )
            .await
            .unwrap();

        let get = || {
            Request::get(format!("/download/{}", job.id))
                .header(header::COOKIE, cookie(&session))
                .body(Body::empty())
                .unwrap()
        };

        let ok = app.clone().oneshot(get()).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(
            ok.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"compressed_a.jpg\""
        );
        let bytes = ok.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes.as_ref(), &[9u8; 4]);

        files.remove(Path::new("/downloads/compressed_a.jpg")).await.unwrap();
        let gone = app.oneshot(get()).await.unwrap();
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(gone).await["detail"], "Compressed file not found");
        assert!(registry.get(&job.id, None).is_some());
    }

    #[tokio::test]
    async fn test_thumbnail_outcomes() {
        let (app, registry, files) = app();
        let session = SessionId::parse(&"s".repeat(32)).unwrap();
        files.insert("/uploads/a.jpg", vec![1u8; 10]);
        files.insert("/uploads/b.mov", vec![1u8; 10]);
        let still = registry
            .create(session.clone(), "a.jpg", "/uploads/a.jpg", Preset::Facebook, ImageFormat::Jpg)
            .await
            .unwrap();
        let video = registry
            .create(session.clone(), "b.mov", "/uploads/b.mov", Preset::Facebook, ImageFormat::Jpg)
            .await
            .unwrap();

        let get = |id: String| {
            Request::get(format!("/thumbnail/{id}"))
                .header(header::COOKIE, cookie(&session))
                .body(Body::empty())
                .unwrap()
        };

        let ok = app.clone().oneshot(get(still.id.clone())).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(ok.headers()[header::CONTENT_TYPE], "image/jpeg");

        let unsupported = app.clone().oneshot(get(video.id)).await.unwrap();
        assert_eq!(unsupported.status(), StatusCode::BAD_REQUEST);

        files.remove(Path::new("/uploads/a.jpg")).await.unwrap();
        let gone = app.oneshot(get(still.id)).await.unwrap();
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(gone).await["detail"], "Original file not found");
    }
}
