pub mod index;
pub mod transcribe;

pub use index::*;
pub use transcribe::*;

use crate::health;
use actix_web::web;

/// Register every route. Shared by `main` and the handler tests.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health::health_check))
            .route("/metrics", web::get().to(health::detailed_metrics)),
    )
    .route("/health", web::get().to(health::health_check))
    .route("/transcrever", web::post().to(transcrever))
    .route("/", web::get().to(index))
    .route("/", web::post().to(transcrever));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{state_with, FakeSummarizer, FakeTranscriber};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_health_is_served_at_both_paths() {
        let (_dir, state) = state_with(FakeTranscriber::two_speakers(), FakeSummarizer::five_insights());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        for uri in ["/health", "/api/v1/health"] {
            let response = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }
    }

    #[actix_web::test]
    async fn test_root_serves_recording_page() {
        let (_dir, state) = state_with(FakeTranscriber::two_speakers(), FakeSummarizer::five_insights());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let response = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/html; charset=utf-8"
        );

        let body = test::read_body(response).await;
        let html = std::str::from_utf8(&body).unwrap();
        assert!(html.contains("/transcrever"));
        assert!(html.contains("\"audio\""));
    }

    #[actix_web::test]
    async fn test_upload_routes_reject_get() {
        let (_dir, state) = state_with(FakeTranscriber::two_speakers(), FakeSummarizer::five_insights());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let response =
            test::call_service(&app, test::TestRequest::get().uri("/transcrever").to_request()).await;
        assert!(response.status().is_client_error());
    }
}
