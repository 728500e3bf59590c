pub mod handlers;
pub mod openapi;
pub mod response;
pub mod router;

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::analysis::{MOCK_METER_VALUE, MOCK_SERIAL_NUMBER, MOCK_TEXT_LINES};
    use crate::api::routes::create_router;
    use crate::api::state::AppState;
    use crate::config::{Config, GatewayConfig, ProviderConfig, ServerConfig};

    const BOUNDARY: &str = "glimpse-test-boundary";

    fn unconfigured(env_prefix: &'static str, provider: &str) -> ProviderConfig {
        ProviderConfig {
            provider: provider.to_string(),
            endpoint: None,
            api_key: None,
            model: None,
            api_version: None,
            timeout_secs: 5,
            env_prefix,
        }
    }

    fn test_state() -> AppState {
        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            gateway: GatewayConfig {
                max_upload_bytes: 1024,
                mock_delay_ms: 500,
            },
            ocr: unconfigured("OCR", "azure-vision"),
            vision: unconfigured("VISION", "azure-openai"),
        };
        AppState::new(config).unwrap()
    }

    fn multipart_request(uri: &str, field: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_unconfigured_providers() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["ocr"]["provider"], "azure-vision");
        assert_eq!(json["ocr"]["configured"], false);
        assert_eq!(json["vision"]["configured"], false);
        assert_eq!(json["maxUploadBytes"], 1024);
    }

    #[tokio::test]
    async fn openapi_json_is_valid() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let version = json["openapi"]
            .as_str()
            .expect("openapi field should be a string");
        assert!(
            version.starts_with('3'),
            "OpenAPI version should start with 3, got: {version}"
        );
        assert!(json["paths"]["/api/v1/meter"].is_object());
    }

    #[tokio::test(start_paused = true)]
    async fn mock_ocr_returns_fixed_lines() {
        let app = create_router(test_state());

        let response = app
            .oneshot(multipart_request(
                "/api/v1/ocr?mock=true",
                "image",
                "image/jpeg",
                &[0xFF, 0xD8, 0xFF],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["results"], serde_json::json!(MOCK_TEXT_LINES));
        assert!(json.get("partial").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn mock_meter_accepts_file_alias() {
        let app = create_router(test_state());

        let response = app
            .oneshot(multipart_request(
                "/api/v1/meter?mock=yes",
                "file",
                "image/png",
                &[1, 2, 3],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["results"]["meterValue"], MOCK_METER_VALUE);
        assert_eq!(json["results"]["serialNumber"], MOCK_SERIAL_NUMBER);
    }

    #[tokio::test]
    async fn non_image_upload_is_rejected() {
        let app = create_router(test_state());

        let response = app
            .oneshot(multipart_request(
                "/api/v1/ocr?mock=true",
                "image",
                "application/pdf",
                b"%PDF-1.4",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["code"], 400);
        assert!(json["error"].as_str().unwrap().contains("application/pdf"));
    }

    #[tokio::test]
    async fn oversized_upload_gets_typed_error() {
        let app = create_router(test_state());

        let response = app
            .oneshot(multipart_request(
                "/api/v1/ocr?mock=true",
                "image",
                "image/png",
                &[0u8; 1500],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("too large"));
    }

    #[tokio::test]
    async fn missing_image_field_is_rejected() {
        let app = create_router(test_state());

        let response = app
            .oneshot(multipart_request(
                "/api/v1/meter",
                "attachment",
                "image/png",
                &[1, 2, 3],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Missing required 'image' field");
    }

    #[tokio::test]
    async fn unconfigured_provider_is_generic_500() {
        let app = create_router(test_state());

        let response = app
            .oneshot(multipart_request(
                "/api/v1/meter",
                "image",
                "image/png",
                &[1, 2, 3],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert!(!json["error"].as_str().unwrap().contains("VISION_API_KEY"));
    }

    #[tokio::test]
    async fn non_multipart_body_is_rejected() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/ocr")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["code"], 400);
    }

    #[tokio::test]
    async fn unknown_preprocess_mode_is_rejected() {
        let app = create_router(test_state());

        let response = app
            .oneshot(multipart_request(
                "/api/v1/ocr?mock=true&preprocess=sepia",
                "image",
                "image/png",
                &[1, 2, 3],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
