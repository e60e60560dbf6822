use crate::camera::CapturedImage;
use crate::common::config::BackendConfig;
use crate::common::{FaceLensError, Result};
use crate::service::protocol::{
    decode_face_shape, decode_skin_response, FaceShapeReport, SkinOutcome,
    CAPTURE_FILE_NAME, FRAME_FILE_NAME, IMAGE_FIELD, JPEG_MIME,
};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use std::time::Duration;

/// The analysis backend as the session sees it. Every call is a single
/// request: no retry, no backoff.
pub trait AnalysisBackend: Send + Sync {
    fn analyze_frame(&self, image: &CapturedImage) -> Result<FaceShapeReport>;

    fn poll_face_shape(&self) -> Result<FaceShapeReport>;

    fn analyze_skin(&self, image: &CapturedImage) -> Result<SkinOutcome>;
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    analyze_frame_url: String,
    face_result_url: String,
    analyze_skin_url: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout_ms.map(Duration::from_millis))
            .build()
            .map_err(|e| FaceLensError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            analyze_frame_url: join_url(&config.base_url, &config.analyze_frame_path),
            face_result_url: join_url(&config.base_url, &config.face_result_path),
            analyze_skin_url: join_url(&config.base_url, &config.analyze_skin_path),
        })
    }

    fn upload(&self, url: &str, image: &CapturedImage, file_name: &str) -> Result<Response> {
        let part = Part::bytes(image.bytes().to_vec())
            .file_name(file_name.to_string())
            .mime_str(JPEG_MIME)?;
        let form = Form::new().part(IMAGE_FIELD, part);

        tracing::debug!("POST {} ({} bytes)", url, image.len());
        self.client
            .post(url)
            .multipart(form)
            .send()
            .map_err(|e| FaceLensError::Transport(e.to_string()))
    }
}

impl AnalysisBackend for BackendClient {
    fn analyze_frame(&self, image: &CapturedImage) -> Result<FaceShapeReport> {
        let response = self.upload(&self.analyze_frame_url, image, FRAME_FILE_NAME)?;
        let body = read_body(response)?.1;
        decode_face_shape(&body)
    }

    fn poll_face_shape(&self) -> Result<FaceShapeReport> {
        tracing::trace!("GET {}", self.face_result_url);
        let response = self.client
            .get(&self.face_result_url)
            .send()
            .map_err(|e| FaceLensError::Transport(e.to_string()))?;
        let body = read_body(response)?.1;
        decode_face_shape(&body)
    }

    fn analyze_skin(&self, image: &CapturedImage) -> Result<SkinOutcome> {
        let response = self.upload(&self.analyze_skin_url, image, CAPTURE_FILE_NAME)?;
        let (status, body) = read_body(response)?;
        let outcome = decode_skin_response(status, &body)?;
        if let Some(err) = outcome.failure() {
            tracing::warn!("Skin analysis failed: {}", err);
        }
        Ok(outcome)
    }
}

fn read_body(response: Response) -> Result<(u16, Vec<u8>)> {
    let status = response.status().as_u16();
    let body = response
        .bytes()
        .map_err(|e| FaceLensError::Transport(e.to_string()))?;
    Ok((status, body.to_vec()))
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("http://host:5000/", "/analyze-skin"), "http://host:5000/analyze-skin");
        assert_eq!(join_url("http://host:5000", "face-shape-result"), "http://host:5000/face-shape-result");
    }

    #[test]
    fn client_builds_endpoint_urls_from_config() {
        let config = BackendConfig {
            base_url: "http://backend.local:8080/api/".into(),
            ..BackendConfig::default()
        };
        let client = BackendClient::new(&config).unwrap();
        assert_eq!(client.analyze_frame_url, "http://backend.local:8080/api/analyze-frame");
        assert_eq!(client.face_result_url, "http://backend.local:8080/api/face-shape-result");
        assert_eq!(client.analyze_skin_url, "http://backend.local:8080/api/analyze-skin");
    }

    #[test]
    fn unreachable_backend_is_a_transport_error() {
        let config = BackendConfig {
            base_url: "http://127.0.0.1:9".into(),
            request_timeout_ms: Some(500),
            ..BackendConfig::default()
        };
        let client = BackendClient::new(&config).unwrap();
        let err = client.poll_face_shape().unwrap_err();
        assert!(matches!(err, FaceLensError::Transport(_)));
    }
}
