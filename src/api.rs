use crate::config::ApiConfig;
use crate::lesion::LesionClass;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Multipart field the endpoint expects the image under.
pub const IMAGE_FIELD: &str = "image";

/// User-facing message for a failure the server did not explain.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to analyze image. Please try again.";
/// User-facing message when the endpoint could not be reached (or timed out).
pub const CONNECT_FAILURE_MESSAGE: &str = "Cannot connect to server. Please check your connection.";

#[derive(Error, Debug)]
enum PredictError {
    #[error("failed to read image {path}: {source}")]
    ReadImage {
        path: String,
        source: std::io::Error,
    },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Server(String),
}

impl PredictError {
    fn user_message(self) -> String {
        match self {
            PredictError::ReadImage { path, .. } => format!("Failed to read image at {path}."),
            PredictError::Server(message) => message,
            PredictError::Http(e) if e.is_decode() => GENERIC_FAILURE_MESSAGE.to_string(),
            PredictError::Http(_) => CONNECT_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Classification result as returned by the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub predicted_class: LesionClass,
    pub confidence: f64,
    pub all_probabilities: BTreeMap<LesionClass, f64>,
}

impl Prediction {
    /// Advisory text shown when the result warrants medical attention:
    /// a Malignant classification, or a malignant probability above 10%
    /// regardless of the predicted class.
    pub fn malignancy_advisory(&self) -> Option<String> {
        if self.predicted_class == LesionClass::Malignant {
            return Some(
                "This result suggests potential malignancy. Please consult a dermatologist \
                 immediately for professional evaluation."
                    .to_string(),
            );
        }
        let malignant = self
            .all_probabilities
            .get(&LesionClass::Malignant)
            .copied()
            .unwrap_or(0.0);
        if malignant > 0.1 {
            return Some(format!(
                "There is a {:.1}% probability of malignancy. Consider consulting a \
                 dermatologist for confirmation.",
                malignant * 100.0
            ));
        }
        None
    }
}

/// Uniform envelope returned by [`PredictionClient::predict`]. Failures are
/// carried as a value, never as an `Err` the caller has to handle.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictOutcome {
    Success(Prediction),
    Failure { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_loaded: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Healthy(HealthReport),
    Unreachable,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct PredictionClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    health_timeout: Duration,
}

impl PredictionClient {
    pub fn new(config: &ApiConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout(),
            health_timeout: config.health_timeout(),
        })
    }

    /// Submit an image for classification. The raw bytes pass through
    /// unvalidated; the endpoint owns format checking.
    #[instrument(skip(self))]
    pub async fn predict(&self, image_path: &Path) -> PredictOutcome {
        match self.submit(image_path).await {
            Ok(prediction) => PredictOutcome::Success(prediction),
            Err(e) => {
                tracing::error!("prediction request failed: {e}");
                PredictOutcome::Failure {
                    error: e.user_message(),
                }
            }
        }
    }

    async fn submit(&self, image_path: &Path) -> Result<Prediction, PredictError> {
        let bytes = tokio::fs::read(image_path)
            .await
            .map_err(|source| PredictError::ReadImage {
                path: image_path.display().to_string(),
                source,
            })?;

        let file_name = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.jpg")
            .to_string();
        let mime = mime_for(&file_name);

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new().part(IMAGE_FIELD, part);

        let response = self
            .http
            .post(format!("{}/predict", self.base_url))
            .multipart(form)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if response.status().is_success() {
            let prediction = response.json::<Prediction>().await?;
            Ok(prediction)
        } else {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => GENERIC_FAILURE_MESSAGE.to_string(),
            };
            Err(PredictError::Server(message))
        }
    }

    /// Best-effort liveness probe. Any reachable 2xx is healthy; everything
    /// else collapses to `Unreachable`.
    #[instrument(skip(self))]
    pub async fn check_health(&self) -> HealthStatus {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .timeout(self.health_timeout)
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => {
                let report = match r.json::<HealthReport>().await {
                    Ok(report) => report,
                    Err(_) => HealthReport {
                        status: "ok".to_string(),
                        model_loaded: None,
                    },
                };
                HealthStatus::Healthy(report)
            }
            Ok(r) => {
                tracing::warn!(status = %r.status(), "health endpoint returned an error status");
                HealthStatus::Unreachable
            }
            Err(e) => {
                tracing::warn!("health probe failed: {e}");
                HealthStatus::Unreachable
            }
        }
    }
}

/// MIME type from the filename extension, `image/jpeg` when unrecognized.
fn mime_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("heic") => "image/heic",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_follows_extension() {
        assert_eq!(mime_for("lesion.png"), "image/png");
        assert_eq!(mime_for("lesion.JPG"), "image/jpeg");
        assert_eq!(mime_for("photo.heic"), "image/heic");
    }

    #[test]
    fn mime_defaults_to_jpeg() {
        assert_eq!(mime_for("no_extension"), "image/jpeg");
        assert_eq!(mime_for("odd.xyz"), "image/jpeg");
        assert_eq!(mime_for(""), "image/jpeg");
    }

    #[test]
    fn prediction_parses_wire_body() {
        let body = r#"{
            "predicted_class": "Benign",
            "confidence": 0.87,
            "all_probabilities": {"Malignant": 0.03, "Benign": 0.87, "Normal": 0.1}
        }"#;
        let prediction: Prediction = serde_json::from_str(body).unwrap();
        assert_eq!(prediction.predicted_class, LesionClass::Benign);
        assert_eq!(prediction.all_probabilities.len(), 3);
    }

    #[test]
    fn advisory_fires_on_malignant_class() {
        let prediction = Prediction {
            predicted_class: LesionClass::Malignant,
            confidence: 0.92,
            all_probabilities: BTreeMap::new(),
        };
        let advisory = prediction.malignancy_advisory().unwrap();
        assert!(advisory.contains("dermatologist"));
    }

    #[test]
    fn advisory_fires_above_ten_percent_malignant() {
        let mut probs = BTreeMap::new();
        probs.insert(LesionClass::Normal, 0.85);
        probs.insert(LesionClass::Malignant, 0.12);
        let prediction = Prediction {
            predicted_class: LesionClass::Normal,
            confidence: 0.85,
            all_probabilities: probs,
        };
        let advisory = prediction.malignancy_advisory().unwrap();
        assert!(advisory.contains("12.0%"));
    }

    #[test]
    fn advisory_silent_at_or_below_threshold() {
        let mut probs = BTreeMap::new();
        probs.insert(LesionClass::Normal, 0.9);
        probs.insert(LesionClass::Malignant, 0.1);
        let prediction = Prediction {
            predicted_class: LesionClass::Normal,
            confidence: 0.9,
            all_probabilities: probs,
        };
        assert!(prediction.malignancy_advisory().is_none());
    }
}
