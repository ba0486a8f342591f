use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Client as HttpClient;
use restyle_contracts::images::{EncodedImage, DEFAULT_RESULT_MIME};
use serde_json::{json, Value};

use super::{GenerateRequest, ImageProvider};
use crate::config::EngineConfig;
use crate::error::GenerationError;

pub struct GeminiProvider {
    api_base: String,
    api_key: String,
    model: String,
    http: HttpClient,
}

impl GeminiProvider {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GenerationError> {
        // No client-side deadline: the call resolves when the service answers.
        let http = HttpClient::builder()
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| {
                GenerationError::ConfigurationError(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            http,
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, GenerationError> {
        let Some(api_key) = config.api_key.as_deref() else {
            return Err(GenerationError::ConfigurationError(
                "GEMINI_API_KEY (or GOOGLE_API_KEY) environment variable is not set.".to_string(),
            ));
        };
        Self::new(&config.api_base, api_key, &config.model)
    }

    fn endpoint(&self) -> String {
        let trimmed = self.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

impl ImageProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, request: &GenerateRequest) -> Result<EncodedImage, GenerationError> {
        let endpoint = self.endpoint();
        tracing::info!(model = %self.model, mime = %request.image.format, "sending Gemini generateContent request");

        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request_payload(request))
            .send()
            .map_err(|err| {
                // The URL carries the API key.
                GenerationError::unknown(format!("Gemini request failed: {}", err.without_url()))
            })?;

        let status = response.status();
        let body = response.text().map_err(|err| {
            GenerationError::unknown(format!(
                "Gemini response body read failed: {}",
                err.without_url()
            ))
        })?;
        if !status.is_success() {
            let err = classify_failure(status.as_u16(), &body);
            tracing::warn!(status = status.as_u16(), kind = err.kind(), "Gemini request failed");
            return Err(err);
        }

        let parsed: Value = serde_json::from_str(&body).map_err(|err| {
            GenerationError::unknown(format!("Gemini returned invalid JSON payload: {err}"))
        })?;
        extract_first_image(&parsed)
    }
}

pub(crate) fn request_payload(request: &GenerateRequest) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                {
                    "inlineData": {
                        "mimeType": request.image.format,
                        "data": request.image.encoded_data,
                    }
                },
                { "text": request.instruction },
            ],
        }],
        "generationConfig": {
            "responseModalities": ["IMAGE"],
        },
    })
}

/// Maps a non-success response onto the error taxonomy.
pub(crate) fn classify_failure(status: u16, body: &str) -> GenerationError {
    if status == 429 || body.contains("RESOURCE_EXHAUSTED") {
        return GenerationError::RateLimited;
    }

    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        let first = match &parsed {
            Value::Array(rows) => rows.first().cloned().unwrap_or(Value::Null),
            other => other.clone(),
        };
        if let Some(message) = first
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            return GenerationError::ServiceError(message.to_string());
        }
    }

    GenerationError::unknown(format!(
        "Gemini request failed ({status}): {}",
        truncate_text(body.trim(), 512)
    ))
}

/// First part carrying inline image data, across candidates in order.
pub(crate) fn extract_first_image(payload: &Value) -> Result<EncodedImage, GenerationError> {
    let candidates = payload
        .get("candidates")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for candidate in candidates {
        let parts = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for part in parts {
            let Some(inline) = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)
            else {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    tracing::debug!(text = %truncate_text(text, 200), "Gemini returned a text part");
                }
                continue;
            };
            let data = inline
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            BASE64.decode(data.as_bytes()).map_err(|err| {
                GenerationError::unknown(format!("Gemini image base64 decode failed: {err}"))
            })?;
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or(DEFAULT_RESULT_MIME);
            return Ok(EncodedImage::new(mime_type, data));
        }
    }

    if let Some(reason) = payload
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
    {
        tracing::warn!(reason, "Gemini blocked the prompt");
    }
    Err(GenerationError::NoImageReturned)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{classify_failure, extract_first_image, request_payload, GeminiProvider};
    use crate::error::GenerationError;
    use crate::normalize::NormalizedImage;
    use crate::providers::GenerateRequest;

    fn request() -> GenerateRequest {
        GenerateRequest {
            image: NormalizedImage {
                encoded_data: "AAEC".to_string(),
                format: "image/jpeg".to_string(),
            },
            instruction: "Redraw this as a watercolor.".to_string(),
        }
    }

    #[test]
    fn endpoint_accepts_bare_and_prefixed_models() -> anyhow::Result<()> {
        let bare = GeminiProvider::new("https://example.test/v1beta/", "k", "gemini-2.5-flash-image")?;
        assert_eq!(
            bare.endpoint(),
            "https://example.test/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
        let prefixed = GeminiProvider::new("https://example.test/v1beta", "k", "models/custom")?;
        assert_eq!(
            prefixed.endpoint(),
            "https://example.test/v1beta/models/custom:generateContent"
        );
        Ok(())
    }

    #[test]
    fn payload_carries_image_then_instruction() {
        let payload = request_payload(&request());
        let parts = &payload["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], json!("image/jpeg"));
        assert_eq!(parts[0]["inlineData"]["data"], json!("AAEC"));
        assert_eq!(parts[1]["text"], json!("Redraw this as a watercolor."));
        assert_eq!(
            payload["generationConfig"]["responseModalities"],
            json!(["IMAGE"])
        );
    }

    #[test]
    fn takes_first_image_part() -> anyhow::Result<()> {
        let payload = json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "Here you go"},
                    {"inlineData": {"mimeType": "image/webp", "data": "AQID"}},
                    {"inlineData": {"mimeType": "image/png", "data": "BAUG"}},
                ]}
            }]
        });
        let image = extract_first_image(&payload)?;
        assert_eq!(image.mime_type, "image/webp");
        assert_eq!(image.bytes()?, vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn missing_mime_defaults_to_png() -> anyhow::Result<()> {
        let payload = json!({
            "candidates": [
                {"content": {"parts": [{"text": "no image in this one"}]}},
                {"content": {"parts": [{"inline_data": {"data": "AQID"}}]}},
            ]
        });
        assert_eq!(extract_first_image(&payload)?.mime_type, "image/png");
        Ok(())
    }

    #[test]
    fn no_image_parts_is_no_image_returned() {
        for payload in [
            json!({}),
            json!({"candidates": []}),
            json!({"candidates": [{"content": {"parts": [{"text": "sorry"}]}}]}),
            json!({"candidates": [{"content": {"parts": [{"inlineData": {"data": ""}}]}}]}),
            json!({"promptFeedback": {"blockReason": "SAFETY"}}),
        ] {
            assert_eq!(
                extract_first_image(&payload),
                Err(GenerationError::NoImageReturned)
            );
        }
    }

    #[test]
    fn corrupt_image_data_is_unknown_error() {
        let payload = json!({
            "candidates": [{"content": {"parts": [{"inlineData": {"data": "@@not-base64@@"}}]}}]
        });
        assert!(matches!(
            extract_first_image(&payload),
            Err(GenerationError::UnknownGenerationError(_))
        ));
    }

    #[test]
    fn rate_limits_are_classified() {
        assert_eq!(classify_failure(429, ""), GenerationError::RateLimited);
        let body = json!({"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}});
        assert_eq!(
            classify_failure(400, &body.to_string()),
            GenerationError::RateLimited
        );
    }

    #[test]
    fn structured_errors_surface_their_message() {
        let body = json!({"error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}});
        assert_eq!(
            classify_failure(400, &body.to_string()),
            GenerationError::ServiceError("API key not valid.".to_string())
        );

        let wrapped = json!([{"error": {"message": "Model overloaded"}}]);
        assert_eq!(
            classify_failure(503, &wrapped.to_string()),
            GenerationError::ServiceError("Model overloaded".to_string())
        );
    }

    #[test]
    fn everything_else_is_unknown() {
        let err = classify_failure(502, "<html>Bad Gateway</html>");
        assert!(matches!(err, GenerationError::UnknownGenerationError(_)));
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn unreachable_service_is_unknown_error() -> anyhow::Result<()> {
        use super::ImageProvider;

        let provider = GeminiProvider::new("http://127.0.0.1:9", "secret-key", "gemini-2.5-flash-image")?;
        let err = provider.generate(&request()).err();
        let Some(GenerationError::UnknownGenerationError(message)) = err else {
            anyhow::bail!("expected an unknown generation error, got {err:?}");
        };
        assert!(!message.contains("secret-key"));
        Ok(())
    }
}
