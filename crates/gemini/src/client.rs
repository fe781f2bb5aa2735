use crate::error::{Error, check_status};
use crate::types::{File, FileEnvelope, GenerateContentRequest, GenerateContentResponse};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn builder() -> GeminiClientBuilder {
        GeminiClientBuilder::default()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, Error> {
        self.generate_content_with_model(&self.model, request).await
    }

    pub async fn generate_content_with_model(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, Error> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.api_base, model);

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Opens a resumable upload session and returns the session URL.
    pub async fn start_resumable_upload(
        &self,
        display_name: &str,
        num_bytes: u64,
        mime_type: &str,
    ) -> Result<String, Error> {
        let url = format!("{}/upload/v1beta/files", self.api_base);

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", num_bytes.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&serde_json::json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;

        let response = check_status(response).await?;

        response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or(Error::MissingUploadUrl)
    }

    /// Sends the whole payload to an upload session in a single
    /// `upload, finalize` request.
    pub async fn upload_and_finalize(
        &self,
        upload_url: &str,
        num_bytes: u64,
        body: impl Into<reqwest::Body>,
    ) -> Result<File, Error> {
        let response = self
            .http
            .post(upload_url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::CONTENT_LENGTH, num_bytes.to_string())
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(body)
            .send()
            .await?;

        let response = check_status(response).await?;
        let envelope: FileEnvelope = response.json().await?;
        Ok(envelope.file)
    }

    /// `name` is the resource name returned by the upload, e.g. `files/abc123`.
    pub async fn get_file(&self, name: &str) -> Result<File, Error> {
        let url = format!("{}/v1beta/{}", self.api_base, name.trim_start_matches('/'));

        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

#[derive(Default)]
pub struct GeminiClientBuilder {
    http: Option<reqwest::Client>,
    api_base: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
}

impl GeminiClientBuilder {
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> GeminiClient {
        GeminiClient {
            http: self.http.unwrap_or_default(),
            api_base: self
                .api_base
                .unwrap_or_else(|| GEMINI_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: self.api_key.unwrap_or_default(),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}
