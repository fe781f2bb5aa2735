use gemini::{Content, Error, FileState, GeminiClient, GenerateContentRequest};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

// wiremock's `header` matcher splits on commas, so compare the raw value.
fn raw_header(
    name: &'static str,
    expected: &'static str,
) -> impl Fn(&Request) -> bool + Send + Sync + 'static {
    move |req: &Request| req.headers.get(name).and_then(|v| v.to_str().ok()) == Some(expected)
}

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::builder()
        .api_base(server.uri())
        .api_key("test-key")
        .model("gemini-test")
        .build()
}

#[tokio::test]
async fn generate_content_sends_key_and_returns_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-test:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": "Summarize the deposition" }] }],
            "systemInstruction": { "parts": [{ "text": "You are a paralegal." }] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": "Done." }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = GenerateContentRequest::new(vec![Content::user("Summarize the deposition")])
        .system_instruction("You are a paralegal.");

    let response = client(&server).generate_content(&request).await.unwrap();
    assert_eq!(response.text().as_deref(), Some("Done."));
}

#[tokio::test]
async fn api_error_carries_status_and_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-test:generateContent"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "error": {
                "code": 429,
                "message": "Resource has been exhausted",
                "status": "RESOURCE_EXHAUSTED"
            }
        })))
        .mount(&server)
        .await;

    let request = GenerateContentRequest::new(vec![Content::user("hi")]);
    let err = client(&server).generate_content(&request).await.unwrap_err();

    assert_eq!(err.status(), Some(429));
    match err {
        Error::Api { message, .. } => assert!(message.contains("RESOURCE_EXHAUSTED")),
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn resumable_start_returns_upload_url() {
    let server = MockServer::start().await;
    let upload_url = format!("{}/upload/session/1", server.uri());

    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .and(header("X-Goog-Upload-Protocol", "resumable"))
        .and(header("X-Goog-Upload-Command", "start"))
        .and(header("X-Goog-Upload-Header-Content-Length", "4"))
        .and(header("X-Goog-Upload-Header-Content-Type", "audio/mpeg"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("x-goog-upload-url", upload_url.as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let url = client(&server)
        .start_resumable_upload("hearing.mp3", 4, "audio/mpeg")
        .await
        .unwrap();
    assert_eq!(url, upload_url);
}

#[tokio::test]
async fn resumable_start_without_header_fails_fast() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = client(&server)
        .start_resumable_upload("hearing.mp3", 4, "audio/mpeg")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingUploadUrl));
}

#[tokio::test]
async fn upload_finalize_and_file_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/session/1"))
        .and(header("X-Goog-Upload-Offset", "0"))
        .and(raw_header("x-goog-upload-command", "upload, finalize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "file": { "name": "files/abc", "uri": "https://files/abc", "state": "PROCESSING" }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1beta/files/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "files/abc", "uri": "https://files/abc", "state": "ACTIVE"
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let file = client
        .upload_and_finalize(&format!("{}/upload/session/1", server.uri()), 4, vec![1u8, 2, 3, 4])
        .await
        .unwrap();
    assert_eq!(file.state, FileState::Processing);
    assert_eq!(file.uri.as_deref(), Some("https://files/abc"));

    let file = client.get_file(&file.name).await.unwrap();
    assert_eq!(file.state, FileState::Active);
}
