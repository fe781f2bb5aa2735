mod common;

use std::time::Duration;

use common::{assert_monotonic_to_done, audio, count_requests, recorder};
use hypr_ai_queue::BackoffPolicy;
use transcribe_cloud::{
    AssemblyAIDriver, Error, JobPollPolicy, Provider, ProgressReporter, TranscriptionDriver,
    TranscriptionSettings,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JOB_PATH: &str = "/transcript/job-1";

fn driver(server: &MockServer, max_attempts: u32) -> AssemblyAIDriver {
    AssemblyAIDriver::new("aai-key")
        .api_base(server.uri())
        .poll_policy(JobPollPolicy {
            interval: Duration::from_millis(1),
            max_attempts,
        })
        .backoff_policy(BackoffPolicy::new(2, Duration::from_millis(1)))
}

async fn mount_upload_and_submit(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(header("authorization", "aai-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "upload_url": "https://cdn.assemblyai.com/upload/xyz"
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/transcript"))
        .and(header("authorization", "aai-key"))
        .and(body_partial_json(serde_json::json!({
            "audio_url": "https://cdn.assemblyai.com/upload/xyz",
            "speaker_labels": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "job-1",
            "status": "queued"
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn job(status: &str) -> serde_json::Value {
    serde_json::json!({ "id": "job-1", "status": status })
}

#[tokio::test]
async fn completed_job_maps_utterances() {
    let server = MockServer::start().await;
    mount_upload_and_submit(&server).await;

    Mock::given(method("GET"))
        .and(path(JOB_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(job("processing")))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(JOB_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "job-1",
            "status": "completed",
            "text": "Raise your right hand. I do.",
            "language_code": "en_us",
            "audio_duration": 4.2,
            "utterances": [
                {
                    "start": 0,
                    "end": 2100,
                    "speaker": "A",
                    "text": "Raise your right hand.",
                    "confidence": 0.9
                },
                { "start": 2400, "end": 3000, "speaker": "B", "text": "I do.", "confidence": 0.8 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (progress, seen) = recorder();
    let result = driver(&server, 120)
        .transcribe(
            &audio(4096),
            &TranscriptionSettings::new(Provider::AssemblyAI),
            &progress,
        )
        .await
        .unwrap();

    assert_eq!(count_requests(&server, "GET", JOB_PATH).await, 3);
    assert_eq!(result.provider_used, Provider::AssemblyAI);
    assert_eq!(result.detected_language.as_deref(), Some("en_us"));
    assert_eq!(result.segments.len(), 2);
    assert_eq!(result.segments[1].speaker, "Speaker B");
    assert_eq!(result.segments[1].start, 2.4);
    assert_eq!(
        result.text,
        "[0:00] [Speaker A] Raise your right hand.\n[0:02] [Speaker B] I do."
    );

    let seen = seen.lock().unwrap();
    assert_monotonic_to_done(&seen);
    assert!(seen.contains(&30));
}

#[tokio::test]
async fn vocabulary_and_language_are_submitted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "upload_url": "https://cdn.assemblyai.com/upload/xyz"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/transcript"))
        .and(body_partial_json(serde_json::json!({
            "word_boost": ["certiorari"],
            "boost_param": "high",
            "language_code": "en"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(job("queued")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(JOB_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "job-1",
            "status": "completed",
            "text": "Petition for certiorari.",
            "audio_duration": 3.0
        })))
        .mount(&server)
        .await;

    let settings = TranscriptionSettings::new(Provider::AssemblyAI)
        .vocabulary(["certiorari"])
        .language("en");

    let result = driver(&server, 5)
        .transcribe(&audio(16), &settings, &ProgressReporter::noop())
        .await
        .unwrap();

    assert_eq!(result.segments.len(), 1);
    assert_eq!(result.segments[0].end, 3.0);
    assert_eq!(result.detected_language.as_deref(), Some("en"));
}

#[tokio::test]
async fn error_status_stops_polling_immediately() {
    let server = MockServer::start().await;
    mount_upload_and_submit(&server).await;

    Mock::given(method("GET"))
        .and(path(JOB_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(job("queued")))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(JOB_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "job-1",
            "status": "error",
            "error": "Audio file is too short"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = driver(&server, 120)
        .transcribe(
            &audio(16),
            &TranscriptionSettings::new(Provider::AssemblyAI),
            &ProgressReporter::noop(),
        )
        .await
        .unwrap_err();

    assert_eq!(count_requests(&server, "GET", JOB_PATH).await, 3);
    match err {
        Error::JobFailed { job_id, message } => {
            assert_eq!(job_id, "job-1");
            assert_eq!(message, "Audio file is too short");
        }
        other => panic!("expected JobFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn transient_poll_failure_is_retried() {
    let server = MockServer::start().await;
    mount_upload_and_submit(&server).await;

    Mock::given(method("GET"))
        .and(path(JOB_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("temporarily unavailable"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(JOB_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "job-1",
            "status": "completed",
            "text": "The witness may step down.",
            "audio_duration": 2.0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = driver(&server, 120)
        .transcribe(
            &audio(16),
            &TranscriptionSettings::new(Provider::AssemblyAI),
            &ProgressReporter::noop(),
        )
        .await
        .unwrap();

    assert_eq!(count_requests(&server, "GET", JOB_PATH).await, 2);
    assert_eq!(result.text, "[0:00] [Speaker A] The witness may step down.");
}

#[tokio::test]
async fn persistent_poll_failure_surfaces_after_retries() {
    let server = MockServer::start().await;
    mount_upload_and_submit(&server).await;

    Mock::given(method("GET"))
        .and(path(JOB_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(3)
        .mount(&server)
        .await;

    let err = driver(&server, 120)
        .transcribe(
            &audio(16),
            &TranscriptionSettings::new(Provider::AssemblyAI),
            &ProgressReporter::noop(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(502));
}

#[tokio::test]
async fn exhausted_polls_time_out() {
    let server = MockServer::start().await;
    mount_upload_and_submit(&server).await;

    Mock::given(method("GET"))
        .and(path(JOB_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(job("processing")))
        .expect(4)
        .mount(&server)
        .await;

    let err = driver(&server, 4)
        .transcribe(
            &audio(16),
            &TranscriptionSettings::new(Provider::AssemblyAI),
            &ProgressReporter::noop(),
        )
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    match err {
        Error::JobTimeout {
            attempts,
            last_status,
            ..
        } => {
            assert_eq!(attempts, 4);
            assert_eq!(last_status, "processing");
        }
        other => panic!("expected JobTimeout, got {:?}", other),
    }
}

#[tokio::test]
async fn rejected_upload_surfaces_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
        .mount(&server)
        .await;

    let err = driver(&server, 5)
        .transcribe(
            &audio(16),
            &TranscriptionSettings::new(Provider::AssemblyAI),
            &ProgressReporter::noop(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(401));
}
