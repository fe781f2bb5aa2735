use std::sync::Arc;
use std::time::Duration;

use hypr_ai_queue::{BackoffPolicy, QueueRuntime, TracingRuntime};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use super::{RequestTimeouts, TranscriptionDriver, send_with_retry};
use crate::parsing::render_transcript;
use crate::progress::counting_body;
use crate::{
    AudioFile, Error, Provider, ProgressReporter, TranscriptSegment, TranscriptionResult,
    TranscriptionSettings,
};

pub const ASSEMBLYAI_API_BASE: &str = "https://api.assemblyai.com/v2";

const UPLOAD_DONE_PERCENT: u8 = 30;
const POLL_CEILING_PERCENT: u8 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobPollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for JobPollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(3000),
            max_attempts: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Error,
    Other(String),
}

impl JobStatus {
    fn parse(raw: &str) -> Self {
        match raw {
            "queued" => Self::Queued,
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Other(raw) => raw,
        }
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    audio_url: &'a str,
    speaker_labels: bool,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    word_boost: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    boost_param: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_detection: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Job {
    id: String,
    status: JobStatus,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    utterances: Option<Vec<Utterance>>,
    /// Seconds.
    #[serde(default)]
    audio_duration: Option<f64>,
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Utterance {
    /// Milliseconds.
    start: f64,
    end: f64,
    speaker: String,
    text: String,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Upload, submit a job, then poll it until it settles.
pub struct AssemblyAIDriver {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    poll: JobPollPolicy,
    backoff: BackoffPolicy,
    timeouts: RequestTimeouts,
    runtime: Arc<dyn QueueRuntime>,
}

impl AssemblyAIDriver {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: ASSEMBLYAI_API_BASE.to_string(),
            api_key: api_key.into(),
            poll: JobPollPolicy::default(),
            backoff: BackoffPolicy::default(),
            timeouts: RequestTimeouts::default(),
            runtime: Arc::new(TracingRuntime),
        }
    }

    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn poll_policy(mut self, policy: JobPollPolicy) -> Self {
        self.poll = policy;
        self
    }

    pub fn backoff_policy(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = policy;
        self
    }

    pub fn timeouts(mut self, timeouts: RequestTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn runtime(mut self, runtime: Arc<dyn QueueRuntime>) -> Self {
        self.runtime = runtime;
        self
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(Error::Api {
            provider: Provider::AssemblyAI,
            status: status.as_u16(),
            message,
        })
    }

    async fn upload(&self, file: &AudioFile, progress: &ProgressReporter) -> Result<String, Error> {
        let uploaded: UploadResponse = send_with_retry(
            &self.backoff,
            self.runtime.as_ref(),
            self.timeouts.upload,
            || async {
                let body = counting_body(
                    file.bytes.clone(),
                    progress.clone(),
                    0,
                    UPLOAD_DONE_PERCENT,
                    "Uploading audio",
                );

                let response = self
                    .http
                    .post(format!("{}/upload", self.api_base))
                    .header(reqwest::header::AUTHORIZATION, &self.api_key)
                    .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                    .body(body)
                    .send()
                    .await?;

                Ok::<_, Error>(self.check(response).await?.json().await?)
            },
        )
        .await?;

        Ok(uploaded.upload_url)
    }

    async fn submit(
        &self,
        audio_url: &str,
        settings: &TranscriptionSettings,
    ) -> Result<Job, Error> {
        let has_vocabulary = !settings.vocabulary.is_empty();
        let request = SubmitRequest {
            audio_url,
            speaker_labels: true,
            word_boost: &settings.vocabulary,
            boost_param: has_vocabulary.then_some("high"),
            language_code: settings.language.as_deref(),
            language_detection: settings.language.is_none().then_some(true),
        };

        send_with_retry(
            &self.backoff,
            self.runtime.as_ref(),
            self.timeouts.request,
            || async {
                let response = self
                    .http
                    .post(format!("{}/transcript", self.api_base))
                    .header(reqwest::header::AUTHORIZATION, &self.api_key)
                    .json(&request)
                    .send()
                    .await?;

                Ok::<_, Error>(self.check(response).await?.json().await?)
            },
        )
        .await
    }

    async fn fetch(&self, job_id: &str) -> Result<Job, Error> {
        let response = self
            .http
            .get(format!("{}/transcript/{}", self.api_base, job_id))
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .send()
            .await?;

        Ok(self.check(response).await?.json().await?)
    }

    async fn wait_for_completion(
        &self,
        job_id: &str,
        progress: &ProgressReporter,
    ) -> Result<Job, Error> {
        let max_attempts = self.poll.max_attempts;
        let mut last_status = JobStatus::Queued;

        for attempt in 1..=max_attempts {
            tokio::time::sleep(self.poll.interval).await;

            let job = send_with_retry(
                &self.backoff,
                self.runtime.as_ref(),
                self.timeouts.request,
                || self.fetch(job_id),
            )
            .await?;
            tracing::debug!(job_id, attempt, status = job.status.as_str(), "job_polled");
            progress.report_fraction(
                UPLOAD_DONE_PERCENT,
                POLL_CEILING_PERCENT,
                attempt as u64,
                max_attempts as u64,
                "Transcribing",
            );

            match job.status {
                JobStatus::Completed => return Ok(job),
                JobStatus::Error => {
                    return Err(Error::JobFailed {
                        job_id: job_id.to_string(),
                        message: job.error.unwrap_or_else(|| "no reason given".to_string()),
                    });
                }
                status => last_status = status,
            }
        }

        Err(Error::JobTimeout {
            job_id: job_id.to_string(),
            attempts: max_attempts,
            last_status: last_status.as_str().to_string(),
        })
    }
}

fn segments_from_job(job: &Job) -> Vec<TranscriptSegment> {
    let utterances = job.utterances.as_deref().unwrap_or_default();
    if !utterances.is_empty() {
        return utterances
            .iter()
            .map(|u| {
                let segment = TranscriptSegment::new(
                    u.start / 1000.0,
                    u.end / 1000.0,
                    format!("Speaker {}", u.speaker),
                    u.text.trim(),
                );
                match u.confidence {
                    Some(c) => segment.with_confidence(c * 100.0),
                    None => segment,
                }
            })
            .collect();
    }

    match job.text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => vec![TranscriptSegment::new(
            0.0,
            job.audio_duration.unwrap_or(0.0),
            "Speaker A",
            text,
        )],
        _ => Vec::new(),
    }
}

impl TranscriptionDriver for AssemblyAIDriver {
    fn provider(&self) -> Provider {
        Provider::AssemblyAI
    }

    async fn transcribe(
        &self,
        file: &AudioFile,
        settings: &TranscriptionSettings,
        progress: &ProgressReporter,
    ) -> Result<TranscriptionResult, Error> {
        let span =
            tracing::info_span!("transcribe", provider = %Provider::AssemblyAI, bytes = file.len());

        async {
            let audio_url = self.upload(file, progress).await?;
            progress.report(UPLOAD_DONE_PERCENT, "Queued for transcription");

            let submitted = self.submit(&audio_url, settings).await?;
            tracing::info!(job_id = %submitted.id, "job_submitted");

            let job = self.wait_for_completion(&submitted.id, progress).await?;
            let segments = segments_from_job(&job);
            let text = if segments.is_empty() {
                job.text.clone().unwrap_or_default()
            } else {
                render_transcript(&segments)
            };

            progress.report(100, "Done");
            tracing::info!(segments = segments.len(), "transcription_completed");

            Ok(TranscriptionResult {
                text,
                segments,
                provider_used: Provider::AssemblyAI,
                detected_language: job.language_code.or_else(|| settings.language.clone()),
            })
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(value: serde_json::Value) -> Job {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_utterances_map_to_segments() {
        let job = job(serde_json::json!({
            "id": "t1",
            "status": "completed",
            "text": "Please be seated. Thank you.",
            "utterances": [
                {
                    "start": 250,
                    "end": 1800,
                    "speaker": "A",
                    "text": "Please be seated.",
                    "confidence": 0.93
                },
                { "start": 2100, "end": 2900, "speaker": "B", "text": "Thank you." }
            ]
        }));

        let segments = segments_from_job(&job);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start, 0.25);
        assert_eq!(segments[0].end, 1.8);
        assert_eq!(segments[0].speaker, "Speaker A");
        assert!((segments[0].confidence.unwrap() - 93.0).abs() < 1e-9);
        assert_eq!(segments[1].confidence, None);
    }

    #[test]
    fn test_text_without_utterances_spans_duration() {
        let job = job(serde_json::json!({
            "id": "t2",
            "status": "completed",
            "text": "Single speaker dictation.",
            "utterances": [],
            "audio_duration": 12.5
        }));

        let segments = segments_from_job(&job);
        assert_eq!(segments.len(), 1);
        assert_eq!((segments[0].start, segments[0].end), (0.0, 12.5));
        assert_eq!(segments[0].text, "Single speaker dictation.");
    }

    #[test]
    fn test_no_text_no_segments() {
        let job = job(serde_json::json!({ "id": "t3", "status": "completed" }));
        assert!(segments_from_job(&job).is_empty());
    }

    #[test]
    fn test_status_parsing() {
        let cases = [
            ("queued", JobStatus::Queued),
            ("processing", JobStatus::Processing),
            ("completed", JobStatus::Completed),
            ("error", JobStatus::Error),
            ("paused", JobStatus::Other("paused".to_string())),
        ];

        for (input, expected) in cases {
            assert_eq!(JobStatus::parse(input), expected, "failed for {:?}", input);
        }
    }

    #[test]
    fn test_submit_body() {
        let vocabulary = vec!["habeas corpus".to_string()];
        let request = SubmitRequest {
            audio_url: "https://cdn/audio",
            speaker_labels: true,
            word_boost: &vocabulary,
            boost_param: Some("high"),
            language_code: None,
            language_detection: Some(true),
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "audio_url": "https://cdn/audio",
                "speaker_labels": true,
                "word_boost": ["habeas corpus"],
                "boost_param": "high",
                "language_detection": true
            })
        );
    }
}
