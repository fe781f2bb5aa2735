#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use transcribe_cloud::{AudioFile, ProgressReporter};
use wiremock::{MockServer, Request};

pub fn audio(len: usize) -> AudioFile {
    AudioFile::new(vec![7u8; len], "audio/mpeg", "deposition.mp3")
}

pub fn recorder() -> (ProgressReporter, Arc<Mutex<Vec<u8>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let reporter = ProgressReporter::new(move |p| sink.lock().unwrap().push(p.percent));
    (reporter, seen)
}

pub fn assert_monotonic_to_done(seen: &[u8]) {
    assert!(!seen.is_empty());
    for pair in seen.windows(2) {
        assert!(pair[0] <= pair[1], "progress went backwards: {:?}", seen);
    }
    assert_eq!(seen.last(), Some(&100));
}

pub async fn count_requests(server: &MockServer, method: &str, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == method && r.url.path() == path)
        .count()
}

pub fn body_contains(needle: &'static str) -> impl Fn(&Request) -> bool + Send + Sync + 'static {
    move |req: &Request| String::from_utf8_lossy(&req.body).contains(needle)
}

// wiremock's `header` matcher splits on commas, so compare the raw value.
pub fn raw_header(
    name: &'static str,
    expected: &'static str,
) -> impl Fn(&Request) -> bool + Send + Sync + 'static {
    move |req: &Request| req.headers.get(name).and_then(|v| v.to_str().ok()) == Some(expected)
}
