use hypr_gemini::strip_code_fences;
use serde::Deserialize;

use crate::TranscriptSegment;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Timestamp {
    Seconds(f64),
    Clock(String),
}

impl Timestamp {
    fn seconds(&self) -> Option<f64> {
        match self {
            Timestamp::Seconds(s) => Some(*s),
            Timestamp::Clock(raw) => parse_clock(raw),
        }
    }
}

/// `"75"`, `"1:15"`, `"01:15.5"`, `"1:01:15"` to seconds.
fn parse_clock(raw: &str) -> Option<f64> {
    raw.trim()
        .split(':')
        .try_fold(0.0, |acc, part| Some(acc * 60.0 + part.trim().parse::<f64>().ok()?))
}

#[derive(Debug, Deserialize)]
struct RawSegment {
    start: Option<Timestamp>,
    end: Option<Timestamp>,
    #[serde(default)]
    speaker: Option<String>,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTranscript {
    Segments(Vec<RawSegment>),
    Wrapped { segments: Vec<RawSegment> },
}

/// `None` when the output is not a segment list.
pub fn parse_segments(raw: &str) -> Option<Vec<TranscriptSegment>> {
    let parsed: RawTranscript = serde_json::from_str(strip_code_fences(raw)).ok()?;
    let raw_segments = match parsed {
        RawTranscript::Segments(segments) => segments,
        RawTranscript::Wrapped { segments } => segments,
    };

    let segments = raw_segments
        .into_iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| {
            let start = s.start.as_ref().and_then(Timestamp::seconds).unwrap_or(0.0);
            let end = s.end.as_ref().and_then(Timestamp::seconds).unwrap_or(start);
            let speaker = s
                .speaker
                .filter(|sp| !sp.trim().is_empty())
                .unwrap_or_else(|| "Speaker 1".to_string());
            TranscriptSegment::new(start, end, speaker.trim(), s.text.trim())
        })
        .collect();

    Some(segments)
}

/// `m:ss`, minutes unbounded.
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

pub fn render_transcript(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|s| format!("[{}] [{}] {}", format_timestamp(s.start), s.speaker, s.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turns generation output into transcript text plus segments. Unparseable
/// output is kept verbatim as the text with no segments.
pub fn interpret_transcript(raw: &str) -> (String, Vec<TranscriptSegment>) {
    match parse_segments(raw) {
        Some(segments) => (render_transcript(&segments), segments),
        None => {
            tracing::warn!(len = raw.len(), "transcript_not_structured");
            (raw.trim().to_string(), Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_array() {
        let raw = concat!(
            "```json\n",
            r#"[{"start":0,"end":2.5,"speaker":"Speaker 1","text":"Hello"}]"#,
            "\n```"
        );
        let (text, segments) = interpret_transcript(raw);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].end, 2.5);
        assert_eq!(text, "[0:00] [Speaker 1] Hello");
    }

    #[test]
    fn test_not_json_degrades() {
        let (text, segments) = interpret_transcript("not json");
        assert_eq!(text, "not json");
        assert!(segments.is_empty());
    }

    #[test]
    fn test_wrapped_and_clock_timestamps() {
        let raw = r#"{"segments": [
            {"start": "1:05", "end": "01:07.5", "speaker": "Counsel", "text": "State your name."},
            {"start": "1:01:00", "end": 3661, "speaker": "", "text": "John Doe."}
        ]}"#;

        let segments = parse_segments(raw).unwrap();
        assert_eq!(segments[0].start, 65.0);
        assert_eq!(segments[0].end, 67.5);
        assert_eq!(segments[1].start, 3660.0);
        assert_eq!(segments[1].speaker, "Speaker 1");

        assert_eq!(
            render_transcript(&segments),
            "[1:05] [Counsel] State your name.\n[61:00] [Speaker 1] John Doe."
        );
    }

    #[test]
    fn test_empty_array_is_empty_transcript() {
        let (text, segments) = interpret_transcript("[]");
        assert_eq!(text, "");
        assert!(segments.is_empty());
    }

    #[test]
    fn test_format_timestamp() {
        let cases = [
            (0.0, "0:00"),
            (9.9, "0:09"),
            (61.0, "1:01"),
            (-4.0, "0:00"),
            (3600.0, "60:00"),
        ];
        for (input, expected) in cases {
            assert_eq!(format_timestamp(input), expected, "failed for {:?}", input);
        }
    }

    #[test]
    fn test_inverted_times_are_clamped() {
        let raw = r#"[{"start": 5, "end": 3, "speaker": "A", "text": "x"}]"#;
        let segments = parse_segments(raw).unwrap();
        assert_eq!(segments[0].end, 5.0);
    }
}
