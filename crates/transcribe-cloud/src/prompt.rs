use indoc::{formatdoc, indoc};

use crate::{TranscriptionMode, TranscriptionSettings};

const OUTPUT_RULES: &str = indoc! {r#"
    Return ONLY a JSON array, no prose and no markdown. Each element must be:
    {"start": <seconds as a number>, "end": <seconds as a number>, "speaker": "<label>", "text": "<what was said>"}

    Rules:
    - Segments are in chronological order and end >= start.
    - Start a new segment whenever the speaker changes or after a long pause.
    - Label speakers consistently as "Speaker 1", "Speaker 2", ... unless a name is stated in the audio.
    - Do not invent words that are not audible. Mark unclear audio as [inaudible].
"#};

const VERBATIM_RULES: &str = indoc! {"
    Transcribe verbatim: keep filler words (um, uh), false starts, repetitions, and self-corrections exactly as spoken.
"};

const CLEAN_RULES: &str = indoc! {"
    Produce a clean transcript: remove filler words and false starts, fix obvious disfluencies, but never change meaning, tense, or legal substance.
"};

pub fn transcription_prompt(settings: &TranscriptionSettings) -> String {
    let mode_rules = match settings.mode {
        TranscriptionMode::Verbatim => VERBATIM_RULES,
        TranscriptionMode::Clean => CLEAN_RULES,
    };

    let vocabulary = if settings.vocabulary.is_empty() {
        String::new()
    } else {
        format!(
            "\nThe recording may contain these terms; spell them exactly like this: {}.\n",
            settings.vocabulary.join(", ")
        )
    };

    let language = match settings.language.as_deref() {
        Some(lang) => format!("\nThe spoken language is {lang}. Transcribe in that language.\n"),
        None => String::new(),
    };

    formatdoc! {"
        You are a court reporter transcribing a legal recording.

        {mode_rules}{vocabulary}{language}
        {output_rules}",
        mode_rules = mode_rules,
        vocabulary = vocabulary,
        language = language,
        output_rules = OUTPUT_RULES,
    }
}

/// Single-shot providers take a short free-text hint instead.
pub fn vocabulary_hint(vocabulary: &[String]) -> Option<String> {
    if vocabulary.is_empty() {
        None
    } else {
        Some(vocabulary.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Provider;

    #[test]
    fn test_mode_rules() {
        let verbatim = transcription_prompt(
            &TranscriptionSettings::new(Provider::Gemini).mode(TranscriptionMode::Verbatim),
        );
        assert!(verbatim.contains("verbatim"));
        assert!(!verbatim.contains("clean transcript"));

        let clean = transcription_prompt(&TranscriptionSettings::new(Provider::Gemini));
        assert!(clean.contains("clean transcript"));
        assert!(clean.contains("Return ONLY a JSON array"));
    }

    #[test]
    fn test_vocabulary_and_language() {
        let settings = TranscriptionSettings::new(Provider::Gemini)
            .vocabulary(["res judicata", "Mr. Okonkwo"])
            .language("es");

        let prompt = transcription_prompt(&settings);
        assert!(prompt.contains("res judicata, Mr. Okonkwo"));
        assert!(prompt.contains("The spoken language is es"));
    }

    #[test]
    fn test_vocabulary_hint() {
        assert_eq!(vocabulary_hint(&[]), None);
        assert_eq!(
            vocabulary_hint(&["voir dire".to_string(), "amicus".to_string()]).as_deref(),
            Some("voir dire, amicus")
        );
    }
}
