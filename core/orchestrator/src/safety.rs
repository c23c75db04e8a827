use std::collections::HashMap;
use std::fs;
use std::path::Path;

use domain::safety::SafetyOverlay;
use domain::{HandlerReply, SafetyVerdict, ViolationKind};
use serde::Deserialize;

use crate::config::ConfigError;

const GENERAL_DISCLAIMER_KEY: &str = "general";

#[derive(Debug, Deserialize)]
struct DisclaimersFile {
    disclaimer: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ProhibitedPhrasesFile {
    phrases: Vec<String>,
}

/// The last authority before audit logging. Referentially transparent:
/// given the same reply and handler type, `check` and `disclaimer_for`
/// always return the same result (modulo timestamps the caller attaches
/// afterwards).
pub struct SafetyWrapper {
    disclaimers: HashMap<String, String>,
    prohibited_phrases: Vec<String>,
}

impl SafetyWrapper {
    pub fn from_files(
        disclaimers_path: &Path,
        prohibited_phrases_path: &Path,
    ) -> Result<Self, ConfigError> {
        let disclaimers_raw = fs::read_to_string(disclaimers_path)?;
        let disclaimers_file: DisclaimersFile = toml::from_str(&disclaimers_raw)?;
        if !disclaimers_file.disclaimer.contains_key(GENERAL_DISCLAIMER_KEY) {
            return Err(ConfigError::InvalidPattern(
                "disclaimers file must define a 'general' fallback".to_string(),
            ));
        }

        let prohibited_raw = fs::read_to_string(prohibited_phrases_path)?;
        let prohibited_file: ProhibitedPhrasesFile = toml::from_str(&prohibited_raw)?;

        Ok(Self {
            disclaimers: disclaimers_file.disclaimer,
            prohibited_phrases: prohibited_file.phrases,
        })
    }

    /// Disclaimer for a handler type, falling back to the general one.
    /// Always non-empty.
    pub fn disclaimer_for(&self, handler_type: &str) -> String {
        self.disclaimers
            .get(handler_type)
            .or_else(|| self.disclaimers.get(GENERAL_DISCLAIMER_KEY))
            .cloned()
            .unwrap_or_else(|| "This information is not a substitute for professional medical advice.".to_string())
    }

    pub fn general_disclaimer(&self) -> String {
        self.disclaimer_for(GENERAL_DISCLAIMER_KEY)
    }

    /// Runs the prohibited-language check and emergency overlay over a
    /// reply. Never mutates `data`; on a match it blocks outright.
    pub fn check(&self, reply: &HandlerReply) -> SafetyVerdict {
        if let Some((kind, details)) = self.find_prohibited(reply) {
            return SafetyVerdict::Block { kind, details };
        }

        if reply.requires_escalation || !reply.red_flags.is_empty() {
            let summary = if reply.red_flags.is_empty() {
                format!(
                    "Escalation recommended by handler '{}'.",
                    reply.handler_name
                )
            } else {
                format!(
                    "Escalation recommended by handler '{}': {}",
                    reply.handler_name,
                    reply.red_flags.join("; ")
                )
            };
            return SafetyVerdict::AllowWithOverlay(SafetyOverlay {
                emergency: true,
                emergency_alert: Some(summary),
            });
        }

        SafetyVerdict::Allow
    }

    fn find_prohibited(&self, reply: &HandlerReply) -> Option<(ViolationKind, String)> {
        let mut haystack = String::new();
        for value in reply.data.values() {
            haystack.push(' ');
            haystack.push_str(&value.to_string());
        }
        if let Some(reasoning) = &reply.reasoning {
            haystack.push(' ');
            haystack.push_str(reasoning);
        }
        let haystack = haystack.to_lowercase();

        self.prohibited_phrases
            .iter()
            .find(|phrase| haystack.contains(&phrase.to_lowercase()))
            .map(|phrase| {
                (
                    ViolationKind::ProhibitedLanguage,
                    format!("matched prohibited phrase: '{phrase}'"),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use domain::HandlerReply;
    use serde_json::json;
    use tempfile::NamedTempFile;

    use super::*;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, "{contents}").expect("write temp file");
        file
    }

    fn sample_wrapper() -> (SafetyWrapper, NamedTempFile, NamedTempFile) {
        let disclaimers = write_temp(
            r#"
            [disclaimer]
            general = "This is not a substitute for professional medical advice."
            triage = "If this is a life-threatening emergency, call emergency services."
            "#,
        );
        let prohibited = write_temp(
            r#"phrases = ["you have diabetes", "diagnosed with", "take 500mg"]"#,
        );
        let wrapper =
            SafetyWrapper::from_files(disclaimers.path(), prohibited.path()).expect("load wrapper");
        (wrapper, disclaimers, prohibited)
    }

    #[test]
    fn disclaimer_falls_back_to_general() {
        let (wrapper, _d, _p) = sample_wrapper();
        assert_eq!(
            wrapper.disclaimer_for("triage"),
            "If this is a life-threatening emergency, call emergency services."
        );
        assert_eq!(
            wrapper.disclaimer_for("unknown_handler"),
            wrapper.general_disclaimer()
        );
    }

    #[test]
    fn prohibited_phrase_blocks() {
        let (wrapper, _d, _p) = sample_wrapper();
        let mut reply = HandlerReply::success("diagnostic", 0.9);
        reply.data.insert(
            "summary".to_string(),
            json!("you have diabetes, a chronic condition"),
        );
        let verdict = wrapper.check(&reply);
        assert!(matches!(verdict, SafetyVerdict::Block { .. }));
    }

    #[test]
    fn escalation_sets_overlay() {
        let (wrapper, _d, _p) = sample_wrapper();
        let reply = HandlerReply::success("triage", 0.9).escalating();
        let verdict = wrapper.check(&reply);
        match verdict {
            SafetyVerdict::AllowWithOverlay(overlay) => assert!(overlay.emergency),
            other => panic!("expected AllowWithOverlay, got {other:?}"),
        }
    }

    #[test]
    fn red_flags_set_overlay_even_without_escalation_flag() {
        let (wrapper, _d, _p) = sample_wrapper();
        let reply = HandlerReply::success("triage", 0.9)
            .with_red_flags(vec!["chest pain".to_string()]);
        let verdict = wrapper.check(&reply);
        assert!(matches!(verdict, SafetyVerdict::AllowWithOverlay(_)));
    }

    #[test]
    fn clean_reply_allows() {
        let (wrapper, _d, _p) = sample_wrapper();
        let reply = HandlerReply::success("communication", 0.9).with_reasoning("a calm answer");
        assert!(matches!(wrapper.check(&reply), SafetyVerdict::Allow));
    }

    #[test]
    fn check_is_idempotent() {
        let (wrapper, _d, _p) = sample_wrapper();
        let reply = HandlerReply::success("triage", 0.9).escalating();
        let first = format!("{:?}", wrapper.check(&reply));
        let second = format!("{:?}", wrapper.check(&reply));
        assert_eq!(first, second);
    }
}
