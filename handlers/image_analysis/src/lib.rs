use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use domain::{Handler, HandlerReply, Request};
use serde_json::{Map, Value};

/// Stand-in for an imaging pipeline: confirms an attachment was
/// submitted and returns a confidence capped low enough that the
/// explainability and safety layers always route the caller to a
/// radiologist rather than treat this as a finished read.
pub struct ImageAnalysisHandler {
    enabled: AtomicBool,
}

impl ImageAnalysisHandler {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }
}

impl Default for ImageAnalysisHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for ImageAnalysisHandler {
    fn name(&self) -> &str {
        "image_analysis"
    }

    fn description(&self) -> &str {
        "Preliminary image attachment triage. Always requires radiologist review."
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "image".to_string(),
            "scan".to_string(),
            "x-ray".to_string(),
            "photo".to_string(),
        ]
    }

    fn confidence_threshold(&self) -> f64 {
        0.25
    }

    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn validate_request(&self, request: &Request) -> bool {
        !request.message_is_blank() && !request.attachments.is_empty()
    }

    async fn process(&self, request: &Request) -> Result<HandlerReply, String> {
        if request.attachments.is_empty() {
            return Err("no image attachment was provided".to_string());
        }

        let mut data = Map::new();
        data.insert(
            "attachment_count".to_string(),
            Value::Number(request.attachments.len().into()),
        );

        Ok(HandlerReply::success(self.name(), 0.45).with_data(data).with_reasoning(
            format!(
                "Received {} image attachment(s) for preliminary triage. \
                 Findings are not a final read and require radiologist confirmation.",
                request.attachments.len()
            ),
        ))
    }
}
