use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domain::explainability::Importance;
use domain::safety::SafetyOverlay;
use domain::{
    ConfidenceLevel, ExplainabilityMetadata, HandlerReply, OrchestratorError, Request,
    SafetyVerdict, WrappedResponse,
};
use platform::{record_counter, record_histogram};
use serde_json::Value;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::audit_store::{redact, AuditFilters, AuditStore, AuditStoreError};
use crate::classifier::IntentClassifier;
use crate::config::{load_config, ConfigError, OrchestratorConfig};
use crate::explainability::ExplainabilityGenerator;
use crate::registry::HandlerRegistry;
use crate::safety::SafetyWrapper;
use domain::audit_entry::AuditAction;
use domain::response::{ConfidenceDisplay, ExplainabilitySummary, SafetyCheckSummary};
use domain::AuditEntry;

/// An operational health snapshot, recovered from the source's
/// `health_check()`: not part of the request pipeline, used for
/// readiness probes.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub total_handlers: usize,
    pub enabled_handlers: usize,
    pub audit_store_reachable: bool,
}

/// Composes the registry, classifier, safety wrapper, explainability
/// generator, and audit store into the single entry point `process`.
/// Owns no global state beyond what it is constructed with.
pub struct Orchestrator {
    registry: HandlerRegistry,
    classifier: IntentClassifier,
    safety: SafetyWrapper,
    explainer: ExplainabilityGenerator,
    audit: AuditStore,
    deadline: Duration,
    fallback_handler_name: String,
}

impl Orchestrator {
    /// Loads configuration and every data file it names. The only fatal
    /// startup condition per the propagation policy: audit store
    /// unreachable.
    pub fn from_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        let config = load_config(config_path)?;
        Self::from_config(config)
    }

    pub fn from_config(config: OrchestratorConfig) -> Result<Self, ConfigError> {
        let classifier = IntentClassifier::from_files(
            &config.emergency_patterns_path,
            &config.handler_rules_path,
        )?;
        let safety =
            SafetyWrapper::from_files(&config.disclaimers_path, &config.prohibited_phrases_path)?;
        let audit = AuditStore::open(&config.audit_store_dsn)
            .map_err(|e| ConfigError::InvalidPattern(format!("audit store unreachable: {e}")))?;

        Ok(Self {
            registry: HandlerRegistry::new(),
            classifier,
            safety,
            explainer: ExplainabilityGenerator::new(),
            audit,
            deadline: Duration::from_millis(config.default_deadline_ms),
            fallback_handler_name: config.fallback_handler_name,
        })
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn audit(&self) -> &AuditStore {
        &self.audit
    }

    /// The single entry point: `Request -> WrappedResponse`. Never
    /// returns `Err`; every failure mode becomes an error envelope, per
    /// the §7 propagation policy ("the orchestrator never panics out").
    pub async fn process(&self, request: Request) -> WrappedResponse {
        let correlation_id = Uuid::new_v4();
        let span = platform::correlation_span(correlation_id, "orchestrator.process");
        self.process_inner(request).instrument(span).await
    }

    async fn process_inner(&self, request: Request) -> WrappedResponse {
        // Step 1: validate.
        if request.message_is_blank() {
            record_counter("orchestrator_requests_invalid_total", 1);
            return WrappedResponse::error(
                self.safety.general_disclaimer(),
                OrchestratorError::InputInvalid("empty message".to_string()).short_message(),
            );
        }

        // Step 2: classify.
        let intent = self.classifier.classify(&request);

        // Step 3: annotate context. The only context mutation the
        // orchestrator performs.
        let mut request = request;
        if intent.primary_handler == "communication" {
            request.context.set_question_if_absent(&request.message.clone());
        }

        // Step 4: lookup.
        let handler = match self.registry.get(&intent.primary_handler) {
            Some(h) if h.enabled() => h,
            _ => {
                record_counter("orchestrator_requests_handler_unavailable_total", 1);
                return WrappedResponse::error(
                    self.safety.general_disclaimer(),
                    OrchestratorError::HandlerUnavailable(intent.primary_handler.clone())
                        .short_message(),
                );
            }
        };

        // Step 5: dispatch, under deadline and the per-handler permit.
        let dispatch_result = self.dispatch(&handler, &request).await;

        let reply = match dispatch_result {
            Ok(reply) => reply,
            Err(err) => {
                record_counter("orchestrator_requests_handler_failure_total", 1);
                let mut response =
                    WrappedResponse::error(self.safety.general_disclaimer(), err.short_message());
                if err.requires_audit_write() {
                    match self.write_failure_audit(&request, &intent.primary_handler, &err).await {
                        Ok(id) => response = response.with_audit_id(id),
                        Err(audit_err) => return self.audit_failure_response(&audit_err),
                    }
                }
                return response;
            }
        };

        // Step 6: safety wrap.
        let verdict = self.safety.check(&reply);
        let (overlay, blocked) = match verdict {
            SafetyVerdict::Allow => (SafetyOverlay::default(), None),
            SafetyVerdict::AllowWithOverlay(overlay) => (overlay, None),
            SafetyVerdict::Block { kind, details } => (SafetyOverlay::default(), Some((kind, details))),
        };

        if let Some((kind, details)) = blocked {
            let audit_id = match self.write_violation_audit(&request, &reply, &kind, &details).await {
                Ok(id) => id,
                Err(err) => return self.audit_failure_response(&err),
            };
            record_counter("orchestrator_requests_blocked_total", 1);
            let response = WrappedResponse::error(
                self.safety.disclaimer_for(&intent.primary_handler),
                OrchestratorError::SafetyViolation {
                    kind: format!("{kind:?}"),
                    detail: "content withheld".to_string(),
                }
                .short_message(),
            );
            return response.with_audit_id(audit_id);
        }

        // Step 7: explain.
        let metadata = self.explainer.explain(&reply, &intent.primary_handler);

        // Step 8: audit. A failed write is not a disguised success: the
        // caller gets a distinguishable infrastructure-error envelope
        // instead of the normal response.
        let audit_id = match self
            .write_success_audit(&request, &reply, &intent, &metadata, &overlay)
            .await
        {
            Ok(id) => id,
            Err(err) => return self.audit_failure_response(&err),
        };

        record_counter("orchestrator_requests_success_total", 1);

        // Step 9: return.
        let response = self.build_response(&reply, &intent, &metadata, &overlay);
        response.with_audit_id(audit_id)
    }

    /// `process_multi`: each handler runs and is safety-wrapped and
    /// audited independently; a failing handler does not abort others.
    pub async fn process_multi(
        &self,
        request: Request,
        handler_names: &[String],
    ) -> HashMap<String, WrappedResponse> {
        let mut responses = HashMap::with_capacity(handler_names.len());
        for name in handler_names {
            let single = Request {
                user_id: request.user_id.clone(),
                message: request.message.clone(),
                attachments: request.attachments.clone(),
                session_id: request.session_id.clone(),
                context: request.context.clone(),
                timestamp: request.timestamp,
            };
            let response = self.process_named(single, name).await;
            responses.insert(name.clone(), response);
        }
        responses
    }

    /// Runs the pipeline against a caller-chosen handler rather than the
    /// classifier's pick, skipping steps 2-3 (classification and context
    /// annotation), used by `process_multi`.
    async fn process_named(&self, request: Request, handler_name: &str) -> WrappedResponse {
        let handler = match self.registry.get(handler_name) {
            Some(h) if h.enabled() => h,
            _ => {
                return WrappedResponse::error(
                    self.safety.general_disclaimer(),
                    OrchestratorError::HandlerUnavailable(handler_name.to_string()).short_message(),
                );
            }
        };

        let reply = match self.dispatch(&handler, &request).await {
            Ok(reply) => reply,
            Err(err) => {
                let mut response =
                    WrappedResponse::error(self.safety.general_disclaimer(), err.short_message());
                if err.requires_audit_write() {
                    match self.write_failure_audit(&request, handler_name, &err).await {
                        Ok(id) => response = response.with_audit_id(id),
                        Err(audit_err) => return self.audit_failure_response(&audit_err),
                    }
                }
                return response;
            }
        };

        let verdict = self.safety.check(&reply);
        let (overlay, blocked) = match verdict {
            SafetyVerdict::Allow => (SafetyOverlay::default(), None),
            SafetyVerdict::AllowWithOverlay(overlay) => (overlay, None),
            SafetyVerdict::Block { kind, details } => (SafetyOverlay::default(), Some((kind, details))),
        };

        if let Some((kind, details)) = blocked {
            let audit_id = match self.write_violation_audit(&request, &reply, &kind, &details).await {
                Ok(id) => id,
                Err(err) => return self.audit_failure_response(&err),
            };
            let response = WrappedResponse::error(
                self.safety.disclaimer_for(handler_name),
                OrchestratorError::SafetyViolation {
                    kind: format!("{kind:?}"),
                    detail: "content withheld".to_string(),
                }
                .short_message(),
            );
            return response.with_audit_id(audit_id);
        }

        let metadata = self.explainer.explain(&reply, handler_name);
        let fake_intent = domain::IntentClassification::new(
            handler_name.to_string(),
            domain::UrgencyLevel::Routine,
            reply.confidence,
            "explicit multi-handler dispatch",
        );
        let audit_id = match self
            .write_success_audit(&request, &reply, &fake_intent, &metadata, &overlay)
            .await
        {
            Ok(id) => id,
            Err(err) => return self.audit_failure_response(&err),
        };

        let response = self.build_response(&reply, &fake_intent, &metadata, &overlay);
        response.with_audit_id(audit_id)
    }

    async fn dispatch(
        &self,
        handler: &Arc<dyn domain::Handler>,
        request: &Request,
    ) -> Result<HandlerReply, OrchestratorError> {
        if !handler.validate_request(request) {
            return Err(OrchestratorError::InputInvalid(
                "handler rejected the request shape".to_string(),
            ));
        }

        let permit = self
            .registry
            .dispatch_semaphore(handler.name())
            .ok_or_else(|| OrchestratorError::HandlerUnavailable(handler.name().to_string()))?;
        let _permit = permit.acquire_owned().await.map_err(|_| {
            OrchestratorError::HandlerFailure {
                handler: handler.name().to_string(),
                detail: "dispatch permit closed".to_string(),
            }
        })?;

        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(self.deadline, handler.process(request)).await;
        record_histogram("orchestrator_handler_dispatch_seconds", started.elapsed().as_secs_f64());

        match outcome {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(detail)) => Err(OrchestratorError::HandlerFailure {
                handler: handler.name().to_string(),
                detail,
            }),
            Err(_) => Err(OrchestratorError::DeadlineExceeded(handler.name().to_string())),
        }
    }

    fn build_response(
        &self,
        reply: &HandlerReply,
        intent: &domain::IntentClassification,
        metadata: &ExplainabilityMetadata,
        overlay: &SafetyOverlay,
    ) -> WrappedResponse {
        let level = ConfidenceLevel::derive(reply.confidence);
        WrappedResponse {
            success: reply.success,
            handler: Some(reply.handler_name.clone()),
            timestamp: Utc::now(),
            confidence: Some(ConfidenceDisplay {
                score_percent: (reply.confidence * 100.0).round() as u8,
                level: level.as_str().to_string(),
                indicator: level.indicator().to_string(),
            }),
            data: reply.data.clone(),
            reasoning: reply.reasoning.clone(),
            disclaimer: self.safety.disclaimer_for(&intent.primary_handler),
            audit_id: None,
            emergency: overlay.emergency,
            emergency_alert: overlay.emergency_alert.clone(),
            intent: Some(intent.clone()),
            safety_check: Some(SafetyCheckSummary {
                disclaimer_applied: true,
                prohibited_language_checked: true,
                emergency_overlay_applied: overlay.emergency,
            }),
            explainability: Some(ExplainabilitySummary {
                score: metadata.explainability_score,
                reasoning_available: reply.reasoning.is_some(),
            }),
        }
    }

    async fn write_success_audit(
        &self,
        request: &Request,
        reply: &HandlerReply,
        intent: &domain::IntentClassification,
        metadata: &ExplainabilityMetadata,
        overlay: &SafetyOverlay,
    ) -> Result<String, AuditStoreError> {
        let disclaimer = self.safety.disclaimer_for(&intent.primary_handler);
        let entry = AuditEntry {
            id: self.audit.next_entry_id(),
            timestamp: Utc::now(),
            user_id_hash: crate::audit_store::hash_user_id(&request.user_id),
            handler_name: Some(reply.handler_name.clone()),
            action: AuditAction::AgentQuery,
            input_data: redact(&request_to_value(request)).as_object().cloned().unwrap_or_default(),
            output_data: success_output_summary(reply, &disclaimer),
            confidence_score: Some((reply.confidence * 100.0).round() as u8),
            explainability_score: Some(metadata.explainability_score),
            reasoning_summary: Some(metadata.reasoning_summary.clone()),
            decision_factors: Some(decision_factors_to_value(&metadata.decision_factors)),
            alternatives: Some(Value::Array(
                metadata.alternative_considerations.iter().cloned().map(Value::String).collect(),
            )),
            escalation_triggered: if overlay.emergency {
                Some(overlay.emergency_alert.clone().unwrap_or_else(|| "escalation".to_string()))
            } else {
                None
            },
            safety_flags: None,
            clinician_override: None,
            reviewed_by_hash: None,
            review_timestamp: None,
            review_notes: None,
        };

        self.audit_write(entry).await
    }

    async fn write_violation_audit(
        &self,
        request: &Request,
        reply: &HandlerReply,
        kind: &domain::ViolationKind,
        details: &str,
    ) -> Result<String, AuditStoreError> {
        let mut output_data = serde_json::Map::new();
        output_data.insert("violation_kind".to_string(), Value::String(format!("{kind:?}")));
        output_data.insert("details".to_string(), Value::String(details.to_string()));
        output_data.insert("blocked".to_string(), Value::Bool(true));

        let entry = AuditEntry {
            id: self.audit.next_entry_id(),
            timestamp: Utc::now(),
            user_id_hash: crate::audit_store::hash_user_id(&request.user_id),
            handler_name: Some(reply.handler_name.clone()),
            action: AuditAction::SafetyViolation,
            input_data: redact(&request_to_value(request)).as_object().cloned().unwrap_or_default(),
            output_data,
            confidence_score: Some((reply.confidence * 100.0).round() as u8),
            explainability_score: None,
            reasoning_summary: None,
            decision_factors: None,
            alternatives: None,
            escalation_triggered: None,
            safety_flags: Some(Value::String(format!("{kind:?}: {details}"))),
            clinician_override: None,
            reviewed_by_hash: None,
            review_timestamp: None,
            review_notes: None,
        };

        self.audit_write(entry).await
    }

    async fn write_failure_audit(
        &self,
        request: &Request,
        handler_name: &str,
        error: &OrchestratorError,
    ) -> Result<String, AuditStoreError> {
        let mut output_data = serde_json::Map::new();
        output_data.insert("error".to_string(), Value::String(error.to_string()));

        let entry = AuditEntry {
            id: self.audit.next_entry_id(),
            timestamp: Utc::now(),
            user_id_hash: crate::audit_store::hash_user_id(&request.user_id),
            handler_name: Some(handler_name.to_string()),
            action: AuditAction::AgentQuery,
            input_data: redact(&request_to_value(request)).as_object().cloned().unwrap_or_default(),
            output_data,
            confidence_score: None,
            explainability_score: None,
            reasoning_summary: None,
            decision_factors: None,
            alternatives: None,
            escalation_triggered: None,
            safety_flags: None,
            clinician_override: None,
            reviewed_by_hash: None,
            review_timestamp: None,
            review_notes: None,
        };

        self.audit_write(entry).await
    }

    async fn audit_write(&self, entry: AuditEntry) -> Result<String, AuditStoreError> {
        self.audit.record(entry).await.map_err(|err| {
            warn!(error = %err, "audit write failed");
            err
        })
    }

    /// The §3/§7 `AuditFailure` path: never disguise a persistence
    /// failure as a normal success or error envelope.
    fn audit_failure_response(&self, err: &AuditStoreError) -> WrappedResponse {
        record_counter("orchestrator_requests_audit_failure_total", 1);
        WrappedResponse::error(
            self.safety.general_disclaimer(),
            OrchestratorError::AuditFailure(err.to_string()).short_message(),
        )
    }

    /// Recovered from the source's `health_check()`.
    pub async fn health_check(&self) -> HealthStatus {
        let all = self.registry.list_all();
        let enabled = all.iter().filter(|h| h.enabled()).count();
        let audit_ok = self
            .audit
            .list(AuditFilters {
                limit: Some(1),
                ..Default::default()
            })
            .await
            .is_ok();

        info!(
            total_handlers = all.len(),
            enabled_handlers = enabled,
            audit_store_reachable = audit_ok,
            "health check"
        );

        HealthStatus {
            total_handlers: all.len(),
            enabled_handlers: enabled,
            audit_store_reachable: audit_ok,
        }
    }

    pub fn fallback_handler_name(&self) -> &str {
        &self.fallback_handler_name
    }
}

fn request_to_value(request: &Request) -> Value {
    serde_json::to_value(request).unwrap_or(Value::Null)
}

/// The audit trail's `output_data` for a successful interaction: a
/// summary of the wrapped response, not the raw handler payload.
fn success_output_summary(reply: &HandlerReply, disclaimer: &str) -> serde_json::Map<String, Value> {
    let mut summary = serde_json::Map::new();
    summary.insert("handler".to_string(), Value::String(reply.handler_name.clone()));
    summary.insert("confidence".to_string(), Value::from(reply.confidence));
    summary.insert(
        "reasoning".to_string(),
        reply.reasoning.clone().map(Value::String).unwrap_or(Value::Null),
    );
    summary.insert(
        "red_flags".to_string(),
        Value::Array(reply.red_flags.iter().cloned().map(Value::String).collect()),
    );
    summary.insert("requires_escalation".to_string(), Value::Bool(reply.requires_escalation));
    summary.insert(
        "disclaimer_applied".to_string(),
        Value::String(disclaimer.chars().take(100).collect()),
    );
    summary
}

fn decision_factors_to_value(factors: &[domain::explainability::DecisionFactor]) -> Value {
    Value::Array(
        factors
            .iter()
            .map(|f| {
                let importance = match f.importance {
                    Importance::Low => "low",
                    Importance::Moderate => "moderate",
                    Importance::High => "high",
                    Importance::Critical => "critical",
                };
                serde_json::json!({
                    "factor": f.factor,
                    "value": f.value,
                    "importance": importance,
                    "description": f.description,
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use domain::Handler;
    use tempfile::NamedTempFile;

    use super::*;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, "{contents}").expect("write temp file");
        file
    }

    struct FixtureFiles {
        emergency: NamedTempFile,
        rules: NamedTempFile,
        disclaimers: NamedTempFile,
        prohibited: NamedTempFile,
        audit_db: NamedTempFile,
    }

    fn fixture_config() -> (OrchestratorConfig, FixtureFiles) {
        let emergency = write_temp(
            r#"patterns = [
                "\\b(emergency|urgent|critical|severe)\\b",
                "\\b(chest pain|heart attack|stroke|seizure)\\b",
            ]"#,
        );
        let rules = write_temp(
            r#"
            [[handler]]
            name = "triage"
            patterns = ["\\b(pain|symptoms|sick|fever)\\b"]

            [[handler]]
            name = "communication"
            patterns = ["\\b(explain|what is|tell me about)\\b"]
            "#,
        );
        let disclaimers = write_temp(
            r#"
            [disclaimer]
            general = "This is not a substitute for professional medical advice."
            triage = "If this is a life-threatening emergency, call emergency services."
            "#,
        );
        let prohibited = write_temp(r#"phrases = ["you have diabetes", "diagnosed with"]"#);
        let audit_db = NamedTempFile::new().expect("audit db file");

        let config = OrchestratorConfig {
            emergency_patterns_path: emergency.path().to_path_buf(),
            handler_rules_path: rules.path().to_path_buf(),
            disclaimers_path: disclaimers.path().to_path_buf(),
            prohibited_phrases_path: prohibited.path().to_path_buf(),
            audit_store_dsn: audit_db.path().to_str().unwrap().to_string(),
            default_deadline_ms: 5_000,
            fallback_handler_name: "communication".to_string(),
        };

        (
            config,
            FixtureFiles {
                emergency,
                rules,
                disclaimers,
                prohibited,
                audit_db,
            },
        )
    }

    struct ScriptedHandler {
        name: &'static str,
        enabled: AtomicBool,
        calls: AtomicUsize,
        behavior: ScriptedBehavior,
    }

    enum ScriptedBehavior {
        Succeed(f64),
        SucceedWithRedFlags,
        SucceedWithProhibitedContent,
        Fail,
        Hang,
    }

    #[async_trait]
    impl Handler for ScriptedHandler {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "scripted test handler"
        }
        fn capabilities(&self) -> Vec<String> {
            vec![self.name.to_string()]
        }
        fn enabled(&self) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }
        fn set_enabled(&self, enabled: bool) {
            self.enabled.store(enabled, Ordering::SeqCst);
        }
        async fn process(&self, _request: &Request) -> Result<HandlerReply, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                ScriptedBehavior::Succeed(confidence) => {
                    Ok(HandlerReply::success(self.name, *confidence)
                        .with_reasoning("a clear, well-supported explanation of the answer"))
                }
                ScriptedBehavior::SucceedWithRedFlags => Ok(HandlerReply::success(self.name, 0.90)
                    .with_reasoning("severe crushing chest pain reported")
                    .with_red_flags(vec!["possible cardiac event".to_string()])),
                ScriptedBehavior::SucceedWithProhibitedContent => {
                    let mut reply = HandlerReply::success(self.name, 0.9);
                    reply.data.insert(
                        "summary".to_string(),
                        Value::String("you have diabetes, a chronic condition".to_string()),
                    );
                    Ok(reply)
                }
                ScriptedBehavior::Fail => Err("internal handler error".to_string()),
                ScriptedBehavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(HandlerReply::success(self.name, 0.5))
                }
            }
        }
    }

    fn scripted(name: &'static str, behavior: ScriptedBehavior) -> Arc<dyn Handler> {
        Arc::new(ScriptedHandler {
            name,
            enabled: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            behavior,
        })
    }

    #[tokio::test]
    async fn s1_emergency_cardiac_sets_emergency_and_audits() {
        let (config, _files) = fixture_config();
        let orchestrator = Orchestrator::from_config(config).expect("build orchestrator");
        orchestrator
            .registry
            .register(scripted("triage", ScriptedBehavior::SucceedWithRedFlags));

        let request = Request::new("patient-1", "severe crushing chest pain, shortness of breath");
        let response = orchestrator.process(request).await;

        assert!(response.success);
        assert!(response.emergency);
        assert!(response.audit_id.is_some());
        assert_eq!(response.intent.as_ref().unwrap().primary_handler, "triage");
        assert!(!response.disclaimer.is_empty());
    }

    #[tokio::test]
    async fn s2_routine_query_is_not_emergency() {
        let (config, _files) = fixture_config();
        let orchestrator = Orchestrator::from_config(config).expect("build orchestrator");
        orchestrator
            .registry
            .register(scripted("communication", ScriptedBehavior::Succeed(0.75)));

        let request = Request::new("patient-2", "what is hypertension?");
        let response = orchestrator.process(request).await;

        assert!(response.success);
        assert!(!response.emergency);
        assert!(response.explainability.unwrap().score >= 50);
    }

    #[tokio::test]
    async fn s3_prohibited_content_is_blocked_and_not_persisted() {
        let (config, _files) = fixture_config();
        let orchestrator = Orchestrator::from_config(config).expect("build orchestrator");
        orchestrator.registry.register(scripted(
            "triage",
            ScriptedBehavior::SucceedWithProhibitedContent,
        ));

        let request = Request::new("patient-3", "i have pain and symptoms");
        let response = orchestrator.process(request).await;

        assert!(!response.success);
        let audit_id = response.audit_id.expect("violation should be audited");
        let entry = orchestrator.audit.get_full(&audit_id).await.expect("fetch entry");
        assert!(matches!(entry.action, AuditAction::SafetyViolation));
        assert_eq!(entry.output_data.get("blocked"), Some(&Value::Bool(true)));
        assert!(entry.output_data.contains_key("violation_kind"));
        let serialized = serde_json::to_string(&entry.output_data).unwrap();
        // The raw handler payload is never persisted wholesale, only the
        // configured phrase that matched it.
        assert!(!serialized.contains("a chronic condition"));
    }

    #[tokio::test]
    async fn s4_pii_redaction_removes_email_from_persisted_entry() {
        let (config, _files) = fixture_config();
        let orchestrator = Orchestrator::from_config(config).expect("build orchestrator");
        orchestrator
            .registry
            .register(scripted("communication", ScriptedBehavior::Succeed(0.6)));

        let mut request = Request::new("patient-4", "what is hypertension?");
        request
            .context
            .extra
            .insert("email".to_string(), Value::String("a@b.com".to_string()));

        let response = orchestrator.process(request).await;
        let audit_id = response.audit_id.expect("should be audited");
        let entry = orchestrator.audit.get_full(&audit_id).await.expect("fetch entry");
        let serialized = serde_json::to_string(&entry.input_data).unwrap();
        assert!(!serialized.contains("a@b.com"));
        assert!(serialized.contains("REDACTED"));
    }

    #[tokio::test]
    async fn s5_handler_failure_produces_error_envelope_with_audit() {
        let (config, _files) = fixture_config();
        let orchestrator = Orchestrator::from_config(config).expect("build orchestrator");
        orchestrator
            .registry
            .register(scripted("triage", ScriptedBehavior::Fail));

        let request = Request::new("patient-5", "i have pain and symptoms and fever");
        let response = orchestrator.process(request).await;

        assert!(!response.success);
        assert!(response.audit_id.is_some());
        let entry = orchestrator
            .audit
            .get_full(response.audit_id.as_ref().unwrap())
            .await
            .expect("fetch entry");
        assert!(entry.output_data.contains_key("error"));
    }

    #[tokio::test]
    async fn audit_persistence_failure_is_surfaced_not_disguised_as_success() {
        let (config, _files) = fixture_config();
        let orchestrator = Orchestrator::from_config(config).expect("build orchestrator");
        orchestrator
            .registry
            .register(scripted("communication", ScriptedBehavior::Succeed(0.6)));

        // Pre-occupy the id the orchestrator will allocate next, forcing
        // its own write to collide on the primary key.
        let colliding = AuditEntry {
            id: 1,
            timestamp: Utc::now(),
            user_id_hash: "deadbeef".to_string(),
            handler_name: None,
            action: AuditAction::AgentQuery,
            input_data: serde_json::Map::new(),
            output_data: serde_json::Map::new(),
            confidence_score: None,
            explainability_score: None,
            reasoning_summary: None,
            decision_factors: None,
            alternatives: None,
            escalation_triggered: None,
            safety_flags: None,
            clinician_override: None,
            reviewed_by_hash: None,
            review_timestamp: None,
            review_notes: None,
        };
        orchestrator.audit.record(colliding).await.expect("seed colliding row");

        let request = Request::new("patient-6", "what is hypertension?");
        let response = orchestrator.process(request).await;

        assert!(!response.success);
        assert!(response.audit_id.is_none());
        assert!(response.data.get("error").is_some());
    }

    #[tokio::test]
    async fn s6_multi_handler_mixes_success_and_failure_independently() {
        let (config, _files) = fixture_config();
        let orchestrator = Orchestrator::from_config(config).expect("build orchestrator");
        orchestrator
            .registry
            .register(scripted("triage", ScriptedBehavior::Succeed(0.8)));
        orchestrator
            .registry
            .register(scripted("communication", ScriptedBehavior::Fail));

        let request = Request::new("patient-6", "a question about two things");
        let names = vec!["triage".to_string(), "communication".to_string()];
        let responses = orchestrator.process_multi(request, &names).await;

        assert_eq!(responses.len(), 2);
        assert!(responses["triage"].success);
        assert!(!responses["communication"].success);
    }

    #[tokio::test]
    async fn empty_message_returns_error_with_no_audit_id() {
        let (config, _files) = fixture_config();
        let orchestrator = Orchestrator::from_config(config).expect("build orchestrator");
        let request = Request::new("patient-7", "   ");
        let response = orchestrator.process(request).await;
        assert!(!response.success);
        assert!(response.audit_id.is_none());
        assert!(!response.disclaimer.is_empty());
    }

    #[tokio::test]
    async fn unavailable_handler_is_not_audited() {
        let (config, _files) = fixture_config();
        let orchestrator = Orchestrator::from_config(config).expect("build orchestrator");
        let request = Request::new("patient-8", "i have pain and symptoms and fever");
        let response = orchestrator.process(request).await;
        assert!(!response.success);
        assert!(response.audit_id.is_none());
    }

    #[tokio::test]
    async fn deadline_exceeded_is_treated_like_handler_failure() {
        let (mut config, _files) = fixture_config();
        config.default_deadline_ms = 20;
        let orchestrator = Orchestrator::from_config(config).expect("build orchestrator");
        orchestrator
            .registry
            .register(scripted("triage", ScriptedBehavior::Hang));

        let request = Request::new("patient-9", "i have pain and symptoms and fever");
        let response = orchestrator.process(request).await;
        assert!(!response.success);
        assert!(response.audit_id.is_some());
    }

    #[tokio::test]
    async fn audit_ids_are_strictly_increasing_across_requests() {
        let (config, _files) = fixture_config();
        let orchestrator = Orchestrator::from_config(config).expect("build orchestrator");
        orchestrator
            .registry
            .register(scripted("communication", ScriptedBehavior::Succeed(0.6)));

        let mut ids = Vec::new();
        for i in 0..3 {
            let request = Request::new(format!("user-{i}"), "what is hypertension?");
            let response = orchestrator.process(request).await;
            ids.push(response.audit_id.unwrap());
        }
        let numeric: Vec<u64> = ids
            .iter()
            .map(|id| id.rsplit('_').next().unwrap().parse::<u64>().unwrap())
            .collect();
        for window in numeric.windows(2) {
            assert!(window[1] > window[0]);
        }
    }

    #[tokio::test]
    async fn health_check_reports_handler_and_store_status() {
        let (config, _files) = fixture_config();
        let orchestrator = Orchestrator::from_config(config).expect("build orchestrator");
        orchestrator
            .registry
            .register(scripted("communication", ScriptedBehavior::Succeed(0.6)));

        let status = orchestrator.health_check().await;
        assert_eq!(status.total_handlers, 1);
        assert_eq!(status.enabled_handlers, 1);
        assert!(status.audit_store_reachable);
    }
}
