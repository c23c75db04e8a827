use async_trait::async_trait;

use crate::reply::HandlerReply;
use crate::request::Request;

/// The polymorphic contract every specialist handler satisfies. The
/// orchestrator only ever interacts with handlers through this trait;
/// it never knows a handler's concrete type.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Stable lowercase identifier, used as the registry key.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Keywords the classifier indexes when scoring this handler.
    fn capabilities(&self) -> Vec<String>;

    /// Minimum confidence at which this handler's outputs should be
    /// surfaced. The orchestrator does not enforce this; it is advisory
    /// to the classifier.
    fn confidence_threshold(&self) -> f64 {
        0.20
    }

    fn enabled(&self) -> bool;

    fn set_enabled(&self, enabled: bool);

    async fn process(&self, request: &Request) -> Result<HandlerReply, String>;

    /// Structural pre-check before dispatch. Default: non-empty message.
    fn validate_request(&self, request: &Request) -> bool {
        !request.message_is_blank()
    }
}
