use serde_json::Value;

use crate::error::UpstreamError;

/// Handle to the model-backed analyzer that analyzer rules delegate to.
///
/// The orchestrating caller constructs it (credentials, timeouts, retries),
/// passes it into the rule engine, and shuts it down when the run ends.
pub trait ModelClient: Send + Sync {
    /// Identifier of the model behind the handle, for logs and reports.
    fn model(&self) -> &str;

    /// Send a prompt and parse the answer as JSON.
    fn complete_json(&self, prompt: &str) -> Result<Value, UpstreamError>;
}
