use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app_error::AppResult;

/// Result of an AI-driven prompt analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptAnalysis {
    /// Rewritten prompt suggested by the model
    pub improved_prompt: String,
    /// Issues found in the submitted prompt
    pub issues: Vec<String>,
    /// Overall quality score, 0-100
    pub score: i32,
}

/// Prompt analysis port - abstracts the hosted model API.
#[async_trait]
pub trait PromptAnalysisPort: Send + Sync {
    /// Analyze a coding prompt and return an improved version.
    ///
    /// Provider failures surface as `UpstreamProvider`.
    async fn analyze(&self, prompt: &str) -> AppResult<PromptAnalysis>;
}
