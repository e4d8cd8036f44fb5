//! Model Failover Chain - sequential model fallback on errors
//!
//! Hosted model names come and go between provider releases. Instead of
//! discovering models before each call, the candidates are tried in their
//! configured order: one attempt each, no backoff, no parallel calls. The
//! first success wins; if every candidate fails the caller gets a single
//! error carrying the last failure.

use thiserror::Error;
use tracing::{info, warn};

use crate::agent::llm::{ChatModel, ModelError, ModelRequest};

/// Result of one attempt against one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed(ModelError),
}

/// One entry of the attempt log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub model: String,
    pub outcome: AttemptOutcome,
}

/// A successful call: raw reply text and the candidate that produced it
#[derive(Debug, Clone)]
pub struct FallbackSuccess {
    pub raw: String,
    pub model: String,
    pub attempts: Vec<Attempt>,
}

/// Every candidate failed
#[derive(Debug, Clone)]
pub struct FallbackExhausted {
    pub last_error: FallbackCause,
    pub attempts: Vec<Attempt>,
}

impl std::fmt::Display for FallbackExhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.last_error {
            FallbackCause::NoCandidates => write!(f, "{}", self.last_error),
            cause => write!(
                f,
                "all {} candidate models failed; last error: {}",
                self.attempts.len(),
                cause
            ),
        }
    }
}

impl std::error::Error for FallbackExhausted {}

/// The last thing that went wrong before giving up
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FallbackCause {
    #[error("no candidate models configured")]
    NoCandidates,
    #[error("{model}: {error}")]
    Model { model: String, error: ModelError },
}

/// Try each candidate in order until one answers
pub async fn run_candidates<M>(
    client: &M,
    candidates: &[String],
    request: &ModelRequest,
) -> Result<FallbackSuccess, FallbackExhausted>
where
    M: ChatModel + ?Sized,
{
    let mut attempts = Vec::with_capacity(candidates.len());
    let mut last_error = FallbackCause::NoCandidates;

    for (i, model) in candidates.iter().enumerate() {
        match client.generate(model, request).await {
            Ok(raw) => {
                if i > 0 {
                    info!("Failover succeeded: {} -> {} (attempt {})", candidates[0], model, i + 1);
                }
                attempts.push(Attempt {
                    model: model.clone(),
                    outcome: AttemptOutcome::Succeeded,
                });
                return Ok(FallbackSuccess {
                    raw,
                    model: model.clone(),
                    attempts,
                });
            }
            Err(e) => {
                match candidates.get(i + 1) {
                    Some(next) => warn!("Model {} failed ({}), failing over to {}", model, e, next),
                    None => warn!("Model {} failed ({}), no candidates left", model, e),
                }
                attempts.push(Attempt {
                    model: model.clone(),
                    outcome: AttemptOutcome::Failed(e.clone()),
                });
                last_error = FallbackCause::Model {
                    model: model.clone(),
                    error: e,
                };
            }
        }
    }

    Err(FallbackExhausted { last_error, attempts })
}

/// Failover-aware client wrapper holding the ordered candidate list
pub struct FailoverClient<M: ChatModel + ?Sized> {
    candidates: Vec<String>,
    client: std::sync::Arc<M>,
}

impl<M: ChatModel + ?Sized> FailoverClient<M> {
    pub fn new(client: std::sync::Arc<M>, candidates: Vec<String>) -> Self {
        let candidates = candidates
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        Self { candidates, client }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Complete a request, falling over through the candidate list
    pub async fn complete(&self, request: &ModelRequest) -> Result<FallbackSuccess, FallbackExhausted> {
        run_candidates(self.client.as_ref(), &self.candidates, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Payload;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Answers per model name and records the call order
    struct ScriptedModel {
        replies: HashMap<String, Result<String, ModelError>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<(&str, Result<String, ModelError>)>) -> Self {
            Self {
                replies: replies.into_iter().map(|(m, r)| (m.to_string(), r)).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn generate(&self, model: &str, _request: &ModelRequest) -> Result<String, ModelError> {
            self.calls.lock().unwrap().push(model.to_string());
            self.replies
                .get(model)
                .cloned()
                .unwrap_or_else(|| Err(ModelError::ModelNotFound(model.to_string())))
        }
    }

    fn request() -> ModelRequest {
        ModelRequest::new("sys", Payload::text("hello"))
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_third_candidate_succeeds() {
        let model = ScriptedModel::new(vec![
            ("A", Err(ModelError::Transport("connection reset".into()))),
            ("B", Err(ModelError::RateLimited("quota".into()))),
            ("C", Ok("P".to_string())),
            ("D", Ok("never".to_string())),
        ]);

        let success = run_candidates(&model, &names(&["A", "B", "C", "D"]), &request()).await.unwrap();

        assert_eq!(success.raw, "P");
        assert_eq!(success.model, "C");
        assert_eq!(model.calls(), vec!["A", "B", "C"]);
        assert_eq!(success.attempts.len(), 3);
        assert_eq!(success.attempts[2].outcome, AttemptOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_first_candidate_succeeds_without_failover() {
        let model = ScriptedModel::new(vec![("A", Ok("fine".to_string()))]);
        let success = run_candidates(&model, &names(&["A", "B"]), &request()).await.unwrap();
        assert_eq!(success.model, "A");
        assert_eq!(model.calls(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_all_candidates_fail() {
        let model = ScriptedModel::new(vec![
            ("A", Err(ModelError::ModelNotFound("A".into()))),
            ("B", Err(ModelError::Unauthorized("bad key".into()))),
            ("C", Err(ModelError::Api { status: 500, body: "boom".into() })),
        ]);

        let err = run_candidates(&model, &names(&["A", "B", "C"]), &request()).await.unwrap_err();

        assert_eq!(model.calls(), vec!["A", "B", "C"]);
        assert_eq!(err.attempts.len(), 3);
        assert_eq!(
            err.last_error,
            FallbackCause::Model {
                model: "C".into(),
                error: ModelError::Api { status: 500, body: "boom".into() },
            }
        );
        let message = err.to_string();
        assert!(message.contains("all 3 candidate models failed"));
        assert!(message.contains("boom"));
    }

    #[tokio::test]
    async fn test_each_candidate_tried_once() {
        let model = ScriptedModel::new(vec![]);
        let _ = run_candidates(&model, &names(&["A", "B"]), &request()).await;
        assert_eq!(model.calls(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_empty_candidate_list() {
        let model = ScriptedModel::new(vec![]);
        let err = run_candidates(&model, &[], &request()).await.unwrap_err();
        assert_eq!(err.last_error, FallbackCause::NoCandidates);
        assert_eq!(err.to_string(), "no candidate models configured");
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failover_client_drops_blank_candidates() {
        let model = Arc::new(ScriptedModel::new(vec![("B", Ok("ok".to_string()))]));
        let client = FailoverClient::new(model.clone(), names(&[" ", " B "]));
        assert_eq!(client.candidates(), &["B".to_string()]);

        let success = client.complete(&request()).await.unwrap();
        assert_eq!(success.model, "B");
    }
}
