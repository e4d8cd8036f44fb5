//! Exchange orchestration - one user submission to one assistant turn
//!
//! ```text
//! Idle → AwaitingModel → ParsingReply → Synthesizing → Complete
//!              │
//!              └──(all candidates failed)──→ Failed
//! ```
//!
//! Every run appends exactly two turns to the session conversation: the user
//! turn first, then either the parsed assistant reply or a failure turn.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agent::conversation::Conversation;
use crate::agent::failover::{Attempt, FailoverClient};
use crate::agent::llm::{ChatModel, GeminiClient, ModelRequest};
use crate::agent::reply::ReplyParser;
use crate::agent::scenario::Scenario;
use crate::config::Config;
use crate::security::ApiKey;
use crate::types::{Payload, Turn};
use crate::voice::{build_synthesizer, SpeechSynthesizer};

/// Where an exchange is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    AwaitingModel,
    ParsingReply,
    Synthesizing,
    Complete,
    Failed,
}

impl ExchangeState {
    /// Complete and Failed end the run
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExchangeState::Complete | ExchangeState::Failed)
    }
}

/// One learner's practice session
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub scenario: Scenario,
    pub conversation: Conversation,
}

impl Session {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            scenario,
            conversation: Conversation::new(),
        }
    }

    /// Start over, optionally in a different scenario
    pub fn reset(&mut self, scenario: Option<Scenario>) {
        if let Some(scenario) = scenario {
            self.scenario = scenario;
        }
        self.conversation.clear();
        info!("Session {} reset ({})", self.id, self.scenario);
    }
}

/// Outcome of one run
#[derive(Debug, Clone)]
pub struct ExchangeReport {
    /// Terminal state reached
    pub state: ExchangeState,
    /// Candidate that answered, if any
    pub model: Option<String>,
    pub attempts: Vec<Attempt>,
    /// Every state visited, starting at Idle
    pub trace: Vec<ExchangeState>,
}

impl ExchangeReport {
    pub fn succeeded(&self) -> bool {
        self.state == ExchangeState::Complete
    }
}

/// Runs exchanges against a shared model client and synthesizer
pub struct Exchange {
    failover: FailoverClient<dyn ChatModel>,
    parser: ReplyParser,
    synthesizer: SpeechSynthesizer,
}

impl Exchange {
    pub fn new(failover: FailoverClient<dyn ChatModel>, parser: ReplyParser, synthesizer: SpeechSynthesizer) -> Self {
        Self {
            failover,
            parser,
            synthesizer,
        }
    }

    /// Wire the Gemini client, candidates, parser aliases and speech from config
    pub fn from_config(config: &Config, api_key: &ApiKey, speak: bool) -> Self {
        let client = GeminiClient::from_config(config, api_key);
        let synthesizer = if speak {
            build_synthesizer(config, client.clone())
        } else {
            SpeechSynthesizer::disabled()
        };
        let model: Arc<dyn ChatModel> = Arc::new(client);

        Self::new(
            FailoverClient::new(model, config.models.candidates.clone()),
            ReplyParser::new(config.parser.clone()),
            synthesizer,
        )
    }

    pub fn speech_enabled(&self) -> bool {
        self.synthesizer.is_enabled()
    }

    /// Run one submission to completion and append its turns
    pub async fn run_turn(&self, session: &mut Session, payload: Payload) -> ExchangeReport {
        let mut trace = vec![ExchangeState::Idle];

        // The payload moves into the request; the turn only records what was sent
        let user_turn = Turn::from_payload(&payload);
        let request = ModelRequest::new(session.scenario.system_instruction(), payload)
            .with_history(session.conversation.turns());
        session.conversation.push(user_turn);
        advance(&mut trace, ExchangeState::AwaitingModel);

        let success = match self.failover.complete(&request).await {
            Ok(success) => success,
            Err(exhausted) => {
                warn!("No model answered: {}", exhausted);
                session.conversation.push(Turn::assistant_failure(format!(
                    "Sorry, I couldn't reach any model right now ({}). Please try again in a moment.",
                    exhausted.last_error
                )));
                advance(&mut trace, ExchangeState::Failed);
                return ExchangeReport {
                    state: ExchangeState::Failed,
                    model: None,
                    attempts: exhausted.attempts,
                    trace,
                };
            }
        };

        advance(&mut trace, ExchangeState::ParsingReply);
        let reply = self.parser.parse(&success.raw);

        advance(&mut trace, ExchangeState::Synthesizing);
        let audio = self.synthesizer.speak(&reply.response).await;

        session.conversation.push(Turn::assistant(
            reply.response,
            reply.feedback,
            reply.suggestions,
            reply.pronunciation_score,
            audio,
        ));
        advance(&mut trace, ExchangeState::Complete);

        ExchangeReport {
            state: ExchangeState::Complete,
            model: Some(success.model),
            attempts: success.attempts,
            trace,
        }
    }
}

fn advance(trace: &mut Vec<ExchangeState>, next: ExchangeState) {
    if let Some(prev) = trace.last() {
        debug!("Exchange {:?} -> {:?}", prev, next);
    }
    trace.push(next);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::llm::ModelError;
    use crate::types::{AudioClip, Role};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedModel {
        reply: Result<String, ModelError>,
        requests: Mutex<Vec<ModelRequest>>,
    }

    impl FixedModel {
        fn new(reply: Result<String, ModelError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatModel for FixedModel {
        async fn generate(&self, _model: &str, request: &ModelRequest) -> Result<String, ModelError> {
            self.requests.lock().unwrap().push(request.clone());
            self.reply.clone()
        }
    }

    fn exchange(model: Arc<FixedModel>) -> Exchange {
        let model: Arc<dyn ChatModel> = model;
        Exchange::new(
            FailoverClient::new(model, vec!["m1".to_string()]),
            ReplyParser::default(),
            SpeechSynthesizer::disabled(),
        )
    }

    #[tokio::test]
    async fn test_complete_path_trace() {
        let model = FixedModel::new(Ok(r#"{"response":"Hello!","feedback":"Nice","suggestions":[],"pronunciationScore":0}"#.into()));
        let ex = exchange(model);
        let mut session = Session::new(Scenario::OrderingFood);

        let report = ex.run_turn(&mut session, Payload::text("Hi")).await;

        assert!(report.succeeded());
        assert_eq!(
            report.trace,
            vec![
                ExchangeState::Idle,
                ExchangeState::AwaitingModel,
                ExchangeState::ParsingReply,
                ExchangeState::Synthesizing,
                ExchangeState::Complete,
            ]
        );
        assert_eq!(report.model.as_deref(), Some("m1"));
        assert_eq!(session.conversation.len(), 2);
        let reply = session.conversation.last().unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.content, "Hello!");
        assert!(reply.rendered_audio().is_none());
    }

    #[tokio::test]
    async fn test_failed_path_trace() {
        let model = FixedModel::new(Err(ModelError::Transport("offline".into())));
        let ex = exchange(model);
        let mut session = Session::new(Scenario::GeneralConversation);

        let report = ex.run_turn(&mut session, Payload::text("Hi")).await;

        assert_eq!(report.state, ExchangeState::Failed);
        assert!(report.state.is_terminal());
        assert_eq!(
            report.trace,
            vec![ExchangeState::Idle, ExchangeState::AwaitingModel, ExchangeState::Failed]
        );
        let turn = session.conversation.last().unwrap();
        assert!(turn.failed);
        assert!(turn.content.contains("offline"));
    }

    #[tokio::test]
    async fn test_history_excludes_new_turn_and_uses_scenario() {
        let model = FixedModel::new(Ok("Sure!".into()));
        let ex = exchange(model.clone());
        let mut session = Session::new(Scenario::TechMeeting);

        ex.run_turn(&mut session, Payload::text("first")).await;
        ex.run_turn(&mut session, Payload::text("second")).await;

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].history.is_empty());
        assert_eq!(requests[1].history.len(), 2);
        assert_eq!(requests[1].history[0].text, "first");
        assert_eq!(requests[1].history[1].text, "Sure!");
        assert_eq!(requests[1].payload, Payload::text("second"));
        assert_eq!(requests[1].system_instruction, Scenario::TechMeeting.system_instruction());
    }

    #[tokio::test]
    async fn test_audio_payload_sent_and_summarized_on_user_turn() {
        let model = FixedModel::new(Ok(r#"{"response":"Good try","pronunciationScore":72}"#.into()));
        let ex = exchange(model.clone());
        let mut session = Session::new(Scenario::JobInterview);

        ex.run_turn(&mut session, Payload::Audio(AudioClip::wav(vec![1, 2, 3, 4]))).await;

        let user = session.conversation.get(0).unwrap();
        assert!(user.has_audio_input());
        assert_eq!(user.audio_input.as_ref().map(|a| a.size_bytes), Some(4));
        assert_eq!(session.conversation.get(1).unwrap().pronunciation_score, Some(72));
        assert_eq!(
            model.requests.lock().unwrap()[0].payload,
            Payload::Audio(AudioClip::wav(vec![1, 2, 3, 4]))
        );
    }

    #[test]
    fn test_session_reset() {
        let mut session = Session::new(Scenario::GeneralConversation);
        session.conversation.push(Turn::user_text("hello"));
        session.reset(Some(Scenario::OrderingFood));
        assert!(session.conversation.is_empty());
        assert_eq!(session.scenario, Scenario::OrderingFood);

        session.reset(None);
        assert_eq!(session.scenario, Scenario::OrderingFood);
    }
}
