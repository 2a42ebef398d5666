//! In-process provider for exercising code that talks to the LLM.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{CompletionRequest, CompletionResponse, LlmProvider, OrchestratorError};

enum Reply {
    Text(String),
    Failure(String),
}

/// Replays queued replies in order, then answers with a default reply.
/// Every request is recorded for later inspection.
#[derive(Clone)]
pub struct ScriptedProvider {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    default_reply: String,
}

impl ScriptedProvider {
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            default_reply: default_reply.into(),
        }
    }

    pub fn push_reply(&self, reply: impl Into<String>) -> &Self {
        self.lock_replies().push_back(Reply::Text(reply.into()));
        self
    }

    pub fn push_failure(&self, message: impl Into<String>) -> &Self {
        self.lock_replies().push_back(Reply::Failure(message.into()));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        match self.requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Reply>> {
        match self.replies.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, OrchestratorError> {
        let model = request.model.clone();
        match self.requests.lock() {
            Ok(mut guard) => guard.push(request),
            Err(poisoned) => poisoned.into_inner().push(request),
        }

        match self.lock_replies().pop_front() {
            Some(Reply::Text(content)) => Ok(CompletionResponse {
                content,
                model: Some(model),
                usage: None,
            }),
            Some(Reply::Failure(message)) => Err(OrchestratorError::Provider(message)),
            None => Ok(CompletionResponse {
                content: self.default_reply.clone(),
                model: Some(model),
                usage: None,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
