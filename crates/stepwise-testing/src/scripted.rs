//! Scripted stand-ins for the agent runtime and the chat model.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use stepwise_core::{ExecutionId, StepOutcome};
use stepwise_runtime::{
    AgentRuntime, ChatMessage, ChatModel, ModelProvider, RuntimeContext, RuntimeError, RuntimeResult,
};

/// One scripted runtime step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedStep {
    Outcome(StepOutcome),
    Fail(String),
}

/// What the runtime saw during one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedStep {
    pub execution_id: ExecutionId,
    pub name: String,
    pub goals: Vec<String>,
    pub tools: Vec<String>,
    pub model: String,
    pub memory_backend: String,
}

/// Runtime replaying a fixed list of outcomes.
///
/// Once the script runs out every further step returns `fallback`.
#[derive(Debug, Clone)]
pub struct ScriptedRuntime {
    script: Arc<Mutex<VecDeque<ScriptedStep>>>,
    fallback: StepOutcome,
    observed: Arc<Mutex<Vec<ObservedStep>>>,
}

impl ScriptedRuntime {
    pub fn new(script: impl IntoIterator<Item = ScriptedStep>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            fallback: StepOutcome::Complete,
            observed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every step returns `outcome`.
    pub fn always(outcome: StepOutcome) -> Self {
        Self::new([]).with_fallback(outcome)
    }

    pub fn with_fallback(mut self, outcome: StepOutcome) -> Self {
        self.fallback = outcome;
        self
    }

    pub fn observed(&self) -> Vec<ObservedStep> {
        self.observed.lock().map(|steps| steps.clone()).unwrap_or_default()
    }

    pub fn step_count(&self) -> usize {
        self.observed().len()
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    async fn step(&self, ctx: &RuntimeContext, goals: &[String]) -> RuntimeResult<StepOutcome> {
        let observed = ObservedStep {
            execution_id: ctx.execution_id(),
            name: ctx.name.clone(),
            goals: goals.to_vec(),
            tools: ctx.tools.names().into_iter().map(str::to_string).collect(),
            model: ctx.model.model_name().to_string(),
            memory_backend: ctx.memory.backend().to_string(),
        };
        if let Ok(mut steps) = self.observed.lock() {
            steps.push(observed);
        }

        let next = self.script.lock().ok().and_then(|mut script| script.pop_front());
        match next.unwrap_or(ScriptedStep::Outcome(self.fallback)) {
            ScriptedStep::Outcome(outcome) => Ok(outcome),
            ScriptedStep::Fail(message) => Err(RuntimeError::other(message)),
        }
    }
}

/// Chat model replaying canned replies and recording the prompts it got.
#[derive(Debug, Clone)]
pub struct ScriptedChatModel {
    model: String,
    replies: Arc<Mutex<VecDeque<String>>>,
    prompts: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedChatModel {
    pub fn new(model: impl Into<String>, replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            model: model.into(),
            replies: Arc::new(Mutex::new(replies.into_iter().map(Into::into).collect())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().map(|prompts| prompts.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> RuntimeResult<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(messages.to_vec());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .ok_or_else(|| RuntimeError::other("scripted chat model has no replies left"))
    }
}

/// Provider binding every model name to a named [`ScriptedChatModel`]
/// without replies, or to one shared scripted model.
#[derive(Debug, Clone, Default)]
pub struct StaticModelProvider {
    shared: Option<ScriptedChatModel>,
    requested: Arc<Mutex<Vec<Option<String>>>>,
}

impl StaticModelProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out `model` for every binding.
    pub fn serving(model: ScriptedChatModel) -> Self {
        Self {
            shared: Some(model),
            requested: Arc::default(),
        }
    }

    /// Model names requested so far, `None` for unset.
    pub fn requested(&self) -> Vec<Option<String>> {
        self.requested.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ModelProvider for StaticModelProvider {
    fn bind(&self, model: Option<&str>) -> RuntimeResult<Arc<dyn ChatModel>> {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(model.map(str::to_string));
        }
        let chat = match &self.shared {
            Some(shared) => shared.clone(),
            None => ScriptedChatModel::new(model.unwrap_or("static"), Vec::<String>::new()),
        };
        Ok(Arc::new(chat))
    }
}
