//! Integration tests for workflow loading and execution
//!
//! These tests drive the engine end to end using mock components.

use async_trait::async_trait;
use scribe_rs::adk::error::{DependencyError, ModelError, Result, ScribeError};
use scribe_rs::adk::model::{GenerationRequest, Model};
use scribe_rs::scribe::agent::{
    AgentContext, AgentPort, ContextProvider, Decision, Evaluation, Evaluator,
};
use scribe_rs::scribe::config::EngineConfig;
use scribe_rs::scribe::runner::{Engine, HumanDecision, NoopObserver, WorkflowObserver};
use scribe_rs::scribe::workflow::loader::WorkflowLoader;
use scribe_rs::scribe::workflow::types::{Block, NodeDefinition, WorkflowDefinition};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock Components
// ============================================================================

/// Mock model that returns predefined responses and records every request
struct MockModel {
    responses: Vec<String>,
    response_index: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockModel {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: responses.iter().map(|r| r.to_string()).collect(),
            response_index: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.response_index.load(Ordering::SeqCst)
    }

    fn request(&self, idx: usize) -> GenerationRequest {
        self.requests.lock().unwrap()[idx].clone()
    }
}

#[async_trait]
impl Model for MockModel {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<String, ModelError> {
        self.requests.lock().unwrap().push(request.clone());
        let idx = self.response_index.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .responses
            .get(idx)
            .cloned()
            .unwrap_or_else(|| "Max responses reached".to_string()))
    }
}

/// Mock model whose transport always fails
struct UnreachableModel {
    calls: AtomicUsize,
}

#[async_trait]
impl Model for UnreachableModel {
    async fn generate(
        &self,
        _request: &GenerationRequest,
    ) -> std::result::Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ModelError::Stream("connection reset".to_string()))
    }
}

/// Mock evaluator that plays back scripted verdicts, then approves
struct ScriptedEvaluator {
    verdicts: Vec<Option<Evaluation>>,
    index: AtomicUsize,
    seen_outputs: Mutex<Vec<String>>,
}

impl ScriptedEvaluator {
    fn new(verdicts: Vec<Option<Evaluation>>) -> Arc<Self> {
        Arc::new(Self {
            verdicts,
            index: AtomicUsize::new(0),
            seen_outputs: Mutex::new(Vec::new()),
        })
    }

    fn decisions(decisions: &[Decision]) -> Arc<Self> {
        Self::new(
            decisions
                .iter()
                .map(|d| Some(Evaluation::new(*d, 0.9, format!("scripted {}", d))))
                .collect(),
        )
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        _node_id: &str,
        output: &str,
        _context: Option<&AgentContext>,
    ) -> Option<Evaluation> {
        self.seen_outputs.lock().unwrap().push(output.to_string());
        let idx = self.index.fetch_add(1, Ordering::SeqCst);
        match self.verdicts.get(idx) {
            Some(verdict) => verdict.clone(),
            None => Some(Evaluation::approve("default")),
        }
    }
}

/// Mock context provider that counts how often it is asked
struct StaticContext {
    calls: AtomicUsize,
}

#[async_trait]
impl ContextProvider for StaticContext {
    async fn get_context(
        &self,
        _node_id: &str,
        _node: &NodeDefinition,
    ) -> Result<Option<AgentContext>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(AgentContext {
            system_prefix: "Canon: the ship is called Meridian.".to_string(),
            user_suffix: "Stay under 200 words.".to_string(),
            sources: vec!["canon.md".to_string()],
        }))
    }
}

/// Observer that records every callback and answers escalations from a script
struct RecordingObserver {
    events: Mutex<Vec<String>>,
    human_answers: Mutex<Vec<HumanDecision>>,
}

impl RecordingObserver {
    fn new(human_answers: Vec<HumanDecision>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            human_answers: Mutex::new(human_answers),
        }
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl WorkflowObserver for RecordingObserver {
    fn on_node_start(&self, node_id: &str, _name: &str) {
        self.push(format!("start:{}", node_id));
    }

    fn on_node_complete(&self, node_id: &str, output: &str) {
        self.push(format!("complete:{}:{}", node_id, output));
    }

    fn on_node_evaluation(&self, node_id: &str, decision: Decision, _reason: &str) {
        self.push(format!("eval:{}:{}", node_id, decision));
    }

    fn on_human_decision(&self, node_id: &str, _reason: &str) -> HumanDecision {
        self.push(format!("human:{}", node_id));
        let mut answers = self.human_answers.lock().unwrap();
        if answers.is_empty() {
            HumanDecision::Approve
        } else {
            answers.remove(0)
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.defaults.streaming = false;
    config
}

/// A writes a draft, B edits it
fn draft_and_edit() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "draft-edit",
        vec![
            NodeDefinition::new("a", "Draft")
                .with_system(vec![Block::text("You are a novelist.")])
                .with_user(vec![Block::text("Write the opening.")]),
            NodeDefinition::new("b", "Edit")
                .with_system(vec![Block::text("You are an editor.")])
                .with_user(vec![
                    Block::named_reference("a", "Draft"),
                    Block::text("Tighten this."),
                ]),
        ],
    )
    .unwrap()
}

fn single(id: &str) -> WorkflowDefinition {
    WorkflowDefinition::new(
        "single",
        vec![NodeDefinition::new(id, "Only").with_user(vec![Block::text("Go.")])],
    )
    .unwrap()
}

// ============================================================================
// Engine Tests
// ============================================================================

#[tokio::test]
async fn test_run_without_agents() {
    let model = MockModel::new(&["The draft.", "The edit."]);
    let engine = Engine::new(model.clone(), config());
    let observer = RecordingObserver::new(vec![]);

    let outputs = engine.run(&draft_and_edit(), &observer).await.unwrap();

    assert_eq!(model.calls(), 2);
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs["a"], "The draft.");
    assert_eq!(outputs["b"], "The edit.");

    let second = model.request(1);
    assert_eq!(second.system, "You are an editor.");
    assert_eq!(second.user, "The draft.\nTighten this.");

    assert_eq!(
        observer.events(),
        vec![
            "start:a",
            "complete:a:The draft.",
            "start:b",
            "complete:b:The edit.",
        ]
    );
}

#[tokio::test]
async fn test_bounded_retry_then_approve() {
    let model = MockModel::new(&["v1", "v2", "v3"]);
    let evaluator =
        ScriptedEvaluator::decisions(&[Decision::Retry, Decision::Retry, Decision::Approve]);
    let engine = Engine::new(model.clone(), config())
        .with_agents(AgentPort::none().with_evaluator(evaluator.clone()));

    let report = engine
        .run_with_report(&single("a"), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(model.calls(), 3);
    assert_eq!(report.outputs["a"], "v3");
    assert_eq!(report.attempts["a"], 3);
    assert_eq!(*evaluator.seen_outputs.lock().unwrap(), vec!["v1", "v2", "v3"]);
}

#[tokio::test]
async fn test_retries_exhausted_accepts_last_output() {
    let model = MockModel::new(&["v1", "v2", "v3", "v4"]);
    let evaluator = ScriptedEvaluator::decisions(&[Decision::Retry; 4]);
    let engine = Engine::new(model.clone(), config())
        .with_agents(AgentPort::none().with_evaluator(evaluator));
    let observer = RecordingObserver::new(vec![]);

    let outputs = engine.run(&single("a"), &observer).await.unwrap();

    assert_eq!(model.calls(), 3);
    assert_eq!(outputs["a"], "v3");
    assert_eq!(
        observer.events().last().map(String::as_str),
        Some("complete:a:v3")
    );
}

#[tokio::test]
async fn test_zero_retries_means_single_attempt() {
    let model = MockModel::new(&["v1", "v2"]);
    let evaluator = ScriptedEvaluator::decisions(&[Decision::Retry]);
    let mut config = config();
    config.max_retries = 0;
    let engine = Engine::new(model.clone(), config)
        .with_agents(AgentPort::none().with_evaluator(evaluator));

    let outputs = engine.run(&single("a"), &NoopObserver).await.unwrap();
    assert_eq!(model.calls(), 1);
    assert_eq!(outputs["a"], "v1");
}

#[tokio::test]
async fn test_escalation_human_approves() {
    let model = MockModel::new(&["v1", "v2"]);
    let evaluator = ScriptedEvaluator::decisions(&[Decision::FlagHuman]);
    let engine = Engine::new(model.clone(), config())
        .with_agents(AgentPort::none().with_evaluator(evaluator));
    let observer = RecordingObserver::new(vec![HumanDecision::Approve]);

    let outputs = engine.run(&single("a"), &observer).await.unwrap();

    assert_eq!(model.calls(), 1);
    assert_eq!(outputs["a"], "v1");
    assert_eq!(
        observer.events(),
        vec!["start:a", "eval:a:flag_human", "human:a", "complete:a:v1"]
    );
}

#[tokio::test]
async fn test_escalation_human_retry_honored_while_attempts_remain() {
    let model = MockModel::new(&["v1", "v2", "v3", "v4"]);
    let evaluator = ScriptedEvaluator::decisions(&[Decision::FlagHuman; 3]);
    let engine = Engine::new(model.clone(), config())
        .with_agents(AgentPort::none().with_evaluator(evaluator));
    let observer = RecordingObserver::new(vec![HumanDecision::Retry; 3]);

    let report = engine.run_with_report(&single("a"), &observer).await.unwrap();

    // Third answer is a retry too, but no attempts remain
    assert_eq!(model.calls(), 3);
    assert_eq!(report.outputs["a"], "v3");
    let humans = observer
        .events()
        .iter()
        .filter(|e| e.starts_with("human:"))
        .count();
    assert_eq!(humans, 3);
}

#[tokio::test]
async fn test_malformed_decision_is_approve() {
    let parsed: Evaluation =
        serde_json::from_str(r#"{"decision": "maybe", "confidence": 3.0, "reason": "?"}"#).unwrap();
    assert_eq!(parsed.decision, Decision::Approve);
    assert_eq!(parsed.confidence(), 1.0);

    let model = MockModel::new(&["v1", "v2"]);
    let evaluator = ScriptedEvaluator::new(vec![Some(parsed)]);
    let engine = Engine::new(model.clone(), config())
        .with_agents(AgentPort::none().with_evaluator(evaluator));

    let outputs = engine.run(&single("a"), &NoopObserver).await.unwrap();
    assert_eq!(model.calls(), 1);
    assert_eq!(outputs["a"], "v1");
}

#[tokio::test]
async fn test_evaluator_returning_nothing_accepts() {
    let model = MockModel::new(&["v1", "v2"]);
    let evaluator = ScriptedEvaluator::new(vec![None]);
    let engine = Engine::new(model.clone(), config())
        .with_agents(AgentPort::none().with_evaluator(evaluator));
    let observer = RecordingObserver::new(vec![]);

    engine.run(&single("a"), &observer).await.unwrap();
    assert_eq!(model.calls(), 1);
    assert!(!observer.events().iter().any(|e| e.starts_with("eval:")));
}

#[tokio::test]
async fn test_retry_reuses_context_and_sees_fresh_cache() {
    let model = MockModel::new(&["draft", "edit-1", "edit-2"]);
    let evaluator = ScriptedEvaluator::new(vec![
        None,
        Some(Evaluation::new(Decision::Retry, 0.7, "ship name wrong")),
    ]);
    let context = Arc::new(StaticContext {
        calls: AtomicUsize::new(0),
    });
    let engine = Engine::new(model.clone(), config()).with_agents(
        AgentPort::none()
            .with_context(context.clone())
            .with_evaluator(evaluator),
    );

    let report = engine
        .run_with_report(&draft_and_edit(), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(context.calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.attempts["b"], 2);
    assert_eq!(report.outputs["b"], "edit-2");

    let retry = model.request(2);
    assert_eq!(
        retry.system,
        "Canon: the ship is called Meridian.\nYou are an editor."
    );
    assert_eq!(retry.user, "draft\nTighten this.\nStay under 200 words.");
    assert_eq!(model.request(1).system, retry.system);
}

#[tokio::test]
async fn test_structural_error_before_generation() {
    let workflow = WorkflowDefinition::new(
        "broken",
        vec![
            NodeDefinition::new("a", "A"),
            NodeDefinition::new("b", "B").with_user(vec![Block::reference("ghost")]),
        ],
    )
    .unwrap();
    let model = MockModel::new(&["never"]);
    let engine = Engine::new(model.clone(), config());
    let observer = RecordingObserver::new(vec![]);

    let err = engine.run(&workflow, &observer).await.unwrap_err();
    assert!(matches!(
        err,
        ScribeError::Dependency(DependencyError::Missing { ref dependent_id, ref missing_id })
            if dependent_id == "b" && missing_id == "ghost"
    ));
    assert_eq!(model.calls(), 0);
    assert!(observer.events().is_empty());
}

#[tokio::test]
async fn test_cycle_aborts_before_generation() {
    let workflow = WorkflowDefinition::new(
        "loop",
        vec![
            NodeDefinition::new("a", "A").with_user(vec![Block::reference("b")]),
            NodeDefinition::new("b", "B").with_user(vec![Block::reference("a")]),
        ],
    )
    .unwrap();
    let model = MockModel::new(&[]);
    let engine = Engine::new(model.clone(), config());

    let err = engine.run(&workflow, &NoopObserver).await.unwrap_err();
    match err {
        ScribeError::Dependency(DependencyError::Cycle { node_ids }) => {
            assert_eq!(node_ids, vec!["a".to_string(), "b".to_string()]);
        }
        other => panic!("expected cycle, got {other}"),
    }
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_transport_error_aborts_without_retry() {
    let model = Arc::new(UnreachableModel {
        calls: AtomicUsize::new(0),
    });
    let evaluator = ScriptedEvaluator::decisions(&[Decision::Retry; 3]);
    let engine = Engine::new(model.clone(), config())
        .with_agents(AgentPort::none().with_evaluator(evaluator));
    let observer = RecordingObserver::new(vec![]);

    let err = engine.run(&draft_and_edit(), &observer).await.unwrap_err();

    assert!(matches!(err, ScribeError::Generation { ref node_id, .. } if node_id == "a"));
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    assert_eq!(observer.events(), vec!["start:a"]);
}

// ============================================================================
// Loader Tests
// ============================================================================

#[tokio::test]
async fn test_load_and_run_yaml_workflow() {
    let yaml = r#"
name: chapter
nodes:
  - id: edit
    name: Edit
    user_prompt:
      blocks:
        - type: virtual
          source_node_id: outline
        - type: text
          content: Expand this.
  - id: outline
    name: Outline
    system_prompt:
      blocks:
        - type: text
          content: You plan chapters.
    user_prompt:
      blocks:
        - type: text
          content: Outline chapter one.
"#;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chapter.yaml");
    std::fs::write(&path, yaml).unwrap();

    let workflow = WorkflowLoader::new().load_workflow(&path).unwrap();
    assert_eq!(workflow.execution_order().unwrap(), vec!["outline", "edit"]);

    let model = MockModel::new(&["1. Arrival", "Chapter text"]);
    let engine = Engine::new(model.clone(), config());
    let outputs = engine.run(&workflow, &NoopObserver).await.unwrap();

    assert_eq!(outputs["outline"], "1. Arrival");
    assert_eq!(outputs["edit"], "Chapter text");
    assert_eq!(model.request(1).user, "1. Arrival\nExpand this.");
}

#[test]
fn test_loader_rejects_duplicate_ids() {
    let json = r#"{"name": "dup", "nodes": [{"id": "a", "name": "A"}, {"id": "a", "name": "B"}]}"#;
    assert!(WorkflowLoader::parse_json(json).is_err());
}
