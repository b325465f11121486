use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use genflow_core::{
    DataUri, FlowMode, GenflowError, GenflowResult, Modality, Model, ModelConfig, ModelRequest,
    PromptPatch, PromptRecord, PromptStore, RawResponse, MSG_SAVE_FAILED,
};
use genflow_runtime::flows::{
    ANALYZE_SUPPLIERS, ARCHIVE_PROMPT, GENERATE_IMAGE, GENERATE_SCENARIO_ARCHITECTURE,
    IDENTIFY_OBJECTS, INTELLIGENT_SEARCH, LIST_PROMPTS, SAVE_PROMPT,
};
use genflow_runtime::{FlowContext, Runtime};
use genflow_store::InMemoryStore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

type Responder = Box<dyn Fn(&ModelRequest) -> GenflowResult<RawResponse> + Send + Sync>;

struct ScriptedModel {
    config: ModelConfig,
    responder: Responder,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    fn new(responder: impl Fn(&ModelRequest) -> GenflowResult<RawResponse> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            config: ModelConfig::google("scripted"),
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_request(&self) -> ModelRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl Model for ScriptedModel {
    async fn generate(&self, request: &ModelRequest) -> GenflowResult<RawResponse> {
        self.requests.lock().unwrap().push(request.clone());
        (self.responder)(request)
    }

    fn config(&self) -> &ModelConfig {
        &self.config
    }
}

/// Wraps the in-memory store, counting calls and optionally failing them
#[derive(Default)]
struct CountingStore {
    inner: InMemoryStore,
    calls: AtomicUsize,
    down: AtomicBool,
}

impl CountingStore {
    fn touch(&self) -> GenflowResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            Err(GenflowError::store("connection refused"))
        } else {
            Ok(())
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PromptStore for CountingStore {
    async fn list(&self) -> GenflowResult<Vec<PromptRecord>> {
        self.touch()?;
        self.inner.list().await
    }

    async fn save(&self, patch: PromptPatch) -> GenflowResult<String> {
        self.touch()?;
        self.inner.save(patch).await
    }

    async fn archive(&self, id: &str) -> GenflowResult<()> {
        self.touch()?;
        self.inner.archive(id).await
    }

    async fn ping(&self) -> GenflowResult<()> {
        self.touch()
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

fn runtime(model: Option<Arc<ScriptedModel>>, store: Arc<CountingStore>) -> Runtime {
    let model = model.map(|m| m as Arc<dyn Model>);
    Runtime::with_backends(model, store).unwrap()
}

fn architecture() -> Value {
    json!({
        "title": "Smart farm",
        "summary": "Sensors feed a yield model.",
        "modules": [
            {"name": "Sensing", "description": "Field sensors"},
            {"name": "Forecast", "description": "Yield model", "capabilities": ["weather"]}
        ]
    })
}

#[tokio::test]
async fn test_generative_flow_round_trip() {
    let model = ScriptedModel::new(|_| Ok(RawResponse::Structured(architecture())));
    let runtime = runtime(Some(model.clone()), Arc::new(CountingStore::default()));

    let output = runtime
        .call(
            GENERATE_SCENARIO_ARCHITECTURE,
            json!({"scenario": "smart farm", "industry": "agriculture"}),
        )
        .await
        .unwrap();
    assert_eq!(output, architecture());

    let request = model.last_request();
    assert!(request.prompt.contains("Scenario: smart farm"));
    assert!(request.prompt.contains("Industry: agriculture"));
    assert!(request.response_schema.is_some());
    let system = request.system.unwrap();
    assert!(system.starts_with("You are a solution architect"));
    assert!(system.contains("structured JSON"));
    assert!(request.model.is_none());
}

#[tokio::test]
async fn test_invalid_input_names_every_field_without_side_effects() {
    let model = ScriptedModel::new(|_| Ok(RawResponse::Structured(json!({"results": []}))));
    let store = Arc::new(CountingStore::default());
    let runtime = runtime(Some(model.clone()), store.clone());

    let err = runtime
        .call(INTELLIGENT_SEARCH, json!({"limit": 50}))
        .await
        .unwrap_err();
    assert!(matches!(err, GenflowError::SchemaValidation(_)));
    let mut fields = err.violated_fields();
    fields.sort_unstable();
    assert_eq!(fields, vec!["limit", "query"]);

    let err = runtime
        .call(SAVE_PROMPT, json!({"name": 7, "scope": "team"}))
        .await
        .unwrap_err();
    let mut fields = err.violated_fields();
    fields.sort_unstable();
    assert_eq!(fields, vec!["name", "scope"]);

    assert_eq!(model.calls(), 0);
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_media_input_and_output_coercion() {
    let model = ScriptedModel::new(|_| {
        Ok(RawResponse::Text(
            "```json\n{\"objects\": [{\"name\": \"cup\", \"confidence\": \"0.9\", \"description\": null}]}\n```"
                .to_string(),
        ))
    });
    let runtime = runtime(Some(model.clone()), Arc::new(CountingStore::default()));

    let photo = DataUri::new("image/jpeg", vec![0xff, 0xd8, 0xff]).to_string();
    let output = runtime
        .call(IDENTIFY_OBJECTS, json!({"photoDataUri": photo}))
        .await
        .unwrap();
    assert_eq!(output, json!({"objects": [{"name": "cup", "confidence": 0.9}]}));

    let request = model.last_request();
    assert_eq!(request.media.len(), 1);
    assert_eq!(request.media[0].mime_type(), "image/jpeg");
    assert!(!request.prompt.contains("data:image"));
}

#[tokio::test]
async fn test_output_outside_schema_is_flow_error() {
    let model = ScriptedModel::new(|_| {
        Ok(RawResponse::Structured(json!({"objects": [{"name": "cup", "confidence": 1.5}]})))
    });
    let runtime = runtime(Some(model), Arc::new(CountingStore::default()));

    let photo = DataUri::new("image/png", vec![1, 2, 3]).to_string();
    let err = runtime
        .call(IDENTIFY_OBJECTS, json!({"photoDataUri": photo}))
        .await
        .unwrap_err();
    match &err {
        GenflowError::FlowExecution { flow, cause } => {
            assert_eq!(flow, IDENTIFY_OBJECTS);
            assert!(matches!(**cause, GenflowError::SchemaValidation(_)));
        }
        other => panic!("expected FlowExecution, got {:?}", other),
    }
    assert_eq!(err.violated_fields(), vec!["objects[0].confidence"]);
}

#[tokio::test]
async fn test_model_failures_are_wrapped() {
    let model = ScriptedModel::new(|_| Err(GenflowError::empty("no candidates")));
    let runtime = runtime(Some(model), Arc::new(CountingStore::default()));

    let err = runtime
        .call(INTELLIGENT_SEARCH, json!({"query": "heat pumps"}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GenflowError::FlowExecution { ref cause, .. } if matches!(**cause, GenflowError::EmptyResponse(_))
    ));

    let model = ScriptedModel::new(|_| Ok(RawResponse::Text("I cannot help with that".into())));
    let runtime = runtime_with(model);
    let err = runtime
        .call(INTELLIGENT_SEARCH, json!({"query": "heat pumps"}))
        .await
        .unwrap_err();
    assert!(matches!(err.root_cause(), GenflowError::MalformedResponse(_)));
}

fn runtime_with(model: Arc<ScriptedModel>) -> Runtime {
    runtime(Some(model), Arc::new(CountingStore::default()))
}

#[tokio::test]
async fn test_live_flow_without_backend_fails() {
    let runtime = runtime(None, Arc::new(CountingStore::default()));
    let err = runtime
        .call(INTELLIGENT_SEARCH, json!({"query": "heat pumps"}))
        .await
        .unwrap_err();
    assert!(matches!(err, GenflowError::FlowExecution { .. }));
    assert!(matches!(err.root_cause(), GenflowError::BackendUnavailable(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_stubbed_flow_skips_backend() {
    let model = ScriptedModel::new(|_| Err(GenflowError::backend("should not be called")));
    let store: Arc<dyn PromptStore> = Arc::new(CountingStore::default());
    let runtime = Runtime::with_backends(Some(model.clone() as Arc<dyn Model>), store.clone()).unwrap();

    let flow = (*runtime.flow(GENERATE_IMAGE).unwrap())
        .clone()
        .with_mode(FlowMode::Stubbed, None)
        .unwrap();
    let ctx = FlowContext::new(Some(model.clone() as Arc<dyn Model>), store);

    let output = flow.call(&ctx, json!({"prompt": "a fox"})).await.unwrap();
    let uri = output["imageDataUri"].as_str().unwrap();
    assert!(DataUri::parse(uri).unwrap().is_image());
    assert_eq!(model.calls(), 0);

    let err = flow.call(&ctx, json!({})).await.unwrap_err();
    assert_eq!(err.violated_fields(), vec!["prompt"]);
}

#[tokio::test]
async fn test_image_generation_binds_media() {
    let model = ScriptedModel::new(|_| Ok(RawResponse::Media(DataUri::new("image/png", b"png".to_vec()))));
    let runtime = runtime_with(model.clone());

    let output = runtime
        .call(GENERATE_IMAGE, json!({"prompt": "a lighthouse", "style": "watercolor"}))
        .await
        .unwrap();
    assert_eq!(output, json!({"imageDataUri": "data:image/png;base64,cG5n"}));

    let request = model.last_request();
    assert!(request.generation.response_modalities.contains(&Modality::Image));
    assert!(request.response_schema.is_none());
    assert_eq!(
        request.model.as_deref(),
        Some("gemini-2.0-flash-preview-image-generation")
    );
}

#[tokio::test]
async fn test_supplier_analysis_uses_model_when_live() {
    let model = ScriptedModel::new(|_| {
        Ok(RawResponse::Structured(json!({
            "suppliers": [{"supplier": "Acme", "category": "software", "score": "88"}],
            "summary": "one strong match"
        })))
    });
    let runtime = runtime_with(model.clone());

    let output = runtime
        .call(ANALYZE_SUPPLIERS, json!({"dataset": "supplier,category\nAcme,software\n"}))
        .await
        .unwrap();
    assert_eq!(output["suppliers"][0]["score"], 88);
    assert!(model.last_request().prompt.contains("Acme,software"));

    let err = runtime
        .call(ANALYZE_SUPPLIERS, json!({"dataset": "just some text"}))
        .await
        .unwrap_err();
    assert!(matches!(err, GenflowError::FlowExecution { .. }));
    assert!(matches!(err.root_cause(), GenflowError::SchemaValidation(_)));
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn test_schema_valid_input_never_raises_schema_validation() {
    let runtime = runtime(None, Arc::new(CountingStore::default()));
    let flow = runtime.flow(ANALYZE_SUPPLIERS).unwrap();

    for dataset in ["supplier,product\nAcme,Widgets\n", "", "just some text"] {
        let input = json!({ "dataset": dataset });
        assert!(flow.definition().input.validate(&input).is_ok());

        let err = runtime.call(ANALYZE_SUPPLIERS, input).await.unwrap_err();
        assert!(
            !matches!(err, GenflowError::SchemaValidation(_)),
            "dataset {:?} raised {:?}",
            dataset,
            err
        );
    }
}

#[tokio::test]
async fn test_store_outage() {
    let store = Arc::new(CountingStore::default());
    let runtime = runtime(None, store.clone());
    store.down.store(true, Ordering::SeqCst);

    let err = runtime.call(LIST_PROMPTS, json!({})).await.unwrap_err();
    assert!(matches!(err, GenflowError::FlowExecution { .. }));
    assert!(matches!(err.root_cause(), GenflowError::StoreUnavailable(_)));

    let saved = runtime
        .call(SAVE_PROMPT, json!({"name": "A", "userPrompt": "hi"}))
        .await
        .unwrap();
    assert_eq!(saved["success"], false);
    assert!(saved["message"].as_str().unwrap().starts_with(MSG_SAVE_FAILED));
    assert!(saved.get("id").is_none());

    let archived = runtime.call(ARCHIVE_PROMPT, json!({"id": "x"})).await.unwrap();
    assert_eq!(archived["success"], false);

    let health = runtime.health().await;
    assert!(!health.connected);
    assert_eq!(health.store, "counting");
    assert!(health.error.unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_record_scenario() {
    let store = Arc::new(CountingStore::default());
    let runtime = runtime(None, store);

    let saved = runtime
        .call(SAVE_PROMPT, json!({"name": "A", "scope": "general", "userPrompt": "hi"}))
        .await
        .unwrap();
    assert_eq!(saved["success"], true);
    let id = saved["id"].as_str().unwrap().to_string();

    let update = runtime
        .call(SAVE_PROMPT, json!({"id": id, "context": "travel"}))
        .await
        .unwrap();
    assert_eq!(update["id"], id.as_str());

    let listed = runtime.call(LIST_PROMPTS, json!({})).await.unwrap();
    let record = &listed["prompts"][0];
    assert_eq!(record["name"], "A");
    assert_eq!(record["userPrompt"], "hi");
    assert_eq!(record["context"], "travel");

    let missing = runtime
        .call(ARCHIVE_PROMPT, json!({"id": "does-not-exist"}))
        .await
        .unwrap();
    assert_eq!(missing["success"], false);
    let after = runtime.call(LIST_PROMPTS, json!({})).await.unwrap();
    assert_eq!(after, listed);
}

#[derive(Serialize)]
struct SearchQuery<'a> {
    query: &'a str,
    limit: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    relevance: f64,
}

#[tokio::test]
async fn test_typed_call() {
    let model = ScriptedModel::new(|_| {
        Ok(RawResponse::Structured(json!({
            "results": [{"title": "Inverter guide", "snippet": "…", "relevance": 0.8}]
        })))
    });
    let runtime = runtime_with(model.clone());

    let results: SearchResults = runtime
        .call_typed(INTELLIGENT_SEARCH, &SearchQuery { query: "solar inverters", limit: 3 })
        .await
        .unwrap();
    assert_eq!(results.results.len(), 1);
    assert_eq!(results.results[0].title, "Inverter guide");
    assert!((results.results[0].relevance - 0.8).abs() < f64::EPSILON);
    assert!(model.last_request().prompt.contains("at most 3 results"));
}

#[tokio::test]
async fn test_concurrent_invocations_are_independent() {
    let model = ScriptedModel::new(|request| {
        let query = request.prompt.lines().next().unwrap_or_default().to_string();
        Ok(RawResponse::Structured(json!({
            "results": [{"title": query, "snippet": "", "relevance": 1.0}]
        })))
    });
    let runtime = Arc::new(runtime_with(model.clone()));

    let mut handles = Vec::new();
    for i in 0..10 {
        let runtime = runtime.clone();
        handles.push(tokio::spawn(async move {
            runtime
                .call(INTELLIGENT_SEARCH, json!({"query": format!("q{}", i)}))
                .await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let output = handle.await.unwrap().unwrap();
        assert_eq!(output["results"][0]["title"], format!("Search for: q{}", i));
    }
    assert_eq!(model.calls(), 10);
}
