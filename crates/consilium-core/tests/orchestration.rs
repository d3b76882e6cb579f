//! Fan-out/fan-in behaviour of the orchestrator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use consilium_core::error::{PipelineError, RoleResult};
use consilium_core::orchestration::ProgressError;
use consilium_core::{
    AgentCapability, Connector, ConnectorConfig, Orchestrator, OrchestratorConfig, PoolState,
    ProgressReporter, ResearchSpecialist, Role, RoleDefinition, RoleDetector, RoleRegistry,
    RoleSelection, CONNECTOR_KEY, SYSTEM_ERROR_LABEL,
};
use consilium_llm::fakes::ScriptedGenerator;
use consilium_llm::{GenerationError, TextGenerator};
use tokio::time::Instant;

const RESEARCH: &str = "🔍 Recherches";
const ADVICE: &str = "💬 Conseil Personnel";

fn registry(generator: Arc<dyn TextGenerator>, with_connector: bool) -> RoleRegistry {
    let mut registry = RoleRegistry::new();
    registry
        .register(ResearchSpecialist::role(generator.clone()))
        .unwrap();
    if with_connector {
        registry
            .register(Connector::role(generator.clone(), ConnectorConfig::default()))
            .unwrap();
    }
    registry
        .register_definition(
            RoleDefinition::new("conseil", "Conseil : {input}")
                .with_display_name(ADVICE)
                .with_detection("- conseil : soutien moral"),
            generator.clone(),
        )
        .unwrap();
    registry
        .register_definition(
            RoleDefinition::new("coach", "Coach : {input}").with_detection("- coach : motivation"),
            generator,
        )
        .unwrap();
    registry
}

fn orchestrator_from(
    registry: RoleRegistry,
    classifier: Arc<dyn TextGenerator>,
    config: OrchestratorConfig,
) -> Orchestrator {
    let registry = Arc::new(registry);
    let detector = RoleDetector::new(registry.clone(), classifier);
    Orchestrator::new(registry, detector, config)
}

fn orchestrator(generator: Arc<ScriptedGenerator>) -> Orchestrator {
    orchestrator_with(generator, OrchestratorConfig::default())
}

fn orchestrator_with(
    generator: Arc<ScriptedGenerator>,
    config: OrchestratorConfig,
) -> Orchestrator {
    orchestrator_from(registry(generator.clone(), true), generator, config)
}

fn scripted() -> ScriptedGenerator {
    ScriptedGenerator::new("soutien")
        .reply_when("Tu es le Connecteur", "synthèse")
        .reply_when("assistant de recherche", "faits")
}

fn keys(results: &consilium_core::ResultSet) -> Vec<&str> {
    results.keys().collect()
}

#[tokio::test]
async fn test_single_role_has_no_synthesis() {
    let generator = Arc::new(ScriptedGenerator::new("X"));
    let engine = orchestrator(generator.clone());

    let (results, roles) = engine
        .process("le sommeil", RoleSelection::single("recherche"), &ProgressReporter::silent())
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results.get(RESEARCH), Some("X"));
    assert!(!results.contains_key(CONNECTOR_KEY));
    assert_eq!(roles.as_slice(), ["recherche"]);
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn test_two_roles_are_synthesized() {
    let generator = Arc::new(scripted());
    let engine = orchestrator(generator.clone());

    let (results, _) = engine
        .process(
            "je doute de moi",
            RoleSelection::new(["recherche", "conseil"]),
            &ProgressReporter::silent(),
        )
        .await
        .unwrap();

    assert_eq!(keys(&results), vec![RESEARCH, ADVICE, CONNECTOR_KEY]);
    assert_eq!(results.get(RESEARCH), Some("faits"));
    assert_eq!(results.get(ADVICE), Some("soutien"));
    assert_eq!(results.get(CONNECTOR_KEY), Some("synthèse"));

    let synthesis = generator
        .calls()
        .into_iter()
        .find(|c| c.prompt.contains("Tu es le Connecteur"))
        .unwrap();
    assert!(synthesis.prompt.contains("Réponse de l'aidant 🔍 Recherches: faits"));
    assert!(synthesis.prompt.contains("Réponse de l'aidant 💬 Conseil Personnel: soutien"));
}

#[tokio::test]
async fn test_failing_role_is_isolated() {
    let generator = Arc::new(
        scripted().fail_when("Conseil :", GenerationError::RateLimited),
    );
    let engine = orchestrator(generator);

    let (results, _) = engine
        .process(
            "je doute de moi",
            RoleSelection::new(["recherche", "conseil"]),
            &ProgressReporter::silent(),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results.get(RESEARCH), Some("faits"));
    assert_eq!(results.get(ADVICE), Some("Erreur conseil: rate limit exceeded"));
    assert_eq!(results.get(CONNECTOR_KEY), Some("synthèse"));
}

#[tokio::test(start_paused = true)]
async fn test_slow_role_times_out_at_deadline() {
    let generator = Arc::new(
        scripted().delay_when("Conseil :", Duration::from_secs(300), "trop tard"),
    );
    let engine = orchestrator(generator);
    let started = Instant::now();

    let (results, _) = engine
        .process(
            "je doute de moi",
            RoleSelection::new(["recherche", "conseil"]),
            &ProgressReporter::silent(),
        )
        .await
        .unwrap();

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(200));
    assert!(elapsed < Duration::from_secs(300));

    assert_eq!(results.get(RESEARCH), Some("faits"));
    assert_eq!(
        results.get(ADVICE),
        Some("Timeout : conseil n'a pas terminé dans les 200 secondes")
    );
    assert_eq!(results.get(CONNECTOR_KEY), Some("synthèse"));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_counts_from_first_submission() {
    let generator = Arc::new(
        ScriptedGenerator::new("x")
            .delay_when("assistant de recherche", Duration::from_secs(150), "faits")
            .delay_when("Conseil :", Duration::from_secs(150), "soutien"),
    );
    let engine = orchestrator_with(
        generator,
        OrchestratorConfig {
            max_workers: 1,
            ..OrchestratorConfig::default()
        },
    );

    let (results, _) = engine
        .process(
            "je doute de moi",
            RoleSelection::new(["recherche", "conseil"]),
            &ProgressReporter::silent(),
        )
        .await
        .unwrap();

    assert_eq!(results.get(RESEARCH), Some("faits"));
    assert!(results.get(ADVICE).unwrap().starts_with("Timeout : conseil"));
}

#[tokio::test(start_paused = true)]
async fn test_worker_budget_bounds_concurrency() {
    let slow = || {
        ScriptedGenerator::new("x")
            .delay_when("assistant de recherche", Duration::from_secs(10), "faits")
            .delay_when("Conseil :", Duration::from_secs(10), "soutien")
            .delay_when("Coach :", Duration::from_secs(10), "plan")
    };
    let selection = || RoleSelection::new(["recherche", "conseil", "coach"]);

    let serial = orchestrator_with(
        Arc::new(slow()),
        OrchestratorConfig {
            max_workers: 1,
            ..OrchestratorConfig::default()
        },
    );
    let started = Instant::now();
    serial
        .process("q", selection(), &ProgressReporter::silent())
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_secs(30));

    let parallel = orchestrator(Arc::new(slow()));
    let started = Instant::now();
    parallel
        .process("q", selection(), &ProgressReporter::silent())
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(20));
}

struct SlowFlag {
    finished: Arc<AtomicBool>,
}

#[async_trait]
impl AgentCapability for SlowFlag {
    async fn execute(&self, _input: &str) -> RoleResult<String> {
        tokio::time::sleep(Duration::from_secs(300)).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok("fini".to_string())
    }
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_task_keeps_running() {
    let generator: Arc<dyn TextGenerator> = Arc::new(ScriptedGenerator::new("x"));
    let finished = Arc::new(AtomicBool::new(false));
    let mut registry = RoleRegistry::new();
    registry
        .register(Role::new(
            "lent",
            "🐢 Lent",
            Arc::new(SlowFlag {
                finished: finished.clone(),
            }),
        ))
        .unwrap();
    let engine = orchestrator_from(registry, generator, OrchestratorConfig::default());

    let (results, _) = engine
        .process("q", RoleSelection::single("lent"), &ProgressReporter::silent())
        .await
        .unwrap();
    assert_eq!(
        results.get("🐢 Lent"),
        Some("Timeout : lent n'a pas terminé dans les 200 secondes")
    );
    assert!(!finished.load(Ordering::SeqCst));

    tokio::time::sleep(Duration::from_secs(150)).await;
    assert!(finished.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_task_releases_progress_channel() {
    let generator = Arc::new(
        ScriptedGenerator::new("x").delay_when("Conseil :", Duration::from_secs(100_000), "trop tard"),
    );
    let engine = orchestrator_with(
        generator,
        OrchestratorConfig {
            deadline: Duration::from_secs(1),
            ..OrchestratorConfig::default()
        },
    );
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let reporter = ProgressReporter::channel(tx);

    let (results, _) = engine
        .process("q", RoleSelection::single("conseil"), &reporter)
        .await
        .unwrap();
    assert!(results.get(ADVICE).unwrap().starts_with("Timeout : conseil"));
    drop(reporter);

    let mut lines = Vec::new();
    let drained = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
    })
    .await;

    assert!(drained.is_ok());
    assert_eq!(
        lines,
        vec![
            "🚀 Démarrage 💬 Conseil Personnel...".to_string(),
            "⚙️ 💬 Conseil Personnel en cours...".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_missing_connector_becomes_error_text() {
    let generator = Arc::new(scripted());
    let engine = orchestrator_from(
        registry(generator.clone(), false),
        generator,
        OrchestratorConfig::default(),
    );

    let (results, _) = engine
        .process(
            "q",
            RoleSelection::new(["recherche", "conseil"]),
            &ProgressReporter::silent(),
        )
        .await
        .unwrap();

    assert_eq!(results.get(RESEARCH), Some("faits"));
    assert_eq!(results.get(ADVICE), Some("soutien"));
    assert_eq!(
        results.get(CONNECTOR_KEY),
        Some("Erreur Connecteur : Agent Connecteur non configuré")
    );
}

#[tokio::test]
async fn test_synthesis_failure_becomes_error_text() {
    let generator = Arc::new(
        ScriptedGenerator::new("soutien")
            .fail_when("Tu es le Connecteur", GenerationError::Authentication)
            .reply_when("assistant de recherche", "faits"),
    );
    let engine = orchestrator(generator);

    let (results, _) = engine
        .process(
            "q",
            RoleSelection::new(["recherche", "conseil"]),
            &ProgressReporter::silent(),
        )
        .await
        .unwrap();

    assert_eq!(
        results.get(CONNECTOR_KEY),
        Some("Erreur Connecteur : authentication failed: check your API key")
    );
}

#[tokio::test]
async fn test_empty_selection_dispatches_default_role() {
    let generator = Arc::new(scripted());
    let engine = orchestrator(generator);

    let (results, roles) = engine
        .process("q", RoleSelection::empty(), &ProgressReporter::silent())
        .await
        .unwrap();

    assert_eq!(roles.as_slice(), ["recherche"]);
    assert_eq!(keys(&results), vec![RESEARCH]);
}

#[tokio::test]
async fn test_unknown_roles_are_skipped() {
    let generator = Arc::new(scripted());
    let engine = orchestrator(generator);

    let (results, roles) = engine
        .process(
            "q",
            RoleSelection::new(["astrologie", "connecteur", "coach"]),
            &ProgressReporter::silent(),
        )
        .await
        .unwrap();

    assert_eq!(roles.as_slice(), ["coach"]);
    assert_eq!(keys(&results), vec!["coach"]);
}

#[tokio::test]
async fn test_no_dispatchable_role_is_pipeline_error() {
    let engine = orchestrator(Arc::new(scripted()));

    let err = engine
        .process("q", RoleSelection::single("astrologie"), &ProgressReporter::silent())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoDispatchableRoles(_)));
}

#[tokio::test]
async fn test_pool_failure_becomes_error_artifact() {
    let generator = Arc::new(ScriptedGenerator::new(r#"{"roles": ["coach"]}"#));
    let engine = orchestrator_with(
        generator,
        OrchestratorConfig {
            max_workers: 0,
            ..OrchestratorConfig::default()
        },
    );

    let response = engine.respond("q", &ProgressReporter::silent()).await;

    assert_eq!(response.results.len(), 1);
    let content = response.results.get(SYSTEM_ERROR_LABEL).unwrap();
    assert!(content.starts_with(
        "Une erreur critique est survenue. Détails techniques : worker pool unavailable"
    ));
}

#[tokio::test]
async fn test_respond_detects_then_dispatches() {
    let generator = Arc::new(
        ScriptedGenerator::new("soutien")
            .reply_when("Texte à analyser", r#"<think>...</think>{"roles": ["recherche"]}"#)
            .reply_when("assistant de recherche", "faits"),
    );
    let engine = orchestrator(generator);

    let response = engine.respond("le sommeil", &ProgressReporter::silent()).await;

    assert_eq!(response.roles.as_slice(), ["recherche"]);
    assert_eq!(keys(&response.results), vec![RESEARCH]);
    assert_eq!(response.results.get(RESEARCH), Some("faits"));

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["roles"], serde_json::json!(["recherche"]));
    assert_eq!(json["results"][RESEARCH], "faits");
}

#[tokio::test]
async fn test_respond_runs_on_spawned_task() {
    let generator = Arc::new(
        ScriptedGenerator::new("soutien")
            .reply_when("Texte à analyser", r#"{"roles": ["recherche"]}"#)
            .reply_when("assistant de recherche", "faits"),
    );
    let engine = Arc::new(orchestrator(generator));

    let response = tokio::spawn({
        let engine = engine.clone();
        async move { engine.respond("le sommeil", &ProgressReporter::silent()).await }
    })
    .await
    .unwrap();

    assert_eq!(response.results.get(RESEARCH), Some("faits"));
    engine.shutdown().unwrap();
}

#[tokio::test]
async fn test_pool_returns_to_idle_and_is_recreated() {
    let engine = orchestrator(Arc::new(scripted()));
    assert_eq!(engine.pool_state(), PoolState::Idle);

    for _ in 0..2 {
        engine
            .process("q", RoleSelection::single("coach"), &ProgressReporter::silent())
            .await
            .unwrap();
        assert_eq!(engine.pool_state(), PoolState::Idle);
    }

    engine.shutdown().unwrap();
    engine.shutdown().unwrap();
    assert_eq!(engine.pool_state(), PoolState::Idle);
}

#[tokio::test]
async fn test_progress_sequence() {
    let engine = orchestrator(Arc::new(scripted()));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    engine
        .process(
            "q",
            RoleSelection::new(["recherche", "conseil"]),
            &ProgressReporter::channel(tx),
        )
        .await
        .unwrap();

    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv() {
        lines.push(line);
    }

    assert_eq!(
        &lines[..2],
        ["🚀 Démarrage 🔍 Recherches...", "🚀 Démarrage 💬 Conseil Personnel..."]
    );
    for role in [RESEARCH, ADVICE] {
        let started = lines.iter().position(|l| *l == format!("⚙️ {role} en cours...")).unwrap();
        let done = lines.iter().position(|l| *l == format!("✅ {role} terminé !")).unwrap();
        assert!(started < done);
    }
    assert_eq!(lines.last().map(String::as_str), Some("📝 Résumé en cours..."));
    assert_eq!(lines.len(), 7);
}

#[tokio::test]
async fn test_failure_progress_line() {
    let generator = Arc::new(scripted().fail_when("Conseil :", GenerationError::RateLimited));
    let engine = orchestrator(generator);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    engine
        .process("q", RoleSelection::single("conseil"), &ProgressReporter::channel(tx))
        .await
        .unwrap();

    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv() {
        lines.push(line);
    }
    assert_eq!(
        lines.last().map(String::as_str),
        Some("❌ Erreur 💬 Conseil Personnel : rate limit exceeded")
    );
}

#[tokio::test]
async fn test_failing_observer_does_not_break_pipeline() {
    let calls = Arc::new(Mutex::new(0usize));
    let counter = calls.clone();
    let reporter = ProgressReporter::new(Arc::new(move |_status: &str| {
        *counter.lock().unwrap() += 1;
        Err::<(), _>(ProgressError("écran fermé".to_string()))
    }));
    let engine = orchestrator(Arc::new(scripted()));

    let (results, _) = engine
        .process("q", RoleSelection::new(["recherche", "conseil"]), &reporter)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(*calls.lock().unwrap(), 7);
}
