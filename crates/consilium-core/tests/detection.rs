//! Role detection against scripted classifiers.

use std::sync::Arc;

use consilium_core::detection::{RoleDetector, RoleSelection};
use consilium_core::error::{ConfigError, DetectionError};
use consilium_core::{
    Connector, ConnectorConfig, DetectorConfig, Orchestrator, OrchestratorConfig,
    ResearchSpecialist, RoleDefinition, RoleRegistry,
};
use consilium_llm::fakes::{FailingGenerator, ScriptedGenerator};
use consilium_llm::{GenerationError, GenerationMode, TextGenerator};

fn definition(name: &str) -> RoleDefinition {
    RoleDefinition::new(name, format!("{name} : {{input}}"))
        .with_detection(format!("- {name} : critères de {name}"))
}

fn registry_with(names: &[&str]) -> RoleRegistry {
    let generator: Arc<dyn TextGenerator> = Arc::new(ScriptedGenerator::new(""));
    let mut registry = RoleRegistry::new();
    registry
        .register(ResearchSpecialist::role(generator.clone()))
        .unwrap();
    registry
        .register(Connector::role(generator.clone(), ConnectorConfig::default()))
        .unwrap();
    for name in names {
        registry
            .register_definition(definition(name), generator.clone())
            .unwrap();
    }
    registry
}

fn standard_registry() -> Arc<RoleRegistry> {
    Arc::new(registry_with(&["conseil", "organisation", "coach"]))
}

fn detector(registry: Arc<RoleRegistry>, classifier: Arc<dyn TextGenerator>) -> RoleDetector {
    RoleDetector::new(registry, classifier)
}

fn ids(selection: &RoleSelection) -> Vec<&str> {
    selection.iter().collect()
}

#[tokio::test]
async fn test_duplicates_removed_and_order_preserved() {
    let classifier = Arc::new(ScriptedGenerator::new(
        r#"{"roles": ["organisation", "coach", "organisation"]}"#,
    ));
    let selection = detector(standard_registry(), classifier)
        .detect("je veux mieux m'organiser")
        .await
        .unwrap();

    assert_eq!(ids(&selection), vec!["organisation", "coach"]);
}

#[tokio::test]
async fn test_names_normalized_and_unknown_dropped() {
    let classifier = Arc::new(ScriptedGenerator::new(
        r#"{"roles": [" Coachs ", "astrologie", "RECHERCHES", 42]}"#,
    ));
    let selection = detector(standard_registry(), classifier)
        .detect("peu importe")
        .await
        .unwrap();

    assert_eq!(ids(&selection), vec!["coach", "recherche"]);
}

#[tokio::test]
async fn test_connector_is_never_selected() {
    let classifier = Arc::new(ScriptedGenerator::new(
        r#"{"roles": ["connecteur", "coach"]}"#,
    ));
    let selection = detector(standard_registry(), classifier)
        .detect("peu importe")
        .await
        .unwrap();

    assert_eq!(ids(&selection), vec!["coach"]);
}

#[tokio::test]
async fn test_selection_capped_at_six() {
    let names = ["un", "deux", "troi", "quatre", "cinq", "six", "sept", "huit"];
    let registry = Arc::new(registry_with(&names));
    let reply = serde_json::json!({ "roles": names }).to_string();
    let classifier = Arc::new(ScriptedGenerator::new(reply));

    let selection = detector(registry, classifier)
        .detect("tout")
        .await
        .unwrap();

    assert_eq!(selection.len(), 6);
    assert_eq!(ids(&selection), names[..6].to_vec());
}

#[tokio::test]
async fn test_reasoning_stripped_and_fenced_block_preferred() {
    let reply = "<think>{\"roles\": [\"organisation\"]}</think>\n\
                 Voici : {\"roles\": [\"conseil\", \"coach\", \"organisation\"]}\n\
                 ```json\n{\"roles\": [\"coach\"]}\n```";
    let classifier = Arc::new(ScriptedGenerator::new(reply));

    let selection = detector(standard_registry(), classifier)
        .detect("peu importe")
        .await
        .unwrap();

    assert_eq!(ids(&selection), vec!["coach"]);
}

#[tokio::test]
async fn test_largest_object_wins_without_fence() {
    let reply = r#"D'abord {"note": 1}, puis {"roles": ["conseil", "organisation"], "raison": "stress"}."#;
    let classifier = Arc::new(ScriptedGenerator::new(reply));

    let selection = detector(standard_registry(), classifier)
        .detect("peu importe")
        .await
        .unwrap();

    assert_eq!(ids(&selection), vec!["conseil", "organisation"]);
}

#[tokio::test]
async fn test_unparsable_reply_uses_keyword_fallback() {
    let classifier = Arc::new(ScriptedGenerator::new("je ne sais pas"));
    let selection = detector(standard_registry(), classifier)
        .detect("Je suis stressé par mon projet")
        .await
        .unwrap();

    assert_eq!(ids(&selection), vec!["conseil", "organisation"]);
}

#[tokio::test]
async fn test_fallback_without_match_returns_default_role() {
    let classifier = Arc::new(ScriptedGenerator::new("pas de json"));
    let selection = detector(standard_registry(), classifier)
        .detect("bonjour")
        .await
        .unwrap();

    assert_eq!(ids(&selection), vec!["conseil"]);
}

#[tokio::test]
async fn test_fallback_returns_at_most_three_roles() {
    let classifier = Arc::new(ScriptedGenerator::new("{}"));
    let selection = detector(standard_registry(), classifier)
        .detect("stress, projet, motivation et statistiques")
        .await
        .unwrap();

    assert_eq!(selection.len(), 3);
    assert_eq!(selection.iter().next(), Some("conseil"));
}

#[tokio::test]
async fn test_empty_role_list_uses_fallback() {
    let classifier = Arc::new(ScriptedGenerator::new(r#"{"roles": []}"#));
    let selection = detector(standard_registry(), classifier)
        .detect("une routine du matin")
        .await
        .unwrap();

    assert_eq!(ids(&selection), vec!["organisation"]);
}

#[tokio::test]
async fn test_classifier_outage_uses_fallback() {
    let classifier = Arc::new(FailingGenerator::new(GenerationError::Connection(
        "refused".to_string(),
    )));
    let selection = detector(standard_registry(), classifier)
        .detect("ma motivation s'effondre")
        .await
        .unwrap();

    assert_eq!(ids(&selection), vec!["coach"]);
}

#[tokio::test]
async fn test_configuration_error_skips_classifier() {
    let mut registry = registry_with(&["conseil", "coach"]);
    let generator: Arc<dyn TextGenerator> = Arc::new(ScriptedGenerator::new(""));
    registry.load_definitions(Err(ConfigError::NotAList), generator);

    let classifier = Arc::new(ScriptedGenerator::new(r#"{"roles": ["coach"]}"#));
    let detector = detector(Arc::new(registry), classifier.clone());

    let err = detector.classify("discipline").await.unwrap_err();
    assert!(matches!(err, DetectionError::Configuration(_)));

    let selection = detector.detect("discipline").await.unwrap();
    assert_eq!(ids(&selection), vec!["coach"]);
    assert_eq!(classifier.call_count(), 0);
}

#[tokio::test]
async fn test_classifier_prompt_and_settings() {
    let classifier = Arc::new(ScriptedGenerator::new(r#"{"roles": ["coach"]}"#));
    detector(standard_registry(), classifier.clone())
        .detect("aide-moi à avancer")
        .await
        .unwrap();

    let calls = classifier.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].temperature, 0.2);
    assert_eq!(calls[0].mode, GenerationMode::Local);
    assert!(calls[0].prompt.contains("- recherche :"));
    assert!(calls[0].prompt.contains("- coach : critères de coach"));
    assert!(calls[0].prompt.contains("\"aide-moi à avancer\""));
    assert!(calls[0].prompt.contains(r#"{"roles": ["organisation", "coach"]}"#));
}

#[tokio::test]
async fn test_unregistered_default_role_is_internal_error() {
    let registry = Arc::new(registry_with(&["coach"]));
    let classifier: Arc<dyn TextGenerator> = Arc::new(ScriptedGenerator::new("rien"));
    let detector = RoleDetector::with_config(
        registry.clone(),
        classifier.clone(),
        DetectorConfig {
            fallback_role: "absent".to_string(),
            ..DetectorConfig::default()
        },
    );

    let err = detector.detect("bonjour").await.unwrap_err();
    assert!(matches!(err, DetectionError::Internal(_)));

    let orchestrator = Orchestrator::new(registry, detector, OrchestratorConfig::default());
    assert!(orchestrator.detect_roles("bonjour").await.is_empty());
}
