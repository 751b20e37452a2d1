//! Rule merging, applicability and evaluation through the public API.

use oscal_converter::collaborators::{
    InMemoryArtifactStore, InMemoryHistory, InMemoryRuleStore,
};
use oscal_converter::rules::{RuleCatalog, RuleCategory, RuleType};
use oscal_converter::{
    EngineConfig, Format, ModelType, OscalService, Severity, ValidationRequest,
};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

const CUSTOM_RULES: &str = r#"[
    {
        "ruleId": "org-ssp-remarks",
        "name": "SSP remarks",
        "description": "Every SSP carries organizational remarks",
        "ruleType": "REQUIRED_FIELD",
        "severity": "ERROR",
        "category": "ssp",
        "fieldPath": "metadata/remarks",
        "applicableModelTypes": ["system-security-plan"]
    },
    {
        "ruleId": "org-malformed",
        "name": "Malformed metadata",
        "ruleType": "SOMETHING_ELSE",
        "severity": "CRITICAL",
        "category": "nonsense",
        "applicableModelTypes": ["CATALOG", "bogus", "profile"]
    },
    {
        "ruleId": "org-nowhere",
        "name": "No model types",
        "ruleType": "PATTERN_MATCH",
        "severity": "INFO",
        "category": "metadata",
        "fieldPath": "metadata/title",
        "constraintDetails": "^.+$"
    },
    {
        "ruleId": "org-disabled",
        "name": "Disabled",
        "ruleType": "REQUIRED_FIELD",
        "severity": "ERROR",
        "category": "metadata",
        "fieldPath": "metadata/never-present",
        "applicableModelTypes": ["system-security-plan", "catalog"],
        "enabled": false
    }
]"#;

const SSP_JSON: &str = r##"{
  "system-security-plan": {
    "uuid": "74c8ba1e-5cd4-4ad1-bbfd-d888e2f6c724",
    "metadata": {
      "title": "Sample SSP",
      "last-modified": "2024-03-01T12:00:00Z",
      "version": "1.0",
      "oscal-version": "1.1.2"
    },
    "import-profile": { "@href": "#baseline" },
    "system-characteristics": {
      "system-name": "Sample",
      "security-sensitivity-level": "moderate"
    },
    "system-implementation": {
      "component": { "@uuid": "aa1b2c3d-1111-4222-8333-444455556666", "@type": "this-system" }
    },
    "control-implementation": {
      "implemented-requirement": [
        { "@uuid": "bb1b2c3d-1111-4222-8333-444455556666", "@control-id": "ac-1" }
      ]
    }
  }
}"##;

// --- Helper Functions ---

fn custom_rules_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(CUSTOM_RULES.as_bytes()).unwrap();
    file
}

fn service() -> OscalService {
    let file = custom_rules_file();
    OscalService::new(
        Arc::new(RuleCatalog::builtin()),
        Arc::new(InMemoryRuleStore::from_file(file.path()).unwrap()),
        Arc::new(InMemoryHistory::new()),
        Arc::new(InMemoryArtifactStore::new()),
        EngineConfig::default(),
    )
}

// --- Test Cases ---

#[test]
fn test_every_returned_rule_applies_to_the_requested_type() {
    let service = service();
    for model_type in ModelType::ALL {
        let response = service.get_rules_for_model_type(model_type);
        assert!(!response.rules.is_empty(), "{} has no rules", model_type);
        for rule in &response.rules {
            assert!(rule.applies_to(model_type), "{} leaked into {}", rule.id, model_type);
            assert!(rule.enabled);
        }
        for category in &response.categories {
            assert!(!category.rules.is_empty());
        }
    }
}

#[test]
fn test_malformed_custom_metadata_is_normalized() {
    let response = service().get_all_rules();
    let malformed = response
        .rules
        .iter()
        .find(|r| r.id == "org-malformed")
        .unwrap();

    assert_eq!(malformed.rule_type, RuleType::Custom);
    assert_eq!(malformed.severity, Severity::Warning);
    assert_eq!(malformed.category, RuleCategory::Structural);
    assert_eq!(
        malformed.applicable_model_types.iter().copied().collect::<Vec<_>>(),
        vec![ModelType::Catalog, ModelType::Profile]
    );

    let nowhere = response.rules.iter().find(|r| r.id == "org-nowhere").unwrap();
    assert!(nowhere.applicable_model_types.is_empty());
}

#[test]
fn test_all_rules_lists_every_custom_rule() {
    let response = service().get_all_rules();
    let custom: Vec<&str> = response
        .rules
        .iter()
        .filter(|r| !r.is_built_in)
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(
        custom,
        vec!["org-ssp-remarks", "org-malformed", "org-nowhere", "org-disabled"]
    );
    assert_eq!(response.categories.len(), 9);
}

#[test]
fn test_custom_rule_applicability() {
    let service = service();
    let ids = |model_type| -> Vec<String> {
        service
            .get_rules_for_model_type(model_type)
            .rules
            .into_iter()
            .filter(|r| !r.is_built_in)
            .map(|r| r.id)
            .collect()
    };

    assert_eq!(ids(ModelType::SystemSecurityPlan), vec!["org-ssp-remarks"]);
    assert_eq!(ids(ModelType::Catalog), vec!["org-malformed"]);
    assert_eq!(ids(ModelType::Profile), vec!["org-malformed"]);
    assert!(ids(ModelType::AssessmentPlan).is_empty());
}

#[test]
fn test_rule_evaluation_during_validation() {
    let service = service();
    let request = ValidationRequest::new(SSP_JSON, ModelType::SystemSecurityPlan)
        .format(Format::Json);

    let baseline = service.validate(&request, "auditor");
    assert!(baseline.valid);
    assert!(baseline.findings.is_empty());

    let with_rules = service.validate(&request.clone().with_rules(), "auditor");
    assert!(!with_rules.valid);
    assert_eq!(with_rules.findings.len(), 1);
    assert_eq!(
        with_rules.findings[0].rule_id.as_deref(),
        Some("org-ssp-remarks")
    );
}

#[test]
fn test_builtin_rules_flag_broken_documents() {
    let service = OscalService::standalone(EngineConfig::default());
    let broken = r##"<catalog uuid="not-a-uuid">
  <metadata><title>Broken</title></metadata>
  <group id="ac">
    <control id="ac-1"><title>One</title></control>
    <control id="ac-1"><link href="#missing"/></control>
  </group>
</catalog>"##;

    let result = service.validate(
        &ValidationRequest::new(broken, ModelType::Catalog).with_rules(),
        "auditor",
    );
    assert!(!result.valid);

    let flagged: Vec<&str> = result
        .findings
        .iter()
        .filter_map(|f| f.rule_id.as_deref())
        .collect();
    for expected in [
        "meta-version-required",
        "id-document-uuid-format",
        "id-control-id-unique",
        "ctrl-title-required",
        "ref-internal-links-resolve",
    ] {
        assert!(flagged.contains(&expected), "{} not flagged in {:?}", expected, flagged);
    }
}
