//! Built-in rule catalog
//!
//! The table is authored here and materialized once into an immutable
//! [`RuleCatalog`], which callers share behind an `Arc`.
//!
//! Field paths are relative to the document root. A plain segment matches a
//! child element or an attribute of that name, `@name` only an attribute,
//! `*` any child and `**` any depth.

use super::{RuleCategory, RuleType, ValidationRule};
use crate::model_type::ModelType;
use crate::validation::Severity;
use std::collections::BTreeSet;

use ModelType::*;

const ALL_MODELS: &[ModelType] = &ModelType::ALL;
const CONTROL_MODELS: &[ModelType] =
    &[Catalog, Profile, ComponentDefinition, SystemSecurityPlan];
const ASSESSMENT_MODELS: &[ModelType] =
    &[AssessmentPlan, AssessmentResults, PlanOfActionAndMilestones];

const UUID_PATTERN: &str =
    r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[45][0-9a-fA-F]{3}-[89abAB][0-9a-fA-F]{3}-[0-9a-fA-F]{12}$";
const DATETIME_PATTERN: &str =
    r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})$";

struct BuiltinRule {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    category: RuleCategory,
    severity: Severity,
    rule_type: RuleType,
    field_path: &'static str,
    constraint: &'static str,
    models: &'static [ModelType],
}

const BUILTIN_RULES: &[BuiltinRule] = &[
    // Metadata
    BuiltinRule {
        id: "meta-title-required",
        name: "Metadata title required",
        description: "Every document's metadata must carry a title",
        category: RuleCategory::Metadata,
        severity: Severity::Error,
        rule_type: RuleType::RequiredField,
        field_path: "metadata/title",
        constraint: "",
        models: ALL_MODELS,
    },
    BuiltinRule {
        id: "meta-last-modified-required",
        name: "Last-modified timestamp required",
        description: "Metadata must record when the document was last modified",
        category: RuleCategory::Metadata,
        severity: Severity::Error,
        rule_type: RuleType::RequiredField,
        field_path: "metadata/last-modified",
        constraint: "",
        models: ALL_MODELS,
    },
    BuiltinRule {
        id: "meta-version-required",
        name: "Document version required",
        description: "Metadata must carry the document version",
        category: RuleCategory::Metadata,
        severity: Severity::Error,
        rule_type: RuleType::RequiredField,
        field_path: "metadata/version",
        constraint: "",
        models: ALL_MODELS,
    },
    BuiltinRule {
        id: "meta-oscal-version-required",
        name: "OSCAL version required",
        description: "Metadata must name the OSCAL version the document conforms to",
        category: RuleCategory::Metadata,
        severity: Severity::Error,
        rule_type: RuleType::RequiredField,
        field_path: "metadata/oscal-version",
        constraint: "",
        models: ALL_MODELS,
    },
    BuiltinRule {
        id: "meta-oscal-version-format",
        name: "OSCAL version format",
        description: "The OSCAL version should be a 1.x semantic version",
        category: RuleCategory::Metadata,
        severity: Severity::Warning,
        rule_type: RuleType::PatternMatch,
        field_path: "metadata/oscal-version",
        constraint: r"^1\.\d+\.\d+$",
        models: ALL_MODELS,
    },
    BuiltinRule {
        id: "meta-last-modified-format",
        name: "Last-modified timestamp format",
        description: "Timestamps must be RFC 3339 date-times with a timezone",
        category: RuleCategory::Metadata,
        severity: Severity::Warning,
        rule_type: RuleType::PatternMatch,
        field_path: "metadata/last-modified",
        constraint: DATETIME_PATTERN,
        models: ALL_MODELS,
    },
    BuiltinRule {
        id: "meta-party-type",
        name: "Party type",
        description: "A party is either a person or an organization",
        category: RuleCategory::Metadata,
        severity: Severity::Error,
        rule_type: RuleType::AllowedValues,
        field_path: "metadata/party/type",
        constraint: "person,organization",
        models: ALL_MODELS,
    },
    // Identifiers
    BuiltinRule {
        id: "id-document-uuid-format",
        name: "Document UUID format",
        description: "The document UUID must be an RFC 4122 version 4 or 5 UUID",
        category: RuleCategory::Identifiers,
        severity: Severity::Error,
        rule_type: RuleType::PatternMatch,
        field_path: "uuid",
        constraint: UUID_PATTERN,
        models: ALL_MODELS,
    },
    BuiltinRule {
        id: "id-party-uuid-unique",
        name: "Party UUIDs unique",
        description: "No two parties may share a UUID",
        category: RuleCategory::Identifiers,
        severity: Severity::Error,
        rule_type: RuleType::UniqueValues,
        field_path: "metadata/party/uuid",
        constraint: "",
        models: ALL_MODELS,
    },
    BuiltinRule {
        id: "id-control-id-unique",
        name: "Control identifiers unique",
        description: "No two controls in a catalog may share an id",
        category: RuleCategory::Identifiers,
        severity: Severity::Error,
        rule_type: RuleType::UniqueValues,
        field_path: "**/control/id",
        constraint: "",
        models: &[Catalog],
    },
    BuiltinRule {
        id: "id-group-id-unique",
        name: "Group identifiers unique",
        description: "No two groups in a catalog may share an id",
        category: RuleCategory::Identifiers,
        severity: Severity::Error,
        rule_type: RuleType::UniqueValues,
        field_path: "**/group/id",
        constraint: "",
        models: &[Catalog],
    },
    BuiltinRule {
        id: "id-control-id-format",
        name: "Control identifier format",
        description: "Control ids should be lowercase tokens such as ac-2.1",
        category: RuleCategory::Identifiers,
        severity: Severity::Warning,
        rule_type: RuleType::PatternMatch,
        field_path: "**/control/id",
        constraint: r"^[a-z][a-z0-9_\-.]*$",
        models: &[Catalog],
    },
    // Security controls
    BuiltinRule {
        id: "ctrl-title-required",
        name: "Control title required",
        description: "Every control must have a title",
        category: RuleCategory::SecurityControls,
        severity: Severity::Error,
        rule_type: RuleType::RequiredField,
        field_path: "**/control/title",
        constraint: "",
        models: &[Catalog],
    },
    BuiltinRule {
        id: "ctrl-catalog-has-controls",
        name: "Catalog defines controls",
        description: "A catalog should define at least one control",
        category: RuleCategory::SecurityControls,
        severity: Severity::Warning,
        rule_type: RuleType::Cardinality,
        field_path: "**/control",
        constraint: "min=1",
        models: &[Catalog],
    },
    BuiltinRule {
        id: "ctrl-param-id-required",
        name: "Parameter id required",
        description: "Every parameter must have an id",
        category: RuleCategory::SecurityControls,
        severity: Severity::Error,
        rule_type: RuleType::RequiredField,
        field_path: "**/param/id",
        constraint: "",
        models: CONTROL_MODELS,
    },
    BuiltinRule {
        id: "ctrl-part-name-required",
        name: "Part name required",
        description: "Every control part must have a name",
        category: RuleCategory::SecurityControls,
        severity: Severity::Error,
        rule_type: RuleType::RequiredField,
        field_path: "**/part/name",
        constraint: "",
        models: CONTROL_MODELS,
    },
    // Structural
    BuiltinRule {
        id: "struct-single-metadata",
        name: "Single metadata section",
        description: "A document has exactly one metadata section",
        category: RuleCategory::Structural,
        severity: Severity::Error,
        rule_type: RuleType::Cardinality,
        field_path: "metadata",
        constraint: "min=1,max=1",
        models: ALL_MODELS,
    },
    BuiltinRule {
        id: "struct-prop-name-required",
        name: "Property name required",
        description: "Every property must have a name",
        category: RuleCategory::Structural,
        severity: Severity::Error,
        rule_type: RuleType::RequiredField,
        field_path: "**/prop/name",
        constraint: "",
        models: ALL_MODELS,
    },
    BuiltinRule {
        id: "struct-resource-uuid-required",
        name: "Back-matter resource UUID required",
        description: "Every back-matter resource must have a UUID",
        category: RuleCategory::Structural,
        severity: Severity::Error,
        rule_type: RuleType::RequiredField,
        field_path: "back-matter/resource/uuid",
        constraint: "",
        models: ALL_MODELS,
    },
    // References
    BuiltinRule {
        id: "ref-link-href-required",
        name: "Link target required",
        description: "Every link must have an href",
        category: RuleCategory::References,
        severity: Severity::Error,
        rule_type: RuleType::RequiredField,
        field_path: "**/link/href",
        constraint: "",
        models: ALL_MODELS,
    },
    BuiltinRule {
        id: "ref-internal-links-resolve",
        name: "Internal links resolve",
        description: "Fragment links (#id) must name an id or uuid in the document",
        category: RuleCategory::References,
        severity: Severity::Warning,
        rule_type: RuleType::IdReference,
        field_path: "**/link/href",
        constraint: "",
        models: ALL_MODELS,
    },
    BuiltinRule {
        id: "ref-responsible-party-role",
        name: "Responsible party role required",
        description: "A responsible party must reference a role",
        category: RuleCategory::References,
        severity: Severity::Error,
        rule_type: RuleType::RequiredField,
        field_path: "metadata/responsible-party/role-id",
        constraint: "",
        models: ALL_MODELS,
    },
    // Profile
    BuiltinRule {
        id: "prof-import-required",
        name: "Profile imports a source",
        description: "A profile must import at least one catalog or profile",
        category: RuleCategory::Profile,
        severity: Severity::Error,
        rule_type: RuleType::Cardinality,
        field_path: "import",
        constraint: "min=1",
        models: &[Profile],
    },
    BuiltinRule {
        id: "prof-import-href-required",
        name: "Import target required",
        description: "Every profile import must have an href",
        category: RuleCategory::Profile,
        severity: Severity::Error,
        rule_type: RuleType::RequiredField,
        field_path: "import/href",
        constraint: "",
        models: &[Profile],
    },
    BuiltinRule {
        id: "prof-merge-combine-method",
        name: "Merge combine method",
        description: "The combine method must be one of the defined strategies",
        category: RuleCategory::Profile,
        severity: Severity::Warning,
        rule_type: RuleType::AllowedValues,
        field_path: "merge/combine/method",
        constraint: "use-first,merge,keep",
        models: &[Profile],
    },
    // Component definition
    BuiltinRule {
        id: "comp-component-present",
        name: "Component present",
        description: "A component definition should define at least one component",
        category: RuleCategory::Component,
        severity: Severity::Warning,
        rule_type: RuleType::Cardinality,
        field_path: "component",
        constraint: "min=1",
        models: &[ComponentDefinition],
    },
    BuiltinRule {
        id: "comp-type-required",
        name: "Component type required",
        description: "Every component must declare its type",
        category: RuleCategory::Component,
        severity: Severity::Error,
        rule_type: RuleType::RequiredField,
        field_path: "component/type",
        constraint: "",
        models: &[ComponentDefinition],
    },
    BuiltinRule {
        id: "comp-implementation-source",
        name: "Control implementation source",
        description: "A control implementation must name its source catalog or profile",
        category: RuleCategory::Component,
        severity: Severity::Error,
        rule_type: RuleType::RequiredField,
        field_path: "component/control-implementation/source",
        constraint: "",
        models: &[ComponentDefinition],
    },
    // System security plan
    BuiltinRule {
        id: "ssp-import-profile",
        name: "SSP imports a profile",
        description: "An SSP imports exactly one profile baseline",
        category: RuleCategory::Ssp,
        severity: Severity::Error,
        rule_type: RuleType::Cardinality,
        field_path: "import-profile",
        constraint: "min=1,max=1",
        models: &[SystemSecurityPlan],
    },
    BuiltinRule {
        id: "ssp-system-characteristics",
        name: "System characteristics present",
        description: "An SSP describes its system characteristics exactly once",
        category: RuleCategory::Ssp,
        severity: Severity::Error,
        rule_type: RuleType::Cardinality,
        field_path: "system-characteristics",
        constraint: "min=1,max=1",
        models: &[SystemSecurityPlan],
    },
    BuiltinRule {
        id: "ssp-system-implementation",
        name: "System implementation present",
        description: "An SSP describes its system implementation exactly once",
        category: RuleCategory::Ssp,
        severity: Severity::Error,
        rule_type: RuleType::Cardinality,
        field_path: "system-implementation",
        constraint: "min=1,max=1",
        models: &[SystemSecurityPlan],
    },
    BuiltinRule {
        id: "ssp-control-implementation",
        name: "Control implementation present",
        description: "An SSP documents its control implementation exactly once",
        category: RuleCategory::Ssp,
        severity: Severity::Error,
        rule_type: RuleType::Cardinality,
        field_path: "control-implementation",
        constraint: "min=1,max=1",
        models: &[SystemSecurityPlan],
    },
    BuiltinRule {
        id: "ssp-sensitivity-level",
        name: "Security sensitivity level",
        description: "The sensitivity level should be a FIPS 199 impact level",
        category: RuleCategory::Ssp,
        severity: Severity::Warning,
        rule_type: RuleType::AllowedValues,
        field_path: "system-characteristics/security-sensitivity-level",
        constraint: "low,moderate,high,fips-199-low,fips-199-moderate,fips-199-high",
        models: &[SystemSecurityPlan],
    },
    // Assessment
    BuiltinRule {
        id: "assess-import-ssp",
        name: "Assessment imports an SSP",
        description: "Assessment plans and POA&Ms reference exactly one SSP",
        category: RuleCategory::Assessment,
        severity: Severity::Error,
        rule_type: RuleType::Cardinality,
        field_path: "import-ssp",
        constraint: "min=1,max=1",
        models: &[AssessmentPlan, PlanOfActionAndMilestones],
    },
    BuiltinRule {
        id: "assess-import-ap",
        name: "Results import a plan",
        description: "Assessment results reference exactly one assessment plan",
        category: RuleCategory::Assessment,
        severity: Severity::Error,
        rule_type: RuleType::Cardinality,
        field_path: "import-ap",
        constraint: "min=1,max=1",
        models: &[AssessmentResults],
    },
    BuiltinRule {
        id: "assess-result-present",
        name: "Result present",
        description: "Assessment results contain at least one result",
        category: RuleCategory::Assessment,
        severity: Severity::Error,
        rule_type: RuleType::Cardinality,
        field_path: "result",
        constraint: "min=1",
        models: &[AssessmentResults],
    },
    BuiltinRule {
        id: "assess-poam-items-present",
        name: "POA&M items present",
        description: "A plan of action and milestones lists at least one item",
        category: RuleCategory::Assessment,
        severity: Severity::Error,
        rule_type: RuleType::Cardinality,
        field_path: "poam-item",
        constraint: "min=1",
        models: &[PlanOfActionAndMilestones],
    },
    BuiltinRule {
        id: "assess-finding-status",
        name: "Finding objective status",
        description: "A finding target's status is either satisfied or not-satisfied",
        category: RuleCategory::Assessment,
        severity: Severity::Error,
        rule_type: RuleType::AllowedValues,
        field_path: "**/finding/target/status/state",
        constraint: "satisfied,not-satisfied",
        models: ASSESSMENT_MODELS,
    },
];

/// Immutable set of built-in rules, in authoring order.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    rules: Vec<ValidationRule>,
}

impl RuleCatalog {
    /// Materialize the built-in table.
    pub fn builtin() -> Self {
        let rules = BUILTIN_RULES
            .iter()
            .map(|r| ValidationRule {
                id: r.id.to_string(),
                name: r.name.to_string(),
                description: r.description.to_string(),
                category: r.category,
                severity: r.severity,
                rule_type: r.rule_type,
                field_path: r.field_path.to_string(),
                constraint_details: r.constraint.to_string(),
                applicable_model_types: r.models.iter().copied().collect::<BTreeSet<_>>(),
                is_built_in: true,
                enabled: true,
            })
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    pub fn for_model_type(&self, model_type: ModelType) -> impl Iterator<Item = &ValidationRule> {
        self.rules.iter().filter(move |r| r.applies_to(model_type))
    }

    pub fn get(&self, id: &str) -> Option<&ValidationRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
