//! Validation rules: the built-in catalog, the merge with custom rules, and
//! rule evaluation against a decoded document.

pub mod catalog;
pub mod evaluate;
pub mod merge;

pub use catalog::RuleCatalog;
pub use evaluate::evaluate;
pub use merge::RuleMerger;

use crate::model_type::ModelType;
use crate::validation::Severity;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a rule's constraint is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    RequiredField,
    PatternMatch,
    AllowedValues,
    Cardinality,
    UniqueValues,
    IdReference,
    Custom,
}

impl RuleType {
    fn recognize(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "REQUIRED_FIELD" => Some(RuleType::RequiredField),
            "PATTERN_MATCH" => Some(RuleType::PatternMatch),
            "ALLOWED_VALUES" => Some(RuleType::AllowedValues),
            "CARDINALITY" => Some(RuleType::Cardinality),
            "UNIQUE_VALUES" => Some(RuleType::UniqueValues),
            "ID_REFERENCE" => Some(RuleType::IdReference),
            "CUSTOM" => Some(RuleType::Custom),
            _ => None,
        }
    }

    /// Total conversion from stored strings; unknown values become `Custom`.
    pub fn coerce(s: &str) -> Self {
        RuleType::recognize(s).unwrap_or_else(|| {
            warn!("Unknown rule type '{}', defaulting to CUSTOM", s);
            RuleType::Custom
        })
    }
}

/// Fixed set of rule categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleCategory {
    Metadata,
    SecurityControls,
    Identifiers,
    References,
    Structural,
    Profile,
    Component,
    Ssp,
    Assessment,
}

impl RuleCategory {
    pub const ALL: [RuleCategory; 9] = [
        RuleCategory::Metadata,
        RuleCategory::SecurityControls,
        RuleCategory::Identifiers,
        RuleCategory::References,
        RuleCategory::Structural,
        RuleCategory::Profile,
        RuleCategory::Component,
        RuleCategory::Ssp,
        RuleCategory::Assessment,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            RuleCategory::Metadata => "metadata",
            RuleCategory::SecurityControls => "security-controls",
            RuleCategory::Identifiers => "identifiers",
            RuleCategory::References => "references",
            RuleCategory::Structural => "structural",
            RuleCategory::Profile => "profile",
            RuleCategory::Component => "component",
            RuleCategory::Ssp => "ssp",
            RuleCategory::Assessment => "assessment",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RuleCategory::Metadata => "Metadata",
            RuleCategory::SecurityControls => "Security Controls",
            RuleCategory::Identifiers => "Identifiers",
            RuleCategory::References => "References",
            RuleCategory::Structural => "Structural",
            RuleCategory::Profile => "Profile",
            RuleCategory::Component => "Component Definition",
            RuleCategory::Ssp => "System Security Plan",
            RuleCategory::Assessment => "Assessment",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RuleCategory::Metadata => "Document metadata such as title, version and parties",
            RuleCategory::SecurityControls => "Control definitions, parameters and parts",
            RuleCategory::Identifiers => "UUID and identifier formats and uniqueness",
            RuleCategory::References => "Links and references resolving within the document",
            RuleCategory::Structural => "Overall document shape and required sections",
            RuleCategory::Profile => "Profile imports, merges and modifications",
            RuleCategory::Component => "Component definitions and control implementations",
            RuleCategory::Ssp => "System characteristics and implementation of the SSP",
            RuleCategory::Assessment => "Assessment plans, results and POA&M items",
        }
    }

    fn recognize(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        RuleCategory::ALL
            .into_iter()
            .find(|c| c.id() == normalized)
    }

    /// Total conversion from stored strings; unknown values become
    /// `Structural`.
    pub fn coerce(s: &str) -> Self {
        RuleCategory::recognize(s).unwrap_or_else(|| {
            warn!("Unknown rule category '{}', defaulting to structural", s);
            RuleCategory::Structural
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: RuleCategory,
    pub severity: Severity,
    pub rule_type: RuleType,
    pub field_path: String,
    pub constraint_details: String,
    pub applicable_model_types: BTreeSet<ModelType>,
    pub is_built_in: bool,
    pub enabled: bool,
}

impl ValidationRule {
    pub fn applies_to(&self, model_type: ModelType) -> bool {
        self.applicable_model_types.contains(&model_type)
    }
}

/// A category descriptor together with the rules that fell into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRuleCategory {
    pub id: String,
    pub name: String,
    pub description: String,
    pub rules: Vec<ValidationRule>,
}

impl ValidationRuleCategory {
    pub fn descriptor(category: RuleCategory) -> Self {
        Self {
            id: category.id().to_string(),
            name: category.name().to_string(),
            description: category.description().to_string(),
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRulesResponse {
    pub rules: Vec<ValidationRule>,
    pub categories: Vec<ValidationRuleCategory>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_type_coercion() {
        assert_eq!(RuleType::coerce("pattern_match"), RuleType::PatternMatch);
        assert_eq!(RuleType::coerce("ID-REFERENCE"), RuleType::IdReference);
        assert_eq!(RuleType::coerce("BOGUS"), RuleType::Custom);
        assert_eq!(RuleType::coerce(""), RuleType::Custom);
    }

    #[test]
    fn test_category_coercion() {
        assert_eq!(
            RuleCategory::coerce("security_controls"),
            RuleCategory::SecurityControls
        );
        assert_eq!(RuleCategory::coerce("SSP"), RuleCategory::Ssp);
        assert_eq!(RuleCategory::coerce("whatever"), RuleCategory::Structural);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&RuleType::RequiredField).unwrap(),
            "\"REQUIRED_FIELD\""
        );
        assert_eq!(
            serde_json::to_string(&RuleCategory::SecurityControls).unwrap(),
            "\"security-controls\""
        );
    }
}
