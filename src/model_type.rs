//! OSCAL model types and document classification
//!
//! The model type of a document is decided by its root element name and
//! nothing else.

use crate::document::CanonicalDocument;
use crate::errors::ConverterError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OSCAL model type
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ModelType {
    Catalog,
    Profile,
    SystemSecurityPlan,
    ComponentDefinition,
    AssessmentPlan,
    AssessmentResults,
    PlanOfActionAndMilestones,
}

impl ModelType {
    pub const ALL: [ModelType; 7] = [
        ModelType::Catalog,
        ModelType::Profile,
        ModelType::SystemSecurityPlan,
        ModelType::ComponentDefinition,
        ModelType::AssessmentPlan,
        ModelType::AssessmentResults,
        ModelType::PlanOfActionAndMilestones,
    ];

    /// Root element name, which doubles as the canonical string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Catalog => "catalog",
            ModelType::Profile => "profile",
            ModelType::SystemSecurityPlan => "system-security-plan",
            ModelType::ComponentDefinition => "component-definition",
            ModelType::AssessmentPlan => "assessment-plan",
            ModelType::AssessmentResults => "assessment-results",
            ModelType::PlanOfActionAndMilestones => "plan-of-action-and-milestones",
        }
    }

    /// Lenient lookup: ignores case, surrounding whitespace, and accepts
    /// `_` in place of `-` (so `SYSTEM_SECURITY_PLAN` is recognized).
    pub fn recognize(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        ModelType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
    }

    /// Classify a decoded document by its root element name.
    pub fn classify(doc: &CanonicalDocument) -> Option<Self> {
        ModelType::ALL
            .into_iter()
            .find(|t| t.as_str() == doc.root_name())
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = ConverterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelType::recognize(s).ok_or_else(|| {
            ConverterError::InvalidInput(format!("Unknown OSCAL model type: '{}'", s))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Node;

    #[test]
    fn test_recognize_is_lenient() {
        assert_eq!(ModelType::recognize("catalog"), Some(ModelType::Catalog));
        assert_eq!(ModelType::recognize(" CATALOG "), Some(ModelType::Catalog));
        assert_eq!(
            ModelType::recognize("SYSTEM_SECURITY_PLAN"),
            Some(ModelType::SystemSecurityPlan)
        );
        assert_eq!(
            ModelType::recognize("plan-of-action-and-milestones"),
            Some(ModelType::PlanOfActionAndMilestones)
        );
        assert_eq!(ModelType::recognize("bogus"), None);
        assert!("bogus".parse::<ModelType>().is_err());
    }

    #[test]
    fn test_classify_uses_root_element_only() {
        let doc = CanonicalDocument::new(Node::new("component-definition"));
        assert_eq!(
            ModelType::classify(&doc),
            Some(ModelType::ComponentDefinition)
        );

        // A catalog-looking body under an unknown root is not guessed.
        let doc = CanonicalDocument::new(
            Node::new("bom").with_child(Node::new("metadata")),
        );
        assert_eq!(ModelType::classify(&doc), None);

        // Root names are matched exactly.
        let doc = CanonicalDocument::new(Node::new("Catalog"));
        assert_eq!(ModelType::classify(&doc), None);
    }

    #[test]
    fn test_serde_uses_root_element_names() {
        let json = serde_json::to_string(&ModelType::AssessmentResults).unwrap();
        assert_eq!(json, "\"assessment-results\"");
        for t in ModelType::ALL {
            assert_eq!(ModelType::recognize(t.as_str()), Some(t));
        }
    }
}
