//! Merge of the built-in catalog with stored custom rules.
//!
//! Custom records are coerced, never rejected: unknown rule types become
//! `CUSTOM`, unknown severities `WARNING`, unknown categories `structural`,
//! and unknown model types are dropped. A missing model-type list yields an
//! empty applicability set, so such a rule never matches a model type.

use super::{
    RuleCatalog, RuleCategory, RuleType, ValidationRule, ValidationRuleCategory,
    ValidationRulesResponse,
};
use crate::collaborators::{CustomRuleRecord, CustomRuleStore};
use crate::model_type::ModelType;
use crate::validation::Severity;
use log::{debug, warn};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Combines the built-in catalog with a custom rule source.
#[derive(Clone)]
pub struct RuleMerger {
    catalog: Arc<RuleCatalog>,
    store: Arc<dyn CustomRuleStore>,
}

impl RuleMerger {
    pub fn new(catalog: Arc<RuleCatalog>, store: Arc<dyn CustomRuleStore>) -> Self {
        Self { catalog, store }
    }

    /// Built-in rules followed by every stored custom rule.
    pub fn get_all_rules(&self) -> ValidationRulesResponse {
        let custom = self.store.all_custom_rules().unwrap_or_else(|e| {
            warn!("Custom rules unavailable, using built-in rules only: {}", e);
            Vec::new()
        });

        let rules = merge(self.catalog.rules().iter().cloned(), custom, |_| true);
        respond(rules, false)
    }

    /// Built-in and enabled custom rules applicable to `model_type`.
    pub fn get_rules_for_model_type(&self, model_type: ModelType) -> ValidationRulesResponse {
        let custom = self
            .store
            .custom_rules_for_model_type(model_type.as_str())
            .unwrap_or_else(|e| {
                warn!("Custom rules unavailable, using built-in rules only: {}", e);
                Vec::new()
            });

        let rules = merge(
            self.catalog.for_model_type(model_type).cloned(),
            custom,
            |rule| rule.enabled && rule.applies_to(model_type),
        );
        debug!("{} rules apply to {}", rules.len(), model_type);
        respond(rules, true)
    }

    /// The fixed category descriptors, without rules.
    pub fn get_categories(&self) -> Vec<ValidationRuleCategory> {
        RuleCategory::ALL
            .into_iter()
            .map(ValidationRuleCategory::descriptor)
            .collect()
    }
}

fn merge(
    builtin: impl Iterator<Item = ValidationRule>,
    custom: Vec<CustomRuleRecord>,
    keep: impl Fn(&ValidationRule) -> bool,
) -> Vec<ValidationRule> {
    let mut rules: Vec<ValidationRule> = builtin.collect();
    let mut ids: HashSet<String> = rules.iter().map(|r| r.id.clone()).collect();

    for record in custom {
        let rule = convert_custom_rule(record);
        if !keep(&rule) {
            continue;
        }
        if !ids.insert(rule.id.clone()) {
            warn!("Dropping custom rule '{}': id already in use", rule.id);
            continue;
        }
        rules.push(rule);
    }
    rules
}

/// Project a stored record onto a rule, coercing malformed metadata.
pub fn convert_custom_rule(record: CustomRuleRecord) -> ValidationRule {
    let applicable_model_types: BTreeSet<ModelType> = match record.applicable_model_types {
        Some(types) => types
            .iter()
            .filter_map(|t| {
                let recognized = ModelType::recognize(t);
                if recognized.is_none() {
                    debug!("Rule '{}': ignoring unknown model type '{}'", record.rule_id, t);
                }
                recognized
            })
            .collect(),
        None => BTreeSet::new(),
    };

    ValidationRule {
        id: record.rule_id,
        name: record.name,
        description: record.description,
        category: RuleCategory::coerce(&record.category),
        severity: Severity::coerce(&record.severity),
        rule_type: RuleType::coerce(&record.rule_type),
        field_path: record.field_path,
        constraint_details: record.constraint_details,
        applicable_model_types,
        is_built_in: false,
        enabled: record.enabled,
    }
}

/// Group rules into categories in the fixed category order.
fn respond(rules: Vec<ValidationRule>, omit_empty: bool) -> ValidationRulesResponse {
    let categories = RuleCategory::ALL
        .into_iter()
        .map(|category| {
            let mut grouped = ValidationRuleCategory::descriptor(category);
            grouped.rules = rules
                .iter()
                .filter(|r| r.category == category)
                .cloned()
                .collect();
            grouped
        })
        .filter(|c| !omit_empty || !c.rules.is_empty())
        .collect();

    ValidationRulesResponse { rules, categories }
}
