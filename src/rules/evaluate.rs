//! Rule evaluation against a decoded document.

use super::{RuleType, ValidationRule};
use crate::document::{CanonicalDocument, Node};
use crate::validation::ValidationFinding;
use log::{debug, warn};
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Something a field path resolved to.
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Element(&'a Node),
    Attribute(&'a str),
}

impl<'a> Target<'a> {
    fn value(&self) -> Option<&'a str> {
        match self {
            Target::Element(node) => node.text.as_deref(),
            Target::Attribute(value) => Some(value),
        }
    }
}

/// Evaluate enabled `rules` against `doc`. Rules whose constraint cannot be
/// interpreted are skipped.
pub fn evaluate(doc: &CanonicalDocument, rules: &[ValidationRule]) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();
    for rule in rules.iter().filter(|r| r.enabled) {
        match evaluate_rule(doc, rule) {
            Ok(mut found) => findings.append(&mut found),
            Err(reason) => warn!("Skipping rule '{}': {}", rule.id, reason),
        }
    }
    findings
}

fn evaluate_rule(
    doc: &CanonicalDocument,
    rule: &ValidationRule,
) -> Result<Vec<ValidationFinding>, String> {
    let segments: Vec<&str> = rule
        .field_path
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() && rule.rule_type != RuleType::Custom {
        return Err("empty field path".to_string());
    }

    let findings = match rule.rule_type {
        RuleType::RequiredField => required_field(doc, rule, &segments),
        RuleType::PatternMatch => {
            let pattern = Regex::new(&rule.constraint_details)
                .map_err(|e| format!("invalid pattern: {}", e))?;
            values(doc, &segments)
                .into_iter()
                .filter(|value| !pattern.is_match(value))
                .map(|value| {
                    finding(rule, format!("'{}' does not match {}", value, pattern.as_str()))
                })
                .collect()
        }
        RuleType::AllowedValues => {
            let allowed: Vec<&str> = rule
                .constraint_details
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if allowed.is_empty() {
                return Err("no allowed values given".to_string());
            }
            values(doc, &segments)
                .into_iter()
                .filter(|value| !allowed.contains(value))
                .map(|value| {
                    finding(
                        rule,
                        format!("'{}' is not one of: {}", value, allowed.join(", ")),
                    )
                })
                .collect()
        }
        RuleType::Cardinality => {
            let (min, max) = parse_bounds(&rule.constraint_details)?;
            let count = resolve(&doc.root, &segments).len();
            let too_few = min.is_some_and(|min| count < min);
            let too_many = max.is_some_and(|max| count > max);
            if too_few || too_many {
                vec![finding(
                    rule,
                    format!(
                        "found {} occurrence(s), expected {}",
                        count,
                        describe_bounds(min, max)
                    ),
                )]
            } else {
                Vec::new()
            }
        }
        RuleType::UniqueValues => {
            let mut seen: HashMap<&str, usize> = HashMap::new();
            for value in values(doc, &segments) {
                *seen.entry(value).or_default() += 1;
            }
            let mut duplicates: Vec<(&str, usize)> =
                seen.into_iter().filter(|(_, n)| *n > 1).collect();
            duplicates.sort();
            duplicates
                .into_iter()
                .map(|(value, n)| finding(rule, format!("'{}' appears {} times", value, n)))
                .collect()
        }
        RuleType::IdReference => {
            let known = identifiers(doc);
            values(doc, &segments)
                .into_iter()
                .filter_map(|value| value.strip_prefix('#'))
                .filter(|id| !known.contains(id))
                .map(|id| finding(rule, format!("'#{}' does not resolve to any id or uuid", id)))
                .collect()
        }
        RuleType::Custom => {
            debug!("Rule '{}' has custom semantics, not evaluated", rule.id);
            Vec::new()
        }
    };
    Ok(findings)
}

fn required_field(
    doc: &CanonicalDocument,
    rule: &ValidationRule,
    segments: &[&str],
) -> Vec<ValidationFinding> {
    let Some((field, parent_path)) = segments.split_last() else {
        return Vec::new();
    };
    let parents: Vec<&Node> = if parent_path.is_empty() {
        vec![&doc.root]
    } else {
        resolve(&doc.root, parent_path)
            .into_iter()
            .filter_map(|t| match t {
                Target::Element(node) => Some(node),
                Target::Attribute(_) => None,
            })
            .collect()
    };

    parents
        .into_iter()
        .filter(|parent| !has_field(parent, field))
        .map(|parent| finding(rule, format!("{} is missing '{}'", describe(parent), field)))
        .collect()
}

fn has_field(node: &Node, field: &str) -> bool {
    match field.strip_prefix('@') {
        Some(attr) => node.attribute(attr).is_some(),
        None => {
            node.attribute(field).is_some() || node.children.iter().any(|c| selects(&c.name, field))
        }
    }
}

/// Resolve a field path relative to `root`.
fn resolve<'a>(root: &'a Node, segments: &[&str]) -> Vec<Target<'a>> {
    let mut current: Vec<&'a Node> = vec![root];
    let Some((last, init)) = segments.split_last() else {
        return vec![Target::Element(root)];
    };

    for segment in init {
        current = step(current, segment);
    }

    match *last {
        "**" => step(current, last).into_iter().map(Target::Element).collect(),
        "*" => step(current, last).into_iter().map(Target::Element).collect(),
        last => {
            let mut targets = Vec::new();
            for node in current {
                match last.strip_prefix('@') {
                    Some(attr) => {
                        targets.extend(node.attribute(attr).map(Target::Attribute));
                    }
                    None => {
                        targets.extend(node.attribute(last).map(Target::Attribute));
                        targets.extend(
                            node.children
                                .iter()
                                .filter(|c| selects(&c.name, last))
                                .map(Target::Element),
                        );
                    }
                }
            }
            targets
        }
    }
}

fn step<'a>(current: Vec<&'a Node>, segment: &str) -> Vec<&'a Node> {
    match segment {
        "**" => {
            // Nested starting points share descendants; keep each node once.
            let mut seen: HashSet<*const Node> = HashSet::new();
            let mut all = Vec::new();
            for node in current {
                node.walk(&mut |n| {
                    if seen.insert(n as *const Node) {
                        all.push(n);
                    }
                });
            }
            all
        }
        "*" => current.into_iter().flat_map(|n| n.children.iter()).collect(),
        name => current
            .into_iter()
            .flat_map(|n| n.children.iter().filter(move |c| selects(&c.name, name)))
            .collect(),
    }
}

/// A path segment selects elements of its own name and of its plural, which
/// is how OSCAL JSON and YAML name repeated elements (`controls`, `parties`).
fn selects(name: &str, segment: &str) -> bool {
    if name == segment || name.strip_prefix(segment) == Some("s") {
        return true;
    }
    segment
        .strip_suffix('y')
        .is_some_and(|stem| name.strip_prefix(stem) == Some("ies"))
}

fn values<'a>(doc: &'a CanonicalDocument, segments: &[&str]) -> Vec<&'a str> {
    resolve(&doc.root, segments)
        .into_iter()
        .filter_map(|t| t.value())
        .collect()
}

fn identifiers(doc: &CanonicalDocument) -> HashSet<&str> {
    let mut ids = HashSet::new();
    doc.root.walk(&mut |node| {
        ids.extend(node.field("id"));
        ids.extend(node.field("uuid"));
    });
    ids
}

fn parse_bounds(constraint: &str) -> Result<(Option<usize>, Option<usize>), String> {
    let mut min = None;
    let mut max = None;
    for part in constraint.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| format!("malformed bound '{}'", part))?;
        let value: usize = value
            .trim()
            .parse()
            .map_err(|_| format!("bound '{}' is not a number", part))?;
        match key.trim() {
            "min" => min = Some(value),
            "max" => max = Some(value),
            other => return Err(format!("unknown bound '{}'", other)),
        }
    }
    if min.is_none() && max.is_none() {
        return Err("no bounds given".to_string());
    }
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(format!("min {} exceeds max {}", lo, hi));
        }
    }
    Ok((min, max))
}

fn describe_bounds(min: Option<usize>, max: Option<usize>) -> String {
    match (min, max) {
        (Some(lo), Some(hi)) if lo == hi => format!("exactly {}", lo),
        (Some(lo), Some(hi)) => format!("between {} and {}", lo, hi),
        (Some(lo), None) => format!("at least {}", lo),
        (None, Some(hi)) => format!("at most {}", hi),
        (None, None) => "any number".to_string(),
    }
}

fn describe(node: &Node) -> String {
    match node.field("id").or_else(|| node.field("uuid")) {
        Some(id) => format!("<{} {}>", node.name, id),
        None => format!("<{}>", node.name),
    }
}

fn finding(rule: &ValidationRule, detail: String) -> ValidationFinding {
    ValidationFinding::new(rule.severity, format!("{}: {}", rule.name, detail))
        .with_location(rule.field_path.clone())
        .with_rule(rule.id.clone())
        .with_suggestion(rule.description.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{self, Format};
    use crate::model_type::ModelType;
    use crate::rules::{RuleCatalog, RuleCategory};
    use crate::validation::Severity;
    use std::collections::BTreeSet;

    const CATALOG_XML: &str = r##"<catalog uuid="74c8ba1e-5cd4-4ad1-bbfd-d888e2f6c724">
  <metadata>
    <title>Demo</title>
    <last-modified>2024-01-01T00:00:00Z</last-modified>
    <version>1.0</version>
    <oscal-version>1.1.2</oscal-version>
    <party uuid="0e6f8b2a-3c8d-4b8e-9f5a-1d2c3b4a5e6f" type="organization"/>
  </metadata>
  <group id="ac">
    <title>Access Control</title>
    <control id="ac-1"><title>Policy</title><link href="#ac-2"/></control>
    <control id="ac-2"><title>Accounts</title></control>
  </group>
</catalog>"##;

    fn doc(content: &str) -> CanonicalDocument {
        formats::decode(content, Format::Xml).unwrap()
    }

    fn rule(rule_type: RuleType, path: &str, constraint: &str) -> ValidationRule {
        ValidationRule {
            id: "test-rule".to_string(),
            name: "Test rule".to_string(),
            description: "for tests".to_string(),
            category: RuleCategory::Structural,
            severity: Severity::Error,
            rule_type,
            field_path: path.to_string(),
            constraint_details: constraint.to_string(),
            applicable_model_types: BTreeSet::from([ModelType::Catalog]),
            is_built_in: false,
            enabled: true,
        }
    }

    #[test]
    fn test_builtin_rules_pass_on_clean_catalog() {
        let catalog = RuleCatalog::builtin();
        let rules: Vec<ValidationRule> =
            catalog.for_model_type(ModelType::Catalog).cloned().collect();
        let findings = evaluate(&doc(CATALOG_XML), &rules);
        assert!(findings.is_empty(), "unexpected findings: {:?}", findings);
    }

    #[test]
    fn test_required_field_checks_every_parent() {
        let d = doc(
            r#"<catalog><control id="a"><title>T</title></control><control id="b"/></catalog>"#,
        );
        let findings = evaluate(&d, &[rule(RuleType::RequiredField, "**/control/title", "")]);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("<control b>"));
        assert_eq!(findings[0].rule_id.as_deref(), Some("test-rule"));
    }

    #[test]
    fn test_plain_segment_matches_attribute_or_child() {
        let xml = doc(r#"<catalog uuid="x"/>"#);
        let json = formats::decode(r#"{"catalog": {"uuid": "x"}}"#, Format::Json).unwrap();
        let r = rule(RuleType::AllowedValues, "uuid", "y");
        assert_eq!(evaluate(&xml, &[r.clone()]).len(), 1);
        assert_eq!(evaluate(&json, &[r]).len(), 1);
    }

    #[test]
    fn test_pattern_and_allowed_values() {
        let d = doc(CATALOG_XML);
        let findings = evaluate(&d, &[rule(RuleType::PatternMatch, "**/control/id", r"^ac-1$")]);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("'ac-2'"));

        let parties = rule(RuleType::AllowedValues, "metadata/party/type", "person");
        let findings = evaluate(&d, &[parties]);
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_cardinality() {
        let d = doc(CATALOG_XML);
        let within = rule(RuleType::Cardinality, "**/control", "min=1,max=2");
        assert!(evaluate(&d, &[within]).is_empty());
        let findings = evaluate(&d, &[rule(RuleType::Cardinality, "**/control", "max=1")]);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("at most 1"));
    }

    #[test]
    fn test_unique_values_and_id_reference() {
        let d = doc(
            r##"<catalog><control id="a"><link href="#zz"/></control><control id="a"/></catalog>"##,
        );
        let findings = evaluate(&d, &[rule(RuleType::UniqueValues, "**/control/id", "")]);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("appears 2 times"));

        let findings = evaluate(&d, &[rule(RuleType::IdReference, "**/link/href", "")]);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("#zz"));
    }

    #[test]
    fn test_nested_groups_are_visited_once() {
        let d = doc(concat!(
            r#"<catalog><group id="g1"><group id="g2">"#,
            r#"<control id="c1"/></group></group></catalog>"#,
        ));
        let unique = rule(RuleType::UniqueValues, "**/group/**/control/id", "");
        assert!(evaluate(&d, &[unique]).is_empty());

        let pattern = rule(RuleType::PatternMatch, "**/**/control/id", "^x$");
        assert_eq!(evaluate(&d, &[pattern]).len(), 1);

        let count = rule(RuleType::Cardinality, "**/group/**/control", "max=1");
        assert!(evaluate(&d, &[count]).is_empty());
    }

    #[test]
    fn test_singular_segments_match_plural_collections() {
        let d = formats::decode(
            r##"{"catalog": {
                "uuid": "74c8ba1e-5cd4-4ad1-bbfd-d888e2f6c724",
                "metadata": {"parties": [{"uuid": "p1", "type": "robot"}]},
                "groups": [{"id": "ac", "controls": [
                    {"id": "ac-1", "links": [{"href": "#nowhere"}]},
                    {"id": "ac-1"}
                ]}]
            }}"##,
            Format::Json,
        )
        .unwrap();

        let rules = [
            rule(RuleType::UniqueValues, "**/control/id", ""),
            rule(RuleType::AllowedValues, "metadata/party/type", "organization,person"),
            rule(RuleType::IdReference, "**/link/href", ""),
        ];
        let findings = evaluate(&d, &rules);
        assert_eq!(findings.len(), 3, "{:?}", findings);
        assert!(findings[0].message.contains("'ac-1' appears 2 times"));
        assert!(findings[1].message.contains("'robot'"));
        assert!(findings[2].message.contains("#nowhere"));
    }

    #[test]
    fn test_uninterpretable_rules_are_skipped() {
        let d = doc(CATALOG_XML);
        let rules = vec![
            rule(RuleType::PatternMatch, "uuid", "(["),
            rule(RuleType::Cardinality, "metadata", "min=two"),
            rule(RuleType::Cardinality, "metadata", "min=3,max=1"),
            rule(RuleType::Custom, "", "anything"),
            rule(RuleType::RequiredField, "", ""),
        ];
        assert!(evaluate(&d, &rules).is_empty());
    }

    #[test]
    fn test_disabled_rules_are_ignored() {
        let mut r = rule(RuleType::RequiredField, "missing-section", "");
        assert_eq!(evaluate(&doc(CATALOG_XML), &[r.clone()]).len(), 1);
        r.enabled = false;
        assert!(evaluate(&doc(CATALOG_XML), &[r]).is_empty());
    }
}
