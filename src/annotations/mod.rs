//! Annotation collector (§3 "Annotations", §4.3).
//!
//! `# METADATA` comment blocks attach to the rule or package immediately
//! following them. `AnnotationSet` answers two questions: `chain(rule)` (the
//! ordered, unmerged list of annotations that apply, provenance intact) and
//! `resolve(rule)` (the single merged view, nearer scope wins per field).

mod yaml_lite;

use crate::location::SourceLoc;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use yaml_lite::{parse_lines, YamlLiteError, YamlValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scope {
    Rule,
    Document,
    Package,
    Subpackages,
}

impl Scope {
    fn parse(s: &str) -> Option<Scope> {
        match s {
            "rule" => Some(Scope::Rule),
            "document" => Some(Scope::Document),
            "package" => Some(Scope::Package),
            "subpackages" => Some(Scope::Subpackages),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaRef {
    Ref(String),
    Inline(Json),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaEntry {
    pub path: String,
    pub schema: SchemaRef,
}

/// A single parsed metadata block (§3 "Annotations").
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub scope: Scope,
    pub title: Option<String>,
    pub description: Option<String>,
    pub organizations: Vec<String>,
    pub related_resources: Vec<String>,
    pub authors: Vec<String>,
    pub schemas: Vec<SchemaEntry>,
    pub custom: BTreeMap<String, Json>,
    pub location: SourceLoc,
    /// Package path this annotation is attached under.
    pub package_path: Vec<Arc<str>>,
    /// Set for `Rule`/`Document` scope: the ref name the rule(s) share.
    pub rule_name: Option<Arc<str>>,
    /// Set only for `Rule` scope: the specific rule's source order, so a
    /// rule-scoped annotation never leaks onto a sibling rule of the same
    /// name.
    pub rule_order: Option<usize>,
}

#[derive(Debug, Error, PartialEq)]
pub enum AnnotationError {
    #[error("metadata block must start with \"# METADATA\"")]
    MissingHeader,
    #[error("unknown scope {0:?}")]
    UnknownScope(String),
    #[error(transparent)]
    Yaml(#[from] YamlLiteError),
}

impl Annotation {
    /// Parses a `# METADATA` block's body lines (header already consumed,
    /// leading `# ` already stripped from each line) and attaches it to the
    /// given package/rule context.
    pub fn from_block(
        body_lines: &[&str],
        location: SourceLoc,
        package_path: Vec<Arc<str>>,
        rule_name: Option<Arc<str>>,
        rule_order: Option<usize>,
    ) -> Result<Self, AnnotationError> {
        let map = parse_lines(body_lines)?;

        let scope_str = map
            .get("scope")
            .and_then(YamlValue::as_scalar)
            .unwrap_or("rule");
        let scope = Scope::parse(scope_str).ok_or_else(|| AnnotationError::UnknownScope(scope_str.to_string()))?;

        let title = map.get("title").and_then(YamlValue::as_scalar).map(str::to_string);
        let description = map
            .get("description")
            .and_then(YamlValue::as_scalar)
            .map(str::to_string);

        let organizations = string_list(&map, "organizations");
        let authors = string_list(&map, "authors");
        let related_resources = map
            .get("related_resources")
            .and_then(YamlValue::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match item {
                        YamlValue::Scalar(s) => Some(s.clone()),
                        YamlValue::Map(m) => m.get("ref").and_then(YamlValue::as_scalar).map(str::to_string),
                        YamlValue::List(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let schemas = map
            .get("schemas")
            .and_then(YamlValue::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(YamlValue::as_map)
                    .flat_map(|entry| {
                        entry.iter().map(|(path, v)| {
                            let schema = match v {
                                YamlValue::Scalar(s) => SchemaRef::Ref(s.clone()),
                                _ => SchemaRef::Inline(Json::Null),
                            };
                            SchemaEntry {
                                path: path.clone(),
                                schema,
                            }
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let custom = map
            .get("custom")
            .and_then(YamlValue::as_map)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), yaml_to_json(v))).collect())
            .unwrap_or_default();

        // Rule-scoped annotations only ever apply to the rule immediately
        // following them; document scope widens to "all rules with this ref".
        let rule_order = if scope == Scope::Rule { rule_order } else { None };

        Ok(Annotation {
            scope,
            title,
            description,
            organizations,
            related_resources,
            authors,
            schemas,
            custom,
            location,
            package_path,
            rule_name,
            rule_order,
        })
    }
}

fn string_list(map: &BTreeMap<String, YamlValue>, key: &str) -> Vec<String> {
    map.get(key)
        .and_then(YamlValue::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(YamlValue::as_scalar)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn yaml_to_json(v: &YamlValue) -> Json {
    match v {
        YamlValue::Scalar(s) => Json::String(s.clone()),
        YamlValue::List(items) => Json::Array(items.iter().map(yaml_to_json).collect()),
        YamlValue::Map(m) => {
            Json::Object(m.iter().map(|(k, v)| (k.clone(), yaml_to_json(v))).collect())
        }
    }
}

/// Identifies the rule a `Chain`/`Resolve` query is about.
#[derive(Debug, Clone)]
pub struct RuleRef {
    pub package_path: Vec<Arc<str>>,
    pub rule_name: Arc<str>,
    pub rule_order: usize,
}

/// All annotations parsed from a compilation (§4.3).
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    items: Vec<Annotation>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        AnnotationSet::default()
    }

    pub fn push(&mut self, annotation: Annotation) {
        self.items.push(annotation);
    }

    /// Ordered list of annotations applicable to `rule_ref`: rule, then
    /// document, then package, then subpackages scopes walking up the
    /// package tree nearest-ancestor first (§4.3).
    pub fn chain(&self, rule_ref: &RuleRef) -> Vec<&Annotation> {
        let mut rule_scoped = Vec::new();
        let mut document_scoped = Vec::new();
        let mut package_scoped = Vec::new();
        let mut subpackage_scoped = Vec::new();

        for ann in &self.items {
            match ann.scope {
                Scope::Rule
                    if ann.package_path == rule_ref.package_path
                        && ann.rule_name.as_deref() == Some(&*rule_ref.rule_name)
                        && ann.rule_order == Some(rule_ref.rule_order) =>
                {
                    rule_scoped.push(ann);
                }
                Scope::Document
                    if ann.package_path == rule_ref.package_path
                        && ann.rule_name.as_deref() == Some(&*rule_ref.rule_name) =>
                {
                    document_scoped.push(ann);
                }
                Scope::Package if ann.package_path == rule_ref.package_path => {
                    package_scoped.push(ann);
                }
                Scope::Subpackages if is_prefix(&ann.package_path, &rule_ref.package_path) => {
                    subpackage_scoped.push(ann);
                }
                _ => {}
            }
        }

        // Nearest ancestor first: longer (more specific) package paths sort
        // before shorter ones.
        subpackage_scoped.sort_by(|a, b| b.package_path.len().cmp(&a.package_path.len()));

        let mut chain = Vec::new();
        chain.append(&mut rule_scoped);
        chain.append(&mut document_scoped);
        chain.append(&mut package_scoped);
        chain.append(&mut subpackage_scoped);
        chain
    }

    /// Merges `chain(rule_ref)` into a single view: scalar fields overwrite,
    /// list/map fields overwrite wholesale (never union), nearer scope wins
    /// (§4.3 "Merging is per-field").
    pub fn resolve(&self, rule_ref: &RuleRef) -> Option<Annotation> {
        let chain = self.chain(rule_ref);
        let mut iter = chain.into_iter().rev();
        let mut merged = iter.next()?.clone();
        for overlay in iter {
            merge_field(&mut merged, overlay);
        }
        Some(merged)
    }

    /// All annotations, sorted by package path then location (§4.3 "Flatten").
    pub fn flatten(&self) -> Vec<&Annotation> {
        let mut all: Vec<&Annotation> = self.items.iter().collect();
        all.sort_by(|a, b| {
            a.package_path
                .cmp(&b.package_path)
                .then_with(|| a.location.cmp(&b.location))
        });
        all
    }
}

fn is_prefix(prefix: &[Arc<str>], path: &[Arc<str>]) -> bool {
    path.len() >= prefix.len() && path[..prefix.len()] == *prefix
}

fn merge_field(base: &mut Annotation, overlay: &Annotation) {
    if overlay.title.is_some() {
        base.title = overlay.title.clone();
    }
    if overlay.description.is_some() {
        base.description = overlay.description.clone();
    }
    if !overlay.organizations.is_empty() {
        base.organizations = overlay.organizations.clone();
    }
    if !overlay.related_resources.is_empty() {
        base.related_resources = overlay.related_resources.clone();
    }
    if !overlay.authors.is_empty() {
        base.authors = overlay.authors.clone();
    }
    if !overlay.schemas.is_empty() {
        base.schemas = overlay.schemas.clone();
    }
    if !overlay.custom.is_empty() {
        base.custom = overlay.custom.clone();
    }
}
