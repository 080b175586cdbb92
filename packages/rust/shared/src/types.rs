//! Core domain types for chaingraph industry graphs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// One of the three fixed tiers of an industry chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Upstream,
    Midstream,
    Downstream,
}

impl Category {
    /// All categories in output order.
    pub const ALL: [Category; 3] = [Self::Upstream, Self::Midstream, Self::Downstream];

    /// Order in which categories claim a name that was planned in more than one of them.
    pub const PRIORITY: [Category; 3] = [Self::Midstream, Self::Downstream, Self::Upstream];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::Midstream => "midstream",
            Self::Downstream => "downstream",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = crate::GraphError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upstream" => Ok(Self::Upstream),
            "midstream" => Ok(Self::Midstream),
            "downstream" => Ok(Self::Downstream),
            other => Err(crate::GraphError::validation(format!(
                "unknown category '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

/// Category → ordered entity names. Insertion order is kept for stable output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    #[serde(default)]
    pub upstream: Vec<String>,
    #[serde(default)]
    pub midstream: Vec<String>,
    #[serde(default)]
    pub downstream: Vec<String>,
}

impl Structure {
    pub fn get(&self, category: Category) -> &[String] {
        match category {
            Category::Upstream => &self.upstream,
            Category::Midstream => &self.midstream,
            Category::Downstream => &self.downstream,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut Vec<String> {
        match category {
            Category::Upstream => &mut self.upstream,
            Category::Midstream => &mut self.midstream,
            Category::Downstream => &mut self.downstream,
        }
    }

    /// The category currently holding `name`, if any.
    pub fn category_of(&self, name: &str) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|c| self.get(*c).iter().any(|n| n == name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.category_of(name).is_some()
    }

    /// Every name across all categories, in output order.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.upstream
            .iter()
            .chain(self.midstream.iter())
            .chain(self.downstream.iter())
    }

    pub fn len(&self) -> usize {
        self.upstream.len() + self.midstream.len() + self.downstream.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove `name` from every category. Returns whether anything was removed.
    pub fn remove_everywhere(&mut self, name: &str) -> bool {
        let mut removed = false;
        for category in Category::ALL {
            let names = self.get_mut(category);
            let before = names.len();
            names.retain(|n| n != name);
            removed |= names.len() != before;
        }
        removed
    }
}

// ---------------------------------------------------------------------------
// Claim fields
// ---------------------------------------------------------------------------

/// The four list fields of a claim bundle that are verified item by item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimField {
    InputElements,
    OutputProducts,
    KeyTechnologies,
    RepresentativeCompanies,
}

impl ClaimField {
    pub const ALL: [ClaimField; 4] = [
        Self::InputElements,
        Self::OutputProducts,
        Self::KeyTechnologies,
        Self::RepresentativeCompanies,
    ];

    /// JSON key of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputElements => "input_elements",
            Self::OutputProducts => "output_products",
            Self::KeyTechnologies => "key_technologies",
            Self::RepresentativeCompanies => "representative_companies",
        }
    }

    /// Claim sentence asserting that `item` belongs to this field of `entity`.
    pub fn claim(&self, entity: &str, item: &str) -> String {
        match self {
            Self::InputElements => format!("{entity}的投入要素包括{item}。"),
            Self::OutputProducts => format!("{entity}的产出产品包括{item}。"),
            Self::KeyTechnologies => format!("{entity}涉及的关键技术包括{item}。"),
            Self::RepresentativeCompanies => format!("{item}是{entity}环节的代表性企业。"),
        }
    }
}

/// Claim sentence used to verify a bundle's description.
pub fn description_claim(entity: &str, description: &str) -> String {
    format!("{entity}的描述: {description}")
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// A retrieved document chunk handed to the verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceDoc {
    /// Full chunk text.
    pub text: String,
    /// Originating document identifier.
    pub source_id: String,
    /// Chunk identifier within the source.
    pub chunk_id: String,
}

/// Pointer to the verbatim text that supports an admitted fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub source_id: String,
    pub chunk_id: String,
    /// Always a literal substring of the source chunk.
    pub excerpt: String,
    pub score: f64,
}

/// A candidate item rejected by verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredItem {
    pub value: String,
    pub reason: String,
    pub score: f64,
}

/// Field → item → evidence, plus the reserved `description` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<EvidenceRef>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, BTreeMap<String, EvidenceRef>>,
}

impl EvidenceDetails {
    pub fn insert(&mut self, field: ClaimField, item: impl Into<String>, evidence: EvidenceRef) {
        self.fields
            .entry(field.as_str().to_string())
            .or_default()
            .insert(item.into(), evidence);
    }

    pub fn get(&self, field: ClaimField, item: &str) -> Option<&EvidenceRef> {
        self.fields.get(field.as_str()).and_then(|m| m.get(item))
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.fields.values().all(|m| m.is_empty())
    }

    /// Add entries from `other` that are not already present.
    fn union(&mut self, other: EvidenceDetails) {
        if self.description.is_none() {
            self.description = other.description;
        }
        for (field, items) in other.fields {
            let target = self.fields.entry(field).or_default();
            for (item, evidence) in items {
                target.entry(item).or_insert(evidence);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ClaimBundle
// ---------------------------------------------------------------------------

/// Verified facts about one entity, as stored in `node_details`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimBundle {
    pub entity_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub input_elements: Vec<String>,
    #[serde(default)]
    pub output_products: Vec<String>,
    #[serde(default)]
    pub key_technologies: Vec<String>,
    #[serde(default)]
    pub representative_companies: Vec<String>,
    #[serde(default)]
    pub evidence_details: EvidenceDetails,
    #[serde(default)]
    pub filtered_items: BTreeMap<String, Vec<FilteredItem>>,
    /// Raw generator output kept when it could not be parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    /// Error marker for placeholder bundles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClaimBundle {
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            ..Default::default()
        }
    }

    /// Bundle persisted when the generator's output could not be parsed.
    pub fn placeholder(
        entity_name: impl Into<String>,
        raw_output: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            entity_name: entity_name.into(),
            description: Some("candidate output could not be parsed".into()),
            raw_output: Some(raw_output.into()),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn field(&self, field: ClaimField) -> &[String] {
        match field {
            ClaimField::InputElements => &self.input_elements,
            ClaimField::OutputProducts => &self.output_products,
            ClaimField::KeyTechnologies => &self.key_technologies,
            ClaimField::RepresentativeCompanies => &self.representative_companies,
        }
    }

    pub fn field_mut(&mut self, field: ClaimField) -> &mut Vec<String> {
        match field {
            ClaimField::InputElements => &mut self.input_elements,
            ClaimField::OutputProducts => &mut self.output_products,
            ClaimField::KeyTechnologies => &mut self.key_technologies,
            ClaimField::RepresentativeCompanies => &mut self.representative_companies,
        }
    }

    /// True when at least one of the four list fields is non-empty.
    /// A description alone does not count.
    pub fn has_structural_content(&self) -> bool {
        ClaimField::ALL.iter().any(|f| !self.field(*f).is_empty())
    }

    /// Merge `other` into `self`: list fields become the set union, evidence maps
    /// are unioned (existing entries win), missing description is adopted.
    pub fn absorb(&mut self, other: ClaimBundle) {
        for field in ClaimField::ALL {
            let incoming = other.field(field).to_vec();
            let target = self.field_mut(field);
            for item in incoming {
                if !target.contains(&item) {
                    target.push(item);
                }
            }
        }
        if self.description.is_none() {
            self.description = other.description;
        }
        self.evidence_details.union(other.evidence_details);
    }
}

// ---------------------------------------------------------------------------
// Collaborator payloads
// ---------------------------------------------------------------------------

/// Unverified facts proposed by the generation collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateBundle {
    #[serde(default, deserialize_with = "lenient_text")]
    pub entity_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub input_elements: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub output_products: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub key_technologies: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub representative_companies: Vec<String>,
}

impl CandidateBundle {
    pub fn field(&self, field: ClaimField) -> &[String] {
        match field {
            ClaimField::InputElements => &self.input_elements,
            ClaimField::OutputProducts => &self.output_products,
            ClaimField::KeyTechnologies => &self.key_technologies,
            ClaimField::RepresentativeCompanies => &self.representative_companies,
        }
    }

    /// True when any list field or the description carries text.
    pub fn has_content(&self) -> bool {
        ClaimField::ALL.iter().any(|f| !self.field(*f).is_empty())
            || self
                .description
                .as_deref()
                .is_some_and(|d| !d.trim().is_empty())
    }
}

/// Candidate names per category proposed by the planning collaborator.
/// May contain the same name in several categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructurePlan {
    #[serde(deserialize_with = "lenient_list")]
    pub upstream: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub midstream: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub downstream: Vec<String>,
}

impl StructurePlan {
    pub fn get(&self, category: Category) -> &[String] {
        match category {
            Category::Upstream => &self.upstream,
            Category::Midstream => &self.midstream,
            Category::Downstream => &self.downstream,
        }
    }
}

/// Accept `null`, a single string, or an array; keep non-blank strings only.
fn lenient_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let items = match value {
        serde_json::Value::String(s) => vec![s],
        serde_json::Value::Array(values) => values
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// IndustryGraph
// ---------------------------------------------------------------------------

/// The persisted graph: `{root_topic, structure, node_details}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndustryGraph {
    pub root_topic: String,
    #[serde(default)]
    pub structure: Structure,
    /// `None` means declared but not yet resolved.
    #[serde(default)]
    pub node_details: BTreeMap<String, Option<ClaimBundle>>,
}

impl IndustryGraph {
    pub fn new(root_topic: impl Into<String>) -> Self {
        Self {
            root_topic: root_topic.into(),
            ..Default::default()
        }
    }
}
