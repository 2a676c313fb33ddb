/// The usage node payload
use super::{Classification, Kingdom, NodeId, Origin, ParsedName, Rank, TaxonomicStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Markers attached to a usage besides its status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageLabel {
    /// Top of a parent tree
    Root,
    /// Original name other combinations derive from
    Basionym,
    Autonym,
    /// A relation of this node was dropped during normalization
    ValidationFailed,
}

/// One taxonomic name occurrence inside one checklist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Graph-local id, assigned by the store on creation
    pub id: NodeId,
    /// Local id of the record in its source checklist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Checklist the usage was first created from
    pub source: String,
    /// Record ids of later checklists merged into this usage
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_ids: Vec<String>,
    pub scientific_name: String,
    pub canonical_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorship: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<Rank>,
    pub status: TaxonomicStatus,
    pub origin: Origin,
    pub kingdom: Kingdom,
    #[serde(default)]
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub labels: BTreeSet<UsageLabel>,
    /// Replaced during a rebuild, kept so the id stays resolvable
    #[serde(default)]
    pub superseded: bool,
}

impl Usage {
    /// Minimal usage; the store assigns the id when the node is created.
    pub fn new(scientific_name: &str, rank: Option<Rank>, status: TaxonomicStatus) -> Self {
        Self {
            id: NodeId(0),
            source_id: None,
            source: String::new(),
            merged_ids: Vec::new(),
            scientific_name: scientific_name.to_string(),
            canonical_name: scientific_name.to_string(),
            authorship: None,
            rank,
            status,
            origin: Origin::Source,
            kingdom: Kingdom::IncertaeSedis,
            classification: Classification::default(),
            labels: BTreeSet::new(),
            superseded: false,
        }
    }

    /// Usage from a parsed name
    pub fn from_parsed(parsed: &ParsedName, status: TaxonomicStatus, origin: Origin) -> Self {
        let mut usage = Self::new(&parsed.scientific_name, parsed.rank, status);
        usage.canonical_name = parsed.canonical_name();
        usage.authorship = parsed.authorship.clone();
        usage.origin = origin;
        if parsed.is_autonym() {
            usage.labels.insert(UsageLabel::Autonym);
        }
        usage
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_source(mut self, source: &str, source_id: Option<&str>) -> Self {
        self.source = source.to_string();
        self.source_id = source_id.map(str::to_string);
        self
    }

    pub fn with_canonical(mut self, canonical: &str) -> Self {
        self.canonical_name = canonical.to_string();
        self
    }

    pub fn with_kingdom(mut self, kingdom: Kingdom) -> Self {
        self.kingdom = kingdom;
        self
    }

    pub fn has_label(&self, label: UsageLabel) -> bool {
        self.labels.contains(&label)
    }

    pub fn is_synonym(&self) -> bool {
        self.status.is_synonym()
    }

    /// Canonical name falling back to the full scientific name
    pub fn name(&self) -> &str {
        if self.canonical_name.is_empty() {
            &self.scientific_name
        } else {
            &self.canonical_name
        }
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rank {
            Some(rank) => write!(f, "{} {} [{}]", rank, self.scientific_name, self.id),
            None => write!(f, "{} [{}]", self.scientific_name, self.id),
        }
    }
}
