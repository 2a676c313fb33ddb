//! Structural checks over a built backbone, with two storage backends

use crate::graph::UsageGraph;
use crate::report::{IssueSeverity, ValidationIssue, ValidationReport};
use crate::store::{GraphStore, NameMatch};
use backbone_core::{Classification, Kingdom, NodeId, Rank, TaxonomicStatus, UsageLabel};
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Flat, relational view of one usage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRow {
    pub key: NodeId,
    pub parent_key: Option<NodeId>,
    pub accepted_keys: Vec<NodeId>,
    pub basionym_key: Option<NodeId>,
    pub scientific_name: String,
    pub canonical_name: String,
    pub rank: Option<Rank>,
    pub status: TaxonomicStatus,
    pub kingdom: Kingdom,
    pub classification: Classification,
    pub is_root: bool,
    pub is_basionym: bool,
    pub superseded: bool,
}

impl UsageRow {
    pub fn is_synonym(&self) -> bool {
        self.status.is_synonym()
    }

    fn label(&self) -> String {
        match self.rank {
            Some(rank) => format!("{} {}", rank, self.scientific_name),
            None => self.scientific_name.clone(),
        }
    }
}

fn row_from_graph(graph: &UsageGraph, id: NodeId) -> Option<UsageRow> {
    let usage = graph.node(id)?;
    Some(UsageRow {
        key: id,
        parent_key: graph.parent(id),
        accepted_keys: graph.accepted(id).to_vec(),
        basionym_key: graph.basionym(id),
        scientific_name: usage.scientific_name.clone(),
        canonical_name: usage.name().to_string(),
        rank: usage.rank,
        status: usage.status,
        kingdom: usage.kingdom,
        classification: usage.classification.clone(),
        is_root: usage.has_label(UsageLabel::Root),
        is_basionym: usage.has_label(UsageLabel::Basionym),
        superseded: usage.superseded,
    })
}

/// Relational projection of a graph: one row per usage, keyed by node id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageTable {
    rows: Vec<UsageRow>,
    #[serde(skip)]
    by_name: HashMap<String, Vec<NodeId>>,
    #[serde(skip)]
    combinations: HashMap<NodeId, Vec<NodeId>>,
}

impl UsageTable {
    pub fn from_graph(graph: &UsageGraph) -> Self {
        let rows = graph
            .node_ids()
            .into_iter()
            .filter_map(|id| row_from_graph(graph, id))
            .collect();
        Self::from_rows(rows)
    }

    pub fn from_rows(mut rows: Vec<UsageRow>) -> Self {
        rows.sort_by_key(|r| r.key);
        let mut table = Self {
            rows,
            by_name: HashMap::new(),
            combinations: HashMap::new(),
        };
        table.reindex();
        table
    }

    fn reindex(&mut self) {
        self.by_name.clear();
        self.combinations.clear();
        for row in &self.rows {
            if let Some(basionym) = row.basionym_key {
                self.combinations.entry(basionym).or_default().push(row.key);
            }
            if row.superseded {
                continue;
            }
            self.by_name
                .entry(row.canonical_name.to_lowercase())
                .or_default()
                .push(row.key);
        }
    }

    pub fn row(&self, key: NodeId) -> Option<&UsageRow> {
        self.rows
            .binary_search_by_key(&key, |r| r.key)
            .ok()
            .map(|idx| &self.rows[idx])
    }

    pub fn rows(&self) -> &[UsageRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_json(&self) -> Result<String, backbone_core::BackboneError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, backbone_core::BackboneError> {
        let table: UsageTable = serde_json::from_str(json)?;
        Ok(Self::from_rows(table.rows))
    }
}

/// Checks shared by every storage backend.
///
/// Implementors only provide row access; the checks and the fixture
/// assertions are written once against that access.
pub trait GraphValidator {
    fn backend_name(&self) -> &str;

    fn keys(&self) -> Vec<NodeId>;

    fn usage(&self, key: NodeId) -> Option<UsageRow>;

    /// Non-superseded usages with the given canonical name, optionally of a rank
    fn find_usages(&self, name: &str, rank: Option<Rank>) -> Vec<NodeId>;

    /// Canonical names of all parents, lowest first
    fn parent_names(&self, key: NodeId) -> Vec<String>;

    /// True when other usages were derived from this one
    fn has_combinations(&self, key: NodeId) -> bool;

    fn validate(&self) -> ValidationReport {
        let rows: Vec<UsageRow> = self
            .keys()
            .into_iter()
            .filter_map(|k| self.usage(k))
            .filter(|r| !r.superseded)
            .collect();
        info!("Validating {} usages with the {} backend", rows.len(), self.backend_name());

        let by_key: HashMap<NodeId, &UsageRow> = rows.iter().map(|r| (r.key, r)).collect();
        let mut report = ValidationReport::new();
        check_self_loops(&rows, &mut report);
        check_parent_cycles(&rows, &mut report);
        check_roots(&rows, &mut report);
        check_synonyms(&rows, &mut report);
        check_basionyms(self, &rows, &mut report);
        check_rank_order(&rows, &by_key, &mut report);
        debug!(
            "{} backend found {} issues, valid: {}",
            self.backend_name(),
            report.len(),
            report.is_valid()
        );
        report
    }

    /// Assert a usage with name and rank exists, is accepted or a synonym of
    /// `accepted_name`, and carries the expected classification
    fn assert_usage(
        &self,
        name: &str,
        rank: Option<Rank>,
        accepted_name: Option<&str>,
        classification: &Classification,
    ) -> Vec<ValidationIssue> {
        let candidates = self.find_usages(name, rank);
        let rows: Vec<UsageRow> = candidates.into_iter().filter_map(|k| self.usage(k)).collect();
        if rows.is_empty() {
            return vec![ValidationIssue::error(
                "assert_usage",
                format!("{} {} not found", rank.map(|r| r.as_str()).unwrap_or(""), name),
            )];
        }

        // Homonyms: pick the usage agreeing with the expected classification
        let row = rows
            .iter()
            .find(|r| r.classification.is_compatible_with(classification))
            .unwrap_or(&rows[0]);

        let mut issues = Vec::new();
        match accepted_name {
            Some(expected) => {
                let accepted: Vec<String> = row
                    .accepted_keys
                    .iter()
                    .filter_map(|k| self.usage(*k))
                    .map(|r| r.canonical_name)
                    .collect();
                if !row.is_synonym() {
                    issues.push(
                        ValidationIssue::error("assert_usage", format!("{} is not a synonym", row.label()))
                            .at(row.key),
                    );
                } else if !accepted.iter().any(|a| a.eq_ignore_ascii_case(expected)) {
                    issues.push(
                        ValidationIssue::error(
                            "assert_usage",
                            format!("{} is not a synonym of {}, but of {:?}", row.label(), expected, accepted),
                        )
                        .at(row.key),
                    );
                }
            }
            None if row.is_synonym() => {
                issues.push(
                    ValidationIssue::error("assert_usage", format!("{} is not accepted", row.label()))
                        .at(row.key),
                );
            }
            None => {}
        }
        issues.extend(self.assert_classification(row.key, classification));
        issues
    }

    /// Every filled slot of `expected` must match the denormalized classification
    fn assert_classification(&self, key: NodeId, expected: &Classification) -> Vec<ValidationIssue> {
        let Some(row) = self.usage(key) else {
            return vec![ValidationIssue::error("assert_classification", format!("usage {} missing", key))];
        };
        expected
            .iter()
            .filter_map(|(rank, name)| {
                let actual = row.classification.get(rank);
                if actual.is_some_and(|a| a.eq_ignore_ascii_case(name)) {
                    None
                } else {
                    Some(
                        ValidationIssue::error(
                            "assert_classification",
                            format!("{} has {} {:?}, expected {}", row.label(), rank, actual, name),
                        )
                        .at(key),
                    )
                }
            })
            .collect()
    }

    fn assert_not_existing(&self, name: &str, rank: Option<Rank>) -> Vec<ValidationIssue> {
        self.find_usages(name, rank)
            .into_iter()
            .map(|k| {
                ValidationIssue::error("assert_not_existing", format!("{} should not exist", name)).at(k)
            })
            .collect()
    }

    fn assert_parents_contain(&self, key: NodeId, parent_name: &str) -> Vec<ValidationIssue> {
        if self
            .parent_names(key)
            .iter()
            .any(|p| p.eq_ignore_ascii_case(parent_name))
        {
            Vec::new()
        } else {
            vec![ValidationIssue::error(
                "assert_parents_contain",
                format!("{} is not a parent of usage {}", parent_name, key),
            )
            .at(key)]
        }
    }
}

fn check_self_loops(rows: &[UsageRow], report: &mut ValidationReport) {
    for row in rows {
        if row.parent_key == Some(row.key)
            || row.accepted_keys.contains(&row.key)
            || row.basionym_key == Some(row.key)
        {
            report.push(
                ValidationIssue::error("self_loop", format!("{} relates to itself", row.label()))
                    .at(row.key),
            );
        }
    }
}

fn check_parent_cycles(rows: &[UsageRow], report: &mut ValidationReport) {
    let mut tree: DiGraphMap<u32, ()> = DiGraphMap::new();
    for row in rows {
        tree.add_node(row.key.value());
        if let Some(parent) = row.parent_key.filter(|p| *p != row.key) {
            tree.add_edge(parent.value(), row.key.value(), ());
        }
    }
    for component in tarjan_scc(&tree) {
        if component.len() > 1 {
            let mut members = component;
            members.sort_unstable();
            report.push(
                ValidationIssue::critical("parent_cycle", format!("parent cycle through usages {:?}", members))
                    .at(NodeId(members[0]))
                    .suggest("drop one parent relation of the cycle"),
            );
        }
    }
}

fn check_roots(rows: &[UsageRow], report: &mut ValidationReport) {
    let mut by_kingdom: BTreeMap<Kingdom, Vec<&UsageRow>> = BTreeMap::new();
    for row in rows {
        let is_root = row.parent_key.is_none() && !row.is_synonym();
        if is_root {
            by_kingdom.entry(row.kingdom).or_default().push(row);
        }
        if is_root != row.is_root {
            report.push(
                ValidationIssue::warning(
                    "root_label",
                    format!("{} root label does not match its parent relation", row.label()),
                )
                .at(row.key),
            );
        }
    }
    for (kingdom, roots) in by_kingdom {
        if roots.len() < 2 {
            continue;
        }
        let names: Vec<String> = roots.iter().map(|r| r.label()).collect();
        let severity = if kingdom == Kingdom::IncertaeSedis {
            IssueSeverity::Warning
        } else {
            IssueSeverity::Error
        };
        report.push(
            ValidationIssue::new(
                severity,
                "roots",
                format!("{} roots for kingdom {}: {}", roots.len(), kingdom, names.join(", ")),
            )
            .at(roots[0].key),
        );
    }
}

fn check_synonyms(rows: &[UsageRow], report: &mut ValidationReport) {
    for row in rows {
        match (row.is_synonym(), row.accepted_keys.len()) {
            (true, 0) => report.push(
                ValidationIssue::error("synonyms", format!("synonym {} has no accepted name", row.label()))
                    .at(row.key),
            ),
            (true, n) if n > 1 && row.status != TaxonomicStatus::ProParteSynonym => report.push(
                ValidationIssue::error(
                    "synonyms",
                    format!("synonym {} has {} accepted names but is not pro parte", row.label(), n),
                )
                .at(row.key),
            ),
            (false, n) if n > 0 => report.push(
                ValidationIssue::error(
                    "synonyms",
                    format!("{} {} is linked as a synonym", row.status, row.label()),
                )
                .at(row.key),
            ),
            _ => {}
        }
    }
}

fn check_basionyms<V: GraphValidator + ?Sized>(validator: &V, rows: &[UsageRow], report: &mut ValidationReport) {
    for row in rows.iter().filter(|r| r.is_basionym) {
        if !validator.has_combinations(row.key) && row.parent_key.is_none() && row.accepted_keys.is_empty() {
            report.push(
                ValidationIssue::error("basionyms", format!("basionym {} is orphaned", row.label()))
                    .at(row.key),
            );
        }
    }
}

fn check_rank_order(rows: &[UsageRow], by_key: &HashMap<NodeId, &UsageRow>, report: &mut ValidationReport) {
    for row in rows {
        let Some(parent) = row.parent_key.and_then(|p| by_key.get(&p)) else {
            continue;
        };
        match (parent.rank, row.rank) {
            (Some(_), None) => report.push(
                ValidationIssue::error(
                    "rank_order",
                    format!("{} has no rank below {}", row.label(), parent.label()),
                )
                .at(row.key),
            ),
            (Some(p), Some(c)) if !p.is_uncomparable() && !c.is_uncomparable() && !p.higher_than(c) => {
                report.push(
                    ValidationIssue::error(
                        "rank_order",
                        format!("{} is not ranked below its parent {}", row.label(), parent.label()),
                    )
                    .at(row.key),
                )
            }
            _ => {}
        }
    }
}

/// Validator reading straight from the arena graph
pub struct GraphStoreValidator<'g> {
    graph: &'g UsageGraph,
}

impl<'g> GraphStoreValidator<'g> {
    pub fn new(graph: &'g UsageGraph) -> Self {
        Self { graph }
    }
}

impl GraphValidator for GraphStoreValidator<'_> {
    fn backend_name(&self) -> &str {
        "graph"
    }

    fn keys(&self) -> Vec<NodeId> {
        self.graph.node_ids()
    }

    fn usage(&self, key: NodeId) -> Option<UsageRow> {
        row_from_graph(self.graph, key)
    }

    fn find_usages(&self, name: &str, rank: Option<Rank>) -> Vec<NodeId> {
        self.graph
            .find_by_name(name, NameMatch::Canonical)
            .into_iter()
            .filter(|id| rank.is_none() || self.graph.node(*id).is_some_and(|u| u.rank == rank))
            .collect()
    }

    fn parent_names(&self, key: NodeId) -> Vec<String> {
        self.graph.parent_chain_names(key)
    }

    fn has_combinations(&self, key: NodeId) -> bool {
        !self.graph.combinations(key).is_empty()
    }
}

/// Validator over a relational [`UsageTable`]
pub struct TableValidator<'t> {
    table: &'t UsageTable,
}

impl<'t> TableValidator<'t> {
    pub fn new(table: &'t UsageTable) -> Self {
        Self { table }
    }
}

impl GraphValidator for TableValidator<'_> {
    fn backend_name(&self) -> &str {
        "table"
    }

    fn keys(&self) -> Vec<NodeId> {
        self.table.rows.iter().map(|r| r.key).collect()
    }

    fn usage(&self, key: NodeId) -> Option<UsageRow> {
        self.table.row(key).cloned()
    }

    fn find_usages(&self, name: &str, rank: Option<Rank>) -> Vec<NodeId> {
        self.table
            .by_name
            .get(&name.trim().to_lowercase())
            .map(|keys| {
                keys.iter()
                    .copied()
                    .filter(|k| rank.is_none() || self.table.row(*k).is_some_and(|r| r.rank == rank))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn parent_names(&self, key: NodeId) -> Vec<String> {
        let mut names = Vec::new();
        let mut seen = vec![key];
        let mut current = self.table.row(key).and_then(|r| r.parent_key);
        while let Some(parent) = current {
            if seen.contains(&parent) {
                break;
            }
            seen.push(parent);
            let Some(row) = self.table.row(parent) else {
                break;
            };
            names.push(row.canonical_name.clone());
            current = row.parent_key;
        }
        names
    }

    fn has_combinations(&self, key: NodeId) -> bool {
        self.table.combinations.get(&key).is_some_and(|c| !c.is_empty())
    }
}
