//! Turns verbatim checklist records into a structurally valid usage graph

use crate::graph::UsageGraph;
use crate::metrics::UsageMetricsHandler;
use crate::record::VerbatimRecord;
use crate::report::{ValidationIssue, ValidationReport};
use crate::store::{GraphStore, RelType};
use crate::walker::{walk_with_handler, TreeWalker};
use backbone_core::config::NormalizerConfig;
use backbone_core::{
    BackboneError, BackboneResult, Classification, Kingdom, NameParser, NodeId, Origin, ParsedName, Rank,
    TaxonomicStatus, Usage, UsageLabel,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Name given to accepted placeholders inserted to break synonym cycles
pub const PLACEHOLDER_NAME: &str = "Incertae sedis";

/// Counters of one normalization run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizerStats {
    pub source: String,
    pub records: usize,
    pub created: usize,
    pub merged: usize,
    pub ignored: usize,
    pub synonyms: usize,
    pub roots: usize,
    pub max_depth: usize,
    pub count_by_origin: BTreeMap<Origin, usize>,
    pub count_by_rank: BTreeMap<Rank, usize>,
    /// Local ids (or names) of synonyms whose cycle was cut
    pub cycles: Vec<String>,
}

impl NormalizerStats {
    pub fn count_by_origin(&self, origin: Origin) -> usize {
        self.count_by_origin.get(&origin).copied().unwrap_or(0)
    }

    pub fn count_by_rank(&self, rank: Rank) -> usize {
        self.count_by_rank.get(&rank).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerResult {
    pub stats: NormalizerStats,
    pub report: ValidationReport,
}

/// A record that made it into the graph
struct Inserted {
    node: NodeId,
    record: VerbatimRecord,
    parsed: ParsedName,
    merged: bool,
}

enum Lookup {
    Found(NodeId),
    Ambiguous(usize),
    Missing,
}

/// Bookkeeping for one source while its transaction is open
struct SourceRun {
    source: String,
    by_id: HashMap<String, NodeId>,
    by_scientific: HashMap<String, Vec<NodeId>>,
    by_canonical: HashMap<String, Vec<NodeId>>,
    inserted: Vec<Inserted>,
    /// Every node created for this source, placeholders included
    created: Vec<NodeId>,
    /// Nodes of earlier sources this source merged into
    merged: HashSet<NodeId>,
    stats: NormalizerStats,
    report: ValidationReport,
}

impl SourceRun {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            by_id: HashMap::new(),
            by_scientific: HashMap::new(),
            by_canonical: HashMap::new(),
            inserted: Vec::new(),
            created: Vec::new(),
            merged: HashSet::new(),
            stats: NormalizerStats {
                source: source.to_string(),
                ..Default::default()
            },
            report: ValidationReport::new(),
        }
    }

    fn register(&mut self, id: NodeId, usage: &Usage) {
        self.by_scientific
            .entry(usage.scientific_name.to_lowercase())
            .or_default()
            .push(id);
        self.by_canonical
            .entry(usage.name().to_lowercase())
            .or_default()
            .push(id);
    }

    fn recover(&mut self, err: BackboneError, node: Option<NodeId>) {
        warn!("{}", err);
        let mut issue = ValidationIssue::from_error(&err);
        issue.node = node;
        self.report.push(issue);
    }
}

/// Builds a graph from one source checklist at a time.
///
/// A normalizer holds exclusive write access to its graph. Every source is
/// ingested inside a single transaction, so a corrupt stream leaves the
/// graph exactly as it was before the source started.
pub struct GraphNormalizer<'g> {
    graph: &'g mut UsageGraph,
    config: NormalizerConfig,
    parser: NameParser,
}

impl<'g> GraphNormalizer<'g> {
    pub fn new(graph: &'g mut UsageGraph, config: NormalizerConfig) -> Self {
        Self {
            graph,
            config,
            parser: NameParser::new(),
        }
    }

    pub fn graph(&self) -> &UsageGraph {
        self.graph
    }

    /// Ingest one source.
    ///
    /// Per record problems end up in the returned report. Only a fatal error,
    /// usually a corrupt stream, aborts the run and rolls the source back.
    pub fn normalize<I>(&mut self, source: &str, records: I) -> BackboneResult<NormalizerResult>
    where
        I: IntoIterator<Item = BackboneResult<VerbatimRecord>>,
    {
        info!("Normalizing source {}", source);
        let mut run = SourceRun::new(source);

        self.graph.begin()?;
        if let Err(e) = self.run_phases(&mut run, records) {
            warn!("Normalization of {} failed, rolling back: {}", source, e);
            self.graph.rollback()?;
            return Err(e);
        }
        self.graph.commit()?;

        self.finish_stats(&mut run);
        info!(
            "Source {} normalized: {} records, {} created, {} merged, {} ignored, {} issues",
            source,
            run.stats.records,
            run.stats.created,
            run.stats.merged,
            run.stats.ignored,
            run.report.len()
        );
        Ok(NormalizerResult {
            stats: run.stats,
            report: run.report,
        })
    }

    fn run_phases<I>(&mut self, run: &mut SourceRun, records: I) -> BackboneResult<()>
    where
        I: IntoIterator<Item = BackboneResult<VerbatimRecord>>,
    {
        for item in records {
            match item {
                Ok(record) => self.insert_record(run, record)?,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    run.stats.ignored += 1;
                    run.recover(e, None);
                }
            }
        }
        debug!("Inserted {} records of {}", run.inserted.len(), run.source);

        self.setup_relations(run)?;
        if self.config.create_implicit_names {
            self.create_implicit_names(run)?;
        }
        self.link_autonyms(run)?;
        if self.config.create_autonyms {
            self.create_missing_autonyms(run)?;
        }
        self.cut_synonym_cycles(run)?;
        self.relink_synonym_chains(run)?;
        self.move_children_of_synonyms(run)?;
        if self.config.clean_implicit_names {
            self.clean_implicit_names(run)?;
        }
        self.label_roots()?;
        self.denormalize(run)?;
        Ok(())
    }

    // ---- insert phase ----

    fn insert_record(&mut self, run: &mut SourceRun, record: VerbatimRecord) -> BackboneResult<()> {
        let record = record.cleaned();
        run.stats.records += 1;

        let Some(name) = record.scientific_name.clone() else {
            run.stats.ignored += 1;
            run.recover(
                BackboneError::UnparsableName(format!("record {} has no scientific name", record.label())),
                None,
            );
            return Ok(());
        };
        let full_name = match &record.authorship {
            Some(author) if !name.contains(author.as_str()) => format!("{} {}", name, author),
            _ => name,
        };
        let rank_hint = record
            .taxon_rank
            .as_deref()
            .and_then(|r| r.parse::<Rank>().ok())
            .or_else(|| record.verbatim_rank.as_deref().and_then(|r| r.parse::<Rank>().ok()));

        let parsed = match self.parser.parse(&full_name, rank_hint) {
            Ok(parsed) => parsed,
            Err(e) => {
                run.stats.ignored += 1;
                run.recover(e, None);
                return Ok(());
            }
        };

        if let Some(id) = &record.id {
            if run.by_id.contains_key(id) {
                run.stats.ignored += 1;
                run.recover(
                    BackboneError::DuplicateStableId(format!("{} in source {}", id, run.source)),
                    None,
                );
                return Ok(());
            }
        }

        let status = record_status(&record, &parsed);
        let kingdom = record.kingdom.as_deref().and_then(Kingdom::from_name);

        if self.config.source_priority_merge {
            if let Some(target) = self.find_merge_target(run, &parsed, status, kingdom, &record) {
                let mut usage = self.graph.require(target)?.clone();
                let merged_key = format!("{}:{}", run.source, record.id.clone().unwrap_or_default());
                usage.merged_ids.push(merged_key);
                run.register(target, &usage);
                self.graph.update_node(usage)?;
                if let Some(id) = &record.id {
                    run.by_id.insert(id.clone(), target);
                }
                debug!("Merged record {} into usage {}", record.label(), target);
                run.merged.insert(target);
                run.stats.merged += 1;
                run.inserted.push(Inserted {
                    node: target,
                    record,
                    parsed,
                    merged: true,
                });
                return Ok(());
            }
        }

        let usage = Usage::from_parsed(&parsed, status, Origin::Source)
            .with_source(&run.source, record.id.as_deref())
            .with_kingdom(kingdom.unwrap_or(Kingdom::IncertaeSedis));
        let node = self.create(run, usage)?;
        if let Some(id) = &record.id {
            run.by_id.insert(id.clone(), node);
        }
        run.inserted.push(Inserted {
            node,
            record,
            parsed,
            merged: false,
        });
        Ok(())
    }

    /// A committed usage of an earlier source describing the same taxon
    fn find_merge_target(
        &self,
        run: &SourceRun,
        parsed: &ParsedName,
        status: TaxonomicStatus,
        kingdom: Option<Kingdom>,
        record: &VerbatimRecord,
    ) -> Option<NodeId> {
        let classification = record.classification();
        self.graph
            .find_by_canonical_and_rank(&parsed.canonical_name(), parsed.rank)
            .into_iter()
            .find(|id| {
                self.graph.node(*id).is_some_and(|u| {
                    !u.superseded
                        && u.source != run.source
                        && u.is_synonym() == status.is_synonym()
                        && kingdom_compatible(u.kingdom, kingdom)
                        && u.classification.is_compatible_with(&classification)
                })
            })
    }

    fn create(&mut self, run: &mut SourceRun, usage: Usage) -> BackboneResult<NodeId> {
        let id = self.graph.create_node(usage)?;
        let usage = self.graph.require(id)?.clone();
        run.register(id, &usage);
        run.created.push(id);
        run.stats.created += 1;
        debug!("Created {} usage {}", usage.origin, usage);
        Ok(id)
    }

    /// Doubtful node for a name referenced but never defined
    fn create_placeholder(
        &mut self,
        run: &mut SourceRun,
        name: &str,
        fallback_rank: Option<Rank>,
        origin: Origin,
        status: TaxonomicStatus,
    ) -> BackboneResult<Option<NodeId>> {
        let parsed = match self.parser.parse(name, None) {
            Ok(parsed) => parsed,
            Err(e) => {
                run.recover(e, None);
                return Ok(None);
            }
        };
        let mut usage = Usage::from_parsed(&parsed, status, origin).with_source(&run.source, None);
        if usage.rank.is_none() {
            usage.rank = fallback_rank;
        }
        self.create(run, usage).map(Some)
    }

    // ---- relation phase ----

    fn setup_relations(&mut self, run: &mut SourceRun) -> BackboneResult<()> {
        let inserted = std::mem::take(&mut run.inserted);
        // Records new to the graph first, so parents introduced by this
        // source exist before merged usages are patched with them
        for item in inserted.iter().filter(|i| !i.merged) {
            let is_synonym = self.setup_accepted(run, item)?;
            if !is_synonym {
                self.setup_parent(run, item)?;
            }
            self.setup_basionym(run, item)?;
        }
        for item in inserted.iter().filter(|i| i.merged) {
            self.patch_merged_parent(run, item)?;
        }
        run.inserted = inserted;
        Ok(())
    }

    fn lookup_name(&self, run: &SourceRun, name: &str) -> Lookup {
        let live = |ids: &Vec<NodeId>| -> Vec<NodeId> {
            ids.iter()
                .copied()
                .filter(|id| self.graph.node(*id).is_some_and(|u| !u.superseded))
                .collect()
        };
        let key = name.trim().to_lowercase();
        let mut candidates = run.by_scientific.get(&key).map(live).unwrap_or_default();
        if candidates.is_empty() {
            candidates = run.by_canonical.get(&key).map(live).unwrap_or_default();
        }
        if candidates.is_empty() {
            if let Ok(parsed) = self.parser.parse(name, None) {
                let canonical = parsed.canonical_name().to_lowercase();
                candidates = run.by_canonical.get(&canonical).map(live).unwrap_or_default();
            }
        }
        match candidates.len() {
            0 => Lookup::Missing,
            1 => Lookup::Found(candidates[0]),
            n => Lookup::Ambiguous(n),
        }
    }

    /// Resolve an id reference falling back to a name reference, optionally
    /// materializing a placeholder for names that cannot be found
    fn resolve(
        &mut self,
        run: &mut SourceRun,
        item: &Inserted,
        field: &'static str,
        id: Option<&str>,
        name: Option<&str>,
        placeholder: Option<(Origin, Option<Rank>)>,
    ) -> BackboneResult<Option<NodeId>> {
        if let Some(id) = id.filter(|id| Some(*id) != item.record.id.as_deref()) {
            match run.by_id.get(id).copied() {
                Some(target) if target != item.node => return Ok(Some(target)),
                Some(_) => return Ok(None),
                None => run.recover(
                    BackboneError::DanglingReference {
                        record: item.record.label(),
                        field,
                        reference: id.to_string(),
                    },
                    Some(item.node),
                ),
            }
        }

        let Some(name) = name.filter(|n| !is_own_name(n, item)) else {
            return Ok(None);
        };
        match self.lookup_name(run, name) {
            Lookup::Found(target) if target != item.node => Ok(Some(target)),
            Lookup::Found(_) => Ok(None),
            Lookup::Ambiguous(n) => {
                run.report.push(
                    ValidationIssue::warning(
                        "AmbiguousReference",
                        format!("{} {} of record {} matches {} usages", field, name, item.record.label(), n),
                    )
                    .at(item.node),
                );
                Ok(None)
            }
            Lookup::Missing => match placeholder {
                Some((origin, rank)) => {
                    warn!("{} {} of record {} not existing, materialize it", field, name, item.record.label());
                    self.create_placeholder(run, name, rank, origin, TaxonomicStatus::Doubtful)
                }
                None => Ok(None),
            },
        }
    }

    /// Links a synonym to its accepted usages. Returns true for synonyms.
    fn setup_accepted(&mut self, run: &mut SourceRun, item: &Inserted) -> BackboneResult<bool> {
        let mut targets: Vec<NodeId> = Vec::new();
        let own_id = item.record.id.as_deref();

        if let Some(ids) = item.record.accepted_id.as_deref() {
            for id in split_ids(ids, &self.config.multi_value_delimiter) {
                if Some(id) == own_id {
                    continue;
                }
                match run.by_id.get(id).copied() {
                    Some(target) if target != item.node && !targets.contains(&target) => targets.push(target),
                    Some(_) => {}
                    None => run.recover(
                        BackboneError::DanglingReference {
                            record: item.record.label(),
                            field: "acceptedNameUsageID",
                            reference: id.to_string(),
                        },
                        Some(item.node),
                    ),
                }
            }
        }
        if targets.is_empty() {
            if let Some(target) = self.resolve(
                run,
                item,
                "acceptedNameUsage",
                None,
                item.record.accepted_name.as_deref(),
                Some((Origin::VerbatimAccepted, item.parsed.rank)),
            )? {
                // An accepted placeholder takes over the classification position of its synonym
                if self.graph.node(target).is_some_and(|u| u.origin == Origin::VerbatimAccepted)
                    && self.graph.parent(target).is_none()
                {
                    if let Some(parent) = self.resolve(
                        run,
                        item,
                        "parentNameUsageID",
                        item.record.parent_id.as_deref(),
                        item.record.parent_name.as_deref(),
                        None,
                    )? {
                        self.attach(run, target, parent)?;
                    }
                }
                targets.push(target);
            }
        }

        let mut usage = self.graph.require(item.node)?.clone();
        if targets.is_empty() {
            if usage.is_synonym() {
                run.report.push(
                    ValidationIssue::warning(
                        "AcceptedNameMissing",
                        format!("synonym {} has no resolvable accepted name", item.record.label()),
                    )
                    .at(item.node)
                    .suggest("treated as doubtful"),
                );
                usage.status = TaxonomicStatus::Doubtful;
                self.graph.update_node(usage)?;
            }
            return Ok(false);
        }

        let status = if targets.len() > 1 {
            TaxonomicStatus::ProParteSynonym
        } else if usage.status == TaxonomicStatus::ProParteSynonym {
            TaxonomicStatus::ProParteSynonym
        } else {
            TaxonomicStatus::Synonym
        };
        if usage.status != status {
            usage.status = status;
            self.graph.update_node(usage)?;
        }
        for target in targets {
            self.graph.create_edge(RelType::SynonymOf, item.node, target)?;
        }
        Ok(true)
    }

    fn setup_parent(&mut self, run: &mut SourceRun, item: &Inserted) -> BackboneResult<()> {
        if item.record.has_parent_reference() {
            let fallback = item.parsed.rank.and_then(|r| r.next_higher_linnean());
            let parent = self.resolve(
                run,
                item,
                "parentNameUsageID",
                item.record.parent_id.as_deref(),
                item.record.parent_name.as_deref(),
                Some((Origin::VerbatimParent, fallback)),
            )?;
            if let Some(parent) = parent {
                self.link_parent(run, item.node, parent)?;
            }
            return Ok(());
        }
        self.link_flat_classification(run, item)
    }

    /// Build the parent chain of a record from its flat classification fields
    fn link_flat_classification(&mut self, run: &mut SourceRun, item: &Inserted) -> BackboneResult<()> {
        let own_rank = item.parsed.rank;
        let own_name = item.parsed.canonical_name();
        let slots: Vec<(Rank, String)> = item
            .record
            .classification()
            .iter()
            .filter(|(rank, name)| {
                own_rank.map_or(true, |own| rank.higher_than(own)) && !name.eq_ignore_ascii_case(&own_name)
            })
            .map(|(rank, name)| (rank, name.to_string()))
            .collect();

        let mut parent: Option<NodeId> = None;
        for (rank, name) in slots {
            let Some(higher) = self.find_or_create_higher(run, &name, rank, item)? else {
                continue;
            };
            if let Some(p) = parent {
                self.link_parent(run, higher, p)?;
            }
            parent = Some(higher);
        }
        if let Some(p) = parent {
            self.link_parent(run, item.node, p)?;
        }
        Ok(())
    }

    fn find_or_create_higher(
        &mut self,
        run: &mut SourceRun,
        name: &str,
        rank: Rank,
        item: &Inserted,
    ) -> BackboneResult<Option<NodeId>> {
        let key = name.to_lowercase();
        let local = run.by_canonical.get(&key).and_then(|ids| {
            ids.iter().copied().find(|id| {
                self.graph
                    .node(*id)
                    .is_some_and(|u| u.rank == Some(rank) && !u.is_synonym() && !u.superseded)
            })
        });
        if local.is_some() {
            return Ok(local);
        }

        if self.config.source_priority_merge {
            let kingdom = item.record.kingdom.as_deref().and_then(Kingdom::from_name);
            let earlier = self
                .graph
                .find_by_canonical_and_rank(name, Some(rank))
                .into_iter()
                .find(|id| {
                    self.graph.node(*id).is_some_and(|u| {
                        !u.is_synonym() && !u.superseded && kingdom_compatible(u.kingdom, kingdom)
                    })
                });
            if let Some(id) = earlier {
                let usage = self.graph.require(id)?.clone();
                run.register(id, &usage);
                run.merged.insert(id);
                return Ok(Some(id));
            }
        }

        let parsed = match self.parser.parse(name, Some(rank)) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Skipping classification field {} {}: {}", rank, name, e);
                return Ok(None);
            }
        };
        let kingdom = item
            .record
            .kingdom
            .as_deref()
            .and_then(Kingdom::from_name)
            .unwrap_or(Kingdom::IncertaeSedis);
        let mut usage = Usage::from_parsed(&parsed, TaxonomicStatus::Accepted, Origin::DenormedClassification)
            .with_source(&run.source, None)
            .with_kingdom(kingdom);
        usage.rank = Some(rank);
        self.create(run, usage).map(Some)
    }

    /// Set a parent, respecting existing parents and the cycle guard
    fn link_parent(&mut self, run: &mut SourceRun, child: NodeId, parent: NodeId) -> BackboneResult<()> {
        if child == parent {
            return Ok(());
        }
        match self.graph.parent(child) {
            None => {
                self.attach(run, child, parent)?;
            }
            Some(current) if current == parent => {}
            Some(current) if run.merged.contains(&child) => {
                self.patch_parent(run, child, current, parent)?;
            }
            Some(current) => {
                debug!(
                    "Usage {} keeps parent {}, ignoring {}",
                    child, current, parent
                );
            }
        }
        Ok(())
    }

    /// Create a parent edge unless it would close a cycle
    fn attach(&mut self, run: &mut SourceRun, child: NodeId, parent: NodeId) -> BackboneResult<bool> {
        if child == parent || self.graph.is_descendant(parent, child) {
            let child_name = self.graph.require(child)?.to_string();
            let parent_name = self.graph.require(parent)?.to_string();
            run.recover(
                BackboneError::CycleDetected(format!("{} cannot be placed under its descendant {}", child_name, parent_name)),
                Some(child),
            );
            self.graph.set_label(child, UsageLabel::ValidationFailed, true)?;
            return Ok(false);
        }
        self.graph.create_edge(RelType::ParentOf, parent, child)
    }

    /// Replace the parent of a usage from an earlier source when the new
    /// parent only fills a gap in the existing classification
    fn patch_parent(
        &mut self,
        run: &mut SourceRun,
        child: NodeId,
        current: NodeId,
        proposed: NodeId,
    ) -> BackboneResult<()> {
        if self.is_new_parent_applicable(child, current, proposed) {
            info!("Patching parent of usage {}: {} replaces {}", child, proposed, current);
            self.graph.set_parent(child, proposed)?;
            return Ok(());
        }
        let describe = |id: NodeId| {
            self.graph
                .node(id)
                .map(|u| u.to_string())
                .unwrap_or_else(|| id.to_string())
        };
        let message = format!(
            "{} keeps parent {}, conflicting parent {} ignored",
            describe(child),
            describe(current),
            describe(proposed)
        );
        warn!("{}", message);
        run.report
            .push(ValidationIssue::warning("ClassificationConflict", message).at(child));
        Ok(())
    }

    fn is_new_parent_applicable(&self, child: NodeId, current: NodeId, proposed: NodeId) -> bool {
        let rank = |id: NodeId| self.graph.node(id).and_then(|u| u.rank);
        let (Some(child_rank), Some(current_rank), Some(proposed_rank)) =
            (rank(child), rank(current), rank(proposed))
        else {
            return false;
        };
        proposed != current
            && !proposed_rank.higher_than(current_rank)
            && proposed_rank.higher_than(child_rank)
            && self.graph.is_descendant(proposed, current)
    }

    fn patch_merged_parent(&mut self, run: &mut SourceRun, item: &Inserted) -> BackboneResult<()> {
        if item.record.has_parent_reference() {
            if let Some(parent) = self.resolve(
                run,
                item,
                "parentNameUsageID",
                item.record.parent_id.as_deref(),
                item.record.parent_name.as_deref(),
                None,
            )? {
                self.link_parent(run, item.node, parent)?;
            }
            return Ok(());
        }
        if !item.parsed.rank.is_some_and(|r| r.is_linnean() || r.is_infraspecific()) {
            return Ok(());
        }
        if self.graph.node(item.node).is_some_and(|u| u.is_synonym()) {
            return Ok(());
        }
        self.link_flat_classification(run, item)
    }

    fn setup_basionym(&mut self, run: &mut SourceRun, item: &Inserted) -> BackboneResult<()> {
        let Some(basionym) = self.resolve(
            run,
            item,
            "originalNameUsageID",
            item.record.basionym_id.as_deref(),
            item.record.basionym_name.as_deref(),
            Some((Origin::VerbatimBasionym, item.parsed.rank)),
        )?
        else {
            return Ok(());
        };

        let placeholder = self
            .graph
            .node(basionym)
            .is_some_and(|u| u.origin == Origin::VerbatimBasionym && self.graph.accepted(basionym).is_empty());
        if placeholder {
            // A materialized basionym is a homotypic synonym of the name it was cited by
            let accepted = self.graph.accepted(item.node).first().copied().unwrap_or(item.node);
            let mut usage = self.graph.require(basionym)?.clone();
            usage.status = TaxonomicStatus::Synonym;
            self.graph.update_node(usage)?;
            self.graph.create_edge(RelType::SynonymOf, basionym, accepted)?;
        }
        self.graph.create_edge(RelType::BasionymOf, basionym, item.node)?;
        self.graph.set_label(basionym, UsageLabel::Basionym, true)?;
        Ok(())
    }

    // ---- implicit names and autonyms ----

    fn create_implicit_names(&mut self, run: &mut SourceRun) -> BackboneResult<()> {
        let candidates: Vec<(NodeId, ParsedName)> = run
            .inserted
            .iter()
            .filter(|i| !i.merged && i.parsed.is_binomial() && !i.parsed.hybrid)
            .map(|i| (i.node, i.parsed.clone()))
            .collect();

        for (node, parsed) in candidates {
            let Some(usage) = self.graph.node(node) else { continue };
            if usage.is_synonym() || usage.superseded {
                continue;
            }
            let kingdom = usage.kingdom;
            let mut child = node;
            let mut child_parsed = parsed;
            if child_parsed.is_trinomial() {
                let Some(species) = child_parsed.canonical_species_name() else {
                    continue;
                };
                match self.implicit_parent(run, child, &species, Rank::Species, kingdom)? {
                    Some(implicit) => {
                        child = implicit;
                        child_parsed = self.parser.parse(&species, Some(Rank::Species))?;
                    }
                    None => continue,
                }
            }
            if child_parsed.rank == Some(Rank::Species) {
                let genus = child_parsed.genus_or_above.clone();
                self.implicit_parent(run, child, &genus, Rank::Genus, kingdom)?;
            }
        }
        Ok(())
    }

    /// Insert `name` of `rank` between `child` and its parent when the
    /// parent ranks above `rank`. Returns the node now directly above `child`
    /// when it has the implied name.
    fn implicit_parent(
        &mut self,
        run: &mut SourceRun,
        child: NodeId,
        name: &str,
        rank: Rank,
        kingdom: Kingdom,
    ) -> BackboneResult<Option<NodeId>> {
        let current = self.graph.parent(child);
        if let Some(p) = current {
            let Some(parent) = self.graph.node(p) else {
                return Ok(None);
            };
            if parent.rank == Some(rank) && parent.name().eq_ignore_ascii_case(name) {
                return Ok(Some(p));
            }
            if !parent.rank.is_some_and(|r| r.higher_than(rank)) {
                return Ok(None);
            }
        }

        let existing = run.by_canonical.get(&name.to_lowercase()).and_then(|ids| {
            ids.iter().copied().find(|id| {
                *id != child
                    && self
                        .graph
                        .node(*id)
                        .is_some_and(|u| u.rank == Some(rank) && !u.is_synonym() && !u.superseded)
            })
        });
        let implicit = match existing {
            Some(id) => id,
            None => {
                let parsed = self.parser.parse(name, Some(rank))?;
                let usage = Usage::from_parsed(&parsed, TaxonomicStatus::Doubtful, Origin::ImplicitName)
                    .with_source(&run.source, None)
                    .with_kingdom(kingdom);
                let id = self.create(run, usage)?;
                if let Some(p) = current {
                    self.attach(run, id, p)?;
                }
                id
            }
        };
        if self.graph.is_descendant(implicit, child) {
            return Ok(None);
        }
        if let Some(p) = current {
            self.graph.remove_edge(RelType::ParentOf, p, child)?;
        }
        Ok(self.attach(run, child, implicit)?.then_some(implicit))
    }

    /// Place parsed autonyms directly under their species
    fn link_autonyms(&mut self, run: &mut SourceRun) -> BackboneResult<()> {
        let autonyms: Vec<(NodeId, String)> = run
            .inserted
            .iter()
            .filter(|i| !i.merged && i.parsed.is_autonym())
            .filter_map(|i| i.parsed.canonical_species_name().map(|s| (i.node, s)))
            .collect();
        for (node, species) in autonyms {
            if self.graph.node(node).map_or(true, |u| u.is_synonym()) {
                continue;
            }
            let parent_is_species = self
                .graph
                .parent(node)
                .and_then(|p| self.graph.node(p))
                .is_some_and(|p| p.rank == Some(Rank::Species) && p.name().eq_ignore_ascii_case(&species));
            if parent_is_species {
                continue;
            }
            let target = run.by_canonical.get(&species.to_lowercase()).and_then(|ids| {
                ids.iter().copied().find(|id| {
                    self.graph
                        .node(*id)
                        .is_some_and(|u| u.rank == Some(Rank::Species) && !u.is_synonym() && !u.superseded)
                })
            });
            if let Some(species_node) = target {
                if let Some(old) = self.graph.parent(node) {
                    if self.graph.is_descendant(species_node, old) || self.graph.parent(species_node).is_none() {
                        self.graph.remove_edge(RelType::ParentOf, old, node)?;
                    } else {
                        continue;
                    }
                }
                self.attach(run, node, species_node)?;
            }
        }
        Ok(())
    }

    /// Every species with accepted infraspecific children of some rank gets
    /// an autonym of that rank
    fn create_missing_autonyms(&mut self, run: &mut SourceRun) -> BackboneResult<()> {
        let species: Vec<NodeId> = run
            .created
            .iter()
            .copied()
            .filter(|id| {
                self.graph
                    .node(*id)
                    .is_some_and(|u| u.rank == Some(Rank::Species) && !u.is_synonym() && !u.superseded)
            })
            .collect();

        for sp in species {
            let mut ranks: BTreeMap<Rank, bool> = BTreeMap::new();
            for child in self.graph.children(sp) {
                let Some(usage) = self.graph.node(*child) else { continue };
                let Some(rank) = usage.rank.filter(|r| r.is_infraspecific()) else {
                    continue;
                };
                let has_autonym = ranks.entry(rank).or_insert(false);
                *has_autonym |= usage.has_label(UsageLabel::Autonym);
            }
            for (rank, has_autonym) in ranks {
                if !has_autonym {
                    self.create_autonym(run, sp, rank)?;
                }
            }
        }
        Ok(())
    }

    fn create_autonym(&mut self, run: &mut SourceRun, species: NodeId, rank: Rank) -> BackboneResult<()> {
        let sp = self.graph.require(species)?.clone();
        let Ok(mut parsed) = self.parser.parse(sp.name(), Some(Rank::Species)) else {
            return Ok(());
        };
        let Some(epithet) = parsed.specific_epithet.clone() else {
            return Ok(());
        };
        parsed.infraspecific_epithet = Some(epithet);
        parsed.rank = Some(rank);
        parsed.authorship = None;
        parsed.scientific_name = parsed.canonical_name();

        let mut usage = Usage::from_parsed(&parsed, TaxonomicStatus::Accepted, Origin::Autonym)
            .with_source(&run.source, None)
            .with_kingdom(sp.kingdom);
        usage.labels.insert(UsageLabel::Autonym);
        let id = self.create(run, usage)?;
        self.attach(run, id, species)?;
        Ok(())
    }

    // ---- cleanup ----

    fn cut_synonym_cycles(&mut self, run: &mut SourceRun) -> BackboneResult<()> {
        let synonyms: Vec<NodeId> = run
            .created
            .iter()
            .copied()
            .filter(|id| !self.graph.accepted(*id).is_empty())
            .collect();

        for start in synonyms {
            let Some(first) = self.graph.accepted(start).first().copied() else {
                continue;
            };
            let mut seen = HashSet::from([start]);
            let mut current = first;
            let mut cycle = false;
            loop {
                if current == start {
                    cycle = true;
                    break;
                }
                if !seen.insert(current) {
                    break;
                }
                match self.graph.accepted(current).first() {
                    Some(next) => current = *next,
                    None => break,
                }
            }
            if !cycle {
                continue;
            }

            let usage = self.graph.require(start)?.clone();
            let key = usage.source_id.clone().unwrap_or_else(|| usage.scientific_name.clone());
            run.recover(
                BackboneError::CycleDetected(format!("synonym cycle through {}", usage)),
                Some(start),
            );
            run.stats.cycles.push(key);

            let placeholder = Usage::new(PLACEHOLDER_NAME, None, TaxonomicStatus::Doubtful)
                .with_origin(Origin::MissingAccepted)
                .with_source(&run.source, None)
                .with_kingdom(usage.kingdom);
            let accepted = self.create(run, placeholder)?;
            self.graph.remove_edge(RelType::SynonymOf, start, first)?;
            self.graph.create_edge(RelType::SynonymOf, start, accepted)?;
        }
        Ok(())
    }

    /// Point synonyms of synonyms straight at the final accepted usage
    fn relink_synonym_chains(&mut self, run: &mut SourceRun) -> BackboneResult<()> {
        let synonyms: Vec<NodeId> = run
            .created
            .iter()
            .copied()
            .filter(|id| !self.graph.accepted(*id).is_empty())
            .collect();

        for syn in synonyms {
            for target in self.graph.accepted(syn).to_vec() {
                if self.graph.accepted(target).is_empty() {
                    continue;
                }
                let mut seen = HashSet::from([syn, target]);
                let mut last = target;
                while let Some(next) = self.graph.accepted(last).first().copied() {
                    if !seen.insert(next) {
                        break;
                    }
                    last = next;
                }
                if !self.graph.accepted(last).is_empty() || last == syn {
                    continue;
                }
                debug!("Relinking synonym {} from {} to {}", syn, target, last);
                self.graph.remove_edge(RelType::SynonymOf, syn, target)?;
                if !self.graph.accepted(syn).contains(&last) {
                    self.graph.create_edge(RelType::SynonymOf, syn, last)?;
                }
            }
        }
        Ok(())
    }

    /// Synonyms never keep children; hand them to the accepted usage
    fn move_children_of_synonyms(&mut self, run: &mut SourceRun) -> BackboneResult<()> {
        let ids: Vec<NodeId> = run.created.iter().chain(run.merged.iter()).copied().collect();
        for syn in ids {
            let Some(accepted) = self.graph.accepted(syn).first().copied() else {
                continue;
            };
            if let Some(parent) = self.graph.parent(syn) {
                self.graph.remove_edge(RelType::ParentOf, parent, syn)?;
            }
            for child in self.graph.children(syn).to_vec() {
                self.graph.remove_edge(RelType::ParentOf, syn, child)?;
                run.report.push(
                    ValidationIssue::warning("ParentIsSynonym", format!("usage {} moved from synonym {} to {}", child, syn, accepted))
                        .at(child),
                );
                self.attach(run, child, accepted)?;
            }
        }
        Ok(())
    }

    /// Supersede synthesized usages nothing hangs off anymore
    fn clean_implicit_names(&mut self, run: &mut SourceRun) -> BackboneResult<()> {
        loop {
            let mut removed = 0;
            for id in run.created.clone() {
                let Some(usage) = self.graph.node(id) else { continue };
                let removable = !usage.superseded
                    && matches!(
                        usage.origin,
                        Origin::ImplicitName | Origin::VerbatimParent | Origin::VerbatimAccepted | Origin::MissingAccepted
                    )
                    && self.graph.children(id).is_empty()
                    && self.graph.synonyms(id).is_empty()
                    && self.graph.combinations(id).is_empty()
                    && self.graph.basionym(id).is_none();
                if removable {
                    debug!("Superseding unused {} usage {}", usage.origin, usage);
                    self.graph.supersede(id)?;
                    removed += 1;
                }
            }
            if removed == 0 {
                return Ok(());
            }
        }
    }

    // ---- final passes ----

    fn label_roots(&mut self) -> BackboneResult<()> {
        for id in self.graph.node_ids() {
            let Some(usage) = self.graph.node(id) else { continue };
            let is_root = !usage.superseded && !usage.is_synonym() && self.graph.parent(id).is_none();
            if usage.has_label(UsageLabel::Root) != is_root {
                self.graph.set_label(id, UsageLabel::Root, is_root)?;
            }
        }
        Ok(())
    }

    /// Classification derived from the node itself and its ancestors
    fn derived_classification(&self, id: NodeId) -> Classification {
        let mut cl = Classification::new();
        let start = match self.graph.node(id) {
            Some(u) if u.is_synonym() => match self.graph.accepted(id).first() {
                Some(acc) => *acc,
                None => return cl,
            },
            _ => id,
        };
        let chain = std::iter::once(start).chain(self.graph.ancestors(start));
        for node in chain {
            let Some(usage) = self.graph.node(node) else { continue };
            if let Some(rank) = usage.rank {
                if cl.get(rank).is_none() {
                    cl.set(rank, Some(usage.name().to_string()));
                }
            }
        }
        cl
    }

    /// Copy the nearest higher taxon names onto every usage. Usages of
    /// earlier sources only get their empty slots filled.
    fn denormalize(&mut self, run: &mut SourceRun) -> BackboneResult<()> {
        for id in self.graph.node_ids() {
            let Some(usage) = self.graph.node(id) else { continue };
            if usage.superseded {
                continue;
            }
            let derived = self.derived_classification(id);
            let mut updated = usage.clone();
            if usage.source == run.source {
                updated.classification = derived;
            } else {
                for conflict in updated.classification.patch_from(&derived) {
                    let message = format!(
                        "{} keeps {} {}, conflicting {} not applied",
                        usage, conflict.rank, conflict.existing, conflict.proposed
                    );
                    warn!("{}", message);
                    run.report
                        .push(ValidationIssue::warning("ClassificationConflict", message).at(id));
                }
            }
            if updated.kingdom == Kingdom::IncertaeSedis {
                if let Some(kingdom) = updated.classification.kingdom_enum() {
                    updated.kingdom = kingdom;
                }
            }
            if &updated != self.graph.require(id)? {
                self.graph.update_node(updated)?;
            }
        }
        Ok(())
    }

    fn finish_stats(&self, run: &mut SourceRun) {
        let mut handler = UsageMetricsHandler::new();
        walk_with_handler(&TreeWalker::accepted(self.graph), &mut handler);
        run.stats.max_depth = handler.stats().max_depth;
        run.stats.roots = self.graph.roots().len();

        for id in &run.created {
            let Some(usage) = self.graph.node(*id) else { continue };
            if usage.superseded {
                continue;
            }
            if usage.is_synonym() {
                run.stats.synonyms += 1;
            }
            *run.stats.count_by_origin.entry(usage.origin).or_insert(0) += 1;
            *run
                .stats
                .count_by_rank
                .entry(usage.rank.unwrap_or(Rank::Unranked))
                .or_insert(0) += 1;
        }
    }
}

/// Status from the verbatim value, or inferred from an accepted reference
fn record_status(record: &VerbatimRecord, parsed: &ParsedName) -> TaxonomicStatus {
    if let Some(status) = record.taxonomic_status.as_deref().and_then(TaxonomicStatus::from_verbatim) {
        return status;
    }
    let refers_elsewhere = match (&record.accepted_id, &record.id) {
        (Some(acc), Some(id)) => acc != id,
        (Some(_), None) => true,
        _ => record
            .accepted_name
            .as_deref()
            .is_some_and(|n| !n.eq_ignore_ascii_case(&parsed.scientific_name) && !n.eq_ignore_ascii_case(&parsed.canonical_name())),
    };
    if refers_elsewhere {
        TaxonomicStatus::Synonym
    } else {
        TaxonomicStatus::Accepted
    }
}

fn is_own_name(name: &str, item: &Inserted) -> bool {
    name.eq_ignore_ascii_case(&item.parsed.scientific_name) || name.eq_ignore_ascii_case(&item.parsed.canonical_name())
}

fn kingdom_compatible(existing: Kingdom, proposed: Option<Kingdom>) -> bool {
    match proposed {
        None | Some(Kingdom::IncertaeSedis) => true,
        Some(k) => existing == Kingdom::IncertaeSedis || existing == k,
    }
}

fn split_ids<'a>(value: &'a str, delimiter: &'a str) -> Vec<&'a str> {
    if delimiter.is_empty() {
        return vec![value.trim()];
    }
    value
        .split(delimiter)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NameMatch;
    use pretty_assertions::assert_eq;

    fn normalize(records: Vec<VerbatimRecord>) -> (UsageGraph, NormalizerResult) {
        normalize_with(records, NormalizerConfig::default())
    }

    fn normalize_with(records: Vec<VerbatimRecord>, config: NormalizerConfig) -> (UsageGraph, NormalizerResult) {
        let mut graph = UsageGraph::new();
        let result = GraphNormalizer::new(&mut graph, config)
            .normalize("test", records.into_iter().map(Ok))
            .unwrap();
        (graph, result)
    }

    fn find(graph: &UsageGraph, name: &str) -> NodeId {
        let ids = graph.find_by_name(name, NameMatch::Canonical);
        assert_eq!(ids.len(), 1, "expected one usage named {}", name);
        ids[0]
    }

    fn name_of(graph: &UsageGraph, id: Option<NodeId>) -> Option<String> {
        id.and_then(|i| graph.node(i)).map(|u| u.name().to_string())
    }

    #[test]
    fn test_parent_and_synonym_by_id() {
        let (graph, result) = normalize(vec![
            VerbatimRecord::new("1", "Animalia").with_rank("kingdom"),
            VerbatimRecord::new("2", "Aves").with_rank("class").with_parent("1"),
            VerbatimRecord::new("3", "Turdus merula Linnaeus, 1758").with_rank("species").with_parent("2"),
            VerbatimRecord::new("4", "Merula vulgaris Leach").with_accepted("3"),
        ]);
        let merula = find(&graph, "Turdus merula");
        let syn = find(&graph, "Merula vulgaris");
        assert_eq!(graph.node(syn).unwrap().status, TaxonomicStatus::Synonym);
        assert_eq!(graph.accepted(syn), &[merula]);
        assert_eq!(graph.parent(syn), None);

        // implicit genus between Aves and the species
        let genus = graph.parent(merula).unwrap();
        assert_eq!(graph.node(genus).unwrap().origin, Origin::ImplicitName);
        assert_eq!(name_of(&graph, Some(genus)).as_deref(), Some("Turdus"));
        assert_eq!(name_of(&graph, graph.parent(genus)).as_deref(), Some("Aves"));

        let cl = &graph.node(merula).unwrap().classification;
        assert_eq!(cl.get(Rank::Kingdom), Some("Animalia"));
        assert_eq!(cl.get(Rank::Class), Some("Aves"));
        assert_eq!(cl.get(Rank::Genus), Some("Turdus"));
        assert_eq!(graph.node(merula).unwrap().kingdom, Kingdom::Animalia);
        assert_eq!(graph.node(syn).unwrap().classification, *cl);

        assert_eq!(result.stats.records, 4);
        assert_eq!(result.stats.created, 5);
        assert_eq!(result.stats.synonyms, 1);
        assert_eq!(result.stats.roots, 1);
        assert_eq!(result.stats.max_depth, 3);
        assert_eq!(result.stats.count_by_origin(Origin::ImplicitName), 1);
        assert!(result.report.is_valid());
    }

    #[test]
    fn test_unparsable_and_duplicate_records_are_skipped() {
        let (graph, result) = normalize(vec![
            VerbatimRecord::new("1", "Aves").with_rank("class"),
            VerbatimRecord::new("2", "?"),
            VerbatimRecord::new("1", "Mammalia").with_rank("class"),
            VerbatimRecord {
                id: Some("3".into()),
                ..Default::default()
            },
        ]);
        assert_eq!(result.stats.ignored, 3);
        assert_eq!(graph.usages().count(), 1);
        assert_eq!(result.report.by_component("UnparsableName").count(), 2);
        assert_eq!(result.report.by_component("DuplicateStableId").count(), 1);
    }

    #[test]
    fn test_corrupt_stream_rolls_back() {
        let mut graph = UsageGraph::new();
        let records = vec![
            Ok(VerbatimRecord::new("1", "Aves").with_rank("class")),
            Err(BackboneError::CorruptStream("truncated".into())),
        ];
        let err = GraphNormalizer::new(&mut graph, NormalizerConfig::default())
            .normalize("broken", records)
            .unwrap_err();
        assert!(matches!(err, BackboneError::CorruptStream(_)));
        assert_eq!(graph.node_count(), 0);
        assert!(!graph.in_transaction());
    }

    #[test]
    fn test_dangling_parent_id_falls_back_to_name() {
        let (graph, result) = normalize(vec![
            VerbatimRecord::new("1", "Turdidae").with_rank("family"),
            VerbatimRecord::new("2", "Turdus").with_rank("genus").with_parent("99").with_parent_name("Turdidae"),
            VerbatimRecord::new("3", "Erithacus").with_rank("genus").with_parent("98"),
        ]);
        let turdus = find(&graph, "Turdus");
        assert_eq!(name_of(&graph, graph.parent(turdus)).as_deref(), Some("Turdidae"));
        assert_eq!(graph.parent(find(&graph, "Erithacus")), None);
        assert_eq!(result.report.by_component("DanglingReference").count(), 2);
    }

    #[test]
    fn test_missing_parent_name_creates_placeholder() {
        let (graph, result) = normalize(vec![
            VerbatimRecord::new("1", "Turdus").with_rank("genus").with_parent_name("Turdidae")
        ]);
        let parent = graph.parent(find(&graph, "Turdus")).unwrap();
        let usage = graph.node(parent).unwrap();
        assert_eq!(usage.origin, Origin::VerbatimParent);
        assert_eq!(usage.status, TaxonomicStatus::Doubtful);
        assert_eq!(usage.rank, Some(Rank::Family));
        assert_eq!(result.stats.count_by_origin(Origin::VerbatimParent), 1);
    }

    #[test]
    fn test_parent_cycle_is_dropped() {
        let (graph, result) = normalize(vec![
            VerbatimRecord::new("1", "Aidae").with_rank("family").with_parent("3"),
            VerbatimRecord::new("2", "Aus").with_rank("genus").with_parent("1"),
            VerbatimRecord::new("3", "Borales").with_rank("order").with_parent("2"),
        ]);
        assert_eq!(result.report.by_component("CycleDetected").count(), 1);
        let borales = find(&graph, "Borales");
        assert_eq!(graph.parent(borales), None);
        assert!(graph.node(borales).unwrap().has_label(UsageLabel::ValidationFailed));
        for id in graph.node_ids() {
            assert!(!graph.ancestors(id).contains(&id));
        }
    }

    #[test]
    fn test_pro_parte_synonym() {
        let (graph, _) = normalize(vec![
            VerbatimRecord::new("1", "Aus alpha").with_rank("species"),
            VerbatimRecord::new("2", "Aus beta").with_rank("species"),
            VerbatimRecord::new("3", "Aus gamma").with_rank("species").with_accepted("1|2"),
        ]);
        let syn = find(&graph, "Aus gamma");
        assert_eq!(graph.node(syn).unwrap().status, TaxonomicStatus::ProParteSynonym);
        assert_eq!(graph.accepted(syn).len(), 2);
    }

    #[test]
    fn test_synonym_without_accepted_becomes_doubtful() {
        let (graph, result) = normalize(vec![
            VerbatimRecord::new("1", "Aus alpha").with_rank("species").with_status("synonym")
        ]);
        let id = find(&graph, "Aus alpha");
        assert_eq!(graph.node(id).unwrap().status, TaxonomicStatus::Doubtful);
        assert_eq!(result.report.by_component("AcceptedNameMissing").count(), 1);
    }

    #[test]
    fn test_synonym_cycle_is_cut() {
        let (graph, result) = normalize(vec![
            VerbatimRecord::new("1", "Aus alpha").with_rank("species").with_accepted("2"),
            VerbatimRecord::new("2", "Aus beta").with_rank("species").with_accepted("1"),
        ]);
        assert_eq!(result.stats.cycles, vec!["1".to_string()]);
        assert_eq!(result.stats.count_by_origin(Origin::MissingAccepted), 1);
        let alpha = find(&graph, "Aus alpha");
        let beta = find(&graph, "Aus beta");
        let placeholder = graph.accepted(alpha)[0];
        assert_eq!(graph.node(placeholder).unwrap().origin, Origin::MissingAccepted);
        // beta was relinked from alpha to the placeholder
        assert_eq!(graph.accepted(beta), &[placeholder]);
    }

    #[test]
    fn test_synonym_chain_relinked() {
        let (graph, _) = normalize(vec![
            VerbatimRecord::new("1", "Aus alpha").with_rank("species"),
            VerbatimRecord::new("2", "Aus beta").with_rank("species").with_accepted("1"),
            VerbatimRecord::new("3", "Aus gamma").with_rank("species").with_accepted("2"),
        ]);
        let alpha = find(&graph, "Aus alpha");
        assert_eq!(graph.accepted(find(&graph, "Aus gamma")), &[alpha]);
        assert_eq!(graph.synonyms(alpha).len(), 2);
    }

    #[test]
    fn test_flat_classification_builds_chain() {
        let (graph, result) = normalize(vec![
            VerbatimRecord::new("1", "Turdus merula")
                .with_rank("species")
                .with_higher(Rank::Kingdom, "Animalia")
                .with_higher(Rank::Class, "Aves")
                .with_higher(Rank::Family, "Turdidae")
                .with_higher(Rank::Genus, "Turdus"),
            VerbatimRecord::new("2", "Turdus pilaris")
                .with_rank("species")
                .with_higher(Rank::Kingdom, "Animalia")
                .with_higher(Rank::Class, "Aves")
                .with_higher(Rank::Family, "Turdidae")
                .with_higher(Rank::Genus, "Turdus"),
        ]);
        let genus = find(&graph, "Turdus");
        assert_eq!(graph.node(genus).unwrap().origin, Origin::DenormedClassification);
        assert_eq!(graph.children(genus).len(), 2);
        assert_eq!(
            graph.parent_chain_names(genus),
            vec!["Turdidae".to_string(), "Aves".to_string(), "Animalia".to_string()]
        );
        assert_eq!(result.stats.count_by_origin(Origin::DenormedClassification), 4);
        assert_eq!(result.stats.roots, 1);
    }

    #[test]
    fn test_basionym_links() {
        let (graph, _) = normalize(vec![
            VerbatimRecord::new("1", "Picea abies (L.) H.Karst.").with_rank("species").with_basionym("2"),
            VerbatimRecord::new("2", "Pinus abies L.").with_rank("species").with_accepted("1"),
            VerbatimRecord::new("3", "Abies alba Mill.").with_rank("species").with_basionym_name("Pinus picea L."),
        ]);
        let picea = find(&graph, "Picea abies");
        let pinus = find(&graph, "Pinus abies");
        assert_eq!(graph.basionym(picea), Some(pinus));
        assert!(graph.node(pinus).unwrap().has_label(UsageLabel::Basionym));

        let alba = find(&graph, "Abies alba");
        let materialized = graph.basionym(alba).unwrap();
        let usage = graph.node(materialized).unwrap();
        assert_eq!(usage.origin, Origin::VerbatimBasionym);
        assert_eq!(usage.status, TaxonomicStatus::Synonym);
        assert_eq!(graph.accepted(materialized), &[alba]);
    }

    #[test]
    fn test_autonyms() {
        let (graph, result) = normalize(vec![
            VerbatimRecord::new("1", "Abies alba").with_rank("species"),
            VerbatimRecord::new("2", "Abies alba var. acutifolia").with_rank("variety").with_parent("1"),
            VerbatimRecord::new("3", "Abies alba subsp. alba").with_rank("subspecies"),
            VerbatimRecord::new("4", "Abies alba subsp. apennina").with_rank("subspecies").with_parent("1"),
        ]);
        let alba = find(&graph, "Abies alba");
        // parsed autonym placed under its species without a parent reference
        assert_eq!(graph.parent(find(&graph, "Abies alba alba")), Some(alba));
        // the variety got a created autonym, the subspecies already had one
        let created = find(&graph, "Abies alba var. alba");
        assert_eq!(graph.node(created).unwrap().origin, Origin::Autonym);
        assert!(graph.node(created).unwrap().has_label(UsageLabel::Autonym));
        assert_eq!(graph.parent(created), Some(alba));
        assert_eq!(result.stats.count_by_origin(Origin::Autonym), 1);
    }

    #[test]
    fn test_autonym_creation_can_be_disabled() {
        let config = NormalizerConfig {
            create_autonyms: false,
            ..Default::default()
        };
        let (_, result) = normalize_with(
            vec![
                VerbatimRecord::new("1", "Abies alba").with_rank("species"),
                VerbatimRecord::new("2", "Abies alba var. acutifolia").with_rank("variety").with_parent("1"),
            ],
            config,
        );
        assert_eq!(result.stats.count_by_origin(Origin::Autonym), 0);
    }

    #[test]
    fn test_children_of_synonyms_move_to_accepted() {
        let (graph, result) = normalize(vec![
            VerbatimRecord::new("1", "Merula").with_rank("genus").with_accepted("2"),
            VerbatimRecord::new("2", "Turdus").with_rank("genus"),
            VerbatimRecord::new("3", "Merula nigra").with_rank("species").with_parent("1"),
        ]);
        let turdus = find(&graph, "Turdus");
        assert_eq!(graph.parent(find(&graph, "Merula nigra")), Some(turdus));
        assert_eq!(result.report.by_component("ParentIsSynonym").count(), 1);
    }

    #[test]
    fn test_unused_synthesized_names_are_superseded() {
        let mut graph = UsageGraph::new();
        let mut normalizer = GraphNormalizer::new(&mut graph, NormalizerConfig::default());
        let mut run = SourceRun::new("test");
        normalizer.graph.begin().unwrap();
        let synthesized = |name: &str, rank: Rank, origin: Origin| {
            Usage::new(name, Some(rank), TaxonomicStatus::Doubtful).with_origin(origin)
        };
        let genus = normalizer
            .create(&mut run, synthesized("Aus", Rank::Genus, Origin::ImplicitName))
            .unwrap();
        let species = normalizer
            .create(&mut run, synthesized("Aus alpha", Rank::Species, Origin::VerbatimParent))
            .unwrap();
        let kept = normalizer
            .create(&mut run, synthesized("Bus", Rank::Genus, Origin::ImplicitName))
            .unwrap();
        let child = normalizer
            .create(&mut run, Usage::new("Bus beta", Some(Rank::Species), TaxonomicStatus::Accepted))
            .unwrap();
        normalizer.graph.create_edge(RelType::ParentOf, genus, species).unwrap();
        normalizer.graph.create_edge(RelType::ParentOf, kept, child).unwrap();

        normalizer.clean_implicit_names(&mut run).unwrap();
        normalizer.graph.commit().unwrap();

        let graph = normalizer.graph();
        // the genus only loses its last child in the first round
        assert!(graph.node(species).unwrap().superseded);
        assert!(graph.node(genus).unwrap().superseded);
        assert!(!graph.node(kept).unwrap().superseded);
        assert_eq!(graph.children(kept), &[child]);
    }

    #[test]
    fn test_own_accepted_name_is_not_a_synonym() {
        let (graph, result) = normalize(vec![VerbatimRecord::new("1", "Turdus merula")
            .with_rank("species")
            .with_accepted_name("Turdus merula")]);
        let merula = find(&graph, "Turdus merula");
        assert_eq!(graph.node(merula).unwrap().status, TaxonomicStatus::Accepted);
        assert_eq!(result.stats.synonyms, 0);
        // plus the implicit genus
        assert_eq!(graph.usages().count(), 2);
    }

    #[test]
    fn test_merge_second_source_patches_gap() {
        let mut graph = UsageGraph::new();
        let mut normalizer = GraphNormalizer::new(&mut graph, NormalizerConfig::default());
        normalizer
            .normalize(
                "A",
                vec![
                    VerbatimRecord::new("1", "Animalia").with_rank("kingdom"),
                    VerbatimRecord::new("2", "Aves").with_rank("class").with_parent("1"),
                    VerbatimRecord::new("3", "Turdidae").with_rank("family").with_parent("2"),
                ]
                .into_iter()
                .map(Ok),
            )
            .unwrap();
        let result = normalizer
            .normalize(
                "B",
                vec![
                    VerbatimRecord::new("a", "Aves").with_rank("class"),
                    VerbatimRecord::new("b", "Passeriformes").with_rank("order").with_parent("a"),
                    VerbatimRecord::new("c", "Turdidae").with_rank("family").with_parent("b"),
                ]
                .into_iter()
                .map(Ok),
            )
            .unwrap();
        assert_eq!(result.stats.merged, 2);
        assert_eq!(result.stats.created, 1);

        let turdidae = find(&graph, "Turdidae");
        assert_eq!(name_of(&graph, graph.parent(turdidae)).as_deref(), Some("Passeriformes"));
        let usage = graph.node(turdidae).unwrap();
        assert_eq!(usage.classification.get(Rank::Order), Some("Passeriformes"));
        assert_eq!(usage.merged_ids, vec!["B:c".to_string()]);
        assert_eq!(graph.roots().len(), 1);
    }

    #[test]
    fn test_split_ids() {
        assert_eq!(split_ids("1| 2 ||3", "|"), vec!["1", "2", "3"]);
        assert_eq!(split_ids("1|2", ""), vec!["1|2"]);
    }
}
