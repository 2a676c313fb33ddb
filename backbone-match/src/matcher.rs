//! Name matching against a [`MatchingIndex`]
//!
//! A query is scored against every index hit, the best candidate is picked
//! and homonyms are either resolved through their classification or left
//! unmatched. Queries that do not match directly fall back to their species,
//! genus and finally the names of their classification.

use crate::index::{IndexEntry, MatchingIndex, NameHit};
use crate::scoring::{
    classification_similarity, homonym_penalty, inc_neg_score, kingdom_similarity, name_similarity,
    norm_confidence, rank_incompatible, rank_similarity, status_score,
};
use backbone_core::{Classification, NameType, NodeId, ParsedName, Rank};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Instant;
use tracing::{debug, trace};

/// Ranks tried when equal candidates only share a higher taxon, lowest first
const LOWEST_DENOMINATOR_RANKS: [Rank; 7] = [
    Rank::Species,
    Rank::Genus,
    Rank::Family,
    Rank::Order,
    Rank::Class,
    Rank::Phylum,
    Rank::Kingdom,
];

/// How a result relates to the query name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Fuzzy,
    /// Matched a taxon above the one asked for
    HigherRank,
    None,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchType::Exact => "exact",
            MatchType::Fuzzy => "fuzzy",
            MatchType::HigherRank => "higher_rank",
            MatchType::None => "none",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    Name,
    Classification,
    Kingdom,
    Rank,
    Status,
    Homonym,
    NextMatch,
}

/// One additive part of a candidate's raw score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreFactor {
    pub kind: FactorKind,
    pub value: i32,
}

impl ScoreFactor {
    fn new(kind: FactorKind, value: i32) -> Self {
        Self { kind, value }
    }
}

/// A scored index entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub usage: IndexEntry,
    /// Accepted entry when `usage` is a synonym
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted: Option<IndexEntry>,
    pub match_type: MatchType,
    pub confidence: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub factors: Vec<ScoreFactor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl MatchCandidate {
    pub fn id(&self) -> NodeId {
        self.usage.id
    }

    pub fn is_synonym(&self) -> bool {
        self.usage.is_synonym()
    }

    pub fn factor(&self, kind: FactorKind) -> Option<i32> {
        self.factors.iter().find(|f| f.kind == kind).map(|f| f.value)
    }

    fn add_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

/// A name to match plus whatever else is known about it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchQuery {
    pub name: String,
    pub rank: Option<Rank>,
    pub classification: Classification,
    /// Exact and normalized names only, never fall back to higher taxa
    pub strict: bool,
    /// Record scoring notes on candidates
    pub verbose: bool,
    /// Entries that must not match, neither directly nor as a parent
    pub exclude: HashSet<NodeId>,
}

impl MatchQuery {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_rank(mut self, rank: Rank) -> Self {
        self.rank = Some(rank);
        self
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = classification;
        self
    }

    pub fn with_kingdom(mut self, kingdom: &str) -> Self {
        self.classification.set(Rank::Kingdom, Some(kingdom.to_string()));
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    pub fn exclude(mut self, id: NodeId) -> Self {
        self.exclude.insert(id);
        self
    }
}

/// Outcome of a match. `best` is empty exactly when `match_type` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub best: Option<MatchCandidate>,
    pub match_type: MatchType,
    pub confidence: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<MatchCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl MatchResult {
    pub fn none(confidence: i32, note: Option<String>, alternatives: Vec<MatchCandidate>) -> Self {
        Self {
            best: None,
            match_type: MatchType::None,
            confidence,
            alternatives,
            note,
        }
    }

    fn matched(best: MatchCandidate, alternatives: Vec<MatchCandidate>) -> Self {
        let note = (!best.notes.is_empty()).then(|| best.notes.join("; "));
        Self {
            match_type: best.match_type,
            confidence: best.confidence,
            alternatives: dedup_alternatives(best.id(), alternatives),
            note,
            best: Some(best),
        }
    }

    pub fn is_match(&self) -> bool {
        self.match_type != MatchType::None && self.best.is_some()
    }

    pub fn usage_id(&self) -> Option<NodeId> {
        self.best.as_ref().map(MatchCandidate::id)
    }

    pub fn scientific_name(&self) -> Option<&str> {
        self.best.as_ref().map(|b| b.usage.scientific_name.as_str())
    }

    /// The same result with a synonym best match replaced by its accepted entry
    pub fn accepted_view(&self) -> MatchResult {
        let mut view = self.clone();
        let Some(best) = view.best.as_mut() else {
            return view;
        };
        if let Some(accepted) = best.accepted.take() {
            let note = format!(
                "{} is a synonym of {}",
                best.usage.scientific_name, accepted.scientific_name
            );
            best.usage = accepted;
            best.add_note(note.clone());
            view.note = Some(match view.note.take() {
                Some(existing) => format!("{}; {}", existing, note),
                None => note,
            });
        }
        view
    }

    /// Turn a fallback hit into a higher rank match of the original query
    fn into_higher(mut self, first: MatchResult) -> MatchResult {
        self.match_type = MatchType::HigherRank;
        if let Some(best) = self.best.as_mut() {
            best.match_type = MatchType::HigherRank;
            let mut alternatives = first.alternatives;
            alternatives.append(&mut self.alternatives);
            self.alternatives = dedup_alternatives(best.id(), alternatives);
        }
        self
    }
}

/// Unique alternatives without the best match, first occurrence wins
fn dedup_alternatives(best: NodeId, alternatives: Vec<MatchCandidate>) -> Vec<MatchCandidate> {
    let mut seen = HashSet::from([best]);
    alternatives.into_iter().filter(|a| seen.insert(a.id())).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchingMode {
    Fuzzy,
    Strict,
    Higher,
}

/// Control characters and odd whitespace become single spaces
fn clean_name(name: &str) -> String {
    name.split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keep the first word of every slot, e.g. "Aves (Linnaeus)" becomes "Aves"
fn clean_classification(classification: &Classification) -> Classification {
    let mut cleaned = Classification::new();
    for (rank, value) in classification.iter() {
        let first: String = clean_name(value)
            .chars()
            .skip_while(|c| !c.is_alphanumeric())
            .take_while(|c| c.is_alphanumeric() || *c == '-')
            .collect();
        cleaned.set(rank, Some(first));
    }
    cleaned
}

fn is_single_case(name: &str) -> bool {
    name.to_lowercase() == name || name.to_uppercase() == name
}

/// True when the first linnean rank above genus both carry differs
fn next_above_genus_differs(a: &Classification, b: &Classification) -> bool {
    let mut rank = Rank::Genus.next_higher_linnean();
    while let Some(r) = rank {
        if let (Some(x), Some(y)) = (a.get(r), b.get(r)) {
            return x != y;
        }
        rank = r.next_higher_linnean();
    }
    false
}

/// Within `threshold` of the best candidate but classified differently down to `rank`
fn similar_but_span_rank(candidates: &[MatchCandidate], threshold: i32, rank: Rank) -> bool {
    let Some(best) = candidates.first() else {
        return false;
    };
    candidates[1..]
        .iter()
        .take_while(|c| best.confidence - c.confidence <= threshold)
        .any(|c| !best.usage.classification.equal_up_to(&c.usage.classification, Some(rank)))
}

impl MatchingIndex {
    /// Match a query, falling back to higher taxa unless it is strict
    pub fn match_name(&self, query: &MatchQuery) -> MatchResult {
        let started = Instant::now();
        let result = self.match_internal(query);
        debug!(
            "{} match of {:?} >{}< to {:?} [{}] in {:?}",
            result.match_type,
            query.rank,
            query.name,
            result.usage_id(),
            result.scientific_name().unwrap_or_default(),
            started.elapsed()
        );
        result
    }

    /// Resolve an id directly, superseded entries included
    pub fn match_by_id(&self, id: NodeId) -> Option<MatchCandidate> {
        self.entry(id).map(|entry| {
            let mut candidate = self.candidate(entry, MatchType::Exact);
            candidate.confidence = 100;
            candidate
        })
    }

    fn candidate(&self, entry: &IndexEntry, match_type: MatchType) -> MatchCandidate {
        MatchCandidate {
            usage: entry.clone(),
            accepted: entry.accepted_id.and_then(|id| self.entry(id)).cloned(),
            match_type,
            confidence: 0,
            factors: Vec::new(),
            notes: Vec::new(),
        }
    }

    fn match_internal(&self, query: &MatchQuery) -> MatchResult {
        let verbose = query.verbose || self.config().verbose;
        let name = clean_name(&query.name);
        let mut classification = clean_classification(&query.classification);
        let mut rank = query.rank;
        let mut mode = if query.strict { MatchingMode::Strict } else { MatchingMode::Fuzzy };
        let mut query_type = None;
        let mut parsed: Option<ParsedName> = None;
        let mut canonical = name.clone();

        if name.is_empty() {
            return MatchResult::none(100, Some("No name given".to_string()), Vec::new());
        }

        if is_single_case(&name) {
            // Cannot be parsed reliably, use as is
            debug!("All upper or lower case name, not parsing: {}", name);
            mode = MatchingMode::Strict;
            rank.get_or_insert(Rank::Unranked);
        } else {
            match self.parser.parse(&name, rank) {
                Ok(pn) => {
                    query_type = Some(pn.name_type);
                    if pn.name_type.is_parsable() {
                        canonical = if pn.name_type == NameType::Informal {
                            format!("{} indet", pn.genus_or_above)
                        } else {
                            pn.canonical_name()
                        };
                        if classification.genus.is_none() && pn.rank.is_some_and(|r| r.is_infrageneric()) {
                            classification.genus = Some(pn.genus_or_above.clone());
                        }
                        rank = rank.or(pn.rank);
                        parsed = Some(pn);
                    } else {
                        debug!("Unparsable {:?} name, no fuzzy matching for {}", pn.name_type, name);
                        mode = MatchingMode::Strict;
                    }
                }
                Err(err) => {
                    debug!("Unparsable name {}: {}", name, err);
                    mode = MatchingMode::Strict;
                }
            }
        }

        let first = self.score_and_select(query_type, &canonical, rank, &classification, query, mode, verbose);

        // The name is known, but only at ranks the query rules out
        if !first.is_match() {
            let (compatible, rejected) = self.compatible_hits(&canonical, rank, mode == MatchingMode::Fuzzy);
            if compatible.is_empty() && rejected > 0 {
                debug!("{} only exists at ranks incompatible with {:?}", canonical, rank);
                return first;
            }
        }

        // A fuzzy species in another family is worse than its genus
        if let (Some(pn), Some(best)) = (&parsed, &first.best) {
            let species = best.usage.rank.is_some_and(|r| r.is_species_or_below());
            if first.match_type == MatchType::Fuzzy
                && species
                && !best.usage.canonical_name.starts_with(&format!("{} ", pn.genus_or_above))
                && next_above_genus_differs(&classification, &best.usage.classification)
            {
                let genus = self.score_and_select(
                    Some(pn.name_type),
                    &pn.genus_or_above,
                    Some(Rank::Genus),
                    &classification,
                    query,
                    MatchingMode::Higher,
                    verbose,
                );
                if genus.is_match() && genus.best.as_ref().and_then(|b| b.usage.rank) == Some(Rank::Genus) {
                    return genus.into_higher(first);
                }
            }
        }

        if first.is_match() || query.strict {
            return first;
        }

        let mut supra_only = false;
        if let Some(pn) = &parsed {
            if pn.specific_epithet.is_some() || rank.is_some_and(|r| r.is_infrageneric()) {
                if pn.infraspecific_epithet.is_some() || rank.is_some_and(|r| r.is_infraspecific()) {
                    if let Some(species) = pn.canonical_species_name() {
                        let result = self.score_and_select(
                            Some(pn.name_type),
                            &species,
                            Some(Rank::Species),
                            &classification,
                            query,
                            MatchingMode::Fuzzy,
                            verbose,
                        );
                        if result.is_match() {
                            return result.into_higher(first);
                        }
                    }
                }

                // Might not be a genus at all, e.g. a phylum name with a descriptor
                let result = self.score_and_select(
                    Some(pn.name_type),
                    &pn.genus_or_above,
                    None,
                    &classification,
                    query,
                    MatchingMode::Higher,
                    verbose,
                );
                if result.is_match() {
                    return result.into_higher(first);
                }
                supra_only = true;
            }
        }

        for higher in [
            Rank::Genus,
            Rank::Family,
            Rank::Order,
            Rank::Class,
            Rank::Phylum,
            Rank::Kingdom,
        ] {
            if supra_only && !higher.is_suprageneric() {
                continue;
            }
            let Some(higher_name) = classification.get(higher).map(str::to_string) else { continue };
            let result = self.score_and_select(
                None,
                &higher_name,
                Some(higher),
                &classification,
                query,
                MatchingMode::Higher,
                verbose,
            );
            if result.is_match() {
                return result.into_higher(first);
            }
        }

        debug!("No match for name {}", canonical);
        MatchResult::none(100, first.note, first.alternatives)
    }

    fn score(
        &self,
        candidate: &mut MatchCandidate,
        query_type: Option<NameType>,
        canonical: &str,
        rank: Option<Rank>,
        classification: &Classification,
        mode: MatchingMode,
    ) {
        let entry = &candidate.usage;
        let mut factors = Vec::with_capacity(5);
        match mode {
            MatchingMode::Fuzzy => {
                factors.push(ScoreFactor::new(
                    FactorKind::Name,
                    name_similarity(&self.similarity, query_type, canonical, &entry.canonical_name),
                ));
                factors.push(ScoreFactor::new(
                    FactorKind::Classification,
                    classification_similarity(classification, &entry.classification),
                ));
                factors.push(ScoreFactor::new(FactorKind::Rank, rank_similarity(rank, entry.rank)));
                factors.push(ScoreFactor::new(FactorKind::Status, status_score(entry.status)));
                factors.push(ScoreFactor::new(
                    FactorKind::Homonym,
                    homonym_penalty(canonical, candidate.match_type, entry.rank),
                ));
            }
            MatchingMode::Higher => {
                factors.push(ScoreFactor::new(
                    FactorKind::Name,
                    name_similarity(&self.similarity, None, canonical, &entry.canonical_name),
                ));
                factors.push(ScoreFactor::new(
                    FactorKind::Classification,
                    classification_similarity(classification, &entry.classification),
                ));
                factors.push(ScoreFactor::new(FactorKind::Rank, rank_similarity(rank, entry.rank) * 2));
                factors.push(ScoreFactor::new(FactorKind::Status, status_score(entry.status)));
            }
            MatchingMode::Strict => {
                factors.push(ScoreFactor::new(
                    FactorKind::Name,
                    name_similarity(&self.similarity, query_type, canonical, &entry.canonical_name),
                ));
                factors.push(ScoreFactor::new(
                    FactorKind::Kingdom,
                    inc_neg_score(kingdom_similarity(classification.kingdom_enum(), Some(entry.kingdom)), 10),
                ));
                factors.push(ScoreFactor::new(
                    FactorKind::Rank,
                    inc_neg_score(rank_similarity(rank, entry.rank), 10),
                ));
                factors.push(ScoreFactor::new(FactorKind::Status, status_score(entry.status)));
            }
        }
        candidate.confidence = factors.iter().map(|f| f.value).sum();
        candidate.factors = factors;
        trace!("{} scores {} as {:?}", entry.scientific_name, candidate.confidence, candidate.factors);
    }

    /// Score all hits of one name and pick the best
    #[allow(clippy::too_many_arguments)]
    fn score_and_select(
        &self,
        query_type: Option<NameType>,
        canonical: &str,
        rank: Option<Rank>,
        classification: &Classification,
        query: &MatchQuery,
        mode: MatchingMode,
        verbose: bool,
    ) -> MatchResult {
        if canonical.trim().is_empty() {
            return MatchResult::none(100, Some("No name given".to_string()), Vec::new());
        }

        let (hits, rejected) = self.compatible_hits(canonical, rank, mode == MatchingMode::Fuzzy);
        if hits.is_empty() && rejected > 0 {
            let rank = rank.map(|r| r.to_string()).unwrap_or_default();
            return MatchResult::none(
                100,
                Some(format!("{} only exists at ranks incompatible with {}", canonical, rank)),
                Vec::new(),
            );
        }

        let mut candidates: Vec<MatchCandidate> = hits
            .into_iter()
            .map(|hit| {
                let mut candidate = self.candidate(hit.entry, hit.match_type);
                self.score(&mut candidate, query_type, canonical, rank, classification, mode);
                candidate
            })
            .collect();

        for candidate in candidates.iter_mut() {
            let excluded_by = if query.exclude.contains(&candidate.id()) {
                Some(candidate.id())
            } else {
                Rank::LINNEAN
                    .iter()
                    .filter_map(|r| candidate.usage.higher_id(*r))
                    .find(|id| query.exclude.contains(id))
            };
            if let Some(id) = excluded_by {
                candidate.confidence = 0;
                candidate.add_note(format!("excluded by {}", id));
            }
        }

        candidates.sort_by(|a, b| {
            b.confidence
                .cmp(&a.confidence)
                .then_with(|| a.usage.scientific_name.cmp(&b.usage.scientific_name))
                .then_with(|| a.id().cmp(&b.id()))
        });
        if verbose {
            for candidate in candidates.iter_mut() {
                let note = format!("score={}", candidate.confidence);
                candidate.add_note(note);
            }
        }

        if candidates.is_empty() {
            return MatchResult::none(100, None, Vec::new());
        }

        let best_confidence = candidates[0].confidence;
        let mut best = candidates[0].clone();
        let distance = if candidates.len() == 1 {
            if verbose {
                best.add_note("singleMatch=5");
            }
            5
        } else {
            let second_confidence = candidates[1].confidence;
            let margin = self.config().ambiguity_margin;
            let ambiguous = similar_but_span_rank(&candidates, margin, Rank::Class);

            if best_confidence == second_confidence || ambiguous {
                let threshold = if ambiguous { margin } else { 0 };
                let suitable: Vec<&MatchCandidate> = candidates
                    .iter()
                    .take_while(|c| best_confidence - c.confidence <= threshold)
                    .collect();
                let same_classification = suitable
                    .iter()
                    .all(|c| c.usage.classification.equal_up_to(&candidates[0].usage.classification, None));

                if same_classification {
                    // Synonym homonyms: the oldest usage wins
                    if let Some(oldest) = suitable.iter().min_by_key(|c| c.id()) {
                        best = (*oldest).clone();
                    }
                    best.add_note(format!("{} synonym homonyms", suitable.len()));
                } else {
                    match self.lowest_denominator(&suitable) {
                        Some(higher) => best = higher,
                        None => {
                            let alternatives = normalized(candidates);
                            return MatchResult::none(
                                99,
                                Some(format!("Multiple equal matches for {}", canonical)),
                                alternatives,
                            );
                        }
                    }
                }
            }

            let distance = ((best_confidence - second_confidence) / 2).min(5);
            if verbose {
                best.add_note(format!("nextMatch={}", distance));
            }
            distance
        };

        best.factors.push(ScoreFactor::new(FactorKind::NextMatch, distance));
        best.confidence = norm_confidence(best_confidence + distance);

        let min_confidence = match mode {
            MatchingMode::Higher => self.config().min_confidence_higher,
            _ => self.config().min_confidence,
        };
        let best_id = best.id();
        let alternatives = normalized(candidates.into_iter().filter(|c| c.id() != best_id).collect());
        if best.confidence < min_confidence {
            let mut alternatives = alternatives;
            alternatives.insert(0, best);
            return MatchResult::none(
                99,
                Some("No match because of too little confidence".to_string()),
                alternatives,
            );
        }
        MatchResult::matched(best, alternatives)
    }

    /// Name hits whose rank can be the query, and how many were rejected
    fn compatible_hits(&self, canonical: &str, rank: Option<Rank>, fuzzy: bool) -> (Vec<NameHit<'_>>, usize) {
        let (compatible, rejected): (Vec<NameHit<'_>>, Vec<NameHit<'_>>) = self
            .match_by_name(canonical, fuzzy)
            .into_iter()
            .partition(|hit| !rank_incompatible(rank, hit.entry.rank));
        for hit in &rejected {
            trace!("{} rejected, {:?} cannot be {:?}", hit.entry.scientific_name, hit.entry.rank, rank);
        }
        (compatible, rejected.len())
    }

    /// Lowest taxon shared by all equally good candidates
    fn lowest_denominator(&self, candidates: &[&MatchCandidate]) -> Option<MatchCandidate> {
        let first = candidates.first()?;
        for rank in LOWEST_DENOMINATOR_RANKS {
            let Some(key) = first.usage.higher_id(rank) else { continue };
            if candidates.iter().all(|c| c.usage.higher_id(rank) == Some(key)) {
                if let Some(entry) = self.entry(key).filter(|e| !e.superseded) {
                    let mut higher = self.candidate(entry, MatchType::HigherRank);
                    higher.add_note(format!("Lowest common {} of {} equal matches", rank, candidates.len()));
                    return Some(higher);
                }
            }
        }
        None
    }
}

/// Candidates with their raw scores mapped onto 0 to 100
fn normalized(candidates: Vec<MatchCandidate>) -> Vec<MatchCandidate> {
    candidates
        .into_iter()
        .map(|mut c| {
            c.confidence = norm_confidence(c.confidence);
            c
        })
        .collect()
}
