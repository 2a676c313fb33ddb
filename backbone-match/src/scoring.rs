//! Confidence factors for a single candidate
//!
//! Every function returns an additive score. Positive values are evidence
//! for the candidate, negative ones against it. Disagreement always costs
//! more than agreement earns.

use crate::matcher::MatchType;
use crate::similarity::StringSimilarity;
use backbone_core::{Classification, Kingdom, NameType, Rank, TaxonomicStatus};

/// Kingdoms that are often confused with each other
const VAGUE_KINGDOMS: [Kingdom; 6] = [
    Kingdom::Archaea,
    Kingdom::Bacteria,
    Kingdom::Fungi,
    Kingdom::Chromista,
    Kingdom::Protozoa,
    Kingdom::IncertaeSedis,
];

fn clamp(min: i32, max: i32, value: i32) -> i32 {
    value.clamp(min, max)
}

/// Multiply negative scores only
pub fn inc_neg_score(score: i32, factor: i32) -> i32 {
    if score < 0 {
        score * factor
    } else {
        score
    }
}

/// Virus names and hybrid formulas are trusted more when equal
fn is_strict_type(name_type: Option<NameType>) -> bool {
    matches!(name_type, Some(NameType::Virus | NameType::Hybrid))
}

/// Exact names score 100 and more, fuzzy names their similarity minus 5
/// with a bonus when the candidate genus prefixes the query.
pub fn name_similarity(
    similarity: &dyn StringSimilarity,
    query_type: Option<NameType>,
    query: &str,
    candidate: &str,
) -> i32 {
    if query.to_lowercase() == candidate.to_lowercase() {
        let mut confidence = 100;
        if is_strict_type(query_type) {
            confidence += 20;
        } else if query.contains(' ') {
            confidence += 10;
        }
        return confidence;
    }

    let mut confidence = similarity.similarity(query, candidate) as i32 - 5;
    if let Some((genus, _)) = candidate.split_once(' ') {
        if !genus.is_empty() && query.starts_with(genus) {
            confidence += 5;
        } else {
            confidence -= 10;
        }
    }
    confidence
}

fn kingdom_of(classification: &Classification) -> Option<Kingdom> {
    classification.kingdom_enum()
}

fn in_kingdoms(classification: &Classification, kingdoms: &[Kingdom]) -> bool {
    kingdom_of(classification).is_some_and(|k| kingdoms.contains(&k))
}

fn filled(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Compare one classification slot: `matching` when both carry the same
/// name, `mismatching` when both carry different names, `unknown` otherwise
pub fn compare_higher(
    rank: Rank,
    query: &Classification,
    reference: &Classification,
    matching: i32,
    mismatching: i32,
    unknown: i32,
) -> i32 {
    match (filled(query.get(rank)), filled(reference.get(rank))) {
        (Some(q), Some(r)) => {
            let equal = if rank == Rank::Kingdom {
                match (Kingdom::from_name(q), Kingdom::from_name(r)) {
                    (Some(kq), Some(kr)) => kq == kr,
                    _ => q.eq_ignore_ascii_case(r),
                }
            } else {
                q.eq_ignore_ascii_case(r)
            };
            if equal {
                matching
            } else {
                mismatching
            }
        }
        _ => unknown,
    }
}

/// Agreement of the higher classification, -60 to 50
pub fn classification_similarity(query: &Classification, reference: &Classification) -> i32 {
    let plant_or_animal = [Kingdom::Animalia, Kingdom::Plantae];

    let mut rate = compare_higher(Rank::Kingdom, query, reference, 5, -10, -1);
    if rate == -10 {
        if in_kingdoms(query, &plant_or_animal) && in_kingdoms(reference, &plant_or_animal) {
            rate = -51;
        } else if in_kingdoms(query, &plant_or_animal)
            && in_kingdoms(reference, &[Kingdom::Bacteria, Kingdom::Archaea, Kingdom::Viruses])
        {
            rate = -31;
        }
    }
    // Virus names are rare, avoid false virus matches
    if in_kingdoms(reference, &[Kingdom::Viruses]) {
        rate -= 10;
    }

    rate += compare_higher(Rank::Phylum, query, reference, 10, -10, -1);
    rate += compare_higher(Rank::Class, query, reference, 15, -10, 0);
    rate += compare_higher(Rank::Order, query, reference, 15, -10, 0);
    rate += compare_higher(Rank::Family, query, reference, 25, -15, 0);
    // The genus is usually part of the name already
    rate += compare_higher(Rank::Genus, query, reference, 2, 1, 0);

    clamp(-60, 50, rate)
}

/// Rank agreement, -35 to 6, zero when nothing is known
pub fn rank_similarity(query: Option<Rank>, reference: Option<Rank>) -> i32 {
    let mut similarity = 0;
    match (query, reference) {
        (_, Some(reference)) => {
            if reference.is_uncomparable() {
                similarity -= 3;
            }
            if let Some(query) = query {
                if query == reference {
                    similarity += 10;
                } else if query.is_uncomparable() || reference.is_uncomparable() {
                    similarity = 0;
                } else if differ_in_epithets(query, reference) || differ_in_epithets(reference, query) {
                    similarity -= 30;
                } else if query.is_suprageneric() != reference.is_suprageneric() {
                    // Genus homonyms of higher taxa like Vertebrata
                    similarity -= 35;
                } else {
                    similarity -= (i32::from(reference.ordinal()) - i32::from(query.ordinal())).abs();
                }
            }
        }
        (Some(_), None) => similarity -= 1,
        (None, None) => {}
    }
    clamp(-35, 6, similarity)
}

/// A candidate of this rank can never be the query, whatever its name score.
///
/// True when the ranks imply a different number of epithets, e.g. a species
/// query against a class or a subspecies. Unknown and uncomparable ranks are
/// never incompatible.
pub fn rank_incompatible(query: Option<Rank>, reference: Option<Rank>) -> bool {
    match (query, reference) {
        (Some(query), Some(reference)) => {
            query != reference
                && !query.is_uncomparable()
                && !reference.is_uncomparable()
                && (differ_in_epithets(query, reference) || differ_in_epithets(reference, query))
        }
        _ => false,
    }
}

fn differ_in_epithets(a: Rank, b: Rank) -> bool {
    (a == Rank::Species && b.is_infraspecific()) || (a.is_supraspecific() && b.is_species_or_below())
}

/// Kingdom agreement used in strict mode, -10 to 10
pub fn kingdom_similarity(query: Option<Kingdom>, reference: Option<Kingdom>) -> i32 {
    let (Some(q), Some(r)) = (query, reference) else {
        return 0;
    };
    if q == Kingdom::IncertaeSedis || r == Kingdom::IncertaeSedis {
        7
    } else if q == r {
        10
    } else if VAGUE_KINGDOMS.contains(&q) && VAGUE_KINGDOMS.contains(&r) {
        8
    } else {
        -10
    }
}

pub fn status_score(status: TaxonomicStatus) -> i32 {
    match status {
        TaxonomicStatus::Accepted => 1,
        TaxonomicStatus::Doubtful => -5,
        TaxonomicStatus::Synonym | TaxonomicStatus::ProParteSynonym => 0,
    }
}

/// Fuzzy species hits for indetermined "Genus indet" queries are unlikely
pub fn homonym_penalty(query: &str, match_type: MatchType, rank: Option<Rank>) -> i32 {
    let species = rank.is_some_and(|r| r.is_species_or_below());
    if match_type == MatchType::Fuzzy && species && query.ends_with(" indet") {
        -25
    } else {
        0
    }
}

/// Map a raw score onto 0 to 100.
///
/// Scores up to 80 stay unchanged, higher ones are compressed
/// logarithmically so that 100 becomes 93 and 175 reaches the maximum.
pub fn norm_confidence(score: i32) -> i32 {
    let value = if score <= 80 {
        score
    } else {
        let s = f64::from(score);
        (75.8 + 26.0 * (((s - 70.0) * 1.5).log10() - 1.0)).round() as i32
    };
    clamp(0, 100, value)
}
