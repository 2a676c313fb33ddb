/// Scientific name parsing
use super::Rank;
use crate::{BackboneError, BackboneResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static MONOMIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][a-zäëïöü]+(?:-[A-Za-z][a-z]+)?$").unwrap());
static EPITHET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zäëïöü][a-zäëïöü-]+$").unwrap());
static INFRAGENERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\(([A-Z][a-z]+)\)$").unwrap());
static VIRUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:virus|viruses|viroid|phage)\b").unwrap());
static HYBRID_FORMULA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][a-z]+(?: [a-z]+)? [x×] [A-Z][a-z]+").unwrap());
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:incertae sedis|unknown|unassigned|not assigned|none|\?+)$").unwrap()
});
static INDET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:sp|spp|spec|indet)\.?$").unwrap());

/// Kind of a scientific name string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameType {
    Scientific,
    Virus,
    Hybrid,
    /// Indetermined names like "Abies spec."
    Informal,
    Placeholder,
    NoName,
}

impl NameType {
    /// Names with a structured genus and epithets
    pub fn is_parsable(&self) -> bool {
        matches!(self, NameType::Scientific | NameType::Informal)
    }
}

/// A scientific name split into its parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedName {
    pub scientific_name: String,
    pub genus_or_above: String,
    pub infrageneric: Option<String>,
    pub specific_epithet: Option<String>,
    pub infraspecific_epithet: Option<String>,
    pub rank: Option<Rank>,
    pub authorship: Option<String>,
    pub hybrid: bool,
    pub name_type: NameType,
}

impl ParsedName {
    /// Unstructured name such as a virus or a hybrid formula
    fn verbatim(name: &str, name_type: NameType, rank: Option<Rank>) -> Self {
        Self {
            scientific_name: name.to_string(),
            genus_or_above: name.to_string(),
            infrageneric: None,
            specific_epithet: None,
            infraspecific_epithet: None,
            rank,
            authorship: None,
            hybrid: name_type == NameType::Hybrid,
            name_type,
        }
    }

    pub fn is_binomial(&self) -> bool {
        self.name_type.is_parsable() && self.specific_epithet.is_some()
    }

    pub fn is_trinomial(&self) -> bool {
        self.is_binomial() && self.infraspecific_epithet.is_some()
    }

    /// Infraspecific epithet repeating the specific one, e.g. "Abies alba var. alba"
    pub fn is_autonym(&self) -> bool {
        match (&self.specific_epithet, &self.infraspecific_epithet) {
            (Some(sp), Some(infra)) => sp == infra,
            _ => false,
        }
    }

    /// Name without authorship. Infraspecific ranks other than subspecies keep
    /// their marker so varieties and forms stay distinguishable.
    pub fn canonical_name(&self) -> String {
        if !self.name_type.is_parsable() {
            return self.genus_or_above.clone();
        }
        let mut name = self.genus_or_above.clone();
        if let Some(infra) = &self.infrageneric {
            if self.specific_epithet.is_none() {
                let marker = self
                    .rank
                    .and_then(|r| r.marker())
                    .unwrap_or("subgen.");
                name.push(' ');
                name.push_str(marker);
                name.push(' ');
                name.push_str(infra);
                return name;
            }
        }
        if let Some(sp) = &self.specific_epithet {
            name.push(' ');
            name.push_str(sp);
            if let Some(infra) = &self.infraspecific_epithet {
                name.push(' ');
                if let Some(marker) = self.rank.filter(|r| *r != Rank::Subspecies).and_then(|r| r.marker()) {
                    name.push_str(marker);
                    name.push(' ');
                }
                name.push_str(infra);
            }
        }
        name
    }

    /// Genus plus specific epithet, if there is one
    pub fn canonical_species_name(&self) -> Option<String> {
        self.specific_epithet
            .as_ref()
            .map(|sp| format!("{} {}", self.genus_or_above, sp))
    }

    /// Canonical name followed by the authorship
    pub fn full_name(&self) -> String {
        match &self.authorship {
            Some(a) => format!("{} {}", self.canonical_name(), a),
            None => self.canonical_name(),
        }
    }
}

/// Regex based parser for the common shapes of botanical and zoological names
#[derive(Debug, Clone, Default)]
pub struct NameParser;

impl NameParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a scientific name, using `rank_hint` when the name itself does
    /// not reveal its rank.
    pub fn parse(&self, name: &str, rank_hint: Option<Rank>) -> BackboneResult<ParsedName> {
        let cleaned = WHITESPACE.replace_all(name.trim(), " ").to_string();
        if cleaned.is_empty() {
            return Err(BackboneError::UnparsableName("empty name".to_string()));
        }
        if PLACEHOLDER.is_match(&cleaned) {
            return Err(BackboneError::UnparsableName(format!("placeholder name: {}", cleaned)));
        }
        if !cleaned.chars().next().is_some_and(|c| c.is_alphabetic() || c == '×') {
            return Err(BackboneError::UnparsableName(cleaned));
        }
        if VIRUS.is_match(&cleaned) {
            return Ok(ParsedName::verbatim(&cleaned, NameType::Virus, rank_hint));
        }
        if HYBRID_FORMULA.is_match(&cleaned) {
            return Ok(ParsedName::verbatim(&cleaned, NameType::Hybrid, rank_hint));
        }

        let mut hybrid = false;
        let mut tokens: Vec<String> = Vec::new();
        for raw in cleaned.split(' ') {
            if raw == "×" || raw == "x" && !tokens.is_empty() && tokens.len() < 3 {
                hybrid = true;
                continue;
            }
            let token = raw.strip_prefix('×').map(|t| {
                hybrid = true;
                t
            });
            tokens.push(token.unwrap_or(raw).to_string());
        }

        let mut iter = tokens.into_iter().peekable();
        let genus = iter.next().unwrap_or_default();
        if !MONOMIAL.is_match(&genus) {
            return Err(BackboneError::UnparsableName(cleaned));
        }

        let mut parsed = ParsedName {
            scientific_name: cleaned.clone(),
            genus_or_above: genus,
            infrageneric: None,
            specific_epithet: None,
            infraspecific_epithet: None,
            rank: None,
            authorship: None,
            hybrid,
            name_type: NameType::Scientific,
        };

        let mut marker_given = false;

        // Infrageneric part, either "(Subgenus)" or "sect. Name"
        if let Some(next) = iter.peek().cloned() {
            if let Some(caps) = INFRAGENERIC.captures(&next) {
                parsed.infrageneric = Some(caps[1].to_string());
                parsed.rank = Some(Rank::Subgenus);
                iter.next();
            } else if let Some(rank) = marker_rank(&next).filter(|r| r.is_infrageneric_strictly()) {
                iter.next();
                match iter.next() {
                    Some(infra) if MONOMIAL.is_match(&infra) => {
                        parsed.infrageneric = Some(infra);
                        parsed.rank = Some(rank);
                        marker_given = true;
                    }
                    _ => return Err(BackboneError::UnparsableName(cleaned)),
                }
            }
        }

        // Specific epithet
        if let Some(next) = iter.peek().cloned() {
            if INDET.is_match(&next) {
                iter.next();
                parsed.name_type = NameType::Informal;
                parsed.rank = Some(Rank::Species);
            } else if EPITHET.is_match(&next) && marker_rank(&next).is_none() {
                iter.next();
                parsed.specific_epithet = Some(next);
                parsed.rank = Some(Rank::Species);
            }
        }

        // Infraspecific epithet, with or without rank marker
        if parsed.specific_epithet.is_some() {
            if let Some(next) = iter.peek().cloned() {
                if let Some(rank) = marker_rank(&next).filter(|r| r.is_infraspecific()) {
                    iter.next();
                    match iter.next() {
                        Some(infra) if EPITHET.is_match(&infra) => {
                            parsed.infraspecific_epithet = Some(infra);
                            parsed.rank = Some(rank);
                            marker_given = true;
                        }
                        _ => return Err(BackboneError::UnparsableName(cleaned)),
                    }
                } else if EPITHET.is_match(&next) && !is_author_particle(&next) {
                    iter.next();
                    parsed.infraspecific_epithet = Some(next);
                    parsed.rank = Some(Rank::Subspecies);
                }
            }
        }

        let rest: Vec<String> = iter.collect();
        if !rest.is_empty() {
            parsed.authorship = Some(rest.join(" "));
        }

        // Ranks implied by the epithet count give way to an explicit rank of
        // the same linnean group, marker ranks never do
        if let Some(hint) = rank_hint {
            match parsed.rank {
                None => parsed.rank = Some(hint),
                Some(implied)
                    if !marker_given && implied.linnean_base() == hint.linnean_base() =>
                {
                    parsed.rank = Some(hint)
                }
                Some(_) => {}
            }
        }

        Ok(parsed)
    }
}

/// Rank of a marker token like `var.` or `subsp`
fn marker_rank(token: &str) -> Option<Rank> {
    let t = token.trim_end_matches('.');
    match t {
        "subsp" | "ssp" => Some(Rank::Subspecies),
        "var" => Some(Rank::Variety),
        "subvar" => Some(Rank::Subvariety),
        "f" | "fo" | "forma" => Some(Rank::Form),
        "subf" => Some(Rank::Subform),
        "subgen" | "subg" => Some(Rank::Subgenus),
        "sect" => Some(Rank::Section),
        "ser" => Some(Rank::Series),
        _ => None,
    }
}

/// Lower case words that start an authorship rather than an epithet
fn is_author_particle(token: &str) -> bool {
    matches!(token, "ex" | "de" | "van" | "von" | "den" | "der" | "du" | "le" | "la" | "da" | "in" | "et" | "non" | "sensu" | "auct")
}
