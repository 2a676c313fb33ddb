/// Taxonomic ranks and the total order between them
use crate::BackboneError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Taxonomic rank, declared from highest to lowest.
///
/// The derived `Ord` follows declaration order, so `Rank::Kingdom < Rank::Genus`
/// means "kingdom ranks above genus". `Unranked` sorts last and is not
/// comparable to anything in a taxonomic sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Domain,
    Kingdom,
    Subkingdom,
    Superphylum,
    Phylum,
    Subphylum,
    Superclass,
    Class,
    Subclass,
    Infraclass,
    Superorder,
    Order,
    Suborder,
    Infraorder,
    Superfamily,
    Family,
    Subfamily,
    Tribe,
    Subtribe,
    Genus,
    Subgenus,
    Section,
    Series,
    Species,
    Subspecies,
    Variety,
    Subvariety,
    Form,
    Subform,
    Unranked,
}

impl Rank {
    /// The seven main linnean ranks, highest first
    pub const LINNEAN: [Rank; 7] = [
        Rank::Kingdom,
        Rank::Phylum,
        Rank::Class,
        Rank::Order,
        Rank::Family,
        Rank::Genus,
        Rank::Species,
    ];

    /// Ranks carried by a denormalized classification, highest first
    pub const CLASSIFICATION: [Rank; 7] = [
        Rank::Kingdom,
        Rank::Phylum,
        Rank::Class,
        Rank::Order,
        Rank::Family,
        Rank::Genus,
        Rank::Subgenus,
    ];

    /// Get all ranks from highest to lowest
    pub fn all() -> Vec<Self> {
        vec![
            Self::Domain,
            Self::Kingdom,
            Self::Subkingdom,
            Self::Superphylum,
            Self::Phylum,
            Self::Subphylum,
            Self::Superclass,
            Self::Class,
            Self::Subclass,
            Self::Infraclass,
            Self::Superorder,
            Self::Order,
            Self::Suborder,
            Self::Infraorder,
            Self::Superfamily,
            Self::Family,
            Self::Subfamily,
            Self::Tribe,
            Self::Subtribe,
            Self::Genus,
            Self::Subgenus,
            Self::Section,
            Self::Series,
            Self::Species,
            Self::Subspecies,
            Self::Variety,
            Self::Subvariety,
            Self::Form,
            Self::Subform,
            Self::Unranked,
        ]
    }

    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    /// Get the rank name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Kingdom => "kingdom",
            Self::Subkingdom => "subkingdom",
            Self::Superphylum => "superphylum",
            Self::Phylum => "phylum",
            Self::Subphylum => "subphylum",
            Self::Superclass => "superclass",
            Self::Class => "class",
            Self::Subclass => "subclass",
            Self::Infraclass => "infraclass",
            Self::Superorder => "superorder",
            Self::Order => "order",
            Self::Suborder => "suborder",
            Self::Infraorder => "infraorder",
            Self::Superfamily => "superfamily",
            Self::Family => "family",
            Self::Subfamily => "subfamily",
            Self::Tribe => "tribe",
            Self::Subtribe => "subtribe",
            Self::Genus => "genus",
            Self::Subgenus => "subgenus",
            Self::Section => "section",
            Self::Series => "series",
            Self::Species => "species",
            Self::Subspecies => "subspecies",
            Self::Variety => "variety",
            Self::Subvariety => "subvariety",
            Self::Form => "form",
            Self::Subform => "subform",
            Self::Unranked => "unranked",
        }
    }

    /// Rank marker used inside scientific names, e.g. `var.` for varieties
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            Self::Subgenus => Some("subgen."),
            Self::Section => Some("sect."),
            Self::Series => Some("ser."),
            Self::Subspecies => Some("subsp."),
            Self::Variety => Some("var."),
            Self::Subvariety => Some("subvar."),
            Self::Form => Some("f."),
            Self::Subform => Some("subf."),
            _ => None,
        }
    }

    /// Strictly higher than `other`. Unranked is never higher than anything.
    pub fn higher_than(&self, other: Rank) -> bool {
        *self != Rank::Unranked && self.ordinal() < other.ordinal()
    }

    /// Strictly lower than `other`. Nothing is lower than unranked.
    pub fn lower_than(&self, other: Rank) -> bool {
        other != Rank::Unranked && other.higher_than(*self)
    }

    pub fn is_linnean(&self) -> bool {
        Self::LINNEAN.contains(self)
    }

    pub fn is_uncomparable(&self) -> bool {
        *self == Rank::Unranked
    }

    /// Ranks above genus
    pub fn is_suprageneric(&self) -> bool {
        self.ordinal() < Rank::Genus.ordinal()
    }

    /// Ranks above species, excluding unranked
    pub fn is_supraspecific(&self) -> bool {
        self.ordinal() < Rank::Species.ordinal()
    }

    /// Ranks below genus, species included
    pub fn is_infrageneric(&self) -> bool {
        self.ordinal() > Rank::Genus.ordinal() && !self.is_uncomparable()
    }

    /// Ranks between genus and species, both excluded
    pub fn is_infrageneric_strictly(&self) -> bool {
        self.is_infrageneric() && self.ordinal() < Rank::Species.ordinal()
    }

    pub fn is_species_or_below(&self) -> bool {
        self.ordinal() >= Rank::Species.ordinal() && !self.is_uncomparable()
    }

    pub fn is_infraspecific(&self) -> bool {
        self.ordinal() > Rank::Species.ordinal() && !self.is_uncomparable()
    }

    /// The linnean rank a super, sub or infra rank belongs to.
    pub fn linnean_base(&self) -> Rank {
        match self {
            Self::Domain | Self::Kingdom | Self::Subkingdom => Self::Kingdom,
            Self::Superphylum | Self::Phylum | Self::Subphylum => Self::Phylum,
            Self::Superclass | Self::Class | Self::Subclass | Self::Infraclass => Self::Class,
            Self::Superorder | Self::Order | Self::Suborder | Self::Infraorder => Self::Order,
            Self::Superfamily | Self::Family | Self::Subfamily | Self::Tribe | Self::Subtribe => {
                Self::Family
            }
            Self::Genus | Self::Subgenus | Self::Section | Self::Series => Self::Genus,
            Self::Species
            | Self::Subspecies
            | Self::Variety
            | Self::Subvariety
            | Self::Form
            | Self::Subform => Self::Species,
            Self::Unranked => Self::Unranked,
        }
    }

    /// Next linnean rank strictly below this one
    pub fn next_lower_linnean(&self) -> Option<Rank> {
        if self.is_uncomparable() {
            return None;
        }
        Self::LINNEAN.iter().copied().find(|r| r.lower_than(*self))
    }

    /// Next linnean rank strictly above this one
    pub fn next_higher_linnean(&self) -> Option<Rank> {
        if self.is_uncomparable() {
            return Self::LINNEAN.last().copied();
        }
        Self::LINNEAN.iter().rev().copied().find(|r| r.higher_than(*self))
    }

    /// Loose rank equality used when matching names: unranked matches
    /// anything, otherwise both ranks need the same linnean base.
    pub fn is_compatible_with(&self, other: Rank) -> bool {
        self.is_uncomparable()
            || other.is_uncomparable()
            || self.linnean_base() == other.linnean_base()
    }

    /// Number of epithets a canonical name of this rank carries
    pub fn epithet_count(&self) -> usize {
        if self.is_infraspecific() {
            3
        } else if *self == Rank::Species {
            2
        } else {
            1
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = BackboneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_end_matches('.').to_lowercase().replace(['_', '-'], " ");
        let rank = match normalized.as_str() {
            "domain" | "superkingdom" | "empire" => Self::Domain,
            "kingdom" | "regnum" | "regn" => Self::Kingdom,
            "subkingdom" | "subregnum" => Self::Subkingdom,
            "superphylum" | "superdivision" => Self::Superphylum,
            "phylum" | "division" | "phyl" | "div" => Self::Phylum,
            "subphylum" | "subdivision" => Self::Subphylum,
            "superclass" => Self::Superclass,
            "class" | "classis" | "cl" => Self::Class,
            "subclass" | "subclassis" => Self::Subclass,
            "infraclass" => Self::Infraclass,
            "superorder" => Self::Superorder,
            "order" | "ordo" | "ord" => Self::Order,
            "suborder" | "subordo" => Self::Suborder,
            "infraorder" => Self::Infraorder,
            "superfamily" | "superfam" => Self::Superfamily,
            "family" | "familia" | "fam" => Self::Family,
            "subfamily" | "subfam" => Self::Subfamily,
            "tribe" | "tribus" | "trib" => Self::Tribe,
            "subtribe" | "subtrib" => Self::Subtribe,
            "genus" | "gen" => Self::Genus,
            "subgenus" | "subgen" | "subg" => Self::Subgenus,
            "section" | "sect" | "sectio" => Self::Section,
            "series" | "ser" => Self::Series,
            "species" | "sp" | "spec" => Self::Species,
            "subspecies" | "subsp" | "ssp" => Self::Subspecies,
            "variety" | "varietas" | "var" => Self::Variety,
            "subvariety" | "subvar" => Self::Subvariety,
            "form" | "forma" | "fo" | "f" => Self::Form,
            "subform" | "subforma" | "subf" => Self::Subform,
            "unranked" | "no rank" | "norank" | "unknown" | "other" => Self::Unranked,
            _ => return Err(BackboneError::Parse(format!("Unknown rank: {}", s))),
        };
        Ok(rank)
    }
}
