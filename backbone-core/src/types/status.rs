/// Status, origin and kingdom enums attached to every usage
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomicStatus {
    Accepted,
    Synonym,
    ProParteSynonym,
    Doubtful,
}

impl TaxonomicStatus {
    pub fn is_synonym(&self) -> bool {
        matches!(self, Self::Synonym | Self::ProParteSynonym)
    }

    /// Accepted and doubtful usages both live in the parent tree
    pub fn is_accepted(&self) -> bool {
        !self.is_synonym()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Synonym => "synonym",
            Self::ProParteSynonym => "proparte synonym",
            Self::Doubtful => "doubtful",
        }
    }

    /// Lenient interpretation of verbatim `taxonomicStatus` values.
    ///
    /// Returns `None` for values that say nothing about the status so the
    /// caller can infer it from the relations instead.
    pub fn from_verbatim(value: &str) -> Option<Self> {
        let v = value.trim().to_lowercase();
        if v.is_empty() {
            return None;
        }
        if v.contains("pro parte") || v.contains("proparte") {
            return Some(Self::ProParteSynonym);
        }
        if v.contains("synonym") || v.contains("misapplied") || v == "invalid" {
            return Some(Self::Synonym);
        }
        if v.contains("doubtful") || v.contains("provisional") || v.contains("unresolved") {
            return Some(Self::Doubtful);
        }
        if v.contains("accepted") || v == "valid" {
            return Some(Self::Accepted);
        }
        None
    }
}

impl fmt::Display for TaxonomicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a usage came into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// A record of the source checklist
    Source,
    /// Higher taxon built from flat classification fields
    DenormedClassification,
    /// Genus or species implied by a binomial or trinomial
    ImplicitName,
    Autonym,
    AutoRecombination,
    /// Placeholders for names referenced but never defined
    VerbatimParent,
    VerbatimAccepted,
    VerbatimBasionym,
    /// Accepted placeholder inserted to break a synonym cycle
    MissingAccepted,
    Other,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::DenormedClassification => "denormed_classification",
            Self::ImplicitName => "implicit_name",
            Self::Autonym => "autonym",
            Self::AutoRecombination => "auto_recombination",
            Self::VerbatimParent => "verbatim_parent",
            Self::VerbatimAccepted => "verbatim_accepted",
            Self::VerbatimBasionym => "verbatim_basionym",
            Self::MissingAccepted => "missing_accepted",
            Self::Other => "other",
        }
    }

    /// Nodes synthesized by the normalizer rather than read from a record
    pub fn is_synthetic(&self) -> bool {
        !matches!(self, Self::Source | Self::DenormedClassification)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kingdom {
    IncertaeSedis,
    Animalia,
    Archaea,
    Bacteria,
    Chromista,
    Fungi,
    Plantae,
    Protozoa,
    Viruses,
}

impl Kingdom {
    pub fn all() -> Vec<Self> {
        vec![
            Self::IncertaeSedis,
            Self::Animalia,
            Self::Archaea,
            Self::Bacteria,
            Self::Chromista,
            Self::Fungi,
            Self::Plantae,
            Self::Protozoa,
            Self::Viruses,
        ]
    }

    pub fn scientific_name(&self) -> &'static str {
        match self {
            Self::IncertaeSedis => "incertae sedis",
            Self::Animalia => "Animalia",
            Self::Archaea => "Archaea",
            Self::Bacteria => "Bacteria",
            Self::Chromista => "Chromista",
            Self::Fungi => "Fungi",
            Self::Plantae => "Plantae",
            Self::Protozoa => "Protozoa",
            Self::Viruses => "Viruses",
        }
    }

    /// Map a kingdom name, including common vernacular and legacy spellings
    pub fn from_name(name: &str) -> Option<Self> {
        let k = match name.trim().to_lowercase().as_str() {
            "animalia" | "animals" | "animal" | "metazoa" => Self::Animalia,
            "plantae" | "plants" | "plant" | "viridiplantae" | "vegetabilia" => Self::Plantae,
            "fungi" | "fungus" => Self::Fungi,
            "bacteria" | "eubacteria" | "monera" => Self::Bacteria,
            "archaea" | "archaebacteria" => Self::Archaea,
            "chromista" => Self::Chromista,
            "protozoa" | "protista" => Self::Protozoa,
            "viruses" | "virus" | "viridae" => Self::Viruses,
            "incertae sedis" | "incertae_sedis" | "unknown" => Self::IncertaeSedis,
            _ => return None,
        };
        Some(k)
    }

    pub fn is_plant_or_animal(&self) -> bool {
        matches!(self, Self::Animalia | Self::Plantae)
    }

    pub fn is_prokaryote_or_virus(&self) -> bool {
        matches!(self, Self::Bacteria | Self::Archaea | Self::Viruses)
    }
}

impl fmt::Display for Kingdom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scientific_name())
    }
}
