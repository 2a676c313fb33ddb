/// Denormalized higher classification
use super::{Kingdom, Rank};
use serde::{Deserialize, Serialize};

/// One name per higher rank from kingdom down to subgenus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kingdom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phylum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgenus: Option<String>,
}

/// A slot a later source wanted to change to a different value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationConflict {
    pub rank: Rank,
    pub existing: String,
    pub proposed: String,
}

impl Classification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder style setter, mostly for tests and fixtures
    pub fn with(mut self, rank: Rank, name: &str) -> Self {
        self.set(rank, Some(name.to_string()));
        self
    }

    pub fn get(&self, rank: Rank) -> Option<&str> {
        let slot = match rank {
            Rank::Kingdom => &self.kingdom,
            Rank::Phylum => &self.phylum,
            Rank::Class => &self.class,
            Rank::Order => &self.order,
            Rank::Family => &self.family,
            Rank::Genus => &self.genus,
            Rank::Subgenus => &self.subgenus,
            _ => return None,
        };
        slot.as_deref()
    }

    fn slot_mut(&mut self, rank: Rank) -> Option<&mut Option<String>> {
        match rank {
            Rank::Kingdom => Some(&mut self.kingdom),
            Rank::Phylum => Some(&mut self.phylum),
            Rank::Class => Some(&mut self.class),
            Rank::Order => Some(&mut self.order),
            Rank::Family => Some(&mut self.family),
            Rank::Genus => Some(&mut self.genus),
            Rank::Subgenus => Some(&mut self.subgenus),
            _ => None,
        }
    }

    /// Set a slot. Ranks without a slot are ignored.
    pub fn set(&mut self, rank: Rank, name: Option<String>) {
        if let Some(slot) = self.slot_mut(rank) {
            *slot = name.filter(|n| !n.trim().is_empty());
        }
    }

    pub fn is_empty(&self) -> bool {
        Rank::CLASSIFICATION.iter().all(|r| self.get(*r).is_none())
    }

    /// Filled slots, highest rank first
    pub fn iter(&self) -> impl Iterator<Item = (Rank, &str)> + '_ {
        Rank::CLASSIFICATION
            .into_iter()
            .filter_map(move |r| self.get(r).map(|n| (r, n)))
    }

    /// Lowest filled slot
    pub fn lowest(&self) -> Option<(Rank, &str)> {
        self.iter().last()
    }

    pub fn kingdom_enum(&self) -> Option<Kingdom> {
        self.kingdom.as_deref().and_then(Kingdom::from_name)
    }

    /// Fill every empty slot from `other`.
    ///
    /// Filled slots are never overwritten. A slot where `other` carries a
    /// different value is returned as a conflict and left untouched.
    pub fn patch_from(&mut self, other: &Classification) -> Vec<ClassificationConflict> {
        let mut conflicts = Vec::new();
        for rank in Rank::CLASSIFICATION {
            let Some(proposed) = other.get(rank) else { continue };
            match self.get(rank).map(str::to_string) {
                None => self.set(rank, Some(proposed.to_string())),
                Some(existing) if !existing.eq_ignore_ascii_case(proposed) => {
                    conflicts.push(ClassificationConflict {
                        rank,
                        existing,
                        proposed: proposed.to_string(),
                    });
                }
                Some(_) => {}
            }
        }
        conflicts
    }

    /// Slot-by-slot equality from kingdom down to `stop_rank` (inclusive),
    /// or over all slots without a stop rank.
    pub fn equal_up_to(&self, other: &Classification, stop_rank: Option<Rank>) -> bool {
        for rank in Rank::CLASSIFICATION {
            if let Some(stop) = stop_rank {
                if stop.higher_than(rank) {
                    break;
                }
            }
            if self.get(rank) != other.get(rank) {
                return false;
            }
        }
        true
    }

    /// True when no slot filled in both disagrees
    pub fn is_compatible_with(&self, other: &Classification) -> bool {
        Rank::CLASSIFICATION.iter().all(|r| match (self.get(*r), other.get(*r)) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn aves() -> Classification {
        Classification::new()
            .with(Rank::Kingdom, "Animalia")
            .with(Rank::Phylum, "Chordata")
            .with(Rank::Class, "Aves")
    }

    #[test]
    fn test_get_set() {
        let mut cl = aves();
        assert_eq!(cl.get(Rank::Class), Some("Aves"));
        assert_eq!(cl.get(Rank::Species), None);
        cl.set(Rank::Species, Some("ignored".to_string()));
        cl.set(Rank::Order, Some("  ".to_string()));
        assert_eq!(cl.get(Rank::Order), None);
        assert_eq!(cl.lowest(), Some((Rank::Class, "Aves")));
        assert_eq!(cl.kingdom_enum(), Some(Kingdom::Animalia));
    }

    #[test]
    fn test_patch_fills_gaps_only() {
        let mut cl = aves();
        let patch = Classification::new()
            .with(Rank::Class, "Aves")
            .with(Rank::Order, "Passeriformes");

        let conflicts = cl.patch_from(&patch);
        assert!(conflicts.is_empty());
        assert_eq!(cl.get(Rank::Order), Some("Passeriformes"));
        assert_eq!(cl.get(Rank::Phylum), Some("Chordata"));
    }

    #[test]
    fn test_patch_never_overwrites() {
        let mut cl = aves();
        let patch = Classification::new()
            .with(Rank::Phylum, "Arthropoda")
            .with(Rank::Family, "Turdidae");

        let conflicts = cl.patch_from(&patch);
        assert_eq!(
            conflicts,
            vec![ClassificationConflict {
                rank: Rank::Phylum,
                existing: "Chordata".to_string(),
                proposed: "Arthropoda".to_string(),
            }]
        );
        assert_eq!(cl.get(Rank::Phylum), Some("Chordata"));
        assert_eq!(cl.get(Rank::Family), Some("Turdidae"));
    }

    #[test]
    fn test_equal_up_to() {
        let a = aves().with(Rank::Order, "Passeriformes");
        let b = aves().with(Rank::Order, "Falconiformes");
        assert!(a.equal_up_to(&b, Some(Rank::Class)));
        assert!(!a.equal_up_to(&b, None));
        assert!(!a.is_compatible_with(&b));
        assert!(a.is_compatible_with(&aves()));
    }
}
