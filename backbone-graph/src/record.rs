//! Verbatim taxon records and the tabular reader producing them

use backbone_core::{BackboneError, BackboneResult, Classification, Rank};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

static NULL_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\\N|\\?NULL)\s*$").unwrap());

/// Trimmed value, or `None` for blanks and NULL markers
pub fn clean_value(value: Option<&str>) -> Option<String> {
    let v = value?.trim();
    if v.is_empty() || NULL_VALUE.is_match(v) {
        None
    } else {
        Some(v.to_string())
    }
}

/// One row of a source checklist, before any interpretation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbatimRecord {
    pub id: Option<String>,
    pub parent_id: Option<String>,
    /// Possibly several ids joined by the multi value delimiter
    pub accepted_id: Option<String>,
    pub basionym_id: Option<String>,
    pub parent_name: Option<String>,
    pub accepted_name: Option<String>,
    pub basionym_name: Option<String>,
    pub scientific_name: Option<String>,
    pub authorship: Option<String>,
    pub taxon_rank: Option<String>,
    pub verbatim_rank: Option<String>,
    pub taxonomic_status: Option<String>,
    pub kingdom: Option<String>,
    pub phylum: Option<String>,
    pub class: Option<String>,
    pub order: Option<String>,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub subgenus: Option<String>,
}

impl VerbatimRecord {
    pub fn new(id: &str, scientific_name: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            scientific_name: Some(scientific_name.to_string()),
            ..Default::default()
        }
    }

    pub fn with_rank(mut self, rank: &str) -> Self {
        self.taxon_rank = Some(rank.to_string());
        self
    }

    pub fn with_parent(mut self, parent_id: &str) -> Self {
        self.parent_id = Some(parent_id.to_string());
        self
    }

    pub fn with_parent_name(mut self, name: &str) -> Self {
        self.parent_name = Some(name.to_string());
        self
    }

    pub fn with_accepted(mut self, accepted_id: &str) -> Self {
        self.accepted_id = Some(accepted_id.to_string());
        self
    }

    pub fn with_accepted_name(mut self, name: &str) -> Self {
        self.accepted_name = Some(name.to_string());
        self
    }

    pub fn with_basionym(mut self, basionym_id: &str) -> Self {
        self.basionym_id = Some(basionym_id.to_string());
        self
    }

    pub fn with_basionym_name(mut self, name: &str) -> Self {
        self.basionym_name = Some(name.to_string());
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.taxonomic_status = Some(status.to_string());
        self
    }

    pub fn with_authorship(mut self, authorship: &str) -> Self {
        self.authorship = Some(authorship.to_string());
        self
    }

    /// Set one flat classification field
    pub fn with_higher(mut self, rank: Rank, name: &str) -> Self {
        let value = Some(name.to_string());
        match rank {
            Rank::Kingdom => self.kingdom = value,
            Rank::Phylum => self.phylum = value,
            Rank::Class => self.class = value,
            Rank::Order => self.order = value,
            Rank::Family => self.family = value,
            Rank::Genus => self.genus = value,
            Rank::Subgenus => self.subgenus = value,
            _ => {}
        }
        self
    }

    /// Same record with every field trimmed and NULL markers removed
    pub fn cleaned(&self) -> Self {
        let c = |v: &Option<String>| clean_value(v.as_deref());
        Self {
            id: c(&self.id),
            parent_id: c(&self.parent_id),
            accepted_id: c(&self.accepted_id),
            basionym_id: c(&self.basionym_id),
            parent_name: c(&self.parent_name),
            accepted_name: c(&self.accepted_name),
            basionym_name: c(&self.basionym_name),
            scientific_name: c(&self.scientific_name),
            authorship: c(&self.authorship),
            taxon_rank: c(&self.taxon_rank),
            verbatim_rank: c(&self.verbatim_rank),
            taxonomic_status: c(&self.taxonomic_status),
            kingdom: c(&self.kingdom),
            phylum: c(&self.phylum),
            class: c(&self.class),
            order: c(&self.order),
            family: c(&self.family),
            genus: c(&self.genus),
            subgenus: c(&self.subgenus),
        }
    }

    /// Flat higher classification fields as a classification record
    pub fn classification(&self) -> Classification {
        let mut cl = Classification::new();
        cl.set(Rank::Kingdom, self.kingdom.clone());
        cl.set(Rank::Phylum, self.phylum.clone());
        cl.set(Rank::Class, self.class.clone());
        cl.set(Rank::Order, self.order.clone());
        cl.set(Rank::Family, self.family.clone());
        cl.set(Rank::Genus, self.genus.clone());
        cl.set(Rank::Subgenus, self.subgenus.clone());
        cl
    }

    pub fn has_parent_reference(&self) -> bool {
        self.parent_id.is_some() || self.parent_name.is_some()
    }

    pub fn has_accepted_reference(&self) -> bool {
        self.accepted_id.is_some() || self.accepted_name.is_some()
    }

    /// Label used in logs and reports
    pub fn label(&self) -> String {
        match (&self.id, &self.scientific_name) {
            (Some(id), Some(name)) => format!("{} ({})", id, name),
            (Some(id), None) => id.clone(),
            (None, Some(name)) => name.clone(),
            (None, None) => "<empty record>".to_string(),
        }
    }
}

/// Darwin Core terms understood by the reader, lower-cased
const TERMS: &[&str] = &[
    "taxonid",
    "parentnameusageid",
    "acceptednameusageid",
    "originalnameusageid",
    "parentnameusage",
    "acceptednameusage",
    "originalnameusage",
    "scientificname",
    "scientificnameauthorship",
    "taxonrank",
    "verbatimtaxonrank",
    "taxonomicstatus",
    "kingdom",
    "phylum",
    "class",
    "order",
    "family",
    "genus",
    "subgenus",
];

fn term_name(header: &str) -> String {
    // Accept qualified terms like dwc:taxonID
    let local = header.rsplit([':', '/']).next().unwrap_or(header);
    local.trim().to_lowercase()
}

/// Reads tab separated checklists with a Darwin Core header row
pub struct TabularRecordReader<R: Read> {
    reader: csv::Reader<R>,
    columns: HashMap<String, usize>,
    row: usize,
    failed: bool,
}

impl TabularRecordReader<std::fs::File> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> BackboneResult<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::new(file)
    }
}

impl<R: Read> TabularRecordReader<R> {
    pub fn new(input: R) -> BackboneResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .quoting(false)
            .flexible(false)
            .comment(Some(b'#'))
            .from_reader(input);

        let headers = reader
            .headers()
            .map_err(|e| BackboneError::CorruptStream(format!("unreadable header: {}", e)))?;

        let mut columns = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            let term = term_name(header);
            if TERMS.contains(&term.as_str()) {
                columns.entry(term).or_insert(idx);
            }
        }
        if !columns.contains_key("scientificname") {
            return Err(BackboneError::CorruptStream(
                "header has no scientificName column".to_string(),
            ));
        }

        Ok(Self {
            reader,
            columns,
            row: 1,
            failed: false,
        })
    }

    fn field(&self, record: &csv::StringRecord, term: &str) -> Option<String> {
        let idx = *self.columns.get(term)?;
        clean_value(record.get(idx))
    }

    fn convert(&self, record: &csv::StringRecord) -> VerbatimRecord {
        VerbatimRecord {
            id: self.field(record, "taxonid"),
            parent_id: self.field(record, "parentnameusageid"),
            accepted_id: self.field(record, "acceptednameusageid"),
            basionym_id: self.field(record, "originalnameusageid"),
            parent_name: self.field(record, "parentnameusage"),
            accepted_name: self.field(record, "acceptednameusage"),
            basionym_name: self.field(record, "originalnameusage"),
            scientific_name: self.field(record, "scientificname"),
            authorship: self.field(record, "scientificnameauthorship"),
            taxon_rank: self.field(record, "taxonrank"),
            verbatim_rank: self.field(record, "verbatimtaxonrank"),
            taxonomic_status: self.field(record, "taxonomicstatus"),
            kingdom: self.field(record, "kingdom"),
            phylum: self.field(record, "phylum"),
            class: self.field(record, "class"),
            order: self.field(record, "order"),
            family: self.field(record, "family"),
            genus: self.field(record, "genus"),
            subgenus: self.field(record, "subgenus"),
        }
    }
}

impl<R: Read> Iterator for TabularRecordReader<R> {
    type Item = BackboneResult<VerbatimRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let mut record = csv::StringRecord::new();
        self.row += 1;
        match self.reader.read_record(&mut record) {
            Ok(true) => Some(Ok(self.convert(&record))),
            Ok(false) => None,
            Err(e) => {
                // The stream position is unreliable after a csv error
                self.failed = true;
                Some(Err(BackboneError::CorruptStream(format!(
                    "row {}: {}",
                    self.row, e
                ))))
            }
        }
    }
}
