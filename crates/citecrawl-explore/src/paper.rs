//! Paper record normalized from a lookup response

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A lookup response is missing a field the crawler cannot do without.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedRecord {
    /// Body is not a JSON object of the expected shape
    Json(String),
    /// Required field absent or null
    MissingField(&'static str),
}

impl std::fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(msg) => write!(f, "malformed record: {msg}"),
            Self::MissingField(field) => write!(f, "malformed record: missing '{field}'"),
        }
    }
}

impl std::error::Error for MalformedRecord {}

// === Wire shape of the v1 paper endpoint ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPaper {
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    authors: Option<Vec<RawAuthor>>,
    year: Option<i32>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    citation_velocity: Option<f64>,
    influential_citation_count: Option<u64>,
    citations: Option<Vec<RawCitation>>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCitation {
    paper_id: Option<String>,
}

/// One resolved publication.
///
/// Equality and hashing look at `id` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperRecord {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub abstract_text: Option<String>,
    /// Number of citing papers listed in the response
    pub citation_count: u64,
    pub citation_velocity: f64,
    pub influential_citation_count: u64,
    /// Identifiers of citing papers, in response order
    pub citations: Vec<String>,
}

impl PaperRecord {
    /// Normalize a raw response body.
    ///
    /// `paperId`, `title` and `citations` are required. Citation entries
    /// without a `paperId` (papers the service cannot resolve) are counted
    /// but not followed.
    pub fn from_json(body: &[u8]) -> Result<Self, MalformedRecord> {
        let raw: RawPaper =
            serde_json::from_slice(body).map_err(|e| MalformedRecord::Json(e.to_string()))?;

        let id = raw.paper_id.ok_or(MalformedRecord::MissingField("paperId"))?;
        let title = raw.title.ok_or(MalformedRecord::MissingField("title"))?;
        let raw_citations = raw
            .citations
            .ok_or(MalformedRecord::MissingField("citations"))?;

        let citation_count = raw_citations.len() as u64;
        let citations: Vec<String> = raw_citations
            .into_iter()
            .filter_map(|c| c.paper_id)
            .collect();
        if citations.len() as u64 != citation_count {
            log::debug!(
                "{id}: {} citations without paperId skipped",
                citation_count - citations.len() as u64
            );
        }

        Ok(Self {
            id,
            title,
            authors: raw
                .authors
                .unwrap_or_default()
                .into_iter()
                .filter_map(|a| a.name)
                .collect(),
            year: raw.year,
            abstract_text: raw.abstract_text,
            citation_count,
            citation_velocity: raw.citation_velocity.unwrap_or_default(),
            influential_citation_count: raw.influential_citation_count.unwrap_or_default(),
            citations,
        })
    }
}

impl PartialEq for PaperRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PaperRecord {}

impl Hash for PaperRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for PaperRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ID: {}", self.id)?;
        writeln!(f, "Title: {}", self.title)?;
        writeln!(f, "Authors: {}", self.authors.join(", "))?;
        if let Some(year) = self.year {
            writeln!(f, "Year: {year}")?;
        }
        writeln!(f, "Num citations: {}", self.citation_count)?;
        writeln!(f, "Citation velocity: {}", self.citation_velocity)?;
        write!(
            f,
            "Num influential citations: {}",
            self.influential_citation_count
        )
    }
}

#[cfg(test)]
impl PaperRecord {
    /// Minimal record for tests elsewhere in the crate
    pub(crate) fn stub(id: &str, citations: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            title: format!("Paper {id}"),
            authors: Vec::new(),
            year: None,
            abstract_text: None,
            citation_count: citations.len() as u64,
            citation_velocity: 0.0,
            influential_citation_count: 0,
            citations: citations.iter().map(|s| s.to_string()).collect(),
        }
    }
}
