//! Retrieval and grounded answering.
//!
//! A question is matched against the store (optionally within one thread),
//! the hits are rendered into a context block, and the generator answers
//! from that context only. No hits means no generation call.

pub mod prompt;

pub use prompt::{build_context, build_prompt, CONTEXT_DELIMITER};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::Generator;
use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::model::document::IndexedDocument;
use crate::store::{DocumentStore, MetadataFilter};

/// Thread label meaning "search every thread".
pub const ALL_THREADS: &str = "All Threads";

/// Search algorithm used for retrieval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    /// Maximal marginal relevance.
    #[default]
    Mmr,
    /// Plain nearest neighbours.
    Similarity,
}

/// Retrieval parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalOptions {
    pub search: SearchKind,
    pub top_k: usize,
    pub fetch_k: usize,
    pub mmr_lambda: f32,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for RetrievalOptions {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            search: config.search,
            top_k: config.top_k.max(1),
            fetch_k: config.fetch_k,
            mmr_lambda: config.mmr_lambda,
        }
    }
}

/// Result of [`answer`].
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// The generator's reply and the documents it was grounded on.
    Grounded {
        text: String,
        retrieved: Vec<IndexedDocument>,
        context: String,
    },
    /// Retrieval found nothing; the generator was not called.
    NoRelevantDocuments,
}

impl Answer {
    /// Answer text, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Answer::Grounded { text, .. } => Some(text),
            Answer::NoRelevantDocuments => None,
        }
    }
}

/// Map a user-facing thread choice to a filter value; [`ALL_THREADS`] and
/// blank labels mean no filter.
pub fn thread_scope(label: Option<&str>) -> Option<&str> {
    label
        .map(str::trim)
        .filter(|l| !l.is_empty() && *l != ALL_THREADS)
}

/// Fetch the documents for `question`, best first.
pub fn retrieve<S: DocumentStore + ?Sized>(
    store: &mut S,
    question: &str,
    thread_filter: Option<&str>,
    options: &RetrievalOptions,
) -> Result<Vec<IndexedDocument>> {
    let filter = thread_filter.map(MetadataFilter::thread);
    let docs = match options.search {
        SearchKind::Mmr => store.mmr_search(
            question,
            options.top_k,
            options.fetch_k,
            options.mmr_lambda,
            filter.as_ref(),
        )?,
        SearchKind::Similarity => {
            store.similarity_search(question, options.top_k, filter.as_ref())?
        }
    };
    debug!(
        hits = docs.len(),
        thread = thread_filter.unwrap_or("*"),
        search = ?options.search,
        "Retrieved documents"
    );
    Ok(docs)
}

/// Retrieve context for `question` and ask the generator.
///
/// Generation errors propagate; there is no fallback answer.
pub fn answer<S: DocumentStore + ?Sized>(
    store: &mut S,
    generator: &dyn Generator,
    question: &str,
    thread_filter: Option<&str>,
    options: &RetrievalOptions,
) -> Result<Answer> {
    let retrieved = retrieve(store, question, thread_filter, options)?;
    if retrieved.is_empty() {
        warn!(thread = thread_filter.unwrap_or("*"), "No relevant documents found");
        return Ok(Answer::NoRelevantDocuments);
    }

    let context = build_context(&retrieved);
    let prompt = build_prompt(question, &context);
    let text = generator.generate(&prompt)?;
    info!(
        documents = retrieved.len(),
        model = generator.model_name(),
        "Answered question"
    );
    Ok(Answer::Grounded {
        text,
        retrieved,
        context,
    })
}
