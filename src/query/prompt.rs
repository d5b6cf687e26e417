//! Context and prompt assembly.

use crate::model::document::IndexedDocument;

/// Separator placed between documents in the context.
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// Render documents as a context block, in the given order.
///
/// Each document shows `From`, `To`, `Subject` and `Date` (with `Unknown` /
/// `No Subject` placeholders), a blank line, then its trimmed content.
pub fn build_context(documents: &[IndexedDocument]) -> String {
    documents
        .iter()
        .map(|doc| {
            let meta = &doc.metadata;
            format!(
                "From: {}\nTo: {}\nSubject: {}\nDate: {}\n\n{}",
                meta.from.as_deref().unwrap_or("Unknown"),
                meta.to.as_deref().unwrap_or("Unknown"),
                meta.subject.as_deref().unwrap_or("No Subject"),
                meta.date.as_deref().unwrap_or("Unknown"),
                doc.content.trim()
            )
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER)
}

/// Fill the grounding instruction template.
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are an AI assistant helping analyze and summarize corporate email trails. \
         Use only the information provided in the CONTEXT to answer the QUESTION.\n\
         Be specific, and do not make assumptions beyond the content.\n\n\
         QUESTION:\n{question}\n\n\
         CONTEXT:\n{context}\n\n\
         Answer:"
    )
}
