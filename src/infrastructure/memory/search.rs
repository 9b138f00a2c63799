//! In-process message index.
//!
//! Approximates the Elasticsearch `match` query with `fuzziness: AUTO`:
//! bodies and queries are split on non-alphanumeric characters and
//! lowercased, and a query term matches a body term within an edit distance
//! of 0 (1-2 chars), 1 (3-5 chars) or 2 (longer). A document matches if any
//! query term does.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::pipeline::{MessageDocument, SearchIndexer};
use crate::domain::Message;
use crate::shared::error::AppError;

const SEARCH_RESULT_SIZE: usize = 50;

#[derive(Debug, Default)]
pub struct MemorySearchIndex {
    /// Keyed by document id
    documents: RwLock<BTreeMap<String, MessageDocument>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    pub fn get(&self, document_id: &str) -> Option<MessageDocument> {
        self.documents.read().get(document_id).cloned()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Maximum edits allowed for a term under `fuzziness: AUTO`.
fn auto_fuzziness(term: &str) -> usize {
    match term.chars().count() {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Number of query terms found in `body`.
fn score(query_terms: &[String], body: &str) -> usize {
    let body_terms = tokenize(body);
    query_terms
        .iter()
        .filter(|q| {
            let allowed = auto_fuzziness(q);
            body_terms.iter().any(|t| edit_distance(q, t) <= allowed)
        })
        .count()
}

#[async_trait]
impl SearchIndexer for MemorySearchIndex {
    async fn ensure_index(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn index(&self, message: &Message) -> Result<(), AppError> {
        self.documents
            .write()
            .insert(message.document_id(), MessageDocument::from(message));
        Ok(())
    }

    async fn search(&self, chat_id: i64, query: &str) -> Result<Vec<MessageDocument>, AppError> {
        let terms = tokenize(query);
        let chat_id = chat_id.to_string();

        let mut hits: Vec<(usize, MessageDocument)> = self
            .documents
            .read()
            .values()
            .filter(|doc| doc.chat_id == chat_id)
            .filter_map(|doc| match score(&terms, &doc.body) {
                0 => None,
                n => Some((n, doc.clone())),
            })
            .collect();

        hits.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then(a.message_number.cmp(&b.message_number)));
        Ok(hits
            .into_iter()
            .take(SEARCH_RESULT_SIZE)
            .map(|(_, doc)| doc)
            .collect())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
