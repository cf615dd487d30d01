use crate::error::{StorageError, StorageResult};
use crate::store::Store;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Word text -> URLs of the documents containing it.
pub type ResolvedIndex = BTreeMap<String, BTreeSet<String>>;

impl Store {
    /// Materializes the inverted index through the Lexicon and DocumentIndex.
    /// Reads the current state on every call; nothing is cached.
    pub fn resolve_inverted_index(&self) -> StorageResult<ResolvedIndex> {
        let mut words: HashMap<u64, String> = HashMap::new();
        let mut urls: HashMap<u64, String> = HashMap::new();
        let mut resolved = ResolvedIndex::new();

        for (word_id, doc_id) in self.inverted_entries()? {
            if !words.contains_key(&word_id) {
                let text = self
                    .word_text(word_id)?
                    .ok_or_else(|| StorageError::GraphInconsistency(format!("inverted entry for unknown word {word_id}")))?;
                words.insert(word_id, text);
            }
            if !urls.contains_key(&doc_id) {
                let meta = self
                    .document(doc_id)?
                    .ok_or_else(|| StorageError::GraphInconsistency(format!("inverted entry for unknown document {doc_id}")))?;
                urls.insert(doc_id, meta.url);
            }
            resolved.entry(words[&word_id].clone()).or_default().insert(urls[&doc_id].clone());
        }
        Ok(resolved)
    }
}
