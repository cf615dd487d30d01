use crate::error::StorageResult;
use crate::store::Store;
use crate::{DocId, WordId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct BiMap<K> {
    by_key: HashMap<String, K>,
    by_id: HashMap<K, String>,
}

/// Process-local word<->id and url<->id mappings in front of the [`Store`].
///
/// One instance is built per crawl (or server) run and shared by reference.
/// Misses call through to `Store::ensure_*`, whose insert-if-absent is
/// transactional, so racing workers always cache the same id. Nothing is
/// evicted.
pub struct IdCache {
    store: Arc<Store>,
    words: RwLock<BiMap<WordId>>,
    docs: RwLock<BiMap<DocId>>,
}

impl IdCache {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store, words: RwLock::default(), docs: RwLock::default() }
    }

    pub fn store(&self) -> &Arc<Store> { &self.store }

    pub fn word_id(&self, text: &str) -> StorageResult<WordId> {
        if let Some(&id) = self.words.read().by_key.get(text) {
            return Ok(id);
        }
        let id = self.store.ensure_word(text)?;
        let mut w = self.words.write();
        w.by_key.insert(text.to_string(), id);
        w.by_id.insert(id, text.to_string());
        Ok(id)
    }

    pub fn document_id(&self, url: &str) -> StorageResult<DocId> {
        if let Some(&id) = self.docs.read().by_key.get(url) {
            return Ok(id);
        }
        let id = self.store.ensure_document(url)?;
        let mut d = self.docs.write();
        d.by_key.insert(url.to_string(), id);
        d.by_id.insert(id, url.to_string());
        Ok(id)
    }

    /// Reverse lookup; falls back to the store for ids created by another
    /// process or before this cache existed.
    pub fn word_text(&self, word_id: WordId) -> StorageResult<Option<String>> {
        if let Some(text) = self.words.read().by_id.get(&word_id) {
            return Ok(Some(text.clone()));
        }
        let text = self.store.word_text(word_id)?;
        if let Some(t) = &text {
            let mut w = self.words.write();
            w.by_key.insert(t.clone(), word_id);
            w.by_id.insert(word_id, t.clone());
        }
        Ok(text)
    }

    pub fn url(&self, doc_id: DocId) -> StorageResult<Option<String>> {
        if let Some(url) = self.docs.read().by_id.get(&doc_id) {
            return Ok(Some(url.clone()));
        }
        let url = self.store.document(doc_id)?.map(|meta| meta.url);
        if let Some(u) = &url {
            let mut d = self.docs.write();
            d.by_key.insert(u.clone(), doc_id);
            d.by_id.insert(doc_id, u.clone());
        }
        Ok(url)
    }

    pub fn cached_words(&self) -> usize { self.words.read().by_key.len() }

    pub fn cached_documents(&self) -> usize { self.docs.read().by_key.len() }
}
