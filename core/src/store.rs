use crate::error::{StorageError, StorageResult};
use crate::{DocId, WordId};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree};
use sled::{Batch, Db, Transactional, Tree};
use std::collections::HashMap;
use std::path::Path;

const NEXT_WORD_ID: &[u8] = b"next_word_id";
const NEXT_DOC_ID: &[u8] = b"next_doc_id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocMeta {
    pub url: String,
    /// Empty until the document has been fetched.
    pub title: String,
    /// RFC 3339 timestamp of the fetch that set the title.
    pub crawled_at: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub words: usize,
    pub documents: usize,
    pub inverted_entries: usize,
    pub links: usize,
    pub page_ranks: usize,
}

/// Persistent schema: Lexicon, DocumentIndex, InvertedIndex, Links and
/// PageRank, one sled tree each plus reverse lookups and id counters.
///
/// Ids are dense, start at 1 and are never reused. Link and inverted-index
/// rows are sets keyed by the big-endian id pair, so re-inserting is a no-op.
pub struct Store {
    db: Db,
    words: Tree,
    word_text: Tree,
    documents: Tree,
    doc_meta: Tree,
    inverted: Tree,
    links: Tree,
    page_rank: Tree,
    counters: Tree,
}

impl Store {
    /// Opens the database at `path`, creating missing parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        std::fs::create_dir_all(path.as_ref())?;
        let db = sled::open(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "opened store");
        Ok(Self {
            words: db.open_tree("words")?,
            word_text: db.open_tree("word_text")?,
            documents: db.open_tree("documents")?,
            doc_meta: db.open_tree("doc_meta")?,
            inverted: db.open_tree("inverted")?,
            links: db.open_tree("links")?,
            page_rank: db.open_tree("page_rank")?,
            counters: db.open_tree("counters")?,
            db,
        })
    }

    /// Returns the id of `text`, inserting it into the lexicon if absent.
    /// Concurrent callers racing on the same text all observe one id.
    pub fn ensure_word(&self, text: &str) -> StorageResult<WordId> {
        if let Some(raw) = self.words.get(text)? {
            return decode_id(&raw);
        }
        let id = (&self.words, &self.word_text, &self.counters).transaction(
            |(words, word_text, counters)| -> ConflictableTransactionResult<WordId, StorageError> {
                if let Some(raw) = words.get(text)? {
                    return decode_id(&raw).map_err(ConflictableTransactionError::Abort);
                }
                let id = next_id(counters, NEXT_WORD_ID)?;
                words.insert(text.as_bytes(), id_key(id))?;
                word_text.insert(id_key(id), text.as_bytes())?;
                Ok(id)
            },
        )?;
        tracing::trace!(word = text, id, "new word");
        Ok(id)
    }

    /// Same contract as [`Store::ensure_word`] for URLs. New documents start
    /// with an empty title.
    pub fn ensure_document(&self, url: &str) -> StorageResult<DocId> {
        if let Some(raw) = self.documents.get(url)? {
            return decode_id(&raw);
        }
        let meta = bincode::serialize(&DocMeta { url: url.to_string(), ..DocMeta::default() })?;
        let id = (&self.documents, &self.doc_meta, &self.counters).transaction(
            |(documents, doc_meta, counters)| -> ConflictableTransactionResult<DocId, StorageError> {
                if let Some(raw) = documents.get(url)? {
                    return decode_id(&raw).map_err(ConflictableTransactionError::Abort);
                }
                let id = next_id(counters, NEXT_DOC_ID)?;
                documents.insert(url.as_bytes(), id_key(id))?;
                doc_meta.insert(id_key(id), meta.clone())?;
                Ok(id)
            },
        )?;
        tracing::trace!(url, id, "new document");
        Ok(id)
    }

    pub fn word_id(&self, text: &str) -> StorageResult<Option<WordId>> {
        self.words.get(text)?.map(|raw| decode_id(&raw)).transpose()
    }

    pub fn word_text(&self, word_id: WordId) -> StorageResult<Option<String>> {
        match self.word_text.get(id_key(word_id))? {
            Some(raw) => String::from_utf8(raw.to_vec())
                .map(Some)
                .map_err(|_| StorageError::Corrupt(format!("word {word_id} is not utf-8"))),
            None => Ok(None),
        }
    }

    pub fn document_id(&self, url: &str) -> StorageResult<Option<DocId>> {
        self.documents.get(url)?.map(|raw| decode_id(&raw)).transpose()
    }

    pub fn document(&self, doc_id: DocId) -> StorageResult<Option<DocMeta>> {
        match self.doc_meta.get(id_key(doc_id))? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_document_title(&self, doc_id: DocId, title: &str, crawled_at: Option<&str>) -> StorageResult<()> {
        let mut meta = self
            .document(doc_id)?
            .ok_or_else(|| StorageError::GraphInconsistency(format!("document {doc_id} does not exist")))?;
        meta.title = title.to_string();
        meta.crawled_at = crawled_at.map(str::to_string);
        self.doc_meta.insert(id_key(doc_id), bincode::serialize(&meta)?)?;
        Ok(())
    }

    /// Records that `word_id` occurs in `doc_id`. Idempotent.
    pub fn add_inverted_entry(&self, word_id: WordId, doc_id: DocId) -> StorageResult<()> {
        if !self.word_text.contains_key(id_key(word_id))? {
            return Err(StorageError::GraphInconsistency(format!("word {word_id} does not exist")));
        }
        self.require_document(doc_id)?;
        self.inverted.insert(pair_key(word_id, doc_id), Vec::<u8>::new())?;
        Ok(())
    }

    /// Doc ids with an inverted-index entry for `word_id`, ascending.
    pub fn documents_for_word(&self, word_id: WordId) -> StorageResult<Vec<DocId>> {
        let mut docs = Vec::new();
        for key in self.inverted.scan_prefix(id_key(word_id)).keys() {
            let (_, doc_id) = decode_pair(&key?)?;
            docs.push(doc_id);
        }
        Ok(docs)
    }

    /// Every (word_id, doc_id) entry of the inverted index.
    pub fn inverted_entries(&self) -> StorageResult<Vec<(WordId, DocId)>> {
        self.inverted.iter().keys().map(|key| decode_pair(&key?)).collect()
    }

    /// Adds the directed edge `from -> to`. Returns `false` when the edge was
    /// already present; duplicate edges collapse into one.
    pub fn add_link(&self, from: DocId, to: DocId) -> StorageResult<bool> {
        self.require_document(from)?;
        self.require_document(to)?;
        let previous = self.links.insert(pair_key(from, to), Vec::<u8>::new())?;
        Ok(previous.is_none())
    }

    pub fn all_links(&self) -> StorageResult<Vec<(DocId, DocId)>> {
        self.links.iter().keys().map(|key| decode_pair(&key?)).collect()
    }

    pub fn all_document_ids(&self) -> StorageResult<Vec<DocId>> {
        self.doc_meta.iter().keys().map(|key| decode_id(&key?)).collect()
    }

    /// Replaces the whole PageRank relation in one atomic batch.
    pub fn replace_page_ranks(&self, scores: &HashMap<DocId, f64>) -> StorageResult<()> {
        let mut batch = Batch::default();
        for key in self.page_rank.iter().keys() {
            let key = key?;
            if !scores.contains_key(&decode_id(&key)?) {
                batch.remove(key);
            }
        }
        for (&doc_id, &score) in scores {
            self.require_document(doc_id)?;
            batch.insert(id_key(doc_id), score.to_bits().to_be_bytes().to_vec());
        }
        self.page_rank.apply_batch(batch)?;
        Ok(())
    }

    pub fn page_rank(&self, doc_id: DocId) -> StorageResult<Option<f64>> {
        self.page_rank.get(id_key(doc_id))?.map(|raw| decode_score(&raw)).transpose()
    }

    pub fn page_ranks(&self) -> StorageResult<HashMap<DocId, f64>> {
        let mut scores = HashMap::new();
        for item in self.page_rank.iter() {
            let (key, value) = item?;
            scores.insert(decode_id(&key)?, decode_score(&value)?);
        }
        Ok(scores)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            words: self.words.len(),
            documents: self.doc_meta.len(),
            inverted_entries: self.inverted.len(),
            links: self.links.len(),
            page_ranks: self.page_rank.len(),
        }
    }

    pub fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn require_document(&self, doc_id: DocId) -> StorageResult<()> {
        if self.doc_meta.contains_key(id_key(doc_id))? {
            Ok(())
        } else {
            Err(StorageError::GraphInconsistency(format!("document {doc_id} does not exist")))
        }
    }
}

fn next_id(counters: &TransactionalTree, key: &[u8]) -> ConflictableTransactionResult<u64, StorageError> {
    let next = match counters.get(key)? {
        Some(raw) => decode_id(&raw).map_err(ConflictableTransactionError::Abort)?,
        None => 1,
    };
    counters.insert(key, (next + 1).to_be_bytes().to_vec())?;
    Ok(next)
}

fn id_key(id: u64) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

fn pair_key(a: u64, b: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&a.to_be_bytes());
    key.extend_from_slice(&b.to_be_bytes());
    key
}

fn decode_id(raw: &[u8]) -> StorageResult<u64> {
    let bytes: [u8; 8] = raw
        .try_into()
        .map_err(|_| StorageError::Corrupt(format!("expected 8-byte id, got {} bytes", raw.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

fn decode_pair(raw: &[u8]) -> StorageResult<(u64, u64)> {
    if raw.len() != 16 {
        return Err(StorageError::Corrupt(format!("expected 16-byte pair, got {} bytes", raw.len())));
    }
    Ok((decode_id(&raw[..8])?, decode_id(&raw[8..])?))
}

fn decode_score(raw: &[u8]) -> StorageResult<f64> {
    decode_id(raw).map(f64::from_bits)
}
