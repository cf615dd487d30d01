use crate::parse::ParsedPage;
use search_core::{DocId, IdCache, StorageResult};
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexedPage {
    pub doc_id: DocId,
    pub terms: usize,
    pub new_links: usize,
}

/// Writes one fetched page: its document row and title, one inverted entry
/// per distinct term, and a link row per outbound target. Targets get a
/// placeholder document before their link row is written.
pub fn index_page(ids: &IdCache, url: &str, page: &ParsedPage) -> StorageResult<IndexedPage> {
    let store = ids.store();
    let doc_id = ids.document_id(url)?;
    let crawled_at = time::OffsetDateTime::now_utc().format(&Rfc3339).ok();
    store.set_document_title(doc_id, &page.title, crawled_at.as_deref())?;

    let terms = page.terms();
    for term in &terms {
        let word_id = ids.word_id(term)?;
        store.add_inverted_entry(word_id, doc_id)?;
    }

    let mut new_links = 0;
    for target in &page.links {
        let target_id = ids.document_id(target.as_str())?;
        if store.add_link(doc_id, target_id)? {
            new_links += 1;
        }
    }
    tracing::debug!(url, doc_id, terms = terms.len(), links = page.links.len(), "indexed page");
    Ok(IndexedPage { doc_id, terms: terms.len(), new_links })
}
