use async_trait::async_trait;
use crawler::{CancelHandle, CrawlConfig, Crawler, FetchError, FetchedPage, PageSource};
use parking_lot::Mutex;
use search_core::pagerank::{self, PageRankConfig};
use search_core::query::{search, Page};
use search_core::{IdCache, Store};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use url::Url;

/// In-memory web keyed by URL; counts fetches per requested URL.
#[derive(Default)]
struct StaticWeb {
    pages: HashMap<String, String>,
    redirects: HashMap<String, String>,
    hits: Mutex<HashMap<String, usize>>,
    /// Fires the handle once this many fetches have started.
    cancel_at: Mutex<Option<(usize, CancelHandle)>>,
}

impl StaticWeb {
    fn page(mut self, url: &str, title: &str, body: &str, links: &[&str]) -> Self {
        let anchors: String = links.iter().map(|l| format!(r#"<a href="{l}">link</a>"#)).collect();
        let html = format!("<html><head><title>{title}</title></head><body><p>{body}</p>{anchors}</body></html>");
        self.pages.insert(url.to_string(), html);
        self
    }

    fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    fn cancel_after(&self, fetches: usize, handle: CancelHandle) {
        *self.cancel_at.lock() = Some((fetches, handle));
    }

    fn hits(&self, url: &str) -> usize {
        self.hits.lock().get(url).copied().unwrap_or(0)
    }

    fn total_hits(&self) -> usize {
        self.hits.lock().values().sum()
    }
}

#[async_trait]
impl PageSource for StaticWeb {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        *self.hits.lock().entry(url.to_string()).or_insert(0) += 1;
        if let Some((at, handle)) = &*self.cancel_at.lock() {
            if self.total_hits() >= *at {
                handle.cancel();
            }
        }
        let target = match self.redirects.get(url.as_str()) {
            Some(to) => Url::parse(to).unwrap(),
            None => url.clone(),
        };
        match self.pages.get(target.as_str()) {
            Some(html) => Ok(FetchedPage {
                url: target,
                content_type: Some("text/html".into()),
                body: html.as_bytes().to_vec(),
            }),
            None => Err(FetchError::Http(404)),
        }
    }
}

struct Harness {
    _dir: TempDir,
    store: Arc<Store>,
    web: Arc<StaticWeb>,
}

impl Harness {
    fn new(web: StaticWeb) -> Self {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        Self { _dir: dir, store, web: Arc::new(web) }
    }

    fn crawler(&self, config: CrawlConfig) -> Crawler {
        let ids = Arc::new(IdCache::new(self.store.clone()));
        Crawler::new(ids, self.web.clone(), config)
    }

    fn doc(&self, url: &str) -> u64 {
        self.store.document_id(url).unwrap().unwrap_or_else(|| panic!("no document for {url}"))
    }
}

fn seeds(urls: &[&str]) -> Vec<Url> {
    urls.iter().map(|u| Url::parse(u).unwrap()).collect()
}

fn depth(max_depth: usize) -> CrawlConfig {
    CrawlConfig { max_depth, concurrency: 4, ..CrawlConfig::default() }
}

fn ring() -> StaticWeb {
    StaticWeb::default()
        .page("http://a.test/", "Alpha", "test crawler alpha", &["http://b.test/", "http://c.test/"])
        .page("http://b.test/", "Beta", "test beta", &["http://c.test/"])
        .page("http://c.test/", "Gamma", "gamma crawler", &["http://a.test/#top"])
}

#[tokio::test]
async fn max_depth_zero_visits_only_seeds() {
    let h = Harness::new(ring());
    let report = h.crawler(depth(0)).crawl(seeds(&["http://a.test/"])).await.unwrap();

    assert_eq!(report.indexed, 1);
    assert_eq!(report.enqueued, 1);
    assert_eq!(report.skipped_depth, 2);
    assert_eq!(h.web.total_hits(), 1);
    // Link targets still become placeholder documents with link rows.
    let a = h.doc("http://a.test/");
    let b = h.doc("http://b.test/");
    assert_eq!(h.store.document(b).unwrap().unwrap().title, "");
    assert!(h.store.all_links().unwrap().contains(&(a, b)));
}

#[tokio::test]
async fn never_fetches_a_url_twice() {
    let h = Harness::new(ring());
    let report = h.crawler(depth(5)).crawl(seeds(&["http://a.test/", "http://a.test/#again"])).await.unwrap();

    assert_eq!(report.indexed, 3);
    assert_eq!(report.visited, 3);
    for url in ["http://a.test/", "http://b.test/", "http://c.test/"] {
        assert_eq!(h.web.hits(url), 1, "{url}");
    }
    assert_eq!(h.store.stats().documents, 3);
    assert_eq!(h.store.stats().links, 4);
}

#[tokio::test]
async fn depth_bounds_the_traversal() {
    let web = StaticWeb::default()
        .page("http://a.test/", "A", "one", &["/b"])
        .page("http://a.test/b", "B", "two", &["/c"])
        .page("http://a.test/c", "C", "three", &["/d"])
        .page("http://a.test/d", "D", "four", &[]);
    let h = Harness::new(web);
    let report = h.crawler(depth(2)).crawl(seeds(&["http://a.test/"])).await.unwrap();

    assert_eq!(report.indexed, 3);
    assert_eq!(report.skipped_depth, 1);
    assert_eq!(h.web.hits("http://a.test/d"), 0);
    let d = h.doc("http://a.test/d");
    assert_eq!(h.store.document(d).unwrap().unwrap().title, "");
    assert_eq!(h.store.document(h.doc("http://a.test/c")).unwrap().unwrap().title, "C");
}

#[tokio::test]
async fn fetch_failures_do_not_stop_the_crawl() {
    let web = StaticWeb::default()
        .page("http://a.test/", "A", "root", &["http://missing.test/", "http://b.test/"])
        .page("http://b.test/", "B", "reachable", &[]);
    let h = Harness::new(web);
    let report = h.crawler(depth(1)).crawl(seeds(&["http://a.test/"])).await.unwrap();

    assert_eq!(report.indexed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.visited, 3);
    assert_eq!(h.web.hits("http://missing.test/"), 1);
}

#[tokio::test]
async fn page_budget_limits_claims() {
    let h = Harness::new(ring());
    let config = CrawlConfig { max_pages: Some(2), ..depth(5) };
    let report = h.crawler(config).crawl(seeds(&["http://a.test/"])).await.unwrap();
    assert_eq!(report.indexed, 2);
    assert_eq!(h.web.total_hits(), 2);
}

#[tokio::test]
async fn cancelled_crawl_claims_nothing_more() {
    let h = Harness::new(ring());
    let crawler = h.crawler(depth(5));
    crawler.cancel_handle().cancel();
    let report = crawler.crawl(seeds(&["http://a.test/"])).await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.indexed, 0);
    assert_eq!(h.web.total_hits(), 0);
    assert_eq!(h.store.stats().documents, 0);
}

/// Page i links to 2i+1 and 2i+2, so the frontier stays wider than the
/// worker pool.
fn tree(pages: usize) -> StaticWeb {
    (0..pages).fold(StaticWeb::default(), |web, i| {
        let children = [format!("http://t.test/{}", 2 * i + 1), format!("http://t.test/{}", 2 * i + 2)];
        let links: Vec<&str> = children.iter().map(String::as_str).collect();
        web.page(&format!("http://t.test/{i}"), &format!("Node {i}"), "tree node", &links)
    })
}

#[tokio::test]
async fn cancelling_mid_crawl_leaves_a_consistent_store() {
    let h = Harness::new(tree(40));
    let config = CrawlConfig { max_depth: 10, concurrency: 2, ..CrawlConfig::default() };
    let crawler = h.crawler(config);
    h.web.cancel_after(3, crawler.cancel_handle());
    let report = crawler.crawl(seeds(&["http://t.test/0"])).await.unwrap();

    assert!(report.cancelled);
    // Only workers already claimed when the signal fired may still fetch.
    let fetched = h.web.total_hits();
    assert!(fetched >= 3 && fetched <= 3 + 2, "fetched {fetched}");
    assert_eq!(report.indexed, fetched);
    assert!(h.store.stats().documents < 40);

    let resolved = h.store.resolve_inverted_index().unwrap();
    assert_eq!(resolved["tree"].len(), report.indexed);
    let docs: BTreeSet<u64> = h.store.all_document_ids().unwrap().into_iter().collect();
    for (from, to) in h.store.all_links().unwrap() {
        assert!(docs.contains(&from) && docs.contains(&to), "dangling link {from} -> {to}");
    }
}

#[tokio::test]
async fn redirect_target_is_not_fetched_again() {
    let web = StaticWeb::default()
        .page("http://a.test/", "A", "root", &["http://x.test/", "https://x.test/"])
        .page("https://x.test/", "X", "xenon", &[])
        .redirect("http://x.test/", "https://x.test/");
    let h = Harness::new(web);
    let config = CrawlConfig { concurrency: 1, ..depth(1) };
    let report = h.crawler(config).crawl(seeds(&["http://a.test/"])).await.unwrap();

    assert_eq!(h.web.hits("http://x.test/"), 1);
    assert_eq!(h.web.hits("https://x.test/"), 0);
    assert_eq!(report.indexed, 2);
    assert_eq!(report.visited, 3);
    let resolved = h.store.resolve_inverted_index().unwrap();
    assert_eq!(resolved["xenon"], BTreeSet::from(["http://x.test/".to_string()]));
}

#[tokio::test]
async fn alias_redirecting_to_a_visited_page_is_skipped() {
    let web = StaticWeb::default()
        .page("https://x.test/", "X", "xenon", &[])
        .redirect("http://x.test/", "https://x.test/");
    let h = Harness::new(web);
    let config = CrawlConfig { concurrency: 1, ..depth(0) };
    let report = h.crawler(config).crawl(seeds(&["https://x.test/", "http://x.test/"])).await.unwrap();

    assert_eq!(report.indexed, 1);
    assert_eq!(report.redirect_duplicates, 1);
    assert_eq!(h.web.hits("http://x.test/"), 1);
    assert_eq!(h.store.document_id("http://x.test/").unwrap(), None);
    let resolved = h.store.resolve_inverted_index().unwrap();
    assert_eq!(resolved["xenon"], BTreeSet::from(["https://x.test/".to_string()]));
}

#[tokio::test]
async fn crawl_builds_a_searchable_index() {
    let h = Harness::new(ring());
    h.crawler(depth(3)).crawl(seeds(&["http://a.test/"])).await.unwrap();

    let resolved = h.store.resolve_inverted_index().unwrap();
    assert_eq!(
        resolved["crawler"],
        BTreeSet::from(["http://a.test/".to_string(), "http://c.test/".to_string()])
    );
    assert_eq!(resolved["beta"], BTreeSet::from(["http://b.test/".to_string()]));

    let outcome = pagerank::run(&h.store, &PageRankConfig::default()).unwrap();
    let total: f64 = outcome.scores.values().sum();
    assert!((total - 1.0).abs() < 1e-9);

    // c is linked from both a and b, so it outranks b.
    let results = search(&h.store, "test crawler", Page::default()).unwrap();
    let urls: Vec<&str> = results.hits.iter().map(|hit| hit.url.as_str()).collect();
    assert_eq!(urls.len(), 3);
    let c = urls.iter().position(|u| *u == "http://c.test/").unwrap();
    let b = urls.iter().position(|u| *u == "http://b.test/").unwrap();
    assert!(c < b);
    assert_eq!(results.hits.iter().find(|hit| hit.url == "http://a.test/").unwrap().title, "Alpha");

    assert!(search(&h.store, "nonexistent", Page::default()).unwrap().hits.is_empty());
}

#[tokio::test]
async fn recrawl_reuses_ids() {
    let h = Harness::new(ring());
    h.crawler(depth(3)).crawl(seeds(&["http://a.test/"])).await.unwrap();
    let before = h.store.stats();
    let a = h.doc("http://a.test/");
    let test = h.store.word_id("test").unwrap().unwrap();

    h.crawler(depth(3)).crawl(seeds(&["http://a.test/"])).await.unwrap();
    assert_eq!(h.store.stats(), before);
    assert_eq!(h.doc("http://a.test/"), a);
    assert_eq!(h.store.word_id("test").unwrap(), Some(test));
}
