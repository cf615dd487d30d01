//! Breadth-first crawler that feeds the search core: fetches pages, extracts
//! terms and links, and writes the lexicon, inverted index and link graph.

pub mod crawl;
pub mod fetch;
pub mod frontier;
pub mod ingest;
pub mod parse;
pub mod seeds;

pub use crawl::{CancelHandle, CrawlConfig, CrawlError, CrawlReport, Crawler};
pub use fetch::{FetchConfig, FetchError, FetchedPage, HttpFetcher, PageSource};
pub use frontier::{Frontier, FrontierEntry};
pub use parse::{parse, ParseError, ParsedPage};
