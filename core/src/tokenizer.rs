use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}][\p{L}\p{N}_']*").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","could","did","do","does","doing","down","during",
            "each","few","for","from","further",
            "had","has","have","having","he","her","here","hers","him","his","how",
            "i","if","in","into","is","it","it's","its",
            "me","more","most","my","no","nor","not","of","off","on","once","only","or","other","our","ours","out","over","own",
            "same","she","should","so","some","such",
            "than","that","the","their","them","then","there","these","they","this","those","through","to","too",
            "under","until","up","very","was","we","were","what","when","where","which","while","who","whom","why","with","would",
            "you","your","yours"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Lazily yields index terms from a piece of text: NFKC-normalized,
/// lower-cased runs of letters and digits, with stop words removed.
///
/// The query path runs keywords through the same function, so indexing and
/// lookup always agree on what a term is.
pub struct Tokens {
    normalized: String,
    offset: usize,
}

impl Iterator for Tokens {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let mat = RE.find_at(&self.normalized, self.offset)?;
            self.offset = mat.end();
            let token = mat.as_str().trim_end_matches('\'');
            if token.is_empty() || is_stopword(token) { continue; }
            return Some(token.to_string());
        }
    }
}

pub fn tokenize(text: &str) -> Tokens {
    Tokens { normalized: text.nfkc().collect::<String>().to_lowercase(), offset: 0 }
}

/// Distinct terms of `text`, sorted. Presence is all the inverted index records.
pub fn distinct_terms(text: &str) -> BTreeSet<String> {
    tokenize(text).collect()
}
