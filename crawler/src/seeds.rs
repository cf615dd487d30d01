use crate::parse::normalize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use url::Url;

/// Parses one seed entry. Bare hosts get `https://`; non-http(s) schemes are
/// rejected.
pub fn parse_seed(s: &str) -> Option<Url> {
    let s = s.trim();
    if s.is_empty() || s.starts_with('#') {
        return None;
    }
    let u = Url::parse(s).or_else(|_| Url::parse(&format!("https://{}", s))).ok()?;
    matches!(u.scheme(), "http" | "https").then(|| normalize(&u))
}

/// One URL per line; blank lines and `#` comments are ignored, invalid
/// entries are logged and skipped.
pub fn load_seeds<P: AsRef<Path>>(path: P) -> io::Result<Vec<Url>> {
    let mut seeds = Vec::new();
    for line in BufReader::new(File::open(path)?).lines() {
        let line = line?;
        match parse_seed(&line) {
            Some(u) => seeds.push(u),
            None if line.trim().is_empty() || line.trim_start().starts_with('#') => {}
            None => tracing::warn!(seed = line.trim(), "ignoring invalid seed"),
        }
    }
    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_bare_hosts_and_strips_fragments() {
        assert_eq!(parse_seed("example.com").unwrap().as_str(), "https://example.com/");
        assert_eq!(parse_seed(" http://a.test/x#frag ").unwrap().as_str(), "http://a.test/x");
        assert!(parse_seed("ftp://files.test/").is_none());
        assert!(parse_seed("# comment").is_none());
    }

    #[test]
    fn loads_seed_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "# seeds\n\nhttp://a.test/\nexample.com\nftp://nope/").unwrap();
        let seeds = load_seeds(f.path()).unwrap();
        let seeds: Vec<&str> = seeds.iter().map(Url::as_str).collect();
        assert_eq!(seeds, vec!["http://a.test/", "https://example.com/"]);
    }
}
