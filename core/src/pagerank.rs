use crate::error::{StorageError, StorageResult};
use crate::store::Store;
use crate::DocId;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy)]
pub struct PageRankConfig {
    pub damping: f64,
    /// Iteration stops once the L1 change of the score vector drops below this.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self { damping: 0.85, tolerance: 1e-6, max_iterations: 100 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PageRankOutcome {
    pub scores: HashMap<DocId, f64>,
    pub iterations: usize,
    pub converged: bool,
    /// L1 change of the last iteration.
    pub delta: f64,
}

/// Power-iteration PageRank over `docs` with edges `links`.
///
/// Duplicate edges collapse into one and self-loops count toward out-degree.
/// Mass held by dangling documents is spread uniformly over all documents,
/// so the scores always sum to 1. Every document gets a score, isolated ones
/// included. An edge naming a document outside `docs` is an integrity error.
pub fn compute(docs: &[DocId], links: &[(DocId, DocId)], config: &PageRankConfig) -> StorageResult<PageRankOutcome> {
    let ids: Vec<DocId> = docs.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    let n = ids.len();
    if n == 0 {
        return Ok(PageRankOutcome { converged: true, ..PageRankOutcome::default() });
    }
    let index: HashMap<DocId, usize> = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

    let edges: BTreeSet<(usize, usize)> = links
        .iter()
        .map(|&(from, to)| match (index.get(&from), index.get(&to)) {
            (Some(&f), Some(&t)) => Ok((f, t)),
            _ => Err(StorageError::GraphInconsistency(format!("link {from} -> {to} references an unknown document"))),
        })
        .collect::<StorageResult<_>>()?;

    let mut out_degree = vec![0usize; n];
    let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(f, t) in &edges {
        out_degree[f] += 1;
        incoming[t].push(f);
    }
    let dangling: Vec<usize> = (0..n).filter(|&i| out_degree[i] == 0).collect();

    let d = config.damping;
    let nf = n as f64;
    let mut scores = vec![1.0 / nf; n];
    let mut outcome = PageRankOutcome::default();

    for iteration in 1..=config.max_iterations {
        let dangling_mass: f64 = dangling.iter().map(|&i| scores[i]).sum();
        let base = (1.0 - d) / nf + d * dangling_mass / nf;

        // Every read below sees the previous iteration's vector.
        let next: Vec<f64> = (0..n)
            .into_par_iter()
            .map(|p| {
                let inflow: f64 = incoming[p].iter().map(|&q| scores[q] / out_degree[q] as f64).sum();
                base + d * inflow
            })
            .collect();

        let delta: f64 = next.par_iter().zip(scores.par_iter()).map(|(a, b)| (a - b).abs()).sum();
        scores = next;
        outcome.iterations = iteration;
        outcome.delta = delta;
        if delta < config.tolerance {
            outcome.converged = true;
            break;
        }
    }

    outcome.scores = ids.into_iter().zip(scores).collect();
    Ok(outcome)
}

/// Reads the link graph from `store`, computes PageRank and replaces the
/// stored scores.
pub fn run(store: &Store, config: &PageRankConfig) -> StorageResult<PageRankOutcome> {
    let docs = store.all_document_ids()?;
    let links = store.all_links()?;
    tracing::info!(documents = docs.len(), links = links.len(), "computing pagerank");
    let outcome = compute(&docs, &links, config)?;
    store.replace_page_ranks(&outcome.scores)?;
    if outcome.converged {
        tracing::info!(iterations = outcome.iterations, delta = outcome.delta, "pagerank converged");
    } else {
        tracing::warn!(iterations = outcome.iterations, delta = outcome.delta, "pagerank hit the iteration limit");
    }
    Ok(outcome)
}
