//! Multi-chain sparse DP over all anchors of one query/genome pair.

use super::{gap_score, seed_weight, Chain};
use crate::libs::anchor::{distance, gap, Anchor};
use crate::libs::pool::Recycle;
use log::trace;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalOptions {
    /// Maximum off-diagonal drift between chained anchors.
    pub max_gap: u32,
    pub min_score: f64,
    /// Maximum distance between the begins of chained anchors.
    pub max_distance: u32,
    /// Number of chains to report, 0 for all.
    pub top_chains: usize,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            max_gap: 5000,
            min_score: 20.0,
            max_distance: 10000,
            top_chains: 0,
        }
    }
}

/// Reusable chainer; its buffers are scratch for one call at a time.
#[derive(Debug, Clone, Default)]
pub struct GlobalChainer {
    options: GlobalOptions,
    scores: Vec<f64>,
    preds: Vec<usize>,
    dirs: Vec<i8>,
    visited: Vec<bool>,
    order: Vec<usize>,
}

impl GlobalChainer {
    pub fn new(options: GlobalOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn options(&self) -> &GlobalOptions {
        &self.options
    }

    /// Chains `anchors`, which must be sorted by query begin.
    ///
    /// Returns disjoint chains by decreasing score and the best score; an
    /// empty list means nothing reached `min_score`.
    pub fn chain(&mut self, anchors: &[Anchor]) -> (Vec<Chain>, f64) {
        let opt = &self.options;
        let n = anchors.len();
        if n == 0 {
            return (Vec::new(), 0.0);
        }
        if n == 1 {
            let w = seed_weight(anchors[0].len as f64);
            if w >= opt.min_score {
                return (vec![Chain::from_indices(anchors, vec![0], w)], w);
            }
            return (Vec::new(), 0.0);
        }

        self.scores.clear();
        self.preds.clear();
        self.dirs.clear();
        self.scores.resize(n, 0.0);
        self.preds.resize(n, 0);
        self.dirs.resize(n, 0);

        self.scores[0] = seed_weight(anchors[0].len as f64);
        self.preds[0] = 0;

        let max_distance = opt.max_distance as f64;
        let max_gap = opt.max_gap as f64;

        for i in 1..n {
            let a = &anchors[i];
            let wa = seed_weight(a.len as f64);

            let mut best = wa;
            let mut best_j = i;
            let mut best_dir = 0i8;

            // anchors beyond max_distance in the query can't be within it overall
            let lower = anchors[..i]
                .partition_point(|b| b.q_begin as u64 + (opt.max_distance as u64) < a.q_begin as u64);

            for j in (lower..i).rev() {
                let b = &anchors[j];
                if b.q_begin == a.q_begin || !a.same_strand(b) {
                    continue;
                }
                if a.t_begin.abs_diff(b.t_begin) > opt.max_distance
                    || distance(a, b) > max_distance
                {
                    continue;
                }
                let g = gap(a, b);
                if g > max_gap {
                    continue;
                }

                let w = if b.q_end() <= a.q_begin {
                    wa
                } else if a.q_end() > b.q_end() {
                    // merge: only the extension beyond b counts
                    seed_weight((a.q_end() - b.q_begin) as f64) - seed_weight(b.len as f64)
                } else {
                    0.0
                };

                let dir: i8 = if a.t_begin >= b.t_begin { 1 } else { -1 };
                let s = if self.dirs[j] != 0 && self.dirs[j] != dir {
                    // direction flip: restart from b alone
                    seed_weight(b.len as f64) + w - gap_score(g)
                } else {
                    self.scores[j] + w - gap_score(g)
                };

                if s >= opt.min_score && s > best {
                    best = s;
                    best_j = j;
                    best_dir = dir;
                }
            }

            self.scores[i] = best;
            self.preds[i] = best_j;
            self.dirs[i] = best_dir;
        }

        let chains = self.backtrack(anchors);
        let best = chains.first().map_or(0.0, |c| c.score);
        trace!(
            "global chaining: {} anchors, {} chains, best score {:.1}",
            n,
            chains.len(),
            best
        );
        (chains, best)
    }

    /// Peels chains from the highest-scoring unvisited terminus down.
    ///
    /// A chain cut short by an anchor already taken by a better chain is
    /// rescored without that anchor's prefix and dropped below `min_score`.
    fn backtrack(&mut self, anchors: &[Anchor]) -> Vec<Chain> {
        let n = anchors.len();
        let scores = &self.scores;
        let dirs = &self.dirs;

        self.order.clear();
        self.order.extend(0..n);
        self.order.sort_by(|&x, &y| {
            scores[y]
                .partial_cmp(&scores[x])
                .unwrap_or(Ordering::Equal)
                .then(x.cmp(&y))
        });

        self.visited.clear();
        self.visited.resize(n, false);

        let mut chains = Vec::new();
        for &end in &self.order {
            if scores[end] < self.options.min_score {
                break;
            }
            if self.visited[end] {
                continue;
            }

            let mut path = Vec::new();
            let mut i = end;
            let truncated = loop {
                self.visited[i] = true;
                path.push(i);
                let j = self.preds[i];
                if j == i {
                    break false;
                }
                if self.visited[j] {
                    // the rest belongs to a better chain
                    break true;
                }
                i = j;
            };
            path.reverse();

            let mut score = scores[end];
            if truncated {
                let first = path[0];
                // a direction restart inside the path already dropped the prefix
                let restarted = path
                    .windows(2)
                    .any(|w| dirs[w[0]] != 0 && dirs[w[0]] != dirs[w[1]]);
                if !restarted {
                    score -= scores[first] - seed_weight(anchors[first].len as f64);
                }
                if score < self.options.min_score {
                    continue;
                }
            }
            chains.push(Chain::from_indices(anchors, path, score));
        }

        // rescoring can reorder chains
        chains.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        if self.options.top_chains > 0 {
            chains.truncate(self.options.top_chains);
        }
        chains
    }
}

impl Recycle for GlobalChainer {
    fn recycle(&mut self) {
        self.scores.clear();
        self.preds.clear();
        self.dirs.clear();
        self.visited.clear();
        self.order.clear();
    }
}
