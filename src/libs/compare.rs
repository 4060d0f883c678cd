//! Approximate similarity between a query and a target region, estimated
//! from chained k-mer anchors instead of a base-level alignment.

use crate::libs::anchor::{clear_substr_pairs, trim_substr_pairs, Anchor};
use crate::libs::chaining::{BandedChainer, BandedOptions, Chain, ChainSummary, Extender};
use crate::libs::nt::{is_low_complexity, kmer_rc, rev_comp, KmerIter, MAX_K};
use crate::libs::pool::Recycle;
use crate::libs::tree::PrefixTree;
use log::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct CompareOptions {
    pub k: u8,
    /// Minimum shared prefix for a target k-mer to hit the query index.
    pub min_prefix: u8,
    pub chaining: BandedOptions,
    /// Neighbours closer than this can be trimmed as repeat runs.
    pub trim_distance: f64,
    /// Percent of the query covered by chains.
    pub min_aligned_fraction: f64,
    pub min_identity: f64,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            k: 32,
            min_prefix: 15,
            chaining: BandedOptions::default(),
            trim_distance: 100.0,
            min_aligned_fraction: 0.0,
            min_identity: 0.0,
        }
    }
}

/// Shared-prefix threshold raised for longer targets, trading sensitivity
/// for speed.
pub fn adaptive_min_prefix(min_prefix: u8, target_len: usize, k: u8) -> u8 {
    let bump = match target_len {
        0..=999 => 0,
        1_000..=9_999 => 1,
        10_000..=99_999 => 3,
        _ => 5,
    };
    min_prefix.saturating_add(bump).min(k)
}

/// The chains of one strand of a query against a target.
///
/// Query coordinates live in the chained strand's space: for `rc` results
/// they count from the start of the reverse-complemented query. Target
/// coordinates are always forward.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonResult {
    pub rc: bool,
    /// Anchors the chains index into.
    pub anchors: Vec<Anchor>,
    pub chains: Vec<Chain>,
    pub matched_bases: u32,
    /// Sum of the chains' query spans.
    pub aligned_bases: u32,
    /// `aligned_bases / query_len * 100`, within `[0, 100]`.
    pub aligned_fraction: f64,
    pub pident: f64,
    pub q_begin: u32,
    pub q_end: u32,
    pub t_begin: u32,
    pub t_end: u32,
}

impl ComparisonResult {
    pub fn new(rc: bool, anchors: Vec<Anchor>, chains: Vec<Chain>, query_len: usize) -> Self {
        let sum = ChainSummary::from_chains(&chains);
        let aligned_fraction = if query_len == 0 {
            0.0
        } else {
            (sum.aligned_bases_q as f64 / query_len as f64 * 100.0).min(100.0)
        };

        Self {
            rc,
            anchors,
            chains,
            matched_bases: sum.matched_bases,
            aligned_bases: sum.aligned_bases_q,
            aligned_fraction,
            pident: sum.pident(),
            q_begin: sum.q_begin,
            q_end: sum.q_end,
            t_begin: sum.t_begin,
            t_end: sum.t_end,
        }
    }

    /// The query envelope in forward coordinates.
    pub fn query_range(&self, query_len: u32) -> (u32, u32) {
        if self.rc {
            (
                query_len.saturating_sub(self.q_end),
                query_len.saturating_sub(self.q_begin),
            )
        } else {
            (self.q_begin, self.q_end)
        }
    }
}

/// Holds one indexed query; [`compare`](Self::compare) may then be called
/// for any number of targets.
#[derive(Debug, Clone)]
pub struct SequenceComparator {
    options: CompareOptions,
    tree: PrefixTree,
    query_len: usize,
    chainer: BandedChainer,
    fwd: Vec<Anchor>,
    rev: Vec<Anchor>,
}

impl SequenceComparator {
    pub fn new(options: CompareOptions) -> Self {
        let k = options.k.clamp(1, MAX_K);
        Self {
            tree: PrefixTree::new(k),
            chainer: BandedChainer::new(options.chaining.clone()),
            options,
            query_len: 0,
            fwd: Vec::new(),
            rev: Vec::new(),
        }
    }

    pub fn options(&self) -> &CompareOptions {
        &self.options
    }

    /// Indexes the k-mers of `query` on both strands, replacing any previous
    /// query. Values are `pos << 1 | strand`.
    pub fn index(&mut self, query: &[u8]) {
        let k = self.tree.k();
        self.tree.clear();
        self.query_len = query.len();

        let mut skipped = 0usize;
        for (pos, code) in KmerIter::new(query, k) {
            if is_low_complexity(code, k) {
                skipped += 1;
                continue;
            }
            let pos = pos as u64;
            self.tree.insert(code, pos << 1);
            self.tree.insert(kmer_rc(code, k), (pos << 1) | 1);
        }
        debug!(
            "indexed {} bases: {} keys, {} low-complexity k-mers skipped",
            query.len(),
            self.tree.len(),
            skipped
        );
    }

    /// Compares the indexed query against `target`.
    ///
    /// Only anchors whose query span lies inside the inclusive forward window
    /// `[window_begin, window_end]` are kept. Both strands are chained and
    /// the one with more aligned bases wins. `query_len` is the length the
    /// aligned fraction refers to.
    pub fn compare(
        &mut self,
        window_begin: u32,
        window_end: u32,
        target: &[u8],
        query_len: usize,
    ) -> Option<ComparisonResult> {
        if self.tree.is_empty() {
            return None;
        }
        let k = self.tree.k();
        let qlen = self.query_len as u32;
        let min_prefix = adaptive_min_prefix(self.options.min_prefix, target.len(), k);

        self.fwd.clear();
        self.rev.clear();
        for (tpos, code) in KmerIter::new(target, k) {
            let matches = match self.tree.search(code, min_prefix) {
                Some(m) => m,
                None => continue,
            };
            for m in &matches {
                let len = m.len_prefix;
                for &v in m.values {
                    let pos = (v >> 1) as u32;
                    let rc = v & 1 == 1;

                    // forward query span covered by the shared prefix
                    let (fb, fe) = if rc {
                        (pos + (k - len) as u32, pos + k as u32)
                    } else {
                        (pos, pos + len as u32)
                    };
                    if fb < window_begin || fe - 1 > window_end {
                        continue;
                    }

                    if rc {
                        let mut a = Anchor::new(qlen - fe, tpos as u32, len);
                        a.q_rc = true;
                        self.rev.push(a);
                    } else {
                        self.fwd.push(Anchor::new(fb, tpos as u32, len));
                    }
                }
            }
        }

        let n_fwd = self.fwd.len();
        let n_rev = self.rev.len();
        let fwd = self.chain_strand(false);
        let rev = self.chain_strand(true);
        debug!(
            "compare: target {} bp, min prefix {}, anchors {}/{}, chains {}/{}",
            target.len(),
            min_prefix,
            n_fwd,
            n_rev,
            fwd.as_ref().map_or(0, |r| r.chains.len()),
            rev.as_ref().map_or(0, |r| r.chains.len()),
        );

        let result = match (fwd, rev) {
            (Some(f), Some(r)) => {
                if r.aligned_bases > f.aligned_bases {
                    r
                } else {
                    f
                }
            }
            (Some(f), None) => f,
            (None, Some(r)) => r,
            (None, None) => return None,
        };
        let result = ComparisonResult::new(result.rc, result.anchors, result.chains, query_len);

        if result.aligned_fraction < self.options.min_aligned_fraction
            || result.pident < self.options.min_identity
        {
            return None;
        }
        Some(result)
    }

    fn chain_strand(&mut self, rc: bool) -> Option<ComparisonResult> {
        let k = self.tree.k() as usize;
        let anchors = if rc { &mut self.rev } else { &mut self.fwd };

        clear_substr_pairs(anchors, k);
        trim_substr_pairs(anchors, k, self.options.trim_distance);
        if anchors.is_empty() {
            return None;
        }

        let chains = self.chainer.chain(anchors);
        if chains.is_empty() {
            return None;
        }
        Some(ComparisonResult::new(rc, anchors.clone(), chains, 0))
    }
}

impl Recycle for SequenceComparator {
    fn recycle(&mut self) {
        self.tree.clear();
        self.query_len = 0;
        self.chainer.recycle();
        self.fwd.clear();
        self.rev.clear();
    }
}

/// Grows a result's envelope into up to `flank` bases on each side.
///
/// `query` is the forward query; only the envelope moves, chain statistics
/// are left as chained.
pub fn extend_result(
    extender: &mut Extender,
    query: &[u8],
    target: &[u8],
    result: &mut ComparisonResult,
    flank: u32,
) {
    let strand_query;
    let query = if result.rc {
        strand_query = rev_comp(query);
        &strand_query[..]
    } else {
        query
    };
    let qlen = query.len() as u32;
    let tlen = target.len() as u32;

    if result.q_end < qlen && result.t_end < tlen {
        let q = &query[result.q_end as usize..(result.q_end + flank).min(qlen) as usize];
        let t = &target[result.t_end as usize..(result.t_end + flank).min(tlen) as usize];
        if let Some((dq, dt)) = extender.extend_right(q, t) {
            result.q_end += dq;
            result.t_end += dt;
        }
    }

    if result.q_begin > 0 && result.t_begin > 0 {
        let q = &query[result.q_begin.saturating_sub(flank) as usize..result.q_begin as usize];
        let t = &target[result.t_begin.saturating_sub(flank) as usize..result.t_begin as usize];
        if let Some((dq, dt)) = extender.extend_left(q, t) {
            result.q_begin -= dq;
            result.t_begin -= dt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::chaining::ExtendOptions;
    use approx::assert_relative_eq;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn random_seq(seed: u64, n: usize) -> Vec<u8> {
        let mut rng = SmallRng::seed_from_u64(seed);
        (0..n).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
    }

    #[test]
    fn test_adaptive_min_prefix() {
        assert_eq!(adaptive_min_prefix(15, 500, 32), 15);
        assert_eq!(adaptive_min_prefix(15, 1_000, 32), 16);
        assert_eq!(adaptive_min_prefix(15, 50_000, 32), 18);
        assert_eq!(adaptive_min_prefix(15, 5_000_000, 32), 20);
        assert_eq!(adaptive_min_prefix(30, 5_000_000, 32), 32);
    }

    #[test]
    fn test_identical() {
        let query = random_seq(11, 1000);
        let mut cpr = SequenceComparator::new(CompareOptions::default());
        cpr.index(&query);

        let r = cpr.compare(0, 999, &query, query.len()).unwrap();
        assert!(!r.rc);
        assert_eq!(r.chains.len(), 1);
        assert_eq!((r.q_begin, r.q_end), (0, 1000));
        assert_eq!((r.t_begin, r.t_end), (0, 1000));
        assert_eq!(r.aligned_bases, 1000);
        assert_relative_eq!(r.aligned_fraction, 100.0);
        assert_relative_eq!(r.pident, 100.0);
    }

    #[test]
    fn test_reverse_complement() {
        let query = random_seq(12, 1000);
        let target = rev_comp(&query);
        let mut cpr = SequenceComparator::new(CompareOptions::default());
        cpr.index(&query);

        let r = cpr.compare(0, 999, &target, query.len()).unwrap();
        assert!(r.rc);
        assert_eq!(r.aligned_bases, 1000);
        assert_eq!(r.query_range(1000), (0, 1000));
    }

    #[test]
    fn test_window_filters_anchors() {
        let query = random_seq(13, 1000);
        let target = query[200..700].to_vec();
        let mut cpr = SequenceComparator::new(CompareOptions::default());
        cpr.index(&query);

        let r = cpr.compare(0, 999, &target, query.len()).unwrap();
        assert_eq!((r.q_begin, r.q_end), (200, 700));
        assert_eq!((r.t_begin, r.t_end), (0, 500));

        let r = cpr.compare(0, 399, &target, query.len()).unwrap();
        assert_eq!((r.q_begin, r.q_end), (200, 400));
        assert_eq!((r.t_begin, r.t_end), (0, 200));
        assert_relative_eq!(r.aligned_fraction, 20.0);
    }

    #[test]
    fn test_unrelated() {
        let mut cpr = SequenceComparator::new(CompareOptions::default());
        cpr.index(&random_seq(14, 1000));
        assert!(cpr.compare(0, 999, &random_seq(15, 1000), 1000).is_none());
        assert!(cpr.compare(0, 999, b"", 1000).is_none());
    }

    #[test]
    fn test_min_aligned_fraction() {
        let query = random_seq(16, 1000);
        let target = query[..300].to_vec();

        let mut cpr = SequenceComparator::new(CompareOptions::default());
        cpr.index(&query);
        let r = cpr.compare(0, 999, &target, query.len()).unwrap();
        assert_relative_eq!(r.aligned_fraction, 30.0);

        let mut cpr = SequenceComparator::new(CompareOptions {
            min_aligned_fraction: 50.0,
            ..Default::default()
        });
        cpr.index(&query);
        assert!(cpr.compare(0, 999, &target, query.len()).is_none());
    }

    #[test]
    fn test_identity_clamped() {
        // overlapping members counted twice
        let chain = Chain {
            anchors: vec![0, 1],
            matched_bases: 120,
            aligned_bases_q: 100,
            aligned_bases_t: 100,
            q_end: 100,
            t_end: 100,
            ..Default::default()
        };
        let r = ComparisonResult::new(false, vec![], vec![chain], 100);
        assert!(r.pident <= 100.0);
        assert!(r.aligned_fraction <= 100.0);
    }

    #[test]
    fn test_extend_result() {
        let query = random_seq(17, 600);
        let mut cpr = SequenceComparator::new(CompareOptions::default());
        cpr.index(&query);

        let mut r = cpr.compare(200, 399, &query, query.len()).unwrap();
        assert_eq!((r.q_begin, r.q_end), (200, 400));

        let mut extender = Extender::new(ExtendOptions::default());
        extend_result(&mut extender, &query, &query, &mut r, 100);
        assert_eq!((r.q_begin, r.q_end), (100, 500));
        assert_eq!((r.t_begin, r.t_end), (100, 500));
    }

    #[test]
    fn test_recycle_reindex() {
        let a = random_seq(18, 800);
        let b = random_seq(19, 800);
        let mut cpr = SequenceComparator::new(CompareOptions::default());
        cpr.index(&a);
        assert!(cpr.compare(0, 799, &a, 800).is_some());

        cpr.recycle();
        assert!(cpr.compare(0, 799, &a, 800).is_none());

        cpr.index(&b);
        assert!(cpr.compare(0, 799, &a, 800).is_none());
        assert!(cpr.compare(0, 799, &b, 800).is_some());
    }
}
