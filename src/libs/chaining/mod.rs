//! Sparse chaining of anchors into collinear, scored alignments.
//!
//! Three dynamic-programming variants share the [`Chain`] result type:
//!
//! * [`global`] - multi-chain DP over all anchors between a query and one
//!   candidate genome, with a distance-bounded predecessor search and a
//!   direction-consistency rule. Used for genome-level filtering.
//! * [`banded`] - denser, banded DP for anchors already localized to one
//!   region; extracts several disjoint chains by splitting the anchor array
//!   around the best chain.
//! * [`extend`] - single-chain banded DP anchored at the origin, used to push
//!   a match boundary out by a few hundred bases with very short seeds.
//!
//! # Scoring
//!
//! Anchors are weighted quadratically by length, `0.1 * l^2`, since long
//! exact matches are unlikely to be spurious. The global chainer charges
//! `0.1 * g + 0.5 * log2(g)` for an off-diagonal drift `g`; the banded
//! variants charge a linear `0.1 * g`.
//!
//! Chain envelopes are 0-based and half-open, like anchors.

pub mod banded;
pub mod extend;
pub mod global;

pub use banded::{BandedChainer, BandedOptions};
pub use extend::{ExtendOptions, ExtensionChainer, Extender};
pub use global::{GlobalChainer, GlobalOptions};

use crate::libs::anchor::Anchor;

/// Weight of an anchor (or merged anchor span) of `len` bases.
#[inline]
pub fn seed_weight(len: f64) -> f64 {
    0.1 * len * len
}

/// Sub-linear penalty of an off-diagonal drift, used by [`GlobalChainer`].
#[inline]
pub fn gap_score(gap: f64) -> f64 {
    if gap == 0.0 {
        0.0
    } else {
        0.1 * gap + 0.5 * gap.log2()
    }
}

/// Linear penalty of an off-diagonal drift, used by the banded chainers.
#[inline]
pub fn gap_score_linear(gap: u32) -> u32 {
    gap / 10
}

/// An ordered, collinear subsequence of anchors with derived statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chain {
    /// Indices into the chained anchor slice, by increasing query position.
    pub anchors: Vec<usize>,
    pub score: f64,
    pub q_begin: u32,
    pub q_end: u32,
    pub t_begin: u32,
    pub t_end: u32,
    /// Query bases covered by the union of member anchors.
    pub matched_bases: u32,
    pub aligned_bases_q: u32,
    pub aligned_bases_t: u32,
    /// `matched / max(aligned_q, aligned_t) * 100`, within `[0, 100]`.
    pub pident: f64,
}

impl Chain {
    /// Builds a chain from member indices given in increasing query order.
    pub fn from_indices(anchors: &[Anchor], indices: Vec<usize>, score: f64) -> Self {
        let mut chain = Chain {
            anchors: indices,
            score,
            q_begin: u32::MAX,
            t_begin: u32::MAX,
            ..Default::default()
        };
        if chain.anchors.is_empty() {
            chain.q_begin = 0;
            chain.t_begin = 0;
            return chain;
        }

        let mut covered_end = 0u32;
        for (n, &i) in chain.anchors.iter().enumerate() {
            let a = &anchors[i];
            chain.q_begin = chain.q_begin.min(a.q_begin);
            chain.q_end = chain.q_end.max(a.q_end());
            chain.t_begin = chain.t_begin.min(a.t_begin);
            chain.t_end = chain.t_end.max(a.t_end());

            // overlapping anchors only add their extension
            if n == 0 || a.q_begin >= covered_end {
                chain.matched_bases += a.len as u32;
            } else if a.q_end() > covered_end {
                chain.matched_bases += a.q_end() - covered_end;
            }
            covered_end = covered_end.max(a.q_end());
        }

        chain.aligned_bases_q = chain.q_end - chain.q_begin;
        chain.aligned_bases_t = chain.t_end - chain.t_begin;
        chain.pident = identity(
            chain.matched_bases as u64,
            chain.aligned_bases_q.max(chain.aligned_bases_t) as u64,
        );
        chain
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

/// Percent identity clamped to `[0, 100]`.
#[inline]
pub fn identity(matched: u64, aligned: u64) -> f64 {
    if aligned == 0 {
        return 0.0;
    }
    (matched as f64 / aligned as f64 * 100.0).clamp(0.0, 100.0)
}

/// Totals and overall envelope of a set of chains.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChainSummary {
    pub matched_bases: u32,
    pub aligned_bases_q: u32,
    pub aligned_bases_t: u32,
    pub q_begin: u32,
    pub q_end: u32,
    pub t_begin: u32,
    pub t_end: u32,
}

impl ChainSummary {
    pub fn from_chains(chains: &[Chain]) -> Self {
        let mut sum = ChainSummary {
            q_begin: u32::MAX,
            t_begin: u32::MAX,
            ..Default::default()
        };
        if chains.is_empty() {
            return ChainSummary::default();
        }
        for c in chains {
            sum.matched_bases += c.matched_bases;
            sum.aligned_bases_q += c.aligned_bases_q;
            sum.aligned_bases_t += c.aligned_bases_t;
            sum.q_begin = sum.q_begin.min(c.q_begin);
            sum.q_end = sum.q_end.max(c.q_end);
            sum.t_begin = sum.t_begin.min(c.t_begin);
            sum.t_end = sum.t_end.max(c.t_end);
        }
        sum
    }

    pub fn pident(&self) -> f64 {
        identity(
            self.matched_bases as u64,
            self.aligned_bases_q.max(self.aligned_bases_t) as u64,
        )
    }
}
