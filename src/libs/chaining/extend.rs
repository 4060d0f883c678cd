//! Boundary extension with very short seeds.
//!
//! [`ExtensionChainer`] is the banded DP with a zero-length anchor at the
//! origin prepended; only anchors reachable from the origin score, and the
//! end of the single best chain tells how far the boundary can grow.
//! [`Extender`] produces the anchors from two flanking sequences using
//! 2-mers looked up in a throwaway [`PrefixTree`].

use super::banded::{fill_band, BandedOptions, ScoreSlot};
use crate::libs::anchor::{clear_substr_pairs, Anchor};
use crate::libs::nt::KmerIter;
use crate::libs::pool::Recycle;
use crate::libs::tree::PrefixTree;
use log::trace;

const SEED_K: u8 = 2;

/// Flank bases seeded per round; merged runs stay below the anchor length cap.
const WINDOW: usize = 250;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtendOptions {
    pub max_gap: u32,
    pub min_score: u32,
    pub max_distance: u32,
    pub band_count: usize,
    pub band_base: u32,
    /// Shortest merged seed run kept as an anchor.
    pub min_anchor_len: u8,
}

impl Default for ExtendOptions {
    fn default() -> Self {
        Self {
            max_gap: 32,
            min_score: 10,
            max_distance: 1000,
            band_count: 50,
            band_base: 50,
            min_anchor_len: 8,
        }
    }
}

impl ExtendOptions {
    fn band(&self) -> BandedOptions {
        BandedOptions {
            max_gap: self.max_gap,
            min_score: self.min_score,
            min_align_len: 0,
            min_identity: 0.0,
            max_distance: self.max_distance,
            band_count: self.band_count,
            band_base: self.band_base,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtensionChainer {
    band: BandedOptions,
    min_score: u32,
    anchors: Vec<Anchor>,
    slots: Vec<ScoreSlot>,
}

impl ExtensionChainer {
    pub fn new(options: &ExtendOptions) -> Self {
        Self {
            band: options.band(),
            min_score: options.min_score,
            ..Default::default()
        }
    }

    /// Chains `anchors` (sorted by query begin) from the origin and returns
    /// the exclusive query and target ends of the best chain.
    pub fn chain(&mut self, anchors: &[Anchor]) -> Option<(u32, u32)> {
        if anchors.is_empty() {
            return None;
        }

        self.anchors.clear();
        self.anchors.push(Anchor::new(0, 0, 0));
        self.anchors.extend_from_slice(anchors);

        self.slots.clear();
        self.slots.push(ScoreSlot::new(0, 0));
        fill_band(&mut self.slots, &self.anchors, 1, &self.band, true);

        let mut best = 0;
        for i in 1..self.slots.len() {
            if self.slots[i].score() > self.slots[best].score() {
                best = i;
            }
        }
        if best == 0 || self.slots[best].score() < self.min_score {
            return None;
        }

        let end = &self.anchors[best];
        Some((end.q_end(), end.t_end()))
    }
}

impl Recycle for ExtensionChainer {
    fn recycle(&mut self) {
        self.anchors.clear();
        self.slots.clear();
    }
}

/// Grows an alignment boundary into its flanks.
#[derive(Debug, Clone)]
pub struct Extender {
    options: ExtendOptions,
    chainer: ExtensionChainer,
    tree: PrefixTree,
    hits: Vec<(i64, u32)>,
    anchors: Vec<Anchor>,
}

impl Extender {
    pub fn new(options: ExtendOptions) -> Self {
        Self {
            chainer: ExtensionChainer::new(&options),
            options,
            tree: PrefixTree::new(SEED_K),
            hits: Vec::new(),
            anchors: Vec::new(),
        }
    }

    /// Bases `(query, target)` that can be appended after a boundary, given
    /// the sequences following it.
    ///
    /// Works window by window and moves on only while the best chain runs
    /// into the end of the current window.
    pub fn extend_right(&mut self, query: &[u8], target: &[u8]) -> Option<(u32, u32)> {
        let (mut qo, mut to) = (0usize, 0usize);
        while qo < query.len() && to < target.len() {
            let qw = &query[qo..(qo + WINDOW).min(query.len())];
            let tw = &target[to..(to + WINDOW).min(target.len())];
            self.seed(qw, tw);
            let (q, t) = match self.chainer.chain(&self.anchors) {
                Some(ext) => ext,
                None => break,
            };
            trace!(
                "extension window at {}/{}: {} anchors, +{}/+{}",
                qo,
                to,
                self.anchors.len(),
                q,
                t
            );
            qo += q as usize;
            to += t as usize;
            if (q as usize) < qw.len() && (t as usize) < tw.len() {
                break;
            }
        }

        if qo == 0 && to == 0 {
            None
        } else {
            Some((qo as u32, to as u32))
        }
    }

    /// Bases `(query, target)` that can be prepended before a boundary,
    /// given the sequences preceding it.
    pub fn extend_left(&mut self, query: &[u8], target: &[u8]) -> Option<(u32, u32)> {
        let q: Vec<u8> = query.iter().rev().copied().collect();
        let t: Vec<u8> = target.iter().rev().copied().collect();
        self.extend_right(&q, &t)
    }

    /// Looks up every target 2-mer among the query's and merges hits on the
    /// same diagonal into maximal anchors.
    fn seed(&mut self, query: &[u8], target: &[u8]) {
        self.tree.clear();
        self.hits.clear();
        self.anchors.clear();

        for (pos, code) in KmerIter::new(query, SEED_K) {
            self.tree.insert(code, pos as u64);
        }
        if self.tree.is_empty() {
            return;
        }

        for (tpos, code) in KmerIter::new(target, SEED_K) {
            if let Some(values) = self.tree.get(code) {
                for &qpos in values {
                    self.hits.push((tpos as i64 - qpos as i64, qpos as u32));
                }
            }
        }
        self.hits.sort_unstable();

        let k = SEED_K as u32;
        let min_len = self.options.min_anchor_len.max(SEED_K) as u32;
        let mut i = 0;
        while i < self.hits.len() {
            let (diag, q0) = self.hits[i];
            let mut q1 = q0;
            let mut j = i + 1;
            while j < self.hits.len()
                && self.hits[j].0 == diag
                && self.hits[j].1 == q1 + 1
                && q1 + 1 + k - q0 <= u8::MAX as u32
            {
                q1 += 1;
                j += 1;
            }

            let len = q1 + k - q0;
            if len >= min_len {
                let t0 = (q0 as i64 + diag) as u32;
                self.anchors.push(Anchor::new(q0, t0, len as u8));
            }
            i = j;
        }

        clear_substr_pairs(&mut self.anchors, u8::MAX as usize);
    }
}

impl Recycle for Extender {
    fn recycle(&mut self) {
        self.chainer.recycle();
        self.tree.clear();
        self.hits.clear();
        self.anchors.clear();
    }
}
