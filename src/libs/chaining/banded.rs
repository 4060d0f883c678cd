//! Banded chaining for anchors already localized to one region.

use super::{gap_score_linear, Chain};
use crate::libs::anchor::Anchor;
use crate::libs::pool::Recycle;
use log::trace;

#[derive(Debug, Clone, PartialEq)]
pub struct BandedOptions {
    /// Maximum off-diagonal drift between chained anchors.
    pub max_gap: u32,
    pub min_score: u32,
    /// Minimum query span of a reported chain.
    pub min_align_len: u32,
    /// Minimum chain identity; a permissive floor on a pseudo-alignment.
    pub min_identity: f64,
    pub max_distance: u32,
    /// Maximum number of predecessors inspected per anchor.
    pub band_count: usize,
    /// Maximum query distance from an anchor back to a predecessor's end.
    pub band_base: u32,
}

impl Default for BandedOptions {
    fn default() -> Self {
        Self {
            max_gap: 50,
            min_score: 50,
            min_align_len: 50,
            min_identity: 15.0,
            max_distance: 1000,
            band_count: 100,
            band_base: 200,
        }
    }
}

/// Best chain score ending at an anchor (high 32 bits) and the index of its
/// predecessor (low 32 bits). A self index marks a chain start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ScoreSlot(u64);

impl ScoreSlot {
    #[inline]
    pub(crate) fn new(score: u32, pred: usize) -> Self {
        ScoreSlot(((score as u64) << 32) | pred as u32 as u64)
    }

    #[inline]
    pub(crate) fn score(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub(crate) fn pred(self) -> usize {
        (self.0 & 0xFFFF_FFFF) as usize
    }
}

/// Banded predecessor scan shared with the extension chainer.
///
/// Fills `slots[i]` for every `i >= from`; slots before `from` must already
/// be set. `reachable` restricts predecessors to slots with a positive
/// score and leaves anchors without one at score 0.
pub(crate) fn fill_band(
    slots: &mut Vec<ScoreSlot>,
    anchors: &[Anchor],
    from: usize,
    opt: &BandedOptions,
    reachable: bool,
) {
    slots.truncate(from);
    for i in from..anchors.len() {
        let a = &anchors[i];
        let mut best = if reachable { 0 } else { a.len as u32 };
        let mut best_j = i;

        let mut inspected = 0;
        for j in (0..i).rev() {
            let b = &anchors[j];
            if a.q_begin.saturating_sub(b.q_end()) > opt.band_base {
                break;
            }
            inspected += 1;
            if inspected > opt.band_count {
                break;
            }

            if b.t_begin > a.t_begin || !a.same_strand(b) {
                continue;
            }
            if b.q_begin == a.q_begin && b.len > 0 {
                continue;
            }
            let prev = slots[j].score();
            if reachable && prev == 0 && b.len > 0 {
                continue;
            }

            let dq = a.q_begin - b.q_begin;
            let dt = a.t_begin - b.t_begin;
            if dq > opt.max_distance || dt > opt.max_distance {
                continue;
            }
            let g = dq.abs_diff(dt);
            if g > opt.max_gap {
                continue;
            }

            // the link is credited with the length of the anchor it reaches
            let s = (prev + a.len as u32).saturating_sub(gap_score_linear(g));
            if s > best {
                best = s;
                best_j = j;
            }
        }

        slots.push(ScoreSlot::new(best, best_j));
    }
}

/// Reusable region chainer; its buffers are scratch for one call at a time.
#[derive(Debug, Clone, Default)]
pub struct BandedChainer {
    options: BandedOptions,
    slots: Vec<ScoreSlot>,
    stack: Vec<(usize, usize)>,
}

impl BandedChainer {
    pub fn new(options: BandedOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn options(&self) -> &BandedOptions {
        &self.options
    }

    /// Chains `anchors`, which must be sorted by query begin and come from a
    /// single strand and region.
    ///
    /// After the best chain is taken, the anchors before it and after its
    /// terminus are chained again, so several disjoint chains may come back,
    /// ordered by query begin.
    pub fn chain(&mut self, anchors: &[Anchor]) -> Vec<Chain> {
        let n = anchors.len();
        let mut chains = Vec::new();
        if n == 0 {
            return chains;
        }

        fill_band(&mut self.slots, anchors, 0, &self.options, false);

        let opt = &self.options;
        self.stack.clear();
        self.stack.push((0, n));
        while let Some((lo, hi)) = self.stack.pop() {
            if lo >= hi {
                continue;
            }

            // first maximum in the region
            let mut m = lo;
            for i in lo + 1..hi {
                if self.slots[i].score() > self.slots[m].score() {
                    m = i;
                }
            }
            let best = self.slots[m].score();
            if best < opt.min_score {
                continue;
            }

            let mut path = vec![m];
            let mut i = m;
            loop {
                let j = self.slots[i].pred();
                if j == i || j < lo {
                    break;
                }
                path.push(j);
                i = j;
            }
            path.reverse();
            let first = path[0];

            let chain = Chain::from_indices(anchors, path, best as f64);
            if chain.aligned_bases_q >= opt.min_align_len && chain.pident >= opt.min_identity {
                chains.push(chain);
            }

            self.stack.push((m + 1, hi));
            self.stack.push((lo, first));
        }

        chains.sort_by_key(|c| (c.q_begin, c.t_begin));
        trace!("banded chaining: {} anchors, {} chains", n, chains.len());
        chains
    }
}

impl Recycle for BandedChainer {
    fn recycle(&mut self) {
        self.slots.clear();
        self.stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagonal(q0: u32, t0: u32, n: u32, step: u32, len: u8) -> Vec<Anchor> {
        (0..n)
            .map(|i| Anchor::new(q0 + i * step, t0 + i * step, len))
            .collect()
    }

    #[test]
    fn test_score_slot_packing() {
        let s = ScoreSlot::new(123_456, 7_890_123);
        assert_eq!(s.score(), 123_456);
        assert_eq!(s.pred(), 7_890_123);
        let s = ScoreSlot::new(u32::MAX, 0);
        assert_eq!(s.score(), u32::MAX);
        assert_eq!(s.pred(), 0);
    }

    #[test]
    fn test_single_chain() {
        let anchors = diagonal(0, 1000, 10, 20, 15);
        let mut chainer = BandedChainer::new(BandedOptions::default());
        let chains = chainer.chain(&anchors);
        assert_eq!(chains.len(), 1);
        let c = &chains[0];
        assert_eq!(c.anchors, (0..10).collect::<Vec<_>>());
        assert_eq!(c.score, 150.0);
        assert_eq!((c.q_begin, c.q_end), (0, 195));
        assert_eq!((c.t_begin, c.t_end), (1000, 1195));
        assert_eq!(c.matched_bases, 150);
        assert_eq!(c.aligned_bases_q, 195);
    }

    #[test]
    fn test_recursion_finds_disjoint_chains() {
        // two segments on different diagonals, too far apart to join
        let mut anchors = diagonal(0, 0, 6, 20, 20);
        anchors.extend(diagonal(400, 2000, 4, 20, 20));
        let mut chainer = BandedChainer::new(BandedOptions::default());
        let chains = chainer.chain(&anchors);

        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].anchors, (0..6).collect::<Vec<_>>());
        assert_eq!(chains[1].anchors, (6..10).collect::<Vec<_>>());
        assert_eq!(chains[0].score, 120.0);
        assert_eq!(chains[1].score, 80.0);
    }

    #[test]
    fn test_overlap_not_double_counted() {
        let anchors = vec![
            Anchor::new(0, 0, 30),
            Anchor::new(15, 15, 30),
            Anchor::new(30, 30, 30),
        ];
        let mut chainer = BandedChainer::new(BandedOptions::default());
        let chains = chainer.chain(&anchors);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].aligned_bases_q, 60);
        assert_eq!(chains[0].matched_bases, 60);
        assert_eq!(chains[0].pident, 100.0);
    }

    #[test]
    fn test_min_align_len_rejects() {
        let anchors = diagonal(0, 0, 3, 20, 20);
        let mut chainer = BandedChainer::new(BandedOptions {
            min_align_len: 100,
            ..Default::default()
        });
        assert!(chainer.chain(&anchors).is_empty());
    }

    #[test]
    fn test_below_min_score() {
        let anchors = diagonal(0, 0, 2, 20, 20);
        let mut chainer = BandedChainer::new(BandedOptions::default());
        assert!(chainer.chain(&anchors).is_empty());
        assert!(chainer.chain(&[]).is_empty());
    }

    #[test]
    fn test_band_count_limits_scan() {
        // a good predecessor hidden behind many crossed anchors
        let mut anchors = vec![Anchor::new(0, 0, 40)];
        for i in 0..10 {
            anchors.push(Anchor::new(1 + i, 5000 - i * 100, 10));
        }
        anchors.push(Anchor::new(45, 45, 40));

        let mut wide = BandedChainer::new(BandedOptions::default());
        let chains = wide.chain(&anchors);
        assert!(chains.iter().any(|c| c.anchors == vec![0, 11]));

        let mut narrow = BandedChainer::new(BandedOptions {
            band_count: 5,
            min_score: 40,
            min_align_len: 40,
            ..Default::default()
        });
        let chains = narrow.chain(&anchors);
        assert!(chains.iter().all(|c| c.len() == 1));
    }

    #[test]
    fn test_band_base_limits_scan() {
        let anchors = vec![Anchor::new(0, 0, 40), Anchor::new(300, 300, 40)];
        let mut chainer = BandedChainer::new(BandedOptions {
            min_score: 40,
            min_align_len: 40,
            max_gap: 1000,
            ..Default::default()
        });
        let chains = chainer.chain(&anchors);
        assert_eq!(chains.len(), 2);
    }
}
