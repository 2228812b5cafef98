//! Uniform random sampling without replacement, via priority sampling.
//!
//! Each item receives an i.i.d. priority key u ~ U(0,1) from a small
//! deterministic `SplitMix64` PRNG; the k items with the largest keys form
//! a uniform sample without replacement. A bounded min-heap keeps memory
//! at O(k) while the input streams past. The selection is reproducible for
//! a given seed, and `k >= n` keeps everything.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

#[derive(Clone, Copy, Debug)]
struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    #[inline]
    const fn next_u64(&mut self) -> u64 {
        let mut z = {
            self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
            self.state
        };
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    #[inline]
    #[allow(clippy::cast_precision_loss)]
    fn next_f64(&mut self) -> f64 {
        const SCALE: f64 = 1.0 / ((1u64 << 53) as f64);
        ((self.next_u64() >> 11) as f64) * SCALE
    }
}

/// f64 wrapper ordered by `total_cmp`, so priority keys can live in a heap.
#[derive(Clone, Copy, Debug, PartialEq)]
struct OrdF64(f64);

impl Eq for OrdF64 {}

impl PartialOrd for OrdF64 {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrdF64 {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Streaming top-k-by-priority reservoir.
///
/// `push` each candidate, then `into_vec` to obtain the sample in original
/// input order.
pub struct Reservoir<T> {
    k: usize,
    rng: SplitMix64,
    seq: u64,
    // Min-heap over (priority, seq, item): the root is the weakest
    // member, evicted when a stronger candidate arrives.
    heap: BinaryHeap<Reverse<(OrdF64, u64, HeapItem<T>)>>,
}

/// Heap payload wrapper: ordering is fully decided by (priority, seq), so
/// the item itself never needs comparing.
struct HeapItem<T>(T);

impl<T> PartialEq for HeapItem<T> {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}
impl<T> Eq for HeapItem<T> {}
impl<T> PartialOrd for HeapItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for HeapItem<T> {
    fn cmp(&self, _: &Self) -> Ordering {
        Ordering::Equal
    }
}

impl<T> Reservoir<T> {
    /// A reservoir holding at most `k` items, keyed off `seed`.
    #[must_use]
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            rng: SplitMix64::new(seed.wrapping_mul(0xA24B_AED4_0B9C_497C)),
            seq: 0,
            heap: BinaryHeap::with_capacity(k.saturating_add(1)),
        }
    }

    /// Offer one candidate.
    pub fn push(&mut self, item: T) {
        if self.k == 0 {
            return;
        }
        let mut u = self.rng.next_f64();
        if u == 0.0 {
            u = f64::from_bits(1); // strictly > 0
        }
        let seq = self.seq;
        self.seq += 1;
        self.heap.push(Reverse((OrdF64(u), seq, HeapItem(item))));
        if self.heap.len() > self.k {
            self.heap.pop();
        }
    }

    /// The sampled items, restored to input order.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        let mut kept: Vec<(u64, T)> = self
            .heap
            .into_iter()
            .map(|Reverse((_, seq, HeapItem(item)))| (seq, item))
            .collect();
        kept.sort_unstable_by_key(|(seq, _)| *seq);
        kept.into_iter().map(|(_, item)| item).collect()
    }
}

/// Sample `k` records uniformly without replacement.
///
/// Returns all records (in input order) when `k >= records.len()`.
#[must_use]
pub fn sample_records<T>(records: Vec<T>, k: usize, seed: u64) -> Vec<T> {
    if k >= records.len() {
        return records;
    }
    let mut reservoir = Reservoir::new(k, seed);
    for r in records {
        reservoir.push(r);
    }
    reservoir.into_vec()
}
