//! Compact bitset keys for clades.
//!
//! # Overview
//! A clade is the set of taxa below some node. Once every taxon has a fixed
//! index, a clade becomes a bitset where bit `i` is set iff taxon `i` is in it.
//! Two nodes from different input trees spanning the same taxa produce equal
//! bitsets, which is exactly the clade identity the super-graph needs.
//!
//! # Example
//! For taxa [A, B, C, D] mapped to indices [0, 1, 2, 3]:
//! - Clade {A, C} → bitset `0b0101` (bits 0 and 2 set)
//! - Clade {B, C, D} → bitset `0b1110` (bits 1, 2, 3 set)

/// A compact bitset over taxon indices.
///
/// Internally stores bits in `Vec<u64>` words to support arbitrarily large
/// taxon sets. Each u64 word holds 64 taxon indices. All bitsets built for
/// one consensus call share the same word count, so equality and hashing
/// only depend on the set bits.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Bitset(pub Vec<u64>);

impl Bitset {
    /// Number of u64 words needed to hold `num_taxa` bits.
    #[inline]
    pub fn words_for(num_taxa: usize) -> usize {
        num_taxa.div_ceil(64)
    }

    /// Creates a new bitset with all bits set to 0.
    ///
    /// # Example
    /// ```
    /// # use primconstree::bitset::Bitset;
    /// // 100 taxa need 2 words (128 bits)
    /// let bs = Bitset::zeros(Bitset::words_for(100));
    /// assert_eq!(bs.0.len(), 2);
    /// ```
    pub fn zeros(words: usize) -> Self {
        Bitset(vec![0u64; words])
    }

    /// Bitset with the first `num_taxa` bits set: the root clade.
    ///
    /// # Example
    /// ```
    /// # use primconstree::bitset::Bitset;
    /// let root = Bitset::full(3);
    /// assert_eq!(root.0[0], 0b111);
    /// ```
    pub fn full(num_taxa: usize) -> Self {
        let mut bs = Self::zeros(Self::words_for(num_taxa));
        for idx in 0..num_taxa {
            bs.set(idx);
        }
        bs
    }

    /// Bitset holding the single taxon `idx`: a leaf clade.
    pub fn singleton(words: usize, idx: usize) -> Self {
        let mut bs = Self::zeros(words);
        bs.set(idx);
        bs
    }

    /// Sets the bit at the given index to 1.
    #[inline]
    pub fn set(&mut self, idx: usize) {
        let word = idx >> 6; // idx / 64
        let bit = idx & 63; // idx % 64
        self.0[word] |= 1u64 << bit;
    }

    /// Whether taxon `idx` belongs to this clade.
    #[inline]
    pub fn contains(&self, idx: usize) -> bool {
        let word = idx >> 6;
        let bit = idx & 63;
        self.0.get(word).is_some_and(|w| (w >> bit) & 1 == 1)
    }

    /// Performs bitwise OR with another bitset (union operation).
    ///
    /// Merges two clades: `self` becomes `self ∪ other`. This is how a parent
    /// clade is assembled from its children's clades.
    ///
    /// # Example
    /// ```
    /// # use primconstree::bitset::Bitset;
    /// let mut left = Bitset::singleton(1, 0);
    /// let right = Bitset::singleton(1, 1);
    /// left.or_assign(&right);  // {0} ∪ {1} = {0, 1}
    /// assert_eq!(left.0[0], 0b11);
    /// ```
    #[inline]
    pub fn or_assign(&mut self, other: &Bitset) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a |= *b;
        }
    }

    /// Counts the number of set bits, i.e. the clade size.
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }
}
