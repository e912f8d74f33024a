//! Precomputed lookup tables.
//!
//! A curve may be arbitrarily expensive to evaluate, but an 8-bit channel
//! only has 256 possible inputs. Evaluating the curve once per input level
//! reduces the per-pixel cost to a single index.

use super::curve::CurveFunction;

/// An integer sample type that can index a lookup table.
pub trait Sample: Copy + Send + Sync + 'static {
    /// Number of distinct levels (table length).
    const LEVELS: usize;

    /// The sample as a table index.
    fn index(self) -> usize;

    /// Converts a level in `0..LEVELS` back to a sample.
    fn from_level(level: usize) -> Self;
}

impl Sample for u8 {
    const LEVELS: usize = 1 << 8;

    #[inline]
    fn index(self) -> usize {
        self as usize
    }

    #[inline]
    fn from_level(level: usize) -> Self {
        level as u8
    }
}

impl Sample for u16 {
    const LEVELS: usize = 1 << 16;

    #[inline]
    fn index(self) -> usize {
        self as usize
    }

    #[inline]
    fn from_level(level: usize) -> Self {
        level as u16
    }
}

/// Maps every possible input level to a clamped output level.
///
/// Immutable once built and safe to share between any number of readers.
#[derive(Clone, PartialEq, Eq)]
pub struct LookupTable<S: Sample = u8> {
    entries: Box<[S]>,
}

impl<S: Sample> LookupTable<S> {
    /// Builds a table by evaluating `function` at every input level.
    ///
    /// No function means no table, which callers treat as the identity.
    /// Outputs are rounded and clamped to `[0, LEVELS - 1]`; inputs the
    /// curve does not cover map to 0.
    pub fn build(function: Option<&CurveFunction>) -> Option<Self> {
        let function = function?;
        let max = (S::LEVELS - 1) as f64;

        let entries = (0..S::LEVELS)
            .map(|level| {
                let value = function
                    .eval(level as f64)
                    .map_or(0.0, |v| v.round().clamp(0.0, max));
                S::from_level(value as usize)
            })
            .collect();

        Some(Self { entries })
    }

    /// The table that maps every level to itself.
    pub fn identity() -> Self {
        Self {
            entries: (0..S::LEVELS).map(S::from_level).collect(),
        }
    }

    /// Looks up a single sample.
    #[inline]
    pub fn get(&self, input: S) -> S {
        self.entries[input.index()]
    }

    /// All entries, indexed by input level.
    pub fn entries(&self) -> &[S] {
        &self.entries
    }

    /// Writes `table[src[i]]` into `dst[i]` for every element.
    ///
    /// # Panics
    ///
    /// Panics if the slices differ in length.
    pub fn apply(&self, src: &[S], dst: &mut [S]) {
        assert_eq!(src.len(), dst.len(), "lookup source and destination differ in length");
        for (out, &value) in dst.iter_mut().zip(src) {
            *out = self.entries[value.index()];
        }
    }

    /// Replaces every element of `buf` with its table entry.
    pub fn apply_in_place(&self, buf: &mut [S]) {
        for value in buf.iter_mut() {
            *value = self.entries[value.index()];
        }
    }
}

impl<S: Sample> std::fmt::Debug for LookupTable<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupTable")
            .field("levels", &self.entries.len())
            .finish()
    }
}

/// Applies an optional table. `None` leaves `dst` untouched.
pub fn apply_lookup<S: Sample>(table: Option<&LookupTable<S>>, src: &[S], dst: &mut [S]) {
    if let Some(table) = table {
        table.apply(src, dst);
    }
}

/// Applies an optional table in place. `None` is a no-op.
pub fn apply_lookup_in_place<S: Sample>(table: Option<&LookupTable<S>>, buf: &mut [S]) {
    if let Some(table) = table {
        table.apply_in_place(buf);
    }
}
