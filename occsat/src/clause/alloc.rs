//! Clause arena.
use std::mem::transmute;
use std::slice;

use occsat_formula::lit::LitIdx;
use occsat_formula::Lit;

use super::{clause_abstraction, Clause, ClauseHeader, HEADER_LEN};

/// Integer type used to store offsets into [`ClauseAlloc`]'s memory.
type ClauseOffset = u32;

/// Largest supported arena size in 32-bit words.
///
/// Offsets are limited to 30 bits so that watch records and reasons can pack an offset together
/// with tag bits into a single word.
pub const MAX_ARENA_WORDS: usize = (1 << 30) - 1;

/// Packed arena for long clause storage.
///
/// Every clause of length >= 4 is stored contiguously in a single growable buffer, preceded by its
/// [`ClauseHeader`]. Freeing a clause only marks its header; the slot is reclaimed by the next
/// [`consolidate`](ClauseAlloc::consolidate), which moves the survivors to a prefix of the buffer
/// and reports the relocations so every outstanding [`ClauseRef`] can be rewritten.
///
/// `used_words` tracks the words of live clauses. Strengthening shrinks a clause in place without
/// shrinking its slot, and a later free only gives back the shrunk size, so the counter is an
/// overestimate of the truly live words. The consolidation trigger tolerates this.
///
/// **Safety**: Using the safe methods is always memory safe, even if invariants of the clause
/// storage are violated. An example invariant is using only ClauseRefs produced by the same
/// ClauseAlloc. Some places in this codebase use the unsafe methods and expect users of the safe
/// methods to not violate these invariants. It is important that this does not leak through the
/// public API, i.e. crate external code using safe methods must be unable to violate invariants
/// expected for internal unsafe code.
#[derive(Default)]
pub struct ClauseAlloc {
    buffer: Vec<LitIdx>,
    /// Words per slot in allocation order, used to walk the arena slot by slot.
    orig_clause_sizes: Vec<LitIdx>,
    /// Overestimate of the words occupied by live clauses, see above.
    used_words: usize,
}

impl ClauseAlloc {
    /// Create an empty clause allocator.
    pub fn new() -> ClauseAlloc {
        ClauseAlloc::default()
    }

    /// Allocate space for and add a new clause.
    ///
    /// Clauses have a minimal size of 4, as unit, binary and ternary clauses are handled
    /// separately. This is enforced on the ClauseAlloc level to safely avoid extra bound checks
    /// when accessing the initial literals of a clause.
    ///
    /// The length and abstraction of the header are set to match the given literals. The returned
    /// [`ClauseRef`] can be used to access the new clause.
    pub fn add_clause(&mut self, mut header: ClauseHeader, lits: &[Lit]) -> ClauseRef {
        let offset = self.buffer.len();

        assert!(
            lits.len() >= 4,
            "ClauseAlloc can only store clauses of length 4 and up"
        );

        let need = HEADER_LEN + lits.len();

        assert!(
            offset + need <= MAX_ARENA_WORDS,
            "clause arena exhausted: more than 2^30 words of clauses"
        );

        header.set_len(lits.len());
        header.set_abstraction(clause_abstraction(lits));

        self.buffer.extend_from_slice(&header.data);

        let lit_idx_slice = unsafe {
            // This is safe as Lit and LitIdx have the same representation
            slice::from_raw_parts(lits.as_ptr() as *const LitIdx, lits.len())
        };

        self.buffer.extend_from_slice(lit_idx_slice);

        self.orig_clause_sizes.push(need as LitIdx);
        self.used_words += need;

        ClauseRef {
            offset: offset as ClauseOffset,
        }
    }

    /// Mark a clause as freed.
    ///
    /// The slot stays in place until the next consolidation; reading the clause afterwards is a
    /// logic error that only the compactor is exempt from.
    pub fn free_clause(&mut self, cref: ClauseRef) {
        let header = self.header_mut(cref);
        debug_assert!(!header.freed(), "free_clause on already freed clause");
        header.set_freed(true);

        let words = HEADER_LEN + header.len();
        debug_assert!(self.used_words >= words);
        self.used_words -= words;
    }

    /// Access the header of a clause.
    pub fn header(&self, cref: ClauseRef) -> &ClauseHeader {
        let offset = cref.offset as usize;
        assert!(
            offset + HEADER_LEN <= self.buffer.len(),
            "ClauseRef out of bounds"
        );
        unsafe { self.header_unchecked(cref) }
    }

    /// Mutate the header of a clause.
    pub fn header_mut(&mut self, cref: ClauseRef) -> &mut ClauseHeader {
        let offset = cref.offset as usize;
        assert!(
            offset + HEADER_LEN <= self.buffer.len(),
            "ClauseRef out of bounds"
        );
        unsafe { self.header_unchecked_mut(cref) }
    }

    unsafe fn header_unchecked(&self, cref: ClauseRef) -> &ClauseHeader {
        let offset = cref.offset as usize;
        let header_pointer = self.buffer.as_ptr().add(offset) as *const ClauseHeader;
        &*header_pointer
    }

    unsafe fn header_unchecked_mut(&mut self, cref: ClauseRef) -> &mut ClauseHeader {
        let offset = cref.offset as usize;
        let header_pointer = self.buffer.as_mut_ptr().add(offset) as *mut ClauseHeader;
        &mut *header_pointer
    }

    /// Access a clause.
    pub fn clause(&self, cref: ClauseRef) -> &Clause {
        let header = self.header(cref);
        let len = header.len();

        let lit_end = cref.offset as usize + HEADER_LEN + len;
        assert!(lit_end <= self.buffer.len(), "ClauseRef out of bounds");
        unsafe { self.clause_with_len_unchecked(cref, len) }
    }

    /// Mutate a clause.
    pub fn clause_mut(&mut self, cref: ClauseRef) -> &mut Clause {
        let header = self.header(cref);
        let len = header.len();

        let lit_end = cref.offset as usize + HEADER_LEN + len;
        assert!(lit_end <= self.buffer.len(), "ClauseRef out of bounds");
        unsafe { self.clause_with_len_unchecked_mut(cref, len) }
    }

    unsafe fn clause_with_len_unchecked(&self, cref: ClauseRef, len: usize) -> &Clause {
        let offset = cref.offset as usize;
        transmute::<&[LitIdx], &Clause>(slice::from_raw_parts(
            self.buffer.as_ptr().add(offset),
            len + HEADER_LEN,
        ))
    }

    unsafe fn clause_with_len_unchecked_mut(&mut self, cref: ClauseRef, len: usize) -> &mut Clause {
        let offset = cref.offset as usize;
        transmute::<&mut [LitIdx], &mut Clause>(slice::from_raw_parts_mut(
            self.buffer.as_mut_ptr().add(offset),
            len + HEADER_LEN,
        ))
    }

    /// Current buffer size in multiples of [`LitIdx`].
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Overestimate of the words occupied by live clauses.
    pub fn used_words(&self) -> usize {
        self.used_words
    }

    /// Whether enough garbage accumulated to make compaction worthwhile.
    ///
    /// Triggers when less than 70% of the buffer is in use.
    pub fn should_consolidate(&self) -> bool {
        self.buffer.len() >= 1024 && self.used_words * 10 < self.buffer.len() * 7
    }

    /// Compact the arena, moving all live clauses to a prefix of the buffer.
    ///
    /// Walks the arena slot by slot and moves every non-freed clause (at its current, possibly
    /// strengthened size) to the next free position. Returns the relocations as ordered
    /// `(old, new)` pairs. Every external holder of a [`ClauseRef`] must be rewritten using this
    /// map; the caller owns that update phase.
    pub fn consolidate(&mut self) -> Vec<(ClauseRef, ClauseRef)> {
        let mut relocations = vec![];
        let mut new_sizes = vec![];

        let mut read = 0;
        let mut write = 0;

        for &slot_words in self.orig_clause_sizes.iter() {
            let slot_words = slot_words as usize;
            let cref = ClauseRef {
                offset: read as ClauseOffset,
            };

            let header = self.header(cref);
            if !header.freed() {
                let words = HEADER_LEN + header.len();
                debug_assert!(words <= slot_words);

                self.buffer.copy_within(read..read + words, write);

                relocations.push((
                    cref,
                    ClauseRef {
                        offset: write as ClauseOffset,
                    },
                ));
                new_sizes.push(words as LitIdx);
                write += words;
            }

            read += slot_words;
        }

        debug_assert_eq!(read, self.buffer.len());

        self.buffer.truncate(write);
        self.buffer.shrink_to_fit();
        self.orig_clause_sizes = new_sizes;
        self.used_words = write;

        relocations
    }
}

/// Compact reference to a clause.
///
/// Used with [`ClauseAlloc`] to access the clause. Invalidated by consolidation; the compactor's
/// update phase is the only place that may rewrite one.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct ClauseRef {
    offset: ClauseOffset,
}

#[cfg(test)]
mod tests {
    use super::*;

    use occsat_formula::cnf::strategy::*;
    use occsat_formula::{CnfFormula, ExtendFormula};

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn roundtrip_from_cnf_formula(input in cnf_formula(1..100usize, 0..1000, 4..30)) {

            let mut clause_alloc = ClauseAlloc::new();
            let mut clause_refs = vec![];

            for clause_lits in input.iter() {
                let header = ClauseHeader::new();
                clause_refs.push(clause_alloc.add_clause(header, clause_lits));
            }

            let mut recovered = CnfFormula::new();

            for cref in clause_refs {
                let clause = clause_alloc.clause(cref);
                prop_assert_eq!(clause.header().len(), clause.lits().len());
                prop_assert_eq!(
                    clause.header().abstraction(),
                    clause_abstraction(clause.lits())
                );
                recovered.add_clause(clause.lits());
            }

            // Ignore difference caused by unused vars
            recovered.set_var_count(input.var_count());

            prop_assert_eq!(input, recovered);
        }

        #[test]
        fn free_and_consolidate_reclaims_space(
            input_keep in cnf_formula(1..100usize, 1..200, 4..20),
            input_free in cnf_formula(1..100usize, 1..200, 4..20),
        ) {
            let mut clause_alloc = ClauseAlloc::new();
            let mut keep = vec![];
            let mut free = vec![];

            // Interleave the two groups so freeing leaves holes
            let mut iter_keep = input_keep.iter();
            let mut iter_free = input_free.iter();
            loop {
                match (iter_keep.next(), iter_free.next()) {
                    (None, None) => break,
                    (lits_keep, lits_free) => {
                        if let Some(lits) = lits_keep {
                            keep.push(clause_alloc.add_clause(ClauseHeader::new(), lits));
                        }
                        if let Some(lits) = lits_free {
                            free.push(clause_alloc.add_clause(ClauseHeader::new(), lits));
                        }
                    }
                }
            }

            for cref in free {
                clause_alloc.free_clause(cref);
            }

            let relocations = clause_alloc.consolidate();
            prop_assert_eq!(relocations.len(), keep.len());

            let live_words: usize = input_keep.iter().map(|lits| HEADER_LEN + lits.len()).sum();
            prop_assert_eq!(clause_alloc.used_words(), live_words);
            prop_assert_eq!(clause_alloc.buffer_size(), live_words);

            for (index, ((old, new), lits)) in
                relocations.iter().zip(input_keep.iter()).enumerate()
            {
                prop_assert_eq!(*old, keep[index]);
                prop_assert_eq!(clause_alloc.clause(*new).lits(), lits);
            }
        }

        #[test]
        fn consolidate_reclaims_strengthened_words(
            input in cnf_formula(2..50usize, 1..50, 5..20),
        ) {
            let mut clause_alloc = ClauseAlloc::new();
            let mut crefs = vec![];

            for lits in input.iter() {
                crefs.push(clause_alloc.add_clause(ClauseHeader::new(), lits));
            }

            // Shrink every clause by one literal in place
            let mut expected = vec![];
            for (&cref, lits) in crefs.iter().zip(input.iter()) {
                let clause = clause_alloc.clause_mut(cref);
                let last = *clause.lits().last().unwrap();
                clause.strengthen(last);

                let mut shrunk = lits.to_vec();
                let position = shrunk.iter().position(|&lit| lit == last).unwrap();
                shrunk.remove(position);
                expected.push(shrunk);
            }

            let relocations = clause_alloc.consolidate();

            for ((_, new), lits) in relocations.iter().zip(expected.iter()) {
                prop_assert_eq!(clause_alloc.clause(*new).lits(), &lits[..]);
            }

            let live_words: usize = input
                .iter()
                .map(|lits| HEADER_LEN + lits.len() - 1)
                .sum();
            prop_assert_eq!(clause_alloc.buffer_size(), live_words);
        }
    }
}
