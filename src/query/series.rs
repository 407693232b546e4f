//! Positional alignment of a term series, used for phrase matching.

/// Outcome of aligning a term series within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeriesMatch {
    /// Number of valid alignments found.
    pub count: u32,
}

impl SeriesMatch {
    /// Whether at least one alignment exists.
    pub fn is_match(&self) -> bool {
        self.count > 0
    }
}

/// Finds alignments of successive terms within a slop of their expected offsets.
///
/// Term `i` occurring at position `p` proposes the phrase start `p - i`. A
/// window holding one position per term aligns when its proposed starts lie
/// within `slop` of each other, so with `slop = 0` the terms must occur at
/// consecutive positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeriesMatcher {
    slop: u32,
}

impl SeriesMatcher {
    /// Create a series matcher.
    pub fn new(slop: u32) -> Self {
        SeriesMatcher { slop }
    }

    /// Allowed distance between proposed starts.
    pub fn slop(&self) -> u32 {
        self.slop
    }

    /// Count alignments across the position lists of a document's terms.
    ///
    /// Each list must be ascending. Every feasible window counts once, after
    /// which the pointer holding the smallest start moves on. A window that
    /// places two terms on the same position is not feasible.
    pub fn match_series(&self, positions: &[&[u32]]) -> SeriesMatch {
        if positions.is_empty() || positions.iter().any(|list| list.is_empty()) {
            return SeriesMatch::default();
        }

        let start = |term: usize, position: u32| position as i64 - term as i64;
        let mut cursors = vec![0usize; positions.len()];
        let mut count = 0u32;

        loop {
            let mut min_term = 0;
            let mut min_start = i64::MAX;
            let mut max_start = i64::MIN;
            for (term, &cursor) in cursors.iter().enumerate() {
                let s = start(term, positions[term][cursor]);
                if s < min_start {
                    min_start = s;
                    min_term = term;
                }
                max_start = max_start.max(s);
            }

            if max_start - min_start <= self.slop as i64 && Self::distinct(positions, &cursors) {
                count += 1;
            }

            cursors[min_term] += 1;
            if cursors[min_term] == positions[min_term].len() {
                return SeriesMatch { count };
            }
        }
    }

    /// Whether every term of the window sits on its own position.
    fn distinct(positions: &[&[u32]], cursors: &[usize]) -> bool {
        cursors.iter().enumerate().all(|(term, &cursor)| {
            let position = positions[term][cursor];
            cursors[term + 1..]
                .iter()
                .enumerate()
                .all(|(offset, &other)| positions[term + 1 + offset][other] != position)
        })
    }
}
