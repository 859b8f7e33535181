use crate::evaluation::{Score, MATE_THRESHOLD};
use crate::movegen::Move;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Exact,
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy)]
pub struct TranspositionEntry {
    pub hash: u64,
    pub depth: u32,
    pub score: Score,
    pub bound: Bound,
    pub best_move: Option<Move>,
}

/// Fixed number of slots indexed by hash; a slot is replaced when the new
/// entry belongs to another position or was searched at least as deep.
#[derive(Debug)]
pub struct TranspositionTable {
    slots: Vec<Option<TranspositionEntry>>,
}

impl TranspositionTable {
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![None; size],
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.slots.is_empty()
    }

    fn index(&self, hash: u64) -> usize {
        (hash % self.slots.len() as u64) as usize
    }

    /// Stores a search result; `ply` turns mate scores into distances from this node.
    pub fn store(
        &mut self,
        hash: u64,
        depth: u32,
        score: Score,
        bound: Bound,
        best_move: Option<Move>,
        ply: u32,
    ) {
        if !self.is_enabled() {
            return;
        }
        let index = self.index(hash);
        if let Some(existing) = &self.slots[index] {
            if existing.hash == hash && existing.depth > depth {
                return;
            }
        }
        self.slots[index] = Some(TranspositionEntry {
            hash,
            depth,
            score: score_to_table(score, ply),
            bound,
            best_move,
        });
    }

    pub fn get(&self, hash: u64) -> Option<&TranspositionEntry> {
        if !self.is_enabled() {
            return None;
        }
        self.slots[self.index(hash)]
            .as_ref()
            .filter(|entry| entry.hash == hash)
    }

    /// A score usable as the node's value, if the entry is deep enough and
    /// its bound fits the window.
    pub fn probe(
        &self,
        hash: u64,
        depth: u32,
        alpha: Score,
        beta: Score,
        ply: u32,
    ) -> Option<Score> {
        let entry = self.get(hash)?;
        if entry.depth < depth {
            return None;
        }
        let score = score_from_table(entry.score, ply);
        match entry.bound {
            Bound::Exact => Some(score),
            Bound::Lower if score >= beta => Some(score),
            Bound::Upper if score <= alpha => Some(score),
            _ => None,
        }
    }

    pub fn best_move(&self, hash: u64) -> Option<Move> {
        self.get(hash).and_then(|entry| entry.best_move)
    }
}

fn score_to_table(score: Score, ply: u32) -> Score {
    if score >= MATE_THRESHOLD {
        score + ply as Score
    } else if score <= -MATE_THRESHOLD {
        score - ply as Score
    } else {
        score
    }
}

fn score_from_table(score: Score, ply: u32) -> Score {
    if score >= MATE_THRESHOLD {
        score - ply as Score
    } else if score <= -MATE_THRESHOLD {
        score + ply as Score
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Piece;
    use crate::evaluation::MATE_SCORE;

    #[test]
    fn test_store_and_probe_exact() {
        let mut table = TranspositionTable::new(1024);
        let mv = Move::new(12, 28, Piece::Pawn);
        table.store(42, 3, 55, Bound::Exact, Some(mv), 0);
        assert_eq!(table.probe(42, 3, -100, 100, 0), Some(55));
        assert_eq!(table.probe(42, 4, -100, 100, 0), None);
        assert_eq!(table.best_move(42), Some(mv));
        assert_eq!(table.best_move(43), None);
    }

    #[test]
    fn test_bounds_respect_window() {
        let mut table = TranspositionTable::new(1024);
        table.store(7, 2, 300, Bound::Lower, None, 0);
        assert_eq!(table.probe(7, 2, 0, 200, 0), Some(300));
        assert_eq!(table.probe(7, 2, 0, 400, 0), None);
        table.store(9, 2, -300, Bound::Upper, None, 0);
        assert_eq!(table.probe(9, 2, -200, 0, 0), Some(-300));
        assert_eq!(table.probe(9, 2, -400, 0, 0), None);
    }

    #[test]
    fn test_mate_scores_are_ply_relative() {
        let mut table = TranspositionTable::new(16);
        // Mate found 5 plies from the root, stored at ply 2.
        table.store(1, 4, MATE_SCORE - 5, Bound::Exact, None, 2);
        // Reached again at ply 4 the mate is two plies further away.
        assert_eq!(table.probe(1, 4, -MATE_SCORE, MATE_SCORE, 4), Some(MATE_SCORE - 7));
    }

    #[test]
    fn test_shallower_result_does_not_replace_deeper() {
        let mut table = TranspositionTable::new(16);
        table.store(5, 6, 10, Bound::Exact, None, 0);
        table.store(5, 2, 99, Bound::Exact, None, 0);
        assert_eq!(table.get(5).map(|entry| entry.score), Some(10));
    }

    #[test]
    fn test_disabled_table_stores_nothing() {
        let mut table = TranspositionTable::new(0);
        table.store(5, 6, 10, Bound::Exact, None, 0);
        assert!(table.get(5).is_none());
    }
}
