//! Iterative-deepening alpha-beta search.
//!
//! Every call to [`Searcher::search`] works on its own copy of the position
//! and its own transposition table, so nothing carries over between calls.

use crate::board::Piece;
use crate::error::{ChessError, Result};
use crate::evaluation::{is_mate_score, mated_in, Evaluator, Score, MATE_SCORE, MAX_PLY};
use crate::movegen::{Move, MoveGenerator};
use crate::position::{Position, FIFTY_MOVE_HALFMOVES};
use crate::transposition::{Bound, TranspositionTable};
use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const INFINITY: Score = MATE_SCORE + 1;

// Clock and stop flag are polled once per this many nodes.
const CHECK_INTERVAL_NODES: u64 = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Resolve captures and promotions past the horizon before evaluating.
    pub quiescence: bool,
    /// Transposition table slots; `0` turns the table off.
    pub transposition_entries: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            quiescence: true,
            transposition_entries: 1 << 18,
        }
    }
}

impl SearchConfig {
    /// Bare alpha-beta: no quiescence, no transposition table.
    pub fn plain() -> Self {
        Self {
            quiescence: false,
            transposition_entries: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub best_move: Move,
    /// From the point of view of the side to move at the root.
    pub score: Score,
    /// Deepest fully completed iteration.
    pub depth: u32,
    pub nodes: u64,
    pub elapsed: Duration,
}

impl SearchResult {
    /// Plies to a forced mate: positive when the side to move delivers it,
    /// negative when it receives it.
    pub fn mate_in(&self) -> Option<i32> {
        if !is_mate_score(self.score) {
            return None;
        }
        let plies = MATE_SCORE - self.score.abs();
        Some(if self.score > 0 { plies } else { -plies })
    }
}

#[derive(Debug, Clone)]
pub struct Searcher {
    evaluator: Evaluator,
    move_generator: MoveGenerator,
    config: SearchConfig,
    stop: Arc<AtomicBool>,
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new(Evaluator::new(), SearchConfig::default())
    }
}

impl Searcher {
    pub fn new(evaluator: Evaluator, config: SearchConfig) -> Self {
        Self {
            evaluator,
            move_generator: MoveGenerator::new(),
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shares a flag that, once set, ends the search after the current iteration is abandoned.
    pub fn with_stop_signal(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Finds the best move for the side to move.
    ///
    /// Depths are searched one after another. When the time limit passes or
    /// the stop flag is raised, the iteration in progress is thrown away and
    /// the last completed one is returned. Depth 1 always runs to completion.
    pub fn search(
        &self,
        position: &Position,
        depth_limit: u32,
        time_limit: Option<Duration>,
    ) -> Result<SearchResult> {
        if depth_limit == 0 || depth_limit > MAX_PLY {
            return Err(ChessError::InvalidArgument(format!(
                "depth limit must be between 1 and {}, got {}",
                MAX_PLY, depth_limit
            )));
        }
        if time_limit == Some(Duration::ZERO) {
            return Err(ChessError::InvalidArgument(
                "time limit must be positive".to_string(),
            ));
        }

        let mut root_moves = self.move_generator.legal_moves(position);
        if root_moves.is_empty() {
            return Err(ChessError::NoLegalMoves);
        }

        let started = Instant::now();
        let mut context = SearchContext {
            evaluator: &self.evaluator,
            move_generator: self.move_generator,
            quiescence: self.config.quiescence,
            stop: &self.stop,
            // A limit too large to represent as an instant is no limit at all.
            deadline: time_limit.and_then(|limit| started.checked_add(limit)),
            working: position.clone(),
            table: TranspositionTable::new(self.config.transposition_entries),
            killers: vec![[None; 2]; MAX_PLY as usize + 1],
            nodes: 0,
            interruptible: false,
            interrupted: false,
        };
        context.order_moves(&mut root_moves, None, 0);

        let mut completed: Option<SearchResult> = None;
        for depth in 1..=depth_limit {
            context.interruptible = depth > 1;
            if context.interruptible && context.budget_exhausted() {
                debug!(depth, "no budget left for another iteration");
                break;
            }

            let Some((best_move, score)) = context.search_root(depth, &root_moves) else {
                debug!(depth, nodes = context.nodes, "iteration abandoned");
                break;
            };
            debug!(
                depth,
                score,
                nodes = context.nodes,
                best_move = %best_move,
                "iteration completed"
            );

            completed = Some(SearchResult {
                best_move,
                score,
                depth,
                nodes: context.nodes,
                elapsed: started.elapsed(),
            });

            if is_mate_score(score) {
                break;
            }
            root_moves.retain(|mv| *mv != best_move);
            root_moves.insert(0, best_move);
        }

        if context.working != *position {
            return Err(ChessError::InvariantViolation(
                "working position was not restored after search".to_string(),
            ));
        }
        let mut result = completed.ok_or_else(|| {
            ChessError::InvariantViolation("search finished without a completed depth".to_string())
        })?;
        result.nodes = context.nodes;
        result.elapsed = started.elapsed();

        info!(
            best_move = %result.best_move,
            score = result.score,
            depth = result.depth,
            nodes = result.nodes,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "search finished"
        );
        Ok(result)
    }
}

/// Mutable state of one search call.
struct SearchContext<'a> {
    evaluator: &'a Evaluator,
    move_generator: MoveGenerator,
    quiescence: bool,
    stop: &'a AtomicBool,
    deadline: Option<Instant>,
    working: Position,
    table: TranspositionTable,
    killers: Vec<[Option<Move>; 2]>,
    nodes: u64,
    interruptible: bool,
    interrupted: bool,
}

impl SearchContext<'_> {
    fn budget_exhausted(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn should_stop(&mut self) -> bool {
        if self.interrupted {
            return true;
        }
        if self.interruptible && self.nodes % CHECK_INTERVAL_NODES == 0 && self.budget_exhausted() {
            self.interrupted = true;
        }
        self.interrupted
    }

    /// Searches every root move with a full window. `None` if interrupted.
    fn search_root(&mut self, depth: u32, moves: &[Move]) -> Option<(Move, Score)> {
        let mut alpha = -INFINITY;
        let mut best: Option<(Move, Score)> = None;

        for mv in moves {
            let undo = self.working.make_move(mv);
            let score = self.negamax(depth - 1, 1, -INFINITY, -alpha).map(|s| -s);
            self.working.unmake_move(mv, undo);
            let score = score?;

            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((*mv, score));
            }
            alpha = alpha.max(score);
        }

        if let Some((mv, score)) = best {
            self.table
                .store(self.working.hash(), depth, score, Bound::Exact, Some(mv), 0);
        }
        best
    }

    // Every make_move is paired with unmake_move before `?` can return early.
    fn negamax(&mut self, depth: u32, ply: u32, mut alpha: Score, beta: Score) -> Option<Score> {
        self.nodes += 1;
        if self.should_stop() {
            return None;
        }
        if self.working.is_repetition() || self.working.is_insufficient_material() {
            return Some(0);
        }
        if depth == 0 {
            return self.leaf(ply, alpha, beta);
        }

        let hash = self.working.hash();
        if let Some(score) = self.table.probe(hash, depth, alpha, beta, ply) {
            return Some(score);
        }

        let mut moves = self.move_generator.legal_moves(&self.working);
        if moves.is_empty() {
            return Some(self.no_moves_score(ply));
        }
        if self.working.halfmove_clock() >= FIFTY_MOVE_HALFMOVES {
            return Some(0);
        }
        self.order_moves(&mut moves, self.table.best_move(hash), ply);

        let original_alpha = alpha;
        let mut best_score = -INFINITY;
        let mut best_move = None;

        for mv in &moves {
            let undo = self.working.make_move(mv);
            let score = self.negamax(depth - 1, ply + 1, -beta, -alpha).map(|s| -s);
            self.working.unmake_move(mv, undo);
            let score = score?;

            if score > best_score {
                best_score = score;
                best_move = Some(*mv);
            }
            if score > alpha {
                alpha = score;
            }
            if alpha >= beta {
                if !mv.is_tactical() {
                    self.remember_killer(*mv, ply);
                }
                break;
            }
        }

        let bound = if best_score <= original_alpha {
            Bound::Upper
        } else if best_score >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        };
        self.table.store(hash, depth, best_score, bound, best_move, ply);

        Some(best_score)
    }

    fn leaf(&mut self, ply: u32, alpha: Score, beta: Score) -> Option<Score> {
        if self.quiescence {
            return self.quiescence(ply, alpha, beta);
        }
        if !self.move_generator.has_legal_move(&self.working) {
            return Some(self.no_moves_score(ply));
        }
        if self.working.halfmove_clock() >= FIFTY_MOVE_HALFMOVES {
            return Some(0);
        }
        Some(self.evaluator.static_eval_relative(&self.working))
    }

    fn quiescence(&mut self, ply: u32, mut alpha: Score, beta: Score) -> Option<Score> {
        self.nodes += 1;
        if self.should_stop() {
            return None;
        }

        let moves = self.move_generator.legal_moves(&self.working);
        if moves.is_empty() {
            return Some(self.no_moves_score(ply));
        }
        if self.working.halfmove_clock() >= FIFTY_MOVE_HALFMOVES {
            return Some(0);
        }

        // The side to move may decline every capture.
        let stand_pat = self.evaluator.static_eval_relative(&self.working);
        if stand_pat >= beta || ply >= MAX_PLY {
            return Some(stand_pat);
        }
        alpha = alpha.max(stand_pat);
        let mut best_score = stand_pat;

        let mut tactical: Vec<Move> = moves.into_iter().filter(Move::is_tactical).collect();
        self.order_moves(&mut tactical, None, ply);

        for mv in &tactical {
            let undo = self.working.make_move(mv);
            let score = self.quiescence(ply + 1, -beta, -alpha).map(|s| -s);
            self.working.unmake_move(mv, undo);
            let score = score?;

            best_score = best_score.max(score);
            if score > alpha {
                alpha = score;
            }
            if alpha >= beta {
                break;
            }
        }

        Some(best_score)
    }

    fn no_moves_score(&self, ply: u32) -> Score {
        if self.working.is_in_check(self.working.side_to_move()) {
            mated_in(ply)
        } else {
            0
        }
    }

    fn remember_killer(&mut self, mv: Move, ply: u32) {
        let slot = &mut self.killers[ply as usize];
        if slot[0] != Some(mv) {
            slot[1] = slot[0];
            slot[0] = Some(mv);
        }
    }

    /// Hash move first, then captures by MVV-LVA, promotions, killers and the rest.
    /// The sort is stable so equal moves keep generation order.
    fn order_moves(&self, moves: &mut [Move], hash_move: Option<Move>, ply: u32) {
        let killers = self.killers[ply as usize];
        moves.sort_by_key(|mv| Reverse(move_priority(mv, hash_move, &killers)));
    }
}

fn ordering_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => 100,
        Piece::Knight => 320,
        Piece::Bishop => 330,
        Piece::Rook => 500,
        Piece::Queen => 900,
        Piece::King => 20000,
    }
}

fn move_priority(mv: &Move, hash_move: Option<Move>, killers: &[Option<Move>; 2]) -> i32 {
    if hash_move == Some(*mv) {
        return 1_000_000;
    }
    let mut priority = 0;
    if let Some(victim) = mv.captured {
        priority += 100_000 + 10 * ordering_value(victim) - ordering_value(mv.piece) / 100;
    }
    if let Some(promotion) = mv.promotion {
        priority += 50_000 + ordering_value(promotion);
    }
    if priority == 0 && killers.contains(&Some(*mv)) {
        priority = 10_000;
    }
    priority
}

/// Unpruned minimax with the same leaf and terminal scoring as a [`Searcher`]
/// built with [`SearchConfig::plain`]. Exponential in `depth`; useful to check
/// that pruning never changes the value of a position.
pub fn minimax(position: &Position, depth: u32, evaluator: &Evaluator) -> Score {
    let mut working = position.clone();
    minimax_inner(&mut working, depth, 0, evaluator, &MoveGenerator::new())
}

fn minimax_inner(
    position: &mut Position,
    depth: u32,
    ply: u32,
    evaluator: &Evaluator,
    move_generator: &MoveGenerator,
) -> Score {
    if ply > 0 && (position.is_repetition() || position.is_insufficient_material()) {
        return 0;
    }
    let moves = move_generator.legal_moves(position);
    if moves.is_empty() {
        return if position.is_in_check(position.side_to_move()) {
            mated_in(ply)
        } else {
            0
        };
    }
    if ply > 0 && position.halfmove_clock() >= FIFTY_MOVE_HALFMOVES {
        return 0;
    }
    if depth == 0 {
        return evaluator.static_eval_relative(position);
    }

    let mut best = -INFINITY;
    for mv in &moves {
        let undo = position.make_move(mv);
        let score = -minimax_inner(position, depth - 1, ply + 1, evaluator, move_generator);
        position.unmake_move(mv, undo);
        best = best.max(score);
    }
    best
}
