use crate::board::{file_of, rank_of, square_at, squares, Color, Piece, Square};
use crate::movegen::MoveGenerator;
use crate::position::{Position, TerminalStatus};

/// Centipawn score.
pub type Score = i32;

/// Score of being checkmated right now; mates further away score closer to zero.
pub const MATE_SCORE: Score = 30_000;

/// Deepest ply a search may reach; also bounds the mate-distance adjustment.
pub const MAX_PLY: u32 = 128;

/// Scores at least this large (in magnitude) are forced mates.
pub const MATE_THRESHOLD: Score = MATE_SCORE - MAX_PLY as Score;

/// Score for the side to move when it is checkmated `ply` half-moves from the root.
pub fn mated_in(ply: u32) -> Score {
    -(MATE_SCORE - ply as Score)
}

pub fn is_mate_score(score: Score) -> bool {
    score.abs() >= MATE_THRESHOLD
}

// Piece-square tables from white's point of view, first row is the eighth rank.
const PAWN_TABLE: [[i32; 8]; 8] = [
    [0, 0, 0, 0, 0, 0, 0, 0],
    [50, 50, 50, 50, 50, 50, 50, 50],
    [10, 10, 20, 30, 30, 20, 10, 10],
    [5, 5, 10, 25, 25, 10, 5, 5],
    [0, 0, 0, 20, 20, 0, 0, 0],
    [5, -5, -10, 0, 0, -10, -5, 5],
    [5, 10, 10, -20, -20, 10, 10, 5],
    [0, 0, 0, 0, 0, 0, 0, 0],
];

const KNIGHT_TABLE: [[i32; 8]; 8] = [
    [-50, -40, -30, -30, -30, -30, -40, -50],
    [-40, -20, 0, 0, 0, 0, -20, -40],
    [-30, 0, 10, 15, 15, 10, 0, -30],
    [-30, 5, 15, 20, 20, 15, 5, -30],
    [-30, 0, 15, 20, 20, 15, 0, -30],
    [-30, 5, 10, 15, 15, 10, 5, -30],
    [-40, -20, 0, 5, 5, 0, -20, -40],
    [-50, -40, -30, -30, -30, -30, -40, -50],
];

const BISHOP_TABLE: [[i32; 8]; 8] = [
    [-20, -10, -10, -10, -10, -10, -10, -20],
    [-10, 0, 0, 0, 0, 0, 0, -10],
    [-10, 0, 5, 10, 10, 5, 0, -10],
    [-10, 5, 5, 10, 10, 5, 5, -10],
    [-10, 0, 10, 10, 10, 10, 0, -10],
    [-10, 10, 10, 10, 10, 10, 10, -10],
    [-10, 5, 0, 0, 0, 0, 5, -10],
    [-20, -10, -10, -10, -10, -10, -10, -20],
];

const ROOK_TABLE: [[i32; 8]; 8] = [
    [0, 0, 0, 0, 0, 0, 0, 0],
    [5, 10, 10, 10, 10, 10, 10, 5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [0, 0, 0, 5, 5, 0, 0, 0],
];

const QUEEN_TABLE: [[i32; 8]; 8] = [
    [-20, -10, -10, -5, -5, -10, -10, -20],
    [-10, 0, 0, 0, 0, 0, 0, -10],
    [-10, 0, 5, 5, 5, 5, 0, -10],
    [-5, 0, 5, 5, 5, 5, 0, -5],
    [0, 0, 5, 5, 5, 5, 0, -5],
    [-10, 5, 5, 5, 5, 5, 0, -10],
    [-10, 0, 5, 0, 0, 0, 0, -10],
    [-20, -10, -10, -5, -5, -10, -10, -20],
];

const KING_MIDDLEGAME_TABLE: [[i32; 8]; 8] = [
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-20, -30, -30, -40, -40, -30, -30, -20],
    [-10, -20, -20, -20, -20, -20, -20, -10],
    [20, 20, 0, 0, 0, 0, 20, 20],
    [20, 30, 10, 0, 0, 10, 30, 20],
];

const KING_ENDGAME_TABLE: [[i32; 8]; 8] = [
    [-50, -40, -30, -20, -20, -30, -40, -50],
    [-30, -20, -10, 0, 0, -10, -20, -30],
    [-30, -10, 20, 30, 30, 20, -10, -30],
    [-30, -10, 30, 40, 40, 30, -10, -30],
    [-30, -10, 30, 40, 40, 30, -10, -30],
    [-30, -10, 20, 30, 30, 20, -10, -30],
    [-30, -30, 0, 0, 0, 0, -30, -30],
    [-50, -30, -30, -30, -30, -30, -30, -50],
];

/// Tunable evaluation parameters. Nothing here is global: every evaluator
/// carries its own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalWeights {
    /// Indexed by `Piece::index()`.
    pub piece_values: [i32; 6],
    pub use_piece_square_tables: bool,

    /// Bonus per attacked square, indexed by `Piece::index()`.
    pub mobility: [i32; 6],

    pub doubled_pawn_penalty: i32,
    pub isolated_pawn_penalty: i32,
    pub passed_pawn_bonus: i32,
    pub connected_pawn_bonus: i32,

    pub pawn_shield_bonus: i32,
    pub open_file_penalty: i32,
    pub semi_open_file_penalty: i32,

    /// Non-pawn material (both sides, kings excluded) at or below which the
    /// king switches to its endgame table.
    pub endgame_material: i32,
}

impl Default for EvalWeights {
    fn default() -> Self {
        Self {
            piece_values: [100, 320, 330, 500, 900, 0],
            use_piece_square_tables: true,
            mobility: [0, 4, 3, 2, 1, 0],
            doubled_pawn_penalty: -10,
            isolated_pawn_penalty: -20,
            passed_pawn_bonus: 20,
            connected_pawn_bonus: 10,
            pawn_shield_bonus: 5,
            open_file_penalty: -15,
            semi_open_file_penalty: -10,
            endgame_material: 1300,
        }
    }
}

impl EvalWeights {
    /// Material count only: standard piece values and no positional terms.
    pub fn material_only() -> Self {
        Self {
            piece_values: [100, 320, 330, 500, 900, 0],
            use_piece_square_tables: false,
            mobility: [0; 6],
            doubled_pawn_penalty: 0,
            isolated_pawn_penalty: 0,
            passed_pawn_bonus: 0,
            connected_pawn_bonus: 0,
            pawn_shield_bonus: 0,
            open_file_penalty: 0,
            semi_open_file_penalty: 0,
            endgame_material: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    weights: EvalWeights,
    move_generator: MoveGenerator,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_weights(EvalWeights::default())
    }

    pub fn material_only() -> Self {
        Self::with_weights(EvalWeights::material_only())
    }

    pub fn with_weights(weights: EvalWeights) -> Self {
        Self {
            weights,
            move_generator: MoveGenerator::new(),
        }
    }

    pub fn weights(&self) -> &EvalWeights {
        &self.weights
    }

    pub fn piece_value(&self, piece: Piece) -> i32 {
        self.weights.piece_values[piece.index()]
    }

    /// White-relative score of any position, terminal ones included:
    /// checkmate is `∓MATE_SCORE` against the mated side and every draw is zero.
    pub fn evaluate(&self, position: &Position) -> Score {
        match position.terminal_status() {
            TerminalStatus::Checkmate => position.side_to_move().sign() * mated_in(0),
            TerminalStatus::None => self.static_eval(position),
            _ => 0,
        }
    }

    /// Same as `evaluate`, from `color`'s point of view.
    pub fn evaluate_for(&self, position: &Position, color: Color) -> Score {
        color.sign() * self.evaluate(position)
    }

    /// Heuristic score from the side to move's point of view, without terminal detection.
    pub fn static_eval_relative(&self, position: &Position) -> Score {
        position.side_to_move().sign() * self.static_eval(position)
    }

    /// Heuristic white-relative score: material, piece placement, mobility,
    /// pawn structure and king safety. Does not look for mate or draws.
    pub fn static_eval(&self, position: &Position) -> Score {
        let endgame = self.is_endgame(position);
        let mut score = 0;
        for color in Color::BOTH {
            let side = self.material_and_placement(position, color, endgame)
                + self.mobility(position, color)
                + self.pawn_structure(position, color)
                + self.king_safety(position, color, endgame);
            score += color.sign() * side;
        }
        score
    }

    fn is_endgame(&self, position: &Position) -> bool {
        let board = position.board();
        let material: i32 = Color::BOTH
            .iter()
            .flat_map(|&color| {
                [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen]
                    .map(|piece| board.count(color, piece) as i32 * self.piece_value(piece))
            })
            .sum();
        material <= self.weights.endgame_material
    }

    fn material_and_placement(&self, position: &Position, color: Color, endgame: bool) -> i32 {
        let board = position.board();
        let mut score = 0;
        for piece in Piece::ALL {
            for square in squares(board.pieces(color, piece)) {
                score += self.piece_value(piece);
                if self.weights.use_piece_square_tables {
                    score += table_bonus(piece, color, square, endgame);
                }
            }
        }
        score
    }

    fn mobility(&self, position: &Position, color: Color) -> i32 {
        let board = position.board();
        let occupied = board.occupancy();
        let own = board.color_occupancy(color);
        let mut score = 0;
        for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
            let weight = self.weights.mobility[piece.index()];
            if weight == 0 {
                continue;
            }
            for square in squares(board.pieces(color, piece)) {
                let reach = self.move_generator.attacks(piece, color, square, occupied) & !own;
                score += weight * reach.count_ones() as i32;
            }
        }
        score
    }

    fn pawn_structure(&self, position: &Position, color: Color) -> i32 {
        let board = position.board();
        let own = board.pieces(color, Piece::Pawn);
        let enemy = board.pieces(color.opposite(), Piece::Pawn);
        let mut files = [0i32; 8];
        for square in squares(own) {
            files[file_of(square) as usize] += 1;
        }

        let mut score = 0;
        for file in 0..8 {
            let count = files[file];
            if count == 0 {
                continue;
            }
            if count > 1 {
                score += self.weights.doubled_pawn_penalty * (count - 1);
            }
            let left = file > 0 && files[file - 1] > 0;
            let right = file < 7 && files[file + 1] > 0;
            if !left && !right {
                score += self.weights.isolated_pawn_penalty * count;
            }
            if right {
                score += self.weights.connected_pawn_bonus;
            }
        }

        for square in squares(own) {
            if enemy & front_span(color, square) == 0 {
                score += self.weights.passed_pawn_bonus;
            }
        }
        score
    }

    fn king_safety(&self, position: &Position, color: Color, endgame: bool) -> i32 {
        if endgame {
            return 0;
        }
        let board = position.board();
        let Some(king) = board.king_square(color) else {
            return 0;
        };
        let own_pawns = board.pieces(color, Piece::Pawn);
        let enemy_pawns = board.pieces(color.opposite(), Piece::Pawn);
        let mut score = 0;

        let shield_rank = rank_of(king) as i8 + if color == Color::White { 1 } else { -1 };
        if (0..8).contains(&shield_rank) {
            for df in -1i8..=1 {
                let file = file_of(king) as i8 + df;
                if (0..8).contains(&file)
                    && own_pawns & (1u64 << square_at(file as u8, shield_rank as u8)) != 0
                {
                    score += self.weights.pawn_shield_bonus;
                }
            }
        }

        let file_mask = 0x0101_0101_0101_0101u64 << file_of(king);
        if own_pawns & file_mask == 0 {
            score += if enemy_pawns & file_mask == 0 {
                self.weights.open_file_penalty
            } else {
                self.weights.semi_open_file_penalty
            };
        }
        score
    }
}

fn table_bonus(piece: Piece, color: Color, square: Square, endgame: bool) -> i32 {
    // Tables are written from white's side with the eighth rank first;
    // black reads them mirrored.
    let row = match color {
        Color::White => 7 - rank_of(square) as usize,
        Color::Black => rank_of(square) as usize,
    };
    let file = file_of(square) as usize;
    let table = match piece {
        Piece::Pawn => &PAWN_TABLE,
        Piece::Knight => &KNIGHT_TABLE,
        Piece::Bishop => &BISHOP_TABLE,
        Piece::Rook => &ROOK_TABLE,
        Piece::Queen => &QUEEN_TABLE,
        Piece::King if endgame => &KING_ENDGAME_TABLE,
        Piece::King => &KING_MIDDLEGAME_TABLE,
    };
    table[row][file]
}

/// Squares in front of a pawn on its own and both neighbouring files.
fn front_span(color: Color, square: Square) -> u64 {
    let file = file_of(square) as i8;
    let rank = rank_of(square) as i8;
    let mut span = 0u64;
    let (low, high) = match color {
        Color::White => (rank + 1, 8),
        Color::Black => (0, rank),
    };
    for r in low..high {
        for f in (file - 1).max(0)..=(file + 1).min(7) {
            span |= 1u64 << square_at(f as u8, r as u8);
        }
    }
    span
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(fen: &str) -> Position {
        Position::from_fen(fen).unwrap()
    }

    #[test]
    fn test_start_position_is_balanced() {
        let start = Position::new();
        assert_eq!(Evaluator::material_only().evaluate(&start), 0);
        assert_eq!(Evaluator::new().evaluate(&start), 0);
    }

    #[test]
    fn test_mirrored_positions_evaluate_opposite() {
        let evaluator = Evaluator::new();
        let white = position("r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3");
        let black = position("rnbqkb1r/pppp1ppp/5n2/4p3/4P3/2N5/PPPP1PPP/R1BQKBNR b KQkq - 2 3");
        assert_eq!(evaluator.static_eval(&white), -evaluator.static_eval(&black));
    }

    #[test]
    fn test_material_only_counts_pieces() {
        let evaluator = Evaluator::material_only();
        // White is a knight up.
        let pos = position("4k3/8/8/8/8/8/8/1N2K3 b - - 0 1");
        assert_eq!(evaluator.static_eval(&pos), 320);
        assert_eq!(evaluator.static_eval_relative(&pos), -320);
    }

    #[test]
    fn test_checkmate_scores_as_mate() {
        let evaluator = Evaluator::new();
        let mated_white = position("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3");
        assert_eq!(evaluator.evaluate(&mated_white), -MATE_SCORE);
        assert_eq!(evaluator.evaluate_for(&mated_white, Color::Black), MATE_SCORE);
    }

    #[test]
    fn test_draws_score_zero() {
        let evaluator = Evaluator::new();
        let stalemate = position("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1");
        assert_eq!(stalemate.terminal_status(), TerminalStatus::Stalemate);
        assert_eq!(evaluator.evaluate(&stalemate), 0);
        let bare_kings = position("4k3/8/8/8/8/8/8/4K3 w - - 0 1");
        assert_eq!(evaluator.evaluate(&bare_kings), 0);
    }

    #[test]
    fn test_passed_pawn_is_rewarded() {
        let mut weights = EvalWeights::material_only();
        weights.passed_pawn_bonus = 20;
        let evaluator = Evaluator::with_weights(weights);
        let passed = position("4k3/8/8/3P4/8/8/8/4K3 w - - 0 1");
        let blocked = position("4k3/4p3/8/3P4/8/8/8/4K3 w - - 0 1");
        assert_eq!(evaluator.static_eval(&passed), 120);
        // Each pawn stands in the other's path.
        assert_eq!(evaluator.static_eval(&blocked), 0);
    }

    #[test]
    fn test_mated_in_prefers_shorter_mates() {
        assert!(mated_in(1) < mated_in(3));
        assert!(is_mate_score(-mated_in(5)));
        assert!(!is_mate_score(900));
    }
}
