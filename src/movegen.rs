use crate::board::{bit, file_of, rank_of, square_name, squares, Board, Color, Piece, Square};
use crate::position::{CastlingRights, Position};
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveKind {
    Normal,
    DoublePush,
    EnPassant,
    CastleKingside,
    CastleQueenside,
}

/// A move as a plain value; two moves are equal when all fields are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub piece: Piece,
    pub captured: Option<Piece>,
    pub promotion: Option<Piece>,
    pub kind: MoveKind,
}

impl Move {
    pub fn new(from: Square, to: Square, piece: Piece) -> Self {
        Self {
            from,
            to,
            piece,
            captured: None,
            promotion: None,
            kind: MoveKind::Normal,
        }
    }

    pub fn with_capture(mut self, captured: Piece) -> Self {
        self.captured = Some(captured);
        self
    }

    pub fn with_promotion(mut self, promotion: Piece) -> Self {
        self.promotion = Some(promotion);
        self
    }

    pub fn with_kind(mut self, kind: MoveKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }

    pub fn is_en_passant(&self) -> bool {
        self.kind == MoveKind::EnPassant
    }

    pub fn is_castling(&self) -> bool {
        matches!(self.kind, MoveKind::CastleKingside | MoveKind::CastleQueenside)
    }

    /// Captures and promotions: the moves quiescence search looks at.
    pub fn is_tactical(&self) -> bool {
        self.captured.is_some() || self.promotion.is_some()
    }

    /// Square of the captured piece; differs from `to` only for en passant.
    pub fn capture_square(&self, mover: Color) -> Square {
        if self.kind != MoveKind::EnPassant {
            return self.to;
        }
        match mover {
            Color::White => self.to - 8,
            Color::Black => self.to + 8,
        }
    }

    /// Rook origin and destination for castling moves.
    pub fn castling_rook_squares(&self) -> Option<(Square, Square)> {
        match self.kind {
            MoveKind::CastleKingside => Some((self.from + 3, self.from + 1)),
            MoveKind::CastleQueenside => Some((self.from - 4, self.from - 1)),
            _ => None,
        }
    }
}

/// UCI long algebraic notation, e.g. `e2e4` or `a7a8q`.
impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", square_name(self.from), square_name(self.to))?;
        if let Some(promotion) = self.promotion {
            write!(f, "{}", promotion.letter())?;
        }
        Ok(())
    }
}

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (2, 1), (2, -1), (-2, 1), (-2, -1),
    (1, 2), (1, -2), (-1, 2), (-1, -2),
];

const KING_OFFSETS: [(i8, i8); 8] = [
    (1, 0), (1, 1), (0, 1), (-1, 1),
    (-1, 0), (-1, -1), (0, -1), (1, -1),
];

const BISHOP_DIRECTIONS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ROOK_DIRECTIONS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Precomputed leaper attacks.
#[derive(Debug)]
pub struct AttackTables {
    knight: [u64; 64],
    king: [u64; 64],
    // Squares attacked by a pawn of the given color standing on the square.
    pawn: [[u64; 64]; 2],
}

static ATTACK_TABLES: LazyLock<AttackTables> = LazyLock::new(AttackTables::new);

impl AttackTables {
    fn new() -> Self {
        let mut tables = Self {
            knight: [0; 64],
            king: [0; 64],
            pawn: [[0; 64]; 2],
        };
        for square in 0..64u8 {
            let index = square as usize;
            tables.knight[index] = leaper_attacks(square, &KNIGHT_OFFSETS);
            tables.king[index] = leaper_attacks(square, &KING_OFFSETS);
            tables.pawn[Color::White.index()][index] = leaper_attacks(square, &[(1, -1), (1, 1)]);
            tables.pawn[Color::Black.index()][index] = leaper_attacks(square, &[(-1, -1), (-1, 1)]);
        }
        tables
    }
}

fn offset_square(square: Square, dr: i8, df: i8) -> Option<Square> {
    let rank = rank_of(square) as i8 + dr;
    let file = file_of(square) as i8 + df;
    if (0..8).contains(&rank) && (0..8).contains(&file) {
        Some((rank * 8 + file) as Square)
    } else {
        None
    }
}

fn leaper_attacks(square: Square, offsets: &[(i8, i8)]) -> u64 {
    offsets
        .iter()
        .filter_map(|&(dr, df)| offset_square(square, dr, df))
        .fold(0, |acc, target| acc | bit(target))
}

fn slider_attacks(square: Square, occupied: u64, directions: &[(i8, i8); 4]) -> u64 {
    let mut attacks = 0u64;
    for &(dr, df) in directions {
        let mut current = square;
        while let Some(target) = offset_square(current, dr, df) {
            attacks |= bit(target);
            if occupied & bit(target) != 0 {
                break;
            }
            current = target;
        }
    }
    attacks
}

pub fn bishop_attacks(square: Square, occupied: u64) -> u64 {
    slider_attacks(square, occupied, &BISHOP_DIRECTIONS)
}

pub fn rook_attacks(square: Square, occupied: u64) -> u64 {
    slider_attacks(square, occupied, &ROOK_DIRECTIONS)
}

type PieceMoveGen = fn(&MoveGenerator, &Position, Square, &mut Vec<Move>);

// Indexed by `Piece::index()`.
const PIECE_GENERATORS: [PieceMoveGen; 6] = [
    MoveGenerator::pawn_moves,
    MoveGenerator::knight_moves,
    MoveGenerator::bishop_moves,
    MoveGenerator::rook_moves,
    MoveGenerator::queen_moves,
    MoveGenerator::king_moves,
];

#[derive(Debug, Clone, Copy)]
pub struct MoveGenerator {
    tables: &'static AttackTables,
}

impl Default for MoveGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MoveGenerator {
    pub fn new() -> Self {
        Self {
            tables: &ATTACK_TABLES,
        }
    }

    pub fn knight_attacks(&self, square: Square) -> u64 {
        self.tables.knight[square as usize]
    }

    pub fn king_attacks(&self, square: Square) -> u64 {
        self.tables.king[square as usize]
    }

    pub fn pawn_attacks(&self, color: Color, square: Square) -> u64 {
        self.tables.pawn[color.index()][square as usize]
    }

    /// Squares attacked by `piece` of `color` on `square`, given the occupancy.
    pub fn attacks(&self, piece: Piece, color: Color, square: Square, occupied: u64) -> u64 {
        match piece {
            Piece::Pawn => self.pawn_attacks(color, square),
            Piece::Knight => self.knight_attacks(square),
            Piece::Bishop => bishop_attacks(square, occupied),
            Piece::Rook => rook_attacks(square, occupied),
            Piece::Queen => bishop_attacks(square, occupied) | rook_attacks(square, occupied),
            Piece::King => self.king_attacks(square),
        }
    }

    pub fn is_square_attacked(&self, board: &Board, square: Square, attacker: Color) -> bool {
        let occupied = board.occupancy();
        let queens = board.pieces(attacker, Piece::Queen);

        // A pawn of `attacker` hits `square` exactly when a defending pawn on
        // `square` would hit it back.
        let pawns = board.pieces(attacker, Piece::Pawn);
        if self.pawn_attacks(attacker.opposite(), square) & pawns != 0 {
            return true;
        }
        if self.knight_attacks(square) & board.pieces(attacker, Piece::Knight) != 0 {
            return true;
        }
        if self.king_attacks(square) & board.pieces(attacker, Piece::King) != 0 {
            return true;
        }
        let diagonal = board.pieces(attacker, Piece::Bishop) | queens;
        if bishop_attacks(square, occupied) & diagonal != 0 {
            return true;
        }
        rook_attacks(square, occupied) & (board.pieces(attacker, Piece::Rook) | queens) != 0
    }

    /// Moves that follow piece movement rules, ignoring whether the own king is left in check.
    pub fn pseudo_legal_moves(&self, position: &Position) -> Vec<Move> {
        let mut moves = Vec::with_capacity(64);
        let us = position.side_to_move();
        for piece in Piece::ALL {
            for from in squares(position.board().pieces(us, piece)) {
                PIECE_GENERATORS[piece.index()](self, position, from, &mut moves);
            }
        }
        moves
    }

    /// All legal moves, in generation order (pawns first, king last).
    ///
    /// An empty result means checkmate or stalemate; `Position::terminal_status`
    /// tells the two apart.
    pub fn legal_moves(&self, position: &Position) -> Vec<Move> {
        let mut moves = self.pseudo_legal_moves(position);
        moves.retain(|mv| self.leaves_king_safe(position, mv));
        moves
    }

    /// Whether any legal move exists, stopping at the first one found.
    pub fn has_legal_move(&self, position: &Position) -> bool {
        self.pseudo_legal_moves(position)
            .iter()
            .any(|mv| self.leaves_king_safe(position, mv))
    }

    /// Checks the pin/check rule by replaying the move on a scratch board.
    fn leaves_king_safe(&self, position: &Position, mv: &Move) -> bool {
        let us = position.side_to_move();
        let mut board = *position.board();
        if let Some(captured) = mv.captured {
            board.remove(mv.capture_square(us), captured, us.opposite());
        }
        board.remove(mv.from, mv.piece, us);
        board.put(mv.to, mv.promotion.unwrap_or(mv.piece), us);

        let king = if mv.piece == Piece::King {
            Some(mv.to)
        } else {
            board.king_square(us)
        };
        match king {
            Some(king) => !self.is_square_attacked(&board, king, us.opposite()),
            None => true,
        }
    }

    pub fn is_move_legal(&self, position: &Position, mv: &Move) -> bool {
        self.legal_moves(position).contains(mv)
    }

    /// Pushes a move to every target square, recording what it captures.
    fn push_targets(
        &self,
        position: &Position,
        from: Square,
        piece: Piece,
        targets: u64,
        moves: &mut Vec<Move>,
    ) {
        let board = position.board();
        let us = position.side_to_move();
        for to in squares(targets & !board.color_occupancy(us)) {
            let mv = Move::new(from, to, piece);
            moves.push(match board.piece_at(to) {
                Some((captured, _)) => mv.with_capture(captured),
                None => mv,
            });
        }
    }

    fn push_pawn_move(&self, mv: Move, us: Color, moves: &mut Vec<Move>) {
        let last_rank = us.opposite().back_rank();
        if rank_of(mv.to) == last_rank {
            for promotion in Piece::PROMOTIONS {
                moves.push(mv.with_promotion(promotion));
            }
        } else {
            moves.push(mv);
        }
    }

    fn pawn_moves(&self, position: &Position, from: Square, moves: &mut Vec<Move>) {
        let board = position.board();
        let us = position.side_to_move();
        let occupied = board.occupancy();
        let (forward, start_rank) = match us {
            Color::White => (1i8, 1u8),
            Color::Black => (-1i8, 6u8),
        };

        if let Some(one) = offset_square(from, forward, 0) {
            if occupied & bit(one) == 0 {
                self.push_pawn_move(Move::new(from, one, Piece::Pawn), us, moves);
                if rank_of(from) == start_rank {
                    if let Some(two) = offset_square(one, forward, 0) {
                        if occupied & bit(two) == 0 {
                            moves.push(
                                Move::new(from, two, Piece::Pawn).with_kind(MoveKind::DoublePush),
                            );
                        }
                    }
                }
            }
        }

        let attacks = self.pawn_attacks(us, from);
        for to in squares(attacks & board.color_occupancy(us.opposite())) {
            if let Some((captured, _)) = board.piece_at(to) {
                let mv = Move::new(from, to, Piece::Pawn).with_capture(captured);
                self.push_pawn_move(mv, us, moves);
            }
        }

        if let Some(target) = position.en_passant() {
            if attacks & bit(target) != 0 {
                moves.push(
                    Move::new(from, target, Piece::Pawn)
                        .with_capture(Piece::Pawn)
                        .with_kind(MoveKind::EnPassant),
                );
            }
        }
    }

    fn knight_moves(&self, position: &Position, from: Square, moves: &mut Vec<Move>) {
        self.push_targets(position, from, Piece::Knight, self.knight_attacks(from), moves);
    }

    fn bishop_moves(&self, position: &Position, from: Square, moves: &mut Vec<Move>) {
        let targets = bishop_attacks(from, position.board().occupancy());
        self.push_targets(position, from, Piece::Bishop, targets, moves);
    }

    fn rook_moves(&self, position: &Position, from: Square, moves: &mut Vec<Move>) {
        let targets = rook_attacks(from, position.board().occupancy());
        self.push_targets(position, from, Piece::Rook, targets, moves);
    }

    fn queen_moves(&self, position: &Position, from: Square, moves: &mut Vec<Move>) {
        let occupied = position.board().occupancy();
        let targets = bishop_attacks(from, occupied) | rook_attacks(from, occupied);
        self.push_targets(position, from, Piece::Queen, targets, moves);
    }

    fn king_moves(&self, position: &Position, from: Square, moves: &mut Vec<Move>) {
        self.push_targets(position, from, Piece::King, self.king_attacks(from), moves);
        self.castling_moves(position, from, moves);
    }

    fn castling_moves(&self, position: &Position, from: Square, moves: &mut Vec<Move>) {
        let board = position.board();
        let us = position.side_to_move();
        let them = us.opposite();
        let home = us.back_rank() * 8 + 4;
        if from != home {
            return;
        }
        let rights = position.castling_rights();
        let occupied = board.occupancy();
        let rooks = board.pieces(us, Piece::Rook);
        let safe = |square: Square| !self.is_square_attacked(board, square, them);

        if rights.has(CastlingRights::kingside(us))
            && rooks & bit(home + 3) != 0
            && occupied & (bit(home + 1) | bit(home + 2)) == 0
            && safe(home)
            && safe(home + 1)
            && safe(home + 2)
        {
            moves.push(Move::new(home, home + 2, Piece::King).with_kind(MoveKind::CastleKingside));
        }

        if rights.has(CastlingRights::queenside(us))
            && rooks & bit(home - 4) != 0
            && occupied & (bit(home - 1) | bit(home - 2) | bit(home - 3)) == 0
            && safe(home)
            && safe(home - 1)
            && safe(home - 2)
        {
            moves.push(Move::new(home, home - 2, Piece::King).with_kind(MoveKind::CastleQueenside));
        }
    }

    /// Counts leaf nodes of the legal move tree to `depth` plies.
    pub fn perft(&self, position: &Position, depth: u32) -> u64 {
        let mut working = position.clone();
        self.perft_inner(&mut working, depth)
    }

    fn perft_inner(&self, position: &mut Position, depth: u32) -> u64 {
        if depth == 0 {
            return 1;
        }
        let moves = self.legal_moves(position);
        if depth == 1 {
            return moves.len() as u64;
        }
        let mut nodes = 0;
        for mv in moves {
            let undo = position.make_move(&mv);
            nodes += self.perft_inner(position, depth - 1);
            position.unmake_move(&mv, undo);
        }
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(fen: &str) -> Position {
        Position::from_fen(fen).unwrap()
    }

    #[test]
    fn test_initial_position_has_twenty_moves() {
        let moves = MoveGenerator::new().legal_moves(&Position::new());
        assert_eq!(moves.len(), 20);
        assert!(moves.iter().all(|mv| !mv.is_capture()));
    }

    #[test]
    fn test_attack_tables() {
        let generator = MoveGenerator::new();
        // Knight on a1 reaches b3 and c2.
        assert_eq!(generator.knight_attacks(0), bit(17) | bit(10));
        // King in the corner has three neighbours.
        assert_eq!(generator.king_attacks(63).count_ones(), 3);
        // White pawn on a2 only attacks b3; black pawn on h7 only attacks g6.
        assert_eq!(generator.pawn_attacks(Color::White, 8), bit(17));
        assert_eq!(generator.pawn_attacks(Color::Black, 55), bit(46));
    }

    #[test]
    fn test_sliders_stop_at_blockers() {
        // Rook on a1 with a blocker on a3: a2, a3 and the first rank.
        let attacks = rook_attacks(0, bit(16));
        assert_eq!(attacks, bit(8) | bit(16) | 0xFE);
        let attacks = bishop_attacks(27, 0);
        assert_eq!(attacks.count_ones(), 13);
    }

    #[test]
    fn test_promotions_generate_four_pieces() {
        let moves = MoveGenerator::new().legal_moves(&position("8/P6k/8/8/8/8/8/K7 w - - 0 1"));
        let promotions: Vec<&Move> = moves.iter().filter(|mv| mv.promotion.is_some()).collect();
        assert_eq!(promotions.len(), 4);
        assert!(promotions.iter().all(|mv| mv.from == 48 && mv.to == 56));
    }

    #[test]
    fn test_capture_promotions() {
        let moves = MoveGenerator::new().legal_moves(&position("1r5k/P7/8/8/8/8/8/K7 w - - 0 1"));
        let captures = moves
            .iter()
            .filter(|mv| mv.promotion.is_some() && mv.captured == Some(Piece::Rook))
            .count();
        assert_eq!(captures, 4);
    }

    #[test]
    fn test_castling_both_sides() {
        let moves = MoveGenerator::new()
            .legal_moves(&position("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1"));
        assert!(moves.iter().any(|mv| mv.kind == MoveKind::CastleKingside && mv.to == 6));
        assert!(moves.iter().any(|mv| mv.kind == MoveKind::CastleQueenside && mv.to == 2));
    }

    #[test]
    fn test_no_castling_through_attacked_square() {
        // Black rook on f8 covers f1.
        let moves = MoveGenerator::new()
            .legal_moves(&position("4kr2/8/8/8/8/8/8/R3K2R w KQ - 0 1"));
        assert!(!moves.iter().any(|mv| mv.kind == MoveKind::CastleKingside));
        assert!(moves.iter().any(|mv| mv.kind == MoveKind::CastleQueenside));
    }

    #[test]
    fn test_no_castling_out_of_check() {
        let moves = MoveGenerator::new()
            .legal_moves(&position("4r1k1/8/8/8/8/8/8/R3K2R w KQ - 0 1"));
        assert!(!moves.iter().any(|mv| mv.is_castling()));
    }

    #[test]
    fn test_queenside_castling_allows_attacked_b_file() {
        // b1 is attacked but the king never crosses it.
        let moves = MoveGenerator::new().legal_moves(&position("1r2k3/8/8/8/8/8/8/R3K3 w Q - 0 1"));
        assert!(moves.iter().any(|mv| mv.kind == MoveKind::CastleQueenside));
    }

    #[test]
    fn test_pinned_piece_cannot_leave_line() {
        // Knight on e2 pinned by the rook on e8.
        let moves = MoveGenerator::new().legal_moves(&position("4r2k/8/8/8/8/8/4N3/4K3 w - - 0 1"));
        assert!(moves.iter().all(|mv| mv.piece != Piece::Knight));
    }

    #[test]
    fn test_en_passant_discovered_check_is_illegal() {
        // Taking en passant would expose the king on a5 to the rook on h5.
        let moves = MoveGenerator::new().legal_moves(&position("8/8/8/KPp4r/8/8/8/7k w - c6 0 1"));
        assert!(!moves.iter().any(|mv| mv.is_en_passant()));
    }

    #[test]
    fn test_en_passant_generated() {
        let moves = MoveGenerator::new()
            .legal_moves(&position("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2"));
        let ep: Vec<&Move> = moves.iter().filter(|mv| mv.is_en_passant()).collect();
        assert_eq!(ep.len(), 1);
        assert_eq!(ep[0].to_string(), "e5d6");
        assert_eq!(ep[0].captured, Some(Piece::Pawn));
    }

    #[test]
    fn test_move_display() {
        let mv = Move::new(52, 60, Piece::Pawn).with_promotion(Piece::Knight);
        assert_eq!(mv.to_string(), "e7e8n");
        assert_eq!(Move::new(12, 28, Piece::Pawn).to_string(), "e2e4");
    }

    #[test]
    fn test_checkmated_side_has_no_moves() {
        let mated = position("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3");
        assert!(MoveGenerator::new().legal_moves(&mated).is_empty());
    }

    #[test]
    fn test_perft_start_position() {
        let generator = MoveGenerator::new();
        let start = Position::new();
        assert_eq!(generator.perft(&start, 1), 20);
        assert_eq!(generator.perft(&start, 2), 400);
        assert_eq!(generator.perft(&start, 3), 8902);
    }
}
