use crate::board::{
    bit, file_of, parse_square, rank_of, square_at, square_name, squares, Board, Color, Piece,
    Square,
};
use crate::error::{ChessError, Result};
use crate::movegen::{Move, MoveGenerator, MoveKind};
use crate::zobrist::zobrist_keys;
use std::fmt;

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const FILE_A: u64 = 0x0101_0101_0101_0101;
const FILE_H: u64 = FILE_A << 7;

/// Half-moves without a capture or pawn move after which the game is drawn.
pub const FIFTY_MOVE_HALFMOVES: u32 = 100;

/// Castling rights as four independent bits: `KQkq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const WHITE_KINGSIDE: u8 = 0b0001;
    pub const WHITE_QUEENSIDE: u8 = 0b0010;
    pub const BLACK_KINGSIDE: u8 = 0b0100;
    pub const BLACK_QUEENSIDE: u8 = 0b1000;

    pub const NONE: CastlingRights = CastlingRights(0);
    pub const ALL: CastlingRights = CastlingRights(0b1111);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn has(self, right: u8) -> bool {
        self.0 & right != 0
    }

    pub fn kingside(color: Color) -> u8 {
        match color {
            Color::White => Self::WHITE_KINGSIDE,
            Color::Black => Self::BLACK_KINGSIDE,
        }
    }

    pub fn queenside(color: Color) -> u8 {
        match color {
            Color::White => Self::WHITE_QUEENSIDE,
            Color::Black => Self::BLACK_QUEENSIDE,
        }
    }

    fn remove(&mut self, rights: u8) {
        self.0 &= !rights;
    }

    /// Rights lost when a piece moves from, or is captured on, `square`.
    fn lost_on(square: Square) -> u8 {
        match square {
            0 => Self::WHITE_QUEENSIDE,
            4 => Self::WHITE_KINGSIDE | Self::WHITE_QUEENSIDE,
            7 => Self::WHITE_KINGSIDE,
            56 => Self::BLACK_QUEENSIDE,
            60 => Self::BLACK_KINGSIDE | Self::BLACK_QUEENSIDE,
            63 => Self::BLACK_KINGSIDE,
            _ => 0,
        }
    }
}

/// Game-end classification of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalStatus {
    None,
    /// The side to move is checkmated.
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    FiftyMove,
    ThreefoldRepetition,
}

impl TerminalStatus {
    pub fn is_terminal(self) -> bool {
        self != TerminalStatus::None
    }

    pub fn is_draw(self) -> bool {
        !matches!(self, TerminalStatus::None | TerminalStatus::Checkmate)
    }
}

/// State needed to take a move back; produced by `make_move`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Undo {
    castling: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
    hash: u64,
}

/// A full game position.
///
/// From the caller's side a position is a value: `apply` returns a new one.
/// The search mutates a private copy through `make_move`/`unmake_move`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    board: Board,
    side_to_move: Color,
    castling: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
    hash: u64,
    // Hashes of the positions that led here, oldest first.
    history: Vec<u64>,
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

impl Position {
    /// The standard initial position.
    pub fn new() -> Self {
        let mut position = Self {
            board: Board::standard(),
            side_to_move: Color::White,
            castling: CastlingRights::ALL,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            hash: 0,
            history: Vec::new(),
        };
        position.hash = position.compute_hash();
        position
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    pub fn castling_rights(&self) -> CastlingRights {
        self.castling
    }

    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// Zobrist hash of placement, side to move, castling rights and en-passant file.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Returns the position after playing `mv`, which must be legal here.
    pub fn apply(&self, mv: &Move) -> Result<Position> {
        if !MoveGenerator::new().is_move_legal(self, mv) {
            return Err(ChessError::IllegalMove { mv: mv.to_string() });
        }
        let mut next = self.clone();
        next.make_move(mv);
        Ok(next)
    }

    /// Resolves a UCI move string such as `e2e4` or `e7e8q` against the legal moves.
    pub fn parse_move(&self, text: &str) -> Result<Move> {
        let text = text.trim();
        if !text.is_ascii() || (text.len() != 4 && text.len() != 5) {
            return Err(ChessError::InvalidMoveNotation(text.to_string()));
        }
        let from = parse_square(&text[0..2])
            .ok_or_else(|| ChessError::InvalidMoveNotation(text.to_string()))?;
        let to = parse_square(&text[2..4])
            .ok_or_else(|| ChessError::InvalidMoveNotation(text.to_string()))?;
        let promotion = match text[4..].chars().next() {
            None => None,
            Some(letter) => match Piece::from_letter(letter) {
                Some(piece) if Piece::PROMOTIONS.contains(&piece) => Some(piece),
                _ => return Err(ChessError::InvalidMoveNotation(text.to_string())),
            },
        };

        MoveGenerator::new()
            .legal_moves(self)
            .into_iter()
            .find(|mv| mv.from == from && mv.to == to && mv.promotion == promotion)
            .ok_or_else(|| ChessError::IllegalMove { mv: text.to_string() })
    }

    pub fn is_in_check(&self, color: Color) -> bool {
        match self.board.king_square(color) {
            Some(king) => {
                MoveGenerator::new().is_square_attacked(&self.board, king, color.opposite())
            }
            None => false,
        }
    }

    pub fn terminal_status(&self) -> TerminalStatus {
        if MoveGenerator::new().legal_moves(self).is_empty() {
            return if self.is_in_check(self.side_to_move) {
                TerminalStatus::Checkmate
            } else {
                TerminalStatus::Stalemate
            };
        }
        if self.is_insufficient_material() {
            return TerminalStatus::InsufficientMaterial;
        }
        if self.halfmove_clock >= FIFTY_MOVE_HALFMOVES {
            return TerminalStatus::FiftyMove;
        }
        if self.repetition_count() >= 3 {
            return TerminalStatus::ThreefoldRepetition;
        }
        TerminalStatus::None
    }

    /// How many times the current position has occurred, this occurrence included.
    pub fn repetition_count(&self) -> usize {
        // Only positions since the last irreversible move can repeat, and only
        // every second one has the same side to move.
        1 + self
            .history
            .iter()
            .rev()
            .take(self.halfmove_clock as usize)
            .skip(1)
            .step_by(2)
            .filter(|&&hash| hash == self.hash)
            .count()
    }

    /// True when the position has occurred before.
    pub fn is_repetition(&self) -> bool {
        self.repetition_count() >= 2
    }

    pub fn is_insufficient_material(&self) -> bool {
        let board = &self.board;
        for color in Color::BOTH {
            if board.count(color, Piece::Pawn) > 0
                || board.count(color, Piece::Rook) > 0
                || board.count(color, Piece::Queen) > 0
            {
                return false;
            }
        }

        let minors =
            |color: Color| board.count(color, Piece::Knight) + board.count(color, Piece::Bishop);
        let (white_minors, black_minors) = (minors(Color::White), minors(Color::Black));

        // King vs king, or a single minor piece against a bare king.
        if white_minors + black_minors <= 1 {
            return true;
        }

        // One bishop each, both on the same square color.
        if white_minors == 1
            && black_minors == 1
            && board.count(Color::White, Piece::Bishop) == 1
            && board.count(Color::Black, Piece::Bishop) == 1
        {
            let shade = |color: Color| {
                squares(board.pieces(color, Piece::Bishop))
                    .next()
                    .map(|sq| (file_of(sq) + rank_of(sq)) % 2)
            };
            return shade(Color::White) == shade(Color::Black);
        }

        false
    }

    pub(crate) fn make_move(&mut self, mv: &Move) -> Undo {
        let keys = zobrist_keys();
        let us = self.side_to_move;
        let them = us.opposite();
        let undo = Undo {
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            fullmove_number: self.fullmove_number,
            hash: self.hash,
        };
        self.history.push(self.hash);

        let mut hash = self.hash;
        if let Some(ep) = self.en_passant {
            hash ^= keys.en_passant(file_of(ep));
        }
        hash ^= keys.castling(self.castling.bits());

        if let Some(captured) = mv.captured {
            let square = mv.capture_square(us);
            self.board.remove(square, captured, them);
            hash ^= keys.piece(them, captured, square);
        }

        self.board.remove(mv.from, mv.piece, us);
        hash ^= keys.piece(us, mv.piece, mv.from);
        let placed = mv.promotion.unwrap_or(mv.piece);
        self.board.put(mv.to, placed, us);
        hash ^= keys.piece(us, placed, mv.to);

        if let Some((rook_from, rook_to)) = mv.castling_rook_squares() {
            self.board.remove(rook_from, Piece::Rook, us);
            self.board.put(rook_to, Piece::Rook, us);
            hash ^= keys.piece(us, Piece::Rook, rook_from) ^ keys.piece(us, Piece::Rook, rook_to);
        }

        self.castling
            .remove(CastlingRights::lost_on(mv.from) | CastlingRights::lost_on(mv.to));
        hash ^= keys.castling(self.castling.bits());

        self.en_passant = None;
        if mv.kind == MoveKind::DoublePush {
            let adjacent = ((bit(mv.to) << 1) & !FILE_A) | ((bit(mv.to) >> 1) & !FILE_H);
            if self.board.pieces(them, Piece::Pawn) & adjacent != 0 {
                let target = (mv.from + mv.to) / 2;
                self.en_passant = Some(target);
                hash ^= keys.en_passant(file_of(target));
            }
        }

        if mv.piece == Piece::Pawn || mv.captured.is_some() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock = self.halfmove_clock.saturating_add(1);
        }
        if us == Color::Black {
            self.fullmove_number = self.fullmove_number.saturating_add(1);
        }

        self.side_to_move = them;
        hash ^= keys.black_to_move();
        self.hash = hash;
        undo
    }

    pub(crate) fn unmake_move(&mut self, mv: &Move, undo: Undo) {
        let us = self.side_to_move.opposite();
        let them = self.side_to_move;
        self.side_to_move = us;

        if let Some((rook_from, rook_to)) = mv.castling_rook_squares() {
            self.board.remove(rook_to, Piece::Rook, us);
            self.board.put(rook_from, Piece::Rook, us);
        }

        self.board.remove(mv.to, mv.promotion.unwrap_or(mv.piece), us);
        self.board.put(mv.from, mv.piece, us);
        if let Some(captured) = mv.captured {
            self.board.put(mv.capture_square(us), captured, them);
        }

        self.castling = undo.castling;
        self.en_passant = undo.en_passant;
        self.halfmove_clock = undo.halfmove_clock;
        self.fullmove_number = undo.fullmove_number;
        self.hash = undo.hash;
        self.history.pop();
    }

    pub(crate) fn compute_hash(&self) -> u64 {
        let keys = zobrist_keys();
        let mut hash = 0u64;
        for color in Color::BOTH {
            for piece in Piece::ALL {
                for square in squares(self.board.pieces(color, piece)) {
                    hash ^= keys.piece(color, piece, square);
                }
            }
        }
        hash ^= keys.castling(self.castling.bits());
        if let Some(ep) = self.en_passant {
            hash ^= keys.en_passant(file_of(ep));
        }
        if self.side_to_move == Color::Black {
            hash ^= keys.black_to_move();
        }
        hash
    }

    pub fn from_fen(fen: &str) -> Result<Self> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 || fields.len() > 6 {
            return Err(ChessError::InvalidFen(format!(
                "expected 4 to 6 fields, found {}",
                fields.len()
            )));
        }

        let board = parse_placement(fields[0])?;

        let side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => {
                return Err(ChessError::InvalidFen(format!("bad side to move '{}'", other)));
            }
        };

        let mut castling = CastlingRights::NONE;
        if fields[2] != "-" {
            for letter in fields[2].chars() {
                let right = match letter {
                    'K' => CastlingRights::WHITE_KINGSIDE,
                    'Q' => CastlingRights::WHITE_QUEENSIDE,
                    'k' => CastlingRights::BLACK_KINGSIDE,
                    'q' => CastlingRights::BLACK_QUEENSIDE,
                    _ => {
                        return Err(ChessError::InvalidFen(format!(
                            "bad castling field '{}'",
                            fields[2]
                        )));
                    }
                };
                castling.0 |= right;
            }
        }
        castling.remove(unsupported_castling(&board));

        let en_passant = match fields[3] {
            "-" => None,
            text => {
                let square = parse_square(text).ok_or_else(|| {
                    ChessError::InvalidFen(format!("bad en-passant square '{}'", text))
                })?;
                let expected_rank = match side_to_move {
                    Color::White => 5,
                    Color::Black => 2,
                };
                if rank_of(square) != expected_rank {
                    return Err(ChessError::InvalidFen(format!(
                        "en-passant square {} on the wrong rank",
                        text
                    )));
                }
                // The pawn just passed over the target from its starting square.
                let origin = match side_to_move {
                    Color::White => square + 8,
                    Color::Black => square - 8,
                };
                if board.occupancy() & (bit(square) | bit(origin)) != 0 {
                    return Err(ChessError::InvalidFen(format!(
                        "en-passant square {} or the square behind it is occupied",
                        text
                    )));
                }
                Some(square)
            }
        };

        let halfmove_clock = match fields.get(4) {
            Some(text) => text
                .parse::<u32>()
                .map_err(|_| ChessError::InvalidFen(format!("bad halfmove clock '{}'", text)))?,
            None => 0,
        };
        let fullmove_number = match fields.get(5) {
            Some(text) => match text.parse::<u32>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ChessError::InvalidFen(format!("bad fullmove number '{}'", text)));
                }
            },
            None => 1,
        };

        let mut position = Self {
            board,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
            hash: 0,
            history: Vec::new(),
        };
        position.en_passant = position.capturable_en_passant();
        position.validate()?;
        position.hash = position.compute_hash();
        Ok(position)
    }

    pub fn to_fen(&self) -> String {
        let mut placement = String::new();
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.board.piece_at(square_at(file, rank)) {
                    Some((piece, color)) => {
                        if empty > 0 {
                            placement.push_str(&empty.to_string());
                            empty = 0;
                        }
                        placement.push(piece.symbol(color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                placement.push_str(&empty.to_string());
            }
            if rank > 0 {
                placement.push('/');
            }
        }

        let side = match self.side_to_move {
            Color::White => "w",
            Color::Black => "b",
        };

        let mut castling = String::new();
        for (right, letter) in [
            (CastlingRights::WHITE_KINGSIDE, 'K'),
            (CastlingRights::WHITE_QUEENSIDE, 'Q'),
            (CastlingRights::BLACK_KINGSIDE, 'k'),
            (CastlingRights::BLACK_QUEENSIDE, 'q'),
        ] {
            if self.castling.has(right) {
                castling.push(letter);
            }
        }
        if castling.is_empty() {
            castling.push('-');
        }

        let en_passant = self.en_passant.map(square_name).unwrap_or_else(|| "-".to_string());

        format!(
            "{} {} {} {} {} {}",
            placement, side, castling, en_passant, self.halfmove_clock, self.fullmove_number
        )
    }

    /// Keeps the en-passant target only when a pawn of the side to move can take on it.
    fn capturable_en_passant(&self) -> Option<Square> {
        let target = self.en_passant?;
        let them = self.side_to_move.opposite();
        let victim = match self.side_to_move {
            Color::White => target - 8,
            Color::Black => target + 8,
        };
        if self.board.pieces(them, Piece::Pawn) & bit(victim) == 0 {
            return None;
        }
        let adjacent = ((bit(victim) << 1) & !FILE_A) | ((bit(victim) >> 1) & !FILE_H);
        if self.board.pieces(self.side_to_move, Piece::Pawn) & adjacent != 0 {
            Some(target)
        } else {
            None
        }
    }

    fn validate(&self) -> Result<()> {
        for color in Color::BOTH {
            if self.board.count(color, Piece::King) != 1 {
                return Err(ChessError::InvalidFen(format!(
                    "{:?} must have exactly one king",
                    color
                )));
            }
        }
        let pawns = self.board.pieces(Color::White, Piece::Pawn)
            | self.board.pieces(Color::Black, Piece::Pawn);
        if pawns & 0xFF00_0000_0000_00FF != 0 {
            return Err(ChessError::InvalidFen("pawn on a back rank".to_string()));
        }
        if self.is_in_check(self.side_to_move.opposite()) {
            return Err(ChessError::InvalidFen(
                "side not to move is in check".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_placement(field: &str) -> Result<Board> {
    let ranks: Vec<&str> = field.split('/').collect();
    if ranks.len() != 8 {
        return Err(ChessError::InvalidFen(format!(
            "expected 8 ranks, found {}",
            ranks.len()
        )));
    }

    let mut board = Board::empty();
    for (row, text) in ranks.iter().enumerate() {
        let rank = 7 - row as u8;
        let mut file = 0u8;
        for symbol in text.chars() {
            if let Some(skip) = symbol.to_digit(10) {
                if skip == 0 || skip > 8 {
                    return Err(ChessError::InvalidFen(format!("bad empty count '{}'", symbol)));
                }
                file += skip as u8;
            } else {
                let piece = Piece::from_letter(symbol)
                    .ok_or_else(|| ChessError::InvalidFen(format!("bad piece '{}'", symbol)))?;
                let color = if symbol.is_ascii_uppercase() {
                    Color::White
                } else {
                    Color::Black
                };
                if file >= 8 {
                    return Err(ChessError::InvalidFen(format!("rank '{}' is too long", text)));
                }
                board.put(square_at(file, rank), piece, color);
                file += 1;
            }
            if file > 8 {
                return Err(ChessError::InvalidFen(format!("rank '{}' is too long", text)));
            }
        }
        if file != 8 {
            return Err(ChessError::InvalidFen(format!("rank '{}' is too short", text)));
        }
    }
    Ok(board)
}

/// Castling rights whose king or rook is not on its home square.
fn unsupported_castling(board: &Board) -> u8 {
    let mut lost = 0;
    for color in Color::BOTH {
        let rank = color.back_rank();
        let king_home = board.pieces(color, Piece::King) & bit(square_at(4, rank)) != 0;
        let rooks = board.pieces(color, Piece::Rook);
        if !king_home || rooks & bit(square_at(7, rank)) == 0 {
            lost |= CastlingRights::kingside(color);
        }
        if !king_home || rooks & bit(square_at(0, rank)) == 0 {
            lost |= CastlingRights::queenside(color);
        }
    }
    lost
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.board)?;
        writeln!(f, "fen: {}", self.to_fen())
    }
}
