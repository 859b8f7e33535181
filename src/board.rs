use std::fmt;

/// Square index, `a1 = 0`, `h1 = 7`, `a8 = 56`, `h8 = 63`.
pub type Square = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Piece {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl Piece {
    pub const ALL: [Piece; 6] = [
        Piece::Pawn,
        Piece::Knight,
        Piece::Bishop,
        Piece::Rook,
        Piece::Queen,
        Piece::King,
    ];

    /// Pieces a pawn may promote to, strongest first.
    pub const PROMOTIONS: [Piece; 4] = [Piece::Queen, Piece::Rook, Piece::Bishop, Piece::Knight];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Lowercase letter used by FEN (for black) and UCI promotion suffixes.
    pub fn letter(self) -> char {
        match self {
            Piece::Pawn => 'p',
            Piece::Knight => 'n',
            Piece::Bishop => 'b',
            Piece::Rook => 'r',
            Piece::Queen => 'q',
            Piece::King => 'k',
        }
    }

    pub fn from_letter(letter: char) -> Option<Piece> {
        match letter.to_ascii_lowercase() {
            'p' => Some(Piece::Pawn),
            'n' => Some(Piece::Knight),
            'b' => Some(Piece::Bishop),
            'r' => Some(Piece::Rook),
            'q' => Some(Piece::Queen),
            'k' => Some(Piece::King),
            _ => None,
        }
    }

    /// FEN symbol: uppercase for white, lowercase for black.
    pub fn symbol(self, color: Color) -> char {
        match color {
            Color::White => self.letter().to_ascii_uppercase(),
            Color::Black => self.letter(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub const BOTH: [Color; 2] = [Color::White, Color::Black];

    pub fn opposite(&self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// `1` for white and `-1` for black, used to turn white-relative scores around.
    pub fn sign(self) -> i32 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    /// Rank (0-based) of this color's back rank.
    pub fn back_rank(self) -> u8 {
        match self {
            Color::White => 0,
            Color::Black => 7,
        }
    }
}

pub fn square_at(file: u8, rank: u8) -> Square {
    rank * 8 + file
}

pub fn file_of(square: Square) -> u8 {
    square % 8
}

pub fn rank_of(square: Square) -> u8 {
    square / 8
}

pub fn bit(square: Square) -> u64 {
    1u64 << square
}

/// Algebraic name of a square, e.g. `e4`.
pub fn square_name(square: Square) -> String {
    let mut name = String::with_capacity(2);
    name.push((b'a' + file_of(square)) as char);
    name.push((b'1' + rank_of(square)) as char);
    name
}

pub fn parse_square(text: &str) -> Option<Square> {
    let bytes = text.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let file = bytes[0].wrapping_sub(b'a');
    let rank = bytes[1].wrapping_sub(b'1');
    if file < 8 && rank < 8 {
        Some(square_at(file, rank))
    } else {
        None
    }
}

/// Iterates over the set squares of a bitboard, lowest first.
pub fn squares(mut bitboard: u64) -> impl Iterator<Item = Square> {
    std::iter::from_fn(move || {
        if bitboard == 0 {
            return None;
        }
        let square = bitboard.trailing_zeros() as Square;
        bitboard &= bitboard - 1;
        Some(square)
    })
}

/// Piece placement: one bitboard per (color, piece kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Board {
    pieces: [[u64; 6]; 2],
}

impl Board {
    pub fn empty() -> Self {
        Self { pieces: [[0; 6]; 2] }
    }

    /// Standard initial layout.
    pub fn standard() -> Self {
        Self {
            pieces: [
                [
                    0x0000_0000_0000_FF00, // Pawns
                    0x0000_0000_0000_0042, // Knights
                    0x0000_0000_0000_0024, // Bishops
                    0x0000_0000_0000_0081, // Rooks
                    0x0000_0000_0000_0008, // Queen
                    0x0000_0000_0000_0010, // King
                ],
                [
                    0x00FF_0000_0000_0000,
                    0x4200_0000_0000_0000,
                    0x2400_0000_0000_0000,
                    0x8100_0000_0000_0000,
                    0x0800_0000_0000_0000,
                    0x1000_0000_0000_0000,
                ],
            ],
        }
    }

    pub fn pieces(&self, color: Color, piece: Piece) -> u64 {
        self.pieces[color.index()][piece.index()]
    }

    pub fn color_occupancy(&self, color: Color) -> u64 {
        self.pieces[color.index()].iter().fold(0, |acc, &bb| acc | bb)
    }

    pub fn occupancy(&self) -> u64 {
        self.color_occupancy(Color::White) | self.color_occupancy(Color::Black)
    }

    pub fn piece_at(&self, square: Square) -> Option<(Piece, Color)> {
        let mask = bit(square);
        for color in Color::BOTH {
            for piece in Piece::ALL {
                if self.pieces(color, piece) & mask != 0 {
                    return Some((piece, color));
                }
            }
        }
        None
    }

    pub fn put(&mut self, square: Square, piece: Piece, color: Color) {
        self.pieces[color.index()][piece.index()] |= bit(square);
    }

    pub fn remove(&mut self, square: Square, piece: Piece, color: Color) {
        self.pieces[color.index()][piece.index()] &= !bit(square);
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        squares(self.pieces(color, Piece::King)).next()
    }

    pub fn count(&self, color: Color, piece: Piece) -> u32 {
        self.pieces(color, piece).count_ones()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for rank in (0..8).rev() {
            let mut row = String::with_capacity(16);
            for file in 0..8 {
                let symbol = match self.piece_at(square_at(file, rank)) {
                    Some((piece, color)) => piece.symbol(color),
                    None => '.',
                };
                row.push(symbol);
                if file < 7 {
                    row.push(' ');
                }
            }
            writeln!(f, "{}", row)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_names_round_trip() {
        assert_eq!(square_name(0), "a1");
        assert_eq!(square_name(63), "h8");
        assert_eq!(parse_square("e4"), Some(28));
        assert_eq!(parse_square("i1"), None);
        assert_eq!(parse_square("a9"), None);
        assert_eq!(parse_square("e"), None);
    }

    #[test]
    fn test_standard_layout() {
        let board = Board::standard();
        assert_eq!(board.piece_at(4), Some((Piece::King, Color::White)));
        assert_eq!(board.piece_at(59), Some((Piece::Queen, Color::Black)));
        assert_eq!(board.piece_at(28), None);
        assert_eq!(board.occupancy().count_ones(), 32);
        assert_eq!(board.king_square(Color::Black), Some(60));
    }

    #[test]
    fn test_squares_iterates_low_to_high() {
        let found: Vec<Square> = squares(0x8000_0000_0000_0081).collect();
        assert_eq!(found, vec![0, 7, 63]);
    }

    #[test]
    fn test_display_shows_white_on_bottom() {
        let text = Board::standard().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "r n b q k b n r");
        assert_eq!(lines[7], "R N B Q K B N R");
    }
}
