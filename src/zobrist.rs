use crate::board::{Color, Piece, Square};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::LazyLock;

// Fixed seed so hashes, and therefore search results, are reproducible.
const ZOBRIST_SEED: u64 = 0x3C6E_F372_FE94_F82B;

static ZOBRIST_KEYS: LazyLock<ZobristKeys> = LazyLock::new(ZobristKeys::new);

#[derive(Debug, Clone)]
pub struct ZobristKeys {
    pieces: [[[u64; 64]; 6]; 2],
    castling: [u64; 16],
    en_passant_file: [u64; 8],
    black_to_move: u64,
}

pub fn zobrist_keys() -> &'static ZobristKeys {
    &ZOBRIST_KEYS
}

impl ZobristKeys {
    fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(ZOBRIST_SEED);

        let mut pieces = [[[0u64; 64]; 6]; 2];
        for color in pieces.iter_mut() {
            for piece in color.iter_mut() {
                for key in piece.iter_mut() {
                    *key = rng.gen();
                }
            }
        }

        let mut castling = [0u64; 16];
        for key in castling.iter_mut() {
            *key = rng.gen();
        }

        let mut en_passant_file = [0u64; 8];
        for key in en_passant_file.iter_mut() {
            *key = rng.gen();
        }

        Self {
            pieces,
            castling,
            en_passant_file,
            black_to_move: rng.gen(),
        }
    }

    pub fn piece(&self, color: Color, piece: Piece, square: Square) -> u64 {
        self.pieces[color.index()][piece.index()][square as usize]
    }

    /// Key for a full castling-rights bit set (`0..16`).
    pub fn castling(&self, rights: u8) -> u64 {
        self.castling[(rights & 0x0F) as usize]
    }

    pub fn en_passant(&self, file: u8) -> u64 {
        self.en_passant_file[(file & 7) as usize]
    }

    pub fn black_to_move(&self) -> u64 {
        self.black_to_move
    }
}
