pub mod board;
pub mod error;
pub mod evaluation;
pub mod game;
pub mod movegen;
pub mod position;
pub mod search;
pub mod transposition;
pub mod uci;
pub mod worker;
pub mod zobrist;

pub use board::{Board, Color, Piece, Square};
pub use error::{ChessError, Result};
pub use evaluation::{EvalWeights, Evaluator, Score};
pub use game::{Game, GameResult, Player, SearchPlayer};
pub use movegen::{Move, MoveGenerator};
pub use position::{Position, TerminalStatus};
pub use search::{SearchConfig, SearchResult, Searcher};
pub use worker::{spawn_search, SearchHandle};

#[cfg(test)]
mod tests {
    use super::*;
    use evaluation::MATE_SCORE;

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    const POSITION_3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
    const POSITION_4: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
    const POSITION_5: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";

    fn play(moves: &[&str]) -> Position {
        let mut position = Position::new();
        for text in moves {
            let mv = position.parse_move(text).unwrap();
            position = position.apply(&mv).unwrap();
        }
        position
    }

    #[test]
    fn test_perft_suite() {
        let generator = MoveGenerator::new();
        let cases = [
            (KIWIPETE, 1, 48),
            (KIWIPETE, 2, 2039),
            (POSITION_3, 1, 14),
            (POSITION_3, 2, 191),
            (POSITION_3, 3, 2812),
            (POSITION_4, 1, 6),
            (POSITION_4, 2, 264),
            (POSITION_5, 1, 44),
            (POSITION_5, 2, 1486),
        ];
        for (fen, depth, expected) in cases {
            let position = Position::from_fen(fen).unwrap();
            assert_eq!(generator.perft(&position, depth), expected, "{} depth {}", fen, depth);
        }
    }

    #[test]
    fn test_initial_position() {
        let position = Position::new();
        assert_eq!(position.terminal_status(), TerminalStatus::None);
        assert_eq!(MoveGenerator::new().legal_moves(&position).len(), 20);
        assert_eq!(Evaluator::new().evaluate(&position), 0);
    }

    #[test]
    fn test_fools_mate() {
        let position = play(&["f2f3", "e7e5", "g2g4", "d8h4"]);
        assert!(MoveGenerator::new().legal_moves(&position).is_empty());
        assert!(position.is_in_check(Color::White));
        assert_eq!(position.terminal_status(), TerminalStatus::Checkmate);
        assert_eq!(Evaluator::new().evaluate(&position), -MATE_SCORE);
    }

    #[test]
    fn test_stalemate() {
        let position = Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert!(!position.is_in_check(Color::Black));
        assert_eq!(position.terminal_status(), TerminalStatus::Stalemate);
        assert_eq!(Evaluator::new().evaluate(&position), 0);
    }

    #[test]
    fn test_castling_through_game() {
        let position = play(&["e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "g8f6", "e1g1"]);
        assert_eq!(position.board().piece_at(6), Some((Piece::King, Color::White)));
        assert_eq!(position.board().piece_at(5), Some((Piece::Rook, Color::White)));
        assert!(!position.castling_rights().has(position::CastlingRights::WHITE_KINGSIDE));
        assert!(position.castling_rights().has(position::CastlingRights::BLACK_KINGSIDE));
    }

    #[test]
    fn test_legal_moves_never_leave_king_in_check() {
        let generator = MoveGenerator::new();
        for fen in [KIWIPETE, POSITION_3, POSITION_4, POSITION_5] {
            let position = Position::from_fen(fen).unwrap();
            let mover = position.side_to_move();
            for mv in generator.legal_moves(&position) {
                let child = position.apply(&mv).unwrap();
                assert!(!child.is_in_check(mover), "{} leaves king in check in {}", mv, fen);
            }
        }
    }

    #[test]
    fn test_search_finds_fools_mate() {
        let position = play(&["f2f3", "e7e5", "g2g4"]);
        let result = Searcher::default().search(&position, 3, None).unwrap();
        assert_eq!(result.best_move.to_string(), "d8h4");
        assert_eq!(result.mate_in(), Some(1));
    }

    #[test]
    fn test_search_move_is_always_legal() {
        let searcher = Searcher::default();
        for fen in [KIWIPETE, POSITION_3, POSITION_4, POSITION_5] {
            let position = Position::from_fen(fen).unwrap();
            let result = searcher.search(&position, 3, None).unwrap();
            assert!(position.apply(&result.best_move).is_ok(), "{}", fen);
            assert!(result.depth >= 1 && result.depth <= 3);
        }
    }

    #[test]
    fn test_search_avoids_repetition_when_winning() {
        // White is a queen up; shuffling back to a repeated position scores as a draw.
        let mut position = Position::from_fen("4k3/8/8/8/8/8/8/Q3K3 w - - 0 1").unwrap();
        for text in ["a1a2", "e8d8", "a2a1", "d8e8"] {
            let mv = position.parse_move(text).unwrap();
            position = position.apply(&mv).unwrap();
        }
        let result = Searcher::default().search(&position, 3, None).unwrap();
        let child = position.apply(&result.best_move).unwrap();
        assert_eq!(child.repetition_count(), 1);
        assert!(result.score > 500);
    }
}
