//! Game driver: owns the move list and asks players for moves in turn.

use crate::board::Color;
use crate::error::Result;
use crate::movegen::Move;
use crate::position::{Position, TerminalStatus};
use crate::search::Searcher;
use std::fmt;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            GameResult::WhiteWins => "1-0",
            GameResult::BlackWins => "0-1",
            GameResult::Draw => "1/2-1/2",
        };
        write!(f, "{}", text)
    }
}

pub trait Player {
    fn name(&self) -> &str;

    /// Picks a move for the side to move. Only called on non-terminal positions.
    fn choose_move(&mut self, position: &Position) -> Result<Move>;
}

/// A player backed by the alpha-beta search.
#[derive(Debug, Clone)]
pub struct SearchPlayer {
    name: String,
    searcher: Searcher,
    depth_limit: u32,
    time_limit: Option<Duration>,
}

impl SearchPlayer {
    pub fn new(
        name: impl Into<String>,
        searcher: Searcher,
        depth_limit: u32,
        time_limit: Option<Duration>,
    ) -> Self {
        Self {
            name: name.into(),
            searcher,
            depth_limit,
            time_limit,
        }
    }
}

impl Player for SearchPlayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn choose_move(&mut self, position: &Position) -> Result<Move> {
        self.searcher
            .search(position, self.depth_limit, self.time_limit)
            .map(|result| result.best_move)
    }
}

#[derive(Debug, Clone)]
pub struct Game {
    start: Position,
    position: Position,
    moves: Vec<Move>,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    pub fn new() -> Self {
        Self::from_position(Position::new())
    }

    pub fn from_position(position: Position) -> Self {
        Self {
            start: position.clone(),
            position,
            moves: Vec::new(),
        }
    }

    pub fn start_position(&self) -> &Position {
        &self.start
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    /// Plays `mv` if it is legal and returns the status of the new position.
    pub fn play(&mut self, mv: &Move) -> Result<TerminalStatus> {
        self.position = self.position.apply(mv)?;
        self.moves.push(*mv);
        Ok(self.position.terminal_status())
    }

    pub fn play_uci(&mut self, text: &str) -> Result<TerminalStatus> {
        let mv = self.position.parse_move(text)?;
        self.play(&mv)
    }

    pub fn status(&self) -> TerminalStatus {
        self.position.terminal_status()
    }

    pub fn result(&self) -> Option<GameResult> {
        let status = self.status();
        if status.is_draw() {
            return Some(GameResult::Draw);
        }
        match status {
            TerminalStatus::Checkmate => Some(match self.position.side_to_move() {
                Color::White => GameResult::BlackWins,
                Color::Black => GameResult::WhiteWins,
            }),
            _ => None,
        }
    }

    /// Alternates between the players until the game ends or `max_plies`
    /// moves have been played. `None` means the game was cut off unfinished.
    pub fn play_out(
        &mut self,
        white: &mut dyn Player,
        black: &mut dyn Player,
        max_plies: usize,
    ) -> Result<Option<GameResult>> {
        loop {
            let status = self.status();
            if status.is_terminal() {
                let result = self.result();
                if let Some(result) = result {
                    info!(%result, ?status, plies = self.moves.len(), "game over");
                }
                return Ok(result);
            }
            if self.moves.len() >= max_plies {
                info!(plies = self.moves.len(), "ply limit reached");
                return Ok(None);
            }

            let player: &mut dyn Player = match self.position.side_to_move() {
                Color::White => &mut *white,
                Color::Black => &mut *black,
            };
            let mv = player.choose_move(&self.position)?;
            info!(ply = self.moves.len() + 1, player = player.name(), mv = %mv, "move played");
            self.play(&mv)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChessError;

    struct ScriptedPlayer {
        moves: Vec<&'static str>,
        next: usize,
    }

    impl ScriptedPlayer {
        fn new(moves: Vec<&'static str>) -> Self {
            Self { moves, next: 0 }
        }
    }

    impl Player for ScriptedPlayer {
        fn name(&self) -> &str {
            "script"
        }

        fn choose_move(&mut self, position: &Position) -> Result<Move> {
            let text = self.moves.get(self.next).ok_or(ChessError::NoLegalMoves)?;
            self.next += 1;
            position.parse_move(text)
        }
    }

    #[test]
    fn test_fools_mate_ends_the_game() {
        let mut white = ScriptedPlayer::new(vec!["f2f3", "g2g4"]);
        let mut black = ScriptedPlayer::new(vec!["e7e5", "d8h4"]);
        let mut game = Game::new();
        let result = game.play_out(&mut white, &mut black, 100).unwrap();
        assert_eq!(result, Some(GameResult::BlackWins));
        assert_eq!(game.status(), TerminalStatus::Checkmate);
        assert_eq!(game.moves().len(), 4);
    }

    #[test]
    fn test_illegal_move_is_rejected_and_game_unchanged() {
        let mut game = Game::new();
        let err = game.play_uci("e2e5").unwrap_err();
        assert!(matches!(err, ChessError::IllegalMove { .. }));
        assert!(game.moves().is_empty());
        assert_eq!(game.position(), game.start_position());
    }

    #[test]
    fn test_repetition_draw() {
        let mut game = Game::new();
        for _ in 0..2 {
            for mv in ["g1f3", "g8f6", "f3g1", "f6g8"] {
                game.play_uci(mv).unwrap();
            }
        }
        assert_eq!(game.status(), TerminalStatus::ThreefoldRepetition);
        assert_eq!(game.result(), Some(GameResult::Draw));
    }

    #[test]
    fn test_ply_limit_stops_unfinished_game() {
        let searcher = Searcher::new(
            crate::evaluation::Evaluator::material_only(),
            crate::search::SearchConfig::default(),
        );
        let mut white = SearchPlayer::new("white", searcher.clone(), 1, None);
        let mut black = SearchPlayer::new("black", searcher, 1, None);
        let mut game = Game::new();
        assert_eq!(game.play_out(&mut white, &mut black, 6).unwrap(), None);
        assert_eq!(game.moves().len(), 6);
    }

    #[test]
    fn test_result_notation() {
        assert_eq!(GameResult::WhiteWins.to_string(), "1-0");
        assert_eq!(GameResult::BlackWins.to_string(), "0-1");
        assert_eq!(GameResult::Draw.to_string(), "1/2-1/2");
    }
}
