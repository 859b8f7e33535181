use crate::board::Color;
use crate::movegen::{Move, MoveGenerator};
use crate::position::Position;
use crate::search::{SearchConfig, SearchResult, Searcher};
use crate::worker::{spawn_search, SearchHandle};
use anyhow::{anyhow, bail, ensure, Context, Result};
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_DEPTH: u32 = 6;
const MAX_DEPTH: u32 = 64;
const MIN_MOVE_TIME: Duration = Duration::from_millis(10);
// How often the command loop checks for a finished search between input lines.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A `go` running on a worker thread.
struct PendingSearch {
    handle: SearchHandle,
    infinite: bool,
}

pub struct UciHandler {
    position: Position,
    searcher: Searcher,
    depth: u32,
    search: Option<PendingSearch>,
}

impl Default for UciHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl UciHandler {
    pub fn new() -> Self {
        UciHandler {
            position: Position::new(),
            searcher: Searcher::default(),
            depth: DEFAULT_DEPTH,
            search: None,
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Reads commands from stdin until `quit` or end of input. A bad command
    /// is logged and skipped. Searches run on a worker thread, so `stop`
    /// and `isready` are answered while one is in flight.
    pub fn run(&mut self) -> Result<()> {
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                if sender.send(line).is_err() {
                    break;
                }
            }
        });
        let mut stdout = io::stdout();

        loop {
            match receiver.recv_timeout(POLL_INTERVAL) {
                Ok(line) => {
                    let line = line.context("failed to read from stdin")?;
                    let command = line.trim();
                    if command == "quit" {
                        if let Some(pending) = self.search.take() {
                            pending.handle.cancel();
                            let _ = pending.handle.join();
                        }
                        break;
                    }
                    match self.handle_command(command) {
                        Ok(response) => write!(stdout, "{}", response)?,
                        Err(err) => warn!(command, "{:#}", err),
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // Input is gone: let a bounded search finish, cut an infinite one.
                    if let Some(infinite) = self.search.as_ref().map(|pending| pending.infinite) {
                        let report = if infinite {
                            self.stop_search()
                        } else {
                            self.wait_for_search()
                        };
                        match report {
                            Ok(report) => write!(stdout, "{}", report)?,
                            Err(err) => warn!("{:#}", err),
                        }
                    }
                    break;
                }
            }

            match self.poll_search() {
                Ok(Some(report)) => write!(stdout, "{}", report)?,
                Ok(None) => {}
                Err(err) => warn!("{:#}", err),
            }
            stdout.flush()?;
        }
        stdout.flush()?;
        Ok(())
    }

    pub fn handle_command(&mut self, command: &str) -> Result<String> {
        let parts: Vec<&str> = command.split_whitespace().collect();
        let Some((&name, args)) = parts.split_first() else {
            return Ok(String::new());
        };
        debug!(command, "uci command");

        match name {
            "uci" => Ok(self.handle_uci()),
            "isready" => Ok("readyok\n".to_string()),
            "ucinewgame" => {
                self.position = Position::new();
                Ok(String::new())
            }
            "position" => {
                self.handle_position(args)?;
                Ok(String::new())
            }
            "setoption" => {
                self.handle_setoption(args)?;
                Ok(String::new())
            }
            "go" => {
                self.handle_go(args)?;
                Ok(String::new())
            }
            "stop" => self.stop_search(),
            "d" => Ok(format!("{}\n", self.position)),
            _ => Ok(String::new()),
        }
    }

    /// The `info`/`bestmove` report of a search that has finished on its own.
    pub fn poll_search(&mut self) -> Result<Option<String>> {
        let finished = self
            .search
            .as_ref()
            .is_some_and(|pending| pending.handle.is_finished());
        if finished {
            self.wait_for_search().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Blocks until the running search completes and returns its report.
    pub fn wait_for_search(&mut self) -> Result<String> {
        match self.search.take() {
            Some(pending) => Ok(report(&pending.handle.join()?)),
            None => Ok(String::new()),
        }
    }

    /// Cancels the running search; the last completed depth is reported.
    fn stop_search(&mut self) -> Result<String> {
        if let Some(pending) = &self.search {
            pending.handle.cancel();
        }
        self.wait_for_search()
    }

    fn handle_uci(&self) -> String {
        format!(
            "id name chessbot {}\n\
             id author chessbot developers\n\
             option name Depth type spin default {} min 1 max {}\n\
             option name Quiescence type check default {}\n\
             uciok\n",
            env!("CARGO_PKG_VERSION"),
            DEFAULT_DEPTH,
            MAX_DEPTH,
            self.searcher.config().quiescence
        )
    }

    /// `position (startpos | fen <fields>) [moves <uci>...]`. The current
    /// position is only replaced when every move applies.
    fn handle_position(&mut self, parts: &[&str]) -> Result<()> {
        let moves_at = parts.iter().position(|&part| part == "moves");
        let (setup, moves) = match moves_at {
            Some(index) => (&parts[..index], &parts[index + 1..]),
            None => (parts, &[][..]),
        };

        let mut position = match setup.split_first() {
            Some((&"startpos", _)) => Position::new(),
            Some((&"fen", fields)) => Position::from_fen(&fields.join(" "))?,
            _ => bail!("expected `startpos` or `fen` in position command"),
        };
        for text in moves {
            let mv = position.parse_move(text)?;
            position = position.apply(&mv)?;
        }

        self.position = position;
        Ok(())
    }

    /// `setoption name <name> [value <value>]`.
    fn handle_setoption(&mut self, parts: &[&str]) -> Result<()> {
        let name_at = parts
            .iter()
            .position(|&part| part == "name")
            .ok_or_else(|| anyhow!("setoption without a name"))?;
        let value_at = parts.iter().position(|&part| part == "value");
        if value_at.is_some_and(|value_at| value_at < name_at) {
            bail!("setoption expects `name` before `value`");
        }
        let name = parts[name_at + 1..value_at.unwrap_or(parts.len())].join(" ");
        let value = value_at
            .map(|index| parts[index + 1..].join(" "))
            .unwrap_or_default();

        match name.to_ascii_lowercase().as_str() {
            "depth" => {
                let depth: u32 = value
                    .parse()
                    .with_context(|| format!("bad depth `{}`", value))?;
                self.depth = checked_depth(depth)?;
            }
            "quiescence" => {
                let enabled: bool = value
                    .parse()
                    .with_context(|| format!("bad quiescence flag `{}`", value))?;
                let config = SearchConfig {
                    quiescence: enabled,
                    ..self.searcher.config().clone()
                };
                self.searcher = Searcher::new(self.searcher.evaluator().clone(), config);
            }
            other => bail!("unknown option `{}`", other),
        }
        Ok(())
    }

    /// Starts a search on a worker thread. The report arrives through
    /// `poll_search`, `wait_for_search` or `stop`.
    fn handle_go(&mut self, parts: &[&str]) -> Result<()> {
        ensure!(self.search.is_none(), "a search is already running");
        let limits = GoLimits::parse(parts)?;
        let depth = match limits.depth {
            Some(depth) => checked_depth(depth)?,
            None if limits.infinite => MAX_DEPTH,
            None => self.depth,
        };
        let time_limit = limits.time_limit(self.position.side_to_move() == Color::White);
        ensure!(
            MoveGenerator::new().has_legal_move(&self.position),
            "no legal moves in this position"
        );

        let handle = spawn_search(
            self.searcher.clone(),
            self.position.clone(),
            depth,
            time_limit,
        );
        self.search = Some(PendingSearch {
            handle,
            infinite: limits.infinite,
        });
        Ok(())
    }
}

fn checked_depth(depth: u32) -> Result<u32> {
    ensure!(
        (1..=MAX_DEPTH).contains(&depth),
        "depth must be between 1 and {}, got {}",
        MAX_DEPTH,
        depth
    );
    Ok(depth)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct GoLimits {
    depth: Option<u32>,
    movetime: Option<u64>,
    wtime: Option<u64>,
    btime: Option<u64>,
    winc: Option<u64>,
    binc: Option<u64>,
    movestogo: Option<u64>,
    infinite: bool,
}

impl GoLimits {
    fn parse(parts: &[&str]) -> Result<Self> {
        let mut limits = GoLimits::default();
        let mut tokens = parts.iter();
        while let Some(&token) = tokens.next() {
            if token == "infinite" {
                limits.infinite = true;
                continue;
            }
            let Some(&value) = tokens.next() else {
                bail!("missing value for `{}`", token);
            };
            let number = || {
                value
                    .parse::<u64>()
                    .with_context(|| format!("bad value `{}` for `{}`", value, token))
            };
            match token {
                "depth" => {
                    let depth = u32::try_from(number()?)
                        .with_context(|| format!("depth `{}` out of range", value))?;
                    limits.depth = Some(depth);
                }
                "movetime" => limits.movetime = Some(number()?),
                "wtime" => limits.wtime = Some(number()?),
                "btime" => limits.btime = Some(number()?),
                "winc" => limits.winc = Some(number()?),
                "binc" => limits.binc = Some(number()?),
                "movestogo" => limits.movestogo = Some(number()?),
                _ => {}
            }
        }
        Ok(limits)
    }

    /// Budget for this move: `movetime` if given, otherwise a slice of the
    /// mover's clock plus half its increment.
    fn time_limit(&self, white_to_move: bool) -> Option<Duration> {
        if self.infinite {
            return None;
        }
        if let Some(movetime) = self.movetime {
            return Some(Duration::from_millis(movetime).max(MIN_MOVE_TIME));
        }
        let (remaining, increment) = if white_to_move {
            (self.wtime?, self.winc.unwrap_or(0))
        } else {
            (self.btime?, self.binc.unwrap_or(0))
        };
        let moves_left = self.movestogo.unwrap_or(20).max(1);
        let budget = (remaining / moves_left).saturating_add(increment / 2);
        Some(Duration::from_millis(budget.min(remaining / 2)).max(MIN_MOVE_TIME))
    }
}

fn info_line(result: &SearchResult) -> String {
    let score = match result.mate_in() {
        Some(plies) if plies > 0 => format!("mate {}", (plies + 1) / 2),
        Some(plies) => format!("mate {}", -((-plies + 1) / 2)),
        None => format!("cp {}", result.score),
    };
    format!(
        "info depth {} score {} nodes {} time {} pv {}",
        result.depth,
        score,
        result.nodes,
        result.elapsed.as_millis(),
        format_pv(&[result.best_move])
    )
}

fn report(result: &SearchResult) -> String {
    format!("{}\nbestmove {}\n", info_line(result), result.best_move)
}

fn format_pv(moves: &[Move]) -> String {
    moves
        .iter()
        .map(Move::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uci_handshake() {
        let mut handler = UciHandler::new();
        let response = handler.handle_command("uci").unwrap();
        assert!(response.starts_with("id name chessbot"));
        assert!(response.ends_with("uciok\n"));
        assert_eq!(handler.handle_command("isready").unwrap(), "readyok\n");
        assert_eq!(handler.handle_command("").unwrap(), "");
    }

    #[test]
    fn test_position_startpos_with_moves() {
        let mut handler = UciHandler::new();
        handler
            .handle_command("position startpos moves e2e4 e7e5 g1f3")
            .unwrap();
        assert_eq!(
            handler.position().to_fen(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2"
        );
    }

    #[test]
    fn test_position_fen_with_moves() {
        let mut handler = UciHandler::new();
        handler
            .handle_command("position fen 4k3/8/8/8/8/8/4P3/4K3 w - - 0 1 moves e2e4")
            .unwrap();
        assert_eq!(handler.position().to_fen(), "4k3/8/8/8/4P3/8/8/4K3 b - - 0 1");
    }

    #[test]
    fn test_bad_position_keeps_previous_one() {
        let mut handler = UciHandler::new();
        handler.handle_command("position startpos moves e2e4").unwrap();
        let before = handler.position().clone();
        assert!(handler.handle_command("position startpos moves e2e4 e2e4").is_err());
        assert!(handler.handle_command("position fen not a fen").is_err());
        assert!(handler.handle_command("position").is_err());
        assert_eq!(handler.position(), &before);
    }

    #[test]
    fn test_go_depth_reports_best_move() {
        let mut handler = UciHandler::new();
        handler
            .handle_command("position fen 6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1")
            .unwrap();
        assert_eq!(handler.handle_command("go depth 3").unwrap(), "");
        let response = handler.wait_for_search().unwrap();
        assert!(response.contains("score mate 1"));
        assert!(response.ends_with("bestmove a1a8\n"));
        assert_eq!(handler.poll_search().unwrap(), None);
    }

    #[test]
    fn test_go_infinite_until_stop() {
        let mut handler = UciHandler::new();
        handler.handle_command("position startpos moves e2e4").unwrap();
        assert_eq!(handler.handle_command("go infinite").unwrap(), "");
        assert_eq!(handler.handle_command("isready").unwrap(), "readyok\n");
        assert!(handler.handle_command("go depth 2").is_err());
        thread::sleep(Duration::from_millis(50));

        let response = handler.handle_command("stop").unwrap();
        let best = response
            .lines()
            .find_map(|line| line.strip_prefix("bestmove "))
            .unwrap();
        assert!(handler.position().parse_move(best).is_ok());
        assert_eq!(handler.handle_command("stop").unwrap(), "");
    }

    #[test]
    fn test_finished_search_is_picked_up_by_poll() {
        let mut handler = UciHandler::new();
        handler.handle_command("go depth 1").unwrap();
        let report = loop {
            if let Some(report) = handler.poll_search().unwrap() {
                break report;
            }
            thread::sleep(Duration::from_millis(5));
        };
        assert!(report.starts_with("info depth 1 "));
        assert!(report.contains("bestmove "));
    }

    #[test]
    fn test_go_on_finished_game_is_an_error() {
        let mut handler = UciHandler::new();
        handler
            .handle_command("position startpos moves f2f3 e7e5 g2g4 d8h4")
            .unwrap();
        assert!(handler.handle_command("go depth 2").is_err());
    }

    #[test]
    fn test_setoption() {
        let mut handler = UciHandler::new();
        handler.handle_command("setoption name Depth value 2").unwrap();
        assert_eq!(handler.depth, 2);
        handler
            .handle_command("setoption name Quiescence value false")
            .unwrap();
        assert!(!handler.searcher.config().quiescence);
        assert!(handler.handle_command("setoption name Depth value 0").is_err());
        assert!(handler.handle_command("setoption name Depth value 200").is_err());
        assert!(handler.handle_command("setoption value 3 name Depth").is_err());
        assert!(handler.handle_command("setoption name Colour value red").is_err());
        assert_eq!(handler.depth, 2);
        assert!(handler.handle_command("go depth 65").is_err());
    }

    #[test]
    fn test_go_limits() {
        let limits =
            GoLimits::parse(&["wtime", "60000", "btime", "30000", "winc", "1000"]).unwrap();
        assert_eq!(limits.time_limit(true), Some(Duration::from_millis(3500)));
        assert_eq!(limits.time_limit(false), Some(Duration::from_millis(1500)));

        let limits = GoLimits::parse(&["movetime", "250", "depth", "5"]).unwrap();
        assert_eq!(limits.depth, Some(5));
        assert_eq!(limits.time_limit(true), Some(Duration::from_millis(250)));

        let limits = GoLimits::parse(&["infinite"]).unwrap();
        assert_eq!(limits.time_limit(true), None);
        assert!(GoLimits::parse(&["depth"]).is_err());
        assert!(GoLimits::parse(&["depth", "x"]).is_err());
        assert!(GoLimits::parse(&["depth", "4294967297"]).is_err());
    }
}
