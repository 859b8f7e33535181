use anyhow::{ensure, Context, Result};
use chessbot::game::{Game, SearchPlayer};
use chessbot::movegen::MoveGenerator;
use chessbot::position::{Position, STARTING_FEN};
use chessbot::search::Searcher;
use chessbot::uci::UciHandler;
use clap::{Parser, Subcommand};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chessbot")]
#[command(about = "Bounded-depth alpha-beta chess bot", long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Speak UCI on stdin/stdout (the default)
    Uci,
    /// Let the engine play both sides
    Selfplay {
        #[arg(short, long, default_value = "4")]
        depth: u32,
        /// Per-move time limit in milliseconds
        #[arg(long)]
        movetime_ms: Option<u64>,
        #[arg(long, default_value = "200")]
        max_plies: usize,
        #[arg(long, default_value = STARTING_FEN)]
        fen: String,
    },
    /// Count leaf nodes of the legal move tree
    Perft {
        #[arg(short, long, default_value = "4")]
        depth: u32,
        #[arg(long, default_value = STARTING_FEN)]
        fen: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Command::Uci) {
        Command::Uci => UciHandler::new().run(),
        Command::Selfplay {
            depth,
            movetime_ms,
            max_plies,
            fen,
        } => selfplay(&fen, depth, movetime_ms.map(Duration::from_millis), max_plies),
        Command::Perft { depth, fen } => perft(&fen, depth),
    }
}

fn selfplay(fen: &str, depth: u32, time_limit: Option<Duration>, max_plies: usize) -> Result<()> {
    let position = Position::from_fen(fen)?;
    let mut white = SearchPlayer::new("white", Searcher::default(), depth, time_limit);
    let mut black = SearchPlayer::new("black", Searcher::default(), depth, time_limit);
    let mut game = Game::from_position(position);

    let result = game.play_out(&mut white, &mut black, max_plies)?;

    let moves: Vec<String> = game.moves().iter().map(|mv| mv.to_string()).collect();
    println!("{}", moves.join(" "));
    println!("{}", game.position());
    match result {
        Some(result) => println!("{} ({:?})", result, game.status()),
        None => println!("* (stopped after {} plies)", game.moves().len()),
    }
    Ok(())
}

fn perft(fen: &str, depth: u32) -> Result<()> {
    ensure!(depth > 0, "perft depth must be at least 1");
    let position = Position::from_fen(fen)?;
    let generator = MoveGenerator::new();
    let started = Instant::now();

    let mut total = 0;
    for mv in generator.legal_moves(&position) {
        let child = position.apply(&mv)?;
        let count = if depth > 1 { generator.perft(&child, depth - 1) } else { 1 };
        println!("{}: {}", mv, count);
        total += count;
    }

    println!("\nNodes searched: {}", total);
    println!("Time: {:?}", started.elapsed());
    Ok(())
}
