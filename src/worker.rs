//! Runs a search on a background thread so the caller can stop it early.

use crate::error::{ChessError, Result};
use crate::position::Position;
use crate::search::{SearchResult, Searcher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

pub struct SearchHandle {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Result<SearchResult>>,
}

impl SearchHandle {
    /// Asks the search to stop. The result of the last completed depth is
    /// still delivered by [`SearchHandle::join`].
    pub fn cancel(&self) {
        debug!("search cancelled");
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> Result<SearchResult> {
        self.handle.join().map_err(|_| {
            ChessError::InvariantViolation("search thread panicked".to_string())
        })?
    }
}

/// Starts `searcher` on a copy of `position`. The searcher's stop flag is
/// cleared first and shared with the returned handle.
pub fn spawn_search(
    searcher: Searcher,
    position: Position,
    depth_limit: u32,
    time_limit: Option<Duration>,
) -> SearchHandle {
    let stop = searcher.stop_signal();
    stop.store(false, Ordering::Relaxed);

    let handle = thread::spawn(move || searcher.search(&position, depth_limit, time_limit));
    SearchHandle { stop, handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::Evaluator;
    use crate::search::SearchConfig;

    #[test]
    fn test_cancel_returns_completed_depth() {
        let handle = spawn_search(Searcher::default(), Position::new(), 64, None);
        thread::sleep(Duration::from_millis(100));
        handle.cancel();
        let result = handle.join().unwrap();
        assert!(result.depth >= 1);
        assert!(result.depth < 64);
        assert!(Position::new().apply(&result.best_move).is_ok());
    }

    #[test]
    fn test_finishes_without_cancel() {
        let searcher = Searcher::new(Evaluator::material_only(), SearchConfig::default());
        let handle = spawn_search(searcher, Position::new(), 2, None);
        let result = handle.join().unwrap();
        assert_eq!(result.depth, 2);
    }

    #[test]
    fn test_stale_stop_flag_is_cleared() {
        let stop = Arc::new(AtomicBool::new(true));
        let searcher = Searcher::default().with_stop_signal(Arc::clone(&stop));
        let result = spawn_search(searcher, Position::new(), 3, None).join().unwrap();
        assert_eq!(result.depth, 3);
        assert!(!stop.load(Ordering::Relaxed));
    }

    #[test]
    fn test_errors_come_back_through_join() {
        let result = spawn_search(Searcher::default(), Position::new(), 0, None).join();
        assert!(matches!(result, Err(ChessError::InvalidArgument(_))));
    }
}
