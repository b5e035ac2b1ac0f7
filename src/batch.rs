//! Batch coordination: run one pipeline per input path and report progress.
//!
//! Every item moves through a fixed lifecycle:
//!
//! ```text
//! pending → processing → completed
//!                      ↘ error
//! ```
//!
//! Each transition out of `pending` emits a [`BatchProgress`] event carrying
//! the item's index, fixed when the batch starts. A failing item ends in
//! `error` with its message; the remaining items still run and nothing
//! already written is rolled back.
//!
//! ## Parallelism
//!
//! With one worker, items run in input order on the calling thread and events
//! arrive in index order. With more, items run on a dedicated
//! [rayon](https://docs.rs/rayon) pool of that size; events may interleave
//! but each one names its index, and the final [`BatchReport`] is always in
//! index order.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// One progress event, as emitted to the caller's channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchProgress<T> {
    pub index: usize,
    pub total: usize,
    pub file_path: PathBuf,
    pub status: BatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// State of a single path within a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem<T> {
    pub index: usize,
    pub path: PathBuf,
    pub status: BatchStatus,
    pub result: Option<T>,
    pub error: Option<String>,
}

impl<T> BatchItem<T> {
    pub fn new(index: usize, path: PathBuf) -> Self {
        Self {
            index,
            path,
            status: BatchStatus::Pending,
            result: None,
            error: None,
        }
    }

    /// `pending → processing`. Returns false (and changes nothing) from any
    /// other state.
    pub fn start(&mut self) -> bool {
        self.transition(BatchStatus::Pending, BatchStatus::Processing)
    }

    /// `processing → completed`.
    pub fn complete(&mut self, result: T) -> bool {
        let moved = self.transition(BatchStatus::Processing, BatchStatus::Completed);
        if moved {
            self.result = Some(result);
        }
        moved
    }

    /// `processing → error`.
    pub fn fail(&mut self, message: String) -> bool {
        let moved = self.transition(BatchStatus::Processing, BatchStatus::Error);
        if moved {
            self.error = Some(message);
        }
        moved
    }

    fn transition(&mut self, from: BatchStatus, to: BatchStatus) -> bool {
        if self.status != from {
            return false;
        }
        self.status = to;
        true
    }
}

impl<T: Clone> BatchItem<T> {
    fn progress(&self, total: usize) -> BatchProgress<T> {
        BatchProgress {
            index: self.index,
            total,
            file_path: self.path.clone(),
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}

/// Final state of every item, in index order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport<T> {
    pub items: Vec<BatchItem<T>>,
}

impl<T> BatchReport<T> {
    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn completed(&self) -> usize {
        self.count(BatchStatus::Completed)
    }

    pub fn failed(&self) -> usize {
        self.count(BatchStatus::Error)
    }

    fn count(&self, status: BatchStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }
}

/// Run `processor` once per path.
///
/// `workers` of 0 or 1 runs sequentially. Errors from `processor` are
/// rendered with `Display` into the item's message and never stop the batch.
pub fn run_batch<T, E, F>(
    paths: &[PathBuf],
    workers: usize,
    processor: F,
    progress: Option<Sender<BatchProgress<T>>>,
) -> BatchReport<T>
where
    T: Clone + Send,
    E: std::fmt::Display,
    F: Fn(&Path) -> Result<T, E> + Sync,
{
    let total = paths.len();
    log::info!("batch of {} item(s), {} worker(s)", total, workers.max(1));

    let run_one = |index: usize, path: &PathBuf, sink: &Option<Sender<BatchProgress<T>>>| {
        let mut item = BatchItem::new(index, path.clone());
        item.start();
        emit(sink, item.progress(total));

        match processor(path.as_path()) {
            Ok(result) => {
                item.complete(result);
            }
            Err(e) => {
                log::warn!("{}: {}", path.display(), e);
                item.fail(e.to_string());
            }
        }
        emit(sink, item.progress(total));
        item
    };

    let items = if workers <= 1 {
        sequential(paths, &progress, &run_one)
    } else {
        match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(|| {
                use rayon::prelude::*;
                paths
                    .par_iter()
                    .enumerate()
                    .map_with(progress.clone(), |sink, (index, path)| {
                        run_one(index, path, &*sink)
                    })
                    .collect()
            }),
            Err(e) => {
                log::warn!("could not start {workers} workers ({e}); running sequentially");
                sequential(paths, &progress, &run_one)
            }
        }
    };

    let report = BatchReport { items };
    log::info!(
        "batch finished: {} completed, {} failed",
        report.completed(),
        report.failed()
    );
    report
}

fn sequential<T, R>(
    paths: &[PathBuf],
    sink: &Option<Sender<BatchProgress<T>>>,
    run_one: &R,
) -> Vec<BatchItem<T>>
where
    R: Fn(usize, &PathBuf, &Option<Sender<BatchProgress<T>>>) -> BatchItem<T>,
{
    paths
        .iter()
        .enumerate()
        .map(|(index, path)| run_one(index, path, sink))
        .collect()
}

/// A dropped receiver only means nobody is listening.
fn emit<T>(sink: &Option<Sender<BatchProgress<T>>>, event: BatchProgress<T>) {
    if let Some(tx) = sink {
        tx.send(event).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn paths(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("img-{i}.png"))).collect()
    }

    fn fail_on(k: usize) -> impl Fn(&Path) -> Result<usize, String> + Sync {
        move |path: &Path| {
            let name = path.to_string_lossy();
            if name == format!("img-{k}.png") {
                Err(format!("cannot read {name}"))
            } else {
                Ok(name.len())
            }
        }
    }

    fn collect_events(
        workers: usize,
        n: usize,
        k: usize,
    ) -> (BatchReport<usize>, Vec<BatchProgress<usize>>) {
        let (tx, rx) = mpsc::channel();
        let report = run_batch(&paths(n), workers, fail_on(k), Some(tx));
        (report, rx.into_iter().collect())
    }

    // =========================================================================
    // Item lifecycle
    // =========================================================================

    #[test]
    fn item_follows_lifecycle() {
        let mut item: BatchItem<u32> = BatchItem::new(0, PathBuf::from("a.png"));
        assert_eq!(item.status, BatchStatus::Pending);
        assert!(!item.complete(1), "cannot complete before starting");
        assert!(item.start());
        assert!(!item.start(), "start is one-time");
        assert!(item.complete(7));
        assert_eq!(item.result, Some(7));
        assert!(!item.fail("late".into()), "terminal states are final");
        assert_eq!(item.status, BatchStatus::Completed);
        assert_eq!(item.error, None);
    }

    #[test]
    fn item_failure_records_message() {
        let mut item: BatchItem<u32> = BatchItem::new(3, PathBuf::from("b.png"));
        item.start();
        assert!(item.fail("boom".into()));
        assert_eq!(item.status, BatchStatus::Error);
        assert_eq!(item.error.as_deref(), Some("boom"));
        assert!(item.status.is_terminal());
    }

    // =========================================================================
    // Sequential batches
    // =========================================================================

    #[test]
    fn failure_is_isolated_to_its_item() {
        let (report, events) = collect_events(1, 5, 2);

        let terminal: Vec<_> = events.iter().filter(|e| e.status.is_terminal()).collect();
        assert_eq!(terminal.len(), 5);
        let errors: Vec<_> = terminal
            .iter()
            .filter(|e| e.status == BatchStatus::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].index, 2);
        assert_eq!(errors[0].error.as_deref(), Some("cannot read img-2.png"));

        assert_eq!(report.completed(), 4);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn sequential_events_are_in_index_order() {
        let (_, events) = collect_events(1, 3, 99);
        let seen: Vec<_> = events.iter().map(|e| (e.index, e.status)).collect();
        assert_eq!(
            seen,
            vec![
                (0, BatchStatus::Processing),
                (0, BatchStatus::Completed),
                (1, BatchStatus::Processing),
                (1, BatchStatus::Completed),
                (2, BatchStatus::Processing),
                (2, BatchStatus::Completed),
            ]
        );
        assert!(events.iter().all(|e| e.total == 3));
    }

    #[test]
    fn completed_event_carries_result() {
        let (_, events) = collect_events(1, 1, 99);
        assert_eq!(events[1].result, Some("img-0.png".len()));
        assert_eq!(events[1].file_path, PathBuf::from("img-0.png"));
    }

    #[test]
    fn batch_without_listener() {
        let report = run_batch(&paths(3), 1, fail_on(0), None);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.total(), 3);
    }

    #[test]
    fn empty_batch() {
        let report = run_batch(&[], 4, fail_on(0), None);
        assert_eq!(report.total(), 0);
    }

    // =========================================================================
    // Parallel batches
    // =========================================================================

    #[test]
    fn parallel_events_keep_stable_indices() {
        let (report, events) = collect_events(4, 20, 13);

        let terminal: Vec<_> = events.iter().filter(|e| e.status.is_terminal()).collect();
        assert_eq!(terminal.len(), 20);
        for event in &terminal {
            assert_eq!(event.file_path, PathBuf::from(format!("img-{}.png", event.index)));
            let expected = if event.index == 13 {
                BatchStatus::Error
            } else {
                BatchStatus::Completed
            };
            assert_eq!(event.status, expected);
        }

        let indices: Vec<_> = report.items.iter().map(|i| i.index).collect();
        assert_eq!(indices, (0..20).collect::<Vec<_>>());
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn parallel_item_is_processing_before_terminal() {
        let (_, events) = collect_events(3, 6, 99);
        for index in 0..6 {
            let statuses: Vec<_> = events
                .iter()
                .filter(|e| e.index == index)
                .map(|e| e.status)
                .collect();
            assert_eq!(statuses, vec![BatchStatus::Processing, BatchStatus::Completed]);
        }
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    #[test]
    fn progress_serializes_lowercase_status() {
        let event = BatchProgress::<u32> {
            index: 1,
            total: 2,
            file_path: PathBuf::from("x.png"),
            status: BatchStatus::Error,
            result: None,
            error: Some("bad".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "bad");
        assert!(json.get("result").is_none());
    }
}
