//! Sharing one size measurement between concurrent callers.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

/// Measurements currently running, keyed by path.
///
/// The first caller for a path runs the measurement; callers arriving
/// while it runs block on the same slot and receive its outcome. The slot
/// is released once the measurement finishes, so later calls measure
/// again (or hit a cache).
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    slots: DashMap<PathBuf, Arc<OnceLock<Option<u64>>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `measure` for `path`, or join a run already in progress.
    ///
    /// The caller that ran the measurement gets its error back as
    /// `Err(Some(_))`; a caller that only waited for a failed run gets
    /// `Err(None)`.
    pub fn run<E>(
        &self,
        path: &Path,
        measure: impl FnOnce() -> Result<u64, E>,
    ) -> Result<u64, Option<E>> {
        let slot = Arc::clone(&*self.slots.entry(path.to_path_buf()).or_default());

        let mut own_outcome = None;
        let shared = *slot.get_or_init(|| {
            let outcome = measure();
            let size = outcome.as_ref().ok().copied();
            own_outcome = Some(outcome);
            size
        });

        self.slots.remove_if(path, |_, current| Arc::ptr_eq(current, &slot));

        match own_outcome {
            Some(outcome) => outcome.map_err(Some),
            None => shared.ok_or(None),
        }
    }

    /// Number of measurements still running.
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_concurrent_callers_share_one_run() {
        let inflight = InFlight::new();
        let runs = AtomicUsize::new(0);
        let barrier = Barrier::new(4);

        let results: Vec<Result<u64, Option<()>>> = thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        inflight.run(Path::new("/shared"), || {
                            runs.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(300));
                            Ok(42)
                        })
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| *r == Ok(42)));
        assert_eq!(inflight.len(), 0);
    }

    #[test]
    fn test_owner_keeps_its_error() {
        let inflight = InFlight::new();
        let result: Result<u64, Option<&str>> = inflight.run(Path::new("/x"), || Err("boom"));
        assert_eq!(result, Err(Some("boom")));
        assert_eq!(inflight.len(), 0);
    }

    #[test]
    fn test_sequential_calls_measure_again() {
        let inflight = InFlight::new();
        let runs = AtomicUsize::new(0);
        for _ in 0..3 {
            let size = inflight.run(Path::new("/y"), || {
                Ok::<_, ()>(runs.fetch_add(1, Ordering::SeqCst) as u64)
            });
            assert!(size.is_ok());
        }
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
