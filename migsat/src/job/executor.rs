use super::{LongRunningMethod, Monitor};
use crate::error::AnalysisError;
use log::{debug, warn};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// The grace period a cancelled worker gets before it is detached.
pub const DEFAULT_CANCELING_TIME: Duration = Duration::from_millis(300);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs a method on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl InlineExecutor {
    pub fn run<M: LongRunningMethod>(
        &self,
        method: &mut M,
        monitor: &Monitor<M::Partial>,
    ) -> Result<M::Output, AnalysisError> {
        monitor.check_cancel()?;
        let result = method.execute(monitor)?;
        monitor.done();
        Ok(result)
    }
}

/// Runs a method on a dedicated worker thread that can be abandoned.
///
/// On timeout or cancellation the worker is asked to stop through its own cancel token.
/// A worker that has not returned within the canceling time is detached and whatever it
/// produces later is discarded.
#[derive(Debug, Clone)]
pub struct StoppableExecutor {
    name: String,
    timeout: Option<Duration>,
    canceling_time: Duration,
}

impl Default for StoppableExecutor {
    fn default() -> Self {
        Self::new("migsat-worker")
    }
}

impl StoppableExecutor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timeout: None,
            canceling_time: DEFAULT_CANCELING_TIME,
        }
    }

    /// A zero timeout means no timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|timeout| !timeout.is_zero());
        self
    }

    pub fn with_canceling_time(mut self, canceling_time: Duration) -> Self {
        self.canceling_time = canceling_time;
        self
    }

    pub fn has_timeout(&self) -> bool {
        self.timeout.is_some()
    }

    pub fn run<M>(
        &self,
        mut method: M,
        monitor: &Monitor<M::Partial>,
    ) -> Result<M::Output, AnalysisError>
    where
        M: LongRunningMethod + 'static,
    {
        monitor.check_cancel()?;

        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let mut worker_monitor = monitor.child();
        if let Some(deadline) = deadline {
            worker_monitor = worker_monitor.with_deadline(deadline);
        }

        let (sender, receiver) = mpsc::channel();
        let worker = worker_monitor.clone();
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let result = method.execute(&worker);
                // the receiver is gone if the worker has been detached
                let _ = sender.send(result);
            })
            .map_err(AnalysisError::Spawn)?;

        let reason = loop {
            match receiver.recv_timeout(POLL_INTERVAL) {
                Ok(result) => {
                    let _ = handle.join();
                    let result = result?;
                    monitor.done();
                    return Ok(result);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let _ = handle.join();
                    return Err(AnalysisError::WorkerPanicked);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if monitor.is_cancelled() {
                        break AnalysisError::Cancelled;
                    }
                    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        break AnalysisError::Timeout;
                    }
                }
            }
        };

        worker_monitor.cancel();

        match receiver.recv_timeout(self.canceling_time) {
            Ok(_) | Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                debug!("worker '{}' stopped after {reason}", self.name);
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "worker '{}' did not stop within {:?}, detaching it",
                    self.name, self.canceling_time
                );
            }
        }

        Err(reason)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct Sleeper {
        rounds: usize,
    }

    impl LongRunningMethod for Sleeper {
        type Output = usize;
        type Partial = usize;

        fn execute(&mut self, monitor: &Monitor<usize>) -> Result<usize, AnalysisError> {
            for round in 0..self.rounds {
                monitor.check_cancel()?;
                monitor.report_partial(round);
                thread::sleep(Duration::from_millis(5));
            }
            Ok(self.rounds)
        }
    }

    struct Stubborn {
        stopped: Arc<AtomicBool>,
    }

    impl LongRunningMethod for Stubborn {
        type Output = ();
        type Partial = ();

        fn execute(&mut self, _: &Monitor<()>) -> Result<(), AnalysisError> {
            thread::sleep(Duration::from_millis(500));
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn inline_returns_the_result() {
        let monitor = Monitor::new();
        assert_eq!(InlineExecutor.run(&mut Sleeper { rounds: 3 }, &monitor).unwrap(), 3);
        assert!(monitor.is_done());
    }

    #[test]
    fn inline_refuses_cancelled_monitors() {
        let monitor = Monitor::new();
        monitor.cancel();
        assert!(matches!(
            InlineExecutor.run(&mut Sleeper { rounds: 3 }, &monitor),
            Err(AnalysisError::Cancelled)
        ));
    }

    #[test]
    fn worker_finishes_within_timeout() {
        let executor = StoppableExecutor::default().with_timeout(Some(Duration::from_secs(10)));
        assert_eq!(
            executor.run(Sleeper { rounds: 4 }, &Monitor::new()).unwrap(),
            4
        );
    }

    #[test]
    fn worker_times_out_cooperatively() {
        let executor = StoppableExecutor::default().with_timeout(Some(Duration::from_millis(20)));
        let monitor = Monitor::new();

        assert!(matches!(
            executor.run(Sleeper { rounds: 10_000 }, &monitor),
            Err(AnalysisError::Timeout)
        ));
        // the caller's token is left untouched
        assert!(!monitor.is_cancelled());
    }

    #[test]
    fn stubborn_worker_is_detached() {
        let stopped = Arc::new(AtomicBool::new(false));
        let executor = StoppableExecutor::default()
            .with_timeout(Some(Duration::from_millis(10)))
            .with_canceling_time(Duration::from_millis(20));

        let started = Instant::now();
        let result = executor.run(
            Stubborn {
                stopped: stopped.clone(),
            },
            &Monitor::new(),
        );

        assert!(matches!(result, Err(AnalysisError::Timeout)));
        assert!(started.elapsed() < Duration::from_millis(400));
        assert!(!stopped.load(Ordering::SeqCst));
    }

    #[test]
    fn external_cancel_stops_the_worker() {
        let executor = StoppableExecutor::default();
        let monitor = Monitor::new();
        let canceller = monitor.clone();

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            canceller.cancel();
        });

        assert!(matches!(
            executor.run(Sleeper { rounds: 10_000 }, &monitor),
            Err(AnalysisError::Cancelled)
        ));
    }

    #[test]
    fn zero_timeout_means_none() {
        let executor = StoppableExecutor::default().with_timeout(Some(Duration::ZERO));
        assert_eq!(
            executor.run(Sleeper { rounds: 2 }, &Monitor::new()).unwrap(),
            2
        );
    }
}
