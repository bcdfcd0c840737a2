use crate::error::AnalysisError;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// A cooperative cancellation flag.
///
/// Tokens form a tree: a child reports cancellation when itself or any ancestor is cancelled,
/// while cancelling a child leaves its ancestors untouched.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Box<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new token that is also cancelled whenever this one is.
    pub fn child(&self) -> Self {
        Self {
            flag: Arc::default(),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_cancelled())
    }
}

/// Everything a solve needs to know to stop early.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    pub token: CancelToken,
    pub deadline: Option<Instant>,
}

impl Interrupt {
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// The same interrupt, additionally bounded by `deadline`.
    pub fn bounded(&self, deadline: Option<Instant>) -> Interrupt {
        let deadline = match (self.deadline, deadline) {
            (Some(own), Some(other)) => Some(own.min(other)),
            (own, other) => own.or(other),
        };

        Interrupt {
            token: self.token.clone(),
            deadline,
        }
    }
}

#[derive(Debug, Default)]
struct Progress {
    total: AtomicU64,
    worked: AtomicU64,
    done: AtomicBool,
}

type Listener<T> = Arc<Mutex<dyn FnMut(T) + Send>>;

/// The channel between a running analysis and whoever started it.
///
/// It carries the cancellation state, an optional deadline, progress counters, and a listener
/// for partial results of type `T`.
pub struct Monitor<T> {
    token: CancelToken,
    deadline: Option<Instant>,
    progress: Arc<Progress>,
    parent: Option<(Arc<Progress>, u64)>,
    listener: Option<Listener<T>>,
}

impl<T> Clone for Monitor<T> {
    fn clone(&self) -> Self {
        Self {
            token: self.token.clone(),
            deadline: self.deadline,
            progress: self.progress.clone(),
            parent: self.parent.clone(),
            listener: self.listener.clone(),
        }
    }
}

impl<T> Debug for Monitor<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("token", &self.token)
            .field("deadline", &self.deadline)
            .field("progress", &self.progress)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl<T> Default for Monitor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Monitor<T> {
    pub fn new() -> Self {
        Self {
            token: CancelToken::new(),
            deadline: None,
            progress: Arc::default(),
            parent: None,
            listener: None,
        }
    }

    /// A monitor that forwards every partial result to `listener`.
    pub fn with_listener(listener: impl FnMut(T) + Send + 'static) -> Self {
        Self {
            listener: Some(Arc::new(Mutex::new(listener))),
            ..Self::new()
        }
    }

    /// Bounds the run by an absolute deadline. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(deadline, |own| own.min(deadline)));
        self
    }

    /// A monitor sharing listener and progress but owning a child token,
    /// so it can be cancelled without cancelling this one.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child(),
            ..self.clone()
        }
    }

    /// A monitor for a nested task worth `work` units of this one.
    /// The parent is credited with `work` once the sub task is done.
    pub fn sub_task<U>(&self, work: u64) -> Monitor<U> {
        Monitor {
            token: self.token.clone(),
            deadline: self.deadline,
            progress: Arc::default(),
            parent: Some((self.progress.clone(), work)),
            listener: None,
        }
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn interrupt(&self) -> Interrupt {
        Interrupt {
            token: self.token.clone(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fails with [AnalysisError::Cancelled] or [AnalysisError::Timeout] once the run has to stop.
    pub fn check_cancel(&self) -> Result<(), AnalysisError> {
        if self.token.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(AnalysisError::Timeout),
            _ => Ok(()),
        }
    }

    /// Streams a partial result. Results reported after cancellation are dropped.
    pub fn report_partial(&self, value: T) {
        if self.token.is_cancelled() {
            return;
        }

        if let Some(listener) = &self.listener {
            if let Ok(mut listener) = listener.lock() {
                (&mut *listener)(value);
            }
        }
    }

    pub fn set_remaining_work(&self, work: u64) {
        let worked = self.progress.worked.load(Ordering::SeqCst);
        self.progress.total.store(worked + work, Ordering::SeqCst);
    }

    pub fn worked(&self, work: u64) {
        self.progress.worked.fetch_add(work, Ordering::SeqCst);
    }

    /// Completed and total units of work.
    pub fn progress(&self) -> (u64, u64) {
        (
            self.progress.worked.load(Ordering::SeqCst),
            self.progress.total.load(Ordering::SeqCst),
        )
    }

    pub fn done(&self) {
        if self.progress.done.swap(true, Ordering::SeqCst) {
            return;
        }

        let total = self.progress.total.load(Ordering::SeqCst);
        self.progress.worked.fetch_max(total, Ordering::SeqCst);

        if let Some((parent, work)) = &self.parent {
            parent.worked.fetch_add(*work, Ordering::SeqCst);
        }
    }

    pub fn is_done(&self) -> bool {
        self.progress.done.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn child_tokens_follow_parents() {
        let parent = CancelToken::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn partial_results_stop_after_cancel() {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = collected.clone();
        let monitor = Monitor::with_listener(move |value: i32| sink.lock().unwrap().push(value));

        monitor.report_partial(1);
        monitor.report_partial(-2);
        monitor.cancel();
        monitor.report_partial(3);

        assert_eq!(*collected.lock().unwrap(), vec![1, -2]);
        assert!(matches!(
            monitor.check_cancel(),
            Err(AnalysisError::Cancelled)
        ));
    }

    #[test]
    fn expired_deadline_is_a_timeout() {
        let monitor = Monitor::<()>::new().with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(matches!(monitor.check_cancel(), Err(AnalysisError::Timeout)));
        assert!(monitor.interrupt().is_triggered());
    }

    #[test]
    fn sub_tasks_credit_their_parent() {
        let monitor = Monitor::<()>::new();
        monitor.set_remaining_work(10);
        monitor.worked(2);

        let sub = monitor.sub_task::<u32>(5);
        sub.set_remaining_work(3);
        sub.worked(3);
        sub.done();
        sub.done();

        assert_eq!(monitor.progress(), (7, 10));
        assert!(!monitor.is_done());

        monitor.done();
        assert_eq!(monitor.progress(), (10, 10));
    }
}
