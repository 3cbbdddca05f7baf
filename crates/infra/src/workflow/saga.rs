//! In-process saga: each completed write registers the write that undoes it.
//!
//! On failure the registered compensations run newest first. A compensation
//! that fails is logged and the rest still run; the caller always gets the
//! error that aborted the saga, never a compensation error.

use std::future::Future;
use std::pin::Pin;

use tracing::{error, info, warn};

use crate::error::{CrmError, CrmResult};

type Compensation<'a> = Pin<Box<dyn Future<Output = CrmResult<()>> + Send + 'a>>;

/// How a saga ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaOutcome {
    Committed,
    /// Aborted; `compensated` of `registered` compensations succeeded.
    Compensated { registered: usize, compensated: usize },
}

pub struct Saga<'a> {
    name: &'static str,
    compensations: Vec<(&'static str, Compensation<'a>)>,
}

impl<'a> Saga<'a> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            compensations: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register the undo of a step that just completed. The future is not
    /// polled unless the saga aborts.
    pub fn on_undo<F>(&mut self, step: &'static str, undo: F)
    where
        F: Future<Output = CrmResult<()>> + Send + 'a,
    {
        self.compensations.push((step, Box::pin(undo)));
    }

    pub fn pending(&self) -> usize {
        self.compensations.len()
    }

    /// Finish successfully; registered compensations are dropped unpolled.
    pub fn commit(self) -> SagaOutcome {
        info!(saga = self.name, steps = self.compensations.len(), "saga committed");
        SagaOutcome::Committed
    }

    /// Run every registered compensation in reverse order and hand back
    /// `cause` together with what was undone.
    pub async fn abort(self, cause: CrmError) -> (CrmError, SagaOutcome) {
        let registered = self.compensations.len();
        warn!(saga = self.name, error = %cause, registered, "saga aborted, compensating");

        let mut compensated = 0;
        for (step, undo) in self.compensations.into_iter().rev() {
            match undo.await {
                Ok(()) => {
                    compensated += 1;
                    info!(saga = self.name, step, "step compensated");
                }
                Err(err) => {
                    error!(saga = self.name, step, error = %err, "compensation failed, manual reconciliation needed");
                }
            }
        }
        (cause, SagaOutcome::Compensated { registered, compensated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use sheetcrm_core::DomainError;

    use crate::error::StoreError;

    fn record(log: &Arc<Mutex<Vec<&'static str>>>, step: &'static str) -> impl Future<Output = CrmResult<()>> + Send + 'static {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(step);
            Ok(())
        }
    }

    #[tokio::test]
    async fn compensations_run_newest_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut saga = Saga::new("test");
        saga.on_undo("company", record(&log, "company"));
        saga.on_undo("contact", record(&log, "contact"));
        saga.on_undo("opportunity", record(&log, "opportunity"));

        let (err, outcome) = saga.abort(DomainError::validation("boom").into()).await;

        assert_eq!(*log.lock().unwrap(), vec!["opportunity", "contact", "company"]);
        assert_eq!(err, CrmError::Domain(DomainError::validation("boom")));
        assert_eq!(outcome, SagaOutcome::Compensated { registered: 3, compensated: 3 });
    }

    #[tokio::test]
    async fn failing_compensation_does_not_stop_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut saga = Saga::new("test");
        saga.on_undo("first", record(&log, "first"));
        saga.on_undo("broken", async { Err(StoreError::Unreachable("down".into()).into()) });
        saga.on_undo("last", record(&log, "last"));

        let (err, outcome) = saga
            .abort(StoreError::Malformed("original".into()).into())
            .await;

        assert_eq!(*log.lock().unwrap(), vec!["last", "first"]);
        assert_eq!(err, CrmError::Store(StoreError::Malformed("original".into())));
        assert_eq!(outcome, SagaOutcome::Compensated { registered: 3, compensated: 2 });
    }

    #[tokio::test]
    async fn commit_never_polls_compensations() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut saga = Saga::new("test");
        saga.on_undo("company", record(&log, "company"));
        assert_eq!(saga.pending(), 1);

        assert_eq!(saga.commit(), SagaOutcome::Committed);
        assert!(log.lock().unwrap().is_empty());
    }
}
