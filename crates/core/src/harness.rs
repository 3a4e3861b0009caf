//! Test harness capability and case execution
//!
//! A case is registered with an optional body. Without a body the case is
//! skipped; with one it runs until the body's future resolves, which is the
//! single completion signal of the case.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::time::Instant;

use crate::error::Result;
use crate::pipeline::display_name;
use crate::types::{CaseFailure, CaseOutcome, CaseReport, CaseStatus, TestCase};

/// Asynchronous work of one case
pub type CaseBody<'a> = BoxFuture<'a, CaseOutcome>;

/// Receives the structure and results of a run, in plan order
pub trait TestHarness: Send + Sync {
    /// Called once with the full plan before any case starts
    fn planned(&self, _plan: &[TestCase]) {}

    fn enter_group(&self, title: &str);

    fn leave_group(&self, title: &str);

    /// Called once per case after it reached a terminal status
    fn report(&self, report: &CaseReport);

    /// Called once when the run aborts before a plan exists
    fn abort(&self, failure: &CaseFailure);
}

/// Drive one case from `Pending` to its terminal status
pub async fn execute_case(case: &TestCase, body: Option<CaseBody<'_>>) -> Result<CaseReport> {
    let mut status = CaseStatus::Pending;
    let start = Instant::now();

    let outcome = match body {
        None => {
            status = status.transition(CaseStatus::Skipped)?;
            CaseOutcome::passed()
        }
        Some(body) => {
            status = status.transition(CaseStatus::Running)?;
            let outcome = body.await;
            let terminal = if outcome.failure.is_some() {
                CaseStatus::Failed
            } else {
                CaseStatus::Passed
            };
            status = status.transition(terminal)?;
            outcome
        }
    };

    Ok(CaseReport {
        name: case.name.clone(),
        display_name: display_name(&case.name),
        category: case.category,
        title: case.category.case_title().to_string(),
        status,
        failure: outcome.failure,
        verdict_code: outcome.verdict_code,
        archived: outcome.archived,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Event seen by [`RecordingHarness`]
#[derive(Debug, Clone)]
pub enum HarnessEvent {
    Planned(Vec<TestCase>),
    EnterGroup(String),
    LeaveGroup(String),
    Report(CaseReport),
    Abort(CaseFailure),
}

/// Harness keeping every event in memory
#[derive(Debug, Default)]
pub struct RecordingHarness {
    events: Mutex<Vec<HarnessEvent>>,
}

impl RecordingHarness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HarnessEvent> {
        self.events.lock().clone()
    }

    pub fn reports(&self) -> Vec<CaseReport> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                HarnessEvent::Report(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    /// Report of the screen `name`, if one was recorded
    pub fn report_for(&self, name: &str) -> Option<CaseReport> {
        self.reports().into_iter().find(|r| r.name == name)
    }

    pub fn aborts(&self) -> Vec<CaseFailure> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                HarnessEvent::Abort(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }
}

impl TestHarness for RecordingHarness {
    fn planned(&self, plan: &[TestCase]) {
        self.events.lock().push(HarnessEvent::Planned(plan.to_vec()));
    }

    fn enter_group(&self, title: &str) {
        self.events.lock().push(HarnessEvent::EnterGroup(title.to_string()));
    }

    fn leave_group(&self, title: &str) {
        self.events.lock().push(HarnessEvent::LeaveGroup(title.to_string()));
    }

    fn report(&self, report: &CaseReport) {
        self.events.lock().push(HarnessEvent::Report(report.clone()));
    }

    fn abort(&self, failure: &CaseFailure) {
        self.events.lock().push(HarnessEvent::Abort(failure.clone()));
    }
}
