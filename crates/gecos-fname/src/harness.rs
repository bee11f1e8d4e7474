//! Scenario runner.
//!
//! Drives the allocator and formatter the way the buildfname benchmark driver
//! did: allocate a buffer, format into it, then report what landed where.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::alloc::{FailingAllocator, RawAllocator, SystemAllocator, try_xalloc};
use crate::buffer::{CapacityViolation, GuardedBuffer};
use crate::config::{HarnessConfig, Scenario};
use crate::format::{Mode, OverflowPolicy, build_fname, build_fname_checked};
use crate::gecos::estimate_len;
use crate::trace::{TeeObserver, TraceEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The name fit.
    Clean,
    /// Unchecked formatting wrote past the capacity.
    Overflowed,
    /// Checked formatting cut the name short.
    Truncated,
    /// Checked formatting refused to write.
    Rejected,
    /// No buffer could be allocated.
    AllocationFailed,
}

/// Result of formatting one gecos/login pair.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub mode: Mode,
    pub requested: i64,
    /// Bytes actually allocated, zero if allocation failed.
    pub capacity: usize,
    pub estimate: usize,
    pub outcome: Outcome,
    /// Display name as a caller would read it back, spill included.
    pub output: Option<String>,
    pub violations: Vec<CapacityViolation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether `output` matched the scenario's expectation, if it had one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches_expected: Option<bool>,
    /// Outcome the scenario declared, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_outcome: Option<Outcome>,
    pub trace: Vec<TraceEvent>,
}

impl ScenarioReport {
    /// A run passes when its output matched any expected name and its
    /// outcome is the declared one. Without a declared outcome, an overflow
    /// always fails, and so does a rejection when a name was expected.
    pub fn passed(&self) -> bool {
        if self.matches_expected == Some(false) {
            return false;
        }
        match self.expected_outcome {
            Some(expected) => self.outcome == expected,
            None => match self.outcome {
                Outcome::Overflowed => false,
                Outcome::Rejected => self.matches_expected.is_none(),
                _ => true,
            },
        }
    }
}

/// Inputs for a single formatting run.
#[derive(Debug, Clone, Copy)]
pub struct Run<'a> {
    pub name: &'a str,
    pub gecos: &'a [u8],
    pub login: &'a [u8],
    pub size_request: i64,
    pub mode: Mode,
    pub policy: OverflowPolicy,
}

/// Allocate from `allocator` and format according to `run`.
pub fn execute<A: RawAllocator + ?Sized>(allocator: &A, run: Run<'_>) -> ScenarioReport {
    let mut observer = TeeObserver::default();
    let estimate = estimate_len(run.gecos, run.login);

    let mut report = ScenarioReport {
        name: run.name.to_string(),
        mode: run.mode,
        requested: run.size_request,
        capacity: 0,
        estimate,
        outcome: Outcome::Clean,
        output: None,
        violations: Vec::new(),
        error: None,
        matches_expected: None,
        expected_outcome: None,
        trace: Vec::new(),
    };

    let block = match try_xalloc(allocator, run.size_request, &mut observer) {
        Ok(block) => block,
        Err(e) => {
            warn!(scenario = run.name, "{e}");
            report.outcome = Outcome::AllocationFailed;
            report.error = Some(e.to_string());
            report.trace = observer.recorder.into_events();
            return report;
        }
    };
    report.capacity = block.len();

    match run.mode {
        Mode::Unchecked => {
            let mut buf = GuardedBuffer::new(block);
            build_fname(run.gecos, run.login, &mut buf, &mut observer);
            report.output = Some(String::from_utf8_lossy(&buf.contents()).into_owned());
            report.violations = buf.violations().to_vec();
            if buf.overflowed() {
                report.outcome = Outcome::Overflowed;
            }
        }
        Mode::Checked => {
            let mut block = block;
            let result = build_fname_checked(
                run.gecos,
                run.login,
                &mut block[..],
                run.policy,
                &mut observer,
            );
            match result {
                Ok(written) => {
                    let name = String::from_utf8_lossy(&block[..written]).into_owned();
                    report.output = Some(name);
                    if written < estimate {
                        report.outcome = Outcome::Truncated;
                    }
                }
                Err(e) => {
                    report.outcome = Outcome::Rejected;
                    report.error = Some(e.to_string());
                }
            }
        }
    }

    report.trace = observer.recorder.into_events();
    report
}

/// Run one configured scenario.
pub fn run_scenario(scenario: &Scenario, config: &HarnessConfig) -> ScenarioReport {
    let allocator: &dyn RawAllocator = if scenario.simulate_oom {
        &FailingAllocator
    } else {
        &SystemAllocator
    };

    let mut report = execute(
        allocator,
        Run {
            name: &scenario.name,
            gecos: scenario.gecos.as_bytes(),
            login: scenario.login.as_bytes(),
            size_request: config.capacity_for(scenario),
            mode: config.mode,
            policy: config.policy,
        },
    );

    if let Some(expect) = &scenario.expect {
        report.matches_expected = Some(report.output.as_deref() == Some(expect.as_str()));
    }
    report.expected_outcome = scenario.expect_outcome;

    info!(
        scenario = %report.name,
        outcome = ?report.outcome,
        violations = report.violations.len(),
        passed = report.passed(),
        "scenario finished"
    );
    report
}

/// Run every configured scenario in order.
pub fn run_all(config: &HarnessConfig) -> Vec<ScenarioReport> {
    config
        .scenarios
        .iter()
        .map(|scenario| run_scenario(scenario, config))
        .collect()
}
