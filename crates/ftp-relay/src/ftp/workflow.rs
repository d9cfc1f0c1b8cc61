//! The transfer workflow engine.
//!
//! One attempt runs `connect → login → transfer` and is always followed by
//! `teardown`. A failed attempt is retried after a fixed back-off while the
//! retry budget lasts:
//!
//! ```text
//! Idle -> Connecting -> LoggingIn -> Transferring -> Teardown
//! Teardown -> Success | RetryWait -> Connecting | Failure
//! ```
//!
//! A stage can fail two ways. `Ok(false)` means the server or a local
//! check refused; the stage has already logged why. `Err(_)` is a fault
//! that the engine logs here. Both end the attempt, both go through
//! teardown, and both count against the same retry budget.

use crate::ftp::error::FtpResult;
use crate::ftp::types::TransferConfig;
use log::{debug, error, warn};
use std::thread;
use std::time::Duration;

/// The pluggable half of a transfer: what to connect to, how to log in,
/// and how to move the bytes.
#[cfg_attr(test, mockall::automock)]
pub trait TransferStage {
    fn connect(&mut self) -> FtpResult<bool>;

    fn login(&mut self) -> FtpResult<bool>;

    /// Move the bytes. `resume_broken` selects resume-by-size over
    /// starting from scratch when the destination already exists.
    fn transfer(&mut self, resume_broken: bool) -> FtpResult<bool>;

    /// Log out of and disconnect every session that is still connected.
    /// Faults are logged and swallowed.
    fn teardown(&mut self);
}

/// Retry budget and resume policy.
///
/// `attempts_used` is never reset by the engine, so a strategy that runs
/// several transfers shares one budget between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    pub max_attempts: u32,
    pub attempts_used: u32,
    pub backoff: Duration,
    pub resume_broken: bool,
}

impl Default for RetryState {
    fn default() -> Self {
        Self::from(&TransferConfig::default())
    }
}

impl From<&TransferConfig> for RetryState {
    fn from(config: &TransferConfig) -> Self {
        Self {
            max_attempts: config.retry_times,
            attempts_used: 0,
            backoff: Duration::from_secs(config.retry_wait_sec),
            resume_broken: config.resume_broken,
        }
    }
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim one retry from the budget; `false` once it is spent.
    pub fn should_retry(&mut self) -> bool {
        if self.attempts_used < self.max_attempts {
            self.attempts_used += 1;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Connecting,
    LoggingIn,
    Transferring,
    Teardown,
    RetryWait,
    Success,
    Failure,
}

/// Drives a [`TransferStage`] until it succeeds or the retry budget is
/// spent.
pub struct TransferWorkflow<'a, T: TransferStage + ?Sized> {
    stage: &'a mut T,
    retry: &'a mut RetryState,
    state: WorkflowState,
}

impl<'a, T: TransferStage + ?Sized> TransferWorkflow<'a, T> {
    pub fn new(stage: &'a mut T, retry: &'a mut RetryState) -> Self {
        Self {
            stage,
            retry,
            state: WorkflowState::Idle,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Run attempts until one succeeds or no retry is left.
    pub fn run(&mut self) -> bool {
        loop {
            let succeeded = match self.attempt() {
                Ok(true) => true,
                Ok(false) => {
                    debug!("Attempt refused in {:?}", self.state);
                    false
                }
                Err(e) => {
                    error!("Transfer attempt failed in {:?}: {}", self.state, e);
                    false
                }
            };

            self.enter(WorkflowState::Teardown);
            self.stage.teardown();

            if !succeeded && self.retry.should_retry() {
                self.enter(WorkflowState::RetryWait);
                warn!(
                    "Transfer retry {}/{} in {:?}",
                    self.retry.attempts_used, self.retry.max_attempts, self.retry.backoff
                );
                thread::sleep(self.retry.backoff);
                continue;
            }

            self.enter(if succeeded {
                WorkflowState::Success
            } else {
                WorkflowState::Failure
            });
            return succeeded;
        }
    }

    fn attempt(&mut self) -> FtpResult<bool> {
        self.enter(WorkflowState::Connecting);
        if !self.stage.connect()? {
            return Ok(false);
        }

        self.enter(WorkflowState::LoggingIn);
        if !self.stage.login()? {
            return Ok(false);
        }

        self.enter(WorkflowState::Transferring);
        self.stage.transfer(self.retry.resume_broken)
    }

    fn enter(&mut self, next: WorkflowState) {
        debug!("Workflow {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftp::error::FtpError;
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn budget(max_attempts: u32) -> RetryState {
        RetryState {
            max_attempts,
            backoff: Duration::ZERO,
            ..RetryState::default()
        }
    }

    #[test]
    fn test_retry_state_defaults() {
        let retry = RetryState::new();
        assert_eq!(retry.max_attempts, 0);
        assert_eq!(retry.attempts_used, 0);
        assert_eq!(retry.backoff, Duration::from_secs(1));
        assert!(retry.resume_broken);
    }

    #[test]
    fn test_retry_state_from_config() {
        let config = TransferConfig {
            retry_times: 4,
            retry_wait_sec: 7,
            resume_broken: false,
        };
        let retry = RetryState::from(&config);
        assert_eq!(retry.max_attempts, 4);
        assert_eq!(retry.backoff, Duration::from_secs(7));
        assert!(!retry.resume_broken);
    }

    #[test]
    fn test_should_retry_counts_up_to_max() {
        let mut retry = budget(2);
        assert!(retry.should_retry());
        assert!(retry.should_retry());
        assert!(!retry.should_retry());
        assert_eq!(retry.attempts_used, 2);
    }

    #[test]
    fn test_success_runs_each_stage_once_then_teardown() {
        let mut seq = Sequence::new();
        let mut stage = MockTransferStage::new();
        stage.expect_connect().times(1).in_sequence(&mut seq).returning(|| Ok(true));
        stage.expect_login().times(1).in_sequence(&mut seq).returning(|| Ok(true));
        stage
            .expect_transfer()
            .with(eq(true))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));
        stage.expect_teardown().times(1).in_sequence(&mut seq).return_const(());

        let mut retry = budget(3);
        let mut workflow = TransferWorkflow::new(&mut stage, &mut retry);
        assert!(workflow.run());
        assert_eq!(workflow.state(), WorkflowState::Success);
        assert_eq!(retry.attempts_used, 0);
    }

    #[test]
    fn test_refusals_exhaust_budget_with_teardown_each_time() {
        let mut stage = MockTransferStage::new();
        stage.expect_connect().times(4).returning(|| Ok(false));
        stage.expect_login().never();
        stage.expect_transfer().never();
        stage.expect_teardown().times(4).return_const(());

        let mut retry = budget(3);
        let mut workflow = TransferWorkflow::new(&mut stage, &mut retry);
        assert!(!workflow.run());
        assert_eq!(workflow.state(), WorkflowState::Failure);
        assert_eq!(retry.attempts_used, 3);
    }

    #[test]
    fn test_no_retry_by_default() {
        let mut stage = MockTransferStage::new();
        stage.expect_connect().times(1).returning(|| Ok(true));
        stage.expect_login().times(1).returning(|| Ok(false));
        stage.expect_teardown().times(1).return_const(());

        let mut retry = RetryState {
            backoff: Duration::ZERO,
            ..RetryState::default()
        };
        assert!(!TransferWorkflow::new(&mut stage, &mut retry).run());
        assert_eq!(retry.attempts_used, 0);
    }

    #[test]
    fn test_fault_is_swallowed_and_retried() {
        let mut stage = MockTransferStage::new();
        let mut faulted = false;
        stage.expect_connect().times(2).returning(move || {
            if faulted {
                Ok(true)
            } else {
                faulted = true;
                Err(FtpError::connection_failed("connection refused"))
            }
        });
        stage.expect_login().times(1).returning(|| Ok(true));
        stage.expect_transfer().times(1).returning(|_| Ok(true));
        stage.expect_teardown().times(2).return_const(());

        let mut retry = budget(5);
        assert!(TransferWorkflow::new(&mut stage, &mut retry).run());
        assert_eq!(retry.attempts_used, 1);
    }

    #[test]
    fn test_success_halts_retry_counting() {
        let mut stage = MockTransferStage::new();
        let mut remaining_failures = 2;
        stage.expect_connect().times(3).returning(|| Ok(true));
        stage.expect_login().times(3).returning(|| Ok(true));
        stage.expect_transfer().times(3).returning(move |_| {
            if remaining_failures > 0 {
                remaining_failures -= 1;
                Ok(false)
            } else {
                Ok(true)
            }
        });
        stage.expect_teardown().times(3).return_const(());

        let mut retry = budget(5);
        assert!(TransferWorkflow::new(&mut stage, &mut retry).run());
        assert_eq!(retry.attempts_used, 2);
    }

    #[test]
    fn test_budget_persists_across_runs() {
        let mut stage = MockTransferStage::new();
        stage.expect_connect().times(3).returning(|| Ok(false));
        stage.expect_teardown().times(3).return_const(());

        let mut retry = budget(1);
        assert!(!TransferWorkflow::new(&mut stage, &mut retry).run());
        assert_eq!(retry.attempts_used, 1);

        // The second run starts with the budget already spent.
        assert!(!TransferWorkflow::new(&mut stage, &mut retry).run());
        assert_eq!(retry.attempts_used, 1);
    }

    #[test]
    fn test_resume_flag_reaches_transfer_stage() {
        let mut stage = MockTransferStage::new();
        stage.expect_connect().returning(|| Ok(true));
        stage.expect_login().returning(|| Ok(true));
        stage
            .expect_transfer()
            .with(eq(false))
            .times(1)
            .returning(|_| Ok(true));
        stage.expect_teardown().return_const(());

        let mut retry = budget(0);
        retry.resume_broken = false;
        assert!(TransferWorkflow::new(&mut stage, &mut retry).run());
    }
}
