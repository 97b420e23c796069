//! Recording container runtime for environment tests.
use crate::docker::{ContainerRuntime, RunOutput, RunSpec};
use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RuntimeCall {
    Run(RunSpec),
    Remove(String),
    IsRunning(String),
}

#[derive(Debug, Default)]
pub(crate) struct RuntimeLog {
    pub(crate) calls: Vec<RuntimeCall>,
    pub(crate) running: BTreeSet<String>,
    /// Commands whose first argument contains one of these strings fail.
    pub(crate) failing_commands: Vec<String>,
    /// Number of leading failures before a failing command succeeds.
    pub(crate) failures_before_success: Option<usize>,
}

/// Shares its log with the test through an `Rc` so the environment can own it.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeRuntime {
    pub(crate) log: Rc<RefCell<RuntimeLog>>,
}

impl FakeRuntime {
    pub(crate) fn runs(&self) -> Vec<RunSpec> {
        self.log
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                RuntimeCall::Run(spec) => Some(spec.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn removed(&self) -> Vec<String> {
        self.log
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                RuntimeCall::Remove(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn probed(&self) -> Vec<String> {
        self.log
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                RuntimeCall::IsRunning(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn fail_command(&self, needle: &str) {
        self.log
            .borrow_mut()
            .failing_commands
            .push(needle.to_string());
    }

    pub(crate) fn set_running(&self, name: &str) {
        self.log.borrow_mut().running.insert(name.to_string());
    }
}

impl ContainerRuntime for FakeRuntime {
    fn run(&self, spec: &RunSpec) -> Result<RunOutput> {
        let mut log = self.log.borrow_mut();
        log.calls.push(RuntimeCall::Run(spec.clone()));
        let joined = spec.command.join(" ");
        let matches_failure = log
            .failing_commands
            .iter()
            .any(|needle| !joined.is_empty() && joined.contains(needle.as_str()));
        if matches_failure {
            match log.failures_before_success.as_mut() {
                Some(0) => {}
                Some(remaining) => {
                    *remaining -= 1;
                    return Err(anyhow!("fake failure: {joined}"));
                }
                None => return Err(anyhow!("fake failure: {joined}")),
            }
        }
        if let (true, Some(name)) = (spec.detach, spec.name.as_ref()) {
            log.running.insert(name.clone());
        }
        Ok(RunOutput::default())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut log = self.log.borrow_mut();
        log.calls.push(RuntimeCall::Remove(name.to_string()));
        log.running.remove(name);
        Ok(())
    }

    fn is_running(&self, name: &str) -> Result<bool> {
        let mut log = self.log.borrow_mut();
        log.calls.push(RuntimeCall::IsRunning(name.to_string()));
        Ok(log.running.contains(name))
    }
}
