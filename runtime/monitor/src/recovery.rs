//! Recovery policies
//!
//! After a fault has been reported the monitor asks a [`Recovery`] policy
//! what to do with the faulting component. The default only reports and
//! leaves the component blocked on its fault.

use crate::report::FaultReport;
use kaal_sdk::restart::{RestartDecision, RestartPolicy};
use sel4_platform::Word;

/// What happens to a component after its fault was reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Leave the component blocked on the fault
    Report,
    /// Reset the program counter to `entry` and resume
    Restart { entry: Word },
    /// Suspend the component for good
    Stop,
    /// Reply to the fault so the component continues where it stopped
    Resume,
}

impl From<RestartDecision> for RecoveryAction {
    fn from(decision: RestartDecision) -> Self {
        match decision {
            RestartDecision::Restart { entry } => Self::Restart { entry },
            RestartDecision::Stop => Self::Stop,
        }
    }
}

/// Decides the fate of a faulting component
pub trait Recovery {
    fn on_fault(&mut self, report: &FaultReport) -> RecoveryAction;
}

/// Report faults and take no further action
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOnly;

impl Recovery for ReportOnly {
    fn on_fault(&mut self, _report: &FaultReport) -> RecoveryAction {
        RecoveryAction::Report
    }
}

impl Recovery for RestartPolicy {
    fn on_fault(&mut self, report: &FaultReport) -> RecoveryAction {
        self.decide(report.component).into()
    }
}
