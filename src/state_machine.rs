//! Delete confirmation state machine.
//!
//! `Idle -> ConfirmPending -> (Confirmed | Cancelled)`. A delete request can
//! only be dispatched with a [`ConfirmedDelete`], which nothing but
//! [`DeleteFlow::confirm`] produces.

use thiserror::Error;

use crate::models::FileRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteState {
    Idle,
    ConfirmPending { id: String, filename: String },
    Confirmed { id: String },
    Cancelled,
}

impl DeleteState {
    fn name(&self) -> &'static str {
        match self {
            DeleteState::Idle => "idle",
            DeleteState::ConfirmPending { .. } => "confirm-pending",
            DeleteState::Confirmed { .. } => "confirmed",
            DeleteState::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeleteFlowError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}

/// Explicit user confirmation to delete one file.
#[derive(Debug, PartialEq, Eq)]
pub struct ConfirmedDelete {
    id: String,
}

impl ConfirmedDelete {
    pub fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFlow {
    state: DeleteState,
}

impl Default for DeleteFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl DeleteFlow {
    pub fn new() -> Self {
        Self {
            state: DeleteState::Idle,
        }
    }

    pub fn state(&self) -> &DeleteState {
        &self.state
    }

    /// Ask for confirmation to delete `record`.
    pub fn request(&mut self, record: &FileRecord) -> Result<(), DeleteFlowError> {
        if matches!(self.state, DeleteState::ConfirmPending { .. }) {
            return Err(self.invalid("request"));
        }
        self.state = DeleteState::ConfirmPending {
            id: record.id.clone(),
            filename: record.filename.clone(),
        };
        Ok(())
    }

    /// Text of the confirmation prompt while one is pending.
    pub fn prompt(&self) -> Option<String> {
        match &self.state {
            DeleteState::ConfirmPending { filename, .. } => Some(format!(
                "Are you sure you want to delete \"{filename}\"? This action cannot be undone."
            )),
            _ => None,
        }
    }

    pub fn confirm(&mut self) -> Result<ConfirmedDelete, DeleteFlowError> {
        match std::mem::replace(&mut self.state, DeleteState::Idle) {
            DeleteState::ConfirmPending { id, .. } => {
                self.state = DeleteState::Confirmed { id: id.clone() };
                Ok(ConfirmedDelete { id })
            }
            other => {
                self.state = other;
                Err(self.invalid("confirm"))
            }
        }
    }

    pub fn cancel(&mut self) -> Result<(), DeleteFlowError> {
        if !matches!(self.state, DeleteState::ConfirmPending { .. }) {
            return Err(self.invalid("cancel"));
        }
        self.state = DeleteState::Cancelled;
        Ok(())
    }

    /// Return to `Idle` once the outcome has been handled.
    pub fn reset(&mut self) {
        self.state = DeleteState::Idle;
    }

    fn invalid(&self, action: &'static str) -> DeleteFlowError {
        DeleteFlowError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }
}
