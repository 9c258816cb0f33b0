use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::models::{Appointment, AppointmentStatus, CreateAppointmentRequest, TimeSlot};
use crate::scope::ScopeToken;
use crate::selection::{PickerMode, SelectionError, SlotPicker};
use crate::session::{Role, SessionContext};
use crate::store::AppointmentStore;

/* ============================================================
   Status transitions
   ============================================================ */

/// Single-field status changes. Reschedule is not one of these; it goes
/// through [`RescheduleFlow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Approve,
    Complete,
    Cancel,
}

impl Transition {
    pub const ALL: [Transition; 3] = [Transition::Approve, Transition::Complete, Transition::Cancel];

    pub fn verb(self) -> &'static str {
        match self {
            Transition::Approve => "approve",
            Transition::Complete => "complete",
            Transition::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("cannot {transition} an appointment that is {from}")]
    IllegalTransition {
        from: AppointmentStatus,
        transition: Transition,
    },
    #[error("cannot reschedule an appointment that is {0}")]
    NotReschedulable(AppointmentStatus),
    #[error("you are not allowed to {0} this appointment")]
    NotPermitted(Action),
}

/// The transition table. Every (status, transition) pair is spelled out so a
/// new status cannot compile without deciding its edges.
pub fn apply(
    from: AppointmentStatus,
    transition: Transition,
) -> Result<AppointmentStatus, LifecycleError> {
    use AppointmentStatus::*;
    use Transition::*;

    match (from, transition) {
        (Pending, Approve) | (Rescheduled, Approve) => Ok(Approved),
        (Approved, Complete) => Ok(Completed),
        (Pending, Cancel) | (Approved, Cancel) | (Rescheduled, Cancel) => Ok(Cancelled),

        (Pending, Complete)
        | (Rescheduled, Complete)
        | (Approved, Approve)
        | (Completed, Approve | Complete | Cancel)
        | (Cancelled, Approve | Complete | Cancel) => {
            Err(LifecycleError::IllegalTransition { from, transition })
        }
    }
}

pub fn allowed_transitions(status: AppointmentStatus) -> Vec<Transition> {
    Transition::ALL
        .into_iter()
        .filter(|t| apply(status, *t).is_ok())
        .collect()
}

/* ============================================================
   Role-gated actions
   ============================================================ */

/// A control the UI may render for an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Approve,
    Complete,
    Cancel,
    Reschedule,
}

impl From<Transition> for Action {
    fn from(t: Transition) -> Self {
        match t {
            Transition::Approve => Action::Approve,
            Transition::Complete => Action::Complete,
            Transition::Cancel => Action::Cancel,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Approve => "approve",
            Action::Complete => "complete",
            Action::Cancel => "cancel",
            Action::Reschedule => "reschedule",
        })
    }
}

/*
Who sees what:
admin       every legal transition + reschedule
front desk  approve / cancel where legal + reschedule
student     cancel / reschedule on their own pending appointments
Terminal statuses expose nothing.
*/
pub fn available_actions(status: AppointmentStatus, role: Role, is_owner: bool) -> Vec<Action> {
    if status.is_terminal() {
        return Vec::new();
    }

    let mut actions: Vec<Action> = match role {
        Role::Admin => allowed_transitions(status).into_iter().map(Action::from).collect(),
        Role::FrontDesk => allowed_transitions(status)
            .into_iter()
            .filter(|t| matches!(t, Transition::Approve | Transition::Cancel))
            .map(Action::from)
            .collect(),
        Role::Student => {
            if is_owner && status == AppointmentStatus::Pending {
                vec![Action::Cancel]
            } else {
                Vec::new()
            }
        }
    };

    let may_reschedule = match role {
        Role::Admin | Role::FrontDesk => true,
        Role::Student => is_owner && status == AppointmentStatus::Pending,
    };
    if may_reschedule {
        actions.push(Action::Reschedule);
    }
    actions
}

pub fn actions_for(appointment: &Appointment, session: &SessionContext) -> Vec<Action> {
    available_actions(
        appointment.status,
        session.role,
        appointment.user_id == session.user_id,
    )
}

pub fn authorize(
    appointment: &Appointment,
    session: &SessionContext,
    action: Action,
) -> Result<(), LifecycleError> {
    if let Action::Reschedule = action {
        if appointment.status.is_terminal() {
            return Err(LifecycleError::NotReschedulable(appointment.status));
        }
    }
    if actions_for(appointment, session).contains(&action) {
        Ok(())
    } else {
        Err(LifecycleError::NotPermitted(action))
    }
}

/* ============================================================
   Two-step reschedule
   ============================================================ */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescheduleStage {
    /// Read-only view; no dialog open.
    Closed,
    Editing,
    Confirming,
}

/// What the confirmation step shows before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescheduleSummary {
    pub appointment_id: i64,
    pub request: CreateAppointmentRequest,
}

#[derive(Debug, Clone)]
pub struct RescheduleFlow {
    original: Appointment,
    stage: RescheduleStage,
    draft: SlotPicker,
    field_errors: Vec<ValidationError>,
    dialog_error: Option<String>,
}

impl RescheduleFlow {
    pub fn new(original: Appointment, role: Role) -> Self {
        let mode = if role.is_staff() {
            PickerMode::Staff
        } else {
            PickerMode::Student
        };
        let draft = SlotPicker::prefilled(mode, &original);
        Self {
            original,
            stage: RescheduleStage::Closed,
            draft,
            field_errors: Vec::new(),
            dialog_error: None,
        }
    }

    /// Open the edit stage, pre-filled from the current appointment.
    pub fn begin(&mut self, session: &SessionContext) -> Result<(), LifecycleError> {
        authorize(&self.original, session, Action::Reschedule)?;
        self.reset_draft();
        self.stage = RescheduleStage::Editing;
        Ok(())
    }

    pub fn stage(&self) -> RescheduleStage {
        self.stage
    }

    pub fn original(&self) -> &Appointment {
        &self.original
    }

    pub fn draft(&self) -> &SlotPicker {
        &self.draft
    }

    pub fn field_errors(&self) -> &[ValidationError] {
        &self.field_errors
    }

    pub fn dialog_error(&self) -> Option<&str> {
        self.dialog_error.as_deref()
    }

    pub fn select_date(&mut self, date: NaiveDate, today: NaiveDate) -> Result<bool, SelectionError> {
        self.ensure_editing()?;
        self.draft.select_date(date, today)
    }

    pub fn select_slot(&mut self, slot: &TimeSlot) -> Result<(), SelectionError> {
        self.ensure_editing()?;
        self.draft.select_slot(slot)
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        if self.stage == RescheduleStage::Editing {
            self.draft.set_reason(reason);
        }
    }

    pub fn set_concern_category(&mut self, category: impl Into<String>) {
        if self.stage == RescheduleStage::Editing {
            self.draft.set_concern_category(category);
        }
    }

    /// Edit → confirm. Stays in edit with field errors when reason, date or time is missing.
    pub fn advance(&mut self) -> bool {
        if self.stage != RescheduleStage::Editing {
            return false;
        }
        self.field_errors = self.draft.validate();
        if !self.field_errors.is_empty() {
            debug!(
                appointment_id = self.original.id,
                "reschedule draft incomplete ({} fields)",
                self.field_errors.len()
            );
            return false;
        }
        self.dialog_error = None;
        self.stage = RescheduleStage::Confirming;
        true
    }

    /// Confirm → edit, keeping the draft.
    pub fn back(&mut self) {
        if self.stage == RescheduleStage::Confirming {
            self.dialog_error = None;
            self.stage = RescheduleStage::Editing;
        }
    }

    /// Discard everything from either stage. No request is made.
    pub fn cancel(&mut self) {
        self.reset_draft();
        self.stage = RescheduleStage::Closed;
    }

    pub fn summary(&self) -> Option<RescheduleSummary> {
        if self.stage != RescheduleStage::Confirming {
            return None;
        }
        let mut request = self.draft.to_request().ok()?;
        request.status = Some(AppointmentStatus::Rescheduled);
        Some(RescheduleSummary {
            appointment_id: self.original.id,
            request,
        })
    }

    /// Send the reschedule. On failure the error stays in this dialog and the
    /// dialog stays open for retry or cancel.
    pub async fn confirm(
        &mut self,
        store: &AppointmentStore,
        token: &ScopeToken,
    ) -> Option<Appointment> {
        let summary = self.summary()?;
        self.dialog_error = None;

        match store
            .reschedule(summary.appointment_id, summary.request, token)
            .await
        {
            Some(updated) => {
                self.original = updated.clone();
                self.cancel();
                Some(updated)
            }
            None => {
                if token.is_cancelled() {
                    return None;
                }
                let message = store
                    .take_error()
                    .unwrap_or_else(|| "Failed to reschedule appointment. Please try again.".to_string());
                warn!(appointment_id = summary.appointment_id, "reschedule failed: {message}");
                self.dialog_error = Some(message);
                None
            }
        }
    }

    fn ensure_editing(&self) -> Result<(), SelectionError> {
        if self.stage == RescheduleStage::Editing {
            Ok(())
        } else {
            Err(SelectionError::FormClosed)
        }
    }

    fn reset_draft(&mut self) {
        self.draft = SlotPicker::prefilled(self.draft.mode(), &self.original);
        self.field_errors.clear();
        self.dialog_error = None;
    }
}
