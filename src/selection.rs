use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use thiserror::Error;

use crate::error::{Field, ValidationError};
use crate::models::{Appointment, CreateAppointmentRequest, TimeSlot};

/// Student scheduler forbids weekends; the staff dialog trusts backend slot availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerMode {
    Student,
    Staff,
}

/// How a slot is rendered. Exactly one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Available,
    Selected,
    Occupied,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("please choose a date after today")]
    NotInFuture,
    #[error("appointments are not available on weekends")]
    Weekend,
    #[error("pick a date first")]
    NoDate,
    #[error("that time is already taken")]
    Occupied,
    #[error("that slot belongs to a different date")]
    WrongDate,
    #[error("the form is not open for editing")]
    FormClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPicker {
    mode: PickerMode,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    reason: String,
    concern_category: String,
}

impl SlotPicker {
    pub fn new(mode: PickerMode) -> Self {
        Self {
            mode,
            date: None,
            time: None,
            reason: String::new(),
            concern_category: String::new(),
        }
    }

    /// Start from an existing appointment. The original date is kept even if it
    /// would no longer be selectable.
    pub fn prefilled(mode: PickerMode, appointment: &Appointment) -> Self {
        Self {
            mode,
            date: Some(appointment.scheduled_date),
            time: Some(appointment.scheduled_time),
            reason: appointment.reason.clone(),
            concern_category: appointment.concern_category.clone().unwrap_or_default(),
        }
    }

    pub fn mode(&self) -> PickerMode {
        self.mode
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn time(&self) -> Option<NaiveTime> {
        self.time
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn concern_category(&self) -> &str {
        &self.concern_category
    }

    pub fn check_date(&self, date: NaiveDate, today: NaiveDate) -> Result<(), SelectionError> {
        if date <= today {
            return Err(SelectionError::NotInFuture);
        }
        if self.mode == PickerMode::Student && matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return Err(SelectionError::Weekend);
        }
        Ok(())
    }

    /// Returns `true` when the date actually changed; the caller then fetches
    /// slots for the new date. A changed date always clears the chosen time.
    pub fn select_date(&mut self, date: NaiveDate, today: NaiveDate) -> Result<bool, SelectionError> {
        self.check_date(date, today)?;
        if self.date == Some(date) {
            return Ok(false);
        }
        self.date = Some(date);
        self.time = None;
        Ok(true)
    }

    pub fn slot_state(&self, slot: &TimeSlot) -> SlotState {
        if !slot.is_not_taken {
            SlotState::Occupied
        } else if self.date == Some(slot.date) && self.time == Some(slot.start_time) {
            SlotState::Selected
        } else {
            SlotState::Available
        }
    }

    /// Slots in start-time order, paired with their render state.
    pub fn grid<'a>(&self, slots: &'a [TimeSlot]) -> Vec<(&'a TimeSlot, SlotState)> {
        let mut out: Vec<_> = slots.iter().map(|s| (s, self.slot_state(s))).collect();
        out.sort_by_key(|(s, _)| s.start_time);
        out
    }

    pub fn select_slot(&mut self, slot: &TimeSlot) -> Result<(), SelectionError> {
        let Some(date) = self.date else {
            return Err(SelectionError::NoDate);
        };
        if slot.date != date {
            return Err(SelectionError::WrongDate);
        }
        if !slot.is_not_taken {
            return Err(SelectionError::Occupied);
        }
        self.time = Some(slot.start_time);
        Ok(())
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = reason.into();
    }

    pub fn set_concern_category(&mut self, category: impl Into<String>) {
        self.concern_category = category.into();
    }

    /// Recomputed from the current selection on every call.
    pub fn can_submit(&self) -> bool {
        self.date.is_some() && self.time.is_some() && !self.reason.trim().is_empty()
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.date.is_none() {
            errors.push(ValidationError::new(Field::Date, "Please select a date"));
        }
        if self.time.is_none() {
            errors.push(ValidationError::new(Field::Time, "Please select a time slot"));
        }
        if self.reason.trim().is_empty() {
            errors.push(ValidationError::new(Field::Reason, "Please describe the reason for your visit"));
        }
        errors
    }

    pub fn to_request(&self) -> Result<CreateAppointmentRequest, Vec<ValidationError>> {
        match (self.date, self.time) {
            (Some(scheduled_date), Some(scheduled_time)) if self.can_submit() => {
                Ok(CreateAppointmentRequest {
                    reason: self.reason.trim().to_string(),
                    scheduled_date,
                    scheduled_time,
                    concern_category: self.concern_category.trim().to_string(),
                    status: None,
                })
            }
            _ => Err(self.validate()),
        }
    }
}
