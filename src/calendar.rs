//! Read-only projections of the store for the calendar and list views.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{Datelike, Days, Months, NaiveDate};

use crate::models::{Appointment, AppointmentStatus};

/// Dates that carry at least one Approved or Rescheduled appointment.
pub fn booked_dates(appointments: &[Appointment]) -> BTreeSet<NaiveDate> {
    appointments
        .iter()
        .filter(|a| a.status.is_booked())
        .map(|a| a.scheduled_date)
        .collect()
}

/// Every appointment on `day`, any status, earliest first.
pub fn appointments_on(day: NaiveDate, appointments: &[Appointment]) -> Vec<&Appointment> {
    let mut out: Vec<&Appointment> = appointments
        .iter()
        .filter(|a| a.scheduled_date == day)
        .collect();
    out.sort_by_key(|a| (a.scheduled_time, a.id));
    out
}

/// Approved or Rescheduled appointments from `today` on, by date then time.
pub fn upcoming(today: NaiveDate, appointments: &[Appointment]) -> Vec<&Appointment> {
    let mut out: Vec<&Appointment> = appointments
        .iter()
        .filter(|a| a.status.is_booked() && a.scheduled_date >= today)
        .collect();
    out.sort_by_key(|a| (a.scheduled_date, a.scheduled_time, a.id));
    out
}

pub fn status_counts(appointments: &[Appointment]) -> BTreeMap<AppointmentStatus, usize> {
    let mut counts: BTreeMap<AppointmentStatus, usize> =
        AppointmentStatus::ALL.into_iter().map(|s| (s, 0)).collect();
    for a in appointments {
        *counts.entry(a.status).or_default() += 1;
    }
    counts
}

/* ============================================================
   Month grid
   ============================================================ */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub in_month: bool,
    pub has_appointment: bool,
}

/// Weeks run Sunday to Saturday; leading and trailing days of the
/// neighbouring months fill the first and last rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    first: NaiveDate,
    weeks: Vec<[DayCell; 7]>,
}

impl MonthGrid {
    pub fn build(year: i32, month: u32, appointments: &[Appointment]) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next_first = first.checked_add_months(Months::new(1))?;
        let days_in_month = next_first.signed_duration_since(first).num_days() as u64;
        let lead = u64::from(first.weekday().num_days_from_sunday());
        let start = first.checked_sub_days(Days::new(lead))?;
        let rows = (lead + days_in_month).div_ceil(7);

        let booked = booked_dates(appointments);
        let mut weeks = Vec::with_capacity(rows as usize);
        for row in 0..rows {
            let mut week = [DayCell {
                date: start,
                in_month: false,
                has_appointment: false,
            }; 7];
            for (col, cell) in week.iter_mut().enumerate() {
                let date = start.checked_add_days(Days::new(row * 7 + col as u64))?;
                *cell = DayCell {
                    date,
                    in_month: date.month() == month && date.year() == year,
                    has_appointment: booked.contains(&date),
                };
            }
            weeks.push(week);
        }
        Some(Self { first, weeks })
    }

    pub fn for_date(date: NaiveDate, appointments: &[Appointment]) -> Option<Self> {
        Self::build(date.year(), date.month(), appointments)
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn weeks(&self) -> &[[DayCell; 7]] {
        &self.weeks
    }

    pub fn cell(&self, date: NaiveDate) -> Option<&DayCell> {
        self.weeks.iter().flatten().find(|c| c.date == date)
    }

    /// In-month days flagged as having a live booking.
    pub fn flagged_days(&self) -> Vec<NaiveDate> {
        self.weeks
            .iter()
            .flatten()
            .filter(|c| c.in_month && c.has_appointment)
            .map(|c| c.date)
            .collect()
    }

    pub fn previous(&self, appointments: &[Appointment]) -> Option<Self> {
        Self::for_date(self.first.checked_sub_months(Months::new(1))?, appointments)
    }

    pub fn next(&self, appointments: &[Appointment]) -> Option<Self> {
        Self::for_date(self.first.checked_add_months(Months::new(1))?, appointments)
    }
}

impl fmt::Display for MonthGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:^27}", self.first.format("%B %Y").to_string())?;
        writeln!(f, "Su  Mo  Tu  We  Th  Fr  Sa")?;
        for week in &self.weeks {
            let line: Vec<String> = week
                .iter()
                .map(|c| {
                    if !c.in_month {
                        "   ".to_string()
                    } else {
                        let mark = if c.has_appointment { '*' } else { ' ' };
                        format!("{:>2}{mark}", c.date.day())
                    }
                })
                .collect();
            writeln!(f, "{}", line.join(" ").trim_end())?;
        }
        Ok(())
    }
}
