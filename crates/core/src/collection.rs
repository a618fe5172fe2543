use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::appointment::AppointmentCategory;
use crate::errors::BusinessRuleViolation;
use crate::intent::Intent;
use crate::protocol::AgendaOperation;
use crate::schedule;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingOperation {
    Create,
    Cancel,
    Reschedule,
}

impl PendingOperation {
    pub fn from_intent(intent: Intent) -> Option<Self> {
        match intent {
            Intent::Create => Some(Self::Create),
            Intent::Cancel => Some(Self::Cancel),
            Intent::Reschedule => Some(Self::Reschedule),
            _ => None,
        }
    }

    pub fn intent(&self) -> Intent {
        match self {
            Self::Create => Intent::Create,
            Self::Cancel => Intent::Cancel,
            Self::Reschedule => Intent::Reschedule,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStage {
    AwaitingName,
    AwaitingCategory,
    AwaitingDate,
    AwaitingTime,
    AwaitingConfirmation,
    Dispatched,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedSlot {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

/// Partial slots gathered so far for one pending operation. Persisted on the
/// conversation between turns; the stage is always derived from the missing
/// fields, so out-of-order answers simply shrink the remaining work.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectionForm {
    pub operation: PendingOperation,
    pub full_name: Option<String>,
    pub category: Option<AppointmentCategory>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub proposed: Option<ProposedSlot>,
    pub dispatched: bool,
    pub started_turn: u32,
    pub updated_turn: u32,
}

impl CollectionForm {
    pub fn new(operation: PendingOperation, turn: u32) -> Self {
        Self {
            operation,
            full_name: None,
            category: None,
            date: None,
            time: None,
            proposed: None,
            dispatched: false,
            started_turn: turn,
            updated_turn: turn,
        }
    }

    pub fn stage(&self) -> CollectionStage {
        if self.dispatched {
            return CollectionStage::Dispatched;
        }
        if matches!(self.operation, PendingOperation::Create) {
            if self.full_name.is_none() {
                return CollectionStage::AwaitingName;
            }
            if self.category.is_none() {
                return CollectionStage::AwaitingCategory;
            }
        }
        if self.date.is_none() {
            return CollectionStage::AwaitingDate;
        }
        if self.time.is_none() {
            return CollectionStage::AwaitingTime;
        }
        CollectionStage::AwaitingConfirmation
    }

    /// Abandonment policy for half-collected forms: a form that sat idle for
    /// more than `max_idle_turns` turns is discarded before processing.
    pub fn is_stale(&self, current_turn: u32, max_idle_turns: u32) -> bool {
        current_turn.saturating_sub(self.updated_turn) > max_idle_turns
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Affirmation {
    Affirmative,
    Negative,
    #[default]
    Unclear,
}

/// Fields deterministically extracted from one user turn.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TurnFacts {
    pub full_name: Option<String>,
    pub category: Option<AppointmentCategory>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub weekday: Option<Weekday>,
    pub affirmation: Affirmation,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CollectionStep {
    /// Ask for the next missing field.
    NeedField { stage: CollectionStage },
    /// A supplied date or time violates clinic rules; it was not stored.
    Refused { violation: BusinessRuleViolation, suggested_dates: Vec<NaiveDate> },
    /// All fields present; ask for an explicit go-ahead on this exact slot.
    Confirm { proposed: ProposedSlot },
    /// Explicit confirmation received; exactly one cross-role operation leaves.
    Dispatched { operation: AgendaOperation },
    /// Non-affirmative reply at the confirmation stage; back to collecting.
    Declined { stage: CollectionStage },
}

pub struct CollectionMachine {
    today: NaiveDate,
}

impl CollectionMachine {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn apply(&self, form: &mut CollectionForm, facts: &TurnFacts, turn: u32) -> CollectionStep {
        form.updated_turn = turn;

        if form.stage() == CollectionStage::AwaitingConfirmation {
            let revises = facts.date.is_some() || facts.time.is_some();
            match facts.affirmation {
                Affirmation::Affirmative if !revises => {
                    return match build_operation(form) {
                        Some(operation) => {
                            form.dispatched = true;
                            CollectionStep::Dispatched { operation }
                        }
                        None => CollectionStep::NeedField { stage: form.stage() },
                    };
                }
                _ => {
                    // Anything other than a plain affirmative drops back to
                    // collection; a reply carrying a replacement date or time
                    // is absorbed below and re-proposed.
                    form.proposed = None;
                    if !revises {
                        form.date = None;
                        form.time = None;
                        return CollectionStep::Declined { stage: form.stage() };
                    }
                    if facts.date.is_some() {
                        // A new date invalidates the previously chosen time
                        // unless the reply supplied a replacement.
                        form.time = facts.time;
                    }
                }
            }
        }

        if let Some(name) = &facts.full_name {
            if form.full_name.is_none() {
                form.full_name = Some(name.clone());
            }
        }

        if let Some(category) = facts.category {
            form.category = Some(category);
            // A category supplied after a date forces re-validation: the date
            // may no longer be allowed for insurance.
            if category == AppointmentCategory::Insurance {
                if let Some(date) = form.date {
                    if matches!(form.operation, PendingOperation::Create)
                        && !schedule::insurance_day(date.weekday())
                    {
                        form.date = None;
                        return CollectionStep::Refused {
                            violation: BusinessRuleViolation::InsuranceWeekday {
                                requested: date.weekday(),
                            },
                            suggested_dates: schedule::next_insurance_dates(self.today, 3),
                        };
                    }
                }
            }
        }

        if let Some(date) = facts.date {
            if let Err(step) = self.accept_date(form, date) {
                return step;
            }
        }

        if let Some(time) = facts.time {
            if !schedule::slot_aligned(time) {
                return CollectionStep::Refused {
                    violation: BusinessRuleViolation::OutsideBusinessHours { time },
                    suggested_dates: Vec::new(),
                };
            }
            form.time = Some(time);
        }

        match form.stage() {
            CollectionStage::AwaitingConfirmation => {
                let proposed = match (form.date, form.time) {
                    (Some(date), Some(time)) => ProposedSlot { date, time },
                    _ => return CollectionStep::NeedField { stage: form.stage() },
                };
                form.proposed = Some(proposed);
                CollectionStep::Confirm { proposed }
            }
            stage => CollectionStep::NeedField { stage },
        }
    }

    fn accept_date(&self, form: &mut CollectionForm, date: NaiveDate) -> Result<(), CollectionStep> {
        let creating = matches!(form.operation, PendingOperation::Create);
        let in_the_past = if creating { date <= self.today } else { date < self.today };
        if in_the_past {
            return Err(CollectionStep::Refused {
                violation: BusinessRuleViolation::NotFutureDate { date },
                suggested_dates: Vec::new(),
            });
        }
        if !schedule::is_business_day(date) {
            return Err(CollectionStep::Refused {
                violation: BusinessRuleViolation::NotBusinessDay { date },
                suggested_dates: Vec::new(),
            });
        }
        if creating
            && form.category == Some(AppointmentCategory::Insurance)
            && !schedule::insurance_day(date.weekday())
        {
            return Err(CollectionStep::Refused {
                violation: BusinessRuleViolation::InsuranceWeekday { requested: date.weekday() },
                suggested_dates: schedule::next_insurance_dates(self.today, 3),
            });
        }
        form.date = Some(date);
        Ok(())
    }
}

fn build_operation(form: &CollectionForm) -> Option<AgendaOperation> {
    match form.operation {
        PendingOperation::Create => {
            match (&form.full_name, form.category, form.date, form.time) {
                (Some(name), Some(category), Some(date), Some(time)) => {
                    Some(AgendaOperation::Create {
                        subject: name.clone(),
                        category,
                        date,
                        time,
                    })
                }
                _ => None,
            }
        }
        PendingOperation::Cancel | PendingOperation::Reschedule => match (form.date, form.time) {
            (Some(date), Some(time)) => Some(AgendaOperation::Cancel { date, time }),
            _ => None,
        },
    }
}
