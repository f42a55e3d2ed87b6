//! Booking steps shown in the progress indicator.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// One step of the booking flow, in order.
pub enum Step {
    /// Postcode lookup.
    Postcode,
    /// Waste type selection.
    WasteType,
    /// Skip size selection.
    SelectSkip,
    /// Delivery date selection.
    ChooseDate,
    /// Payment.
    Payment,
}

impl Step {
    /// All steps in booking order.
    pub const ALL: [Step; 5] = [
        Step::Postcode,
        Step::WasteType,
        Step::SelectSkip,
        Step::ChooseDate,
        Step::Payment,
    ];

    /// Step following this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Step> {
        match self {
            Step::Postcode => Some(Step::WasteType),
            Step::WasteType => Some(Step::SelectSkip),
            Step::SelectSkip => Some(Step::ChooseDate),
            Step::ChooseDate => Some(Step::Payment),
            Step::Payment => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = match self {
            Step::Postcode => "Postcode",
            Step::WasteType => "Waste Type",
            Step::SelectSkip => "Select Skip",
            Step::ChooseDate => "Choose Date",
            Step::Payment => "Payment",
        };
        write!(formatter, "{title}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How a step is rendered relative to the user's position.
pub enum StepStatus {
    /// Already done.
    Completed,
    /// Being worked on.
    Current,
    /// Not reached yet.
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Position in the booking flow.
pub struct Progress {
    current: Step,
    completed: Vec<Step>,
}

impl Progress {
    /// Start at `current` with the given steps already done.
    #[must_use]
    pub fn new(current: Step, completed: &[Step]) -> Self {
        Self {
            current,
            completed: completed.to_vec(),
        }
    }

    /// Step being worked on.
    #[must_use]
    pub fn current(&self) -> Step {
        self.current
    }

    /// Status of `step`; a completed step wins over being current.
    #[must_use]
    pub fn status(&self, step: Step) -> StepStatus {
        if self.completed.contains(&step) {
            StepStatus::Completed
        } else if step == self.current {
            StepStatus::Current
        } else {
            StepStatus::Upcoming
        }
    }

    /// Mark the current step done and move to the next one.
    pub fn complete_current(&mut self) {
        if !self.completed.contains(&self.current) {
            self.completed.push(self.current);
        }
        if let Some(next) = self.current.next() {
            self.current = next;
        }
    }
}

impl Default for Progress {
    /// Skip selection, reached after the postcode and waste type steps.
    fn default() -> Self {
        Self::new(Step::SelectSkip, &[Step::Postcode, Step::WasteType])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_progress_sits_on_skip_selection() {
        let progress = Progress::default();
        assert_eq!(progress.status(Step::Postcode), StepStatus::Completed);
        assert_eq!(progress.status(Step::SelectSkip), StepStatus::Current);
        assert_eq!(progress.status(Step::Payment), StepStatus::Upcoming);
    }

    #[test]
    fn completing_moves_forward_and_stops_at_payment() {
        let mut progress = Progress::default();
        progress.complete_current();
        assert_eq!(progress.current(), Step::ChooseDate);
        assert_eq!(progress.status(Step::SelectSkip), StepStatus::Completed);

        progress.complete_current();
        progress.complete_current();
        assert_eq!(progress.current(), Step::Payment);
        assert_eq!(progress.status(Step::Payment), StepStatus::Completed);
    }
}
