//! Wizard controller state machine.
//!
//! `Editing(i) → Editing(i±1)` on navigation, `Editing(last) → Submitting`
//! on completion, then `Completed` on success or back to `Editing(last)`
//! with the error attached so the user can retry. `Unmounted` is terminal:
//! the owning view is gone and only the draft outlives the controller.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WizardState {
    Editing {
        step: usize,
        /// Message of the last failed submission, cleared on navigation.
        last_error: Option<String>,
    },
    Submitting,
    Completed,
    Unmounted,
}

impl WizardState {
    pub fn editing(step: usize) -> Self {
        Self::Editing {
            step,
            last_error: None,
        }
    }

    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &WizardState) -> bool {
        use WizardState::*;
        match (self, target) {
            (Editing { step: from, .. }, Editing { step: to, .. }) => from.abs_diff(*to) <= 1,
            (Editing { .. }, Submitting) => true,
            (Submitting, Completed) | (Submitting, Editing { .. }) => true,
            (Editing { .. } | Submitting, Unmounted) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Unmounted)
    }

    /// Current step index while editing.
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::Editing { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        match self {
            Self::Editing { last_error, .. } => last_error.as_deref(),
            _ => None,
        }
    }
}

impl Default for WizardState {
    fn default() -> Self {
        Self::editing(0)
    }
}

impl std::fmt::Display for WizardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Editing { step, .. } => write!(f, "editing step {step}"),
            Self::Submitting => write!(f, "submitting"),
            Self::Completed => write!(f, "completed"),
            Self::Unmounted => write!(f, "unmounted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        let transitions = [
            (WizardState::editing(0), WizardState::editing(1)),
            (WizardState::editing(2), WizardState::editing(1)),
            (WizardState::editing(3), WizardState::Submitting),
            (WizardState::Submitting, WizardState::Completed),
            (WizardState::editing(1), WizardState::Unmounted),
            (WizardState::Submitting, WizardState::Unmounted),
            (
                WizardState::Submitting,
                WizardState::Editing {
                    step: 3,
                    last_error: Some("boom".into()),
                },
            ),
        ];
        for (from, to) in transitions {
            assert!(from.can_transition_to(&to), "{from} should reach {to}");
        }
    }

    #[test]
    fn invalid_transitions() {
        // Skipping steps
        assert!(!WizardState::editing(0).can_transition_to(&WizardState::editing(2)));
        // Completing without submitting
        assert!(!WizardState::editing(3).can_transition_to(&WizardState::Completed));
        // Terminal
        assert!(!WizardState::Completed.can_transition_to(&WizardState::editing(0)));
        assert!(!WizardState::Completed.can_transition_to(&WizardState::Submitting));
        assert!(!WizardState::Unmounted.can_transition_to(&WizardState::editing(0)));
        assert!(WizardState::Unmounted.is_terminal());
    }

    #[test]
    fn default_is_first_step() {
        let state = WizardState::default();
        assert_eq!(state.step(), Some(0));
        assert!(state.last_error().is_none());
        assert!(!state.is_terminal());
    }

    #[test]
    fn serializes_with_state_tag() {
        let json = serde_json::to_value(WizardState::Editing {
            step: 2,
            last_error: Some("network".into()),
        })
        .unwrap();
        assert_eq!(json["state"], "editing");
        assert_eq!(json["step"], 2);
        assert_eq!(json["last_error"], "network");
        assert_eq!(
            serde_json::to_value(WizardState::Completed).unwrap()["state"],
            "completed"
        );
    }
}
