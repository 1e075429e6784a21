//! Operator commands sent from the input thread to the scan loop

use super::state::OperatorControls;

/// Commands parsed from operator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Raise the threshold by one step
    ThresholdUp,
    /// Lower the threshold by one step
    ThresholdDown,
    /// Set the threshold to an absolute value (clamped)
    SetThreshold(i32),
    /// Advance the rotation cycle
    Rotate,
    /// Save the last raw and processed images
    SaveImages,
    /// Show label text for a completed serial
    PrintLabel(String),
    /// List the history
    ListHistory,
    /// Stop the scan loop
    Quit,
}

impl OperatorCommand {
    /// Parse one line of operator input
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        match head {
            "+" => Some(OperatorCommand::ThresholdUp),
            "-" => Some(OperatorCommand::ThresholdDown),
            "t" => rest.parse().ok().map(OperatorCommand::SetThreshold),
            "r" => Some(OperatorCommand::Rotate),
            "s" => Some(OperatorCommand::SaveImages),
            "p" if !rest.is_empty() => Some(OperatorCommand::PrintLabel(rest.to_string())),
            "l" => Some(OperatorCommand::ListHistory),
            "q" => Some(OperatorCommand::Quit),
            _ => None,
        }
    }

    /// Apply the command to the controls if it changes them.
    ///
    /// Returns `true` when the controls were modified.
    pub fn apply(&self, controls: &mut OperatorControls) -> bool {
        match self {
            OperatorCommand::ThresholdUp => {
                controls.nudge_threshold(controls.threshold_step);
            }
            OperatorCommand::ThresholdDown => {
                controls.nudge_threshold(-controls.threshold_step);
            }
            OperatorCommand::SetThreshold(value) => {
                controls.set_threshold(*value);
            }
            OperatorCommand::Rotate => {
                controls.advance_rotation();
            }
            _ => return false,
        }
        true
    }
}
