use super::input::{OperatorCommand, OperatorInput};
use crate::errors::FocusError;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;

/// Terminal keyboard in raw mode.
///
/// | key       | command           |
/// |-----------|-------------------|
/// | `j`       | step out (far)    |
/// | `k`       | step in (near)    |
/// | `n`       | drive to near end |
/// | `f`       | drive to far end  |
/// | `r`       | reset autofocus   |
/// | `a`       | toggle autofocus  |
/// | `q` `Esc` | quit              |
///
/// Raw mode swallows ctrl-c, so it is mapped to quit as well.
pub struct KeyboardInput {
    _private: (),
}

impl KeyboardInput {
    pub fn new() -> Result<Self, FocusError> {
        enable_raw_mode()
            .map_err(|e| FocusError::Input(format!("Failed to enable raw mode: {}", e)))?;
        Ok(Self { _private: () })
    }

    pub fn map_key(code: KeyCode, modifiers: KeyModifiers) -> Option<OperatorCommand> {
        match code {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                Some(OperatorCommand::Quit)
            }
            KeyCode::Char('j') => Some(OperatorCommand::StepOut),
            KeyCode::Char('k') => Some(OperatorCommand::StepIn),
            KeyCode::Char('n') => Some(OperatorCommand::DriveNear),
            KeyCode::Char('f') => Some(OperatorCommand::DriveFar),
            KeyCode::Char('r') => Some(OperatorCommand::Reset),
            KeyCode::Char('a') => Some(OperatorCommand::ToggleAutofocus),
            KeyCode::Char('q') | KeyCode::Esc => Some(OperatorCommand::Quit),
            _ => None,
        }
    }
}

impl OperatorInput for KeyboardInput {
    fn poll(&mut self) -> Result<Option<OperatorCommand>, FocusError> {
        while event::poll(Duration::ZERO)
            .map_err(|e| FocusError::Input(format!("Failed to poll keyboard: {}", e)))?
        {
            let event =
                event::read().map_err(|e| FocusError::Input(format!("Failed to read key: {}", e)))?;
            if let Event::Key(key) = event {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(command) = Self::map_key(key.code, key.modifiers) {
                    return Ok(Some(command));
                }
            }
        }
        Ok(None)
    }
}

impl Drop for KeyboardInput {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            log::warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_map() {
        let none = KeyModifiers::NONE;
        assert_eq!(
            KeyboardInput::map_key(KeyCode::Char('j'), none),
            Some(OperatorCommand::StepOut)
        );
        assert_eq!(
            KeyboardInput::map_key(KeyCode::Char('k'), none),
            Some(OperatorCommand::StepIn)
        );
        assert_eq!(
            KeyboardInput::map_key(KeyCode::Esc, none),
            Some(OperatorCommand::Quit)
        );
        assert_eq!(
            KeyboardInput::map_key(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Some(OperatorCommand::Quit)
        );
        assert_eq!(KeyboardInput::map_key(KeyCode::Char('c'), none), None);
        assert_eq!(KeyboardInput::map_key(KeyCode::Char('x'), none), None);
    }
}
