// MIT License - Copyright (c) 2026 Peter Wright

use crate::constants::{is_keypad_key, DELAY_SEPARATOR, MAX_STATUS_REQUEST_ID};
use crate::error::{NessError, Result};

/// Commands that can be sent to the panel.
///
/// Everything the panel accepts is keypad-equivalent input; these variants
/// cover the documented key sequences plus raw keystrings for anything
/// else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `A<code>E` — arm away (the code is optional on most installations)
    ArmAway { code: Option<String> },
    /// `H<code>E` — arm home
    ArmHome { code: Option<String> },
    /// `<code>E` — disarm
    Disarm { code: String },
    /// `*<code>#` — panic
    Panic { code: String },
    /// `<output><output>*` / `<output><output>#` — auxiliary output on/off
    Aux { output: u8, on: bool },
    /// `Sxx` — status request for category `xx` (decimal, 0-33)
    StatusRequest { id: u8 },
    /// A raw keystring, optionally containing `?` delay separators
    Keys { keys: String },
}

impl Command {
    /// Convert the command to its wire string representation.
    pub fn to_wire_string(&self) -> String {
        match self {
            Command::ArmAway { code } => format!("A{}E", code.as_deref().unwrap_or("")),
            Command::ArmHome { code } => format!("H{}E", code.as_deref().unwrap_or("")),
            Command::Disarm { code } => format!("{}E", code),
            Command::Panic { code } => format!("*{}#", code),
            Command::Aux { output, on } => {
                format!("{}{}{}", output, output, if *on { '*' } else { '#' })
            }
            Command::StatusRequest { id } => format!("S{:02}", id),
            Command::Keys { keys } => keys.clone(),
        }
    }

    /// Validate the command before it is queued.
    ///
    /// Failures here are caller mistakes and are reported synchronously at
    /// the call site rather than surfacing from the writer.
    pub fn validate(&self) -> Result<()> {
        match self {
            Command::ArmAway { code } | Command::ArmHome { code } => match code {
                Some(code) => validate_code(code),
                None => Ok(()),
            },
            Command::Disarm { code } | Command::Panic { code } => validate_code(code),
            Command::Aux { output, .. } => {
                if (1..=8).contains(output) {
                    Ok(())
                } else {
                    Err(NessError::InvalidAuxOutput { output: *output })
                }
            }
            Command::StatusRequest { id } => {
                if *id <= MAX_STATUS_REQUEST_ID {
                    Ok(())
                } else {
                    Err(NessError::InvalidStatusId { id: *id })
                }
            }
            Command::Keys { keys } => validate_keystring(keys),
        }
    }
}

/// Check that a keystring only contains keypad characters and delay
/// separators. The panel's input buffer is 30 keys deep.
pub fn validate_keystring(keys: &str) -> Result<()> {
    if keys.is_empty()
        || keys.len() > 30
        || !keys.chars().all(|c| is_keypad_key(c) || c == DELAY_SEPARATOR)
    {
        return Err(NessError::InvalidKeys {
            keys: keys.to_string(),
        });
    }
    Ok(())
}

/// User codes are digit strings.
fn validate_code(code: &str) -> Result<()> {
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(NessError::InvalidKeys {
            keys: code.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_strings() {
        assert_eq!(
            Command::ArmAway {
                code: Some("123".to_string())
            }
            .to_wire_string(),
            "A123E"
        );
        assert_eq!(Command::ArmAway { code: None }.to_wire_string(), "AE");
        assert_eq!(
            Command::ArmHome {
                code: Some("123".to_string())
            }
            .to_wire_string(),
            "H123E"
        );
        assert_eq!(
            Command::Disarm {
                code: "1234".to_string()
            }
            .to_wire_string(),
            "1234E"
        );
        assert_eq!(
            Command::Panic {
                code: "1234".to_string()
            }
            .to_wire_string(),
            "*1234#"
        );
        assert_eq!(
            Command::Aux { output: 3, on: true }.to_wire_string(),
            "33*"
        );
        assert_eq!(
            Command::Aux {
                output: 3,
                on: false
            }
            .to_wire_string(),
            "33#"
        );
        assert_eq!(Command::StatusRequest { id: 0 }.to_wire_string(), "S00");
        assert_eq!(Command::StatusRequest { id: 14 }.to_wire_string(), "S14");
        assert_eq!(Command::StatusRequest { id: 20 }.to_wire_string(), "S20");
    }

    #[test]
    fn test_validate_keystring() {
        assert!(validate_keystring("A1234E").is_ok());
        assert!(validate_keystring("*#").is_ok());
        // Delay separators are allowed in batched input.
        assert!(validate_keystring("A123E?A123E").is_ok());
        assert!(validate_keystring("").is_err());
        assert!(validate_keystring(&"1".repeat(31)).is_err());
        assert!(validate_keystring(&"1".repeat(30)).is_ok());
        assert!(validate_keystring("S00").is_err());
        assert!(validate_keystring("a123e").is_err());
        assert!(validate_keystring("A123E\n").is_err());
    }

    #[test]
    fn test_validate_commands() {
        assert!(Command::ArmAway { code: None }.validate().is_ok());
        assert!(Command::Disarm {
            code: "1234".to_string()
        }
        .validate()
        .is_ok());
        assert!(Command::Disarm {
            code: "12E4".to_string()
        }
        .validate()
        .is_err());
        assert!(Command::Aux { output: 8, on: true }.validate().is_ok());
        assert!(Command::Aux { output: 9, on: true }.validate().is_err());
        assert!(Command::Aux { output: 0, on: true }.validate().is_err());
        assert!(Command::StatusRequest { id: 33 }.validate().is_ok());
        assert!(Command::StatusRequest { id: 34 }.validate().is_err());
    }
}
