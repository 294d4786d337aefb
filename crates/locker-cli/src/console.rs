//! Stdin commands for the emulated peripherals.
//!
//! ```text
//! key <chars>            press keypad keys, e.g. `key #12345678#`
//! door open|closed       move the door
//! item present|absent    place or remove the item
//! raw <door> <item>      set raw IR readings directly
//! status                 log the current locker state
//! quit                   stop the locker
//! ```

use anyhow::{Context, Result, anyhow, bail};
use locker_hardware::MockPeripheralHandles;

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Keys(String),
    Door { closed: bool },
    Item { present: bool },
    Raw { door: u16, item: u16 },
    Status,
    Quit,
}

impl ConsoleCommand {
    /// Parse one line. Blank lines and `//` comments yield `None`.
    ///
    /// # Errors
    ///
    /// Fails on an unknown command or a malformed argument.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        let Some((command, rest)) = split_command(line) else {
            return Ok(None);
        };

        let command = match command.to_ascii_lowercase().as_str() {
            "key" | "keys" => {
                if rest.is_empty() {
                    bail!("usage: key <chars>");
                }
                ConsoleCommand::Keys(rest.split_whitespace().collect())
            }
            "door" => ConsoleCommand::Door {
                closed: match rest {
                    "open" => false,
                    "closed" | "close" => true,
                    _ => bail!("usage: door open|closed"),
                },
            },
            "item" => ConsoleCommand::Item {
                present: match rest {
                    "present" | "in" => true,
                    "absent" | "out" => false,
                    _ => bail!("usage: item present|absent"),
                },
            },
            "raw" => {
                let mut values = rest.split_whitespace();
                let (Some(door), Some(item), None) = (values.next(), values.next(), values.next()) else {
                    bail!("usage: raw <door> <item>");
                };
                ConsoleCommand::Raw {
                    door: door.parse().with_context(|| format!("invalid door reading: {door}"))?,
                    item: item.parse().with_context(|| format!("invalid item reading: {item}"))?,
                }
            }
            "status" => ConsoleCommand::Status,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => bail!("unknown command: {other}"),
        };

        Ok(Some(command))
    }

    /// Apply a peripheral command to the mock devices.
    ///
    /// # Errors
    ///
    /// Fails if a key character is not on the keypad.
    pub fn apply(&self, hw: &MockPeripheralHandles) -> Result<()> {
        match self {
            ConsoleCommand::Keys(keys) => hw.keypad.type_keys(keys).map_err(|e| anyhow!("{e}"))?,
            ConsoleCommand::Door { closed } => hw.set_door_closed(*closed),
            ConsoleCommand::Item { present } => hw.set_item_present(*present),
            ConsoleCommand::Raw { door, item } => hw.set_raw(*door, *item),
            ConsoleCommand::Status | ConsoleCommand::Quit => {}
        }
        Ok(())
    }
}

/// Command word and the trimmed rest, or `None` for blank and comment lines.
fn split_command(line: &str) -> Option<(&str, &str)> {
    if line.is_empty() || line.starts_with("//") {
        return None;
    }
    match line.split_once(char::is_whitespace) {
        Some((command, rest)) => Some((command, rest.trim())),
        None => Some((line, "")),
    }
}
