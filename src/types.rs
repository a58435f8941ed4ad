// src/types.rs
use std::str::FromStr;
use crate::acquisition::{ScopeError, Thresholds, TriggerMode};
// Control-surface requests sent to the tick thread
#[derive(Clone, Debug, PartialEq)]
pub enum ControlCommand {
    SetSampleRate(u32),
    ToggleChannel(usize),
    SetTriggerMode(TriggerMode),
    SetAutoRange(bool),
    SetLevels(Thresholds),
    TogglePaused,
    ToggleOneshot,
    Reset,
    Status,
    Quit,
}
impl FromStr for ControlCommand {
    type Err = ScopeError;
    /// One command per line, e.g. `rate 25000000`, `channel 1`, `trigger falling`, `levels 0.5 2.5`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or("");
        let arg = words.next();
        let command = match (verb, arg) {
            ("rate", Some(rate)) => ControlCommand::SetSampleRate(parse_number(rate)?),
            ("channel", Some(index)) => ControlCommand::ToggleChannel(parse_number(index)?),
            ("trigger", Some(mode)) => ControlCommand::SetTriggerMode(mode.parse()?),
            ("auto", Some("on")) => ControlCommand::SetAutoRange(true),
            ("auto", Some("off")) => ControlCommand::SetAutoRange(false),
            ("levels", Some(low)) => {
                let high = words.next().ok_or_else(|| {
                    ScopeError::InvalidConfig("levels needs a low and a high voltage".into())
                })?;
                ControlCommand::SetLevels(Thresholds::new(parse_number(low)?, parse_number(high)?)?)
            }
            ("pause", None) => ControlCommand::TogglePaused,
            ("oneshot", None) => ControlCommand::ToggleOneshot,
            ("reset", None) => ControlCommand::Reset,
            ("status", None) => ControlCommand::Status,
            ("quit", None) | ("exit", None) => ControlCommand::Quit,
            _ => {
                return Err(ScopeError::InvalidConfig(format!(
                    "unrecognized command `{}`",
                    line.trim()
                )))
            }
        };
        if words.next().is_some() {
            return Err(ScopeError::InvalidConfig(format!(
                "trailing arguments in `{}`",
                line.trim()
            )));
        }
        Ok(command)
    }
}
fn parse_number<T: FromStr>(word: &str) -> Result<T, ScopeError> {
    word.parse()
        .map_err(|_| ScopeError::InvalidConfig(format!("`{word}` is not a number")))
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn parses_control_commands() {
        assert_eq!("rate 25000000".parse(), Ok(ControlCommand::SetSampleRate(25_000_000)));
        assert_eq!("channel 1".parse(), Ok(ControlCommand::ToggleChannel(1)));
        assert_eq!(
            "trigger falling".parse(),
            Ok(ControlCommand::SetTriggerMode(TriggerMode::FallingEdge))
        );
        assert_eq!("  auto on ".parse(), Ok(ControlCommand::SetAutoRange(true)));
        assert_eq!("pause".parse(), Ok(ControlCommand::TogglePaused));
        assert_eq!("oneshot".parse(), Ok(ControlCommand::ToggleOneshot));
        assert_eq!("reset".parse(), Ok(ControlCommand::Reset));
        assert_eq!("exit".parse(), Ok(ControlCommand::Quit));
        assert_eq!(
            "levels 0.4 2.6".parse(),
            Ok(ControlCommand::SetLevels(Thresholds { low: 0.4, high: 2.6 }))
        );
    }
    #[test]
    fn rejects_malformed_commands() {
        assert_eq!(
            "trigger level".parse::<ControlCommand>(),
            Err(ScopeError::UnknownTriggerMode("level".into()))
        );
        assert!("rate fast".parse::<ControlCommand>().is_err());
        assert!("channel".parse::<ControlCommand>().is_err());
        assert!("pause now".parse::<ControlCommand>().is_err());
        assert!("levels 1.0".parse::<ControlCommand>().is_err());
        assert!("levels 1.0 2.0 3.0".parse::<ControlCommand>().is_err());
        assert_eq!(
            "levels 2.0 1.0".parse::<ControlCommand>(),
            Err(ScopeError::InvalidThresholds { low: 2.0, high: 1.0 })
        );
        assert!("".parse::<ControlCommand>().is_err());
    }
}
