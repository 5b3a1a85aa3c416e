use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// What the delegate does with the event stream.
///
/// - `Producer`: emits events on its own; stdout is decoded.
/// - `Transformer`: receives events and emits new ones (default).
/// - `Consumer`: receives events only; stdout is never read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    Producer,
    Transformer,
    Consumer,
}

impl Behavior {
    /// Whether the delegate's stdout is decoded into events.
    pub fn reads_output(self) -> bool {
        matches!(self, Behavior::Producer | Behavior::Transformer)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Behavior::Producer => "producer",
            Behavior::Transformer => "transformer",
            Behavior::Consumer => "consumer",
        }
    }
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior::Transformer
    }
}

impl FromStr for Behavior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "producer" => Ok(Behavior::Producer),
            "transformer" => Ok(Behavior::Transformer),
            "consumer" => Ok(Behavior::Consumer),
            other => Err(format!(
                "unknown behavior '{other}' (expected \"producer\", \"transformer\" or \"consumer\")"
            )),
        }
    }
}

impl std::fmt::Display for Behavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too large", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn behavior_parses_case_insensitively() {
        assert_eq!("Producer".parse::<Behavior>(), Ok(Behavior::Producer));
        assert_eq!(" consumer ".parse::<Behavior>(), Ok(Behavior::Consumer));
        assert!("bogus".parse::<Behavior>().unwrap_err().contains("bogus"));
    }

    #[test]
    fn only_consumer_skips_output() {
        assert!(Behavior::Producer.reads_output());
        assert!(Behavior::Transformer.reads_output());
        assert!(!Behavior::Consumer.reads_output());
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert!(parse_duration("5").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("").is_err());
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert!(parse_duration("9999999999999999999h").unwrap_err().contains("too large"));
        assert!(parse_duration("999999999999999999999s").is_err());
    }
}
