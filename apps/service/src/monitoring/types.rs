use serde::{Deserialize, Serialize};
use std::fmt;

/// Health verdict of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Up,
    Down,
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorStatus::Up => write!(f, "up"),
            MonitorStatus::Down => write!(f, "down"),
        }
    }
}

/// What the target answered, if anything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum ProbeStatus {
    /// An HTTP response arrived with this status code
    Responded(u16),
    /// DNS failure, refused connection, timeout, malformed address, ...
    NoResponse,
}

impl ProbeStatus {
    pub fn code(&self) -> Option<u16> {
        match self {
            ProbeStatus::Responded(code) => Some(*code),
            ProbeStatus::NoResponse => None,
        }
    }

    /// Numeric form where `0` stands for "no response"
    pub fn legacy_code(&self) -> u16 {
        self.code().unwrap_or(0)
    }

    pub fn is_up(&self) -> bool {
        matches!(self, ProbeStatus::Responded(code) if (200..300).contains(code))
    }

    pub fn verdict(&self) -> MonitorStatus {
        if self.is_up() { MonitorStatus::Up } else { MonitorStatus::Down }
    }

    /// Human-readable reason used as incident description; `None` when up.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            _ if self.is_up() => None,
            ProbeStatus::NoResponse => Some("Timeout or DNS error".to_string()),
            ProbeStatus::Responded(code) => Some(format!("HTTP error {code}")),
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Responded(code) => write!(f, "HTTP {code}"),
            ProbeStatus::NoResponse => write!(f, "no response"),
        }
    }
}

/// Normalized result of one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: ProbeStatus,
    pub elapsed_ms: u64,
}

impl Outcome {
    pub fn responded(code: u16, elapsed_ms: u64) -> Self {
        Self { status: ProbeStatus::Responded(code), elapsed_ms }
    }

    pub fn no_response(elapsed_ms: u64) -> Self {
        Self { status: ProbeStatus::NoResponse, elapsed_ms }
    }

    pub fn is_up(&self) -> bool {
        self.status.is_up()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_2xx_is_up() {
        assert!(ProbeStatus::Responded(200).is_up());
        assert!(ProbeStatus::Responded(204).is_up());
        assert!(ProbeStatus::Responded(299).is_up());
        assert!(!ProbeStatus::Responded(199).is_up());
        assert!(!ProbeStatus::Responded(301).is_up());
        assert!(!ProbeStatus::Responded(404).is_up());
        assert!(!ProbeStatus::NoResponse.is_up());
    }

    #[test]
    fn failure_reasons() {
        assert_eq!(ProbeStatus::Responded(200).failure_reason(), None);
        assert_eq!(
            ProbeStatus::Responded(500).failure_reason().as_deref(),
            Some("HTTP error 500")
        );
        assert_eq!(
            ProbeStatus::NoResponse.failure_reason().as_deref(),
            Some("Timeout or DNS error")
        );
    }

    #[test]
    fn legacy_sentinel_is_zero() {
        assert_eq!(ProbeStatus::NoResponse.legacy_code(), 0);
        assert_eq!(ProbeStatus::NoResponse.code(), None);
        assert_eq!(ProbeStatus::Responded(503).legacy_code(), 503);
    }

    #[test]
    fn serializes_as_tagged_variant() {
        let json = serde_json::to_value(Outcome::responded(200, 42)).unwrap();
        assert_eq!(json["status"]["kind"], "responded");
        assert_eq!(json["status"]["code"], 200);

        let json = serde_json::to_value(Outcome::no_response(3_000)).unwrap();
        assert_eq!(json["status"]["kind"], "no_response");
    }
}
