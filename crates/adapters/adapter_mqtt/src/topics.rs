//! Topic layout and inbound command parsing.
//!
//! ```text
//! {base}/hru/{unit}/state                   device state (JSON)
//! {base}/hru/{unit}/status                  online / offline (retained)
//! {base}/hru/{unit}/boost_duration          stored boost duration (retained)
//! {base}/hru/{unit}/boost_duration/set      ← set boost duration
//! {base}/hru/{unit}/boost/cancel            ← cancel boost
//! {base}/hru/{unit}/boost/{modeId}/start    ← start boost with a mode
//! {prefix}/{component}/{base}_hru_{unit}/{entity}/config   discovery
//! ```

use luftuj_app::ports::BridgeCommand;
use luftuj_domain::id::ModeId;

use crate::error::MqttError;

/// Every topic of one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    base: String,
    unit: String,
    root: String,
    node_id: String,
    discovery_prefix: String,
}

impl Topics {
    #[must_use]
    pub fn new(base: &str, discovery_prefix: &str, unit: &str) -> Self {
        Self {
            base: base.to_string(),
            unit: unit.to_string(),
            root: format!("{base}/hru/{unit}"),
            node_id: format!("{base}_hru_{unit}"),
            discovery_prefix: discovery_prefix.to_string(),
        }
    }

    /// Same layout, another unit.
    #[must_use]
    pub fn for_unit(&self, unit: &str) -> Self {
        Self::new(&self.base, &self.discovery_prefix, unit)
    }

    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Identifier of the unit in Home Assistant, also the prefix of every
    /// `unique_id`.
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    #[must_use]
    pub fn state(&self) -> String {
        format!("{}/state", self.root)
    }

    #[must_use]
    pub fn status(&self) -> String {
        format!("{}/status", self.root)
    }

    #[must_use]
    pub fn boost_duration(&self) -> String {
        format!("{}/boost_duration", self.root)
    }

    #[must_use]
    pub fn boost_duration_set(&self) -> String {
        format!("{}/boost_duration/set", self.root)
    }

    #[must_use]
    pub fn boost_cancel(&self) -> String {
        format!("{}/boost/cancel", self.root)
    }

    #[must_use]
    pub fn boost_start(&self, mode_id: ModeId) -> String {
        format!("{}/boost/{mode_id}/start", self.root)
    }

    /// Subscriptions needed to receive every command.
    #[must_use]
    pub fn command_filters(&self) -> Vec<String> {
        vec![
            self.boost_duration_set(),
            self.boost_cancel(),
            format!("{}/boost/+/start", self.root),
        ]
    }

    #[must_use]
    pub fn discovery(&self, component: &str, entity: &str) -> String {
        format!(
            "{}/{component}/{}/{entity}/config",
            self.discovery_prefix, self.node_id
        )
    }

    /// Parse an inbound message. `Ok(None)` for topics that carry no command.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::InvalidPayload`] for a command topic whose
    /// payload or mode id cannot be parsed.
    pub fn parse_command(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> Result<Option<BridgeCommand>, MqttError> {
        let Some(rest) = topic
            .strip_prefix(self.root.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            return Ok(None);
        };
        let invalid = || MqttError::InvalidPayload {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
        };

        match rest.split('/').collect::<Vec<_>>().as_slice() {
            ["boost_duration", "set"] => {
                let minutes = parse_minutes(payload).ok_or_else(invalid)?;
                Ok(Some(BridgeCommand::SetBoostDuration(minutes)))
            }
            ["boost", "cancel"] => Ok(Some(BridgeCommand::CancelBoost)),
            ["boost", mode_id, "start"] => {
                let mode_id = mode_id.parse::<ModeId>().map_err(|_| invalid())?;
                Ok(Some(BridgeCommand::StartBoost { mode_id }))
            }
            _ => Ok(None),
        }
    }
}

/// Home Assistant number entities may send `45` or `45.0`.
fn parse_minutes(payload: &[u8]) -> Option<u32> {
    let text = std::str::from_utf8(payload).ok()?.trim();
    if let Ok(minutes) = text.parse::<u32>() {
        return Some(minutes);
    }
    let value = text.parse::<f64>().ok()?;
    if !value.is_finite() || value < 0.0 || value > f64::from(u32::MAX) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(value.round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics() -> Topics {
        Topics::new("luftuj", "homeassistant", "atrea_rd5")
    }

    #[test]
    fn should_build_unit_topics() {
        let topics = topics();
        assert_eq!(topics.state(), "luftuj/hru/atrea_rd5/state");
        assert_eq!(topics.status(), "luftuj/hru/atrea_rd5/status");
        assert_eq!(
            topics.boost_start(ModeId::new(4)),
            "luftuj/hru/atrea_rd5/boost/4/start"
        );
        assert_eq!(
            topics.discovery("sensor", "power"),
            "homeassistant/sensor/luftuj_hru_atrea_rd5/power/config"
        );
    }

    #[test]
    fn should_move_every_topic_to_another_unit() {
        let moved = topics().for_unit("xvent");

        assert_eq!(moved.unit(), "xvent");
        assert_eq!(moved.node_id(), "luftuj_hru_xvent");
        assert_eq!(moved.status(), "luftuj/hru/xvent/status");
        assert_eq!(
            moved.discovery("button", "boost_cancel"),
            "homeassistant/button/luftuj_hru_xvent/boost_cancel/config"
        );
        assert_eq!(
            moved.parse_command("luftuj/hru/xvent/boost/cancel", b"").unwrap(),
            Some(BridgeCommand::CancelBoost)
        );
        assert_eq!(moved.parse_command("luftuj/hru/atrea_rd5/boost/cancel", b"").unwrap(), None);
    }

    #[test]
    fn should_parse_boost_start() {
        let command = topics()
            .parse_command("luftuj/hru/atrea_rd5/boost/12/start", b"PRESS")
            .unwrap();
        assert_eq!(
            command,
            Some(BridgeCommand::StartBoost {
                mode_id: ModeId::new(12)
            })
        );
    }

    #[test]
    fn should_parse_cancel_regardless_of_payload() {
        let command = topics()
            .parse_command("luftuj/hru/atrea_rd5/boost/cancel", b"")
            .unwrap();
        assert_eq!(command, Some(BridgeCommand::CancelBoost));
    }

    #[test]
    fn should_parse_integer_and_float_durations() {
        let topics = topics();
        for (payload, expected) in [(&b"45"[..], 45), (b"45.0", 45), (b" 90 ", 90)] {
            let command = topics
                .parse_command("luftuj/hru/atrea_rd5/boost_duration/set", payload)
                .unwrap();
            assert_eq!(command, Some(BridgeCommand::SetBoostDuration(expected)));
        }
    }

    #[test]
    fn should_reject_unparseable_duration() {
        let result = topics().parse_command("luftuj/hru/atrea_rd5/boost_duration/set", b"-3");
        assert!(matches!(result, Err(MqttError::InvalidPayload { .. })));
    }

    #[test]
    fn should_reject_non_numeric_mode_id() {
        let result = topics().parse_command("luftuj/hru/atrea_rd5/boost/party/start", b"PRESS");
        assert!(matches!(result, Err(MqttError::InvalidPayload { .. })));
    }

    #[test]
    fn should_ignore_foreign_topics() {
        let topics = topics();
        assert_eq!(topics.parse_command("luftuj/hru/other/boost/cancel", b"").unwrap(), None);
        assert_eq!(topics.parse_command("luftuj/hru/atrea_rd5/state", b"{}").unwrap(), None);
    }
}
