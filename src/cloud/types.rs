// src/cloud/types.rs

//! Wire types of the deployment-events API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::client::Validate;
use crate::lifecycle::validate_sequence;
use crate::types::LifecycleState;

/// One lifecycle transition as submitted to the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudEvent {
    pub run_id: String,
    pub stack_id: String,
    pub state: LifecycleState,
    /// Zero-based position of this transition in the stack's history.
    pub position: usize,
}

/// Acknowledgement for a recorded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAck {
    pub stack_id: String,
    pub position: usize,
}

impl Validate for EventAck {
    fn validate(&self) -> Result<(), String> {
        if self.stack_id.trim().is_empty() {
            return Err("acknowledgement carries an empty stack_id".to_string());
        }
        Ok(())
    }
}

/// Recorded event log of a run: stack id -> states in the order observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventsResponse(pub BTreeMap<String, Vec<LifecycleState>>);

impl EventsResponse {
    pub fn get(&self, stack_id: &str) -> Option<&[LifecycleState]> {
        self.0.get(stack_id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<LifecycleState>> {
        self.0
    }
}

impl Validate for EventsResponse {
    /// Every recorded sequence must be a legal lifecycle prefix.
    fn validate(&self) -> Result<(), String> {
        for (stack_id, states) in &self.0 {
            if stack_id.trim().is_empty() {
                return Err("event log contains an empty stack id".to_string());
            }
            validate_sequence(stack_id, states).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleState::*;

    #[test]
    fn events_response_decodes_state_names() {
        let res: EventsResponse =
            serde_json::from_str(r#"{"stack-id-1": ["pending", "running", "ok"]}"#).unwrap();
        assert_eq!(res.get("stack-id-1"), Some(&[Pending, Running, Ok][..]));
        assert!(res.validate().is_ok());
    }

    #[test]
    fn out_of_order_log_fails_validation() {
        let res: EventsResponse =
            serde_json::from_str(r#"{"s1": ["running", "pending"]}"#).unwrap();
        let err = res.validate().unwrap_err();
        assert!(err.contains("s1"), "{err}");
    }

    #[test]
    fn unknown_state_name_is_a_decode_error() {
        let res = serde_json::from_str::<EventsResponse>(r#"{"s1": ["done"]}"#);
        assert!(res.is_err());
    }

    #[test]
    fn event_serializes_with_lowercase_state() {
        let ev = CloudEvent {
            run_id: "r".into(),
            stack_id: "s".into(),
            state: Canceled,
            position: 2,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["state"], "canceled");
        assert_eq!(json["position"], 2);
    }
}
