//! Shared Flux status block and readiness evaluation
//!
//! Every Flux object reports `status.observedGeneration` and a list of typed
//! conditions. Readiness is evaluated on the raw JSON so the same check works
//! for every kind the agent touches.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Condition type Flux controllers use to signal a successful reconciliation
pub const READY_CONDITION: &str = "Ready";

/// A single status condition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Status block common to the Flux kinds the agent manages
///
/// Kind-specific fields (artifact, lastAppliedRevision, history, ...) are kept
/// in `extra` so a read-modify-write never drops them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FluxStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl FluxStatus {
    /// Find a condition by type
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}

/// Result of evaluating a single resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Controller observed the latest generation and reports Ready=True
    Ready,
    /// Controller has not yet observed the latest spec
    Stale {
        generation: Option<i64>,
        observed_generation: Option<i64>,
    },
    /// Latest generation observed but Ready is not True (or missing)
    NotReady {
        status: Option<String>,
        message: Option<String>,
    },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Readiness::Ready => write!(f, "ready"),
            Readiness::Stale {
                generation,
                observed_generation,
            } => write!(
                f,
                "generation {} not yet observed (observed {})",
                display_generation(*generation),
                display_generation(*observed_generation)
            ),
            Readiness::NotReady { status, message } => {
                write!(f, "Ready={}", status.as_deref().unwrap_or("Unknown"))?;
                if let Some(message) = message {
                    write!(f, ": {}", message)?;
                }
                Ok(())
            }
        }
    }
}

fn display_generation(generation: Option<i64>) -> String {
    generation.map_or_else(|| "none".to_string(), |g| g.to_string())
}

/// Evaluate readiness of a Flux object serialized as JSON
///
/// Ready iff `metadata.generation == status.observedGeneration` and the
/// `Ready` condition has status `"True"`.
pub fn evaluate_readiness(obj: &Value) -> Readiness {
    let generation = obj
        .get("metadata")
        .and_then(|m| m.get("generation"))
        .and_then(Value::as_i64);
    let status = obj.get("status");
    let observed_generation = status
        .and_then(|s| s.get("observedGeneration"))
        .and_then(Value::as_i64);

    if generation != observed_generation {
        return Readiness::Stale {
            generation,
            observed_generation,
        };
    }

    let ready = status
        .and_then(|s| s.get("conditions"))
        .and_then(Value::as_array)
        .and_then(|conditions| {
            conditions
                .iter()
                .find(|c| c.get("type").and_then(Value::as_str) == Some(READY_CONDITION))
        });

    let status_value = ready
        .and_then(|c| c.get("status"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if status_value.as_deref() == Some("True") {
        return Readiness::Ready;
    }

    Readiness::NotReady {
        status: status_value,
        message: ready
            .and_then(|c| c.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}
