use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::error::CoreError;
use crate::identity::{verify_signature, EngineIdentity};
use crate::ids::{ActorId, AssumptionId, AuditEntryId, NodeId, Signature};
use crate::node::Provenance;

/// Outcome of a single verification gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residual: Option<f64>,
}

impl GateResult {
    pub fn pass() -> Self {
        Self {
            passed: true,
            details: None,
            residual: None,
        }
    }

    pub fn fail(details: impl Into<String>) -> Self {
        Self {
            passed: false,
            details: Some(details.into()),
            residual: None,
        }
    }
}

/// Per-gate breakdown of one verification pass. The unit gate is always
/// evaluated; the constraint gate defaults to pass when not evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    pub unit_consistency: GateResult,
    pub constraint_satisfaction: GateResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_residual: Option<GateResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanity_checks: Option<GateResult>,
}

impl GateReport {
    pub fn trivially_passing() -> Self {
        Self {
            unit_consistency: GateResult::pass(),
            constraint_satisfaction: GateResult::pass(),
            numeric_residual: None,
            sanity_checks: None,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.unit_consistency.passed
            && self.constraint_satisfaction.passed
            && self.numeric_residual.as_ref().is_none_or(|g| g.passed)
            && self.sanity_checks.as_ref().is_none_or(|g| g.passed)
    }
}

/// Immutable record of one verification pass over one node.
///
/// Entries snapshot the node's assumptions and provenance at verification
/// time and are signed by the session identity, so an exported trail is
/// tamper-evident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub node_id: NodeId,
    pub timestamp: Timestamp,
    pub engine_version: String,
    pub passed: bool,
    pub gates: GateReport,
    #[serde(default)]
    pub assumptions_active: Vec<AssumptionId>,
    pub provenance_at_verification: Provenance,
    pub signed_by: ActorId,
    pub signature: Signature,
}

impl AuditEntry {
    fn signing_bytes(
        id: &AuditEntryId,
        node_id: &NodeId,
        timestamp: &Timestamp,
        engine_version: &str,
        passed: bool,
        gates: &GateReport,
        assumptions_active: &[AssumptionId],
        provenance: &Provenance,
    ) -> Result<Vec<u8>, CoreError> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(id.as_bytes());
        bytes.extend_from_slice(node_id.as_bytes());
        bytes.extend_from_slice(&timestamp.to_bytes());
        bytes.extend_from_slice(engine_version.as_bytes());
        bytes.push(passed as u8);
        let gate_bytes =
            rmp_serde::to_vec(gates).map_err(|e| CoreError::Serialization(e.to_string()))?;
        bytes.extend_from_slice(&gate_bytes);
        let assumption_bytes = rmp_serde::to_vec(assumptions_active)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        bytes.extend_from_slice(&assumption_bytes);
        let provenance_bytes =
            rmp_serde::to_vec(provenance).map_err(|e| CoreError::Serialization(e.to_string()))?;
        bytes.extend_from_slice(&provenance_bytes);
        Ok(bytes)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_signed(
        identity: &EngineIdentity,
        node_id: NodeId,
        timestamp: Timestamp,
        engine_version: &str,
        passed: bool,
        gates: GateReport,
        assumptions_active: Vec<AssumptionId>,
        provenance_at_verification: Provenance,
    ) -> Result<Self, CoreError> {
        let id = AuditEntryId::new();
        let signing_bytes = Self::signing_bytes(
            &id,
            &node_id,
            &timestamp,
            engine_version,
            passed,
            &gates,
            &assumptions_active,
            &provenance_at_verification,
        )?;
        let signature = identity.sign(&signing_bytes);

        Ok(Self {
            id,
            node_id,
            timestamp,
            engine_version: engine_version.to_string(),
            passed,
            gates,
            assumptions_active,
            provenance_at_verification,
            signed_by: identity.actor_id(),
            signature,
        })
    }

    /// Re-derive the signing bytes from the entry's own fields and check
    /// the signature against `signed_by`.
    pub fn verify_signature(&self) -> Result<(), CoreError> {
        let signing_bytes = Self::signing_bytes(
            &self.id,
            &self.node_id,
            &self.timestamp,
            &self.engine_version,
            self.passed,
            &self.gates,
            &self.assumptions_active,
            &self.provenance_at_verification,
        )?;
        verify_signature(&self.signed_by, &signing_bytes, &self.signature)
    }
}
