use thiserror::Error;
use tracing::{debug, warn};

use calcgraph_core::{
    Assumption, AuditEntry, GateReport, GateResult, NodeBody, NodeId, VerificationStatus,
    WorksheetNode,
};

use crate::Session;

#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("compute service unavailable: {0}")]
    Unavailable(String),

    #[error("compute request rejected: {0}")]
    Rejected(String),
}

/// Collaborator verdict on the dimensional consistency of an expression.
#[derive(Debug, Clone)]
pub struct UnitCheckVerdict {
    pub consistent: bool,
    pub error: Option<String>,
    pub details: Option<String>,
}

/// DOCX export payload, base64 as returned over the wire.
#[derive(Debug, Clone)]
pub struct DocxExport {
    pub data: String,
}

/// The external compute collaborator, reduced to the contract the core
/// depends on. Calls are the session's only suspension points; callers
/// must not mutate a node while its verification is in flight.
pub trait ComputeClient {
    fn check_units(&self, expression: &str) -> Result<UnitCheckVerdict, ComputeError>;

    fn export_docx(
        &self,
        name: &str,
        nodes: &[WorksheetNode],
        assumptions: &[Assumption],
    ) -> Result<DocxExport, ComputeError>;

    fn engine_version(&self) -> &str;
}

const FALLBACK_FAILURE_REASON: &str = "verification failed";

/// Per-node outcome of one verification pass, before it is folded into
/// the node and the audit trail.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub node_id: NodeId,
    pub passed: bool,
    pub gates: GateReport,
    /// Transport-level error reported by the collaborator, if any.
    pub error: Option<String>,
    /// A richer collaborator response may dictate the node's final
    /// status outright; when present it is adopted verbatim.
    pub overall_status: Option<VerificationStatus>,
}

impl VerificationResult {
    /// The failure reason shown on the node: the first non-empty of the
    /// collaborator error, the unit gate details, the constraint gate
    /// details, then a generic fallback.
    pub fn failure_reason(&self) -> String {
        [
            self.error.as_deref(),
            self.gates.unit_consistency.details.as_deref(),
            self.gates.constraint_satisfaction.details.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .unwrap_or(FALLBACK_FAILURE_REASON)
        .to_string()
    }
}

impl Session {
    /// Verify one node against the collaborator. Absent node: `None`,
    /// nothing happens. Otherwise the node's verification status is
    /// updated and one immutable audit entry is appended.
    pub fn verify_node(
        &mut self,
        client: &dyn ComputeClient,
        id: NodeId,
    ) -> Option<VerificationResult> {
        self.is_verifying = true;
        let result = self.verify_node_inner(client, id);
        self.is_verifying = false;
        result
    }

    fn verify_node_inner(
        &mut self,
        client: &dyn ComputeClient,
        id: NodeId,
    ) -> Option<VerificationResult> {
        let expression = self.document.node(id)?.unit_check_expression();

        let mut transport_error: Option<String> = None;
        let unit_gate = match &expression {
            // Variants without a checkable expression pass trivially; no
            // request is issued.
            None => GateResult::pass(),
            Some(expr) => match client.check_units(expr) {
                Ok(verdict) => {
                    transport_error = verdict.error;
                    GateResult {
                        passed: verdict.consistent,
                        details: verdict.details,
                        residual: None,
                    }
                }
                Err(e) => {
                    warn!(node = %id, error = %e, "unit check request failed");
                    transport_error = Some(e.to_string());
                    GateResult {
                        passed: false,
                        details: None,
                        residual: None,
                    }
                }
            },
        };

        let gates = GateReport {
            unit_consistency: unit_gate,
            constraint_satisfaction: GateResult::pass(),
            numeric_residual: None,
            sanity_checks: None,
        };
        let result = VerificationResult {
            node_id: id,
            passed: gates.all_passed(),
            gates,
            error: transport_error,
            overall_status: None,
        };
        self.apply_verification(client.engine_version(), &result);
        Some(result)
    }

    /// Fold a verification result into the node and append one signed
    /// audit entry snapshotting the node's active assumptions and
    /// provenance. Exposed so richer collaborator responses (carrying a
    /// full overall status) flow through the same path.
    pub fn apply_verification(&mut self, engine_version: &str, result: &VerificationResult) {
        let now = self.clock.tick();
        let Some(node) = self.document.node_mut(result.node_id) else {
            return;
        };

        node.verification = match &result.overall_status {
            Some(status) => status.clone(),
            None if result.passed => VerificationStatus::Verified {
                timestamp: now,
                engine_version: engine_version.to_string(),
            },
            None => VerificationStatus::Failed {
                reason: result.failure_reason(),
                timestamp: now,
            },
        };

        let provenance = node.provenance.clone();
        let node_assumptions = node.assumptions.clone();
        let assumptions_active: Vec<_> = self
            .document
            .assumptions
            .iter()
            .filter(|a| a.active && node_assumptions.contains(&a.id))
            .map(|a| a.id)
            .collect();

        match AuditEntry::new_signed(
            &self.identity,
            result.node_id,
            now,
            engine_version,
            result.passed,
            result.gates.clone(),
            assumptions_active,
            provenance,
        ) {
            Ok(entry) => {
                debug!(node = %result.node_id, passed = result.passed, "verification recorded");
                self.document.append_audit(entry);
            }
            Err(e) => {
                warn!(node = %result.node_id, error = %e, "audit entry could not be signed");
                self.last_error = Some(e.to_string());
            }
        }
        self.touch();
    }

    /// Verify every equation and given in document order. Sequential and
    /// best-effort: a failure never aborts the batch, and the full result
    /// list is returned.
    pub fn verify_all_nodes(&mut self, client: &dyn ComputeClient) -> Vec<VerificationResult> {
        let ids: Vec<NodeId> = self
            .document
            .nodes
            .iter()
            .filter(|n| matches!(n.body, NodeBody::Equation { .. } | NodeBody::Given { .. }))
            .map(|n| n.id)
            .collect();

        self.is_verifying = true;
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(result) = self.verify_node_inner(client, id) {
                results.push(result);
            }
        }
        self.is_verifying = false;
        results
    }

    /// Re-verify every stale node, clearing the flag on the ones that
    /// come back verified. Runs in document order, not dependency order,
    /// so a dependent may be re-checked before its upstream; failures
    /// stay stale for the next pass.
    pub fn recalculate_stale(&mut self, client: &dyn ComputeClient) -> Vec<VerificationResult> {
        let stale = self.document.stale_node_ids();

        self.is_verifying = true;
        let mut results = Vec::with_capacity(stale.len());
        for id in stale {
            let Some(result) = self.verify_node_inner(client, id) else {
                continue;
            };
            let verified = self
                .document
                .node(id)
                .is_some_and(|n| n.verification.is_verified());
            if verified && let Some(node) = self.document.node_mut(id) {
                node.is_stale = false;
            }
            results.push(result);
        }
        self.is_verifying = false;
        results
    }
}
