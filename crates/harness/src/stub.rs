use std::cell::RefCell;

use calcgraph_core::{Assumption, WorksheetNode};
use calcgraph_engine::{ComputeClient, ComputeError, DocxExport, UnitCheckVerdict};

/// Scriptable stand-in for the compute collaborator.
///
/// Default behavior is "everything is consistent". Expressions containing
/// a fail marker come back dimensionally inconsistent; expressions
/// containing an error marker come back with a transport-level error
/// message; an offline stub errors on every request. Every request is
/// recorded for assertions.
pub struct StubCompute {
    version: String,
    unavailable: bool,
    fail_markers: Vec<String>,
    error_markers: Vec<String>,
    calls: RefCell<Vec<String>>,
}

impl StubCompute {
    pub fn passing() -> Self {
        Self {
            version: "stub-1.0.0".to_string(),
            unavailable: false,
            fail_markers: Vec::new(),
            error_markers: Vec::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Expressions containing `marker` fail the unit gate.
    pub fn failing_on(marker: &str) -> Self {
        let mut stub = Self::passing();
        stub.fail_markers.push(marker.to_string());
        stub
    }

    /// Expressions containing `marker` come back with an error message
    /// instead of gate details.
    pub fn erroring_on(marker: &str) -> Self {
        let mut stub = Self::passing();
        stub.error_markers.push(marker.to_string());
        stub
    }

    /// Every request fails at the transport level.
    pub fn offline() -> Self {
        let mut stub = Self::passing();
        stub.unavailable = true;
        stub
    }

    /// Expressions sent so far, in request order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl ComputeClient for StubCompute {
    fn check_units(&self, expression: &str) -> Result<UnitCheckVerdict, ComputeError> {
        self.calls.borrow_mut().push(expression.to_string());
        if self.unavailable {
            return Err(ComputeError::Unavailable("stub compute is offline".to_string()));
        }
        if self.error_markers.iter().any(|m| expression.contains(m)) {
            return Ok(UnitCheckVerdict {
                consistent: false,
                error: Some(format!("cannot resolve units in '{expression}'")),
                details: None,
            });
        }
        if self.fail_markers.iter().any(|m| expression.contains(m)) {
            return Ok(UnitCheckVerdict {
                consistent: false,
                error: None,
                details: Some(format!("dimension mismatch in '{expression}'")),
            });
        }
        Ok(UnitCheckVerdict {
            consistent: true,
            error: None,
            details: None,
        })
    }

    fn export_docx(
        &self,
        _name: &str,
        _nodes: &[WorksheetNode],
        _assumptions: &[Assumption],
    ) -> Result<DocxExport, ComputeError> {
        if self.unavailable {
            return Err(ComputeError::Unavailable("stub compute is offline".to_string()));
        }
        Ok(DocxExport {
            data: "UEsDBBQABgAIAAAAIQA=".to_string(),
        })
    }

    fn engine_version(&self) -> &str {
        &self.version
    }
}
