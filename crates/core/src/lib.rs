pub mod audit;
pub mod clock;
pub mod document;
pub mod error;
pub mod identity;
pub mod ids;
pub mod node;
pub mod value;

pub use audit::{AuditEntry, GateReport, GateResult};
pub use clock::{MonotonicClock, Timestamp};
pub use document::{Assumption, DocumentMetadata, HistoryMarker, WorksheetDocument};
pub use error::CoreError;
pub use identity::EngineIdentity;
pub use ids::*;
pub use node::{NodeBody, NodeKind, Provenance, VerificationStatus, WorksheetNode};
pub use value::{
    NodePosition, PlotExpression, PlotOptions, PlotRange, SliderRange, SolveMethod, UnitExpr,
    ValueWithUnit,
};
