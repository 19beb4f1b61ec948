use serde::{Deserialize, Serialize};

/// A unit expression as understood by the compute collaborator,
/// e.g. `"N*m"` or `"kg/s^2"`. `si_base` is filled in by the
/// collaborator when it normalizes the expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitExpr {
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub si_base: Option<String>,
}

impl UnitExpr {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            si_base: None,
        }
    }
}

/// A numeric quantity with an optional unit and uncertainty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueWithUnit {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<f64>,
}

impl ValueWithUnit {
    pub fn bare(value: f64) -> Self {
        Self {
            value,
            unit: None,
            uncertainty: None,
        }
    }

    pub fn with_unit(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: Some(UnitExpr::new(unit)),
            uncertainty: None,
        }
    }
}

/// Display coordinate of a node on the worksheet canvas. Not consulted
/// by the graph logic beyond spacing heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl NodePosition {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            width: None,
            height: None,
        }
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

/// Interactive range for a given node's value slider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderRange {
    pub min: f64,
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

/// How a solve goal should be attacked by the compute collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolveMethod {
    Symbolic,
    Numeric,
    Auto,
}

impl SolveMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Symbolic => "symbolic",
            Self::Numeric => "numeric",
            Self::Auto => "auto",
        }
    }
}

/// One curve on a plot node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotExpression {
    pub id: String,
    pub expr: String,
    pub variable: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotRange {
    pub min: f64,
    pub max: f64,
    pub variable: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend: Option<bool>,
}
