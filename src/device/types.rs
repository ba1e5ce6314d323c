use serde::{Deserialize, Serialize};

/// A registry property decoded according to its runtime type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
}

/// Combined result of both GPU queries, as printed by the CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuSummary {
    pub models: Vec<String>,
    pub utilization: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
