//! Response bodies the facade reads fields out of.
//!
//! Field names follow the gateway's PascalCase JSON. Only `Hash` is required;
//! the gateway may add or drop the others between versions.

use serde::{Deserialize, Serialize};

/// Body of a successful `/add` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Added {
    pub hash: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}
