//! Read model of a client, owned by the external client registry

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Individual clients get income-tax folders only; businesses also get GST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    #[default]
    Individual,
    Business,
}

/// The client attributes the drive reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientProfile {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Owning tenant (the accounting practice)
    pub tenant_id: ObjectId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub entity_type: EntityType,
    /// Tax-deduction account number, gates the TDS branch
    #[serde(default)]
    pub tan_number: Option<String>,
}

impl ClientProfile {
    pub fn is_business(&self) -> bool {
        self.entity_type == EntityType::Business
    }

    pub fn has_tax_deduction_id(&self) -> bool {
        self.tan_number
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    }
}
