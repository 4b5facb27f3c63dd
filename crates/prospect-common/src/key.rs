use serde::{Deserialize, Serialize};

/// Identity of one document across the source and target stores
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NaturalKey {
    pub owner_unit: String,
    pub well_id: String,
    pub document_name: String,
}

impl NaturalKey {
    pub fn new(
        owner_unit: impl Into<String>,
        well_id: impl Into<String>,
        document_name: impl Into<String>,
    ) -> Self {
        Self {
            owner_unit: owner_unit.into(),
            well_id: well_id.into(),
            document_name: document_name.into(),
        }
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.owner_unit, self.well_id, self.document_name
        )
    }
}
