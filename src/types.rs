/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Resource operations produced by the controller for every model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Create,
    CreateMany,
    Select,
    Update,
    UpdateMany,
    Delete,
    DeleteMany,
}

impl Operation {
    /// Progressive verb used in failure messages and log fields
    pub fn verb(&self) -> &'static str {
        match self {
            Operation::Create | Operation::CreateMany => "creating",
            Operation::Select => "fetching",
            Operation::Update | Operation::UpdateMany => "updating",
            Operation::Delete | Operation::DeleteMany => "deleting",
        }
    }

    pub fn is_bulk(&self) -> bool {
        matches!(
            self,
            Operation::CreateMany | Operation::UpdateMany | Operation::DeleteMany
        )
    }
}
