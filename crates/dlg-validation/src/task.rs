//! Tasks as the dispatcher hands them to a delegate

use serde::{Deserialize, Serialize};

use dlg_core::DelegateId;

use crate::params::TaskParameter;
use crate::validators::{CapabilityValidator, ValidatorKind};

/// A task awaiting capability validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationTask {
    pub task_type: String,
    pub account_id: String,
    #[serde(default)]
    pub parameters: Vec<TaskParameter>,
}

impl ValidationTask {
    pub fn kind(&self) -> ValidatorKind {
        ValidatorKind::for_task_type(&self.task_type)
    }

    /// Validator for this task on the given delegate
    pub fn validator(&self, delegate_id: impl Into<DelegateId>) -> CapabilityValidator {
        CapabilityValidator::new(
            self.kind(),
            delegate_id,
            self.account_id.clone(),
            self.parameters.clone(),
        )
    }
}
