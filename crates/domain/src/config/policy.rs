use serde::{Deserialize, Serialize};

use crate::model::PolicyAction;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Static policy configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One `[[policies]]` table entry: maps a tool-name pattern to an action.
/// Entries containing no `*` are resolved as `static-exact`; all others as
/// `static-pattern`, tried in the order they appear here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfigEntry {
    pub pattern: String,
    pub action: PolicyAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "d_default_action")]
    pub default_action: PolicyAction,
    #[serde(default)]
    pub entries: Vec<PolicyConfigEntry>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_action: d_default_action(),
            entries: Vec::new(),
        }
    }
}

fn d_default_action() -> PolicyAction {
    PolicyAction::RequireApproval
}
