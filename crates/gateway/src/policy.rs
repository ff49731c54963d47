//! Policy Resolver — layered allow/deny/require-approval decision with
//! provenance. The only component authorized to consult the dynamic-rule
//! store and static configuration for authorization purposes.

use portero_core::config::PolicyConfig;
use portero_core::model::{DynamicRule, PolicyAction, PolicyDecision, PolicySource};
use portero_core::pattern;

pub struct PolicyResolver {
    config: PolicyConfig,
}

impl PolicyResolver {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Resolve `tool_name` against, in order: dynamic rules (exact then
    /// pattern), static exact, static pattern, default. `dynamic_rules`
    /// reflects the store's current contents at call time.
    pub fn resolve(&self, tool_name: &str, dynamic_rules: &[DynamicRule]) -> PolicyDecision {
        if let Some(rule) = dynamic_rules.iter().find(|r| r.pattern == tool_name) {
            return PolicyDecision {
                action: rule.action,
                source: PolicySource::DynamicRule,
                pattern: Some(rule.pattern.clone()),
                rule_id: Some(rule.id),
            };
        }
        if let Some(rule) = dynamic_rules.iter().find(|r| pattern::matches(tool_name, &r.pattern)) {
            return PolicyDecision {
                action: rule.action,
                source: PolicySource::DynamicRule,
                pattern: Some(rule.pattern.clone()),
                rule_id: Some(rule.id),
            };
        }

        if let Some(entry) = self
            .config
            .entries
            .iter()
            .find(|e| !e.pattern.contains('*') && e.pattern == tool_name)
        {
            return PolicyDecision {
                action: entry.action,
                source: PolicySource::StaticExact,
                pattern: Some(entry.pattern.clone()),
                rule_id: None,
            };
        }

        if let Some(entry) = self
            .config
            .entries
            .iter()
            .filter(|e| e.pattern.contains('*'))
            .find(|e| pattern::matches(tool_name, &e.pattern))
        {
            return PolicyDecision {
                action: entry.action,
                source: PolicySource::StaticPattern,
                pattern: Some(entry.pattern.clone()),
                rule_id: None,
            };
        }

        PolicyDecision {
            action: self.config.default_action,
            source: PolicySource::Default,
            pattern: None,
            rule_id: None,
        }
    }
}
