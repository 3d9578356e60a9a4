//! Kernel configuration.
//!
//! All capacities, rates, and cadences the kernel needs at init,
//! gathered in one serde-friendly struct owned by the caller. Nothing in
//! here is read from the environment or from files by the kernel itself;
//! the surrounding driver decides where configuration comes from.

use serde::{Deserialize, Serialize};

use polity_types::ActTime;

/// Capacities, rates, and cadences for one kernel instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Maximum scheduled agents.
    pub agent_capacity: usize,
    /// Maximum belief entries across all agents.
    pub belief_capacity: usize,
    /// Maximum registered goals.
    pub goal_capacity: usize,
    /// Maximum registered doctrines.
    pub doctrine_capacity: usize,
    /// Maximum pending doctrine events.
    pub doctrine_event_capacity: usize,
    /// Maximum registered roles.
    pub role_capacity: usize,
    /// Maximum authority grants.
    pub authority_capacity: usize,
    /// Maximum constraints.
    pub constraint_capacity: usize,
    /// Maximum contracts.
    pub contract_capacity: usize,
    /// Maximum delegations.
    pub delegation_capacity: usize,
    /// Maximum audit records.
    pub audit_capacity: usize,
    /// Q16 confidence subtracted from every belief per act.
    pub belief_decay_q16_per_act: u32,
    /// Beliefs at or below this confidence are dropped.
    pub min_confidence_q16: u32,
    /// Think interval assigned to agents registered without one.
    pub default_think_interval_act: ActTime,
    /// Duration charged per plan step.
    pub plan_step_duration_act: ActTime,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            agent_capacity: 256,
            belief_capacity: 4096,
            goal_capacity: 1024,
            doctrine_capacity: 64,
            doctrine_event_capacity: 128,
            role_capacity: 32,
            authority_capacity: 256,
            constraint_capacity: 256,
            contract_capacity: 128,
            delegation_capacity: 128,
            audit_capacity: 8192,
            belief_decay_q16_per_act: 0,
            min_confidence_q16: 0,
            default_think_interval_act: 1,
            plan_step_duration_act: 1,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let config: KernelConfig =
            serde_json::from_str(r#"{"agent_capacity": 8, "belief_decay_q16_per_act": 40000}"#)
                .unwrap();
        assert_eq!(config.agent_capacity, 8);
        assert_eq!(config.belief_decay_q16_per_act, 40_000);
        assert_eq!(config.goal_capacity, KernelConfig::default().goal_capacity);
    }

    #[test]
    fn roundtrips_through_json() {
        let config = KernelConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: KernelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }
}
