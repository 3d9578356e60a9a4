//! Bilateral contracts over process kinds.
//!
//! While a contract is active, a plan by either party must use only the
//! process kinds in that party's allowed mask. Breach and fulfillment
//! are recorded in place; only active contracts constrain plans.

use serde::{Deserialize, Serialize};

use polity_types::{
    ActTime, AgentId, AuthorityMask, BoundedRegistry, ContractId, ContractStatus, Keyed,
    ProcessKindMask, ProvenanceId,
};

use crate::error::AgentError;
use crate::planner::Plan;

/// One bilateral contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Unique id; the registry's natural key.
    pub contract_id: ContractId,
    /// The first party.
    pub party_a_id: AgentId,
    /// The second party.
    pub party_b_id: AgentId,
    /// Process kinds party A may use while the contract is active
    /// (`0` = the contract does not constrain A).
    pub allowed_process_mask_a: ProcessKindMask,
    /// Process kinds party B may use while the contract is active
    /// (`0` = the contract does not constrain B).
    pub allowed_process_mask_b: ProcessKindMask,
    /// Authority party A must hold.
    pub required_authority_mask_a: AuthorityMask,
    /// Authority party B must hold.
    pub required_authority_mask_b: AuthorityMask,
    /// When the contract lapses (`0` = never).
    pub expiry_act: ActTime,
    /// Lifecycle status.
    pub status: ContractStatus,
    /// When the contract failed or was fulfilled.
    pub failure_act: ActTime,
    /// Causal origin of the contract.
    pub provenance_id: ProvenanceId,
}

impl Keyed for Contract {
    fn key(&self) -> u64 {
        self.contract_id.raw()
    }
}

impl Contract {
    /// The allowed-process mask applying to `agent_id`, or `0` when the
    /// agent is not a party.
    pub const fn allowed_mask_for(&self, agent_id: AgentId) -> ProcessKindMask {
        if agent_id.raw() == self.party_a_id.raw() {
            return self.allowed_process_mask_a;
        }
        if agent_id.raw() == self.party_b_id.raw() {
            return self.allowed_process_mask_b;
        }
        0
    }
}

/// Bounded registry of contracts ordered ascending by contract id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractRegistry {
    contracts: BoundedRegistry<Contract>,
}

impl ContractRegistry {
    /// Create an empty registry.
    pub fn new(capacity: usize) -> Self {
        Self {
            contracts: BoundedRegistry::new(capacity),
        }
    }

    /// Number of contracts (inactive included).
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Whether no contracts are registered.
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Register a contract as active. A zero provenance falls back to
    /// the contract id.
    pub fn register(&mut self, mut contract: Contract) -> Result<(), AgentError> {
        if contract.provenance_id.is_none() {
            contract.provenance_id = ProvenanceId::new(contract.contract_id.raw());
        }
        contract.status = ContractStatus::Active;
        contract.failure_act = 0;
        self.contracts.insert(contract)?;
        Ok(())
    }

    /// Look up a contract by id.
    pub fn find(&self, contract_id: ContractId) -> Option<&Contract> {
        self.contracts.find(contract_id.raw())
    }

    /// Record a breach. Only an active contract transitions; the call is
    /// a no-op otherwise.
    pub fn record_failure(
        &mut self,
        contract_id: ContractId,
        now_act: ActTime,
    ) -> Result<(), AgentError> {
        self.transition(contract_id, ContractStatus::Failed, now_act)
    }

    /// Record fulfillment. Only an active contract transitions.
    pub fn record_fulfilled(
        &mut self,
        contract_id: ContractId,
        now_act: ActTime,
    ) -> Result<(), AgentError> {
        self.transition(contract_id, ContractStatus::Fulfilled, now_act)
    }

    /// Check a plan against every active, non-expired contract touching
    /// the agent.
    ///
    /// Returns the id of the first contract (in id order) whose allowed
    /// mask for the agent does not cover some step's process kind.
    pub fn check_plan(
        &self,
        agent_id: AgentId,
        plan: &Plan,
        now_act: ActTime,
    ) -> Result<(), ContractId> {
        if agent_id.is_none() {
            return Ok(());
        }
        for contract in self.contracts.iter() {
            if contract.status != ContractStatus::Active {
                continue;
            }
            if contract.expiry_act != 0 && contract.expiry_act <= now_act {
                continue;
            }
            if agent_id != contract.party_a_id && agent_id != contract.party_b_id {
                continue;
            }
            let mask = contract.allowed_mask_for(agent_id);
            if mask == 0 {
                continue;
            }
            for step in &plan.steps {
                if mask & step.process_kind.bit() == 0 {
                    return Err(contract.contract_id);
                }
            }
        }
        Ok(())
    }

    fn transition(
        &mut self,
        contract_id: ContractId,
        status: ContractStatus,
        now_act: ActTime,
    ) -> Result<(), AgentError> {
        let contract = self.contracts.find_mut(contract_id.raw()).ok_or(
            AgentError::Registry(polity_types::RegistryError::AbsentKey {
                key: contract_id.raw(),
            }),
        )?;
        if contract.status != ContractStatus::Active {
            return Ok(());
        }
        contract.status = status;
        contract.failure_act = now_act;
        Ok(())
    }
}
