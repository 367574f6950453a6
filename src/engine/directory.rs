use std::collections::{BTreeSet, HashMap};

use super::domain::{Agent, AgentId, Fillial, FillialId, Merchant, MerchantId};

/// Read-only lookups for the merchant → fillial → agent hierarchy.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    fillials: HashMap<FillialId, Fillial>,
    merchants: HashMap<MerchantId, Merchant>,
    agents: HashMap<AgentId, Agent>,
}

impl Directory {
    pub fn new(
        fillials: impl IntoIterator<Item = Fillial>,
        merchants: impl IntoIterator<Item = Merchant>,
        agents: impl IntoIterator<Item = Agent>,
    ) -> Self {
        Self {
            fillials: fillials.into_iter().map(|f| (f.id, f)).collect(),
            merchants: merchants.into_iter().map(|m| (m.id, m)).collect(),
            agents: agents.into_iter().map(|a| (a.id, a)).collect(),
        }
    }

    pub fn fillial(&self, id: FillialId) -> Option<&Fillial> {
        self.fillials.get(&id)
    }

    pub fn merchant(&self, id: MerchantId) -> Option<&Merchant> {
        self.merchants.get(&id)
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn merchant_of(&self, fillial_id: FillialId) -> Option<MerchantId> {
        self.fillial(fillial_id).map(|fillial| fillial.merchant_id)
    }

    /// Fillials matching `predicate`, collected for use inside compiled filters.
    pub(crate) fn fillials_where<F>(&self, predicate: F) -> BTreeSet<FillialId>
    where
        F: Fn(&Fillial) -> bool,
    {
        self.fillials
            .values()
            .filter(|fillial| predicate(fillial))
            .map(|fillial| fillial.id)
            .collect()
    }

    pub fn fillial_label(&self, id: FillialId) -> Option<String> {
        self.fillial(id).map(|fillial| match &fillial.name {
            Some(name) => name.clone(),
            None => format!("{} #{}", fillial.region, fillial.id.0),
        })
    }

    pub fn merchant_label(&self, id: MerchantId) -> Option<String> {
        self.merchant(id).map(|merchant| merchant.name.clone())
    }
}
