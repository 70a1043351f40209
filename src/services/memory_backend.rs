use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use super::backend::{
    BackendError, CommissionFields, CommissionSelector, CommissionStore, CommissionSync,
    PartnerDirectory,
};
use crate::context::RequestContext;
use crate::types::{
    BoundType, Partner, PartnerCommission, PartnerCommissionTier, PartnerStatus, RemitType,
    ServiceName,
};

/// Every backend call the memory store has served, in order
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    GetPartnerList,
    GetPartnerCommissionsList { partner: String, bound_type: BoundType, remit_type: RemitType },
    GetPartnerCommissionsTierList(String),
    CreatePartnerCommission(CommissionFields),
    UpdatePartnerCommission { id: String, fields: CommissionFields },
    DeletePartnerCommission(CommissionSelector),
    CreatePartnerCommissionTier(Vec<PartnerCommissionTier>),
    UpdatePartnerCommissionTier(Vec<PartnerCommissionTier>),
    DeletePartnerCommissionTier(String),
    DeletePartnerCommissionTierById(String),
    SyncRemcoCommissionConfigForRemittance,
}

impl BackendCall {
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            BackendCall::GetPartnerList
                | BackendCall::GetPartnerCommissionsList { .. }
                | BackendCall::GetPartnerCommissionsTierList(_)
                | BackendCall::SyncRemcoCommissionConfigForRemittance
        )
    }
}

#[derive(Default)]
struct MemoryState {
    partners: Vec<Partner>,
    commissions: BTreeMap<String, PartnerCommission>,
    tiers: BTreeMap<String, PartnerCommissionTier>,
}

/// In-process stand-in for the partner, commission and sync services.
///
/// Keeps a call log so callers can assert on exactly which backend
/// operations a flow issued.
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    calls: Mutex<Vec<BackendCall>>,
    failing_partners: Mutex<HashSet<String>>,
    failing_lookups: Mutex<HashSet<String>>,
    next_id: AtomicU64,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            calls: Mutex::new(Vec::new()),
            failing_partners: Mutex::new(HashSet::new()),
            failing_lookups: Mutex::new(HashSet::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl MemoryBackend {
    pub fn with_partners(partners: Vec<Partner>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                partners,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Parse `CODE:Display Name` seeds; a bare code uses itself as the name
    pub fn parse_partner_seeds(seeds: &[String]) -> Result<Vec<Partner>, BackendError> {
        seeds
            .iter()
            .map(|seed| {
                let (code, name) = seed.split_once(':').unwrap_or((seed.as_str(), seed.as_str()));
                let code = code.trim();
                if !crate::commission::is_valid_partner_code(code) {
                    return Err(BackendError::Config(format!("invalid partner seed '{}'", seed)));
                }
                Ok(Partner {
                    stype: code.to_string(),
                    name: name.trim().to_string(),
                    status: PartnerStatus::Enabled,
                    service_name: ServiceName::Remittance,
                })
            })
            .collect()
    }

    /// Make every write for `partner` fail, to exercise partial failures
    pub async fn fail_writes_for(&self, partner: &str) {
        self.failing_partners.lock().await.insert(partner.to_string());
    }

    /// Make commission lookups for `partner` time out
    pub async fn fail_lookups_for(&self, partner: &str) {
        self.failing_lookups.lock().await.insert(partner.to_string());
    }

    pub async fn insert_commission(&self, commission: PartnerCommission) {
        self.state
            .lock()
            .await
            .commissions
            .insert(commission.id.clone(), commission);
    }

    pub async fn insert_tier(&self, tier: PartnerCommissionTier) {
        self.state.lock().await.tiers.insert(tier.id.clone(), tier);
    }

    pub async fn commissions(&self) -> Vec<PartnerCommission> {
        self.state.lock().await.commissions.values().cloned().collect()
    }

    pub async fn tiers_of(&self, partner_commission_id: &str) -> Vec<PartnerCommissionTier> {
        self.state
            .lock()
            .await
            .tiers
            .values()
            .filter(|t| t.partner_commission_id == partner_commission_id)
            .cloned()
            .collect()
    }

    pub async fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().await.clone()
    }

    pub async fn write_calls(&self) -> Vec<BackendCall> {
        self.calls.lock().await.iter().filter(|c| c.is_write()).cloned().collect()
    }

    pub async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    async fn record(&self, call: BackendCall) {
        self.calls.lock().await.push(call);
    }

    async fn check_partner(&self, partner: &str) -> Result<(), BackendError> {
        if self.failing_partners.lock().await.contains(partner) {
            return Err(BackendError::Status {
                method: "memory",
                status: 503,
                message: format!("writes for partner {} are failing", partner),
            });
        }
        Ok(())
    }

    async fn partner_of_commission(&self, id: &str) -> Option<String> {
        self.state.lock().await.commissions.get(id).map(|c| c.partner.clone())
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

fn matches_selector(c: &PartnerCommission, s: &CommissionSelector) -> bool {
    c.partner == s.partner
        && c.bound_type == s.bound_type
        && c.remit_type == s.remit_type
        && c.transaction_type == s.transaction_type
}

#[async_trait]
impl PartnerDirectory for MemoryBackend {
    async fn get_partner_list(
        &self,
        _ctx: &RequestContext,
        status: PartnerStatus,
        service: ServiceName,
    ) -> Result<Vec<Partner>, BackendError> {
        self.record(BackendCall::GetPartnerList).await;
        Ok(self
            .state
            .lock()
            .await
            .partners
            .iter()
            .filter(|p| p.status == status && p.service_name == service)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CommissionStore for MemoryBackend {
    async fn get_partner_commissions_list(
        &self,
        _ctx: &RequestContext,
        bound_type: BoundType,
        remit_type: RemitType,
        partner: &str,
    ) -> Result<Vec<PartnerCommission>, BackendError> {
        self.record(BackendCall::GetPartnerCommissionsList {
            partner: partner.to_string(),
            bound_type,
            remit_type,
        })
        .await;
        if self.failing_lookups.lock().await.contains(partner) {
            return Err(BackendError::Timeout("GetPartnerCommissionsList"));
        }
        Ok(self
            .state
            .lock()
            .await
            .commissions
            .values()
            .filter(|c| c.partner == partner && c.bound_type == bound_type && c.remit_type == remit_type)
            .cloned()
            .collect())
    }

    async fn get_partner_commissions_tier_list(
        &self,
        _ctx: &RequestContext,
        partner_commission_id: &str,
    ) -> Result<Vec<PartnerCommissionTier>, BackendError> {
        self.record(BackendCall::GetPartnerCommissionsTierList(partner_commission_id.to_string()))
            .await;
        Ok(self.tiers_of(partner_commission_id).await)
    }

    async fn create_partner_commission(
        &self,
        _ctx: &RequestContext,
        fields: &CommissionFields,
    ) -> Result<String, BackendError> {
        self.record(BackendCall::CreatePartnerCommission(fields.clone())).await;
        self.check_partner(&fields.selector.partner).await?;

        let id = self.next_id("pc");
        let commission = PartnerCommission {
            id: id.clone(),
            partner: fields.selector.partner.clone(),
            bound_type: fields.selector.bound_type,
            remit_type: fields.selector.remit_type,
            transaction_type: fields.selector.transaction_type,
            tier_type: fields.tier_type,
            amount: fields.amount.clone(),
            start_date: fields.start_date,
            end_date: fields.end_date,
            created_by: fields.actor.clone(),
            updated_by: String::new(),
        };
        self.state.lock().await.commissions.insert(id.clone(), commission);
        Ok(id)
    }

    async fn update_partner_commission(
        &self,
        _ctx: &RequestContext,
        id: &str,
        fields: &CommissionFields,
    ) -> Result<String, BackendError> {
        self.record(BackendCall::UpdatePartnerCommission {
            id: id.to_string(),
            fields: fields.clone(),
        })
        .await;
        self.check_partner(&fields.selector.partner).await?;

        let mut state = self.state.lock().await;
        let existing = state
            .commissions
            .get_mut(id)
            .ok_or_else(|| BackendError::NotFound(format!("partner commission {}", id)))?;
        existing.tier_type = fields.tier_type;
        existing.amount = fields.amount.clone();
        existing.start_date = fields.start_date;
        existing.end_date = fields.end_date;
        existing.updated_by = fields.actor.clone();
        Ok(id.to_string())
    }

    async fn delete_partner_commission(
        &self,
        _ctx: &RequestContext,
        selector: &CommissionSelector,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::DeletePartnerCommission(selector.clone())).await;
        self.check_partner(&selector.partner).await?;

        let mut state = self.state.lock().await;
        let removed: Vec<String> = state
            .commissions
            .values()
            .filter(|c| matches_selector(c, selector))
            .map(|c| c.id.clone())
            .collect();
        for id in &removed {
            state.commissions.remove(id);
        }
        state.tiers.retain(|_, t| !removed.contains(&t.partner_commission_id));
        Ok(())
    }

    async fn create_partner_commission_tier(
        &self,
        _ctx: &RequestContext,
        tiers: &[PartnerCommissionTier],
    ) -> Result<(), BackendError> {
        self.record(BackendCall::CreatePartnerCommissionTier(tiers.to_vec())).await;

        for tier in tiers {
            let partner = self
                .partner_of_commission(&tier.partner_commission_id)
                .await
                .ok_or_else(|| BackendError::NotFound(format!("partner commission {}", tier.partner_commission_id)))?;
            self.check_partner(&partner).await?;
        }

        let mut state = self.state.lock().await;
        for tier in tiers {
            let id = self.next_id("pct");
            state.tiers.insert(
                id.clone(),
                PartnerCommissionTier {
                    id,
                    ..tier.clone()
                },
            );
        }
        Ok(())
    }

    async fn update_partner_commission_tier(
        &self,
        _ctx: &RequestContext,
        tiers: &[PartnerCommissionTier],
    ) -> Result<(), BackendError> {
        self.record(BackendCall::UpdatePartnerCommissionTier(tiers.to_vec())).await;

        let mut state = self.state.lock().await;
        for tier in tiers {
            if !state.tiers.contains_key(&tier.id) {
                return Err(BackendError::NotFound(format!("partner commission tier {}", tier.id)));
            }
        }
        for tier in tiers {
            state.tiers.insert(tier.id.clone(), tier.clone());
        }
        Ok(())
    }

    async fn delete_partner_commission_tier(
        &self,
        _ctx: &RequestContext,
        partner_commission_id: &str,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::DeletePartnerCommissionTier(partner_commission_id.to_string()))
            .await;
        if let Some(partner) = self.partner_of_commission(partner_commission_id).await {
            self.check_partner(&partner).await?;
        }
        self.state
            .lock()
            .await
            .tiers
            .retain(|_, t| t.partner_commission_id != partner_commission_id);
        Ok(())
    }

    async fn delete_partner_commission_tier_by_id(
        &self,
        _ctx: &RequestContext,
        id: &str,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::DeletePartnerCommissionTierById(id.to_string())).await;
        self.state
            .lock()
            .await
            .tiers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(format!("partner commission tier {}", id)))
    }
}

#[async_trait]
impl CommissionSync for MemoryBackend {
    async fn sync_remco_commission_config_for_remittance(
        &self,
        _ctx: &RequestContext,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::SyncRemcoCommissionConfigForRemittance).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::types::Channel;

    fn selector() -> CommissionSelector {
        CommissionSelector {
            partner: "WU".to_string(),
            bound_type: BoundType::Outbound,
            remit_type: RemitType::Remittance,
            transaction_type: Channel::Digital,
        }
    }

    fn fields() -> CommissionFields {
        CommissionFields {
            selector: selector(),
            tier_type: crate::types::TierType::TierAmount,
            amount: String::new(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            actor: "jdoe".to_string(),
        }
    }

    #[test]
    fn partner_seeds_accept_bare_codes() {
        let partners = MemoryBackend::parse_partner_seeds(&["WU:Western Union".into(), "MG".into()]).unwrap();
        assert_eq!(partners[0].name, "Western Union");
        assert_eq!(partners[1].name, "MG");
        assert!(MemoryBackend::parse_partner_seeds(&["W U:x".into()]).is_err());
    }

    #[tokio::test]
    async fn deleting_a_commission_cascades_to_its_tiers() {
        let backend = MemoryBackend::default();
        let ctx = RequestContext::system();
        let id = backend.create_partner_commission(&ctx, &fields()).await.unwrap();
        let tier = PartnerCommissionTier {
            id: String::new(),
            partner_commission_id: id.clone(),
            min_value: "0".into(),
            max_value: "10".into(),
            amount: "1".into(),
        };
        backend.create_partner_commission_tier(&ctx, &[tier]).await.unwrap();
        assert_eq!(backend.tiers_of(&id).await.len(), 1);

        backend.delete_partner_commission(&ctx, &selector()).await.unwrap();
        assert!(backend.commissions().await.is_empty());
        assert!(backend.tiers_of(&id).await.is_empty());
    }

    #[tokio::test]
    async fn tiers_require_an_existing_commission() {
        let backend = MemoryBackend::default();
        let tier = PartnerCommissionTier {
            id: String::new(),
            partner_commission_id: "missing".into(),
            min_value: "0".into(),
            max_value: "10".into(),
            amount: "1".into(),
        };
        let err = backend
            .create_partner_commission_tier(&RequestContext::system(), &[tier])
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
    }

    #[tokio::test]
    async fn failing_partner_rejects_writes_but_records_the_call() {
        let backend = MemoryBackend::default();
        backend.fail_writes_for("WU").await;
        assert!(backend.create_partner_commission(&RequestContext::system(), &fields()).await.is_err());
        assert_eq!(backend.write_calls().await.len(), 1);
        assert!(backend.commissions().await.is_empty());
    }
}
