use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::matrix::{CellKey, ChannelCell};
use super::validator::{ChannelPlan, ValidTier};
use crate::config::TierWriteMode;
use crate::context::RequestContext;
use crate::services::{BackendError, CommissionFields, CommissionSelector, CommissionStore};
use crate::types::{Channel, PartnerCommission, PartnerCommissionTier, TierType};

/// Result of writing one cell on one channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WriteOutcome {
    Created { id: String, tier_type: TierType, tiers: usize },
    Updated { id: String, tier_type: TierType, tiers: usize },
    /// Commission removed because the channel was deselected
    Cleared,
}

/// Per-cell outcome of a submission. Failures never stop sibling cells.
#[derive(Debug, Default, Serialize)]
pub struct ReconcileReport {
    pub succeeded: BTreeMap<ChannelCell, WriteOutcome>,
    pub failed: BTreeMap<ChannelCell, String>,
}

impl ReconcileReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn any_succeeded(&self) -> bool {
        !self.succeeded.is_empty()
    }

    /// Partner codes with at least one failed cell, sorted and deduplicated
    pub fn failed_partners(&self) -> Vec<String> {
        let mut partners: Vec<String> = self.failed.keys().map(|c| c.cell.partner.clone()).collect();
        partners.sort();
        partners.dedup();
        partners
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WriterOptions {
    pub tier_write_mode: TierWriteMode,
    pub concurrency: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            tier_write_mode: TierWriteMode::Replace,
            concurrency: 4,
        }
    }
}

/// Applies validated plans to the commission store
pub struct CommissionWriter {
    store: Arc<dyn CommissionStore>,
    options: WriterOptions,
}

enum Upserted {
    Created(String),
    Updated(String),
}

impl Upserted {
    fn id(&self) -> &str {
        match self {
            Upserted::Created(id) | Upserted::Updated(id) => id,
        }
    }

    fn into_outcome(self, tier_type: TierType, tiers: usize) -> WriteOutcome {
        match self {
            Upserted::Created(id) => WriteOutcome::Created { id, tier_type, tiers },
            Upserted::Updated(id) => WriteOutcome::Updated { id, tier_type, tiers },
        }
    }
}

fn selector(cell: &ChannelCell) -> CommissionSelector {
    CommissionSelector {
        partner: cell.cell.partner.clone(),
        bound_type: cell.cell.bound_type,
        remit_type: cell.cell.remit_type,
        transaction_type: cell.channel,
    }
}

fn tier_record(commission_id: &str, tier: &ValidTier, keep_id: bool) -> PartnerCommissionTier {
    PartnerCommissionTier {
        id: if keep_id { tier.id.clone() } else { String::new() },
        partner_commission_id: commission_id.to_string(),
        min_value: tier.min_value.clone(),
        max_value: tier.max_value.clone(),
        amount: tier.amount.clone(),
    }
}

impl CommissionWriter {
    pub fn new(store: Arc<dyn CommissionStore>, options: WriterOptions) -> Self {
        Self { store, options }
    }

    /// Write every plan, grouping channels of the same cell so each cell
    /// looks up its existing commissions once. Cells run concurrently up to
    /// the configured limit.
    pub async fn write_all(
        &self,
        ctx: &RequestContext,
        plans: Vec<(ChannelCell, ChannelPlan)>,
    ) -> ReconcileReport {
        let mut by_cell: BTreeMap<CellKey, Vec<(Channel, ChannelPlan)>> = BTreeMap::new();
        for (cell, plan) in plans {
            by_cell.entry(cell.cell).or_default().push((cell.channel, plan));
        }

        let results: Vec<Vec<(ChannelCell, Result<WriteOutcome, BackendError>)>> = stream::iter(by_cell)
            .map(|(key, channels)| async move { self.write_cell(ctx, &key, &channels).await })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        let mut report = ReconcileReport::default();
        for (cell, result) in results.into_iter().flatten() {
            match result {
                Ok(outcome) => {
                    report.succeeded.insert(cell, outcome);
                }
                Err(e) => {
                    tracing::error!("Failed to save commission for {}: {}", cell, e);
                    report.failed.insert(cell, e.to_string());
                }
            }
        }
        report
    }

    /// Write both channels of one cell
    pub async fn write_cell(
        &self,
        ctx: &RequestContext,
        key: &CellKey,
        channels: &[(Channel, ChannelPlan)],
    ) -> Vec<(ChannelCell, Result<WriteOutcome, BackendError>)> {
        let needs_lookup = channels.iter().any(|(_, p)| !matches!(p, ChannelPlan::Clear));
        let existing: Result<Vec<PartnerCommission>, BackendError> = if needs_lookup {
            self.store
                .get_partner_commissions_list(ctx, key.bound_type, key.remit_type, &key.partner)
                .await
        } else {
            Ok(Vec::new())
        };

        let mut results = Vec::with_capacity(channels.len());
        for (channel, plan) in channels {
            let cell = key.with_channel(*channel);
            let result = match (&existing, plan) {
                (_, ChannelPlan::Clear) => self.write_channel(ctx, &cell, plan, None).await,
                (Ok(list), _) => {
                    let existing_id = list
                        .iter()
                        .find(|c| c.transaction_type == *channel)
                        .map(|c| c.id.clone());
                    self.write_channel(ctx, &cell, plan, existing_id).await
                }
                // Without the existing records we cannot tell create from update
                (Err(e), _) => Err(e.clone()),
            };
            results.push((cell, result));
        }
        results
    }

    /// Apply one plan. `existing_id` is the current commission for this
    /// cell and channel, if any.
    pub async fn write_channel(
        &self,
        ctx: &RequestContext,
        cell: &ChannelCell,
        plan: &ChannelPlan,
        existing_id: Option<String>,
    ) -> Result<WriteOutcome, BackendError> {
        match plan {
            ChannelPlan::Clear => {
                tracing::debug!("{} should be {}; removing any configured commission", cell, cell.channel);
                match self.store.delete_partner_commission(ctx, &selector(cell)).await {
                    // Nothing configured yet is the common case
                    Ok(()) | Err(BackendError::NotFound(_)) => Ok(WriteOutcome::Cleared),
                    Err(e) => Err(e),
                }
            }
            ChannelPlan::Flat {
                tier_type,
                amount,
                start_date,
                end_date,
            } => {
                let fields = CommissionFields {
                    selector: selector(cell),
                    tier_type: *tier_type,
                    amount: amount.clone(),
                    start_date: *start_date,
                    end_date: *end_date,
                    actor: ctx.actor().to_string(),
                };
                let upserted = self.upsert(ctx, existing_id, &fields).await?;
                // Drop tiers left behind by an earlier tier-based setup
                self.store.delete_partner_commission_tier(ctx, upserted.id()).await?;
                tracing::debug!("Saved {} commission for {}", tier_type, cell);
                Ok(upserted.into_outcome(*tier_type, 0))
            }
            ChannelPlan::Tiered {
                tier_type,
                start_date,
                end_date,
                tiers,
            } => {
                let fields = CommissionFields {
                    selector: selector(cell),
                    tier_type: *tier_type,
                    amount: String::new(),
                    start_date: *start_date,
                    end_date: *end_date,
                    actor: ctx.actor().to_string(),
                };
                let upserted = self.upsert(ctx, existing_id, &fields).await?;
                self.write_tiers(ctx, &upserted, tiers).await?;
                tracing::debug!("Saved {} commission with {} tiers for {}", tier_type, tiers.len(), cell);
                Ok(upserted.into_outcome(*tier_type, tiers.len()))
            }
        }
    }

    async fn upsert(
        &self,
        ctx: &RequestContext,
        existing_id: Option<String>,
        fields: &CommissionFields,
    ) -> Result<Upserted, BackendError> {
        match existing_id {
            Some(id) => {
                let id = self.store.update_partner_commission(ctx, &id, fields).await?;
                Ok(Upserted::Updated(id))
            }
            None => {
                let id = self.store.create_partner_commission(ctx, fields).await?;
                Ok(Upserted::Created(id))
            }
        }
    }

    async fn write_tiers(
        &self,
        ctx: &RequestContext,
        commission: &Upserted,
        tiers: &[ValidTier],
    ) -> Result<(), BackendError> {
        let commission_id = commission.id();

        match self.options.tier_write_mode {
            TierWriteMode::Replace => {
                // A freshly created commission has no tiers to replace
                if matches!(commission, Upserted::Updated(_)) {
                    self.store.delete_partner_commission_tier(ctx, commission_id).await?;
                }
                let records: Vec<PartnerCommissionTier> = tiers
                    .iter()
                    .map(|t| tier_record(commission_id, t, false))
                    .collect();
                if !records.is_empty() {
                    self.store.create_partner_commission_tier(ctx, &records).await?;
                }
            }
            TierWriteMode::Upsert => {
                let (to_update, to_create): (Vec<&ValidTier>, Vec<&ValidTier>) =
                    tiers.iter().partition(|t| !t.id.is_empty());

                if !to_create.is_empty() {
                    let records: Vec<_> = to_create.iter().map(|t| tier_record(commission_id, t, false)).collect();
                    self.store.create_partner_commission_tier(ctx, &records).await?;
                }
                if !to_update.is_empty() {
                    let records: Vec<_> = to_update.iter().map(|t| tier_record(commission_id, t, true)).collect();
                    self.store.update_partner_commission_tier(ctx, &records).await?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{BackendCall, MemoryBackend};
    use crate::types::{BoundType, RemitType};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn wu_digital() -> ChannelCell {
        CellKey::new(RemitType::Remittance, "WU", BoundType::Outbound).with_channel(Channel::Digital)
    }

    fn fixed(amount: &str) -> ChannelPlan {
        ChannelPlan::Flat {
            tier_type: TierType::Fixed,
            amount: amount.to_string(),
            start_date: date(2024, 1, 1),
            end_date: date(2024, 12, 31),
        }
    }

    fn tier(index: usize, id: &str, min: &str, max: &str, fee: &str) -> ValidTier {
        ValidTier {
            index,
            id: id.to_string(),
            min_value: min.to_string(),
            max_value: max.to_string(),
            amount: fee.to_string(),
            min: min.parse().unwrap(),
            max: max.parse().unwrap(),
        }
    }

    fn tiered(tier_type: TierType, tiers: Vec<ValidTier>) -> ChannelPlan {
        ChannelPlan::Tiered {
            tier_type,
            start_date: date(2024, 1, 1),
            end_date: date(2024, 12, 31),
            tiers,
        }
    }

    fn writer(backend: &Arc<MemoryBackend>, mode: TierWriteMode) -> CommissionWriter {
        CommissionWriter::new(
            backend.clone(),
            WriterOptions {
                tier_write_mode: mode,
                concurrency: 2,
            },
        )
    }

    #[tokio::test]
    async fn fixed_commission_is_created_then_its_tiers_cleared() {
        let backend = Arc::new(MemoryBackend::default());
        let w = writer(&backend, TierWriteMode::Replace);
        let ctx = RequestContext::system();

        let outcome = w.write_channel(&ctx, &wu_digital(), &fixed("2.50"), None).await.unwrap();
        let WriteOutcome::Created { id, .. } = outcome else { panic!("expected create") };

        let calls = backend.write_calls().await;
        assert_eq!(calls.len(), 2);
        match &calls[0] {
            BackendCall::CreatePartnerCommission(fields) => {
                assert_eq!(fields.selector.partner, "WU");
                assert_eq!(fields.selector.bound_type, BoundType::Outbound);
                assert_eq!(fields.selector.remit_type, RemitType::Remittance);
                assert_eq!(fields.selector.transaction_type, Channel::Digital);
                assert_eq!(fields.tier_type, TierType::Fixed);
                assert_eq!(fields.amount, "2.50");
                assert_eq!(fields.start_date, date(2024, 1, 1));
                assert_eq!(fields.end_date, date(2024, 12, 31));
            }
            other => panic!("unexpected call {:?}", other),
        }
        assert_eq!(calls[1], BackendCall::DeletePartnerCommissionTier(id));
    }

    #[tokio::test]
    async fn clear_plan_only_deletes() {
        let backend = Arc::new(MemoryBackend::default());
        let w = writer(&backend, TierWriteMode::Replace);

        let outcome = w
            .write_channel(&RequestContext::system(), &wu_digital(), &ChannelPlan::Clear, None)
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Cleared);
        assert_eq!(
            backend.write_calls().await,
            vec![BackendCall::DeletePartnerCommission(CommissionSelector {
                partner: "WU".into(),
                bound_type: BoundType::Outbound,
                remit_type: RemitType::Remittance,
                transaction_type: Channel::Digital,
            })]
        );
    }

    #[tokio::test]
    async fn new_tiered_commission_creates_tiers_in_one_batch() {
        let backend = Arc::new(MemoryBackend::default());
        let w = writer(&backend, TierWriteMode::Replace);
        let plan = tiered(
            TierType::TierPercentage,
            vec![tier(0, "", "0", "50", "1.0"), tier(1, "", "50", "100", "2.0")],
        );

        w.write_channel(&RequestContext::system(), &wu_digital(), &plan, None).await.unwrap();

        let calls = backend.write_calls().await;
        assert_eq!(calls.len(), 2);
        let BackendCall::CreatePartnerCommission(fields) = &calls[0] else { panic!("expected create") };
        assert_eq!(fields.amount, "");
        let id = backend.commissions().await[0].id.clone();
        let BackendCall::CreatePartnerCommissionTier(batch) = &calls[1] else { panic!("expected tier batch") };
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|t| t.partner_commission_id == id));
    }

    #[tokio::test]
    async fn switching_fixed_to_tiered_clears_amount_and_replaces_tiers() {
        let backend = Arc::new(MemoryBackend::default());
        let w = writer(&backend, TierWriteMode::Replace);
        let ctx = RequestContext::system();

        let WriteOutcome::Created { id, .. } = w.write_channel(&ctx, &wu_digital(), &fixed("5"), None).await.unwrap() else {
            panic!("expected create")
        };

        let plan = tiered(
            TierType::TierAmount,
            vec![tier(0, "", "0", "1000", "10"), tier(1, "", "1000", "5000", "25"), tier(2, "", "5000", "9000", "40")],
        );
        let outcome = w.write_channel(&ctx, &wu_digital(), &plan, Some(id.clone())).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Updated { id: id.clone(), tier_type: TierType::TierAmount, tiers: 3 });

        let commission = &backend.commissions().await[0];
        assert_eq!(commission.amount, "");
        assert_eq!(commission.tier_type, TierType::TierAmount);
        let stored = backend.tiers_of(&id).await;
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().all(|t| t.partner_commission_id == id));
    }

    #[tokio::test]
    async fn resubmitting_tiers_replaces_rather_than_appends() {
        let backend = Arc::new(MemoryBackend::default());
        let w = writer(&backend, TierWriteMode::Replace);
        let ctx = RequestContext::system();
        let plan = tiered(TierType::TierAmount, vec![tier(0, "", "0", "10", "1"), tier(1, "", "10", "20", "2")]);

        let WriteOutcome::Created { id, .. } = w.write_channel(&ctx, &wu_digital(), &plan, None).await.unwrap() else {
            panic!("expected create")
        };
        w.write_channel(&ctx, &wu_digital(), &plan, Some(id.clone())).await.unwrap();

        assert_eq!(backend.tiers_of(&id).await.len(), 2);
    }

    #[tokio::test]
    async fn upsert_mode_splits_tiers_by_id_and_never_deletes() {
        let backend = Arc::new(MemoryBackend::default());
        let w = writer(&backend, TierWriteMode::Upsert);
        let ctx = RequestContext::system();

        let WriteOutcome::Created { id, .. } = w
            .write_channel(&ctx, &wu_digital(), &tiered(TierType::TierAmount, vec![tier(0, "", "0", "10", "1")]), None)
            .await
            .unwrap()
        else {
            panic!("expected create")
        };
        let existing_tier = backend.tiers_of(&id).await[0].id.clone();
        backend.clear_calls().await;

        let plan = tiered(
            TierType::TierAmount,
            vec![tier(0, &existing_tier, "0", "10", "3"), tier(1, "", "10", "20", "4")],
        );
        w.write_channel(&ctx, &wu_digital(), &plan, Some(id.clone())).await.unwrap();

        let calls = backend.write_calls().await;
        assert!(matches!(calls[0], BackendCall::UpdatePartnerCommission { .. }));
        assert!(matches!(&calls[1], BackendCall::CreatePartnerCommissionTier(b) if b.len() == 1));
        assert!(matches!(&calls[2], BackendCall::UpdatePartnerCommissionTier(b) if b.len() == 1 && b[0].amount == "3"));
        assert!(!calls.iter().any(|c| matches!(c, BackendCall::DeletePartnerCommissionTier(_))));
        assert_eq!(backend.tiers_of(&id).await.len(), 2);
    }

    #[tokio::test]
    async fn one_failing_partner_does_not_stop_the_others() {
        let backend = Arc::new(MemoryBackend::default());
        backend.fail_writes_for("MG").await;
        let w = writer(&backend, TierWriteMode::Replace);

        let mg = CellKey::new(RemitType::Remittance, "MG", BoundType::Inbound);
        let plans = vec![
            (wu_digital(), fixed("1")),
            (mg.with_channel(Channel::Digital), fixed("2")),
            (mg.with_channel(Channel::Otc), ChannelPlan::Clear),
        ];
        let report = w.write_all(&RequestContext::system(), plans).await;

        assert!(!report.is_complete());
        assert!(report.any_succeeded());
        assert_eq!(report.failed_partners(), vec!["MG".to_string()]);
        assert!(report.succeeded.contains_key(&wu_digital()));
        assert_eq!(report.failed.len(), 2);
    }

    #[tokio::test]
    async fn failed_lookup_still_clears_deselected_channels() {
        let backend = Arc::new(MemoryBackend::default());
        backend.fail_lookups_for("WU").await;
        let w = writer(&backend, TierWriteMode::Replace);
        let otc = wu_digital().cell.with_channel(Channel::Otc);

        let report = w
            .write_all(&RequestContext::system(), vec![(wu_digital(), fixed("1")), (otc.clone(), ChannelPlan::Clear)])
            .await;

        assert_eq!(report.succeeded.get(&otc), Some(&WriteOutcome::Cleared));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[&wu_digital()], "backend GetPartnerCommissionsList timed out");
        assert_eq!(
            backend.write_calls().await,
            vec![BackendCall::DeletePartnerCommission(selector(&otc))]
        );
    }

    #[tokio::test]
    async fn expired_request_deadline_fails_cells_as_timeouts() {
        let store = Arc::new(crate::services::HttpBackend::new("http://127.0.0.1:9", std::time::Duration::from_secs(1)).unwrap());
        let w = CommissionWriter::new(store, WriterOptions::default());
        let ctx = RequestContext::new(None, Some(std::time::Duration::ZERO));
        let mg = CellKey::new(RemitType::Remittance, "MG", BoundType::Inbound);

        let report = w
            .write_all(&ctx, vec![(wu_digital(), fixed("1")), (mg.with_channel(Channel::Otc), ChannelPlan::Clear)])
            .await;

        assert!(!report.any_succeeded());
        assert_eq!(report.failed[&wu_digital()], "backend GetPartnerCommissionsList timed out");
        assert_eq!(report.failed[&mg.with_channel(Channel::Otc)], "backend DeletePartnerCommission timed out");
    }

    #[tokio::test]
    async fn tiered_to_fixed_round_trips_with_no_tiers() {
        let backend = Arc::new(MemoryBackend::default());
        backend
            .insert_commission(PartnerCommission {
                id: "pc-seed".to_string(),
                partner: "WU".to_string(),
                bound_type: BoundType::Outbound,
                remit_type: RemitType::Remittance,
                transaction_type: Channel::Digital,
                tier_type: TierType::TierAmount,
                amount: String::new(),
                start_date: date(2023, 1, 1),
                end_date: date(2023, 12, 31),
                created_by: "jdoe".to_string(),
                updated_by: String::new(),
            })
            .await;
        for (id, min, max) in [("pct-a", "0", "100"), ("pct-b", "100", "500")] {
            backend
                .insert_tier(PartnerCommissionTier {
                    id: id.to_string(),
                    partner_commission_id: "pc-seed".to_string(),
                    min_value: min.to_string(),
                    max_value: max.to_string(),
                    amount: "5".to_string(),
                })
                .await;
        }

        let w = writer(&backend, TierWriteMode::Replace);
        let ctx = RequestContext::system();
        let report = w.write_all(&ctx, vec![(wu_digital(), fixed("2.50"))]).await;
        assert_eq!(
            report.succeeded[&wu_digital()],
            WriteOutcome::Updated { id: "pc-seed".to_string(), tier_type: TierType::Fixed, tiers: 0 }
        );

        let stored = backend
            .get_partner_commissions_list(&ctx, BoundType::Outbound, RemitType::Remittance, "WU")
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].tier_type, TierType::Fixed);
        assert_eq!(stored[0].amount, "2.50");
        assert_eq!(stored[0].start_date, date(2024, 1, 1));
        assert_eq!(stored[0].end_date, date(2024, 12, 31));
        let tiers = backend.get_partner_commissions_tier_list(&ctx, "pc-seed").await.unwrap();
        assert!(tiers.is_empty());
    }

    #[tokio::test]
    async fn existing_commission_is_matched_by_channel() {
        let backend = Arc::new(MemoryBackend::default());
        let w = writer(&backend, TierWriteMode::Replace);
        let ctx = RequestContext::system();
        let otc = wu_digital().cell.with_channel(Channel::Otc);

        let WriteOutcome::Created { id: otc_id, .. } = w.write_channel(&ctx, &otc, &fixed("1"), None).await.unwrap() else {
            panic!("expected create")
        };

        let report = w
            .write_all(&ctx, vec![(wu_digital(), fixed("2")), (otc.clone(), fixed("3"))])
            .await;
        assert!(matches!(report.succeeded[&wu_digital()], WriteOutcome::Created { .. }));
        assert_eq!(
            report.succeeded[&otc],
            WriteOutcome::Updated { id: otc_id, tier_type: TierType::Fixed, tiers: 0 }
        );
    }
}
