use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::task::JoinHandle;

use super::backend::{BackendError, Backends};
use crate::commission::{
    build_matrix, validate_matrix, CellKey, ChannelCell, ChannelPlan, CommissionForm,
    CommissionWriter, FormError, MatrixError, ReconcileReport, ValidationErrors,
    ValidationOptions, WriterOptions,
};
use crate::config::CommissionConfig;
use crate::context::{spawn_detached, RequestContext};
use crate::types::{
    BoundType, Channel, Partner, PartnerCommission, PartnerCommissionTier, PartnerStatus,
    RemitType, ServiceName,
};

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("{0}")]
    Backend(#[from] BackendError),
    #[error("{0}")]
    Matrix(#[from] MatrixError),
    #[error("{0}")]
    Form(#[from] FormError),
    #[error("{0}")]
    Validation(#[from] ValidationErrors),
}

/// Existing configuration of one cell on one channel
#[derive(Debug, Serialize)]
pub struct ChannelView {
    pub commission: PartnerCommission,
    pub tiers: Vec<PartnerCommissionTier>,
}

#[derive(Debug, Serialize)]
pub struct CellView {
    pub prefix: String,
    pub partner: String,
    pub bound_type: BoundType,
    pub remit_type: RemitType,
    pub channels: BTreeMap<Channel, ChannelView>,
}

/// Everything the remittance commission page renders
#[derive(Debug, Serialize)]
pub struct CommissionPage {
    pub partners: Vec<Partner>,
    pub cells: Vec<CellView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errmsg: Option<String>,
}

/// Remittance commission flows: page model, matrix submission, single tier
/// delete and the follow-up sync.
#[derive(Clone)]
pub struct CommissionService {
    backends: Backends,
    config: CommissionConfig,
}

impl CommissionService {
    pub fn new(backends: Backends, config: CommissionConfig) -> Self {
        Self { backends, config }
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            strict_parsing: self.config.strict_parsing,
            today: chrono::Utc::now().date_naive(),
        }
    }

    pub async fn enabled_partners(&self, ctx: &RequestContext) -> Result<Vec<Partner>, BackendError> {
        self.backends
            .partners
            .get_partner_list(ctx, PartnerStatus::Enabled, ServiceName::Remittance)
            .await
    }

    pub async fn cells(&self, ctx: &RequestContext) -> Result<(Vec<Partner>, Vec<CellKey>), ReconcileError> {
        let partners = self.enabled_partners(ctx).await?;
        let cells = build_matrix(&RemitType::ALL, &BoundType::ALL, &partners)?;
        Ok((partners, cells))
    }

    /// Validate a submission against the current partner matrix without
    /// writing anything. Returns the plans a submit would apply.
    pub async fn check(
        &self,
        ctx: &RequestContext,
        form: &CommissionForm,
    ) -> Result<Vec<(ChannelCell, ChannelPlan)>, ReconcileError> {
        let (_, cells) = self.cells(ctx).await?;
        Ok(validate_matrix(&cells, form, &self.validation_options())?)
    }

    /// Validate the whole matrix, then write every cell. A validation
    /// failure anywhere aborts before the first write. Once writing starts,
    /// failures are collected in the report and do not stop other cells.
    pub async fn submit(
        &self,
        ctx: &RequestContext,
        form: &CommissionForm,
    ) -> Result<ReconcileReport, ReconcileError> {
        let (_, cells) = self.cells(ctx).await?;

        let plans = validate_matrix(&cells, form, &self.validation_options()).map_err(|e| {
            tracing::info!("Commission submission rejected with {} errors", e.0.len());
            e
        })?;

        let writer = CommissionWriter::new(
            self.backends.commissions.clone(),
            WriterOptions {
                tier_write_mode: self.config.tier_write_mode,
                concurrency: self.config.write_concurrency,
            },
        );
        let report = writer.write_all(ctx, plans).await;

        tracing::info!(
            "Commission submission by {}: {} saved, {} failed",
            ctx.actor(),
            report.succeeded.len(),
            report.failed.len()
        );

        if report.any_succeeded() {
            self.trigger_sync(ctx);
        }
        Ok(report)
    }

    /// Push the remittance commission configuration to the partner hub in
    /// the background. The task is not tied to the calling request.
    pub fn trigger_sync(&self, ctx: &RequestContext) -> JoinHandle<()> {
        let sync = self.backends.sync.clone();
        spawn_detached(ctx, "commission_sync", move |ctx| async move {
            sync.sync_remco_commission_config_for_remittance(&ctx).await
        })
    }

    pub async fn delete_tier(&self, ctx: &RequestContext, id: &str) -> Result<(), BackendError> {
        if id.trim().is_empty() {
            return Err(BackendError::NotFound("tier id is empty".to_string()));
        }
        self.backends
            .commissions
            .delete_partner_commission_tier_by_id(ctx, id)
            .await?;
        tracing::info!("Tier {} deleted by {}", id, ctx.actor());
        Ok(())
    }

    /// Page model: the partner matrix with whatever is configured per cell
    pub async fn page(
        &self,
        ctx: &RequestContext,
        errmsg: Option<String>,
    ) -> Result<CommissionPage, ReconcileError> {
        let (partners, cells) = self.cells(ctx).await?;
        let concurrency = self.config.write_concurrency.max(1);

        let views: Vec<CellView> = stream::iter(cells)
            .map(|key| async move { self.cell_view(ctx, key).await })
            .buffered(concurrency)
            .try_collect()
            .await?;

        Ok(CommissionPage {
            partners,
            cells: views,
            errmsg: errmsg.filter(|m| !m.is_empty()),
        })
    }

    async fn cell_view(&self, ctx: &RequestContext, key: CellKey) -> Result<CellView, BackendError> {
        let store = &self.backends.commissions;
        let commissions = store
            .get_partner_commissions_list(ctx, key.bound_type, key.remit_type, &key.partner)
            .await?;

        let mut channels = BTreeMap::new();
        for commission in commissions {
            let tiers = if commission.tier_type.is_tiered() {
                store.get_partner_commissions_tier_list(ctx, &commission.id).await?
            } else {
                Vec::new()
            };
            channels.insert(commission.transaction_type, ChannelView { commission, tiers });
        }

        Ok(CellView {
            prefix: key.prefix(),
            partner: key.partner,
            bound_type: key.bound_type,
            remit_type: key.remit_type,
            channels,
        })
    }
}
