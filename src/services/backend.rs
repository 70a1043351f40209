// Backend service contracts consumed by the portal
//
// The portal owns no data. Partners come from the partner directory,
// commissions and tiers live in the partner-commission service, and the
// commission-sync service pushes configuration out to the partner hub.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::context::RequestContext;
use crate::types::{
    BoundType, Channel, Partner, PartnerCommission, PartnerCommissionTier, PartnerStatus,
    RemitType, ServiceName, TierType,
};

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("backend transport error: {0}")]
    Transport(String),

    #[error("backend {method} returned {status}: {message}")]
    Status {
        method: &'static str,
        status: u16,
        message: String,
    },

    #[error("backend {0} timed out")]
    Timeout(&'static str),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid backend response from {method}: {message}")]
    Decode { method: &'static str, message: String },

    #[error("invalid backend configuration: {0}")]
    Config(String),
}

/// Identifies one commission record: a cell on one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSelector {
    pub partner: String,
    pub bound_type: BoundType,
    pub remit_type: RemitType,
    pub transaction_type: Channel,
}

/// Fields sent on create and update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionFields {
    #[serde(flatten)]
    pub selector: CommissionSelector,
    pub tier_type: TierType,
    /// Empty for tier-based structures
    pub amount: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Recorded as created_by on create and updated_by on update
    pub actor: String,
}

#[async_trait]
pub trait PartnerDirectory: Send + Sync {
    async fn get_partner_list(
        &self,
        ctx: &RequestContext,
        status: PartnerStatus,
        service: ServiceName,
    ) -> Result<Vec<Partner>, BackendError>;
}

#[async_trait]
pub trait CommissionStore: Send + Sync {
    async fn get_partner_commissions_list(
        &self,
        ctx: &RequestContext,
        bound_type: BoundType,
        remit_type: RemitType,
        partner: &str,
    ) -> Result<Vec<PartnerCommission>, BackendError>;

    async fn get_partner_commissions_tier_list(
        &self,
        ctx: &RequestContext,
        partner_commission_id: &str,
    ) -> Result<Vec<PartnerCommissionTier>, BackendError>;

    /// Returns the id of the new commission
    async fn create_partner_commission(
        &self,
        ctx: &RequestContext,
        fields: &CommissionFields,
    ) -> Result<String, BackendError>;

    async fn update_partner_commission(
        &self,
        ctx: &RequestContext,
        id: &str,
        fields: &CommissionFields,
    ) -> Result<String, BackendError>;

    async fn delete_partner_commission(
        &self,
        ctx: &RequestContext,
        selector: &CommissionSelector,
    ) -> Result<(), BackendError>;

    async fn create_partner_commission_tier(
        &self,
        ctx: &RequestContext,
        tiers: &[PartnerCommissionTier],
    ) -> Result<(), BackendError>;

    async fn update_partner_commission_tier(
        &self,
        ctx: &RequestContext,
        tiers: &[PartnerCommissionTier],
    ) -> Result<(), BackendError>;

    /// Deletes every tier of a commission
    async fn delete_partner_commission_tier(
        &self,
        ctx: &RequestContext,
        partner_commission_id: &str,
    ) -> Result<(), BackendError>;

    async fn delete_partner_commission_tier_by_id(
        &self,
        ctx: &RequestContext,
        id: &str,
    ) -> Result<(), BackendError>;
}

#[async_trait]
pub trait CommissionSync: Send + Sync {
    async fn sync_remco_commission_config_for_remittance(
        &self,
        ctx: &RequestContext,
    ) -> Result<(), BackendError>;
}

/// The set of backends a portal instance talks to
#[derive(Clone)]
pub struct Backends {
    pub partners: Arc<dyn PartnerDirectory>,
    pub commissions: Arc<dyn CommissionStore>,
    pub sync: Arc<dyn CommissionSync>,
}

impl Backends {
    /// Use one implementation for every backend
    pub fn shared<T>(backend: Arc<T>) -> Self
    where
        T: PartnerDirectory + CommissionStore + CommissionSync + 'static,
    {
        Self {
            partners: backend.clone(),
            commissions: backend.clone(),
            sync: backend,
        }
    }

    pub fn from_config(config: &crate::config::BackendConfig) -> Result<Self, BackendError> {
        use crate::config::BackendMode;
        use crate::services::{HttpBackend, MemoryBackend};

        match config.mode {
            BackendMode::Http => Ok(Self::shared(Arc::new(HttpBackend::from_config(config)?))),
            BackendMode::Memory => {
                let partners = MemoryBackend::parse_partner_seeds(&config.memory_partners)?;
                Ok(Self::shared(Arc::new(MemoryBackend::with_partners(partners))))
            }
        }
    }
}
