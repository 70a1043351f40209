use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use url::Url;

use super::backend::{
    BackendError, CommissionFields, CommissionSelector, CommissionStore, CommissionSync,
    PartnerDirectory,
};
use crate::config::BackendConfig;
use crate::context::RequestContext;
use crate::types::{
    BoundType, Partner, PartnerCommission, PartnerCommissionTier, PartnerStatus, RemitType,
    ServiceName,
};

/// Client for the JSON gateway in front of the backend services.
///
/// Every method maps to `POST {base_url}/v1/{Method}` with a JSON body. The
/// caller's bearer token and request id are forwarded on each call.
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    default_timeout: Duration,
}

#[derive(Deserialize)]
struct PartnerListResponse {
    #[serde(default)]
    partners: Vec<Partner>,
}

#[derive(Deserialize)]
struct CommissionListResponse {
    #[serde(default)]
    commissions: Vec<PartnerCommission>,
}

#[derive(Deserialize)]
struct TierListResponse {
    #[serde(default)]
    tiers: Vec<PartnerCommissionTier>,
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Serialize)]
struct UpdateCommissionRequest<'a> {
    id: &'a str,
    #[serde(flatten)]
    fields: &'a CommissionFields,
}

impl HttpBackend {
    pub fn new(base_url: &str, default_timeout: Duration) -> Result<Self, BackendError> {
        // Trailing slash so Url::join appends instead of replacing the last segment
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| BackendError::Config(format!("invalid base url '{}': {}", base_url, e)))?;

        let client = Client::builder()
            .user_agent(concat!("remco-cms/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            default_timeout,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        Self::new(&config.base_url, Duration::from_millis(config.request_timeout_ms))
    }

    pub fn endpoint(&self, method: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(&format!("v1/{}", method))
            .map_err(|e| BackendError::Config(e.to_string()))
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        ctx: &RequestContext,
        method: &'static str,
        body: &B,
    ) -> Result<Vec<u8>, BackendError> {
        let timeout = match ctx.remaining() {
            Some(left) if left.is_zero() => return Err(BackendError::Timeout(method)),
            Some(left) => left.min(self.default_timeout),
            None => self.default_timeout,
        };

        let mut request = self
            .client
            .post(self.endpoint(method)?)
            .timeout(timeout)
            .header("x-request-id", ctx.request_id.to_string())
            .json(body);
        if let Some(token) = ctx.bearer_token() {
            request = request.bearer_auth(token);
        }

        tracing::debug!("Backend call {} (request {})", method, ctx.request_id);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(method)
            } else {
                BackendError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(format!(
                "{}: {}",
                method,
                String::from_utf8_lossy(&bytes)
            )));
        }
        if !status.is_success() {
            tracing::error!("Backend {} failed with {}", method, status);
            return Err(BackendError::Status {
                method,
                status: status.as_u16(),
                message: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(bytes.to_vec())
    }

    async fn call<B, R>(&self, ctx: &RequestContext, method: &'static str, body: &B) -> Result<R, BackendError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let bytes = self.send(ctx, method, body).await?;
        serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode {
            method,
            message: e.to_string(),
        })
    }

    /// For methods whose response body carries nothing of interest
    async fn call_unit<B: Serialize + ?Sized>(
        &self,
        ctx: &RequestContext,
        method: &'static str,
        body: &B,
    ) -> Result<(), BackendError> {
        self.send(ctx, method, body).await.map(|_| ())
    }
}

#[async_trait]
impl PartnerDirectory for HttpBackend {
    async fn get_partner_list(
        &self,
        ctx: &RequestContext,
        status: PartnerStatus,
        service: ServiceName,
    ) -> Result<Vec<Partner>, BackendError> {
        let body = json!({ "status": status.as_str(), "service_name": service.as_str() });
        let resp: PartnerListResponse = self.call(ctx, "GetPartnerList", &body).await?;
        Ok(resp.partners)
    }
}

#[async_trait]
impl CommissionStore for HttpBackend {
    async fn get_partner_commissions_list(
        &self,
        ctx: &RequestContext,
        bound_type: BoundType,
        remit_type: RemitType,
        partner: &str,
    ) -> Result<Vec<PartnerCommission>, BackendError> {
        let body = json!({ "bound_type": bound_type, "remit_type": remit_type, "partner": partner });
        let resp: CommissionListResponse = self.call(ctx, "GetPartnerCommissionsList", &body).await?;
        Ok(resp.commissions)
    }

    async fn get_partner_commissions_tier_list(
        &self,
        ctx: &RequestContext,
        partner_commission_id: &str,
    ) -> Result<Vec<PartnerCommissionTier>, BackendError> {
        let body = json!({ "partner_commission_id": partner_commission_id });
        let resp: TierListResponse = self.call(ctx, "GetPartnerCommissionsTierList", &body).await?;
        Ok(resp.tiers)
    }

    async fn create_partner_commission(
        &self,
        ctx: &RequestContext,
        fields: &CommissionFields,
    ) -> Result<String, BackendError> {
        let resp: IdResponse = self.call(ctx, "CreatePartnerCommission", fields).await?;
        Ok(resp.id)
    }

    async fn update_partner_commission(
        &self,
        ctx: &RequestContext,
        id: &str,
        fields: &CommissionFields,
    ) -> Result<String, BackendError> {
        let body = UpdateCommissionRequest { id, fields };
        let resp: IdResponse = self.call(ctx, "UpdatePartnerCommission", &body).await?;
        Ok(resp.id)
    }

    async fn delete_partner_commission(
        &self,
        ctx: &RequestContext,
        selector: &CommissionSelector,
    ) -> Result<(), BackendError> {
        self.call_unit(ctx, "DeletePartnerCommission", selector).await
    }

    async fn create_partner_commission_tier(
        &self,
        ctx: &RequestContext,
        tiers: &[PartnerCommissionTier],
    ) -> Result<(), BackendError> {
        self.call_unit(ctx, "CreatePartnerCommissionTier", &json!({ "tiers": tiers })).await
    }

    async fn update_partner_commission_tier(
        &self,
        ctx: &RequestContext,
        tiers: &[PartnerCommissionTier],
    ) -> Result<(), BackendError> {
        self.call_unit(ctx, "UpdatePartnerCommissionTier", &json!({ "tiers": tiers })).await
    }

    async fn delete_partner_commission_tier(
        &self,
        ctx: &RequestContext,
        partner_commission_id: &str,
    ) -> Result<(), BackendError> {
        let body = json!({ "partner_commission_id": partner_commission_id });
        self.call_unit(ctx, "DeletePartnerCommissionTier", &body).await
    }

    async fn delete_partner_commission_tier_by_id(
        &self,
        ctx: &RequestContext,
        id: &str,
    ) -> Result<(), BackendError> {
        self.call_unit(ctx, "DeletePartnerCommissionTierById", &json!({ "id": id })).await
    }
}

#[async_trait]
impl CommissionSync for HttpBackend {
    async fn sync_remco_commission_config_for_remittance(
        &self,
        ctx: &RequestContext,
    ) -> Result<(), BackendError> {
        self.call_unit(ctx, "SyncRemcoCommissionConfigForRemittance", &json!({})).await
    }
}
