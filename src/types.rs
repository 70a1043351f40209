/// Shared types used across the codebase
///
/// Every enum here carries two spellings: the wire tag the backend services
/// expect (`INBOUND`, `DIGITAL`, ...) and, where the form protocol needs one,
/// the short key embedded in form field prefixes (`inb`, `rmt`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Remittance flavour of a commission cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RemitType {
    #[serde(rename = "REMITTANCE")]
    Remittance,
}

impl RemitType {
    /// Ordered enumeration used by the matrix builder
    pub const ALL: [RemitType; 1] = [RemitType::Remittance];

    pub fn as_str(&self) -> &'static str {
        match self {
            RemitType::Remittance => "REMITTANCE",
        }
    }

    /// Short key used in form field prefixes
    pub fn form_key(&self) -> &'static str {
        match self {
            RemitType::Remittance => "rmt",
        }
    }

    pub fn from_form_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.form_key() == key)
    }
}

/// Direction of the remittance relative to the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BoundType {
    #[serde(rename = "INBOUND")]
    Inbound,
    #[serde(rename = "OUTBOUND")]
    Outbound,
}

impl BoundType {
    pub const ALL: [BoundType; 2] = [BoundType::Inbound, BoundType::Outbound];

    pub fn as_str(&self) -> &'static str {
        match self {
            BoundType::Inbound => "INBOUND",
            BoundType::Outbound => "OUTBOUND",
        }
    }

    pub fn form_key(&self) -> &'static str {
        match self {
            BoundType::Inbound => "inb",
            BoundType::Outbound => "otb",
        }
    }

    pub fn from_form_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.form_key() == key)
    }
}

/// Transaction channel; each commission cell is configured once per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "DIGITAL")]
    Digital,
    #[serde(rename = "OTC")]
    Otc,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Digital, Channel::Otc];

    /// Literal tag posted by the channel checkbox and sent to the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Digital => "DIGITAL",
            Channel::Otc => "OTC",
        }
    }

    /// Leading segment of this channel's form field names
    pub fn field_prefix(&self) -> &'static str {
        match self {
            Channel::Digital => "Digital",
            Channel::Otc => "Otc",
        }
    }

    pub fn from_field_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.field_prefix() == prefix)
    }
}

/// Fee structure of a partner commission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TierType {
    #[serde(rename = "FIXED")]
    Fixed,
    #[serde(rename = "PERCENTAGE")]
    Percentage,
    #[serde(rename = "TIERAMOUNT")]
    TierAmount,
    #[serde(rename = "TIERPERCENTAGE")]
    TierPercentage,
}

impl TierType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierType::Fixed => "FIXED",
            TierType::Percentage => "PERCENTAGE",
            TierType::TierAmount => "TIERAMOUNT",
            TierType::TierPercentage => "TIERPERCENTAGE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "FIXED" => Some(TierType::Fixed),
            "PERCENTAGE" => Some(TierType::Percentage),
            "TIERAMOUNT" => Some(TierType::TierAmount),
            "TIERPERCENTAGE" => Some(TierType::TierPercentage),
            _ => None,
        }
    }

    /// Tier-based structures carry their fee in child tier rows
    pub fn is_tiered(&self) -> bool {
        matches!(self, TierType::TierAmount | TierType::TierPercentage)
    }

    pub fn is_percentage(&self) -> bool {
        matches!(self, TierType::Percentage | TierType::TierPercentage)
    }
}

macro_rules! impl_display_as_str {
    ($($t:ty),*) => {
        $(impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

impl_display_as_str!(RemitType, BoundType, Channel, TierType);

/// Partner status as reported by the partner directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnerStatus {
    Enabled,
    Disabled,
}

impl PartnerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartnerStatus::Enabled => "enabled",
            PartnerStatus::Disabled => "disabled",
        }
    }
}

/// Service a partner is onboarded for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceName {
    Remittance,
    Cico,
    BillsPayment,
    MicroInsurance,
}

impl ServiceName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Remittance => "REMITTANCE",
            ServiceName::Cico => "CICO",
            ServiceName::BillsPayment => "BILLS_PAYMENT",
            ServiceName::MicroInsurance => "MICRO_INSURANCE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub stype: String,
    pub name: String,
    pub status: PartnerStatus,
    pub service_name: ServiceName,
}

/// One commission record per cell and channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerCommission {
    pub id: String,
    pub partner: String,
    pub bound_type: BoundType,
    pub remit_type: RemitType,
    pub transaction_type: Channel,
    pub tier_type: TierType,
    /// Empty for tier-based structures
    #[serde(default)]
    pub amount: String,
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub updated_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerCommissionTier {
    #[serde(default)]
    pub id: String,
    pub partner_commission_id: String,
    pub min_value: String,
    pub max_value: String,
    pub amount: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_tags_are_preserved_through_serde() {
        let json = serde_json::to_string(&(BoundType::Outbound, Channel::Otc, TierType::TierPercentage)).unwrap();
        assert_eq!(json, r#"["OUTBOUND","OTC","TIERPERCENTAGE"]"#);
        assert_eq!(serde_json::to_string(&ServiceName::BillsPayment).unwrap(), r#""BILLS_PAYMENT""#);
    }

    #[test]
    fn form_keys_resolve_back_to_their_variant() {
        for b in BoundType::ALL {
            assert_eq!(BoundType::from_form_key(b.form_key()), Some(b));
        }
        assert_eq!(RemitType::from_form_key("rmt"), Some(RemitType::Remittance));
        assert_eq!(BoundType::from_form_key("xyz"), None);
    }

    #[test]
    fn tier_type_parse_is_case_sensitive() {
        assert_eq!(TierType::parse("TIERAMOUNT"), Some(TierType::TierAmount));
        assert_eq!(TierType::parse("fixed"), None);
        assert!(TierType::TierAmount.is_tiered());
        assert!(!TierType::Percentage.is_tiered());
    }
}
