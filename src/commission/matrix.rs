use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use crate::types::{BoundType, Channel, Partner, RemitType};

#[derive(Debug, Error, PartialEq)]
pub enum MatrixError {
    #[error("no partners available for commission setup")]
    NoPartners,

    #[error("no bound types configured")]
    NoBoundTypes,

    #[error("no remit types configured")]
    NoRemitTypes,

    #[error("invalid commission prefix: {0}")]
    InvalidPrefix(String),
}

/// Composite key of one commission cell.
///
/// Ordering follows the processing order: remit type, then bound type, then
/// partner code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub remit_type: RemitType,
    pub bound_type: BoundType,
    pub partner: String,
}

impl CellKey {
    pub fn new(remit_type: RemitType, partner: impl Into<String>, bound_type: BoundType) -> Self {
        Self {
            remit_type,
            bound_type,
            partner: partner.into(),
        }
    }

    /// Form field prefix, e.g. `rmtWUotb`
    pub fn prefix(&self) -> String {
        format!(
            "{}{}{}",
            self.remit_type.form_key(),
            self.partner,
            self.bound_type.form_key()
        )
    }

    /// Inverse of [`CellKey::prefix`]. The remit key is a fixed leading
    /// segment and the bound key a fixed trailing segment, so the partner code
    /// in between is recovered unambiguously.
    pub fn from_prefix(prefix: &str) -> Result<Self, MatrixError> {
        let invalid = || MatrixError::InvalidPrefix(prefix.to_string());

        let (remit_type, rest) = RemitType::ALL
            .into_iter()
            .find_map(|t| prefix.strip_prefix(t.form_key()).map(|rest| (t, rest)))
            .ok_or_else(invalid)?;

        let (bound_type, partner) = BoundType::ALL
            .into_iter()
            .find_map(|b| rest.strip_suffix(b.form_key()).map(|p| (b, p)))
            .ok_or_else(invalid)?;

        if !is_valid_partner_code(partner) {
            return Err(invalid());
        }

        Ok(Self::new(remit_type, partner, bound_type))
    }

    pub fn with_channel(&self, channel: Channel) -> ChannelCell {
        ChannelCell {
            cell: self.clone(),
            channel,
        }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix())
    }
}

impl Serialize for CellKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.prefix())
    }
}

/// A commission cell on one transaction channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelCell {
    pub cell: CellKey,
    pub channel: Channel,
}

impl fmt::Display for ChannelCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cell.prefix(), self.channel)
    }
}

// Used as a JSON map key in reports
impl Serialize for ChannelCell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Partner codes are short alphanumeric identifiers (`WU`, `MG`, `IR`).
pub fn is_valid_partner_code(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Enumerate the commission cells for a submission in processing order.
///
/// Duplicate partner codes are collapsed to their first occurrence.
pub fn build_matrix(
    remit_types: &[RemitType],
    bound_types: &[BoundType],
    partners: &[Partner],
) -> Result<Vec<CellKey>, MatrixError> {
    if remit_types.is_empty() {
        return Err(MatrixError::NoRemitTypes);
    }
    if bound_types.is_empty() {
        return Err(MatrixError::NoBoundTypes);
    }

    let mut codes: Vec<&str> = Vec::with_capacity(partners.len());
    for partner in partners {
        if !is_valid_partner_code(&partner.stype) {
            tracing::warn!("Skipping partner with unusable code '{}'", partner.stype);
            continue;
        }
        if !codes.contains(&partner.stype.as_str()) {
            codes.push(&partner.stype);
        }
    }
    if codes.is_empty() {
        return Err(MatrixError::NoPartners);
    }

    let mut cells = Vec::with_capacity(remit_types.len() * bound_types.len() * codes.len());
    for &remit_type in remit_types {
        for &bound_type in bound_types {
            for code in &codes {
                cells.push(CellKey::new(remit_type, *code, bound_type));
            }
        }
    }
    Ok(cells)
}
