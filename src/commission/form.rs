use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use super::matrix::{CellKey, MatrixError};
use crate::types::Channel;

/// `{Channel}{Field}[{prefix}]` with an optional trailing `[{tier index}]`
static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(Digital|Otc)([A-Za-z]+)\[([A-Za-z0-9]+)\](?:\[(\d{1,4})\])?$")
        .expect("commission field regex")
});

#[derive(Debug, Error, PartialEq)]
pub enum FormError {
    #[error("{0}")]
    Prefix(#[from] MatrixError),

    #[error("field '{0}' expects a tier index")]
    MissingTierIndex(String),

    #[error("field '{0}' does not take a tier index")]
    UnexpectedTierIndex(String),
}

/// Raw tier row as posted; values are validated later
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TierRowInput {
    pub id: String,
    pub min: String,
    pub max: String,
    pub fee: String,
}

impl TierRowInput {
    /// Rows left completely empty in the form are ignored
    pub fn is_blank(&self) -> bool {
        self.min.is_empty() && self.max.is_empty() && self.fee.is_empty()
    }
}

/// Everything posted for one cell on one channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelInput {
    /// Carries the channel's literal tag when the channel checkbox is ticked
    pub transaction: String,
    pub tier_type: String,
    pub amount: String,
    pub start_date: String,
    pub end_date: String,
    pub tier_count: String,
    pub tiers: BTreeMap<usize, TierRowInput>,
}

impl ChannelInput {
    /// The channel counts as selected only when it posts its own tag
    pub fn is_selected(&self, channel: Channel) -> bool {
        self.transaction == channel.as_str()
    }

    /// Posted rows with an index below `count`, in index order
    pub fn tier_rows(&self, count: usize) -> impl Iterator<Item = (usize, &TierRowInput)> {
        self.tiers.range(..count).map(|(i, row)| (*i, row))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellInput {
    pub digital: ChannelInput,
    pub otc: ChannelInput,
}

impl CellInput {
    pub fn channel(&self, channel: Channel) -> &ChannelInput {
        match channel {
            Channel::Digital => &self.digital,
            Channel::Otc => &self.otc,
        }
    }

    fn channel_mut(&mut self, channel: Channel) -> &mut ChannelInput {
        match channel {
            Channel::Digital => &mut self.digital,
            Channel::Otc => &mut self.otc,
        }
    }
}

/// Decoded commission form keyed by cell
#[derive(Debug, Clone, Default)]
pub struct CommissionForm {
    cells: HashMap<CellKey, CellInput>,
}

static EMPTY_CELL: Lazy<CellInput> = Lazy::new(CellInput::default);

impl CommissionForm {
    /// Decode urlencoded `(name, value)` pairs. Fields outside the commission
    /// naming scheme (CSRF token, submit button, ...) are ignored.
    pub fn parse<I, K, V>(pairs: I) -> Result<Self, FormError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut form = Self::default();

        for (name, value) in pairs {
            let name = name.as_ref();
            let Some(caps) = FIELD_RE.captures(name) else {
                continue;
            };

            let Some(channel) = Channel::from_field_prefix(&caps[1]) else {
                continue;
            };
            let field = &caps[2];
            let key = CellKey::from_prefix(&caps[3])?;
            let index = caps.get(4).and_then(|m| m.as_str().parse::<usize>().ok());
            let value = value.as_ref().trim().to_string();

            let input = form.cells.entry(key).or_default().channel_mut(channel);

            match (field, index) {
                ("TierID" | "TierMin" | "TierMax" | "TierFee", None) => {
                    return Err(FormError::MissingTierIndex(name.to_string()));
                }
                ("TierID" | "TierMin" | "TierMax" | "TierFee", Some(i)) => {
                    let row = input.tiers.entry(i).or_default();
                    match field {
                        "TierID" => row.id = value,
                        "TierMin" => row.min = value,
                        "TierMax" => row.max = value,
                        _ => row.fee = value,
                    }
                }
                (_, Some(_)) => return Err(FormError::UnexpectedTierIndex(name.to_string())),
                ("Transaction", None) => input.transaction = value,
                ("TierType", None) => input.tier_type = value,
                ("Amount", None) => input.amount = value,
                ("StartDate", None) => input.start_date = value,
                ("EndDate", None) => input.end_date = value,
                ("TierCount", None) => input.tier_count = value,
                (other, None) => {
                    tracing::debug!("Ignoring unknown commission field '{}'", other);
                }
            }
        }

        Ok(form)
    }

    /// Posted input for a cell; cells absent from the form read as empty,
    /// which means both channels are deselected.
    pub fn cell(&self, key: &CellKey) -> &CellInput {
        self.cells.get(key).unwrap_or(&EMPTY_CELL)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }
}
