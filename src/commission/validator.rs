use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use super::form::{ChannelInput, CommissionForm};
use super::matrix::{CellKey, ChannelCell};
use crate::types::{Channel, TierType};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationErrorKind {
    #[error("invalid commission type '{0}'")]
    InvalidTierType(String),

    #[error("invalid amount '{0}'")]
    InvalidAmount(String),

    #[error("invalid {field} '{value}', expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },

    #[error("invalid tier count '{0}'")]
    InvalidTierCount(String),

    #[error("invalid {field} '{value}' in tier {tier}")]
    InvalidTierValue { tier: usize, field: &'static str, value: String },

    #[error("fee in tier {tier} must be greater than 0")]
    InvalidTierFee { tier: usize },

    #[error("percentage in tier {tier} must not exceed 100")]
    TierPercentageTooHigh { tier: usize },

    #[error("min value {min} must be less than max value {max} in tier {tier}")]
    TierMinNotBelowMax { tier: usize, min: f64, max: f64 },

    #[error("min value {min} in tier {tier} is within range of previous tier (max {previous_max})")]
    TierOverlap { tier: usize, min: f64, previous_max: f64 },
}

/// A validation failure attributed to one cell and channel
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub cell: ChannelCell,
    pub kind: ValidationErrorKind,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} for partner {} ({} {})",
            self.kind, self.cell.cell.partner, self.cell.cell.bound_type, self.cell.channel
        )
    }
}

impl std::error::Error for ValidationError {}

/// Every failure found across the matrix, at most one per cell and channel
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    /// Messages keyed by `prefix/channel`, for JSON clients
    pub fn field_errors(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|e| (e.cell.to_string(), e.to_string()))
            .collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Surface unparsable tier counts and dates instead of defaulting them
    pub strict_parsing: bool,
    /// Fallback for unparsable dates in lenient mode
    pub today: NaiveDate,
}

impl ValidationOptions {
    pub fn lenient(today: NaiveDate) -> Self {
        Self { strict_parsing: false, today }
    }

    pub fn strict(today: NaiveDate) -> Self {
        Self { strict_parsing: true, today }
    }
}

/// Tier row that passed validation. Raw strings are what gets sent to the
/// backend; parsed values are kept for callers that need them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidTier {
    pub index: usize,
    pub id: String,
    pub min_value: String,
    pub max_value: String,
    pub amount: String,
    #[serde(skip)]
    pub min: f64,
    #[serde(skip)]
    pub max: f64,
}

/// What the writer should do for one cell and channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChannelPlan {
    /// Channel deselected or commission type cleared
    Clear,
    Flat {
        tier_type: TierType,
        amount: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    Tiered {
        tier_type: TierType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        tiers: Vec<ValidTier>,
    },
}

fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_date(
    field: &'static str,
    value: &str,
    options: &ValidationOptions,
) -> Result<NaiveDate, ValidationErrorKind> {
    match NaiveDate::parse_from_str(value, DATE_FORMAT) {
        Ok(date) => Ok(date),
        Err(_) if options.strict_parsing => Err(ValidationErrorKind::InvalidDate {
            field,
            value: value.to_string(),
        }),
        Err(_) => {
            tracing::debug!("Unparsable {} '{}', defaulting to {}", field, value, options.today);
            Ok(options.today)
        }
    }
}

fn parse_tier_count(value: &str, options: &ValidationOptions) -> Result<usize, ValidationErrorKind> {
    match value.parse::<usize>() {
        Ok(count) => Ok(count),
        Err(_) if options.strict_parsing => Err(ValidationErrorKind::InvalidTierCount(value.to_string())),
        Err(_) => Ok(0),
    }
}

fn validate_tiers(
    tier_type: TierType,
    input: &ChannelInput,
    options: &ValidationOptions,
) -> Result<Vec<ValidTier>, ValidationErrorKind> {
    let count = parse_tier_count(&input.tier_count, options)?;
    let mut tiers: Vec<ValidTier> = Vec::new();

    for (index, row) in input.tier_rows(count) {
        if row.is_blank() {
            continue;
        }
        let tier = index + 1;
        let number = |field: &'static str, value: &str| {
            parse_number(value).ok_or_else(|| ValidationErrorKind::InvalidTierValue {
                tier,
                field,
                value: value.to_string(),
            })
        };

        let min = number("min value", &row.min)?;
        let max = number("max value", &row.max)?;
        let fee = number("fee", &row.fee)?;

        if fee <= 0.0 {
            return Err(ValidationErrorKind::InvalidTierFee { tier });
        }
        if tier_type.is_percentage() && fee > 100.0 {
            return Err(ValidationErrorKind::TierPercentageTooHigh { tier });
        }
        if min >= max {
            return Err(ValidationErrorKind::TierMinNotBelowMax { tier, min, max });
        }
        // Rows are checked in submitted order; overlap with the previous row
        // is the same condition as overlap with the next one.
        if let Some(previous) = tiers.last() {
            if min < previous.max {
                return Err(ValidationErrorKind::TierOverlap {
                    tier,
                    min,
                    previous_max: previous.max,
                });
            }
        }

        tiers.push(ValidTier {
            index,
            id: row.id.clone(),
            min_value: row.min.clone(),
            max_value: row.max.clone(),
            amount: row.fee.clone(),
            min,
            max,
        });
    }

    Ok(tiers)
}

fn validate_kind(
    channel: Channel,
    input: &ChannelInput,
    options: &ValidationOptions,
) -> Result<ChannelPlan, ValidationErrorKind> {
    if !input.is_selected(channel) || input.tier_type.is_empty() {
        return Ok(ChannelPlan::Clear);
    }

    let tier_type = TierType::parse(&input.tier_type)
        .ok_or_else(|| ValidationErrorKind::InvalidTierType(input.tier_type.clone()))?;

    if tier_type.is_tiered() {
        let tiers = validate_tiers(tier_type, input, options)?;
        let start_date = parse_date("start date", &input.start_date, options)?;
        let end_date = parse_date("end date", &input.end_date, options)?;
        return Ok(ChannelPlan::Tiered {
            tier_type,
            start_date,
            end_date,
            tiers,
        });
    }

    // No upper bound on flat percentages; only tiered percentages are capped.
    match parse_number(&input.amount) {
        Some(v) if v >= 0.0 => {}
        _ => return Err(ValidationErrorKind::InvalidAmount(input.amount.clone())),
    }
    let start_date = parse_date("start date", &input.start_date, options)?;
    let end_date = parse_date("end date", &input.end_date, options)?;

    Ok(ChannelPlan::Flat {
        tier_type,
        amount: input.amount.clone(),
        start_date,
        end_date,
    })
}

/// Validate one cell on one channel, stopping at its first failure.
pub fn validate_channel(
    cell: &ChannelCell,
    input: &ChannelInput,
    options: &ValidationOptions,
) -> Result<ChannelPlan, ValidationError> {
    validate_kind(cell.channel, input, options).map_err(|kind| ValidationError {
        cell: cell.clone(),
        kind,
    })
}

/// Validate every cell and channel of a submission. Any failure rejects the
/// whole matrix; all failures are reported together.
pub fn validate_matrix(
    cells: &[CellKey],
    form: &CommissionForm,
    options: &ValidationOptions,
) -> Result<Vec<(ChannelCell, ChannelPlan)>, ValidationErrors> {
    let mut plans = Vec::with_capacity(cells.len() * Channel::ALL.len());
    let mut errors = Vec::new();

    for key in cells {
        let input = form.cell(key);
        for channel in Channel::ALL {
            let cell = key.with_channel(channel);
            match validate_channel(&cell, input.channel(channel), options) {
                Ok(plan) => plans.push((cell, plan)),
                Err(e) => errors.push(e),
            }
        }
    }

    if errors.is_empty() {
        Ok(plans)
    } else {
        Err(ValidationErrors(errors))
    }
}
