// Commission matrix: cell enumeration, form decoding, validation and writes

pub mod form;
pub mod matrix;
pub mod validator;
pub mod writer;

pub use form::{CellInput, ChannelInput, CommissionForm, FormError, TierRowInput};
pub use matrix::{build_matrix, is_valid_partner_code, CellKey, ChannelCell, MatrixError};
pub use validator::{
    validate_channel, validate_matrix, ChannelPlan, ValidTier, ValidationError,
    ValidationErrorKind, ValidationErrors, ValidationOptions,
};
pub use writer::{CommissionWriter, ReconcileReport, WriteOutcome, WriterOptions};
