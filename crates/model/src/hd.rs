//! HD operation kinds and their `"{op}/{index}"` path form.

use {
    serde::{Deserialize, Serialize},
    std::str::FromStr,
    thiserror::Error,
};

/// Highest HD index a wallet may derive, inclusive.
pub const MAX_HD_INDEX: u32 = 10_000;

/// The four secret-creating operation kinds of the derivation tree.
///
/// The string form is part of the derivation hash input and must serialize
/// exactly as the lowercase name, no padding.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HdOperation {
    Shield,
    Remainder,
    Received,
    Consolidate,
}

impl HdOperation {
    /// Renders the derivation path `"{op}/{index}"`.
    pub fn path(&self, index: u32) -> String {
        format!("{self}/{index}")
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("malformed derivation path `{0}`, expected `{{op}}/{{index}}`")]
    Malformed(String),
    #[error("unknown HD operation `{0}`")]
    UnknownOperation(String),
    #[error("HD index {0} outside [0, {MAX_HD_INDEX}]")]
    IndexOutOfRange(u64),
}

/// Parses `"{op}/{index}"` back into its parts, enforcing the index bound.
pub fn parse_path(path: &str) -> Result<(HdOperation, u32), PathError> {
    let (op, index) = path
        .split_once('/')
        .ok_or_else(|| PathError::Malformed(path.to_string()))?;
    let op = HdOperation::from_str(op)
        .map_err(|_| PathError::UnknownOperation(op.to_string()))?;
    // The path string is a hash input elsewhere, so `07` is not the same
    // path as `7` and only the canonical rendering is accepted.
    if index.len() > 1 && index.starts_with('0') {
        return Err(PathError::Malformed(path.to_string()));
    }
    let index: u64 = index
        .parse()
        .map_err(|_| PathError::Malformed(path.to_string()))?;
    if index > u64::from(MAX_HD_INDEX) {
        return Err(PathError::IndexOutOfRange(index));
    }
    Ok((op, index as u32))
}
