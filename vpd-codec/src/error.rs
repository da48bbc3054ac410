// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Errors raised by the VPD parsers and the in-buffer editor.
///
/// I/O and collaborator failures are not represented here; they belong to
/// the layer that owns files and services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VpdError {
    /// The bytes violate the container format: missing tag, bad length,
    /// truncated blob.
    #[error("malformed VPD data: {0}")]
    MalformedData(&'static str),

    /// ECC validation or regeneration failed.
    #[error("ECC failure: {0}")]
    EccFailure(&'static str),

    /// The named record does not exist in the container.
    #[error("record {0:?} not found")]
    RecordNotFound(String),

    /// The named keyword does not exist in the record.
    #[error("keyword {0:?} not found")]
    KeywordNotFound(String),

    /// The caller asked for something the format forbids, e.g. reading
    /// keywords out of the VHDR or VTOC records.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}
