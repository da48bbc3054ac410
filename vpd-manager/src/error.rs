// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use slog_error_chain::SlogInlineError;
use std::io;
use thiserror::Error;
use vpd_codec::VpdError;

/// Errors surfaced by the VPD service layer.
///
/// Parser and editor failures arrive via [`VpdError`]; this enum adds the
/// failures only the file- and collaborator-owning layer can hit.
#[derive(Debug, Error, SlogInlineError)]
pub enum VpdManagerError {
    #[error(transparent)]
    Vpd(#[from] VpdError),

    #[error("I/O failure on {path}")]
    IoFailure {
        path: String,
        #[source]
        err: io::Error,
    },

    #[error("collaborator unavailable: {0}")]
    ServiceUnavailable(&'static str),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl VpdManagerError {
    pub fn io(path: impl Into<String>, err: io::Error) -> Self {
        Self::IoFailure { path: path.into(), err }
    }
}
