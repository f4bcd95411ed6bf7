// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for chart assembly.
//!
//! Only [`Error::ManifestUnavailable`] aborts a build. Fragment and layout
//! entry failures are recovered where they happen and land in the
//! [`BuildReport`](crate::report::BuildReport) as warnings.

use thiserror::Error;

/// Result type for chart operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("manifest unavailable: {0}")]
    ManifestUnavailable(String),

    #[error("fragment '{fragment}' failed to load: {reason}")]
    FragmentLoadFailed { fragment: String, reason: String },

    #[error("layout entry '{entry}' unresolvable: {reason}")]
    LayoutEntryUnresolvable { entry: String, reason: String },

    #[error("OBJ parse error in '{fragment}' at line {line}: {message}")]
    ObjParse {
        fragment: String,
        line: usize,
        message: String,
    },

    #[error("no chart has been built")]
    NotBuilt,

    #[error("invalid chart config: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Scene(#[from] dentchart_scene::Error),

    #[error(transparent)]
    Geometry(#[from] dentchart_geometry::Error),
}

impl Error {
    pub fn fragment(fragment: impl Into<String>, reason: impl ToString) -> Self {
        Error::FragmentLoadFailed {
            fragment: fragment.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unresolvable(entry: impl Into<String>, reason: impl ToString) -> Self {
        Error::LayoutEntryUnresolvable {
            entry: entry.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures a build recovers from by skipping one part.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::FragmentLoadFailed { .. } | Error::LayoutEntryUnresolvable { .. } | Error::ObjParse { .. }
        )
    }
}
