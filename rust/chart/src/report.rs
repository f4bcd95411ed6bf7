// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Build outcome counters and warnings.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::error::Error;
use crate::rows::RowId;

/// Counts collected while a chart is built, plus every recovered failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildReport {
    pub parts_loaded: usize,
    pub parts_total: usize,
    pub implants_loaded: usize,
    pub implants_total: usize,
    /// Tooth groups per row, in row order
    pub teeth_per_row: [usize; 4],
    /// Snapshot entries placed from world / local descriptors
    pub world_transforms: usize,
    pub local_transforms: usize,
    pub warnings: Vec<String>,
}

impl BuildReport {
    /// Records a recovered failure.
    pub fn warn(&mut self, error: &Error) {
        warn!(error = %error, "recovered during chart build");
        self.warnings.push(error.to_string());
    }

    pub fn part(&mut self, loaded: bool) {
        self.parts_total += 1;
        if loaded {
            self.parts_loaded += 1;
        }
    }

    pub fn implant_part(&mut self, loaded: bool) {
        self.implants_total += 1;
        if loaded {
            self.implants_loaded += 1;
        }
    }

    pub fn parts_failed(&self) -> usize {
        self.parts_total - self.parts_loaded
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn teeth_in(&self, row: RowId) -> usize {
        self.teeth_per_row[row.index()]
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parts {}/{} loaded; implants {}/{} loaded; teeth per row: ",
            self.parts_loaded, self.parts_total, self.implants_loaded, self.implants_total
        )?;
        for (i, row) in RowId::ALL.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}:{}", row, self.teeth_in(*row))?;
        }
        write!(
            f,
            "; TRS (world/local): {}/{}",
            self.world_transforms, self.local_transforms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line() {
        let mut r = BuildReport::default();
        for ok in [true, true, false] {
            r.part(ok);
        }
        r.implant_part(true);
        r.teeth_per_row = [8, 8, 7, 7];
        r.world_transforms = 3;
        r.local_transforms = 4;
        assert_eq!(
            r.to_string(),
            "parts 2/3 loaded; implants 1/1 loaded; teeth per row: row-vest-up:8, row-oclu-up:8, \
             row-oclu-low:7, row-vest-low:7; TRS (world/local): 3/4"
        );
        assert_eq!(r.parts_failed(), 1);
    }

    #[test]
    fn test_warnings_accumulate() {
        let mut r = BuildReport::default();
        assert!(r.is_clean());
        r.warn(&Error::fragment("D11R_Raiz", "not found"));
        assert_eq!(r.warnings, vec!["fragment 'D11R_Raiz' failed to load: not found".to_string()]);
    }
}
