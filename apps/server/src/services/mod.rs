// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Service modules for asset access and chart inputs.

pub mod assets;

pub use assets::{build_viewer, load_inputs, load_manifest, model_path};
