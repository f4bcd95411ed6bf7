// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scene node keys.
//!
//! Keys are created by `slotmap::SlotMap` and stay valid after other nodes
//! are removed (generational indices). A removed node's key never aliases a
//! later node.

use slotmap::new_key_type;

new_key_type! {
    /// Key for a scene node (group or mesh).
    pub struct NodeKey;
}
