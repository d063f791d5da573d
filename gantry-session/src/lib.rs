//
// Copyright (c) The Gantry Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod commit;
pub mod debug;
pub mod error;
pub mod session;
#[cfg(feature = "testing")]
pub mod stub;
pub mod transport;
