// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! weft-storage: durable mirror of jobs and finished builds

mod snapshot;
mod state;
mod store;

pub use snapshot::{Snapshot, CURRENT_SNAPSHOT_VERSION};
pub use state::MaterializedState;
pub use store::{FileStore, MemoryStore, Store, StoreError};
