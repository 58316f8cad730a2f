// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mend-storage: job persistence and TTL-bounded key/value caches

mod memory;
mod store;
mod ttl;

pub use memory::{MemoryJobStore, StoreState};
pub use store::{JobStore, StoreError};
pub use ttl::TtlCache;
