// Copyright 2022 The Trellis Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The slice coordinator. A slice is the local view one node holds of a
//! single chain in the three-tier hierarchy: it threads incoming headers
//! through the hierarchical append pipeline, keeps the canonical fork under
//! the hierarchical total-difficulty rule, composits the pending headers
//! miners build on, and brokers external transactions between tiers.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]

#[macro_use]
extern crate log;
extern crate failure;
#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate serde_derive;

mod error;
mod pending_etx;
mod phcache;
pub mod pipe;
pub mod store;
pub mod types;

mod slice;

pub use crate::error::{Error, ErrorKind};
pub use crate::pending_etx::{PendingEtxPool, MAX_PENDING_ETXS};
pub use crate::phcache::{PhCache, PH_CACHE_RETENTION};
pub use crate::slice::{Slice, MAX_FUTURE_HEADERS, MAX_FUTURE_TIME};
pub use crate::types::{
	Client, Engine, HeaderChain, MinerWorker, NoopAdapter, SliceAdapter, SliceConfig, SubClients,
};
