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

//! Contracts the slice coordinator consumes from the rest of the system:
//! the local header chain, the consensus engine, the miner worker and the
//! RPC clients reaching the dominant and subordinate slices.

use std::sync::Arc;

use crate::error::{Error, ErrorKind};
use crate::store::SliceBatch;
use trellis_core::core::{
	Block, BlockManifest, Difficulty, Hash, Header, Location, PendingEtxs, PendingHeader, TierEtxs,
	Transaction, NUM_SUBS,
};

/// The local header chain and its persistent storage. The coordinator
/// appends through it and follows its notion of the current header.
pub trait HeaderChain: Send + Sync {
	/// Whether the chain holds the given header at the given block number.
	fn has_header(&self, hash: &Hash, number: u64) -> bool;

	/// Fetch a header by its hash.
	fn get_header(&self, hash: &Hash) -> Option<Header>;

	/// The header currently mined against.
	fn current_header(&self) -> Header;

	/// Advance the current header after a reorg decision.
	fn set_current_header(&self, header: &Header) -> Result<(), Error>;

	/// Whether the chain holds nothing beyond the genesis block.
	fn is_empty(&self) -> bool;

	/// Append a block, staging all writes in the provided batch.
	fn append(&self, batch: &SliceBatch<'_>, block: &Block) -> Result<(), Error>;

	/// All ETXs emitted since the previous dominant-coincident ancestor of
	/// the given block, the block's own included.
	fn collect_etx_rollup(&self, block: &Block) -> Result<Vec<Transaction>, Error>;

	/// Subordinate block hashes accumulated since the previous
	/// dominant-coincident ancestor of the given header.
	fn collect_block_manifest(&self, header: &Header) -> Result<BlockManifest, Error>;
}

/// The consensus engine decisions the coordinator depends on.
pub trait Engine: Send + Sync {
	/// Whether the header qualifies as a block on the dominant tier.
	fn is_dom_coincident(&self, header: &Header) -> bool;
}

/// The miner worker assembling candidate headers.
pub trait MinerWorker: Send + Sync {
	/// Produce the local tier's candidate header extending the given block.
	fn generate_pending_header(&self, block: &Block) -> Result<Header, Error>;
}

/// Bridge between the coordinator and the rest of the system, carrying the
/// chain head, chain side and pending header notifications.
pub trait SliceAdapter: Send + Sync {
	/// The given header became the canonical chain head.
	fn chain_head(&self, header: &Header);

	/// The given header was accepted on a side fork.
	fn chain_side(&self, header: &Header);

	/// A freshly composited pending header is ready for the miner.
	fn pending_header(&self, header: &Header);
}

/// An adapter that ignores everything, for tests and tools.
pub struct NoopAdapter {}

impl SliceAdapter for NoopAdapter {
	fn chain_head(&self, _: &Header) {}
	fn chain_side(&self, _: &Header) {}
	fn pending_header(&self, _: &Header) {}
}

/// A client reaching another slice of the hierarchy, dominant or
/// subordinate. Calls are network round-trips and may block.
pub trait Client: Send + Sync {
	/// Drive an append on the remote slice.
	fn append(
		&self,
		header: Header,
		dom_pending_header: Header,
		dom_terminus: Hash,
		td: Difficulty,
		dom_origin: bool,
		reorg: bool,
	) -> Result<TierEtxs, Error>;

	/// Relay a composited pending header down to the remote slice.
	fn sub_relay_pending_header(&self, pending_header: PendingHeader, reorg: bool, location: Location);

	/// Fetch the remote slice's manifest for the given block.
	fn get_manifest(&self, block_hash: &Hash) -> Result<BlockManifest, Error>;

	/// Hand finalized pending ETXs up to the dominant slice.
	fn send_pending_etxs_to_dom(&self, pending_etxs: PendingEtxs) -> Result<(), Error>;
}

/// The subordinate client slots of a slice. Always three slots; a slot
/// without a deployed child stays empty and calls into it fail with a typed
/// error instead of dereferencing nothing.
pub struct SubClients {
	slots: [Option<Arc<dyn Client>>; NUM_SUBS],
}

impl SubClients {
	/// Three empty slots.
	pub fn none() -> SubClients {
		SubClients {
			slots: [None, None, None],
		}
	}

	/// Install a client in the given slot.
	pub fn set(&mut self, idx: usize, client: Arc<dyn Client>) {
		self.slots[idx] = Some(client);
	}

	/// The client in the given slot, or a typed error for an empty slot.
	pub fn get(&self, idx: usize) -> Result<&Arc<dyn Client>, Error> {
		self.slots
			.get(idx)
			.and_then(|slot| slot.as_ref())
			.ok_or_else(|| ErrorKind::EmptySubSlot(idx).into())
	}

	/// Iterates the occupied slots.
	pub fn iter(&self) -> impl Iterator<Item = (usize, &Arc<dyn Client>)> {
		self.slots
			.iter()
			.enumerate()
			.filter_map(|(i, slot)| slot.as_ref().map(|c| (i, c)))
	}

	/// Number of occupied slots.
	pub fn len(&self) -> usize {
		self.slots.iter().filter(|s| s.is_some()).count()
	}
}

/// Slice coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SliceConfig {
	/// Directory under which the slice database is created.
	pub db_root: String,
	/// URLs of the subordinate slices, by slot. An empty or missing entry
	/// leaves the slot empty.
	pub sub_urls: Vec<String>,
	/// URL of the dominant slice, absent at Prime.
	pub dom_url: Option<String>,
}

impl Default for SliceConfig {
	fn default() -> SliceConfig {
		SliceConfig {
			db_root: String::from(".trellis"),
			sub_urls: vec![],
			dom_url: None,
		}
	}
}
