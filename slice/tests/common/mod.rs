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

//! In-memory collaborators and block builders shared by the slice tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use trellis_core::core::{
	Block, BlockManifest, Difficulty, Hash, Hashed, Header, Location, PendingEtxs, PendingHeader,
	Tier, TierEtxs, Transaction, NUM_TIERS,
};
use trellis_slice::{
	Client, Engine, Error, HeaderChain, MinerWorker, Slice, SliceAdapter, SliceConfig, SubClients,
};
use trellis_slice::store::SliceBatch;
use trellis_util::{init_test_logger, Mutex, RwLock};

/// Header chain kept fully in memory. Storage durability is the slice's
/// concern, not this fake's.
pub struct MemHeaderChain {
	headers: RwLock<HashMap<Hash, Header>>,
	current: RwLock<Header>,
	rollups: RwLock<HashMap<Hash, Vec<Transaction>>>,
	manifests: RwLock<HashMap<Hash, BlockManifest>>,
}

impl MemHeaderChain {
	pub fn new(genesis: Header) -> Arc<MemHeaderChain> {
		let mut headers = HashMap::new();
		headers.insert(genesis.hash(), genesis.clone());
		Arc::new(MemHeaderChain {
			headers: RwLock::new(headers),
			current: RwLock::new(genesis),
			rollups: RwLock::new(HashMap::new()),
			manifests: RwLock::new(HashMap::new()),
		})
	}

	pub fn set_rollup(&self, hash: Hash, etxs: Vec<Transaction>) {
		self.rollups.write().insert(hash, etxs);
	}

	pub fn set_manifest(&self, hash: Hash, manifest: BlockManifest) {
		self.manifests.write().insert(hash, manifest);
	}

	pub fn len(&self) -> usize {
		self.headers.read().len()
	}
}

impl HeaderChain for MemHeaderChain {
	fn has_header(&self, hash: &Hash, _number: u64) -> bool {
		self.headers.read().contains_key(hash)
	}

	fn get_header(&self, hash: &Hash) -> Option<Header> {
		self.headers.read().get(hash).cloned()
	}

	fn current_header(&self) -> Header {
		self.current.read().clone()
	}

	fn set_current_header(&self, header: &Header) -> Result<(), Error> {
		*self.current.write() = header.clone();
		Ok(())
	}

	fn is_empty(&self) -> bool {
		self.headers.read().len() <= 1
	}

	fn append(&self, _batch: &SliceBatch<'_>, block: &Block) -> Result<(), Error> {
		self.headers
			.write()
			.insert(block.hash(), block.header.clone());
		Ok(())
	}

	fn collect_etx_rollup(&self, block: &Block) -> Result<Vec<Transaction>, Error> {
		Ok(self
			.rollups
			.read()
			.get(&block.hash())
			.cloned()
			.unwrap_or_else(|| block.body.etxs.clone()))
	}

	fn collect_block_manifest(&self, header: &Header) -> Result<BlockManifest, Error> {
		Ok(self
			.manifests
			.read()
			.get(&header.hash())
			.cloned()
			.unwrap_or_default())
	}
}

/// A header is dominant-coincident when it carries work at the dominant
/// tier.
pub struct ThresholdEngine {
	pub tier: Tier,
}

impl Engine for ThresholdEngine {
	fn is_dom_coincident(&self, header: &Header) -> bool {
		match self.tier.dom() {
			Some(dom) => !header.difficulty(dom).is_zero(),
			None => false,
		}
	}
}

/// Builds the next candidate header straight off the appended block.
pub struct TestWorker {
	pub tier: Tier,
}

impl MinerWorker for TestWorker {
	fn generate_pending_header(&self, block: &Block) -> Result<Header, Error> {
		let i = self.tier.index();
		let mut header = Header::default();
		header.parent_hash[i] = block.hash();
		header.number[i] = block.header.number[i] + 1;
		header.difficulty[i] = block.header.difficulty[i].clone();
		header.location = block.header.location;
		Ok(header)
	}
}

/// Adapter recording every notification it sees.
pub struct RecordingAdapter {
	heads: Mutex<Vec<Hash>>,
	sides: Mutex<Vec<Hash>>,
	pending: Mutex<Vec<Header>>,
}

impl RecordingAdapter {
	pub fn new() -> Arc<RecordingAdapter> {
		Arc::new(RecordingAdapter {
			heads: Mutex::new(vec![]),
			sides: Mutex::new(vec![]),
			pending: Mutex::new(vec![]),
		})
	}

	pub fn heads(&self) -> Vec<Hash> {
		self.heads.lock().clone()
	}

	pub fn sides(&self) -> Vec<Hash> {
		self.sides.lock().clone()
	}

	pub fn pending(&self) -> Vec<Header> {
		self.pending.lock().clone()
	}
}

impl SliceAdapter for RecordingAdapter {
	fn chain_head(&self, header: &Header) {
		self.heads.lock().push(header.hash());
	}

	fn chain_side(&self, header: &Header) {
		self.sides.lock().push(header.hash());
	}

	fn pending_header(&self, header: &Header) {
		self.pending.lock().push(header.clone());
	}
}

/// In-process client wiring one slice under another, standing in for the
/// RPC transport.
pub struct SliceClient {
	pub slice: Arc<Slice>,
}

impl Client for SliceClient {
	fn append(
		&self,
		header: Header,
		dom_pending_header: Header,
		dom_terminus: Hash,
		td: Difficulty,
		dom_origin: bool,
		reorg: bool,
	) -> Result<TierEtxs, Error> {
		self.slice
			.append(header, dom_pending_header, dom_terminus, td, dom_origin, reorg)
	}

	fn sub_relay_pending_header(&self, ph: PendingHeader, reorg: bool, location: Location) {
		self.slice.sub_relay_pending_header(ph, reorg, location)
	}

	fn get_manifest(&self, block_hash: &Hash) -> Result<BlockManifest, Error> {
		self.slice.get_manifest(block_hash)
	}

	fn send_pending_etxs_to_dom(&self, pending_etxs: PendingEtxs) -> Result<(), Error> {
		self.slice.add_pending_etxs(pending_etxs)
	}
}

/// Client that records what it is asked to do and succeeds with nothing.
pub struct RecordingClient {
	appends: Mutex<Vec<Hash>>,
	relays: Mutex<Vec<(PendingHeader, bool, Location)>>,
}

impl RecordingClient {
	pub fn new() -> Arc<RecordingClient> {
		Arc::new(RecordingClient {
			appends: Mutex::new(vec![]),
			relays: Mutex::new(vec![]),
		})
	}

	pub fn appends(&self) -> Vec<Hash> {
		self.appends.lock().clone()
	}

	pub fn relays(&self) -> Vec<(PendingHeader, bool, Location)> {
		self.relays.lock().clone()
	}
}

impl Client for RecordingClient {
	fn append(
		&self,
		header: Header,
		_dom_pending_header: Header,
		_dom_terminus: Hash,
		_td: Difficulty,
		_dom_origin: bool,
		_reorg: bool,
	) -> Result<TierEtxs, Error> {
		self.appends.lock().push(header.hash());
		Ok(Default::default())
	}

	fn sub_relay_pending_header(&self, ph: PendingHeader, reorg: bool, location: Location) {
		self.relays.lock().push((ph, reorg, location));
	}

	fn get_manifest(&self, _block_hash: &Hash) -> Result<BlockManifest, Error> {
		Ok(vec![])
	}

	fn send_pending_etxs_to_dom(&self, _pending_etxs: PendingEtxs) -> Result<(), Error> {
		Ok(())
	}
}

/// Everything a test needs to drive one slice.
pub struct TestSlice {
	pub slice: Arc<Slice>,
	pub chain: Arc<MemHeaderChain>,
	pub adapter: Arc<RecordingAdapter>,
}

pub fn build_slice(
	tier: Tier,
	location: Location,
	db_root: String,
	chain: Arc<MemHeaderChain>,
	sub_clients: SubClients,
	genesis: &Block,
	knot: Vec<Block>,
) -> TestSlice {
	init_test_logger();
	let adapter = RecordingAdapter::new();
	let config = SliceConfig {
		db_root,
		..Default::default()
	};
	let slice = Slice::init(
		config,
		tier,
		location,
		chain.clone(),
		Arc::new(ThresholdEngine { tier }),
		Arc::new(TestWorker { tier }),
		adapter.clone(),
		sub_clients,
		genesis.clone(),
		knot,
	)
	.unwrap();
	TestSlice {
		slice,
		chain,
		adapter,
	}
}

pub fn genesis_block() -> Block {
	let mut header = Header::default();
	header.time = 1_600_000_000;
	Block::with_empty_body(header)
}

/// A header extending `prev` at a single tier, everything else untouched.
pub fn next_header(prev: &Header, tier: Tier, diff: u64, nonce: u64) -> Header {
	let i = tier.index();
	let mut header = Header::default();
	header.parent_hash[i] = prev.hash();
	header.number[i] = prev.number[i] + 1;
	header.difficulty[i] = Difficulty::from_num(diff);
	header.location = prev.location;
	header.nonce = nonce;
	header
}

/// A header extending `prev` at every tier at once, carrying work at every
/// tier, the shape of a fully coincident block.
pub fn next_coincident(prev: &Header, loc: Location, diff: u64, nonce: u64) -> Header {
	let mut header = Header::default();
	for i in 0..NUM_TIERS {
		header.parent_hash[i] = prev.hash();
		header.number[i] = prev.number[i] + 1;
		header.difficulty[i] = Difficulty::from_num(diff);
	}
	header.location = loc;
	header.nonce = nonce;
	header
}

pub fn etx(nonce: u64, destination: Location) -> Transaction {
	Transaction {
		nonce,
		destination,
		to: Default::default(),
		value: 10,
		data: vec![],
	}
}
