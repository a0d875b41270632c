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

//! Facade and handler for the slice coordination pipeline: hierarchical
//! append, pending-header compositing and relay, future-header replay and
//! pending-ETX settlement.

use chrono::prelude::Utc;
use lru_cache::LruCache;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, ErrorKind};
use crate::pending_etx::PendingEtxPool;
use crate::phcache::PhCache;
use crate::pipe;
use crate::store::SliceStore;
use crate::types::{
	Client, Engine, HeaderChain, MinerWorker, SliceAdapter, SliceConfig, SubClients,
};
use trellis_core::core::{
	Block, BlockManifest, Difficulty, Hash, Hashed, Header, Location, PendingEtxs, PendingHeader,
	Termini, Tier, TierEtxs, ZERO_HASH,
};
use trellis_store as db;
use trellis_util::{Mutex, OneTime, RwLock, StopState};

/// Maximum number of headers parked while their parents are in flight.
pub const MAX_FUTURE_HEADERS: usize = 256;

/// How far ahead of our clock a parked header's timestamp may run, in
/// seconds.
pub const MAX_FUTURE_TIME: u64 = 30;

/// Period of the future-header replay task, in seconds.
const FUTURE_REPLAY_PERIOD: u64 = 3;

/// Period of the pending-header cache sweep, in seconds.
const PH_CACHE_GC_PERIOD: u64 = 300;

/// Bounded reorder buffer for headers that arrived before their parents.
struct FutureHeaderPool {
	headers: Mutex<LruCache<Hash, Header>>,
}

impl FutureHeaderPool {
	fn new() -> FutureHeaderPool {
		FutureHeaderPool {
			headers: Mutex::new(LruCache::new(MAX_FUTURE_HEADERS)),
		}
	}

	fn add(&self, header: Header) {
		let hash = header.hash();
		let mut headers = self.headers.lock();
		if !headers.contains_key(&hash) {
			headers.insert(hash, header);
		}
	}

	fn remove(&self, hash: &Hash) {
		self.headers.lock().remove(hash);
	}

	fn snapshot(&self) -> Vec<Header> {
		self.headers
			.lock()
			.iter()
			.map(|(_, header)| header.clone())
			.collect()
	}

	fn len(&self) -> usize {
		self.headers.lock().len()
	}
}

/// The local view one node holds of a single chain in the hierarchy, and
/// the coordination state shared with the tiers above and below it.
pub struct Slice {
	tier: Tier,
	location: Location,
	genesis_hash: Hash,

	store: SliceStore,
	header_chain: Arc<dyn HeaderChain>,
	engine: Arc<dyn Engine>,
	worker: Arc<dyn MinerWorker>,
	adapter: Arc<dyn SliceAdapter>,

	// the dominant client dials asynchronously after construction
	dom_client: OneTime<Arc<dyn Client>>,
	sub_clients: SubClients,

	ph_cache: RwLock<PhCache>,
	future_headers: FutureHeaderPool,
	pending_etxs: PendingEtxPool,

	stop_state: Arc<StopState>,
}

impl Slice {
	/// Initializes the coordinator for one tier of the hierarchy. On an
	/// empty chain the genesis termini are installed and the knot of seed
	/// blocks is threaded through; otherwise the pending-header cache is
	/// rehydrated from the previous run. Also spawns the future-header
	/// replay and cache sweep tasks.
	pub fn init(
		config: SliceConfig,
		tier: Tier,
		location: Location,
		header_chain: Arc<dyn HeaderChain>,
		engine: Arc<dyn Engine>,
		worker: Arc<dyn MinerWorker>,
		adapter: Arc<dyn SliceAdapter>,
		sub_clients: SubClients,
		genesis: Block,
		knot: Vec<Block>,
	) -> Result<Arc<Slice>, Error> {
		let env = Arc::new(db::new_env(config.db_root.clone()));
		let store = SliceStore::new(db::Store::open(env, "slice"));

		let slice = Arc::new(Slice {
			tier,
			location,
			genesis_hash: genesis.hash(),
			store,
			header_chain,
			engine,
			worker,
			adapter,
			dom_client: OneTime::new(),
			sub_clients,
			ph_cache: RwLock::new(PhCache::new()),
			future_headers: FutureHeaderPool::new(),
			pending_etxs: PendingEtxPool::new(),
			stop_state: Arc::new(StopState::new()),
		});

		slice.bootstrap(genesis, knot)?;
		Slice::start_tasks(&slice);

		info!(
			"slice init: {} at {}, genesis {}, {} sub client(s), dom client {}",
			slice.tier,
			slice.location,
			slice.genesis_hash,
			slice.sub_clients.len(),
			if config.dom_url.is_some() {
				"pending dial"
			} else {
				"none"
			},
		);
		Ok(slice)
	}

	fn bootstrap(&self, genesis: Block, knot: Vec<Block>) -> Result<(), Error> {
		let g = genesis.hash();

		// the genesis block settles nothing
		if self.store.get_pending_etxs(&g)?.is_none() {
			let batch = self.store.batch()?;
			batch.save_pending_etxs(&PendingEtxs::empty(g))?;
			batch.commit()?;
		}

		if self.header_chain.is_empty() {
			let batch = self.store.batch()?;
			batch.save_termini(&g, &Termini::from_single(g))?;
			batch.save_td(&g, genesis.header.number(self.tier), &Difficulty::zero())?;
			batch.save_head_hash(&g)?;
			batch.commit()?;
			self.ph_cache.write().set_head(g);

			self.iter_knot(knot);
		} else {
			let mut cache = self.ph_cache.write();
			if let Some(stored) = self.store.get_ph_cache()? {
				*cache = stored;
			}
			if let Some(head) = self.store.get_head_hash()? {
				cache.set_head(head);
			}
			debug!(
				"bootstrap: rehydrated {} pending header(s), head {}",
				cache.len(),
				cache.head_hash()
			);
		}
		Ok(())
	}

	/// Thread the knot of seed blocks through the hierarchy. Prime drives
	/// the appends; Region and Zone only persist the bodies matching their
	/// location and wait to be driven.
	fn iter_knot(&self, knot: Vec<Block>) {
		for block in knot {
			let hash = block.hash();
			let matches = match self.tier {
				Tier::Prime => true,
				Tier::Region => block.header.location.region_eq(&self.location),
				Tier::Zone => block.header.location == self.location,
			};
			if !matches {
				continue;
			}
			if let Err(e) = self.save_pending_body(&block) {
				warn!("knot: failed to persist body for {}: {}", hash, e);
				continue;
			}
			if self.tier == Tier::Prime {
				match self.append(
					block.header.clone(),
					Header::default(),
					ZERO_HASH,
					Difficulty::zero(),
					false,
					false,
				) {
					Ok(_) => info!("knot: seeded block {} at {:?}", hash, block.header.number),
					Err(e) => warn!("knot: failed to seed block {}: {}", hash, e),
				}
			}
		}
	}

	fn save_pending_body(&self, block: &Block) -> Result<(), Error> {
		let batch = self.store.batch()?;
		batch.save_pending_body(&block.header.root(self.tier), &block.body)?;
		batch.commit()
	}

	/// Append a header to this slice and drive the tier below. `dom_origin`
	/// marks calls arriving from the dominant tier, which supplies the
	/// authoritative total difficulty and reorg decision; self-originated
	/// appends recompute both. Returns the per-tier ETX lists the block and
	/// its subordinates committed.
	pub fn append(
		&self,
		header: Header,
		dom_pending_header: Header,
		dom_terminus: Hash,
		td: Difficulty,
		dom_origin: bool,
		reorg: bool,
	) -> Result<TierEtxs, Error> {
		let hash = header.hash();
		let number = header.number(self.tier);

		// a block we already hold is a silent success
		if self.header_chain.has_header(&hash, number) {
			self.future_headers.remove(&hash);
			debug!("append: known block {} at {}", hash, number);
			return Ok(Default::default());
		}

		let block = pipe::reconstruct_block(&self.store, &header, self.tier)?;

		let batch = self.store.batch()?;

		let (parent_sub_terminus, new_termini) = match pipe::pcrc(
			&batch,
			&self.store,
			self.engine.as_ref(),
			&header,
			dom_terminus,
			self.tier,
			self.genesis_hash,
		) {
			Ok(res) => res,
			Err(e) => {
				// a header running ahead of its parent gets parked for replay
				if !dom_origin {
					if let ErrorKind::SubNotSynced = e.kind() {
						if let Err(e) = self.add_future_header(header.clone()) {
							debug!("append: not parking {}: {}", hash, e);
						}
					}
				}
				return Err(e);
			}
		};

		self.header_chain.append(&batch, &block)?;

		let mut td = td;
		let mut reorg = reorg;
		if !dom_origin {
			td = match pipe::calc_td(&self.store, &header, self.tier) {
				Ok(td) => td,
				Err(e) => {
					if let ErrorKind::FutureBlock = e.kind() {
						if let Err(e) = self.add_future_header(header.clone()) {
							debug!("append: not parking {}: {}", hash, e);
						}
					}
					return Err(e);
				}
			};
			let head = self.header_chain.current_header();
			let head_td = self
				.store
				.get_td(&head.hash(), head.number(self.tier))?
				.unwrap_or_else(Difficulty::zero);
			reorg = pipe::hlcr(&td, &head_td);
		}

		let is_dom_coincident = self.engine.is_dom_coincident(&header);

		// everything below runs atomically with respect to the other cache
		// mutators; the subordinate round-trip deliberately serializes here
		let mut cache = self.ph_cache.write();

		let local_header = self.worker.generate_pending_header(&block)?;
		let local_ph = PendingHeader::new(local_header, new_termini);

		let ph = cache.compute(local_ph, &dom_pending_header, dom_origin, self.tier);

		let mut etxs = if self.tier != Tier::Zone {
			let sub_idx = header.location.sub_index(self.tier);
			let sub_client = self.sub_clients.get(sub_idx)?;
			sub_client.append(
				header.clone(),
				ph.header.clone(),
				parent_sub_terminus,
				td.clone(),
				true,
				reorg,
			)?
		} else {
			Default::default()
		};

		// the local slot carries the full rollup at a coincidence, the
		// block's own emissions otherwise
		etxs[self.tier.index()] = if is_dom_coincident {
			self.header_chain.collect_etx_rollup(&block)?
		} else {
			block.body.etxs.clone()
		};
		let pending_etxs = PendingEtxs::new(hash, etxs.clone());
		batch.save_pending_etxs(&pending_etxs)?;

		batch.save_td(&hash, number, &td)?;
		batch.commit()?;

		if reorg {
			self.header_chain.set_current_header(&header)?;
			self.adapter.chain_head(&header);
		} else {
			self.adapter.chain_side(&header);
		}

		let terminus = ph.termini.terminus();
		self.pick_ph_cache_head(&mut cache, terminus, &ph, reorg);
		cache.insert(terminus, ph.clone());
		self.pending_etxs.cache(pending_etxs.clone());

		self.relay_ph(&mut cache, &ph, true, reorg, dom_origin, header.location);
		drop(cache);

		self.future_headers.remove(&hash);

		if is_dom_coincident && !dom_origin && self.tier != Tier::Prime {
			self.send_pending_etxs_to_dom(pending_etxs);
		}
		if dom_origin {
			self.proc_future_headers();
		}

		debug!(
			"append: {} {} at {}, td {}, reorg {}, dom origin {}",
			self.tier, hash, number, td, reorg, dom_origin
		);
		Ok(etxs)
	}

	/// The sole route to moving the mined-against entry during an append:
	/// a reorg follows the new terminus; without one a taller candidate on
	/// the same terminus only wins if its parent carries strictly more
	/// work than the current head's.
	fn pick_ph_cache_head(
		&self,
		cache: &mut PhCache,
		terminus: Hash,
		new_entry: &PendingHeader,
		reorg: bool,
	) {
		if reorg {
			cache.set_head(terminus);
			return;
		}
		let tier = self.tier;
		let existing_number = match cache.entry(&terminus) {
			Some(existing) => existing.header.number(tier),
			None => return,
		};
		if new_entry.header.number(tier) <= existing_number {
			return;
		}
		let (head_parent, head_number) = match cache.head_entry() {
			Some(head) => (head.header.parent_hash(tier), head.header.number(tier)),
			None => {
				cache.set_head(terminus);
				return;
			}
		};
		let new_parent_td = self.store.get_td(
			&new_entry.header.parent_hash(tier),
			new_entry.header.number(tier).saturating_sub(1),
		);
		let head_parent_td = self
			.store
			.get_td(&head_parent, head_number.saturating_sub(1));
		if let (Ok(Some(new_td)), Ok(Some(head_td))) = (new_parent_td, head_parent_td) {
			if new_td > head_td {
				cache.set_head(terminus);
			}
		}
	}

	/// Hand the freshly composited entry onwards: at Zone to the miner, at
	/// the upper tiers to the subordinate slices. Dom-driven appends skip
	/// the fan-out, the dominant tier relays to the siblings itself.
	fn relay_ph(
		&self,
		cache: &mut PhCache,
		entry: &PendingHeader,
		update_miner: bool,
		reorg: bool,
		dom_origin: bool,
		location: Location,
	) {
		match self.tier {
			Tier::Zone => {
				if update_miner {
					let local = self.location;
					if let Some(head) = cache.head_entry_mut() {
						head.header.location = local;
						let header = head.header.clone();
						self.adapter.pending_header(&header);
					}
				}
			}
			_ => {
				if !dom_origin {
					for (_, sub_client) in self.sub_clients.iter() {
						sub_client.sub_relay_pending_header(entry.clone(), reorg, location);
					}
				}
			}
		}
	}

	/// A pending header relayed down from the dominant tier. The sibling
	/// that was driven synchronously by the append itself skips the fold;
	/// everyone else composites the dominant fields in, then passes the
	/// result down (Region) or to the miner (Zone).
	pub fn sub_relay_pending_header(&self, ph: PendingHeader, reorg: bool, location: Location) {
		match self.tier {
			Tier::Prime => (),
			Tier::Region => {
				let mut cache = self.ph_cache.write();
				let idx = self.location.region as usize;
				if location.region != self.location.region {
					if let Err(e) =
						cache.update_from_dom(&ph, idx, &[Tier::Prime], reorg, self.location)
					{
						warn!("sub relay: {}", e);
						return;
					}
				}
				let key = ph.termini.sub_terminus(idx);
				let entry = match cache.entry(&key) {
					Some(entry) => entry.clone(),
					None => {
						warn!("sub relay: no cached entry for {}", key);
						return;
					}
				};
				for (_, sub_client) in self.sub_clients.iter() {
					sub_client.sub_relay_pending_header(entry.clone(), reorg, location);
				}
			}
			Tier::Zone => {
				if location == self.location {
					return;
				}
				let mut cache = self.ph_cache.write();
				let idx = self.location.zone as usize;
				if let Err(e) = cache.update_from_dom(
					&ph,
					idx,
					&[Tier::Prime, Tier::Region],
					reorg,
					self.location,
				) {
					warn!("sub relay: {}", e);
					return;
				}
				if let Some(head) = cache.head_entry_mut() {
					head.header.location = self.location;
					let header = head.header.clone();
					self.adapter.pending_header(&header);
				}
			}
		}
	}

	/// The header the miner should currently be working on.
	pub fn get_pending_header(&self) -> Result<Header, Error> {
		let cache = self.ph_cache.read();
		cache
			.head_entry()
			.map(|entry| entry.header.clone())
			.ok_or_else(|| ErrorKind::EmptyPendingHeader.into())
	}

	/// Park a header whose parent has not arrived yet. Headers running more
	/// than `MAX_FUTURE_TIME` ahead of our clock are refused.
	pub fn add_future_header(&self, header: Header) -> Result<(), Error> {
		let max = Utc::now().timestamp() as u64 + MAX_FUTURE_TIME;
		if header.time > max {
			return Err(ErrorKind::Unfit(format!(
				"future header timestamp {} ahead of limit {}",
				header.time, max
			))
			.into());
		}
		self.future_headers.add(header);
		Ok(())
	}

	/// Replay parked headers in ascending block number. Headers whose
	/// parents are still missing stay parked; anything else that fails is
	/// dropped.
	pub fn proc_future_headers(&self) {
		let mut headers = self.future_headers.snapshot();
		if headers.is_empty() {
			return;
		}
		headers.sort_by_key(|header| header.number(self.tier));
		debug!("proc future headers: replaying {}", headers.len());
		for header in headers {
			let hash = header.hash();
			if let Err(e) = self.append(
				header,
				Header::default(),
				ZERO_HASH,
				Difficulty::zero(),
				false,
				false,
			) {
				match e.kind() {
					ErrorKind::SubNotSynced | ErrorKind::FutureBlock => (),
					_ => {
						debug!("proc future headers: dropping {}: {}", hash, e);
						self.future_headers.remove(&hash);
					}
				}
			}
		}
	}

	/// Number of headers currently parked for replay.
	pub fn future_header_count(&self) -> usize {
		self.future_headers.len()
	}

	/// Record pending ETXs received for a block. Idempotent on the block
	/// hash.
	pub fn add_pending_etxs(&self, pending_etxs: PendingEtxs) -> Result<(), Error> {
		self.pending_etxs.add(&self.store, pending_etxs)
	}

	/// Aggregate the pending ETXs of every subordinate block in the given
	/// block's manifest, checked against the rollup hash the header
	/// advertises.
	pub fn collect_sub_rollups(&self, block: &Block) -> Result<TierEtxs, Error> {
		self.pending_etxs
			.collect_sub_rollups(&self.store, block, self.tier)
	}

	/// The manifest of subordinate hashes accumulated under the given
	/// block, served to the dominant tier.
	pub fn get_manifest(&self, block_hash: &Hash) -> Result<BlockManifest, Error> {
		let header = self
			.header_chain
			.get_header(block_hash)
			.ok_or_else(|| ErrorKind::Other(format!("no header {}", block_hash)))?;
		self.header_chain.collect_block_manifest(&header)
	}

	/// Install the dominant client once its asynchronous dial completes.
	pub fn set_dom_client(&self, client: Arc<dyn Client>) {
		self.dom_client.init(client);
	}

	/// The dominant client, or a retriable error while its dial is still in
	/// flight.
	fn dom_client(&self) -> Result<Arc<dyn Client>, Error> {
		if self.dom_client.is_init() {
			Ok(self.dom_client.borrow())
		} else {
			Err(ErrorKind::DomClientUnavailable.into())
		}
	}

	fn send_pending_etxs_to_dom(&self, pending_etxs: PendingEtxs) {
		// the record is already durable locally, forwarding is best effort
		let hash = pending_etxs.header;
		match self
			.dom_client()
			.and_then(|client| client.send_pending_etxs_to_dom(pending_etxs))
		{
			Ok(()) => debug!("forwarded pending etxs for {} to dom", hash),
			Err(e) => warn!("could not forward pending etxs for {}: {}", hash, e),
		}
	}

	/// Sweep pending-header cache entries that fell behind the retention
	/// window.
	pub fn gc_pending_headers(&self) {
		let head_number = self.header_chain.current_header().number(self.tier);
		let mut cache = self.ph_cache.write();
		let removed = cache.gc(head_number, self.tier);
		if removed > 0 {
			debug!("phcache gc: removed {} stale entries", removed);
		}
	}

	/// Persist the pending-header state and wind the periodic tasks down.
	pub fn stop(&self) {
		if let Err(e) = self.persist_ph_cache() {
			error!("failed to persist pending header state: {}", e);
		}
		self.stop_state.stop();
	}

	fn persist_ph_cache(&self) -> Result<(), Error> {
		let cache = self.ph_cache.read();
		let batch = self.store.batch()?;
		batch.save_ph_cache(&cache)?;
		batch.save_head_hash(&cache.head_hash())?;
		batch.commit()
	}

	// The tasks only hold weak references so a dropped slice releases its
	// storage without waiting out a sleep period.
	fn start_tasks(slice: &Arc<Slice>) {
		let futures = Arc::downgrade(slice);
		let _ = thread::Builder::new()
			.name("future-headers".to_string())
			.spawn(move || loop {
				thread::sleep(Duration::from_secs(FUTURE_REPLAY_PERIOD));
				match futures.upgrade() {
					Some(slice) => {
						if slice.stop_state.is_stopped() {
							break;
						}
						slice.proc_future_headers();
					}
					None => break,
				}
			});

		let sweeper = Arc::downgrade(slice);
		let _ = thread::Builder::new()
			.name("phcache-gc".to_string())
			.spawn(move || loop {
				thread::sleep(Duration::from_secs(PH_CACHE_GC_PERIOD));
				match sweeper.upgrade() {
					Some(slice) => {
						if slice.stop_state.is_stopped() {
							break;
						}
						slice.gc_pending_headers();
					}
					None => break,
				}
			});
	}

	/// The tier this slice coordinates.
	pub fn tier(&self) -> Tier {
		self.tier
	}

	/// The location of this node in the hierarchy.
	pub fn location(&self) -> Location {
		self.location
	}

	/// The slice's persistent bookkeeping.
	pub fn store(&self) -> &SliceStore {
		&self.store
	}

	/// The pending-header cache and its lock.
	pub fn ph_cache(&self) -> &RwLock<PhCache> {
		&self.ph_cache
	}
}
