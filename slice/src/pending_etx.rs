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

//! Pending external transactions: the per-tier ETX lists each block
//! committed, cached in a bounded LRU and written through to storage until
//! the dominant chain settles them.

use lru_cache::LruCache;

use crate::error::{Error, ErrorKind};
use crate::store::SliceStore;
use trellis_core::core::{etx_list_hash, Block, Hash, PendingEtxs, Tier, TierEtxs, NUM_TIERS};
use trellis_util::Mutex;

/// Maximum number of pending-ETX records kept in memory.
pub const MAX_PENDING_ETXS: usize = 256;

/// Write-through cache of pending-ETX records by block hash.
pub struct PendingEtxPool {
	cache: Mutex<LruCache<Hash, PendingEtxs>>,
}

impl PendingEtxPool {
	/// An empty pool.
	pub fn new() -> PendingEtxPool {
		PendingEtxPool {
			cache: Mutex::new(LruCache::new(MAX_PENDING_ETXS)),
		}
	}

	/// Record pending ETXs for a block. Idempotent on the block hash: a
	/// record already cached or stored is left untouched.
	pub fn add(&self, store: &SliceStore, pending_etxs: PendingEtxs) -> Result<(), Error> {
		let mut cache = self.cache.lock();
		if cache.contains_key(&pending_etxs.header) {
			return Ok(());
		}
		if store.get_pending_etxs(&pending_etxs.header)?.is_none() {
			let batch = store.batch()?;
			batch.save_pending_etxs(&pending_etxs)?;
			batch.commit()?;
		}
		cache.insert(pending_etxs.header, pending_etxs);
		Ok(())
	}

	/// Populate the in-memory cache for a record that is already durable,
	/// as done at the tail of an append once its batch has committed.
	pub fn cache(&self, pending_etxs: PendingEtxs) {
		let mut cache = self.cache.lock();
		if !cache.contains_key(&pending_etxs.header) {
			cache.insert(pending_etxs.header, pending_etxs);
		}
	}

	/// The record for the given block hash, from the LRU first and storage
	/// second.
	pub fn get(&self, store: &SliceStore, h: &Hash) -> Result<Option<PendingEtxs>, Error> {
		{
			let mut cache = self.cache.lock();
			if let Some(pending_etxs) = cache.get_mut(h) {
				return Ok(Some(pending_etxs.clone()));
			}
		}
		match store.get_pending_etxs(h)? {
			Some(pending_etxs) => {
				self.cache.lock().insert(*h, pending_etxs.clone());
				Ok(Some(pending_etxs))
			}
			None => Ok(None),
		}
	}

	/// Walk the block's sub-manifest aggregating the pending ETXs of every
	/// referenced subordinate block, per tier from the local tier down. The
	/// aggregate for the next tier down has to match the rollup hash the
	/// header advertises.
	pub fn collect_sub_rollups(
		&self,
		store: &SliceStore,
		block: &Block,
		tier: Tier,
	) -> Result<TierEtxs, Error> {
		let mut rollups: TierEtxs = Default::default();
		let sub = match tier.sub() {
			Some(sub) => sub,
			None => return Ok(rollups),
		};
		for h in &block.body.manifest {
			let pending_etxs = self
				.get(store, h)?
				.ok_or_else(|| Error::from(ErrorKind::MissingPendingEtxs(*h)))?;
			for i in tier.index()..NUM_TIERS {
				rollups[i].extend_from_slice(&pending_etxs.etxs[i]);
			}
		}
		let advertised = block.header.etx_rollup_hash[sub.index()];
		if etx_list_hash(&rollups[sub.index()]) != advertised {
			return Err(ErrorKind::RollupHashMismatch.into());
		}
		Ok(rollups)
	}
}
