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

//! Implements the persisted schema the slice coordinator requires: termini
//! and total difficulty per header, pending bodies and ETXs, and the
//! pending-header cache snapshot taken at shutdown.

use byteorder::{BigEndian, WriteBytesExt};

use crate::error::{Error, ErrorKind};
use crate::phcache::PhCache;
use trellis_core::core::{Body, Difficulty, Hash, PendingEtxs, Termini};
use trellis_store as store;

const TERMINI_PREFIX: u8 = b'T';
const TD_PREFIX: u8 = b'D';
const PENDING_ETXS_PREFIX: u8 = b'E';
const PENDING_BODY_PREFIX: u8 = b'B';
const PH_CACHE_KEY: u8 = b'P';
const HEAD_HASH_KEY: u8 = b'H';

fn to_key(prefix: u8, h: &Hash) -> Vec<u8> {
	let mut k = Vec::with_capacity(33);
	k.push(prefix);
	k.extend_from_slice(h.as_bytes());
	k
}

fn to_key_u64(prefix: u8, h: &Hash, n: u64) -> Vec<u8> {
	let mut k = to_key(prefix, h);
	k.write_u64::<BigEndian>(n).expect("write to vec");
	k
}

/// The slice's own key-value storage, holding everything the coordinator
/// persists outside the header chain itself.
pub struct SliceStore {
	db: store::Store,
}

impl SliceStore {
	/// Wraps the underlying store.
	pub fn new(db: store::Store) -> SliceStore {
		SliceStore { db }
	}

	/// Builds a new atomic batch against this store.
	pub fn batch(&self) -> Result<SliceBatch<'_>, Error> {
		Ok(SliceBatch {
			db: self.db.batch()?,
		})
	}

	/// The termini recorded for the given header hash. A record that fails
	/// to decode is reported as malformed rather than absent.
	pub fn get_termini(&self, h: &Hash) -> Result<Option<Termini>, Error> {
		match self.db.get_ser(&to_key(TERMINI_PREFIX, h)) {
			Ok(termini) => Ok(termini),
			Err(store::Error::SerErr(msg)) => {
				debug!("get_termini: malformed record for {}: {}", h, msg);
				Err(ErrorKind::InvalidTermini.into())
			}
			Err(e) => Err(ErrorKind::StoreErr(e, "get termini".to_owned()).into()),
		}
	}

	/// Total difficulty recorded for the given header hash and number.
	pub fn get_td(&self, h: &Hash, number: u64) -> Result<Option<Difficulty>, Error> {
		self.db
			.get_ser(&to_key_u64(TD_PREFIX, h, number))
			.map_err(|e| ErrorKind::StoreErr(e, "get td".to_owned()).into())
	}

	/// Pending ETXs recorded for the given block hash.
	pub fn get_pending_etxs(&self, h: &Hash) -> Result<Option<PendingEtxs>, Error> {
		self.db
			.get_ser(&to_key(PENDING_ETXS_PREFIX, h))
			.map_err(|e| ErrorKind::StoreErr(e, "get pending etxs".to_owned()).into())
	}

	/// Pending block body stored under the given state root.
	pub fn get_pending_body(&self, root: &Hash) -> Result<Option<Body>, Error> {
		self.db
			.get_ser(&to_key(PENDING_BODY_PREFIX, root))
			.map_err(|e| ErrorKind::StoreErr(e, "get pending body".to_owned()).into())
	}

	/// The pending-header cache snapshot persisted on shutdown.
	pub fn get_ph_cache(&self) -> Result<Option<PhCache>, Error> {
		self.db
			.get_ser(&[PH_CACHE_KEY])
			.map_err(|e| ErrorKind::StoreErr(e, "get ph cache".to_owned()).into())
	}

	/// The pending-header hash currently mined against.
	pub fn get_head_hash(&self) -> Result<Option<Hash>, Error> {
		self.db
			.get_ser(&[HEAD_HASH_KEY])
			.map_err(|e| ErrorKind::StoreErr(e, "get head hash".to_owned()).into())
	}
}

/// An atomic write batch over the slice schema. Nothing is visible to
/// readers until `commit`.
pub struct SliceBatch<'a> {
	db: store::Batch<'a>,
}

impl<'a> SliceBatch<'a> {
	/// Stage the termini for a header hash.
	pub fn save_termini(&self, h: &Hash, termini: &Termini) -> Result<(), Error> {
		self.db
			.put_ser(&to_key(TERMINI_PREFIX, h), termini)
			.map_err(|e| ErrorKind::StoreErr(e, "save termini".to_owned()).into())
	}

	/// Stage the total difficulty for a header hash and number.
	pub fn save_td(&self, h: &Hash, number: u64, td: &Difficulty) -> Result<(), Error> {
		self.db
			.put_ser(&to_key_u64(TD_PREFIX, h, number), td)
			.map_err(|e| ErrorKind::StoreErr(e, "save td".to_owned()).into())
	}

	/// Stage a pending-ETX record.
	pub fn save_pending_etxs(&self, pending_etxs: &PendingEtxs) -> Result<(), Error> {
		self.db
			.put_ser(&to_key(PENDING_ETXS_PREFIX, &pending_etxs.header), pending_etxs)
			.map_err(|e| ErrorKind::StoreErr(e, "save pending etxs".to_owned()).into())
	}

	/// Stage a pending block body under its state root.
	pub fn save_pending_body(&self, root: &Hash, body: &Body) -> Result<(), Error> {
		self.db
			.put_ser(&to_key(PENDING_BODY_PREFIX, root), body)
			.map_err(|e| ErrorKind::StoreErr(e, "save pending body".to_owned()).into())
	}

	/// Stage the full pending-header cache.
	pub fn save_ph_cache(&self, cache: &PhCache) -> Result<(), Error> {
		self.db
			.put_ser(&[PH_CACHE_KEY], cache)
			.map_err(|e| ErrorKind::StoreErr(e, "save ph cache".to_owned()).into())
	}

	/// Stage the pending-header hash currently mined against.
	pub fn save_head_hash(&self, h: &Hash) -> Result<(), Error> {
		self.db
			.put_ser(&[HEAD_HASH_KEY], h)
			.map_err(|e| ErrorKind::StoreErr(e, "save head hash".to_owned()).into())
	}

	/// Commit the batch. Until this returns nothing staged is visible.
	pub fn commit(self) -> Result<(), Error> {
		self.db
			.commit()
			.map_err(|e| ErrorKind::StoreErr(e, "batch commit".to_owned()).into())
	}
}
