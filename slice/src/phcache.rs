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

//! The pending-header cache. Keyed by terminus: every entry represents the
//! candidate header being composited on top of one dominant-coincident
//! ancestor, with contributions from each tier folded in as they arrive.

use std::collections::HashMap;

use crate::error::{Error, ErrorKind};
use trellis_core::core::{Hash, Header, Location, PendingHeader, Tier, ZERO_HASH};
use trellis_core::ser::{self, Readable, Reader, Writeable, Writer};

/// Entries this many blocks behind the chain head are dropped by the
/// periodic sweep.
pub const PH_CACHE_RETENTION: u64 = 500;

/// Map from terminus hash to composited pending header, plus the hash of
/// the entry currently handed to the miner.
pub struct PhCache {
	entries: HashMap<Hash, PendingHeader>,
	head: Hash,
}

impl PhCache {
	/// An empty cache with no head.
	pub fn new() -> PhCache {
		PhCache {
			entries: HashMap::new(),
			head: ZERO_HASH,
		}
	}

	/// Number of cached entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// The entry cached under the given terminus.
	pub fn entry(&self, h: &Hash) -> Option<&PendingHeader> {
		self.entries.get(h)
	}

	/// Insert (or replace) the entry for the given terminus.
	pub fn insert(&mut self, terminus: Hash, entry: PendingHeader) {
		self.entries.insert(terminus, entry);
	}

	/// The terminus of the entry currently mined against.
	pub fn head_hash(&self) -> Hash {
		self.head
	}

	/// Point the miner at the entry cached under the given terminus.
	pub fn set_head(&mut self, h: Hash) {
		self.head = h;
	}

	/// The entry currently mined against, if it exists.
	pub fn head_entry(&self) -> Option<&PendingHeader> {
		self.entries.get(&self.head)
	}

	/// Mutable access to the entry currently mined against.
	pub fn head_entry_mut(&mut self) -> Option<&mut PendingHeader> {
		self.entries.get_mut(&self.head)
	}

	/// Composite a locally generated pending header with what this slice
	/// already knows about its terminus. Falls back to the dominant tier's
	/// pending header on dom-driven appends, and to the local header alone
	/// otherwise.
	pub fn compute(
		&self,
		local: PendingHeader,
		dom: &Header,
		dom_origin: bool,
		tier: Tier,
	) -> PendingHeader {
		let terminus = local.termini.terminus();
		if let Some(cached) = self.entries.get(&terminus) {
			return PendingHeader::new(local.header.combine(&cached.header, tier), local.termini);
		}
		if dom_origin {
			return PendingHeader::new(local.header.combine(dom, tier), local.termini);
		}
		local
	}

	/// Fold dominant-tier fields relayed from above into the cached entry at
	/// `ph.termini[terminus_idx]`, one `combine` per tier in `tiers`. The
	/// entry takes the local node's location, and on a reorg the head moves
	/// to it.
	pub fn update_from_dom(
		&mut self,
		ph: &PendingHeader,
		terminus_idx: usize,
		tiers: &[Tier],
		reorg: bool,
		location: Location,
	) -> Result<Hash, Error> {
		let key = ph.termini.sub_terminus(terminus_idx);
		let cached = match self.entries.get_mut(&key) {
			Some(cached) => cached,
			None => return Err(ErrorKind::MissingCacheEntry(key).into()),
		};
		for tier in tiers {
			cached.header = ph.header.combine(&cached.header, *tier);
		}
		cached.header.location = location;
		if reorg {
			self.head = key;
		}
		Ok(key)
	}

	/// Drop every entry that fell more than the retention window behind the
	/// given chain head number. Returns how many entries went.
	pub fn gc(&mut self, head_number: u64, tier: Tier) -> usize {
		let before = self.entries.len();
		self.entries
			.retain(|_, entry| entry.header.number(tier) + PH_CACHE_RETENTION >= head_number);
		before - self.entries.len()
	}
}

impl Writeable for PhCache {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u64(self.entries.len() as u64)?;
		for (terminus, entry) in self.entries.iter() {
			terminus.write(writer)?;
			entry.write(writer)?;
		}
		Ok(())
	}
}

impl Readable for PhCache {
	fn read(reader: &mut dyn Reader) -> Result<PhCache, ser::Error> {
		let count = reader.read_u64()?;
		let mut entries = HashMap::with_capacity(count as usize);
		for _ in 0..count {
			let terminus = Hash::read(reader)?;
			let entry = PendingHeader::read(reader)?;
			entries.insert(terminus, entry);
		}
		Ok(PhCache {
			entries,
			head: ZERO_HASH,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use trellis_core::core::Termini;

	fn header_at(tier: Tier, number: u64, tag: u8) -> Header {
		let mut header = Header::default();
		header.number[tier.index()] = number;
		header.parent_hash[tier.index()] = Hash::from_vec(&[tag]);
		header
	}

	fn entry_at(tier: Tier, number: u64, terminus: Hash) -> PendingHeader {
		PendingHeader::new(header_at(tier, number, 1), Termini::from_single(terminus))
	}

	#[test]
	fn compute_prefers_cached_entry() {
		let terminus = Hash::from_vec(&[42]);
		let mut cache = PhCache::new();
		let cached = entry_at(Tier::Prime, 5, terminus);
		cache.insert(terminus, cached.clone());

		let local = entry_at(Tier::Zone, 9, terminus);
		let dom = header_at(Tier::Prime, 77, 3);

		let ph = cache.compute(local.clone(), &dom, true, Tier::Zone);
		// zone fields from the local header, prime fields from the cache
		assert_eq!(ph.header.number(Tier::Zone), 9);
		assert_eq!(ph.header.number(Tier::Prime), 5);
	}

	#[test]
	fn compute_falls_back_to_dom_then_local() {
		let terminus = Hash::from_vec(&[42]);
		let cache = PhCache::new();
		let local = entry_at(Tier::Zone, 9, terminus);
		let dom = header_at(Tier::Prime, 77, 3);

		// nothing cached, dom origin: dom header is the compositing target
		let ph = cache.compute(local.clone(), &dom, true, Tier::Zone);
		assert_eq!(ph.header.number(Tier::Zone), 9);
		assert_eq!(ph.header.number(Tier::Prime), 77);

		// nothing cached, self origin: local header passes through untouched
		let ph = cache.compute(local.clone(), &dom, false, Tier::Zone);
		assert_eq!(ph.header, local.header);
	}

	#[test]
	fn update_from_dom_composites_and_moves_head() {
		let key = Hash::from_vec(&[8]);
		let mut cache = PhCache::new();
		cache.insert(key, entry_at(Tier::Zone, 3, key));

		let mut dom_termini = Termini::from_single(ZERO_HASH);
		dom_termini.set_sub_terminus(1, key);
		let dom_ph = PendingHeader::new(header_at(Tier::Prime, 50, 9), dom_termini);

		let loc = Location::new(1, 2);
		let updated = cache
			.update_from_dom(&dom_ph, 1, &[Tier::Prime], true, loc)
			.unwrap();
		assert_eq!(updated, key);
		assert_eq!(cache.head_hash(), key);

		let entry = cache.entry(&key).unwrap();
		assert_eq!(entry.header.number(Tier::Prime), 50);
		assert_eq!(entry.header.number(Tier::Zone), 3);
		assert_eq!(entry.header.location, loc);
	}

	#[test]
	fn update_from_dom_requires_cached_entry() {
		let mut cache = PhCache::new();
		let dom_ph = PendingHeader::new(Header::default(), Termini::from_single(ZERO_HASH));
		let res = cache.update_from_dom(&dom_ph, 0, &[Tier::Prime], false, Location::default());
		match res {
			Err(e) => match e.kind() {
				ErrorKind::MissingCacheEntry(_) => (),
				k => panic!("unexpected kind {:?}", k),
			},
			Ok(_) => panic!("expected missing cache entry"),
		}
	}

	#[test]
	fn gc_drops_stale_entries() {
		let mut cache = PhCache::new();
		for n in 0..10 {
			let terminus = Hash::from_vec(&[n as u8]);
			cache.insert(terminus, entry_at(Tier::Zone, n, terminus));
		}
		// head at 505: entries 0..4 have fallen out of the window
		let removed = cache.gc(PH_CACHE_RETENTION + 5, Tier::Zone);
		assert_eq!(removed, 5);
		assert_eq!(cache.len(), 5);
		for n in 5..10 {
			assert!(cache.entry(&Hash::from_vec(&[n as u8])).is_some());
		}
	}
}
