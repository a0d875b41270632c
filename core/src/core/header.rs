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

//! Block headers carrying one set of execution fields per tier. A single
//! header can simultaneously be a block at several tiers, so every tiered
//! field is an array indexed by `Tier::index()`.

use std::fmt;

use crate::core::difficulty::Difficulty;
use crate::core::hash::{DefaultHashable, Hash, Hashed, ZERO_HASH};
use crate::core::tier::{Location, Tier, NUM_TIERS};
use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// An account address.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl AsRef<[u8]> for Address {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

impl Writeable for Address {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_fixed_bytes(self)
	}
}

impl Readable for Address {
	fn read(reader: &mut dyn Reader) -> Result<Address, ser::Error> {
		let v = reader.read_fixed_bytes(20)?;
		let mut a = [0; 20];
		a.copy_from_slice(&v[..]);
		Ok(Address(a))
	}
}

/// A 2048-bit log bloom.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Bloom(pub [u8; 256]);

impl Default for Bloom {
	fn default() -> Bloom {
		Bloom([0; 256])
	}
}

impl fmt::Debug for Bloom {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Bloom(..)")
	}
}

impl AsRef<[u8]> for Bloom {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

impl Writeable for Bloom {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_fixed_bytes(self)
	}
}

impl Readable for Bloom {
	fn read(reader: &mut dyn Reader) -> Result<Bloom, ser::Error> {
		let v = reader.read_fixed_bytes(256)?;
		let mut b = [0; 256];
		b.copy_from_slice(&v[..]);
		Ok(Bloom(b))
	}
}

/// Block header. Tiered fields hold one value per tier; a dominant-coincident
/// block presents the same header to every tier it belongs to, and each tier
/// reads the fields at its own index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
	/// Hash of the parent block at each tier.
	pub parent_hash: [Hash; NUM_TIERS],
	/// Uncle set root at each tier.
	pub uncle_hash: [Hash; NUM_TIERS],
	/// Block reward beneficiary at each tier.
	pub coinbase: [Address; NUM_TIERS],
	/// State root at each tier. Also keys the pending body store.
	pub root: [Hash; NUM_TIERS],
	/// Transaction set root at each tier.
	pub tx_hash: [Hash; NUM_TIERS],
	/// Root of the external transactions emitted at each tier.
	pub etx_hash: [Hash; NUM_TIERS],
	/// Root of the accumulated external transaction rollup at each tier.
	pub etx_rollup_hash: [Hash; NUM_TIERS],
	/// Root of the subordinate block manifest at each tier.
	pub manifest_hash: [Hash; NUM_TIERS],
	/// Receipt set root at each tier.
	pub receipt_hash: [Hash; NUM_TIERS],
	/// Log bloom at each tier.
	pub bloom: [Bloom; NUM_TIERS],
	/// Difficulty of the block at each tier.
	pub difficulty: [Difficulty; NUM_TIERS],
	/// Block number at each tier.
	pub number: [u64; NUM_TIERS],
	/// Gas limit at each tier.
	pub gas_limit: [u64; NUM_TIERS],
	/// Gas used at each tier.
	pub gas_used: [u64; NUM_TIERS],
	/// Base fee at each tier.
	pub base_fee: [u64; NUM_TIERS],
	/// Which region/zone chain this block belongs to.
	pub location: Location,
	/// Block timestamp, seconds since the epoch.
	pub time: u64,
	/// Sealing nonce.
	pub nonce: u64,
	/// Arbitrary extra data, not tiered.
	pub extra: Vec<u8>,
}

impl Default for Header {
	fn default() -> Header {
		Header {
			parent_hash: [ZERO_HASH; NUM_TIERS],
			uncle_hash: [ZERO_HASH; NUM_TIERS],
			coinbase: Default::default(),
			root: [ZERO_HASH; NUM_TIERS],
			tx_hash: [ZERO_HASH; NUM_TIERS],
			etx_hash: [ZERO_HASH; NUM_TIERS],
			etx_rollup_hash: [ZERO_HASH; NUM_TIERS],
			manifest_hash: [ZERO_HASH; NUM_TIERS],
			receipt_hash: [ZERO_HASH; NUM_TIERS],
			bloom: Default::default(),
			difficulty: Default::default(),
			number: [0; NUM_TIERS],
			gas_limit: [0; NUM_TIERS],
			gas_used: [0; NUM_TIERS],
			base_fee: [0; NUM_TIERS],
			location: Location::default(),
			time: 0,
			nonce: 0,
			extra: vec![],
		}
	}
}

impl Header {
	/// Block number at the given tier.
	pub fn number(&self, tier: Tier) -> u64 {
		self.number[tier.index()]
	}

	/// Parent hash at the given tier.
	pub fn parent_hash(&self, tier: Tier) -> Hash {
		self.parent_hash[tier.index()]
	}

	/// Difficulty at the given tier.
	pub fn difficulty(&self, tier: Tier) -> &Difficulty {
		&self.difficulty[tier.index()]
	}

	/// State root at the given tier.
	pub fn root(&self, tier: Tier) -> Hash {
		self.root[tier.index()]
	}

	/// Whether this header commits to a non-empty body at the given tier.
	pub fn has_body(&self, tier: Tier) -> bool {
		let i = tier.index();
		!self.tx_hash[i].is_zero()
			|| !self.etx_hash[i].is_zero()
			|| !self.manifest_hash[i].is_zero()
	}

	/// Copies `target`, overwriting the fields at `tier` with this header's
	/// values at that same index. Fields at every other tier keep the
	/// target's values; the extra data always follows `self`.
	pub fn combine(&self, target: &Header, tier: Tier) -> Header {
		let i = tier.index();
		let mut combined = target.clone();
		combined.parent_hash[i] = self.parent_hash[i];
		combined.uncle_hash[i] = self.uncle_hash[i];
		combined.coinbase[i] = self.coinbase[i];
		combined.root[i] = self.root[i];
		combined.tx_hash[i] = self.tx_hash[i];
		combined.etx_hash[i] = self.etx_hash[i];
		combined.etx_rollup_hash[i] = self.etx_rollup_hash[i];
		combined.manifest_hash[i] = self.manifest_hash[i];
		combined.receipt_hash[i] = self.receipt_hash[i];
		combined.bloom[i] = self.bloom[i];
		combined.difficulty[i] = self.difficulty[i].clone();
		combined.number[i] = self.number[i];
		combined.gas_limit[i] = self.gas_limit[i];
		combined.gas_used[i] = self.gas_used[i];
		combined.base_fee[i] = self.base_fee[i];
		combined.extra = self.extra.clone();
		combined
	}
}

impl DefaultHashable for Header {}

impl Writeable for Header {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		for i in 0..NUM_TIERS {
			self.parent_hash[i].write(writer)?;
			self.uncle_hash[i].write(writer)?;
			self.coinbase[i].write(writer)?;
			self.root[i].write(writer)?;
			self.tx_hash[i].write(writer)?;
			self.etx_hash[i].write(writer)?;
			self.etx_rollup_hash[i].write(writer)?;
			self.manifest_hash[i].write(writer)?;
			self.receipt_hash[i].write(writer)?;
			self.bloom[i].write(writer)?;
			self.difficulty[i].write(writer)?;
			writer.write_u64(self.number[i])?;
			writer.write_u64(self.gas_limit[i])?;
			writer.write_u64(self.gas_used[i])?;
			writer.write_u64(self.base_fee[i])?;
		}
		self.location.write(writer)?;
		writer.write_u64(self.time)?;
		writer.write_u64(self.nonce)?;
		writer.write_bytes(&self.extra)
	}
}

impl Readable for Header {
	fn read(reader: &mut dyn Reader) -> Result<Header, ser::Error> {
		let mut header = Header::default();
		for i in 0..NUM_TIERS {
			header.parent_hash[i] = Hash::read(reader)?;
			header.uncle_hash[i] = Hash::read(reader)?;
			header.coinbase[i] = Address::read(reader)?;
			header.root[i] = Hash::read(reader)?;
			header.tx_hash[i] = Hash::read(reader)?;
			header.etx_hash[i] = Hash::read(reader)?;
			header.etx_rollup_hash[i] = Hash::read(reader)?;
			header.manifest_hash[i] = Hash::read(reader)?;
			header.receipt_hash[i] = Hash::read(reader)?;
			header.bloom[i] = Bloom::read(reader)?;
			header.difficulty[i] = Difficulty::read(reader)?;
			header.number[i] = reader.read_u64()?;
			header.gas_limit[i] = reader.read_u64()?;
			header.gas_used[i] = reader.read_u64()?;
			header.base_fee[i] = reader.read_u64()?;
		}
		header.location = Location::read(reader)?;
		header.time = reader.read_u64()?;
		header.nonce = reader.read_u64()?;
		header.extra = reader.read_bytes_len_prefix()?;
		Ok(header)
	}
}
