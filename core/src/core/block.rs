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

//! Blocks, block bodies and the external transactions settled between tiers.

use crate::core::hash::{DefaultHashable, Hash, HashWriter, Hashed};
use crate::core::header::{Address, Header};
use crate::core::tier::{Location, NUM_TIERS};
use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// A transaction. External transactions (ETXs) are ordinary transactions
/// whose destination lives on another chain of the hierarchy; they settle
/// through rollups at coincident blocks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
	/// Sender nonce.
	pub nonce: u64,
	/// Chain the recipient lives on.
	pub destination: Location,
	/// Recipient address.
	pub to: Address,
	/// Transferred amount.
	pub value: u64,
	/// Call payload.
	pub data: Vec<u8>,
}

impl DefaultHashable for Transaction {}

impl Writeable for Transaction {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u64(self.nonce)?;
		self.destination.write(writer)?;
		self.to.write(writer)?;
		writer.write_u64(self.value)?;
		writer.write_bytes(&self.data)
	}
}

impl Readable for Transaction {
	fn read(reader: &mut dyn Reader) -> Result<Transaction, ser::Error> {
		let nonce = reader.read_u64()?;
		let destination = Location::read(reader)?;
		let to = Address::read(reader)?;
		let value = reader.read_u64()?;
		let data = reader.read_bytes_len_prefix()?;
		Ok(Transaction {
			nonce,
			destination,
			to,
			value,
			data,
		})
	}
}

/// Hashes of the subordinate blocks aggregated since the last coincidence.
pub type BlockManifest = Vec<Hash>;

/// One list of external transactions per tier.
pub type TierEtxs = [Vec<Transaction>; NUM_TIERS];

/// Hash of a list of external transactions, as advertised by headers in
/// their etx and rollup fields.
pub fn etx_list_hash(etxs: &[Transaction]) -> Hash {
	let mut hasher = HashWriter::default();
	hasher.write_u64(etxs.len() as u64).unwrap();
	for etx in etxs {
		etx.write(&mut hasher).unwrap();
	}
	hasher.into_hash()
}

fn write_tx_vec<W: Writer>(writer: &mut W, txs: &[Transaction]) -> Result<(), ser::Error> {
	writer.write_u64(txs.len() as u64)?;
	for tx in txs {
		tx.write(writer)?;
	}
	Ok(())
}

fn read_tx_vec(reader: &mut dyn Reader) -> Result<Vec<Transaction>, ser::Error> {
	let count = reader.read_u64()?;
	let mut txs = Vec::with_capacity(count as usize);
	for _ in 0..count {
		txs.push(Transaction::read(reader)?);
	}
	Ok(txs)
}

/// The body of a block: what the header commits to beyond its own fields.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Body {
	/// Ordinary transactions included in the block.
	pub transactions: Vec<Transaction>,
	/// Uncle headers.
	pub uncles: Vec<Header>,
	/// External transactions emitted by this block.
	pub etxs: Vec<Transaction>,
	/// Subordinate block hashes aggregated since the last coincidence.
	pub manifest: BlockManifest,
}

impl Body {
	/// An empty body.
	pub fn empty() -> Body {
		Body::default()
	}
}

impl Writeable for Body {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		write_tx_vec(writer, &self.transactions)?;
		writer.write_u64(self.uncles.len() as u64)?;
		for uncle in &self.uncles {
			uncle.write(writer)?;
		}
		write_tx_vec(writer, &self.etxs)?;
		writer.write_u64(self.manifest.len() as u64)?;
		for h in &self.manifest {
			h.write(writer)?;
		}
		Ok(())
	}
}

impl Readable for Body {
	fn read(reader: &mut dyn Reader) -> Result<Body, ser::Error> {
		let transactions = read_tx_vec(reader)?;
		let uncle_count = reader.read_u64()?;
		let mut uncles = Vec::with_capacity(uncle_count as usize);
		for _ in 0..uncle_count {
			uncles.push(Header::read(reader)?);
		}
		let etxs = read_tx_vec(reader)?;
		let manifest_count = reader.read_u64()?;
		let mut manifest = Vec::with_capacity(manifest_count as usize);
		for _ in 0..manifest_count {
			manifest.push(Hash::read(reader)?);
		}
		Ok(Body {
			transactions,
			uncles,
			etxs,
			manifest,
		})
	}
}

/// A full block: header plus body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
	/// The block header.
	pub header: Header,
	/// The block body.
	pub body: Body,
}

impl Block {
	/// Builds a block from a header and its body.
	pub fn new(header: Header, body: Body) -> Block {
		Block { header, body }
	}

	/// Builds a block around a header that commits to nothing.
	pub fn with_empty_body(header: Header) -> Block {
		Block {
			header,
			body: Body::empty(),
		}
	}

	/// The block hash is the hash of its header.
	pub fn hash(&self) -> Hash {
		self.header.hash()
	}
}

impl Writeable for Block {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.header.write(writer)?;
		self.body.write(writer)
	}
}

impl Readable for Block {
	fn read(reader: &mut dyn Reader) -> Result<Block, ser::Error> {
		let header = Header::read(reader)?;
		let body = Body::read(reader)?;
		Ok(Block { header, body })
	}
}

/// External transactions a block committed for each tier, kept around until
/// the dominant chain settles them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingEtxs {
	/// Hash of the block the lists were committed by.
	pub header: Hash,
	/// One ETX list per tier.
	pub etxs: TierEtxs,
}

impl PendingEtxs {
	/// Builds a pending-ETX record from its parts.
	pub fn new(header: Hash, etxs: TierEtxs) -> PendingEtxs {
		PendingEtxs { header, etxs }
	}

	/// A record with three empty lists, as seeded for the genesis block.
	pub fn empty(header: Hash) -> PendingEtxs {
		PendingEtxs {
			header,
			etxs: Default::default(),
		}
	}
}

impl Writeable for PendingEtxs {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.header.write(writer)?;
		for list in self.etxs.iter() {
			write_tx_vec(writer, list)?;
		}
		Ok(())
	}
}

impl Readable for PendingEtxs {
	fn read(reader: &mut dyn Reader) -> Result<PendingEtxs, ser::Error> {
		let header = Hash::read(reader)?;
		let mut etxs: TierEtxs = Default::default();
		for list in etxs.iter_mut() {
			*list = read_tx_vec(reader)?;
		}
		Ok(PendingEtxs { header, etxs })
	}
}
