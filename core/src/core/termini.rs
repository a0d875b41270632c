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

//! Termini bookkeeping: for every header we track the last-seen hash of
//! each subordinate slot plus the most recent dominant-coincident ancestor.

use crate::core::hash::Hash;
use crate::core::header::Header;
use crate::core::tier::NUM_SUBS;
use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// Index of the terminus inside a termini tuple. The three entries before it
/// are the subordinate slots.
pub const TERMINUS_INDEX: usize = 3;

/// The termini tuple stored for each accepted header. Entries 0..3 hold the
/// latest header hash seen from each subordinate slot, entry 3 holds the hash
/// of the closest dominant-coincident ancestor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Termini([Hash; NUM_SUBS + 1]);

impl Termini {
	/// Termini with all four entries set to the same hash, the shape the
	/// genesis block is seeded with.
	pub fn from_single(h: Hash) -> Termini {
		Termini([h; NUM_SUBS + 1])
	}

	/// The most recent dominant-coincident ancestor.
	pub fn terminus(&self) -> Hash {
		self.0[TERMINUS_INDEX]
	}

	/// Replace the terminus entry.
	pub fn set_terminus(&mut self, h: Hash) {
		self.0[TERMINUS_INDEX] = h;
	}

	/// The last-seen hash for the given subordinate slot.
	pub fn sub_terminus(&self, idx: usize) -> Hash {
		self.0[idx]
	}

	/// Replace the last-seen hash for the given subordinate slot.
	pub fn set_sub_terminus(&mut self, idx: usize, h: Hash) {
		debug_assert!(idx < NUM_SUBS);
		self.0[idx] = h;
	}
}

impl Writeable for Termini {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u8((NUM_SUBS + 1) as u8)?;
		for h in self.0.iter() {
			h.write(writer)?;
		}
		Ok(())
	}
}

impl Readable for Termini {
	fn read(reader: &mut dyn Reader) -> Result<Termini, ser::Error> {
		let count = reader.read_u8()?;
		if count as usize != NUM_SUBS + 1 {
			return Err(ser::Error::CountError);
		}
		let mut termini = [Hash::default(); NUM_SUBS + 1];
		for t in termini.iter_mut() {
			*t = Hash::read(reader)?;
		}
		Ok(Termini(termini))
	}
}

/// A candidate header under composition, not yet sealed, together with the
/// termini of the block it extends. Cached by the coordinator keyed on the
/// terminus entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingHeader {
	/// The composited candidate header.
	pub header: Header,
	/// Termini of the appended block this candidate builds on.
	pub termini: Termini,
}

impl PendingHeader {
	/// Builds a pending header from its parts.
	pub fn new(header: Header, termini: Termini) -> PendingHeader {
		PendingHeader { header, termini }
	}
}

impl Writeable for PendingHeader {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.header.write(writer)?;
		self.termini.write(writer)
	}
}

impl Readable for PendingHeader {
	fn read(reader: &mut dyn Reader) -> Result<PendingHeader, ser::Error> {
		let header = Header::read(reader)?;
		let termini = Termini::read(reader)?;
		Ok(PendingHeader { header, termini })
	}
}
