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

//! The three tiers of the hierarchy and node/block locations within it.

use std::fmt;

use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// Depth of the hierarchy: Prime supervises Regions, Regions supervise Zones.
pub const NUM_TIERS: usize = 3;

/// Width of the hierarchy: how many subordinate chains a dominant chain
/// supervises.
pub const NUM_SUBS: usize = 3;

/// A level in the three-level hierarchy. Each running slice occupies exactly
/// one tier, fixed at construction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
	/// The top-level chain, no dominant parent.
	Prime,
	/// Middle chains, supervised by Prime, supervising Zones.
	Region,
	/// Leaf chains where mining and transactions happen, no subordinates.
	Zone,
}

impl Tier {
	/// Index of this tier into the per-tier arrays carried by headers.
	pub fn index(self) -> usize {
		match self {
			Tier::Prime => 0,
			Tier::Region => 1,
			Tier::Zone => 2,
		}
	}

	/// The dominant tier, if any.
	pub fn dom(self) -> Option<Tier> {
		match self {
			Tier::Prime => None,
			Tier::Region => Some(Tier::Prime),
			Tier::Zone => Some(Tier::Region),
		}
	}

	/// The subordinate tier, if any.
	pub fn sub(self) -> Option<Tier> {
		match self {
			Tier::Prime => Some(Tier::Region),
			Tier::Region => Some(Tier::Zone),
			Tier::Zone => None,
		}
	}
}

impl fmt::Display for Tier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Tier::Prime => write!(f, "prime"),
			Tier::Region => write!(f, "region"),
			Tier::Zone => write!(f, "zone"),
		}
	}
}

/// Position of a node or block in the hierarchy: which region, and which
/// zone within that region.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Location {
	/// Region index, 0-based.
	pub region: u8,
	/// Zone index within the region, 0-based.
	pub zone: u8,
}

impl Location {
	/// Builds a location from its region and zone indices.
	pub fn new(region: u8, zone: u8) -> Location {
		Location { region, zone }
	}

	/// The subordinate slot a block in this location belongs to, from the
	/// point of view of the given tier. Meaningless at Zone, which has no
	/// subordinates.
	pub fn sub_index(&self, tier: Tier) -> usize {
		match tier {
			Tier::Prime => self.region as usize,
			Tier::Region => self.zone as usize,
			Tier::Zone => 0,
		}
	}

	/// Whether two locations share a region, zones aside.
	pub fn region_eq(&self, other: &Location) -> bool {
		self.region == other.region
	}
}

impl fmt::Display for Location {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "r{}/z{}", self.region, self.zone)
	}
}

impl Writeable for Location {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u8(self.region)?;
		writer.write_u8(self.zone)
	}
}

impl Readable for Location {
	fn read(reader: &mut dyn Reader) -> Result<Location, ser::Error> {
		let region = reader.read_u8()?;
		let zone = reader.read_u8()?;
		Ok(Location { region, zone })
	}
}
