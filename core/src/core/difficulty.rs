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

//! Difficulty and total difficulty. Total difficulty accumulates over the
//! lifetime of a chain so it is kept as an unbounded-precision integer.

use num_bigint::BigUint;
use std::fmt;
use std::ops::Add;

use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// The difficulty of a block or the accumulated difficulty of a fork,
/// arbitrary precision.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Difficulty {
	num: BigUint,
}

impl Difficulty {
	/// Difficulty of zero
	pub fn zero() -> Difficulty {
		Difficulty {
			num: BigUint::default(),
		}
	}

	/// Convert a `u64` into a `Difficulty`
	pub fn from_num(num: u64) -> Difficulty {
		Difficulty {
			num: BigUint::from(num),
		}
	}

	/// Whether this is the zero difficulty.
	pub fn is_zero(&self) -> bool {
		self.num == BigUint::default()
	}
}

impl Add<Difficulty> for Difficulty {
	type Output = Difficulty;
	fn add(self, other: Difficulty) -> Difficulty {
		Difficulty {
			num: self.num + other.num,
		}
	}
}

impl<'a> Add<&'a Difficulty> for Difficulty {
	type Output = Difficulty;
	fn add(self, other: &'a Difficulty) -> Difficulty {
		Difficulty {
			num: self.num + &other.num,
		}
	}
}

impl fmt::Display for Difficulty {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.num)
	}
}

impl Writeable for Difficulty {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_bytes(&self.num.to_bytes_be())
	}
}

impl Readable for Difficulty {
	fn read(reader: &mut dyn Reader) -> Result<Difficulty, ser::Error> {
		let bytes = reader.read_bytes_len_prefix()?;
		Ok(Difficulty {
			num: BigUint::from_bytes_be(&bytes),
		})
	}
}
