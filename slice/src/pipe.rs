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

//! Validation steps of the hierarchical append pipeline: previous-coincident
//! reference checking, total difficulty accounting, the fork choice rule and
//! block reconstruction from stored pending bodies.

use crate::error::{Error, ErrorKind};
use crate::store::{SliceBatch, SliceStore};
use crate::types::Engine;
use trellis_core::core::{Block, Difficulty, Hash, Hashed, Header, Termini, Tier, ZERO_HASH};

/// The previous-coincident reference check. Updates the parent's termini for
/// the incoming header, verifies that a dominant-coincident header agrees
/// with the dominant tier's chain of coincident ancestors, and stages the
/// result. Returns the terminus to recurse into the subordinate with, along
/// with the header's own termini.
pub fn pcrc(
	batch: &SliceBatch<'_>,
	store: &SliceStore,
	engine: &dyn Engine,
	header: &Header,
	dom_terminus: Hash,
	tier: Tier,
	genesis_hash: Hash,
) -> Result<(Hash, Termini), Error> {
	let parent_hash = header.parent_hash(tier);
	let termini = store
		.get_termini(&parent_hash)?
		.ok_or(ErrorKind::SubNotSynced)?;
	let mut new_termini = termini.clone();

	// the first blocks under genesis have no dominant history to agree with
	let dom_terminus = if header.parent_hash(Tier::Prime) == genesis_hash {
		genesis_hash
	} else {
		dom_terminus
	};

	let hash = header.hash();
	let is_dom_coincident = engine.is_dom_coincident(header);

	if tier != Tier::Zone {
		new_termini.set_sub_terminus(header.location.sub_index(tier), hash);
	}
	if tier == Tier::Prime || is_dom_coincident {
		new_termini.set_terminus(hash);
	}

	// every coincident ancestor recorded locally has to agree with the
	// dominant tier's own chain of coincident ancestors, otherwise the DAG
	// would merge into a non-tree shape
	if is_dom_coincident && termini.terminus() != dom_terminus {
		return Err(ErrorKind::CyclicReference.into());
	}

	batch.save_termini(&hash, &new_termini)?;

	let parent_sub_terminus = match tier {
		Tier::Zone => ZERO_HASH,
		_ => termini.sub_terminus(header.location.sub_index(tier)),
	};
	Ok((parent_sub_terminus, new_termini))
}

/// Total difficulty of a header appended on top of a known parent.
pub fn calc_td(store: &SliceStore, header: &Header, tier: Tier) -> Result<Difficulty, Error> {
	let parent_hash = header.parent_hash(tier);
	let parent_number = header.number(tier).saturating_sub(1);
	let parent_td = store
		.get_td(&parent_hash, parent_number)?
		.ok_or(ErrorKind::FutureBlock)?;
	Ok(parent_td + header.difficulty(tier))
}

/// Hierarchical longest chain rule: strictly more accumulated work wins.
/// A tie keeps the current head.
pub fn hlcr(extern_td: &Difficulty, head_td: &Difficulty) -> bool {
	extern_td > head_td
}

/// Rebuild the full block for an incoming header. A header that commits to
/// nothing gets an empty body; anything else must have its pending body
/// stored under the header's state root.
pub fn reconstruct_block(
	store: &SliceStore,
	header: &Header,
	tier: Tier,
) -> Result<Block, Error> {
	if !header.has_body(tier) {
		return Ok(Block::with_empty_body(header.clone()));
	}
	match store.get_pending_body(&header.root(tier))? {
		Some(body) => Ok(Block::new(header.clone(), body)),
		None => Err(ErrorKind::MissingBody(header.hash()).into()),
	}
}
