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

mod common;

use std::thread;
use std::time::Duration;

use common::*;
use trellis_core::core::{Difficulty, Hashed, Header, Location, Tier, ZERO_HASH};
use trellis_slice::{ErrorKind, HeaderChain, SubClients};

fn append_local(ts: &TestSlice, header: &Header) -> Result<(), trellis_slice::Error> {
	ts.slice
		.append(
			header.clone(),
			Header::default(),
			ZERO_HASH,
			Difficulty::zero(),
			false,
			false,
		)
		.map(|_| ())
}

#[test]
fn mine_simple_slice() {
	let dir = tempfile::tempdir().unwrap();
	let genesis = genesis_block();
	let g = genesis.hash();
	let chain = MemHeaderChain::new(genesis.header.clone());
	let ts = build_slice(
		Tier::Zone,
		Location::new(0, 0),
		dir.path().to_str().unwrap().to_owned(),
		chain,
		SubClients::none(),
		&genesis,
		vec![],
	);

	// nothing composited yet
	match ts.slice.get_pending_header() {
		Err(e) => assert_eq!(e.kind(), ErrorKind::EmptyPendingHeader),
		Ok(_) => panic!("expected empty pending header"),
	}

	let mut prev = genesis.header.clone();
	for n in 1..4 {
		let header = next_header(&prev, Tier::Zone, 10, n);
		append_local(&ts, &header).unwrap();

		// checking our new head
		assert_eq!(ts.chain.current_header().hash(), header.hash());
		assert_eq!(
			ts.slice
				.store()
				.get_td(&header.hash(), n)
				.unwrap()
				.unwrap(),
			Difficulty::from_num(10 * n),
		);

		// termini stay four-wide and inherit the genesis terminus
		let termini = ts.slice.store().get_termini(&header.hash()).unwrap().unwrap();
		assert_eq!(termini.terminus(), g);

		prev = header;
	}
	assert_eq!(ts.adapter.heads().len(), 3);
	assert_eq!(ts.adapter.sides().len(), 0);

	// the miner was handed a fresh candidate extending the head
	let pending = ts.slice.get_pending_header().unwrap();
	assert_eq!(pending.parent_hash(Tier::Zone), prev.hash());
	assert_eq!(pending.number(Tier::Zone), 4);
	assert!(!ts.adapter.pending().is_empty());

	// a known block is a silent success
	append_local(&ts, &prev).unwrap();
	assert_eq!(ts.adapter.heads().len(), 3);
}

#[test]
fn tied_td_is_not_a_reorg() {
	let dir = tempfile::tempdir().unwrap();
	let genesis = genesis_block();
	let chain = MemHeaderChain::new(genesis.header.clone());
	let ts = build_slice(
		Tier::Zone,
		Location::new(0, 0),
		dir.path().to_str().unwrap().to_owned(),
		chain,
		SubClients::none(),
		&genesis,
		vec![],
	);

	let x = next_header(&genesis.header, Tier::Zone, 100, 1);
	append_local(&ts, &x).unwrap();
	assert_eq!(ts.chain.current_header().hash(), x.hash());

	// an alternate block at the same height with the same work
	let y = next_header(&genesis.header, Tier::Zone, 100, 2);
	assert_ne!(x.hash(), y.hash());
	append_local(&ts, &y).unwrap();

	// the first seen block keeps the head, the tie goes to the side feed
	assert_eq!(ts.chain.current_header().hash(), x.hash());
	assert_eq!(ts.adapter.heads(), vec![x.hash()]);
	assert_eq!(ts.adapter.sides(), vec![y.hash()]);

	// strictly more work still wins
	let z = next_header(&x, Tier::Zone, 101, 3);
	append_local(&ts, &z).unwrap();
	assert_eq!(ts.chain.current_header().hash(), z.hash());
}

#[test]
fn coincidence_advances_terminus() {
	let dir = tempfile::tempdir().unwrap();
	let genesis = genesis_block();
	let g = genesis.hash();
	let chain = MemHeaderChain::new(genesis.header.clone());
	let ts = build_slice(
		Tier::Zone,
		Location::new(0, 0),
		dir.path().to_str().unwrap().to_owned(),
		chain,
		SubClients::none(),
		&genesis,
		vec![],
	);

	let b1 = next_header(&genesis.header, Tier::Zone, 10, 1);
	append_local(&ts, &b1).unwrap();

	// first coincident block: the zone ran ahead but the region chain is
	// still at genesis
	let mut c2 = next_coincident(&b1, Location::new(0, 0), 20, 2);
	c2.parent_hash[Tier::Prime.index()] = g;
	c2.parent_hash[Tier::Region.index()] = g;
	c2.number[Tier::Prime.index()] = 1;
	c2.number[Tier::Region.index()] = 1;
	append_local(&ts, &c2).unwrap();

	let b3 = next_header(&c2, Tier::Zone, 10, 3);
	append_local(&ts, &b3).unwrap();

	// the coincidence ladder: plain headers inherit, coincident headers
	// become their own terminus
	let store = ts.slice.store();
	assert_eq!(store.get_termini(&b1.hash()).unwrap().unwrap().terminus(), g);
	assert_eq!(
		store.get_termini(&c2.hash()).unwrap().unwrap().terminus(),
		c2.hash()
	);
	assert_eq!(
		store.get_termini(&b3.hash()).unwrap().unwrap().terminus(),
		c2.hash()
	);

	// one candidate per coincidence point
	assert_eq!(ts.slice.ph_cache().read().len(), 2);
	assert_eq!(ts.slice.ph_cache().read().head_hash(), c2.hash());

	// the coincident block committed a pending-ETX record
	assert!(store.get_pending_etxs(&c2.hash()).unwrap().is_some());
}

#[test]
fn coincident_header_must_come_through_dom() {
	let dir = tempfile::tempdir().unwrap();
	let genesis = genesis_block();
	let chain = MemHeaderChain::new(genesis.header.clone());
	let ts = build_slice(
		Tier::Zone,
		Location::new(0, 0),
		dir.path().to_str().unwrap().to_owned(),
		chain,
		SubClients::none(),
		&genesis,
		vec![],
	);

	let b1 = next_header(&genesis.header, Tier::Zone, 10, 1);
	append_local(&ts, &b1).unwrap();

	// a later coincident block carries a real prime parent, so the genesis
	// escape does not apply and the zero dom terminus disagrees
	let c2 = next_coincident(&b1, Location::new(0, 0), 20, 2);
	let before = ts.chain.len();
	match append_local(&ts, &c2) {
		Err(e) => assert_eq!(e.kind(), ErrorKind::CyclicReference),
		Ok(_) => panic!("expected cyclic reference"),
	}

	// no chain or cache mutation took place
	assert_eq!(ts.chain.len(), before);
	assert!(ts.slice.store().get_termini(&c2.hash()).unwrap().is_none());
	assert_eq!(ts.chain.current_header().hash(), b1.hash());
}

#[test]
fn restart_rehydrates_pending_state() {
	let dir = tempfile::tempdir().unwrap();
	let db_root = dir.path().to_str().unwrap().to_owned();
	let genesis = genesis_block();
	let g = genesis.hash();
	let chain = MemHeaderChain::new(genesis.header.clone());

	let ts = build_slice(
		Tier::Zone,
		Location::new(0, 0),
		db_root.clone(),
		chain.clone(),
		SubClients::none(),
		&genesis,
		vec![],
	);

	let b1 = next_header(&genesis.header, Tier::Zone, 10, 1);
	append_local(&ts, &b1).unwrap();
	let mut c2 = next_coincident(&b1, Location::new(0, 0), 20, 2);
	c2.parent_hash[Tier::Prime.index()] = g;
	c2.parent_hash[Tier::Region.index()] = g;
	append_local(&ts, &c2).unwrap();
	let b3 = next_header(&c2, Tier::Zone, 10, 3);
	append_local(&ts, &b3).unwrap();

	let head_before = ts.chain.current_header().hash();
	let (entries_before, head_hash_before, genesis_entry_before) = {
		let cache = ts.slice.ph_cache().read();
		(
			cache.len(),
			cache.head_hash(),
			cache.entry(&g).cloned().unwrap(),
		)
	};
	let pending_before = ts.slice.get_pending_header().unwrap();

	ts.slice.stop();
	let TestSlice { slice, chain, .. } = ts;
	drop(slice);
	// let the replay thread wind down before reopening the same db
	thread::sleep(Duration::from_secs(1));

	let ts2 = build_slice(
		Tier::Zone,
		Location::new(0, 0),
		db_root,
		chain,
		SubClients::none(),
		&genesis,
		vec![],
	);

	assert_eq!(ts2.chain.current_header().hash(), head_before);
	let cache = ts2.slice.ph_cache().read();
	assert_eq!(cache.len(), entries_before);
	assert_eq!(cache.head_hash(), head_hash_before);
	assert_eq!(cache.entry(&g).cloned().unwrap(), genesis_entry_before);
	drop(cache);
	assert_eq!(ts2.slice.get_pending_header().unwrap(), pending_before);
}
