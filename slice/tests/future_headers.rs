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

use chrono::prelude::Utc;

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
fn replay_in_ascending_number_order() {
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

	let mut prev = genesis.header.clone();
	for n in 1..4 {
		let header = next_header(&prev, Tier::Zone, 10, n);
		append_local(&ts, &header).unwrap();
		prev = header;
	}

	// a chain running ahead of what we hold
	let b4 = next_header(&prev, Tier::Zone, 10, 4);
	let b5 = next_header(&b4, Tier::Zone, 10, 5);
	let b6 = next_header(&b5, Tier::Zone, 10, 6);
	let b7 = next_header(&b6, Tier::Zone, 10, 7);

	// an early header parks itself on the retriable failure
	match append_local(&ts, &b5) {
		Err(e) => assert_eq!(e.kind(), ErrorKind::SubNotSynced),
		Ok(_) => panic!("expected sub not synced"),
	}
	assert_eq!(ts.slice.future_header_count(), 1);

	// park out of order
	ts.slice.add_future_header(b7.clone()).unwrap();
	ts.slice.add_future_header(b6.clone()).unwrap();
	assert_eq!(ts.slice.future_header_count(), 3);

	// replay without the missing parent leaves everything parked
	ts.slice.proc_future_headers();
	assert_eq!(ts.slice.future_header_count(), 3);

	// the missing parent arrives, the replay drains in ascending order
	append_local(&ts, &b4).unwrap();
	ts.slice.proc_future_headers();

	assert_eq!(ts.slice.future_header_count(), 0);
	assert_eq!(ts.chain.current_header().hash(), b7.hash());
	let heads = ts.adapter.heads();
	let tail: Vec<_> = heads[heads.len() - 4..].to_vec();
	assert_eq!(tail, vec![b4.hash(), b5.hash(), b6.hash(), b7.hash()]);
}

#[test]
fn far_future_headers_are_refused() {
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

	let mut late = next_header(&genesis.header, Tier::Zone, 10, 1);
	late.parent_hash[Tier::Zone.index()] = trellis_core::core::Hash::from_vec(&[200]);
	late.time = (Utc::now().timestamp() as u64) + 3_600;
	match ts.slice.add_future_header(late) {
		Err(e) => match e.kind() {
			ErrorKind::Unfit(_) => (),
			k => panic!("unexpected kind {:?}", k),
		},
		Ok(_) => panic!("expected refusal"),
	}
	assert_eq!(ts.slice.future_header_count(), 0);

	// a timestamp inside the window is fine
	let mut soon = next_header(&genesis.header, Tier::Zone, 10, 2);
	soon.parent_hash[Tier::Zone.index()] = trellis_core::core::Hash::from_vec(&[201]);
	soon.time = (Utc::now().timestamp() as u64) + 5;
	ts.slice.add_future_header(soon).unwrap();
	assert_eq!(ts.slice.future_header_count(), 1);
}

#[test]
fn replay_drops_headers_that_fail_hard() {
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

	// a coincident header that will fail the coincident-reference check
	// once its parent arrives: replay hands it a zero dom terminus
	let c = next_coincident(&b1, Location::new(0, 0), 10, 2);
	assert_ne!(c.parent_hash(Tier::Prime), g);
	ts.slice.add_future_header(c.clone()).unwrap();
	assert_eq!(ts.slice.future_header_count(), 1);

	ts.slice.proc_future_headers();

	// rejected for good and evicted
	assert_eq!(ts.slice.future_header_count(), 0);
	assert!(ts.slice.store().get_termini(&c.hash()).unwrap().is_none());
}
