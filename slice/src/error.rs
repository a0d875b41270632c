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

//! Error types for the slice coordinator
use failure::{Backtrace, Context, Fail};
use std::fmt::{self, Display};

use trellis_core::core::hash::Hash;
use trellis_core::ser;
use trellis_store as store;

/// Error definition
#[derive(Debug, Fail)]
pub struct Error {
	inner: Context<ErrorKind>,
}

/// Slice error definitions
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
	/// The header doesn't fit anywhere in our chain
	#[fail(display = "Header is unfit: {}", _0)]
	Unfit(String),
	/// Header advertises a body but no pending body is stored for its root
	#[fail(display = "No pending body for block {}", _0)]
	MissingBody(Hash),
	/// The termini record for a header is malformed
	#[fail(display = "Invalid termini record")]
	InvalidTermini,
	/// A dominant-coincident header disagrees with the dominant chain of
	/// coincident ancestors, accepting it would fold the DAG into a cycle
	#[fail(display = "Cyclic dominant reference")]
	CyclicReference,
	/// The header chain refused the block
	#[fail(display = "Chain append failed: {}", _0)]
	AppendFailed(String),
	/// The parent's total difficulty is not known yet
	#[fail(display = "Future block, parent difficulty unknown")]
	FutureBlock,
	/// This slice has not caught up with its dominant chain yet, retriable
	#[fail(display = "Sub not synced to dom")]
	SubNotSynced,
	/// No pending ETXs stored for a manifest entry
	#[fail(display = "No pending ETXs for block {}", _0)]
	MissingPendingEtxs(Hash),
	/// Collected rollup disagrees with the hash the header advertises
	#[fail(display = "ETX rollup hash mismatch")]
	RollupHashMismatch,
	/// No pending header cached under the given terminus
	#[fail(display = "No pending header cached for {}", _0)]
	MissingCacheEntry(Hash),
	/// No pending header has been seeded yet
	#[fail(display = "Empty pending header")]
	EmptyPendingHeader,
	/// No subordinate client configured in the given slot
	#[fail(display = "No subordinate client in slot {}", _0)]
	EmptySubSlot(usize),
	/// The dominant client has not been dialed yet, retriable
	#[fail(display = "Dominant client unavailable")]
	DomClientUnavailable,
	/// Internal issue when trying to save or load data from store
	#[fail(display = "Store Error: {}", _1)]
	StoreErr(store::Error, String),
	/// Error serializing or deserializing a type
	#[fail(display = "Serialization Error: {}", _0)]
	SerErr(String),
	/// Anything else
	#[fail(display = "Other Error: {}", _0)]
	Other(String),
}

impl Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let cause = match self.cause() {
			Some(c) => format!("{}", c),
			None => String::from("Unknown"),
		};
		let output = format!("{} \n Cause: {}", self.inner, cause);
		Display::fmt(&output, f)
	}
}

impl Error {
	/// get kind
	pub fn kind(&self) -> ErrorKind {
		self.inner.get_context().clone()
	}
	/// get cause
	pub fn cause(&self) -> Option<&dyn Fail> {
		self.inner.cause()
	}
	/// get backtrace
	pub fn backtrace(&self) -> Option<&Backtrace> {
		self.inner.backtrace()
	}
}

impl From<ErrorKind> for Error {
	fn from(kind: ErrorKind) -> Error {
		Error {
			inner: Context::new(kind),
		}
	}
}

impl From<Context<ErrorKind>> for Error {
	fn from(inner: Context<ErrorKind>) -> Error {
		Error { inner }
	}
}

impl From<store::Error> for Error {
	fn from(error: store::Error) -> Error {
		let ec = error.clone();
		Error {
			inner: error.context(ErrorKind::StoreErr(ec.clone(), format!("{}", ec))),
		}
	}
}

impl From<ser::Error> for Error {
	fn from(error: ser::Error) -> Error {
		Error {
			inner: Context::new(ErrorKind::SerErr(format!("{}", error))),
		}
	}
}
