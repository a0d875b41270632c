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

//! Core types

pub mod block;
pub mod difficulty;
pub mod hash;
pub mod header;
pub mod termini;
pub mod tier;

pub use self::block::*;
pub use self::difficulty::Difficulty;
pub use self::hash::{DefaultHashable, Hash, HashWriter, Hashed, ZERO_HASH};
pub use self::header::*;
pub use self::termini::*;
pub use self::tier::*;
