// src/resolver/mod.rs

//! Dependency resolution and install ordering.
//!
//! `solver` checks requires against the record store and the set of headers
//! being added, producing `Requires` problems. `orderer` takes the resulting
//! transaction elements and topologically sorts them into an install/erase
//! sequence, breaking cycles where necessary.

pub mod orderer;
pub mod solver;

pub use orderer::{order_elements, ElementEdge, ElementKind, OrderResult, TransactionElement};
pub use solver::{check_requires, provides_of, requires_of, Capability};
