//! # Capability Contracts
//!
//! Contracts for the identity operations an agent typically exposes. Each
//! contract is three things:
//!
//! - a set of [`Operation`](crate::Operation) types declaring method name,
//!   argument shape and output shape;
//! - a trait of typed convenience methods, blanket-implemented for every
//!   [`Dispatch`](crate::Dispatch) so both the agent and a per-call context
//!   can use it;
//! - a [`Contract`](crate::Contract) marker listing the contract's methods so
//!   a configuration can require it.
//!
//! A consumer needing several contracts states the intersection as a bound,
//! for example `impl KeyManager + DidManager`.

mod did;
mod key;
mod resolver;

pub use self::did::*;
pub use self::key::*;
pub use self::resolver::*;
