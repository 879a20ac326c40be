//! Laneclash engine.
//!
//! This crate contains the deterministic state machines driving a match: the
//! per-session battle state ([`BattleState`]) and the matchmaking waiting
//! list ([`MatchQueue`]).
//!
//! ## Determinism requirements
//! - No I/O, no clocks, no randomness: every transition is a pure function
//!   of the current state and the action.
//! - Mutating operations either commit fully and return the events to
//!   deliver, or fail and leave the state untouched.
//!
//! ## Concurrency
//! The engine is single-threaded by construction; callers serialize access
//! per session (one lock per live battle, one lock for the queue).

mod battle;
mod queue;

pub use battle::{BattleError, BattleState};
pub use queue::{MatchQueue, QueueError, QueuedPlayer};
