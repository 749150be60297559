//! Review Session
//!
//! The interactive cluster-resolution workflow as a pure state machine.
//! [`SessionState`] is a plain value; [`reduce`] maps `(state, input)` to a
//! new state plus the backend [`Command`]s to run.

mod reducer;
mod state;

pub use reducer::{reduce, Command, SessionInput, Step, TransitionError};
pub use state::{Pending, SessionState};
