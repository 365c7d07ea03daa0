//! One evaluation step as an explicit state machine.

mod engine;
mod types;

pub use engine::{do_array, do_feed, eval_step, eval_step_skipping_invisibles};
pub(crate) use engine::{eval_in_child, eval_sym};
pub(crate) use types::{EvalState, PendingCall};
