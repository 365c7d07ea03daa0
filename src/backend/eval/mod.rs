// Evaluator core: one step at a time over a feed of code units.
//
// step(feed):
//   unit = peek
//   if the unit after it is a left-quoting enfix action: call it with unit as left
//   else evaluate unit by kind (words fetch, actions fulfill their arguments)
//   while the next unit is an enfix action that is not suppressed: call it with
//   the value just produced as left

#[macro_use]
mod macros;

pub mod context;
pub mod errors;
pub mod feed;
pub mod frame;
pub(crate) mod fulfill;
pub(crate) mod lookahead;
pub(crate) mod path;
pub mod signal;
pub mod step;
pub mod varargs;

#[cfg(test)]
mod eval_tests;

pub use context::{EvalContext, PollHook};
pub use errors::{ErrorKind, EvalError};
pub use feed::{Feed, FeedHandle, FeedItem};
pub use frame::{Frame, FrameId, FrameRef, OutCell};
pub use signal::{Completion, Signal, SignalLabel};
pub use step::{do_array, do_feed, eval_step, eval_step_skipping_invisibles};
pub use varargs::Varargs;
