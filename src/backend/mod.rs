// Backend of the evaluator
//
// - `models`: values, actions and the parameter-spec dialect
// - `environment`: lexical scopes mapping words to values
// - `eval`: feeds, frames, argument fulfillment and the step driver
// - `natives`: the Rust-implemented action library
// - `config`: evaluator settings loaded from TOML

pub mod config;
pub mod environment;
#[macro_use]
pub mod eval;
pub mod models;
pub mod natives;

pub use config::{ConfigError, EvalConfig};
pub use environment::Context;
pub use eval::{
    do_array, do_feed, eval_step, Completion, ErrorKind, EvalContext, EvalError, FeedHandle,
    FeedItem, OutCell, Signal, SignalLabel,
};
pub use models::*;
pub use natives::{Bounce, Call, Native, NativeRegistry, NativeResult};
