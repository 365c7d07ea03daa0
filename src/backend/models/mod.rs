pub mod action;
pub mod value;

pub use action::{
    parse_spec, Action, Deferral, Dispatcher, Param, ParamClass, ParsedSpec, Pull, TypeSet,
};
pub use value::{Array, Kind, Value};
