//! Host-facing interpreter: owns the evaluation context, the library
//! context holding natives, and the user context code runs in.
//!
//! ```ignore
//! let mut interp = Interpreter::new()?;
//! assert_eq!(interp.eval_text("1 + 2 * 3")?, Value::Integer(9));
//! ```

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::debug;

use crate::backend::config::EvalConfig;
use crate::backend::environment::Context;
use crate::backend::eval::{
    do_feed, Completion, EvalContext, EvalError, Feed, FeedHandle, FeedItem, OutCell, PollHook,
    Signal, SignalLabel,
};
use crate::backend::models::Value;
use crate::backend::natives::{native_action, Native, NativeRegistry, ACCEPT, REJECT};
use crate::scanner::{scan, ScanError};

#[derive(Debug, Clone, PartialEq)]
pub enum HostError {
    Scan(ScanError),
    Eval(EvalError),
    /// A signal reached the top level without anything catching it
    UnhandledSignal(Signal),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Scan(err) => write!(f, "{}", err),
            HostError::Eval(err) => write!(f, "error: {}", err),
            HostError::UnhandledSignal(signal) => write!(f, "no catch for {}", signal),
        }
    }
}

impl std::error::Error for HostError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HostError::Scan(err) => Some(err),
            HostError::Eval(err) => Some(err),
            HostError::UnhandledSignal(_) => None,
        }
    }
}

impl From<ScanError> for HostError {
    fn from(err: ScanError) -> Self {
        HostError::Scan(err)
    }
}

impl From<EvalError> for HostError {
    fn from(err: EvalError) -> Self {
        HostError::Eval(err)
    }
}

/// How a dialect run ended
#[derive(Debug, Clone, PartialEq)]
pub enum DialectOutcome {
    Accepted(Value),
    Rejected,
    /// Ran to the end without accepting or rejecting
    Completed(Value),
}

pub struct Interpreter {
    ctx: EvalContext,
    lib: Context,
    user: Context,
}

impl Interpreter {
    /// Interpreter with the standard natives and default settings
    pub fn new() -> Result<Self, HostError> {
        Self::with_config(EvalConfig::default())
    }

    pub fn with_config(config: EvalConfig) -> Result<Self, HostError> {
        Self::with_registry(config, &NativeRegistry::with_standard_natives())
    }

    pub fn with_registry(config: EvalConfig, registry: &NativeRegistry) -> Result<Self, HostError> {
        let lib = Context::new();
        registry.install(&lib)?;
        let user = lib.child();
        debug!(
            target: "reval::interpreter",
            max_depth = config.max_depth,
            poll_interval = config.poll_interval,
            natives = registry.len(),
            "interpreter ready"
        );
        Ok(Interpreter {
            ctx: EvalContext::new(config),
            lib,
            user,
        })
    }

    /// Scan and evaluate source text in the user context
    pub fn eval_text(&mut self, source: &str) -> Result<Value, HostError> {
        let items = scan(source)?;
        self.eval_array(items)
    }

    pub fn eval_array(&mut self, items: Vec<Value>) -> Result<Value, HostError> {
        let feed = FeedHandle::over(Rc::from(items), self.user.clone());
        self.run(&feed)
    }

    /// Evaluate a mix of code units, spliced values and source text as one feed
    pub fn eval_variadic(&mut self, items: Vec<FeedItem>) -> Result<Value, HostError> {
        let feed = FeedHandle::new(Feed::from_items(items, self.user.clone())?);
        self.run(&feed)
    }

    /// Evaluate source as a dialect body, intercepting `accept` and `reject`
    pub fn eval_dialect(&mut self, source: &str) -> Result<DialectOutcome, HostError> {
        let items = scan(source)?;
        let feed = FeedHandle::over(Rc::from(items), self.user.clone());
        let mut out = OutCell::new();
        match do_feed(&mut self.ctx, &feed, None, &mut out)? {
            Completion::Done => Ok(DialectOutcome::Completed(
                out.into_last().unwrap_or(Value::Void),
            )),
            Completion::Thrown(signal) => match &signal.label {
                SignalLabel::Dialect(label) if &**label == ACCEPT => {
                    Ok(DialectOutcome::Accepted(signal.payload))
                }
                SignalLabel::Dialect(label) if &**label == REJECT => Ok(DialectOutcome::Rejected),
                _ => Err(HostError::UnhandledSignal(signal)),
            },
        }
    }

    fn run(&mut self, feed: &FeedHandle) -> Result<Value, HostError> {
        let mut out = OutCell::new();
        let start = self.ctx.tick();
        let completion = do_feed(&mut self.ctx, feed, None, &mut out)?;
        debug!(
            target: "reval::interpreter",
            steps = self.ctx.tick() - start,
            "evaluation finished"
        );
        match completion {
            Completion::Done => Ok(out.into_last().unwrap_or(Value::Void)),
            Completion::Thrown(signal) => Err(HostError::UnhandledSignal(signal)),
        }
    }

    /// Add a native to the library context, replacing any of the same name
    pub fn register(&mut self, native: Box<dyn Native>) -> Result<(), HostError> {
        let native: Rc<dyn Native> = Rc::from(native);
        let name = native.name().to_string();
        let action = native_action(native)?;
        self.lib.define(&name, Value::Action(Rc::new(action)));
        Ok(())
    }

    /// Bind a user variable
    pub fn set(&mut self, name: &str, value: Value) {
        self.user.define(name, value);
    }

    /// Read a variable as user code would see it
    pub fn get(&self, name: &str) -> Option<Value> {
        self.user.lookup(name)
    }

    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.ctx.interrupt_handle()
    }

    pub fn set_poll_hook(&mut self, hook: PollHook) {
        self.ctx.set_poll_hook(hook);
    }

    pub fn config(&self) -> &EvalConfig {
        &self.ctx.config
    }

    pub fn user_context(&self) -> &Context {
        &self.user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::eval::ErrorKind;
    use crate::backend::natives::{Bounce, Call, NativeResult};

    struct DoubleOp;

    impl Native for DoubleOp {
        fn name(&self) -> &str {
            "double"
        }

        fn spec(&self) -> &str {
            "value [integer!]"
        }

        fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
            Ok(Bounce::Out(Value::Integer(call.integer(0)? * 2)))
        }
    }

    #[test]
    fn test_eval_text() {
        let mut interp = Interpreter::new().unwrap();
        assert_eq!(interp.eval_text("1 + 2 * 3").unwrap(), Value::Integer(9));
        assert_eq!(interp.eval_text("").unwrap(), Value::Void);
    }

    #[test]
    fn test_register_host_native() {
        let mut interp = Interpreter::new().unwrap();
        interp.register(Box::new(DoubleOp)).unwrap();
        assert_eq!(interp.eval_text("double 21").unwrap(), Value::Integer(42));
        let err = interp.eval_text(r#"double "x""#).unwrap_err();
        assert!(matches!(
            err,
            HostError::Eval(EvalError {
                kind: ErrorKind::WrongType { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_set_and_get() {
        let mut interp = Interpreter::new().unwrap();
        interp.set("n", Value::Integer(5));
        assert_eq!(interp.eval_text("n + 1").unwrap(), Value::Integer(6));
        interp.eval_text("m: n * 2").unwrap();
        assert_eq!(interp.get("m"), Some(Value::Integer(10)));
        assert_eq!(interp.get("nope"), None);
    }

    #[test]
    fn test_variadic_feed() {
        let mut interp = Interpreter::new().unwrap();
        let block = Value::block(vec![Value::Integer(1)]);
        let result = interp
            .eval_variadic(vec![
                FeedItem::Text("type-of".into()),
                FeedItem::Spliced(block),
            ])
            .unwrap();
        assert_eq!(result, Value::Datatype(crate::backend::models::Kind::Block));
    }

    #[test]
    fn test_unhandled_signal() {
        let mut interp = Interpreter::new().unwrap();
        let err = interp.eval_text("throw 1").unwrap_err();
        match err {
            HostError::UnhandledSignal(signal) => {
                assert_eq!(signal.label, SignalLabel::Throw(None));
                assert_eq!(signal.payload, Value::Integer(1));
            }
            other => panic!("expected unhandled signal, got {:?}", other),
        }
    }

    #[test]
    fn test_dialect_outcomes() {
        let mut interp = Interpreter::new().unwrap();
        assert_eq!(
            interp.eval_dialect("1 accept 2 3").unwrap(),
            DialectOutcome::Accepted(Value::Integer(2))
        );
        assert_eq!(
            interp.eval_dialect("if true [reject] 3").unwrap(),
            DialectOutcome::Rejected
        );
        assert_eq!(
            interp.eval_dialect("1 2").unwrap(),
            DialectOutcome::Completed(Value::Integer(2))
        );
    }
}
