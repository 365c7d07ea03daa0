//! Feed: the pull-based source of code units for evaluation.
//!
//! A feed walks either a fixed array (block or group body) or a queue built
//! from host-supplied items. It keeps the unit consumed last as one-step
//! lookback, carries the binding context used to resolve words, and holds
//! the two one-bit states the lookahead logic coordinates through:
//! `no_lookahead` and `deferring`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::backend::environment::Context;
use crate::backend::models::{Array, Value};
use crate::scanner::{scan, ScanError};

use super::errors::{ErrorKind, EvalError};

/// One element of a variadic host feed
#[derive(Debug, Clone)]
pub enum FeedItem {
    /// A code unit, evaluated normally
    Code(Value),
    /// An already computed value; evaluates to itself whatever its kind
    Spliced(Value),
    /// Source text, scanned into code units on its own, so brackets must
    /// balance within the item
    Text(String),
}

#[derive(Debug)]
enum Source {
    Array { array: Array, index: usize },
    Queue(VecDeque<Value>),
}

#[derive(Debug)]
pub struct Feed {
    source: Source,
    lookback: Option<Value>,
    env: Context,
    no_lookahead: bool,
    deferring: bool,
}

impl Feed {
    pub fn from_array(array: Array, env: Context) -> Self {
        Feed {
            source: Source::Array { array, index: 0 },
            lookback: None,
            env,
            no_lookahead: false,
            deferring: false,
        }
    }

    pub fn from_items(items: Vec<FeedItem>, env: Context) -> Result<Self, ScanError> {
        let mut queue = VecDeque::new();
        for item in items {
            match item {
                FeedItem::Code(value) => queue.push_back(value),
                FeedItem::Spliced(value) => queue.push_back(value.quoted_if_needed()),
                FeedItem::Text(text) => queue.extend(scan(&text)?),
            }
        }
        Ok(Feed {
            source: Source::Queue(queue),
            lookback: None,
            env,
            no_lookahead: false,
            deferring: false,
        })
    }

    /// Current unit, or `None` at End
    pub fn peek(&self) -> Option<&Value> {
        match &self.source {
            Source::Array { array, index } => array.get(*index),
            Source::Queue(queue) => queue.front(),
        }
    }

    /// The unit after the current one
    pub fn peek_next(&self) -> Option<&Value> {
        match &self.source {
            Source::Array { array, index } => array.get(index + 1),
            Source::Queue(queue) => queue.get(1),
        }
    }

    /// Consume the current unit, keeping it as lookback
    pub fn advance(&mut self) -> Option<Value> {
        let unit = match &mut self.source {
            Source::Array { array, index } => {
                let unit = array.get(*index).cloned();
                if unit.is_some() {
                    *index += 1;
                }
                unit
            }
            Source::Queue(queue) => queue.pop_front(),
        };
        if unit.is_some() {
            self.lookback = unit.clone();
        }
        unit
    }

    pub fn lookback(&self) -> Option<&Value> {
        self.lookback.as_ref()
    }

    pub fn is_end(&self) -> bool {
        self.peek().is_none()
    }

    pub fn at_barrier(&self) -> bool {
        matches!(self.peek(), Some(Value::Comma))
    }

    pub fn env(&self) -> &Context {
        &self.env
    }

    /// Fetch the value bound to `name`
    pub fn resolve(&self, name: &str) -> Result<Value, EvalError> {
        match self.env.lookup(name) {
            None => Err(EvalError::new(ErrorKind::UnboundName(name.to_string()))),
            Some(Value::Void) => Err(EvalError::new(ErrorKind::VoidRead(name.to_string()))),
            Some(value) => Ok(value),
        }
    }

    /// Fetch for get-words: the void placeholder may be read
    pub fn resolve_get(&self, name: &str) -> Result<Value, EvalError> {
        self.env
            .lookup(name)
            .ok_or_else(|| EvalError::new(ErrorKind::UnboundName(name.to_string())))
    }
}

/// Shared handle to a feed
///
/// Frames evaluating the same stream share one feed; a varargs value keeps a
/// handle so it can pull after the call that created it has returned.
#[derive(Debug, Clone)]
pub struct FeedHandle(Rc<RefCell<Feed>>);

impl FeedHandle {
    pub fn new(feed: Feed) -> Self {
        FeedHandle(Rc::new(RefCell::new(feed)))
    }

    pub fn over(array: Array, env: Context) -> Self {
        FeedHandle::new(Feed::from_array(array, env))
    }

    pub fn peek(&self) -> Option<Value> {
        self.0.borrow().peek().cloned()
    }

    pub fn peek_next(&self) -> Option<Value> {
        self.0.borrow().peek_next().cloned()
    }

    pub fn advance(&self) -> Option<Value> {
        self.0.borrow_mut().advance()
    }

    pub fn lookback(&self) -> Option<Value> {
        self.0.borrow().lookback().cloned()
    }

    pub fn is_end(&self) -> bool {
        self.0.borrow().is_end()
    }

    pub fn at_barrier(&self) -> bool {
        self.0.borrow().at_barrier()
    }

    /// End of input for argument gathering: End or a barrier
    pub fn at_arg_end(&self) -> bool {
        let feed = self.0.borrow();
        feed.is_end() || feed.at_barrier()
    }

    pub fn env(&self) -> Context {
        self.0.borrow().env().clone()
    }

    pub fn resolve(&self, name: &str) -> Result<Value, EvalError> {
        self.0.borrow().resolve(name)
    }

    pub fn resolve_get(&self, name: &str) -> Result<Value, EvalError> {
        self.0.borrow().resolve_get(name)
    }

    /// Binding lookup that never fails, used by lookahead
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.0.borrow().env().lookup(name)
    }

    pub fn set_no_lookahead(&self) {
        self.0.borrow_mut().no_lookahead = true;
    }

    /// Consume the one-shot no-lookahead request
    pub fn take_no_lookahead(&self) -> bool {
        std::mem::take(&mut self.0.borrow_mut().no_lookahead)
    }

    pub fn is_deferring(&self) -> bool {
        self.0.borrow().deferring
    }

    pub fn set_deferring(&self, deferring: bool) {
        self.0.borrow_mut().deferring = deferring;
    }

    pub fn ptr_eq(&self, other: &FeedHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_of(text: &str) -> FeedHandle {
        let items = scan(text).unwrap();
        FeedHandle::over(Rc::from(items), Context::new())
    }

    #[test]
    fn test_advance_keeps_lookback() {
        let feed = feed_of("a b");
        assert_eq!(feed.peek(), Some(Value::word("a")));
        assert_eq!(feed.peek_next(), Some(Value::word("b")));
        assert_eq!(feed.lookback(), None);
        assert_eq!(feed.advance(), Some(Value::word("a")));
        assert_eq!(feed.lookback(), Some(Value::word("a")));
        assert_eq!(feed.advance(), Some(Value::word("b")));
        assert!(feed.is_end());
        assert_eq!(feed.advance(), None);
        assert_eq!(feed.lookback(), Some(Value::word("b")));
    }

    #[test]
    fn test_barrier_is_arg_end() {
        let feed = feed_of(", x");
        assert!(feed.at_barrier());
        assert!(feed.at_arg_end());
        assert!(!feed.is_end());
    }

    #[test]
    fn test_resolve_errors() {
        let env = Context::new();
        env.define("v", Value::Void);
        env.define("n", Value::Integer(3));
        let feed = Feed::from_array(Rc::from(vec![]), env);
        assert_eq!(feed.resolve("n"), Ok(Value::Integer(3)));
        assert!(matches!(
            feed.resolve("missing").unwrap_err().kind,
            ErrorKind::UnboundName(_)
        ));
        assert!(matches!(feed.resolve("v").unwrap_err().kind, ErrorKind::VoidRead(_)));
        assert_eq!(feed.resolve_get("v"), Ok(Value::Void));
    }

    #[test]
    fn test_variadic_items_wrap_spliced_values() {
        let items = vec![
            FeedItem::Text("print".into()),
            FeedItem::Spliced(Value::word("raw")),
            FeedItem::Code(Value::Integer(1)),
        ];
        let mut feed = Feed::from_items(items, Context::new()).unwrap();
        assert_eq!(feed.advance(), Some(Value::word("print")));
        assert_eq!(
            feed.advance(),
            Some(Value::Quoted(Box::new(Value::word("raw"))))
        );
        assert_eq!(feed.advance(), Some(Value::Integer(1)));
        assert!(feed.is_end());
    }

    #[test]
    fn test_no_lookahead_is_one_shot() {
        let feed = feed_of("1");
        feed.set_no_lookahead();
        assert!(feed.take_no_lookahead());
        assert!(!feed.take_no_lookahead());
    }
}
