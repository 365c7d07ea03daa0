//! Per-interpreter evaluation state: tick counter, interrupt poll, frame
//! identities and the live call stack.

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::errors::{ErrorKind, EvalError};
use super::feed::FeedHandle;
use super::frame::{Frame, FrameId};
use super::signal::{Completion, Signal};
use crate::backend::config::EvalConfig;

/// Callback run at every poll checkpoint with the current tick
pub type PollHook = Box<dyn FnMut(u64)>;

pub struct EvalContext {
    pub config: EvalConfig,
    tick: u64,
    countdown: u32,
    interrupt: Arc<AtomicBool>,
    next_id: u64,
    stack: Vec<(FrameId, Option<Rc<str>>)>,
    poll_hook: Option<PollHook>,
}

impl EvalContext {
    pub fn new(config: EvalConfig) -> Self {
        let countdown = config.poll_interval.max(1);
        EvalContext {
            config,
            tick: 0,
            countdown,
            interrupt: Arc::new(AtomicBool::new(false)),
            next_id: 1,
            stack: Vec::new(),
            poll_hook: None,
        }
    }

    /// Flag that, once set from any thread, halts evaluation at the next poll
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    pub fn set_poll_hook(&mut self, hook: PollHook) {
        self.poll_hook = Some(hook);
    }

    /// Number of evaluation steps started so far
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Labels of the named activations on the stack, innermost last
    pub fn backtrace(&self) -> Vec<Rc<str>> {
        self.stack
            .iter()
            .filter_map(|(_, label)| label.clone())
            .collect()
    }

    /// Countdown checkpoint run once per evaluation step
    pub(crate) fn poll(&mut self) -> Completion {
        self.tick += 1;
        self.countdown -= 1;
        if self.countdown > 0 {
            return Completion::Done;
        }
        self.countdown = self.config.poll_interval.max(1);
        if let Some(hook) = self.poll_hook.as_mut() {
            hook(self.tick);
        }
        if self.interrupt.swap(false, Ordering::SeqCst) {
            debug!(target: "reval::eval", tick = self.tick, "interrupt requested, halting");
            return Completion::Thrown(Signal::halt());
        }
        Completion::Done
    }

    fn enter(&mut self, label: Option<Rc<str>>) -> Result<FrameId, EvalError> {
        if self.stack.len() >= self.config.max_depth {
            return Err(EvalError::new(ErrorKind::StackOverflow(self.stack.len())));
        }
        let id = FrameId(self.next_id);
        self.next_id += 1;
        self.stack.push((id, label));
        Ok(id)
    }

    fn leave(&mut self, id: FrameId) {
        if let Some(pos) = self.stack.iter().rposition(|(frame, _)| *frame == id) {
            self.stack.truncate(pos);
        }
    }

    /// Push a frame over `feed`, run `body` with it, and pop it on every exit path
    pub fn with_frame<R>(
        &mut self,
        feed: &FeedHandle,
        parent: Option<FrameId>,
        label: Option<Rc<str>>,
        body: impl FnOnce(&mut EvalContext, &mut Frame) -> Result<R, EvalError>,
    ) -> Result<R, EvalError> {
        let id = self.enter(label.clone())?;
        let mut frame = Frame::new(id, parent, feed.clone());
        let result = body(self, &mut frame);
        self.leave(id);
        match (result, label) {
            (Err(err), Some(label)) => Err(err.in_action(&label)),
            (result, _) => result,
        }
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        EvalContext::new(EvalConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::environment::Context;

    fn empty_feed() -> FeedHandle {
        FeedHandle::over(Rc::from(vec![]), Context::new())
    }

    #[test]
    fn test_poll_raises_halt_once() {
        let mut ctx = EvalContext::new(EvalConfig {
            poll_interval: 1,
            ..EvalConfig::default()
        });
        assert_eq!(ctx.poll(), Completion::Done);
        ctx.interrupt_handle().store(true, Ordering::SeqCst);
        assert_eq!(ctx.poll(), Completion::Thrown(Signal::halt()));
        assert_eq!(ctx.poll(), Completion::Done);
    }

    #[test]
    fn test_poll_hook_runs_on_interval() {
        use std::cell::Cell;
        let seen = Rc::new(Cell::new(0));
        let counter = seen.clone();
        let mut ctx = EvalContext::new(EvalConfig {
            poll_interval: 4,
            ..EvalConfig::default()
        });
        ctx.set_poll_hook(Box::new(move |_| counter.set(counter.get() + 1)));
        for _ in 0..8 {
            let _ = ctx.poll();
        }
        assert_eq!(seen.get(), 2);
        assert_eq!(ctx.tick(), 8);
    }

    #[test]
    fn test_with_frame_pops_on_error() {
        let mut ctx = EvalContext::default();
        let feed = empty_feed();
        let result: Result<(), EvalError> =
            ctx.with_frame(&feed, None, Some(Rc::from("outer")), |ctx, _| {
                assert_eq!(ctx.depth(), 1);
                Err(EvalError::native("boom"))
            });
        assert_eq!(ctx.depth(), 0);
        assert_eq!(result.unwrap_err().label.as_deref(), Some("outer"));
    }

    #[test]
    fn test_depth_limit() {
        let mut ctx = EvalContext::new(EvalConfig {
            max_depth: 2,
            ..EvalConfig::default()
        });
        let feed = empty_feed();
        let result = ctx.with_frame(&feed, None, None, |ctx, _| {
            ctx.with_frame(&feed, None, None, |ctx, _| {
                ctx.with_frame(&feed, None, None, |_, _| Ok(()))
            })
        });
        assert!(matches!(
            result.unwrap_err().kind,
            ErrorKind::StackOverflow(2)
        ));
    }
}
