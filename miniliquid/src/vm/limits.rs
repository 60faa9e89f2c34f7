use std::cell::Cell;

use crate::error::{Error, ErrorKind};
use crate::value::{Value, ValueRepr};

/// Ceilings for the resource accounting of a render.
///
/// All limits are off by default.
///
/// ```
/// # use miniliquid::Limits;
/// let limits = Limits {
///     render_score_limit: Some(10_000),
///     ..Limits::default()
/// };
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of bytes a render may produce.
    pub render_length_limit: Option<usize>,
    /// Maximum number of nodes a render may visit.
    pub render_score_limit: Option<usize>,
    /// Maximum size of all assigned and captured values.
    pub assign_score_limit: Option<usize>,
}

/// Helper for tracking resource consumption during a render.
///
/// The tracker is shared between a context and all of its sub contexts so
/// that nested renders count against the same budget.
#[derive(Debug, Default)]
pub struct ResourceLimits {
    limits: Limits,
    render_score: Cell<usize>,
    assign_score: Cell<usize>,
    last_capture_length: Cell<Option<usize>>,
    reached: Cell<bool>,
}

impl ResourceLimits {
    /// Creates a new tracker for the given ceilings.
    pub fn new(limits: Limits) -> ResourceLimits {
        ResourceLimits {
            limits,
            ..ResourceLimits::default()
        }
    }

    /// The configured ceilings.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Accounts for rendering `amount` nodes.
    pub fn increment_render_score(&self, amount: usize) -> Result<(), Error> {
        let score = self.render_score.get() + amount;
        self.render_score.set(score);
        if self.limits.render_score_limit.map_or(false, |limit| score > limit) {
            return Err(self.limits_reached());
        }
        Ok(())
    }

    /// Accounts for assigning or capturing a value of the given size.
    pub fn increment_assign_score(&self, amount: usize) -> Result<(), Error> {
        let score = self.assign_score.get() + amount;
        self.assign_score.set(score);
        if self.limits.assign_score_limit.map_or(false, |limit| score > limit) {
            return Err(self.limits_reached());
        }
        Ok(())
    }

    /// Accounts for the output written so far.
    ///
    /// Inside a capture the growth of the captured buffer counts against the
    /// assign score, otherwise the output length is checked against the
    /// render length limit.
    pub fn increment_write_score(&self, output_len: usize) -> Result<(), Error> {
        if let Some(last) = self.last_capture_length.get() {
            self.last_capture_length.set(Some(output_len));
            self.increment_assign_score(output_len.saturating_sub(last))
        } else if self
            .limits
            .render_length_limit
            .map_or(false, |limit| output_len > limit)
        {
            Err(self.limits_reached())
        } else {
            Ok(())
        }
    }

    /// Runs `f` while the write score is routed into the assign score.
    pub fn with_capture<R, F: FnOnce() -> R>(&self, f: F) -> R {
        let old = self.last_capture_length.replace(Some(0));
        let rv = f();
        self.last_capture_length.set(old);
        rv
    }

    /// Resets all scores.  This happens at the start of every render.
    pub fn reset(&self) {
        self.render_score.set(0);
        self.assign_score.set(0);
        self.last_capture_length.set(None);
        self.reached.set(false);
    }

    /// Was a limit exceeded?
    pub fn reached(&self) -> bool {
        self.reached.get()
    }

    /// The current render score.
    pub fn render_score(&self) -> usize {
        self.render_score.get()
    }

    /// The current assign score.
    pub fn assign_score(&self) -> usize {
        self.assign_score.get()
    }

    fn limits_reached(&self) -> Error {
        self.reached.set(true);
        log::warn!(
            "resource limits exceeded (render score {}, assign score {})",
            self.render_score.get(),
            self.assign_score.get()
        );
        Error::from(ErrorKind::Memory)
    }
}

/// Computes how much an assigned value counts against the assign score.
pub fn assign_score_of(value: &Value) -> usize {
    match value.0 {
        ValueRepr::String(ref s) => s.len(),
        ValueRepr::Array(ref items) => 1 + items.iter().map(assign_score_of).sum::<usize>(),
        ValueRepr::Hash(ref map, _) => map
            .iter()
            .map(|(k, v)| k.len() + assign_score_of(v))
            .sum(),
        _ => 1,
    }
}
