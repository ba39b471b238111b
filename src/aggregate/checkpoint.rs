use crate::message::Message;
use crate::update::UpdateRecord;

use super::{AggregateOptions, Fold};

/// Aggregates a growing log by folding only the records appended since the
/// previous call. Produces exactly what [`super::aggregate_with`] would for
/// the same log.
#[derive(Clone, Debug)]
pub struct IncrementalAggregator {
    options: AggregateOptions,
    fold: Fold,
    consumed: usize,
    last: Option<UpdateRecord>,
}

impl IncrementalAggregator {
    pub fn new(options: AggregateOptions) -> Self {
        Self {
            options,
            fold: Fold::new(options),
            consumed: 0,
            last: None,
        }
    }

    /// Number of log records already folded.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Messages that can no longer change.
    pub fn closed_messages(&self) -> &[Message] {
        self.fold.closed()
    }

    pub fn reset(&mut self) {
        self.fold = Fold::new(self.options);
        self.consumed = 0;
        self.last = None;
    }

    /// Folds `log[consumed..]` and returns the full message list. The
    /// checkpoint is keyed on the last consumed record: a log that shrank, or
    /// whose record at that position differs, is a different log and the fold
    /// restarts.
    pub fn sync(&mut self, log: &[UpdateRecord]) -> Vec<Message> {
        if !self.continues(log) {
            tracing::debug!(
                consumed = self.consumed,
                len = log.len(),
                "update log replaced; recomputing from scratch"
            );
            self.reset();
        }
        for record in &log[self.consumed..] {
            self.fold.apply(record);
        }
        self.consumed = log.len();
        self.last = log.last().cloned();
        self.fold.snapshot()
    }

    fn continues(&self, log: &[UpdateRecord]) -> bool {
        match self.consumed.checked_sub(1) {
            None => true,
            Some(idx) => log.get(idx) == self.last.as_ref(),
        }
    }
}

impl Default for IncrementalAggregator {
    fn default() -> Self {
        Self::new(AggregateOptions::default())
    }
}
