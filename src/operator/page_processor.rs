//! Resumable page processor.
//!
//! [`PageProcessor::process`] returns a [`ProjectedPages`] cursor that owns the
//! input page, the next input position and the partially filled output
//! builders. Each `next()` call resumes exactly where the previous one
//! stopped, so a yield never duplicates or drops a row.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::block::{Page, PageBuilder};
use crate::error::{Result, StrataError};
use crate::expression::CompiledProjectionSet;
use crate::memory::LocalMemoryContext;
use crate::types::DataType;

use super::{DriverYieldSignal, ProcessorConfig};

/// Applies a compiled projection set to input pages.
///
/// Cloning is cheap and yields an independent processor over the same
/// compiled evaluators.
#[derive(Debug, Clone)]
pub struct PageProcessor {
    projections: Arc<CompiledProjectionSet>,
    config: ProcessorConfig,
}

impl PageProcessor {
    /// Creates a processor for `projections`.
    #[must_use]
    pub fn new(projections: Arc<CompiledProjectionSet>, config: ProcessorConfig) -> Self {
        PageProcessor { projections, config }
    }

    #[must_use]
    pub fn projections(&self) -> &CompiledProjectionSet {
        &self.projections
    }

    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Returns the types of the produced output channels.
    #[must_use]
    pub fn output_types(&self) -> &[DataType] {
        self.projections.output_types()
    }

    /// Starts processing `page`.
    ///
    /// Nothing happens until the returned cursor is advanced. The cursor
    /// reports its builder size to `memory_context` and releases it when done.
    #[must_use]
    pub fn process(
        &self,
        yield_signal: DriverYieldSignal,
        memory_context: LocalMemoryContext,
        page: Page,
    ) -> ProjectedPages {
        ProjectedPages {
            // Builders grow on demand so the reported bytes follow the rows written.
            output: PageBuilder::new(self.projections.output_types(), 0),
            projections: Arc::clone(&self.projections),
            config: self.config,
            yield_signal,
            memory_context,
            page,
            position: 0,
            rows_since_yield_check: 0,
            state: ProcessorState::Ready,
        }
    }
}

/// Lifecycle of one in-flight page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    /// Created, no row processed yet.
    Ready,
    /// Inside a `next()` call.
    Processing,
    /// Returned early because the yield signal was set; resumable.
    Suspended,
    /// Every input position was processed and all output returned.
    Done,
    /// An error was returned; the page must be abandoned.
    Failed,
}

enum Step {
    Output(Page),
    Yielded,
    Finished,
}

/// Resumable cursor over the output pages of one input page.
///
/// Each item is one external invocation: `Ok(Some(page))` carries an output
/// page, `Ok(None)` is a yield with no rows completed since the last output.
/// Iteration ends when the page is done, or after the first error.
#[derive(Debug)]
pub struct ProjectedPages {
    projections: Arc<CompiledProjectionSet>,
    config: ProcessorConfig,
    yield_signal: DriverYieldSignal,
    memory_context: LocalMemoryContext,
    page: Page,
    position: usize,
    rows_since_yield_check: usize,
    output: PageBuilder,
    state: ProcessorState,
}

impl ProjectedPages {
    #[must_use]
    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// Returns the next input position to be processed.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns the number of positions of the input page.
    #[must_use]
    pub fn input_positions(&self) -> usize {
        self.page.position_count()
    }

    /// Returns true once no further output will be produced.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, ProcessorState::Done | ProcessorState::Failed)
    }

    fn advance(&mut self) -> Result<Step> {
        let total = self.page.position_count();
        let interval = self.config.yield_check_interval.max(1);
        while self.position < total {
            if self.rows_since_yield_check >= interval {
                self.rows_since_yield_check = 0;
                if self.yield_signal.is_set() {
                    self.state = ProcessorState::Suspended;
                    debug!(
                        position = self.position,
                        pending = self.output.position_count(),
                        "yield requested, suspending"
                    );
                    if self.output.is_empty() {
                        return Ok(Step::Yielded);
                    }
                    return self.flush().map(Step::Output);
                }
            }

            let position = self.position;
            self.position += 1;
            self.rows_since_yield_check += 1;
            if self.projections.project_position(&self.page, position, &mut self.output)? {
                if let Some(page) = self.account_row()? {
                    return Ok(Step::Output(page));
                }
            }
        }

        let step = if self.output.is_empty() {
            Step::Finished
        } else {
            Step::Output(self.flush()?)
        };
        self.state = ProcessorState::Done;
        self.memory_context.set_bytes(0);
        debug!(positions = total, "page processed");
        Ok(step)
    }

    /// Reports the builder size after a row and flushes when a budget is reached.
    fn account_row(&mut self) -> Result<Option<Page>> {
        let retained = self.output.retained_size_in_bytes();
        let rows = self.output.position_count();
        let bytes = u64::try_from(retained).unwrap_or(u64::MAX);
        if let Err(err) = self.memory_context.try_set_bytes(bytes) {
            if rows <= 1 {
                return Err(err);
            }
            debug!(rows, bytes, "memory limit reached, flushing output page");
            return self.flush().map(Some);
        }
        if rows >= self.config.max_page_positions || retained >= self.config.max_page_size_bytes {
            return self.flush().map(Some);
        }
        Ok(None)
    }

    fn flush(&mut self) -> Result<Page> {
        let page = self.output.take_page()?;
        self.memory_context.set_bytes(0);
        trace!(
            positions = page.position_count(),
            bytes = page.size_in_bytes(),
            "flushed output page"
        );
        Ok(page)
    }

    fn fail(&mut self, err: StrataError) -> StrataError {
        self.state = ProcessorState::Failed;
        self.memory_context.set_bytes(0);
        debug!(position = self.position, error = %err, "page processing failed");
        err
    }
}

impl Iterator for ProjectedPages {
    type Item = Result<Option<Page>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            ProcessorState::Done | ProcessorState::Failed => return None,
            ProcessorState::Ready => {
                if let Err(err) = self.projections.validate_page(&self.page) {
                    return Some(Err(self.fail(err)));
                }
            }
            ProcessorState::Processing | ProcessorState::Suspended => {}
        }
        self.state = ProcessorState::Processing;
        match self.advance() {
            Ok(Step::Output(page)) => Some(Ok(Some(page))),
            Ok(Step::Yielded) => Some(Ok(None)),
            Ok(Step::Finished) => None,
            Err(err) => Some(Err(self.fail(err))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use crate::expression::{ExpressionCompiler, RowExpression};
    use crate::memory::AggregatedMemoryContext;
    use crate::types::Value;

    fn identity_processor(config: ProcessorConfig) -> PageProcessor {
        ExpressionCompiler::default()
            .compile_page_processor(None, &[RowExpression::field(0, DataType::Bigint)], config)
            .unwrap()
    }

    fn bigint_page(count: i64) -> Page {
        let values: Vec<Value> = (0..count).map(Value::Bigint).collect();
        Page::new(vec![Block::from_values(&DataType::Bigint, &values).unwrap()]).unwrap()
    }

    fn collect_longs(pages: &[Page]) -> Vec<i64> {
        pages
            .iter()
            .flat_map(|page| {
                let block = page.block(0).unwrap();
                (0..page.position_count()).map(|p| block.get_long(p).unwrap()).collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn test_page_cap_splits_output() {
        let processor = identity_processor(ProcessorConfig::new().with_max_page_positions(4));
        let root = AggregatedMemoryContext::new_root("test");
        let pages: Vec<Page> = processor
            .process(DriverYieldSignal::new(), root.new_local("p"), bigint_page(10))
            .map(|step| step.unwrap().unwrap())
            .collect();
        let sizes: Vec<usize> = pages.iter().map(Page::position_count).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(collect_longs(&pages), (0..10).collect::<Vec<_>>());
        assert_eq!(root.bytes(), 0);
    }

    #[test]
    fn test_yield_suspends_and_resumes() {
        let processor = identity_processor(ProcessorConfig::new().with_yield_check_interval(3));
        let root = AggregatedMemoryContext::new_root("test");
        let signal = DriverYieldSignal::new();
        signal.set();
        let mut projected = processor.process(signal.clone(), root.new_local("p"), bigint_page(7));

        let first = projected.next().unwrap().unwrap().unwrap();
        assert_eq!(first.position_count(), 3);
        assert_eq!(projected.state(), ProcessorState::Suspended);
        assert_eq!(projected.position(), 3);

        signal.reset();
        let rest = projected.next().unwrap().unwrap().unwrap();
        assert_eq!(collect_longs(&[first, rest]), (0..7).collect::<Vec<_>>());
        assert_eq!(projected.state(), ProcessorState::Done);
        assert!(projected.next().is_none());
    }

    #[test]
    fn test_empty_page_finishes_immediately() {
        let processor = identity_processor(ProcessorConfig::default());
        let root = AggregatedMemoryContext::new_root("test");
        let mut projected = processor.process(DriverYieldSignal::new(), root.new_local("p"), bigint_page(0));
        assert!(projected.next().is_none());
        assert_eq!(projected.state(), ProcessorState::Done);
    }

    #[test]
    fn test_invalid_page_fails() {
        let processor = identity_processor(ProcessorConfig::default());
        let root = AggregatedMemoryContext::new_root("test");
        let text = Block::from_values(&DataType::Varchar, &[Value::Varchar("x".into())]).unwrap();
        let mut projected = processor.process(
            DriverYieldSignal::new(),
            root.new_local("p"),
            Page::new(vec![text]).unwrap(),
        );
        assert!(matches!(projected.next(), Some(Err(StrataError::InvalidPage(_)))));
        assert_eq!(projected.state(), ProcessorState::Failed);
        assert!(projected.next().is_none());
    }

    #[test]
    fn test_byte_budget_splits_output() {
        let processor = ExpressionCompiler::default()
            .compile_page_processor(
                None,
                &[RowExpression::field(0, DataType::Varchar)],
                ProcessorConfig::new().with_max_page_size_bytes(64),
            )
            .unwrap();
        let names: Vec<Value> = (0..100).map(|i| Value::Varchar(format!("row-{i:02}"))).collect();
        let page = Page::new(vec![Block::from_values(&DataType::Varchar, &names).unwrap()]).unwrap();
        let root = AggregatedMemoryContext::new_root("test");

        let pages: Vec<Page> = processor
            .process(DriverYieldSignal::new(), root.new_local("p"), page)
            .map(|step| step.unwrap().unwrap())
            .collect();

        // Six rows write 36 text bytes and seven 4-byte offsets: exactly 64.
        let sizes: Vec<usize> = pages.iter().map(Page::position_count).collect();
        assert_eq!(sizes.len(), 17);
        assert!(sizes[..16].iter().all(|&rows| rows == 6));
        assert_eq!(sizes[16], 4);

        let emitted: Vec<Value> = pages
            .iter()
            .flat_map(|page| {
                let block = page.block(0).unwrap();
                (0..page.position_count()).map(|p| block.get_value(p).unwrap()).collect::<Vec<_>>()
            })
            .collect();
        assert_eq!(emitted, names);
        assert_eq!(root.bytes(), 0);
    }

    #[test]
    fn test_memory_limit_forces_flush() {
        let processor = identity_processor(ProcessorConfig::default());
        let root = AggregatedMemoryContext::new_root_with_limit("test", 64);
        let mut projected = processor.process(DriverYieldSignal::new(), root.new_local("p"), bigint_page(100));
        let mut pages = Vec::new();
        for step in projected.by_ref() {
            pages.push(step.unwrap().unwrap());
        }
        assert!(pages.len() > 1);
        assert_eq!(collect_longs(&pages), (0..100).collect::<Vec<_>>());
        assert_eq!(root.bytes(), 0);
    }
}
