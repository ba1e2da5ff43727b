//! Drivers feed pages through a page processor on behalf of a scheduler.
//!
//! A driver never clears its yield signal. When the signal is set the
//! in-flight page stays parked in the driver; the scheduler decides whether
//! to resume it with [`Driver::process`] or drop it with [`Driver::cancel`].

use rayon::prelude::*;
use tracing::debug;

use crate::block::Page;
use crate::error::{Result, StrataError};
use crate::memory::AggregatedMemoryContext;

use super::{DriverYieldSignal, PageProcessor, ProcessorState, ProjectedPages};

/// Outcome of one [`Driver::process`] call.
#[derive(Debug)]
pub enum DriverProgress {
    /// The yield signal stopped processing; the page is still in flight.
    Yielded(Vec<Page>),
    /// The page was fully processed.
    Finished(Vec<Page>),
}

impl DriverProgress {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, DriverProgress::Finished(_))
    }

    /// Returns the output pages produced by the call.
    #[must_use]
    pub fn pages(&self) -> &[Page] {
        match self {
            DriverProgress::Yielded(pages) | DriverProgress::Finished(pages) => pages,
        }
    }

    #[must_use]
    pub fn into_pages(self) -> Vec<Page> {
        match self {
            DriverProgress::Yielded(pages) | DriverProgress::Finished(pages) => pages,
        }
    }
}

/// Single-owner worker: one processor, one yield signal, one memory subtree,
/// at most one page in flight.
#[derive(Debug)]
pub struct Driver {
    processor: PageProcessor,
    yield_signal: DriverYieldSignal,
    memory_context: AggregatedMemoryContext,
    in_flight: Option<ProjectedPages>,
}

impl Driver {
    /// Creates a driver with a fresh yield signal.
    #[must_use]
    pub fn new(processor: PageProcessor, memory_context: AggregatedMemoryContext) -> Self {
        Self::with_yield_signal(processor, memory_context, DriverYieldSignal::new())
    }

    /// Creates a driver polling a scheduler-owned yield signal.
    #[must_use]
    pub fn with_yield_signal(
        processor: PageProcessor,
        memory_context: AggregatedMemoryContext,
        yield_signal: DriverYieldSignal,
    ) -> Self {
        Driver {
            processor,
            yield_signal,
            memory_context,
            in_flight: None,
        }
    }

    /// Returns a handle to the driver's yield signal.
    #[must_use]
    pub fn yield_signal(&self) -> DriverYieldSignal {
        self.yield_signal.clone()
    }

    #[must_use]
    pub fn memory_context(&self) -> &AggregatedMemoryContext {
        &self.memory_context
    }

    /// Returns true when no page is in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none()
    }

    /// Hands `page` to the driver without processing it.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if a page is already in flight.
    pub fn add_page(&mut self, page: Page) -> Result<()> {
        if self.in_flight.is_some() {
            return Err(StrataError::ProtocolViolation(
                "add_page called while a page is in flight".into(),
            ));
        }
        self.in_flight = Some(self.processor.process(
            self.yield_signal.clone(),
            self.memory_context.new_local("page_processor"),
            page,
        ));
        Ok(())
    }

    /// Advances the in-flight page until it finishes or the yield signal stops it.
    ///
    /// With no page in flight this returns `Finished` with no output.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the processor; the page is dropped
    /// and its memory released.
    pub fn process(&mut self) -> Result<DriverProgress> {
        let Some(projected) = self.in_flight.as_mut() else {
            return Ok(DriverProgress::Finished(Vec::new()));
        };
        let mut output = Vec::new();
        while let Some(step) = projected.next() {
            match step {
                Ok(Some(page)) => output.push(page),
                Ok(None) => {}
                Err(err) => {
                    self.in_flight = None;
                    return Err(err);
                }
            }
            if projected.state() == ProcessorState::Suspended {
                debug!(
                    memory_context = self.memory_context.name(),
                    position = ProjectedPages::position(projected),
                    output_pages = output.len(),
                    "driver yielded"
                );
                return Ok(DriverProgress::Yielded(output));
            }
        }
        debug!(
            memory_context = self.memory_context.name(),
            input_positions = projected.input_positions(),
            output_pages = output.len(),
            "driver finished page"
        );
        self.in_flight = None;
        Ok(DriverProgress::Finished(output))
    }

    /// Adds `page` and processes it until it finishes or the yield signal stops it.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if a page is already in flight, otherwise
    /// the first processor error.
    pub fn run(&mut self, page: Page) -> Result<DriverProgress> {
        self.add_page(page)?;
        self.process()
    }

    /// Processes `page` to completion, resuming after every yield.
    ///
    /// The yield signal is left as the scheduler set it; each resumed call
    /// still advances by at least one yield check interval.
    ///
    /// # Errors
    ///
    /// Returns the first processor error; partial output is discarded.
    pub fn run_to_completion(&mut self, page: Page) -> Result<Vec<Page>> {
        self.add_page(page)?;
        let mut output = Vec::new();
        loop {
            match self.process()? {
                DriverProgress::Yielded(pages) => output.extend(pages),
                DriverProgress::Finished(pages) => {
                    output.extend(pages);
                    return Ok(output);
                }
            }
        }
    }

    /// Drops the in-flight page, releasing its memory. Output already
    /// returned stays with the caller.
    pub fn cancel(&mut self) {
        if let Some(projected) = self.in_flight.take() {
            debug!(
                memory_context = self.memory_context.name(),
                position = projected.position(),
                "driver cancelled page"
            );
        }
    }
}

/// Projects many pages in parallel, one independent driver per page.
///
/// Each driver gets its own yield signal and a child of `memory_context`;
/// only the compiled evaluators are shared. Results keep the order of `pages`.
///
/// # Errors
///
/// Returns an error if any page fails.
pub fn project_pages_parallel(
    processor: &PageProcessor,
    memory_context: &AggregatedMemoryContext,
    pages: Vec<Page>,
) -> Result<Vec<Vec<Page>>> {
    pages
        .into_par_iter()
        .enumerate()
        .map(|(index, page)| {
            let mut driver = Driver::new(processor.clone(), memory_context.new_child(format!("driver-{index}")));
            driver.run_to_completion(page)
        })
        .collect()
}
