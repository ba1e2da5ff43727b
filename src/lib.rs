//! strata - vectorized columnar expression evaluation
//!
//! Compiles typed row expressions into per-row evaluators and applies them to
//! columnar pages through a resumable processor that honors a cooperative
//! yield signal and a hierarchical memory budget.
//!
//! ```no_run
//! use strata::{
//!     AggregatedMemoryContext, DataType, Driver, ExpressionCompiler, ProcessorConfig,
//!     RowExpression, Value,
//! };
//!
//! # fn main() -> strata::Result<()> {
//! let join = RowExpression::call(
//!     "array_join",
//!     DataType::Varchar,
//!     vec![
//!         RowExpression::field(0, DataType::array(DataType::Bigint)),
//!         RowExpression::constant(Value::Varchar(",".into()), DataType::Varchar),
//!     ],
//! );
//! let processor = ExpressionCompiler::default()
//!     .compile_page_processor(None, &[join], ProcessorConfig::default())?;
//! let mut driver = Driver::new(processor, AggregatedMemoryContext::new_root("query"));
//! # let page = strata::Page::with_position_count(0, vec![strata::Block::from_values(&DataType::array(DataType::Bigint), &[])?])?;
//! let mut progress = driver.run(page)?;
//! while !progress.is_finished() {
//!     // The scheduler may run other drivers here, or call `driver.cancel()`.
//!     progress = driver.process()?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod block;
pub mod error;
pub mod expression;
pub mod function;
pub mod memory;
pub mod operator;
pub mod types;

pub use block::{Block, BlockBuilder, Datum, Page, PageBuilder};
pub use error::{Result, StrataError};
pub use expression::{CompiledProjectionSet, ExpressionCompiler, FunctionKind, RowExpression, Signature};
pub use function::{FunctionRegistry, FunctionResolver};
pub use memory::{AggregatedMemoryContext, LocalMemoryContext};
pub use operator::{
    project_pages_parallel, Driver, DriverProgress, DriverYieldSignal, PageProcessor, ProcessorConfig,
    ProcessorState, ProjectedPages,
};
pub use types::{DataType, Value};
