//! Expression compiler.

use std::sync::Arc;

use tracing::{debug, instrument, trace};

use crate::block::{Datum, Page, PageBuilder};
use crate::error::{Result, StrataError};
use crate::function::{FunctionRegistry, FunctionResolver};
use crate::operator::{PageProcessor, ProcessorConfig};
use crate::types::{DataType, Value};

use super::evaluator::{call_evaluator, ConstantEvaluator, InputReferenceEvaluator, RowEvaluator};
use super::RowExpression;

/// Input channel types seen by a compilation.
///
/// A declared layout is fixed up front; an inferred one grows as input
/// references are compiled.
struct InputLayout {
    types: Vec<Option<DataType>>,
    declared: bool,
}

impl InputLayout {
    fn declared(types: &[DataType]) -> Self {
        InputLayout {
            types: types.iter().cloned().map(Some).collect(),
            declared: true,
        }
    }

    fn inferred() -> Self {
        InputLayout {
            types: Vec::new(),
            declared: false,
        }
    }

    fn bind(&mut self, channel: usize, data_type: &DataType) -> Result<()> {
        if channel >= self.types.len() {
            if self.declared {
                return Err(StrataError::InvalidExpression(format!(
                    "input channel {channel} is outside the {}-channel input",
                    self.types.len()
                )));
            }
            self.types.resize(channel + 1, None);
        }
        match &self.types[channel] {
            Some(existing) if existing != data_type => Err(StrataError::type_mismatch(
                format!("{existing} for channel {channel}"),
                data_type,
            )),
            Some(_) => Ok(()),
            None => {
                self.types[channel] = Some(data_type.clone());
                Ok(())
            }
        }
    }
}

/// Compiles row expressions into evaluators bound to resolved functions.
///
/// The compiler holds no state besides its resolver: compiling the same
/// expressions twice yields evaluators that behave identically.
#[derive(Clone)]
pub struct ExpressionCompiler {
    resolver: Arc<dyn FunctionResolver>,
}

impl std::fmt::Debug for ExpressionCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionCompiler").finish_non_exhaustive()
    }
}

impl Default for ExpressionCompiler {
    fn default() -> Self {
        Self::new(Arc::new(FunctionRegistry::with_builtins()))
    }
}

impl ExpressionCompiler {
    /// Creates a compiler that resolves calls through `resolver`.
    #[must_use]
    pub fn new(resolver: Arc<dyn FunctionResolver>) -> Self {
        ExpressionCompiler { resolver }
    }

    /// Compiles projections, inferring the input layout from their input references.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedSignature`, `TypeMismatch` or `InvalidExpression`;
    /// nothing is compiled if any projection fails.
    #[instrument(name = "expression::compile", level = "debug", skip(self, projections), fields(projections = projections.len()))]
    pub fn compile(&self, projections: &[RowExpression]) -> Result<CompiledProjectionSet> {
        self.compile_with(InputLayout::inferred(), None, projections)
    }

    /// Compiles projections against a declared input schema.
    ///
    /// # Errors
    ///
    /// In addition to the errors of [`compile`](Self::compile), returns
    /// `InvalidExpression` for channels beyond `input_types` and `TypeMismatch`
    /// for references that disagree with the declared channel type.
    #[instrument(name = "expression::compile_for_input", level = "debug", skip_all, fields(channels = input_types.len(), projections = projections.len()))]
    pub fn compile_for_input(
        &self,
        input_types: &[DataType],
        projections: &[RowExpression],
    ) -> Result<CompiledProjectionSet> {
        self.compile_with(InputLayout::declared(input_types), None, projections)
    }

    /// Compiles an optional boolean filter together with projections.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the filter is not boolean, plus the errors of
    /// [`compile`](Self::compile).
    #[instrument(name = "expression::compile_filtered", level = "debug", skip_all, fields(projections = projections.len()))]
    pub fn compile_filtered(
        &self,
        filter: Option<&RowExpression>,
        projections: &[RowExpression],
    ) -> Result<CompiledProjectionSet> {
        self.compile_with(InputLayout::inferred(), filter, projections)
    }

    /// Compiles a filter and projections into a ready-to-run [`PageProcessor`].
    ///
    /// # Errors
    ///
    /// See [`compile_filtered`](Self::compile_filtered).
    pub fn compile_page_processor(
        &self,
        filter: Option<&RowExpression>,
        projections: &[RowExpression],
        config: ProcessorConfig,
    ) -> Result<PageProcessor> {
        let compiled = self.compile_filtered(filter, projections)?;
        Ok(PageProcessor::new(Arc::new(compiled), config))
    }

    fn compile_with(
        &self,
        mut layout: InputLayout,
        filter: Option<&RowExpression>,
        projections: &[RowExpression],
    ) -> Result<CompiledProjectionSet> {
        let filter = filter
            .map(|expression| {
                if expression.data_type() != &DataType::Boolean {
                    return Err(StrataError::type_mismatch(
                        "boolean filter",
                        expression.data_type(),
                    ));
                }
                self.compile_expression(expression, &mut layout)
            })
            .transpose()?;
        let evaluators = projections
            .iter()
            .map(|expression| self.compile_expression(expression, &mut layout))
            .collect::<Result<Vec<_>>>()?;
        let output_types = projections.iter().map(|p| p.data_type().clone()).collect();
        debug!(
            channels = layout.types.len(),
            filtered = filter.is_some(),
            "compiled projection set"
        );
        Ok(CompiledProjectionSet {
            filter,
            projections: evaluators,
            output_types,
            input_layout: layout.types,
        })
    }

    fn compile_expression(
        &self,
        expression: &RowExpression,
        layout: &mut InputLayout,
    ) -> Result<Box<dyn RowEvaluator>> {
        match expression {
            RowExpression::Constant { value, data_type } => {
                if !value.is_compatible_with(data_type) {
                    return Err(StrataError::type_mismatch(data_type, value.kind_name()));
                }
                Ok(Box::new(ConstantEvaluator::new(value, data_type)?))
            }
            RowExpression::InputReference { channel, data_type } => {
                layout.bind(*channel, data_type)?;
                Ok(Box::new(InputReferenceEvaluator::new(*channel, data_type.clone())))
            }
            RowExpression::Call {
                signature,
                return_type,
                arguments,
            } => {
                let declared = signature.argument_types();
                if declared.len() != arguments.len() {
                    return Err(StrataError::InvalidExpression(format!(
                        "{signature} takes {} arguments, call has {}",
                        declared.len(),
                        arguments.len()
                    )));
                }
                for (expected, argument) in declared.iter().zip(arguments) {
                    if argument.data_type() != expected {
                        return Err(StrataError::type_mismatch(
                            format!("{expected} argument of {}", signature.name()),
                            argument.data_type(),
                        ));
                    }
                }
                if return_type != signature.return_type() {
                    return Err(StrataError::type_mismatch(
                        format!("{} returning {}", signature.name(), signature.return_type()),
                        return_type,
                    ));
                }

                let function = self.resolver.resolve(signature)?;
                let deterministic = function.deterministic;
                let compiled = arguments
                    .iter()
                    .map(|argument| self.compile_expression(argument, layout))
                    .collect::<Result<Vec<_>>>()?;
                let foldable = deterministic && compiled.iter().all(|a| a.is_constant());
                let call = call_evaluator(function, return_type.clone(), compiled)?;
                if foldable {
                    if let Some(folded) = fold(call.as_ref(), return_type) {
                        trace!(%signature, "folded constant call");
                        return Ok(Box::new(folded));
                    }
                }
                Ok(call)
            }
        }
    }
}

/// Evaluates a constant-only call once. `None` leaves the call to fail per row.
fn fold(call: &dyn RowEvaluator, return_type: &DataType) -> Option<ConstantEvaluator> {
    let page = Page::with_position_count(1, Vec::new()).ok()?;
    let value = call.evaluate(&page, 0).and_then(|datum| datum.to_value()).ok()?;
    ConstantEvaluator::new(&value, return_type).ok()
}

/// Output of compilation: an optional filter plus one evaluator per output channel.
#[derive(Debug)]
pub struct CompiledProjectionSet {
    filter: Option<Box<dyn RowEvaluator>>,
    projections: Vec<Box<dyn RowEvaluator>>,
    output_types: Vec<DataType>,
    input_layout: Vec<Option<DataType>>,
}

impl CompiledProjectionSet {
    /// Returns the output channel types.
    #[must_use]
    pub fn output_types(&self) -> &[DataType] {
        &self.output_types
    }

    /// Returns the input channel types the projections read; `None` marks unread channels.
    #[must_use]
    pub fn input_layout(&self) -> &[Option<DataType>] {
        &self.input_layout
    }

    #[must_use]
    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    #[must_use]
    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Checks that `page` provides every channel the projections read, with the compiled types.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPage` describing the first mismatch.
    pub fn validate_page(&self, page: &Page) -> Result<()> {
        if page.channel_count() < self.input_layout.len() {
            return Err(StrataError::InvalidPage(format!(
                "expected at least {} channels, page has {}",
                self.input_layout.len(),
                page.channel_count()
            )));
        }
        for (channel, expected) in self.input_layout.iter().enumerate() {
            let Some(expected) = expected else { continue };
            let actual = page.block(channel)?.data_type();
            if &actual != expected {
                return Err(StrataError::InvalidPage(format!(
                    "channel {channel} has type {actual}, compiled for {expected}"
                )));
            }
        }
        Ok(())
    }

    /// Returns true if the filter keeps `position` (always true without a filter).
    ///
    /// # Errors
    ///
    /// Propagates evaluation errors of the filter.
    pub fn accepts(&self, page: &Page, position: usize) -> Result<bool> {
        match &self.filter {
            None => Ok(true),
            Some(filter) => Ok(matches!(filter.evaluate(page, position)?, Datum::Boolean(true))),
        }
    }

    /// Evaluates every projection for one position into owned values, ignoring the filter.
    ///
    /// # Errors
    ///
    /// Propagates evaluation errors.
    pub fn evaluate(&self, page: &Page, position: usize) -> Result<Vec<Value>> {
        self.projections
            .iter()
            .map(|projection| projection.evaluate(page, position)?.to_value())
            .collect()
    }

    /// Filters and projects one position into `output`.
    ///
    /// Returns whether a row was emitted.
    ///
    /// # Errors
    ///
    /// Propagates evaluation errors; the output builder is then unusable.
    pub fn project_position(&self, page: &Page, position: usize, output: &mut PageBuilder) -> Result<bool> {
        if !self.accepts(page, position)? {
            return Ok(false);
        }
        for (channel, projection) in self.projections.iter().enumerate() {
            let datum = projection.evaluate(page, position)?;
            output.block_builder(channel).append_datum(&datum)?;
        }
        output.declare_position();
        Ok(true)
    }
}
