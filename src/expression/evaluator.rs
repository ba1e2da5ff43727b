//! Compiled per-row evaluators.
//!
//! Every node is bound to its concrete children and, for calls, to a function
//! pointer resolved at compile time. Evaluating a row is a walk over this
//! tree of concrete nodes.

use std::fmt;

use crate::block::{Block, Datum, Page};
use crate::error::{Result, StrataError};
use crate::function::{ResolvedFunction, ScalarFunctionImplementation};
use crate::types::{DataType, Value};

/// Per-row executable form of one expression.
///
/// Evaluators hold no page-specific state and can be shared across threads
/// and reused for any number of pages.
pub trait RowEvaluator: Send + Sync + fmt::Debug {
    /// Evaluates the expression for `position` of `page`.
    ///
    /// # Errors
    ///
    /// Returns an evaluation error raised by a function, or `OutOfRange` if
    /// `position` is not a position of `page`.
    fn evaluate<'a>(&'a self, page: &'a Page, position: usize) -> Result<Datum<'a>>;

    /// Returns the type of the produced values.
    fn output_type(&self) -> &DataType;

    /// Returns true if the evaluator ignores its input.
    fn is_constant(&self) -> bool {
        false
    }
}

/// Literal value, stored as a one-position block so it can be lent out as a [`Datum`].
#[derive(Debug)]
pub(crate) struct ConstantEvaluator {
    value: Block,
    data_type: DataType,
}

impl ConstantEvaluator {
    pub(crate) fn new(value: &Value, data_type: &DataType) -> Result<Self> {
        Ok(ConstantEvaluator {
            value: Block::from_values(data_type, std::slice::from_ref(value))?,
            data_type: data_type.clone(),
        })
    }
}

impl RowEvaluator for ConstantEvaluator {
    fn evaluate<'a>(&'a self, _page: &'a Page, _position: usize) -> Result<Datum<'a>> {
        self.value.get_datum(0)
    }

    fn output_type(&self) -> &DataType {
        &self.data_type
    }

    fn is_constant(&self) -> bool {
        true
    }
}

/// Direct channel read.
#[derive(Debug)]
pub(crate) struct InputReferenceEvaluator {
    channel: usize,
    data_type: DataType,
}

impl InputReferenceEvaluator {
    pub(crate) fn new(channel: usize, data_type: DataType) -> Self {
        InputReferenceEvaluator { channel, data_type }
    }
}

impl RowEvaluator for InputReferenceEvaluator {
    fn evaluate<'a>(&'a self, page: &'a Page, position: usize) -> Result<Datum<'a>> {
        page.block(self.channel)?.get_datum(position)
    }

    fn output_type(&self) -> &DataType {
        &self.data_type
    }
}

/// Call with a fixed number of arguments, evaluated into a stack array.
pub(crate) struct CallEvaluator<const N: usize> {
    name: String,
    implementation: ScalarFunctionImplementation,
    null_on_null_input: bool,
    arguments: [Box<dyn RowEvaluator>; N],
    return_type: DataType,
}

impl<const N: usize> fmt::Debug for CallEvaluator<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallEvaluator")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}

impl<const N: usize> RowEvaluator for CallEvaluator<N> {
    fn evaluate<'a>(&'a self, page: &'a Page, position: usize) -> Result<Datum<'a>> {
        let mut values: [Datum<'a>; N] = std::array::from_fn(|_| Datum::Null);
        for (slot, argument) in values.iter_mut().zip(&self.arguments) {
            let value = argument.evaluate(page, position)?;
            if self.null_on_null_input && value.is_null() {
                return Ok(Datum::Null);
            }
            *slot = value;
        }
        (self.implementation)(&values)
    }

    fn output_type(&self) -> &DataType {
        &self.return_type
    }
}

/// Call with any other number of arguments.
pub(crate) struct VariadicCallEvaluator {
    name: String,
    implementation: ScalarFunctionImplementation,
    null_on_null_input: bool,
    arguments: Vec<Box<dyn RowEvaluator>>,
    return_type: DataType,
}

impl fmt::Debug for VariadicCallEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariadicCallEvaluator")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}

impl RowEvaluator for VariadicCallEvaluator {
    fn evaluate<'a>(&'a self, page: &'a Page, position: usize) -> Result<Datum<'a>> {
        let mut values = Vec::with_capacity(self.arguments.len());
        for argument in &self.arguments {
            let value = argument.evaluate(page, position)?;
            if self.null_on_null_input && value.is_null() {
                return Ok(Datum::Null);
            }
            values.push(value);
        }
        (self.implementation)(&values)
    }

    fn output_type(&self) -> &DataType {
        &self.return_type
    }
}

fn fixed_arity<const N: usize>(
    function: ResolvedFunction,
    return_type: DataType,
    arguments: Vec<Box<dyn RowEvaluator>>,
) -> Result<Box<dyn RowEvaluator>> {
    let name = function.signature.name().to_string();
    let arguments: [Box<dyn RowEvaluator>; N] = arguments.try_into().map_err(|a: Vec<_>| {
        StrataError::InvalidExpression(format!("{name} expects {N} arguments, got {}", a.len()))
    })?;
    Ok(Box::new(CallEvaluator {
        name,
        implementation: function.implementation,
        null_on_null_input: function.null_on_null_input,
        arguments,
        return_type,
    }))
}

/// Binds a resolved function to its compiled arguments, specialising common arities.
pub(crate) fn call_evaluator(
    function: ResolvedFunction,
    return_type: DataType,
    arguments: Vec<Box<dyn RowEvaluator>>,
) -> Result<Box<dyn RowEvaluator>> {
    match arguments.len() {
        1 => fixed_arity::<1>(function, return_type, arguments),
        2 => fixed_arity::<2>(function, return_type, arguments),
        3 => fixed_arity::<3>(function, return_type, arguments),
        _ => Ok(Box::new(VariadicCallEvaluator {
            name: function.signature.name().to_string(),
            implementation: function.implementation,
            null_on_null_input: function.null_on_null_input,
            arguments,
            return_type,
        })),
    }
}
