//! Typed expression trees and their compilation into per-row evaluators.
//!
//! A [`RowExpression`] describes one computed value per input row. The
//! [`ExpressionCompiler`] resolves every call once, type checks the tree and
//! produces a [`CompiledProjectionSet`] whose evaluators never look up a name
//! or re-dispatch on a type while rows are processed.

mod compiler;
mod evaluator;
mod signature;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{DataType, Value};

pub use compiler::{CompiledProjectionSet, ExpressionCompiler};
pub use evaluator::RowEvaluator;
pub use signature::{FunctionKind, Signature};

/// Typed expression tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowExpression {
    /// Literal value of a declared type.
    Constant { value: Value, data_type: DataType },
    /// Value of one input channel at the current position.
    InputReference { channel: usize, data_type: DataType },
    /// Function call over argument expressions.
    Call {
        signature: Signature,
        return_type: DataType,
        arguments: Vec<RowExpression>,
    },
}

impl RowExpression {
    /// Creates a constant.
    #[must_use]
    pub fn constant(value: Value, data_type: DataType) -> Self {
        RowExpression::Constant { value, data_type }
    }

    /// Creates a typed null constant.
    #[must_use]
    pub fn constant_null(data_type: DataType) -> Self {
        RowExpression::Constant {
            value: Value::Null,
            data_type,
        }
    }

    /// Creates a reference to input channel `channel`.
    #[must_use]
    pub fn field(channel: usize, data_type: DataType) -> Self {
        RowExpression::InputReference { channel, data_type }
    }

    /// Creates a scalar call whose signature is derived from the argument types.
    #[must_use]
    pub fn call(name: &str, return_type: DataType, arguments: Vec<RowExpression>) -> Self {
        let argument_types = arguments.iter().map(|a| a.data_type().clone()).collect();
        RowExpression::Call {
            signature: Signature::scalar(name, return_type.clone(), argument_types),
            return_type,
            arguments,
        }
    }

    /// Returns the declared type of the node.
    #[must_use]
    pub fn data_type(&self) -> &DataType {
        match self {
            RowExpression::Constant { data_type, .. }
            | RowExpression::InputReference { data_type, .. } => data_type,
            RowExpression::Call { return_type, .. } => return_type,
        }
    }
}

impl fmt::Display for RowExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowExpression::Constant { value: Value::Varchar(s), .. } => write!(f, "'{s}'"),
            RowExpression::Constant { value, .. } => write!(f, "{value}"),
            RowExpression::InputReference { channel, .. } => write!(f, "#{channel}"),
            RowExpression::Call {
                signature, arguments, ..
            } => {
                write!(f, "{}(", signature.name())?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_derives_signature() {
        let expression = RowExpression::call(
            "array_join",
            DataType::Varchar,
            vec![
                RowExpression::field(0, DataType::array(DataType::Bigint)),
                RowExpression::constant(Value::Varchar(",".into()), DataType::Varchar),
            ],
        );
        let RowExpression::Call { signature, .. } = &expression else {
            panic!("expected a call");
        };
        assert_eq!(signature.to_string(), "array_join(array(bigint),varchar):varchar");
        assert_eq!(expression.data_type(), &DataType::Varchar);
        assert_eq!(expression.to_string(), "array_join(#0, ',')");
    }
}
