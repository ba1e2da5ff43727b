//! Function identity used as the compiler's resolution key.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::DataType;

/// Kind of callable a signature names. Only scalar functions compile to projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionKind {
    Scalar,
    Aggregate,
    Window,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FunctionKind::Scalar => "scalar",
            FunctionKind::Aggregate => "aggregate",
            FunctionKind::Window => "window",
        })
    }
}

/// Name, kind, argument types and return type of a function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    name: String,
    kind: FunctionKind,
    return_type: DataType,
    argument_types: Vec<DataType>,
}

impl Signature {
    /// Creates a signature.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: FunctionKind,
        return_type: DataType,
        argument_types: Vec<DataType>,
    ) -> Self {
        Signature {
            name: name.into(),
            kind,
            return_type,
            argument_types,
        }
    }

    /// Creates a scalar function signature.
    #[must_use]
    pub fn scalar(name: impl Into<String>, return_type: DataType, argument_types: Vec<DataType>) -> Self {
        Self::new(name, FunctionKind::Scalar, return_type, argument_types)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    #[must_use]
    pub fn return_type(&self) -> &DataType {
        &self.return_type
    }

    #[must_use]
    pub fn argument_types(&self) -> &[DataType] {
        &self.argument_types
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, argument) in self.argument_types.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{argument}")?;
        }
        write!(f, "):{}", self.return_type)
    }
}
