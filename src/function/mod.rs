//! Scalar function library and signature resolution.
//!
//! The compiler never looks functions up while rows are processed: it asks a
//! [`FunctionResolver`] once per call node and binds the returned
//! implementation (a plain function pointer) into the compiled evaluator.

mod arithmetic;
mod array;
mod string;

use std::collections::HashMap;
use std::fmt;

use crate::block::Datum;
use crate::error::{Result, StrataError};
use crate::expression::{FunctionKind, Signature};
use crate::types::DataType;

pub use array::{array_join, array_join_with_replacement, cardinality};

/// Directly invokable body of a scalar function.
///
/// Arguments have already been type checked at compile time. With the
/// null-on-null convention the body never sees a null argument.
pub type ScalarFunctionImplementation = for<'a> fn(&[Datum<'a>]) -> Result<Datum<'a>>;

/// Parameter type accepted by a registered function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentType {
    /// Exactly this type.
    Exact(DataType),
    /// `array(T)` for any non-array `T`.
    ScalarArray,
    /// `array(T)` for any `T`.
    AnyArray,
}

impl ArgumentType {
    /// Returns true if `actual` binds to this parameter.
    #[must_use]
    pub fn accepts(&self, actual: &DataType) -> bool {
        match self {
            ArgumentType::Exact(expected) => expected == actual,
            ArgumentType::ScalarArray => actual
                .element_type()
                .is_some_and(|element| !matches!(element, DataType::Array(_))),
            ArgumentType::AnyArray => matches!(actual, DataType::Array(_)),
        }
    }
}

impl fmt::Display for ArgumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentType::Exact(t) => write!(f, "{t}"),
            ArgumentType::ScalarArray => f.write_str("array(T)"),
            ArgumentType::AnyArray => f.write_str("array(any)"),
        }
    }
}

/// A registered scalar function overload.
#[derive(Clone)]
pub struct ScalarFunction {
    name: &'static str,
    arguments: Vec<ArgumentType>,
    return_type: DataType,
    deterministic: bool,
    implementation: ScalarFunctionImplementation,
}

impl fmt::Debug for ScalarFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarFunction")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}

impl ScalarFunction {
    /// Creates a deterministic overload.
    #[must_use]
    pub fn new(
        name: &'static str,
        arguments: Vec<ArgumentType>,
        return_type: DataType,
        implementation: ScalarFunctionImplementation,
    ) -> Self {
        ScalarFunction {
            name,
            arguments,
            return_type,
            deterministic: true,
            implementation,
        }
    }

    /// Marks the overload as non-deterministic, which disables constant folding.
    #[must_use]
    pub fn non_deterministic(mut self) -> Self {
        self.deterministic = false;
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn binds(&self, argument_types: &[DataType]) -> bool {
        self.arguments.len() == argument_types.len()
            && self
                .arguments
                .iter()
                .zip(argument_types)
                .all(|(parameter, actual)| parameter.accepts(actual))
    }
}

/// Result of resolving a signature: everything the compiler binds into a call node.
#[derive(Clone)]
pub struct ResolvedFunction {
    pub signature: Signature,
    pub implementation: ScalarFunctionImplementation,
    pub null_on_null_input: bool,
    pub deterministic: bool,
}

impl fmt::Debug for ResolvedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedFunction")
            .field("signature", &self.signature.to_string())
            .field("deterministic", &self.deterministic)
            .finish_non_exhaustive()
    }
}

/// Catalog seam: maps a signature to an implementation.
pub trait FunctionResolver: Send + Sync {
    /// Resolves `signature` to a concrete implementation.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedSignature` if nothing matches, or `TypeMismatch` if
    /// the matching overload returns a different type than the signature declares.
    fn resolve(&self, signature: &Signature) -> Result<ResolvedFunction>;
}

/// In-memory function catalog.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<&'static str, Vec<ScalarFunction>>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FunctionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn empty() -> Self {
        FunctionRegistry {
            functions: HashMap::new(),
        }
    }

    /// Creates a registry holding the built-in function library.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for function in array::functions()
            .into_iter()
            .chain(string::functions())
            .chain(arithmetic::functions())
        {
            registry.register(function);
        }
        registry
    }

    /// Adds an overload.
    pub fn register(&mut self, function: ScalarFunction) {
        self.functions.entry(function.name).or_default().push(function);
    }

    /// Returns true if any overload is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Returns the registered function names, sorted.
    #[must_use]
    pub fn function_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl FunctionResolver for FunctionRegistry {
    fn resolve(&self, signature: &Signature) -> Result<ResolvedFunction> {
        if signature.kind() != FunctionKind::Scalar {
            return Err(StrataError::UnresolvedSignature(format!(
                "{signature}: {} functions cannot be used in projections",
                signature.kind()
            )));
        }
        let overloads = self
            .functions
            .get(signature.name())
            .ok_or_else(|| StrataError::UnresolvedSignature(format!("{signature}: unknown function")))?;
        let function = overloads
            .iter()
            .find(|f| f.binds(signature.argument_types()))
            .ok_or_else(|| {
                let candidates: Vec<String> = overloads
                    .iter()
                    .map(|f| {
                        let args: Vec<String> = f.arguments.iter().map(ToString::to_string).collect();
                        format!("{}({})", f.name, args.join(","))
                    })
                    .collect();
                StrataError::UnresolvedSignature(format!(
                    "{signature}: no overload matches; candidates are {}",
                    candidates.join(", ")
                ))
            })?;
        if &function.return_type != signature.return_type() {
            return Err(StrataError::type_mismatch(
                format!("{} returning {}", signature.name(), function.return_type),
                signature.return_type(),
            ));
        }
        Ok(ResolvedFunction {
            signature: signature.clone(),
            implementation: function.implementation,
            null_on_null_input: true,
            deterministic: function.deterministic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join_signature(element: DataType) -> Signature {
        Signature::scalar(
            "array_join",
            DataType::Varchar,
            vec![DataType::array(element), DataType::Varchar],
        )
    }

    #[test]
    fn test_resolves_generic_array_parameter() {
        let registry = FunctionRegistry::with_builtins();
        for element in [DataType::Bigint, DataType::Double, DataType::Boolean, DataType::Varchar] {
            assert!(registry.resolve(&join_signature(element)).is_ok());
        }
    }

    #[test]
    fn test_unresolved_signatures() {
        let registry = FunctionRegistry::with_builtins();
        let nested = join_signature(DataType::array(DataType::Bigint));
        assert!(matches!(registry.resolve(&nested), Err(StrataError::UnresolvedSignature(_))));

        let unknown = Signature::scalar("array_frobnicate", DataType::Varchar, vec![]);
        assert!(matches!(registry.resolve(&unknown), Err(StrataError::UnresolvedSignature(_))));

        let aggregate = Signature::new(
            "array_join",
            FunctionKind::Aggregate,
            DataType::Varchar,
            vec![DataType::array(DataType::Bigint), DataType::Varchar],
        );
        assert!(matches!(registry.resolve(&aggregate), Err(StrataError::UnresolvedSignature(_))));
    }

    #[test]
    fn test_wrong_declared_return_type() {
        let registry = FunctionRegistry::with_builtins();
        let signature = Signature::scalar(
            "array_join",
            DataType::Bigint,
            vec![DataType::array(DataType::Bigint), DataType::Varchar],
        );
        assert!(matches!(registry.resolve(&signature), Err(StrataError::TypeMismatch { .. })));
    }

    #[test]
    fn test_builtin_names() {
        let registry = FunctionRegistry::with_builtins();
        assert!(registry.contains("cardinality"));
        assert!(registry.function_names().contains(&"concat"));
        assert!(!FunctionRegistry::empty().contains("array_join"));
    }
}
