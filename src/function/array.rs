//! Array functions: `array_join` and `cardinality`.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::block::{ArrayView, Block, Datum};
use crate::error::{Result, StrataError};
use crate::types::{write_double, DataType};

use super::{ArgumentType, ScalarFunction};

pub(super) fn functions() -> Vec<ScalarFunction> {
    vec![
        ScalarFunction::new(
            "array_join",
            vec![ArgumentType::ScalarArray, ArgumentType::Exact(DataType::Varchar)],
            DataType::Varchar,
            array_join,
        ),
        ScalarFunction::new(
            "array_join",
            vec![
                ArgumentType::ScalarArray,
                ArgumentType::Exact(DataType::Varchar),
                ArgumentType::Exact(DataType::Varchar),
            ],
            DataType::Varchar,
            array_join_with_replacement,
        ),
        ScalarFunction::new(
            "cardinality",
            vec![ArgumentType::AnyArray],
            DataType::Bigint,
            cardinality,
        ),
    ]
}

/// `array_join(array, delimiter)`: null elements are skipped entirely.
///
/// # Errors
///
/// Returns an evaluation error if the arguments do not have the bound types.
pub fn array_join<'a>(arguments: &[Datum<'a>]) -> Result<Datum<'a>> {
    let [Datum::Array(array), Datum::Varchar(delimiter)] = arguments else {
        return Err(bad_arguments("array_join", arguments));
    };
    Ok(Datum::Varchar(Cow::Owned(join(array, delimiter, None)?)))
}

/// `array_join(array, delimiter, null_replacement)`: null elements are emitted as
/// `null_replacement`.
///
/// # Errors
///
/// Returns an evaluation error if the arguments do not have the bound types.
pub fn array_join_with_replacement<'a>(arguments: &[Datum<'a>]) -> Result<Datum<'a>> {
    let [Datum::Array(array), Datum::Varchar(delimiter), Datum::Varchar(replacement)] = arguments else {
        return Err(bad_arguments("array_join", arguments));
    };
    Ok(Datum::Varchar(Cow::Owned(join(array, delimiter, Some(replacement))?)))
}

/// `cardinality(array)`: number of elements, nulls included.
///
/// # Errors
///
/// Returns an evaluation error if the argument is not an array.
pub fn cardinality<'a>(arguments: &[Datum<'a>]) -> Result<Datum<'a>> {
    let [Datum::Array(array)] = arguments else {
        return Err(bad_arguments("cardinality", arguments));
    };
    let length = i64::try_from(array.len())
        .map_err(|_| StrataError::evaluation("cardinality", "array length exceeds bigint"))?;
    Ok(Datum::Bigint(length))
}

/// Accumulates emitted elements, placing the delimiter only between two emitted ones.
struct Joiner<'d> {
    out: String,
    delimiter: &'d str,
    replacement: Option<&'d str>,
    emitted: bool,
}

impl<'d> Joiner<'d> {
    fn new(capacity: usize, delimiter: &'d str, replacement: Option<&'d str>) -> Self {
        Joiner {
            out: String::with_capacity(capacity),
            delimiter,
            replacement,
            emitted: false,
        }
    }

    /// Starts a new emitted element and returns the buffer to write it into.
    fn element(&mut self) -> &mut String {
        if self.emitted {
            self.out.push_str(self.delimiter);
        }
        self.emitted = true;
        &mut self.out
    }

    fn null_element(&mut self) {
        if let Some(replacement) = self.replacement {
            self.element().push_str(replacement);
        }
    }
}

fn join(array: &ArrayView<'_>, delimiter: &str, replacement: Option<&str>) -> Result<String> {
    let positions = array.element_positions();
    let mut joiner = Joiner::new(array.len() * (delimiter.len() + 4), delimiter, replacement);
    match array.elements() {
        Block::Bigint(block) => {
            for position in positions {
                if block.null_at(position) {
                    joiner.null_element();
                } else {
                    write!(joiner.element(), "{}", block.value_at(position)).map_err(format_error)?;
                }
            }
        }
        Block::Double(block) => {
            for position in positions {
                if block.null_at(position) {
                    joiner.null_element();
                } else {
                    write_double(joiner.element(), block.value_at(position)).map_err(format_error)?;
                }
            }
        }
        Block::Boolean(block) => {
            for position in positions {
                if block.null_at(position) {
                    joiner.null_element();
                } else {
                    let text = if block.value_at(position) { "true" } else { "false" };
                    joiner.element().push_str(text);
                }
            }
        }
        Block::Varchar(block) => {
            for position in positions {
                if block.null_at(position) {
                    joiner.null_element();
                } else {
                    joiner.element().push_str(block.str_at(position));
                }
            }
        }
        Block::Array(_) => {
            return Err(StrataError::evaluation(
                "array_join",
                format!("cannot join elements of type {}", array.element_type()),
            ));
        }
    }
    Ok(joiner.out)
}

fn format_error(_: std::fmt::Error) -> StrataError {
    StrataError::evaluation("array_join", "failed to format element")
}

fn bad_arguments(function: &str, arguments: &[Datum<'_>]) -> StrataError {
    let kinds: Vec<&str> = arguments.iter().map(Datum::kind_name).collect();
    StrataError::evaluation(function, format!("unexpected arguments ({})", kinds.join(", ")))
}
