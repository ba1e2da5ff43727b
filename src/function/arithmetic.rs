//! Arithmetic and comparison operators.
//!
//! Bigint arithmetic is checked: overflow and division by zero fail the row
//! instead of wrapping.

use crate::block::Datum;
use crate::error::{Result, StrataError};
use crate::types::DataType;

use super::{ArgumentType, ScalarFunction, ScalarFunctionImplementation};

pub(super) fn functions() -> Vec<ScalarFunction> {
    let binary = |name: &'static str, argument: DataType, ret: DataType, implementation: ScalarFunctionImplementation| {
        ScalarFunction::new(
            name,
            vec![ArgumentType::Exact(argument.clone()), ArgumentType::Exact(argument)],
            ret,
            implementation,
        )
    };
    vec![
        binary("add", DataType::Bigint, DataType::Bigint, add_bigint),
        binary("subtract", DataType::Bigint, DataType::Bigint, subtract_bigint),
        binary("multiply", DataType::Bigint, DataType::Bigint, multiply_bigint),
        binary("divide", DataType::Bigint, DataType::Bigint, divide_bigint),
        binary("add", DataType::Double, DataType::Double, add_double),
        binary("subtract", DataType::Double, DataType::Double, subtract_double),
        binary("multiply", DataType::Double, DataType::Double, multiply_double),
        binary("divide", DataType::Double, DataType::Double, divide_double),
        binary("equal", DataType::Bigint, DataType::Boolean, equal_bigint),
        binary("less_than", DataType::Bigint, DataType::Boolean, less_than_bigint),
        binary("greater_than", DataType::Bigint, DataType::Boolean, greater_than_bigint),
    ]
}

fn bigints(function: &str, arguments: &[Datum<'_>]) -> Result<(i64, i64)> {
    match arguments {
        [Datum::Bigint(left), Datum::Bigint(right)] => Ok((*left, *right)),
        _ => Err(StrataError::evaluation(function, "expected two bigint arguments")),
    }
}

fn doubles(function: &str, arguments: &[Datum<'_>]) -> Result<(f64, f64)> {
    match arguments {
        [Datum::Double(left), Datum::Double(right)] => Ok((*left, *right)),
        _ => Err(StrataError::evaluation(function, "expected two double arguments")),
    }
}

fn overflow(function: &str, left: i64, right: i64) -> StrataError {
    StrataError::evaluation(function, format!("bigint overflow: {left}, {right}"))
}

fn add_bigint<'a>(arguments: &[Datum<'a>]) -> Result<Datum<'a>> {
    let (left, right) = bigints("add", arguments)?;
    left.checked_add(right)
        .map(Datum::Bigint)
        .ok_or_else(|| overflow("add", left, right))
}

fn subtract_bigint<'a>(arguments: &[Datum<'a>]) -> Result<Datum<'a>> {
    let (left, right) = bigints("subtract", arguments)?;
    left.checked_sub(right)
        .map(Datum::Bigint)
        .ok_or_else(|| overflow("subtract", left, right))
}

fn multiply_bigint<'a>(arguments: &[Datum<'a>]) -> Result<Datum<'a>> {
    let (left, right) = bigints("multiply", arguments)?;
    left.checked_mul(right)
        .map(Datum::Bigint)
        .ok_or_else(|| overflow("multiply", left, right))
}

fn divide_bigint<'a>(arguments: &[Datum<'a>]) -> Result<Datum<'a>> {
    let (left, right) = bigints("divide", arguments)?;
    if right == 0 {
        return Err(StrataError::evaluation("divide", "Division by zero"));
    }
    left.checked_div(right)
        .map(Datum::Bigint)
        .ok_or_else(|| overflow("divide", left, right))
}

fn add_double<'a>(arguments: &[Datum<'a>]) -> Result<Datum<'a>> {
    let (left, right) = doubles("add", arguments)?;
    Ok(Datum::Double(left + right))
}

fn subtract_double<'a>(arguments: &[Datum<'a>]) -> Result<Datum<'a>> {
    let (left, right) = doubles("subtract", arguments)?;
    Ok(Datum::Double(left - right))
}

fn multiply_double<'a>(arguments: &[Datum<'a>]) -> Result<Datum<'a>> {
    let (left, right) = doubles("multiply", arguments)?;
    Ok(Datum::Double(left * right))
}

// IEEE semantics: x / 0.0 is an infinity or NaN, not an error.
fn divide_double<'a>(arguments: &[Datum<'a>]) -> Result<Datum<'a>> {
    let (left, right) = doubles("divide", arguments)?;
    Ok(Datum::Double(left / right))
}

fn equal_bigint<'a>(arguments: &[Datum<'a>]) -> Result<Datum<'a>> {
    let (left, right) = bigints("equal", arguments)?;
    Ok(Datum::Boolean(left == right))
}

fn less_than_bigint<'a>(arguments: &[Datum<'a>]) -> Result<Datum<'a>> {
    let (left, right) = bigints("less_than", arguments)?;
    Ok(Datum::Boolean(left < right))
}

fn greater_than_bigint<'a>(arguments: &[Datum<'a>]) -> Result<Datum<'a>> {
    let (left, right) = bigints("greater_than", arguments)?;
    Ok(Datum::Boolean(left > right))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(left: i64, right: i64) -> [Datum<'static>; 2] {
        [Datum::Bigint(left), Datum::Bigint(right)]
    }

    #[test]
    fn test_checked_bigint_arithmetic() {
        assert_eq!(add_bigint(&pair(2, 3)).unwrap().as_bigint(), Some(5));
        assert_eq!(subtract_bigint(&pair(2, 3)).unwrap().as_bigint(), Some(-1));
        assert_eq!(multiply_bigint(&pair(-4, 3)).unwrap().as_bigint(), Some(-12));
        assert_eq!(divide_bigint(&pair(7, 2)).unwrap().as_bigint(), Some(3));

        assert!(add_bigint(&pair(i64::MAX, 1)).is_err());
        assert!(divide_bigint(&pair(i64::MIN, -1)).is_err());
        let err = divide_bigint(&pair(1, 0)).unwrap_err();
        assert!(err.to_string().contains("Division by zero"));
    }

    #[test]
    fn test_double_division_follows_ieee() {
        let result = divide_double(&[Datum::Double(1.0), Datum::Double(0.0)]).unwrap();
        assert_eq!(result.as_double(), Some(f64::INFINITY));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(equal_bigint(&pair(1, 1)).unwrap().as_boolean(), Some(true));
        assert_eq!(less_than_bigint(&pair(1, 2)).unwrap().as_boolean(), Some(true));
        assert_eq!(greater_than_bigint(&pair(1, 2)).unwrap().as_boolean(), Some(false));
    }
}
