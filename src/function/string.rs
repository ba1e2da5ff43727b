use std::borrow::Cow;

use crate::block::Datum;
use crate::error::{Result, StrataError};
use crate::types::DataType;

use super::{ArgumentType, ScalarFunction};

pub(super) fn functions() -> Vec<ScalarFunction> {
    vec![
        ScalarFunction::new(
            "concat",
            vec![ArgumentType::Exact(DataType::Varchar), ArgumentType::Exact(DataType::Varchar)],
            DataType::Varchar,
            concat,
        ),
        ScalarFunction::new(
            "length",
            vec![ArgumentType::Exact(DataType::Varchar)],
            DataType::Bigint,
            length,
        ),
    ]
}

fn concat<'a>(arguments: &[Datum<'a>]) -> Result<Datum<'a>> {
    let [Datum::Varchar(left), Datum::Varchar(right)] = arguments else {
        return Err(StrataError::evaluation("concat", "expected two varchar arguments"));
    };
    let mut out = String::with_capacity(left.len() + right.len());
    out.push_str(left);
    out.push_str(right);
    Ok(Datum::Varchar(Cow::Owned(out)))
}

/// Length in characters, not bytes.
fn length<'a>(arguments: &[Datum<'a>]) -> Result<Datum<'a>> {
    let [Datum::Varchar(text)] = arguments else {
        return Err(StrataError::evaluation("length", "expected one varchar argument"));
    };
    let count = i64::try_from(text.chars().count())
        .map_err(|_| StrataError::evaluation("length", "length exceeds bigint"))?;
    Ok(Datum::Bigint(count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat() {
        let result = concat(&[Datum::Varchar("ab".into()), Datum::Varchar("cd".into())]).unwrap();
        assert_eq!(result.as_str(), Some("abcd"));
    }

    #[test]
    fn test_length_counts_characters() {
        assert_eq!(length(&[Datum::Varchar("héllo".into())]).unwrap().as_bigint(), Some(5));
        assert_eq!(length(&[Datum::Varchar("".into())]).unwrap().as_bigint(), Some(0));
    }
}
