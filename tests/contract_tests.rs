//! Contract tests for the public API: batch model, compiler and function library.

use strata::{Block, BlockBuilder, DataType, Page, PageBuilder, StrataError, Value};

// =============================================================================
// Batch Model Contracts
// =============================================================================

mod batch_model_contracts {
    use super::*;

    #[test]
    fn test_reads_outside_range_fail() {
        let block = Block::from_values(&DataType::Bigint, &[Value::Bigint(1)]).unwrap();
        assert!(matches!(block.is_null(1), Err(StrataError::OutOfRange { position: 1, length: 1 })));
        assert!(matches!(block.get_long(usize::MAX), Err(StrataError::OutOfRange { .. })));
    }

    #[test]
    fn test_array_offsets_describe_element_counts() {
        let mut builder = BlockBuilder::new(&DataType::array(DataType::Varchar), 3);
        builder.begin_entry().unwrap();
        builder.write_str("a").unwrap();
        builder.append_null().unwrap();
        builder.close_entry().unwrap();
        builder.append_null().unwrap();
        builder.begin_entry().unwrap();
        builder.close_entry().unwrap();
        let block = builder.build().unwrap();

        let Block::Array(arrays) = &block else {
            panic!("expected an array block");
        };
        assert_eq!(arrays.offsets(), &[0, 2, 2, 2]);
        assert_eq!(block.get_array(0).unwrap().len(), 2);
        assert!(block.is_null(1).unwrap());
        assert!(block.get_array(2).unwrap().is_empty());
    }

    #[test]
    fn test_array_protocol_violations() {
        let mut builder = BlockBuilder::new(&DataType::array(DataType::Bigint), 1);
        assert!(matches!(builder.write_long(7), Err(StrataError::ProtocolViolation(_))));
        assert!(matches!(builder.close_entry(), Err(StrataError::ProtocolViolation(_))));

        builder.begin_entry().unwrap();
        builder.write_long(7).unwrap();
        assert!(matches!(builder.build(), Err(StrataError::ProtocolViolation(_))));
    }

    #[test]
    fn test_page_channels_have_equal_length() {
        let a = Block::from_values(&DataType::Bigint, &[Value::Bigint(1)]).unwrap();
        let b = Block::from_values(&DataType::Bigint, &[]).unwrap();
        assert!(matches!(Page::new(vec![a, b]), Err(StrataError::InvalidPage(_))));
    }

    #[test]
    fn test_page_builder_counts_declared_positions() {
        let mut builder = PageBuilder::new(&[DataType::Bigint, DataType::Varchar], 2);
        builder.block_builder(0).write_long(1).unwrap();
        builder.block_builder(1).write_str("x").unwrap();
        builder.declare_position();
        let page = builder.build().unwrap();
        assert_eq!(page.position_count(), 1);
        assert_eq!(page.types(), vec![DataType::Bigint, DataType::Varchar]);

        let mut uneven = PageBuilder::new(&[DataType::Bigint], 1);
        uneven.declare_position();
        assert!(matches!(uneven.build(), Err(StrataError::InvalidPage(_))));
    }
}

// =============================================================================
// Compiler Contracts
// =============================================================================

mod compiler_contracts {
    use super::*;
    use strata::{ExpressionCompiler, FunctionKind, RowExpression, Signature};

    fn delimiter() -> RowExpression {
        RowExpression::constant(Value::Varchar(",".into()), DataType::Varchar)
    }

    #[test]
    fn test_unresolved_signature() {
        let compiler = ExpressionCompiler::default();
        let unknown = RowExpression::call("no_such_function", DataType::Varchar, vec![delimiter()]);
        let err = compiler.compile(&[unknown]).unwrap_err();
        assert!(matches!(err, StrataError::UnresolvedSignature(_)));
        assert!(err.is_compile_error());

        let window = RowExpression::Call {
            signature: Signature::new("length", FunctionKind::Window, DataType::Bigint, vec![DataType::Varchar]),
            return_type: DataType::Bigint,
            arguments: vec![delimiter()],
        };
        assert!(matches!(compiler.compile(&[window]), Err(StrataError::UnresolvedSignature(_))));
    }

    #[test]
    fn test_argument_type_mismatch() {
        let compiler = ExpressionCompiler::default();
        let bad_argument = RowExpression::Call {
            signature: Signature::scalar(
                "array_join",
                DataType::Varchar,
                vec![DataType::array(DataType::Bigint), DataType::Varchar],
            ),
            return_type: DataType::Varchar,
            arguments: vec![RowExpression::field(0, DataType::Bigint), delimiter()],
        };
        assert!(matches!(compiler.compile(&[bad_argument]), Err(StrataError::TypeMismatch { .. })));

        let bad_return = RowExpression::Call {
            signature: Signature::scalar("length", DataType::Bigint, vec![DataType::Varchar]),
            return_type: DataType::Varchar,
            arguments: vec![delimiter()],
        };
        assert!(matches!(compiler.compile(&[bad_return]), Err(StrataError::TypeMismatch { .. })));
    }

    #[test]
    fn test_compilation_is_all_or_nothing() {
        let compiler = ExpressionCompiler::default();
        let good = RowExpression::field(0, DataType::Bigint);
        let bad = RowExpression::call("no_such_function", DataType::Bigint, vec![]);
        assert!(compiler.compile(&[good, bad]).is_err());
    }

    #[test]
    fn test_nested_arrays_do_not_join() {
        let nested = RowExpression::call(
            "array_join",
            DataType::Varchar,
            vec![
                RowExpression::field(0, DataType::array(DataType::array(DataType::Bigint))),
                delimiter(),
            ],
        );
        assert!(matches!(
            ExpressionCompiler::default().compile(&[nested]),
            Err(StrataError::UnresolvedSignature(_))
        ));
    }

    #[test]
    fn test_expressions_serialize() {
        let expression = RowExpression::call(
            "array_join",
            DataType::Varchar,
            vec![RowExpression::field(0, DataType::array(DataType::Double)), delimiter()],
        );
        fn assert_serde<T: serde::Serialize + serde::de::DeserializeOwned>(_: &T) {}
        assert_serde(&expression);
    }
}

// =============================================================================
// Array Join Contracts
// =============================================================================

mod array_join_contracts {
    use super::*;
    use strata::{ExpressionCompiler, RowExpression};

    fn join_all(rows: Vec<Value>, replacement: Option<Value>) -> Vec<Value> {
        let array_type = DataType::array(DataType::Bigint);
        let mut arguments = vec![
            RowExpression::field(0, array_type.clone()),
            RowExpression::constant(Value::Varchar(",".into()), DataType::Varchar),
        ];
        if let Some(replacement) = replacement {
            arguments.push(RowExpression::constant(replacement, DataType::Varchar));
        }
        let compiled = ExpressionCompiler::default()
            .compile(&[RowExpression::call("array_join", DataType::Varchar, arguments)])
            .unwrap();
        let page = Page::new(vec![Block::from_values(&array_type, &rows).unwrap()]).unwrap();
        (0..page.position_count())
            .map(|p| compiled.evaluate(&page, p).unwrap().remove(0))
            .collect()
    }

    fn array(values: &[Option<i64>]) -> Value {
        Value::Array(values.iter().map(|v| v.map_or(Value::Null, Value::Bigint)).collect())
    }

    fn text(s: &str) -> Value {
        Value::Varchar(s.to_string())
    }

    #[test]
    fn test_join_table() {
        let rows = vec![
            Value::Null,
            array(&[]),
            array(&[Some(1), Some(2), Some(3)]),
            array(&[Some(1), None, Some(3)]),
            array(&[None, None]),
        ];
        assert_eq!(
            join_all(rows.clone(), None),
            vec![Value::Null, text(""), text("1,2,3"), text("1,3"), text("")]
        );
        assert_eq!(
            join_all(rows, Some(text("X"))),
            vec![Value::Null, text(""), text("1,2,3"), text("1,X,3"), text("X,X")]
        );
    }

    #[test]
    fn test_null_replacement_yields_null() {
        let rows = vec![array(&[Some(1), None])];
        assert_eq!(join_all(rows, Some(Value::Null)), vec![Value::Null]);
    }
}
