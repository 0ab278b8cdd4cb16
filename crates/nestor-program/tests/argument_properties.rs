//! Property tests for argument validation and encoding.
//!
//! Case counts follow `PROPTEST_CASES` (default 64), e.g.
//!
//! ```bash
//! PROPTEST_CASES=256 cargo test -p nestor-program --test argument_properties
//! ```

use nestor_program::{ArgumentCodec, Arguments, NestedProgram};
use nestor_utils::error::{ArgumentError, ProgramError};
use proptest::prelude::*;
use serde_json::{Map, Number, Value};
use std::env;

const DEFAULT_PROPTEST_CASES: u32 = 64;

fn proptest_config() -> ProptestConfig {
    let cases = env::var("PROPTEST_CASES")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(DEFAULT_PROPTEST_CASES);

    ProptestConfig {
        cases,
        max_shrink_time: 30000,
        ..ProptestConfig::default()
    }
}

/// Any JSON value with bounded depth and width
fn arb_json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        any::<u64>().prop_map(|n| Value::Number(n.into())),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(|f| Number::from_f64(f).map_or(Value::Null, Value::Number)),
        "[a-zA-Z0-9 _\\-\"\\\\\u{e9}\u{1F600}]{0,16}".prop_map(Value::String),
    ];

    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..6)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn arb_arguments() -> impl Strategy<Value = Arguments> {
    prop::collection::btree_map("[a-z_][a-z0-9_]{0,10}", arb_json_value(), 0..8)
        .prop_map(|map| map.into_iter().collect::<Map<String, Value>>())
}

#[test]
fn prop_json_compatible_arguments_build_and_deep_equal() {
    proptest!(proptest_config(), |(arguments in arb_arguments())| {
        let program = NestedProgram::builder("simple_job", "job.py")
            .arguments(arguments.clone())
            .build();

        prop_assert!(program.is_ok(), "valid arguments rejected: {:?}", program);
        let program = program.unwrap();
        prop_assert_eq!(program.arguments(), &arguments);
    });
}

#[test]
fn prop_encode_decode_round_trips() {
    proptest!(proptest_config(), |(arguments in arb_arguments())| {
        let text = ArgumentCodec::encode(&arguments).unwrap();
        let decoded = ArgumentCodec::decode(&text).unwrap();
        prop_assert_eq!(decoded, arguments);
    });
}

#[test]
fn prop_encoding_is_deterministic_under_insertion_order() {
    proptest!(proptest_config(), |(arguments in arb_arguments())| {
        let mut reversed = Map::new();
        for (key, value) in arguments.iter().rev() {
            reversed.insert(key.clone(), value.clone());
        }

        prop_assert_eq!(
            ArgumentCodec::encode(&arguments).unwrap(),
            ArgumentCodec::encode(&reversed).unwrap()
        );
    });
}

#[test]
fn prop_validation_never_mutates_input() {
    proptest!(proptest_config(), |(arguments in arb_arguments())| {
        let before = arguments.clone();
        let _ = ArgumentCodec::validate(&arguments);
        prop_assert_eq!(before, arguments);
    });
}

#[test]
fn prop_strict_conversion_agrees_with_serde_json_for_json_values() {
    proptest!(proptest_config(), |(arguments in arb_arguments())| {
        let converted = ArgumentCodec::to_arguments(&Value::Object(arguments.clone())).unwrap();
        prop_assert_eq!(converted, arguments);
    });
}

#[test]
fn prop_byte_buffer_anywhere_is_rejected_with_its_path() {
    struct Buffer(Vec<u8>);

    impl serde::Serialize for Buffer {
        fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_bytes(&self.0)
        }
    }

    proptest!(proptest_config(), |(key in "[a-z]{1,8}", data in prop::collection::vec(any::<u8>(), 0..32))| {
        let result = NestedProgram::builder("simple_job", "job.py")
            .argument("one", &1)
            .argument(key.clone(), &Buffer(data))
            .build();

        match result {
            Err(ProgramError::Argument(ArgumentError::NotSerializable { path, .. })) => {
                prop_assert_eq!(path, key);
            }
            other => prop_assert!(false, "expected NotSerializable, got {:?}", other),
        }
    });
}

#[test]
fn test_nested_json_scenario() {
    let arguments = ArgumentCodec::to_arguments(&serde_json::json!({
        "one": 1,
        "json": {"one": 1, "two": 2}
    }))
    .unwrap();

    let program = NestedProgram::builder("simple_job", "job.py")
        .arguments(arguments.clone())
        .build()
        .unwrap();

    assert_eq!(program.arguments(), &arguments);
    assert_eq!(
        program.encoded_arguments().unwrap(),
        r#"{"json":{"one":1,"two":2},"one":1}"#
    );
}
