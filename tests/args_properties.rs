use std::collections::BTreeMap;

use delegate_stage::exec::args::{POSITIONAL_FLAG, build_command_args};
use delegate_stage::packet::{Fields, interpolate};
use proptest::prelude::*;
use serde_json::Value;

// Flag names never start with "_" so the positional flag is added explicitly.
fn flags_strategy() -> impl Strategy<Value = BTreeMap<String, String>> {
    proptest::collection::btree_map("[a-z][a-z0-9-]{0,8}", "[a-zA-Z0-9./]{0,6}", 0..6)
}

fn args_strategy() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-zA-Z0-9./=-]{1,8}", 0..5)
}

proptest! {
    #[test]
    fn argv_length_follows_flag_values(
        args in args_strategy(),
        flags in flags_strategy(),
        positional in proptest::option::of("[a-z0-9.]{1,8}"),
    ) {
        let mut flags = flags;
        if let Some(ref value) = positional {
            flags.insert(POSITIONAL_FLAG.to_string(), value.clone());
        }

        let argv = build_command_args(&args, &flags, None);

        let named: Vec<_> = flags.iter().filter(|(k, _)| k.as_str() != POSITIONAL_FLAG).collect();
        let with_values = named.iter().filter(|(_, v)| !v.is_empty()).count();
        let expected = args.len() + named.len() + with_values + usize::from(positional.is_some());
        prop_assert_eq!(argv.len(), expected);

        // Static args lead, verbatim.
        prop_assert_eq!(&argv[..args.len()], &args[..]);

        // The positional value is last and never rendered as a flag.
        prop_assert!(!argv.iter().any(|a| a == "--_"));
        if let Some(value) = positional {
            prop_assert_eq!(argv.last(), Some(&value));
        }
    }

    #[test]
    fn interpolation_without_references_is_identity(template in "[^$]{0,32}") {
        let fields = Fields::new();
        prop_assert_eq!(interpolate(&template, &fields), template);
    }

    #[test]
    fn string_fields_are_substituted_raw(name in "[a-z]{1,8}", value in "[a-zA-Z0-9 ]{0,16}") {
        let mut fields = Fields::new();
        fields.insert(name.clone(), Value::String(value.clone()));

        let rendered = interpolate(&format!("<${{{name}}}>"), &fields);
        prop_assert_eq!(rendered, format!("<{value}>"));
    }
}
