// src/exec/args.rs

//! Delegate command-line construction.

use std::collections::BTreeMap;

use crate::packet::{Fields, interpolate};

/// Flag name whose value becomes a trailing positional argument.
pub const POSITIONAL_FLAG: &str = "_";

/// Build the delegate's argv (without the program itself).
///
/// - static `args` first, verbatim and in order;
/// - each flag as `--name` when its value is empty, else `--name value`,
///   with `${field}` references in the value resolved against `fields`;
/// - the `"_"` flag last, as a bare argument, never as `--_`.
///
/// Without `fields` (streaming mode) values are used as written.
pub fn build_command_args(
    args: &[String],
    flags: &BTreeMap<String, String>,
    fields: Option<&Fields>,
) -> Vec<String> {
    let resolve = |value: &str| match fields {
        Some(fields) => interpolate(value, fields),
        None => value.to_string(),
    };

    let mut final_args: Vec<String> = args.to_vec();

    for (name, value) in flags {
        if name == POSITIONAL_FLAG {
            continue;
        }
        final_args.push(format!("--{name}"));
        if !value.is_empty() {
            final_args.push(resolve(value));
        }
    }

    if let Some(value) = flags.get(POSITIONAL_FLAG) {
        final_args.push(resolve(value));
    }

    final_args
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn static_args_then_flags() {
        let args = vec!["-x".to_string(), "run".to_string()];
        let out = build_command_args(&args, &flags(&[("verbose", ""), ("level", "3")]), None);
        assert_eq!(out, vec!["-x", "run", "--level", "3", "--verbose"]);
    }

    #[test]
    fn positional_flag_is_trailing_and_bare() {
        let out = build_command_args(&[], &flags(&[("_", "in.txt"), ("z", "1")]), None);
        assert_eq!(out, vec!["--z", "1", "in.txt"]);
        assert!(!out.iter().any(|a| a == "--_"));
    }

    #[test]
    fn values_are_interpolated_from_the_event() {
        let fields = json!({"file": "a.csv", "n": 2}).as_object().cloned().unwrap();
        let out = build_command_args(
            &[],
            &flags(&[("_", "${file}"), ("limit", "${n}"), ("flag", "")]),
            Some(&fields),
        );
        assert_eq!(out, vec!["--flag", "--limit", "2", "a.csv"]);
    }

    #[test]
    fn without_an_event_references_stay_literal() {
        let out = build_command_args(&[], &flags(&[("path", "${file}")]), None);
        assert_eq!(out, vec!["--path", "${file}"]);
    }
}
