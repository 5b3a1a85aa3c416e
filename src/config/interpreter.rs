// src/config/interpreter.rs

//! Argument conventions for running inline `code` through a known
//! interpreter.
//!
//! Only consulted when a stage has `code` but no explicit `args`. Commands
//! are matched on their file name, so `/usr/bin/python3` behaves like
//! `python3`. Add an arm to [`default_args`] to support another interpreter.

use std::path::Path;

/// Synthesize interpreter arguments that execute `code`, if `command` is a
/// known interpreter.
pub fn default_args(command: &str, code: &str) -> Option<Vec<String>> {
    if code.trim().is_empty() {
        return None;
    }

    let program = Path::new(command.trim())
        .file_name()
        .and_then(|name| name.to_str())?;

    let args: Vec<&str> = match program {
        "php" => {
            let body = code.trim_start();
            let body = body.strip_prefix("<?php").unwrap_or(body);
            vec!["-d", "display_errors=stderr", "-r", body, "--"]
        }
        // -u: unbuffered stdout, records reach the stage as they are printed.
        "python" | "python3" => vec!["-u", "-c", code],
        "node" | "ruby" => vec!["-e", code],
        "sh" | "bash" => vec!["-c", code],
        _ => return None,
    };

    Some(args.into_iter().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_runs_unbuffered_inline_code() {
        assert_eq!(
            default_args("python", "print(1)"),
            Some(vec!["-u".into(), "-c".into(), "print(1)".into()])
        );
        assert_eq!(
            default_args("/usr/bin/python3", "print(1)"),
            Some(vec!["-u".into(), "-c".into(), "print(1)".into()])
        );
    }

    #[test]
    fn php_strips_open_tag() {
        let args = default_args("php", "<?php echo 1;").unwrap();
        assert_eq!(
            args,
            vec!["-d", "display_errors=stderr", "-r", " echo 1;", "--"]
        );
    }

    #[test]
    fn shells_and_script_runtimes() {
        assert_eq!(default_args("sh", "cat").unwrap(), vec!["-c", "cat"]);
        assert_eq!(default_args("node", "1").unwrap(), vec!["-e", "1"]);
    }

    #[test]
    fn unknown_command_or_empty_code_yields_nothing() {
        assert_eq!(default_args("cat", "whatever"), None);
        assert_eq!(default_args("python", "   "), None);
    }
}
