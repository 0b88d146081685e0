//! Shell-style quoting for the human-readable adapters.

use std::path::Path;
use std::process::Command;

/// Quotes `s` for display in a pseudo shell command line.
pub(crate) fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:,+=@%^".contains(c));
    if safe {
        return s.to_owned();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

/// Quotes a path for display.
pub(crate) fn quote_path(path: &Path) -> String {
    shell_quote(&path.display().to_string())
}

/// Renders `command` as a single pseudo shell line.
pub(crate) fn command_line(command: &Command) -> String {
    let mut parts = vec![shell_quote(&command.get_program().to_string_lossy())];
    parts.extend(
        command
            .get_args()
            .map(|arg| shell_quote(&arg.to_string_lossy())),
    );
    let line = parts.join(" ");
    match command.get_current_dir() {
        Some(dir) => format!("( cd {} && {line} )", quote_path(dir)),
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_words_pass_through() {
        assert_eq!(shell_quote("chmod"), "chmod");
        assert_eq!(shell_quote("/home/user/.bashrc"), "/home/user/.bashrc");
    }

    #[test]
    fn spaces_are_quoted() {
        assert_eq!(shell_quote("my file"), "'my file'");
    }

    #[test]
    fn single_quotes_are_escaped() {
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn command_with_dir() {
        let mut cmd = Command::new("ls");
        cmd.arg("-l").current_dir("/tmp");
        assert_eq!(command_line(&cmd), "( cd /tmp && ls -l )");
    }
}
