//! POSIX shell quoting for reconstructed command lines.

fn is_safe(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | ',' | '_' | '=' | '+' | '/' | '@' | ':' | '-')
}

/// Quote a single argument so a POSIX shell reads it back as one word.
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    for segment in split_keeping_quotes(arg) {
        if segment == "'" {
            quoted.push_str("\\'");
        } else if segment.chars().all(is_safe) {
            quoted.push_str(segment);
        } else {
            quoted.push('\'');
            quoted.push_str(segment);
            quoted.push('\'');
        }
    }
    quoted
}

/// Join `args` into one shell-safe command line. Arguments made only of
/// safe characters stay unquoted.
pub fn quote_command<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|arg| quote_arg(arg.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split on `'`, yielding each quote as its own segment and dropping the
/// empty pieces between adjacent quotes.
fn split_keeping_quotes(arg: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    for (idx, ch) in arg.char_indices() {
        if ch == '\'' {
            if start < idx {
                segments.push(&arg[start..idx]);
            }
            segments.push(&arg[idx..idx + 1]);
            start = idx + 1;
        }
    }
    if start < arg.len() {
        segments.push(&arg[start..]);
    }
    segments
}
