//! Sanitising of client-supplied file names.

/// Reduce a client-supplied file name to a safe, flat ASCII name.
///
/// Path separators become word breaks, whitespace runs become `_`, anything
/// outside `[A-Za-z0-9_.-]` is dropped and leading/trailing dots and
/// underscores are stripped. The result never contains a path component,
/// so it can be joined onto a directory safely. An empty string means the
/// name had nothing usable in it.
#[must_use]
pub fn secure_filename(name: &str) -> String {
    let flattened: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(
            secure_filename("books_db_backup_20240101_000000.zip"),
            "books_db_backup_20240101_000000.zip"
        );
    }

    #[test]
    fn traversal_is_flattened() {
        assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("..\\..\\boot.ini"), "boot.ini");
    }

    #[test]
    fn whitespace_and_symbols() {
        assert_eq!(secure_filename("my cool  file!.zip"), "my_cool_file.zip");
        assert_eq!(secure_filename("ünïcode.zip"), "ncode.zip");
    }

    #[test]
    fn nothing_usable() {
        assert_eq!(secure_filename(""), "");
        assert_eq!(secure_filename("../.."), "");
        assert_eq!(secure_filename("___"), "");
    }
}
