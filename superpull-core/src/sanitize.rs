//! Folder names derived from clone URLs

/// Placeholder for every character that is not allowed in a folder name
const PLACEHOLDER: char = '_';

/// Derive a filesystem-safe folder name from a repository URL
///
/// The last path segment is lowercased; letters, digits, `-` and `.` are
/// kept and everything else becomes `_`. Runs of `_` never survive, so the
/// result is stable under repeated application. Any `.git` suffix is left
/// in place: trimming it is the enumerator's job.
pub fn sanitize(url: &str) -> String {
    let replaced = url.replace("%20", "_");
    let last = match replaced.rfind('/') {
        Some(index) => &replaced[index + 1..],
        None => replaced.as_str(),
    };

    let mut name = String::with_capacity(last.len());
    for c in last.to_lowercase().chars() {
        let c = if c.is_alphanumeric() || c == '-' || c == '.' {
            c
        } else {
            PLACEHOLDER
        };

        if c == PLACEHOLDER && name.ends_with(PLACEHOLDER) {
            continue;
        }
        name.push(c);
    }

    name
}
