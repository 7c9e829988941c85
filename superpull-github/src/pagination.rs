//! Link-header pagination

/// Extract the `rel="next"` address from `Link` header values
///
/// Each value is a comma-separated list of `<url>; rel="<relation>"` pairs.
/// Anything malformed is ignored, so a missing or broken header simply ends
/// pagination.
pub fn next_link<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<String> {
    values
        .into_iter()
        .flat_map(|value| value.split(','))
        .find_map(|link| {
            let mut parts = link.split(';').map(str::trim);
            let target = parts.next()?;
            let url = target.strip_prefix('<')?.strip_suffix('>')?;

            let is_next = parts.any(|param| param == "rel=\"next\"" || param == "rel=next");
            (is_next && !url.is_empty()).then(|| url.to_string())
        })
}
