use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::collections::BTreeMap;

// RFC 3986 unreserved characters stay as-is, everything else is escaped.
const RAW_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub(crate) fn raw_encode(s: &str) -> String {
    utf8_percent_encode(s, RAW_ENCODE).to_string()
}

/// Builds `k=v&k=v` with every key and value percent-encoded and the pairs
/// ordered by encoded key.
pub(crate) fn build_query<K, V>(params: impl IntoIterator<Item = (K, V)>) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs = BTreeMap::new();
    for (k, v) in params {
        let k = raw_encode(k.as_ref());
        let v = raw_encode(v.as_ref());
        // Later duplicates win, same as assigning into a map.
        pairs.insert(k, v);
    }

    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) fn urljoin(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

pub(crate) fn resource_url(base: &str, resource: &str, query: &str) -> String {
    let mut url = urljoin(base, &format!("{}.json", resource));
    if !query.is_empty() {
        url.push('?');
        url.push_str(query);
    }
    url
}
