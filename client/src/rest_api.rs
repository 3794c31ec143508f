//! Paths and headers for the nimbus.io REST API.
//!
//! These are plain string builders; the request orchestrator sends whatever they return
//! verbatim.  Keys and query values are percent-encoded.

use crate::util::urlencode;

fn data_path(key: &str) -> String {
    format!("/data/{}", urlencode(key))
}

fn with_query(path: String, query: &[(&str, &str)]) -> String {
    if query.is_empty() {
        return path;
    }
    let query = query
        .iter()
        .map(|(name, value)| format!("{}={}", name, urlencode(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", path, query)
}

/// Path to POST a key's data
pub fn archive_path(key: &str) -> String {
    data_path(key)
}

/// Path to POST one part of a conjoined archive.  Parts are numbered from 1.
pub fn conjoined_part_archive_path(key: &str, conjoined_identifier: &str, part: u32) -> String {
    let part = part.to_string();
    with_query(
        data_path(key),
        &[
            ("conjoined_identifier", conjoined_identifier),
            ("conjoined_part", &part),
        ],
    )
}

/// Path to GET a key's data
pub fn retrieve_path(key: &str) -> String {
    data_path(key)
}

/// Path to HEAD a key
pub fn head_path(key: &str) -> String {
    data_path(key)
}

/// Path to GET the keys in a collection that start with `prefix`
pub fn list_keys_path(prefix: &str) -> String {
    with_query("/data/".to_owned(), &[("prefix", prefix)])
}

/// Path to GET every version of the keys in a collection that start with `prefix`
pub fn list_versions_path(prefix: &str) -> String {
    with_query(
        "/data/".to_owned(),
        &[("versions", "true"), ("prefix", prefix)],
    )
}

/// Path to POST to begin a conjoined archive of `key`
pub fn start_conjoined_path(key: &str) -> String {
    with_query(
        format!("/conjoined/{}", urlencode(key)),
        &[("action", "start")],
    )
}

/// Path to POST to complete a conjoined archive
pub fn finish_conjoined_path(key: &str, conjoined_identifier: &str) -> String {
    with_query(
        format!("/conjoined/{}", urlencode(key)),
        &[
            ("action", "finish"),
            ("conjoined_identifier", conjoined_identifier),
        ],
    )
}

/// The `Range` header selecting `size` bytes starting at `offset`, or everything from
/// `offset` to the end when `size` is None.  A size of zero is treated as None, since an
/// empty byte range cannot be expressed, and so is a range reaching past `u64::MAX`.
pub fn range_header(offset: u64, size: Option<u64>) -> (&'static str, String) {
    let last = size
        .filter(|size| *size > 0)
        .and_then(|size| offset.checked_add(size - 1));
    let value = match last {
        Some(last) => format!("bytes={}-{}", offset, last),
        None => format!("bytes={}-", offset),
    };
    ("Range", value)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn data_paths() {
        assert_eq!(archive_path("aaa/key 1"), "/data/aaa%2Fkey%201");
        assert_eq!(retrieve_path("simple"), "/data/simple");
        assert_eq!(head_path("a~b_c.d-e"), "/data/a~b_c.d-e");
    }

    #[test]
    fn conjoined_paths() {
        assert_eq!(
            conjoined_part_archive_path("aaa/big", "c0ffee", 2),
            "/data/aaa%2Fbig?conjoined_identifier=c0ffee&conjoined_part=2"
        );
        assert_eq!(
            start_conjoined_path("aaa/big"),
            "/conjoined/aaa%2Fbig?action=start"
        );
        assert_eq!(
            finish_conjoined_path("aaa/big", "c0ffee"),
            "/conjoined/aaa%2Fbig?action=finish&conjoined_identifier=c0ffee"
        );
    }

    #[test]
    fn listing_paths() {
        assert_eq!(list_keys_path("aaa"), "/data/?prefix=aaa");
        assert_eq!(list_keys_path("a/b"), "/data/?prefix=a%2Fb");
        assert_eq!(
            list_versions_path("bbb"),
            "/data/?versions=true&prefix=bbb"
        );
    }

    #[test]
    fn ranges() {
        assert_eq!(range_header(0, Some(10)), ("Range", "bytes=0-9".to_owned()));
        assert_eq!(
            range_header(100, Some(1)),
            ("Range", "bytes=100-100".to_owned())
        );
        assert_eq!(range_header(7, None), ("Range", "bytes=7-".to_owned()));
        assert_eq!(range_header(7, Some(0)), ("Range", "bytes=7-".to_owned()));
    }

    #[test]
    fn range_past_end_of_u64() {
        assert_eq!(
            range_header(u64::MAX, Some(2)),
            ("Range", format!("bytes={}-", u64::MAX))
        );
        assert_eq!(
            range_header(u64::MAX - 1, Some(2)),
            ("Range", format!("bytes={}-{}", u64::MAX - 1, u64::MAX))
        );
        assert_eq!(
            range_header(0, Some(u64::MAX)),
            ("Range", format!("bytes=0-{}", u64::MAX - 1))
        );
    }
}
