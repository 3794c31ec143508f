use reqwest::header::HeaderMap;

/// The headers of a response, as received: a list of `(name, values)` pairs in the order each
/// name first appeared.  Names are lower-case, and lookups ignore case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders(Vec<(String, Vec<String>)>);

impl ResponseHeaders {
    /// All values for the named header, or None if it is absent
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    /// The first value for the named header
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// The Content-Length, if present and valid
    pub fn content_length(&self) -> Option<u64> {
        self.first("content-length")
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&HeaderMap> for ResponseHeaders {
    fn from(map: &HeaderMap) -> Self {
        let mut headers: Vec<(String, Vec<String>)> = Vec::with_capacity(map.keys_len());
        for (name, value) in map.iter() {
            // values that are not visible ASCII are passed through lossily
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            match headers.iter_mut().find(|(n, _)| n.as_str() == name.as_str()) {
                Some((_, values)) => values.push(value),
                None => headers.push((name.as_str().to_owned(), vec![value])),
            }
        }
        ResponseHeaders(headers)
    }
}
