use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, PercentEncode, NON_ALPHANUMERIC};

// the characters left alone by urllib.parse.quote with safe="", which is what nimbus.io
// servers expect for keys and query values
const NOT_ENCODED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~');

pub(crate) fn urlencode(input: &str) -> PercentEncode<'_> {
    utf8_percent_encode(input, NOT_ENCODED)
}

/// Decode a URL path the way the service does before checking a signature: `+` becomes a
/// space, then percent-escapes are decoded.  Invalid UTF-8 is replaced rather than rejected.
pub(crate) fn unquote_plus(input: &str) -> String {
    let spaced = input.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
