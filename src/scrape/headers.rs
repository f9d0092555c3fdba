use http::header::{AsHeaderName, HeaderName, HeaderValue};
use http::HeaderMap;
use tracing::trace;

/// Build a [`HeaderMap`] from name/value pairs. Names are normalized to
/// lowercase, values holding several newline-separated entries (the CDP
/// encoding of repeated headers) become repeated entries. Pairs that are not
/// valid HTTP headers are skipped.
pub fn header_map<I, K, V>(pairs: I) -> HeaderMap
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        let Ok(header_name) = HeaderName::from_bytes(name.as_ref().trim().as_bytes()) else {
            trace!("skipping invalid header name {:?}", name.as_ref());
            continue;
        };
        for part in value.as_ref().split('\n') {
            match HeaderValue::from_str(part.trim()) {
                Ok(header_value) => {
                    map.append(header_name.clone(), header_value);
                }
                Err(_) => trace!("skipping invalid value for header {}", header_name),
            }
        }
    }
    map
}

/// First value of a header, looked up case-insensitively.
pub fn header_value<K: AsHeaderName>(headers: &HeaderMap, name: K) -> Option<String> {
    headers.get(name).map(|value| match value.to_str() {
        Ok(text) => text.to_string(),
        Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{AUTHORIZATION, CONTENT_TYPE};

    #[test]
    fn test_lookup_is_case_insensitive() {
        let upper = header_map([("Authorization", "Bearer X")]);
        let lower = header_map([("authorization", "Bearer X")]);

        assert_eq!(header_value(&upper, AUTHORIZATION), Some("Bearer X".into()));
        assert_eq!(
            header_value(&upper, AUTHORIZATION),
            header_value(&lower, AUTHORIZATION)
        );
        assert_eq!(header_value(&upper, "AUTHORIZATION"), Some("Bearer X".into()));
    }

    #[test]
    fn test_missing_header_is_none() {
        let headers = header_map([("Content-Type", "text/html")]);
        assert_eq!(header_value(&headers, AUTHORIZATION), None);
        assert_eq!(header_value(&headers, CONTENT_TYPE), Some("text/html".into()));
    }

    #[test]
    fn test_newline_joined_values_are_split() {
        let headers = header_map([("Set-Cookie", "a=1\nb=2")]);
        let values: Vec<_> = headers.get_all("set-cookie").iter().collect();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_invalid_pairs_are_skipped() {
        let headers = header_map([("bad name", "x"), ("x-ok", "fine")]);
        assert_eq!(headers.len(), 1);
        assert_eq!(header_value(&headers, "x-ok"), Some("fine".into()));
    }
}
