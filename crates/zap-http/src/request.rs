use crate::error::ParseError;

/// Maximum number of header lines httparse will parse per request.
pub const MAX_HEADERS: usize = 64;

/// A parsed request head. Every string here borrows from the single
/// contiguous buffer the connection read into; nothing is copied.
#[derive(Debug, Clone)]
pub struct ParsedRequest<'a> {
    pub method: &'a str,
    /// Full request-target as sent on the wire, including any query string.
    pub path: &'a str,
    /// `path` with the query string stripped.
    pub path_only: &'a str,
    pub query: Vec<(&'a str, &'a str)>,
    pub headers: Vec<(&'a str, &'a str)>,
    pub cookies: Vec<(&'a str, &'a str)>,
    /// Byte range of the body within the buffer that was parsed.
    pub body_range: std::ops::Range<usize>,
}

impl<'a> ParsedRequest<'a> {
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    pub fn body<'b>(&self, buf: &'b [u8]) -> &'b [u8] {
        &buf[self.body_range.clone()]
    }
}

/// Parse a request head out of `buf`. Returns `Ok(None)` when the buffer
/// does not yet contain a full header section (the caller should read more
/// and retry); headers growing past `max_header_bytes` is treated as a hard
/// error rather than "keep waiting", so a slow-loris head can't grow the
/// buffer unbounded.
pub fn parse_request_head<'a>(
    buf: &'a [u8],
    max_header_bytes: usize,
) -> Result<Option<ParsedRequest<'a>>, ParseError> {
    if buf.len() > max_header_bytes {
        return Err(ParseError::HeaderTooLarge {
            limit: max_header_bytes,
        });
    }

    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut raw_headers);

    let body_start = match req.parse(buf) {
        Ok(httparse::Status::Complete(offset)) => offset,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(_) => return Err(ParseError::MalformedHeaders),
    };

    let method = req.method.ok_or(ParseError::BadMethod)?;
    let path = req.path.ok_or(ParseError::MalformedHeaders)?;

    let (path_only, query) = split_query(path);

    let headers = req
        .headers
        .iter()
        .map(|h| {
            let value = std::str::from_utf8(h.value).map_err(|_| ParseError::MalformedHeaders)?;
            Ok((h.name, value))
        })
        .collect::<Result<Vec<_>, ParseError>>()?;

    let cookies = headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case("cookie"))
        .flat_map(|(_, v)| parse_cookie_header(v))
        .collect();

    Ok(Some(ParsedRequest {
        method,
        path,
        path_only,
        query,
        headers,
        cookies,
        body_range: body_start..buf.len(),
    }))
}

fn split_query(path: &str) -> (&str, Vec<(&str, &str)>) {
    match path.split_once('?') {
        None => (path, Vec::new()),
        Some((p, q)) => (p, parse_query_string(q)),
    }
}

fn parse_query_string(q: &str) -> Vec<(&str, &str)> {
    q.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        })
        .collect()
}

fn parse_cookie_header(header: &str) -> Vec<(&str, &str)> {
    header
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|kv| kv.split_once('='))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_method_path_query_headers_and_body() {
        let raw = b"GET /api/users?sort=asc&dir=desc HTTP/1.1\r\nHost: example.com\r\nCookie: a=1; b=2\r\nContent-Length: 4\r\n\r\nbody";
        let parsed = parse_request_head(raw, 8192).unwrap().unwrap();
        assert_eq!(parsed.method, "GET");
        assert_eq!(parsed.path_only, "/api/users");
        assert_eq!(parsed.query, vec![("sort", "asc"), ("dir", "desc")]);
        assert_eq!(parsed.header("host"), Some("example.com"));
        assert_eq!(parsed.cookies, vec![("a", "1"), ("b", "2")]);
        assert_eq!(parsed.body(raw), b"body");
    }

    #[test]
    fn reports_partial_for_incomplete_head() {
        let raw = b"GET /api/users HTTP/1.1\r\nHost: example";
        assert!(parse_request_head(raw, 8192).unwrap().is_none());
    }

    #[test]
    fn rejects_oversized_header_section() {
        let raw = vec![b'a'; 200];
        let err = parse_request_head(&raw, 100).unwrap_err();
        assert_eq!(err, ParseError::HeaderTooLarge { limit: 100 });
    }

    #[test]
    fn rejects_malformed_request_line() {
        let raw = b"not a request\r\n\r\n";
        assert_eq!(
            parse_request_head(raw, 8192).unwrap_err(),
            ParseError::MalformedHeaders
        );
    }
}
