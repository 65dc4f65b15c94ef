//! Pulls the body out of a `Connection: close` HTTP/1.1 exchange. The head
//! and chunk sizes are parsed by `httparse`.

use httparse::{EMPTY_HEADER, Status};

use crate::error::FetchError;

const MAX_HEADERS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    /// Decoded as lossy UTF-8; a broken body is left for the JSON step to reject.
    pub body: String,
}

impl HttpResponse {
    pub fn decode(raw: &[u8]) -> Result<Self, FetchError> {
        let mut headers = [EMPTY_HEADER; MAX_HEADERS];
        let mut head = httparse::Response::new(&mut headers);

        let head_len = match head.parse(raw) {
            Ok(Status::Complete(len)) => len,
            Ok(Status::Partial) => return Err(malformed("incomplete response head")),
            Err(err) => return Err(malformed(&err.to_string())),
        };

        let mut response = Self {
            status: head.code.unwrap_or_default(),
            reason: head.reason.unwrap_or_default().to_owned(),
            headers: head
                .headers
                .iter()
                .map(|header| {
                    (
                        header.name.to_owned(),
                        String::from_utf8_lossy(header.value).trim().to_owned(),
                    )
                })
                .collect(),
            body: String::new(),
        };

        let payload = &raw[head_len..];
        let body = if response
            .header("transfer-encoding")
            .is_some_and(|value| value.to_ascii_lowercase().contains("chunked"))
        {
            decode_chunked(payload)?
        } else if let Some(length) = response.header("content-length") {
            let length: usize = length
                .parse()
                .map_err(|_| malformed(&format!("bad content-length '{length}'")))?;
            payload
                .get(..length)
                .ok_or_else(|| malformed("body shorter than content-length"))?
                .to_vec()
        } else {
            payload.to_vec()
        };

        response.body = String::from_utf8_lossy(&body).into_owned();
        Ok(response)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn decode_chunked(mut data: &[u8]) -> Result<Vec<u8>, FetchError> {
    let mut body = Vec::new();

    loop {
        let (consumed, size) = match httparse::parse_chunk_size(data) {
            Ok(Status::Complete(chunk)) => chunk,
            Ok(Status::Partial) => return Err(malformed("truncated chunk size")),
            Err(_) => return Err(malformed("bad chunk size")),
        };

        if size == 0 {
            return Ok(body);
        }

        let size = usize::try_from(size).map_err(|_| malformed("chunk too large"))?;
        data = &data[consumed..];
        let chunk = data.get(..size).ok_or_else(|| malformed("truncated chunk"))?;
        body.extend_from_slice(chunk);

        data = &data[size..];
        data = data
            .strip_prefix(b"\r\n")
            .or_else(|| data.strip_prefix(b"\n"))
            .unwrap_or(data);
    }
}

fn malformed(reason: &str) -> FetchError {
    FetchError::MalformedResponse(reason.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_is_cut_at_content_length() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{}trailing";
        let response = HttpResponse::decode(raw).expect("decode");

        assert_eq!(response.status, 200);
        assert_eq!(response.reason, "OK");
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.body, "{}");
    }

    #[test]
    fn bare_line_feeds_are_accepted() {
        let response =
            HttpResponse::decode(b"HTTP/1.1 200 OK\nContent-Length: 2\n\n{}").expect("decode");

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "{}");
    }

    #[test]
    fn chunked_body_is_reassembled() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n7\r\n{\"main\"\r\n6;ext=1\r\n:{}}xx\r\n0\r\n\r\n";
        let response = HttpResponse::decode(raw).expect("decode");

        assert_eq!(response.body, "{\"main\":{}}xx");
    }

    #[test]
    fn body_without_length_runs_to_close() {
        let raw = b"HTTP/1.0 200 OK\r\n\r\n{\"cod\":200}";
        let response = HttpResponse::decode(raw).expect("decode");

        assert_eq!(response.body, "{\"cod\":200}");
    }

    #[test]
    fn non_utf8_body_is_returned_not_rejected() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\n{\xff}";
        let response = HttpResponse::decode(raw).expect("decode");

        assert_eq!(response.body, "{\u{fffd}}");
        assert!(serde_json::from_str::<serde_json::Value>(&response.body).is_err());
    }

    #[test]
    fn error_status_still_yields_body() {
        let raw = b"HTTP/1.1 404 Not Found\r\nContent-Length: 40\r\n\r\n{\"cod\":\"404\",\"message\":\"city not found\"}";
        let response = HttpResponse::decode(raw).expect("decode");

        assert!(!response.is_success());
        assert_eq!(response.status, 404);
        assert!(response.body.contains("city not found"));
    }

    #[test]
    fn garbage_is_malformed() {
        let err = HttpResponse::decode(b"hello\r\n\r\n").unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));

        let err = HttpResponse::decode(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n{}")
            .unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));

        let err = HttpResponse::decode(b"").unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }
}
