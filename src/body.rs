use http::{header, HeaderMap};

use crate::Error;

/// How the request body is framed on the wire.
///
/// This is immutable input to the connection machine; it decides whether a
/// body producer is started at all and how many bytes it is allowed to
/// send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// No request body.
    None,
    /// A body of exactly this many bytes (`content-length`).
    FixedSize(u64),
    /// A body of unknown length (`transfer-encoding: chunked`).
    Stream,
}

impl BodyFraming {
    /// Derive the framing from request headers.
    ///
    /// `Transfer-Encoding: chunked` wins over `Content-Length`. A
    /// `Content-Length` that is not a single parseable number is an error.
    pub fn from_request_headers(headers: &HeaderMap) -> Result<BodyFraming, Error> {
        let chunked = headers
            .get_all(header::TRANSFER_ENCODING)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|v| v.trim().eq_ignore_ascii_case("chunked"));

        if chunked {
            return Ok(BodyFraming::Stream);
        }

        let mut lengths = headers.get_all(header::CONTENT_LENGTH).iter();

        let Some(first) = lengths.next() else {
            return Ok(BodyFraming::None);
        };

        if lengths.any(|v| v != first) {
            let text = String::from_utf8_lossy(first.as_bytes()).to_string();
            return Err(Error::InvalidContentLength(text));
        }

        let length = first
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or_else(|| {
                let text = String::from_utf8_lossy(first.as_bytes()).to_string();
                Error::InvalidContentLength(text)
            })?;

        Ok(BodyFraming::FixedSize(length))
    }

    /// Whether a body producer needs to run at all.
    ///
    /// A zero length body is sent together with the head.
    pub fn has_body(&self) -> bool {
        !matches!(self, BodyFraming::None | BodyFraming::FixedSize(0))
    }

    pub(crate) fn expected_length(&self) -> Option<u64> {
        match self {
            BodyFraming::FixedSize(n) => Some(*n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(
                k.parse::<http::header::HeaderName>().unwrap(),
                v.parse().unwrap(),
            );
        }
        map
    }

    #[test]
    fn no_framing_headers() {
        let framing = BodyFraming::from_request_headers(&HeaderMap::new()).unwrap();
        assert_eq!(framing, BodyFraming::None);
        assert!(!framing.has_body());
    }

    #[test]
    fn content_length() {
        let framing =
            BodyFraming::from_request_headers(&headers(&[("content-length", "42")])).unwrap();
        assert_eq!(framing, BodyFraming::FixedSize(42));
        assert!(framing.has_body());
    }

    #[test]
    fn zero_content_length_has_no_body() {
        let framing =
            BodyFraming::from_request_headers(&headers(&[("content-length", "0")])).unwrap();
        assert_eq!(framing, BodyFraming::FixedSize(0));
        assert!(!framing.has_body());
    }

    #[test]
    fn chunked_wins_over_content_length() {
        let framing = BodyFraming::from_request_headers(&headers(&[
            ("content-length", "42"),
            ("transfer-encoding", "gzip, chunked"),
        ]))
        .unwrap();
        assert_eq!(framing, BodyFraming::Stream);
    }

    #[test]
    fn repeated_equal_content_length_is_accepted() {
        let framing = BodyFraming::from_request_headers(&headers(&[
            ("content-length", "5"),
            ("content-length", "5"),
        ]))
        .unwrap();
        assert_eq!(framing, BodyFraming::FixedSize(5));
    }

    #[test]
    fn conflicting_content_length_is_rejected() {
        let err = BodyFraming::from_request_headers(&headers(&[
            ("content-length", "5"),
            ("content-length", "6"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidContentLength(_)));
    }
}
