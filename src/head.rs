use http::{request, response, HeaderMap, Method, StatusCode, Uri, Version};

/// The prelude of a request: method, uri, version and headers.
///
/// The connection machine treats the head as opaque. It is stored while the
/// channel is not writable and handed back out through `SendRequestHead`
/// once it is; nothing in it is inspected.
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// Request method.
    pub method: Method,
    /// Request uri.
    pub uri: Uri,
    /// HTTP version.
    pub version: Version,
    /// Request headers.
    pub headers: HeaderMap,
}

impl RequestHead {
    /// Create a head with default version and no headers.
    pub fn new(method: Method, uri: Uri) -> Self {
        RequestHead {
            method,
            uri,
            version: Version::default(),
            headers: HeaderMap::new(),
        }
    }
}

impl From<request::Parts> for RequestHead {
    fn from(parts: request::Parts) -> Self {
        RequestHead {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
        }
    }
}

/// The prelude of a response: status, version and headers.
///
/// The machines only ever branch on [`status`][ResponseHead::status]. The
/// rest rides along for the task side (the redirect predicate reads the
/// headers, the delegate receives the whole head).
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// Response status.
    pub status: StatusCode,
    /// HTTP version.
    pub version: Version,
    /// Response headers.
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// Create a head with default version and no headers.
    pub fn new(status: StatusCode) -> Self {
        ResponseHead {
            status,
            version: Version::default(),
            headers: HeaderMap::new(),
        }
    }

    /// 1xx responses are consumed by the connection side and never
    /// forwarded.
    pub(crate) fn is_informational(&self) -> bool {
        self.status.is_informational()
    }
}

impl From<response::Parts> for ResponseHead {
    fn from(parts: response::Parts) -> Self {
        ResponseHead {
            status: parts.status,
            version: parts.version,
            headers: parts.headers,
        }
    }
}

/// Once a status of 300 or above is seen, the upload is cut short: the
/// producer is paused for good and remaining request body parts are
/// discarded.
pub(crate) fn short_circuits_upload(status: StatusCode) -> bool {
    status.as_u16() >= 300
}
