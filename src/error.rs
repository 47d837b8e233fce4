use std::fmt;

/// Error type for reqstate
///
/// These are the request-level failures the machines record into their
/// terminal states and surface through `FailRequest`/`FailTask` actions.
/// The variants that the machines never produce themselves
/// (`ConnectTimeout`, `UnsupportedApplicationProtocol`) belong to the
/// transport bootstrap and are routed through `error_happened`/`fail` by
/// the connection owner.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
#[non_exhaustive]
pub enum Error {
    Cancelled,
    RemoteConnectionClosed,
    ReadTimeout,
    ConnectTimeout,
    BodyLengthMismatch,
    WriteAfterRequestSent,
    RequestStreamCancelled,
    UnsupportedApplicationProtocol(String),
    InvalidContentLength(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Cancelled => write!(f, "request was cancelled"),
            Error::RemoteConnectionClosed => write!(f, "remote closed the connection"),
            Error::ReadTimeout => write!(f, "read timed out"),
            Error::ConnectTimeout => write!(f, "connect timed out"),
            Error::BodyLengthMismatch => {
                write!(f, "request body does not match the announced length")
            }
            Error::WriteAfterRequestSent => {
                write!(f, "attempt to write body after the request end was sent")
            }
            Error::RequestStreamCancelled => write!(f, "request body stream was cancelled"),
            Error::UnsupportedApplicationProtocol(v) => {
                write!(f, "server offered unsupported application protocol: {}", v)
            }
            Error::InvalidContentLength(v) => {
                write!(f, "content-length header not a number: {}", v)
            }
        }
    }
}
