/// What the connection owner must do with the channel once a request has
/// reached a terminal action.
///
/// Attached to every `SucceedRequest`/`FailRequest` so the owner can decide
/// whether the connection is still good for keep-alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalStreamAction {
    /// The wire is no longer synchronized with the peer. Tear the channel
    /// down; keep-alive cannot be preserved.
    Close,

    /// The request succeeded, but the terminating body chunk still needs
    /// to be written out.
    SendRequestEnd,

    /// The request never reached the wire. The connection is unaffected.
    None,
}

impl FinalStreamAction {
    pub(crate) fn explain(&self) -> &'static str {
        match self {
            FinalStreamAction::Close => "channel must be torn down",
            FinalStreamAction::SendRequestEnd => "request end still needs to be written",
            FinalStreamAction::None => "connection unaffected",
        }
    }
}
