/// Errors returned by [`Client`](crate::Client).
///
/// Callers should branch on the variant, not on the message text. Every
/// variant carries an integer code, see [`Error::code`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request never produced a response (connect failure, timeout, DNS...).
    ///
    /// `code` follows the curl error numbering.
    #[error("transport error {code}: {message}")]
    Transport { code: i64, message: String },

    /// The body was not valid JSON, was nested too deeply, or did not have the
    /// expected shape.
    #[error("Topsy response is invalid, unexpected: {message}")]
    MalformedResponse { message: String },

    /// The JSON envelope has no `response` field.
    #[error("Topsy response is empty")]
    EmptyResponse,

    /// The API reported one or more errors inside the envelope.
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    /// The resource name was empty; no request was sent.
    #[error("invalid resource name {resource:?}")]
    InvalidResource { resource: String },
}

pub type Result<T> = std::result::Result<T, Error>;

// curl error numbers used for transport failures.
pub(crate) const CODE_FAILED_INIT: i64 = 2;
pub(crate) const CODE_URL_MALFORMAT: i64 = 3;
pub(crate) const CODE_COULDNT_CONNECT: i64 = 7;
pub(crate) const CODE_OPERATION_TIMEDOUT: i64 = 28;
pub(crate) const CODE_TOO_MANY_REDIRECTS: i64 = 47;
pub(crate) const CODE_RECV_ERROR: i64 = 56;

const ERROR_CODES: &[(i64, &str)] = &[
    // A required parameter is missing or out of bounds.
    (400, "Parameter check failed."),
    (403, "Forbidden. You don't have access to this action."),
    (404, "Action not supported."),
    (500, "Unexpected internal error."),
    // Either the token allocation ran out or the API is down.
    (503, "Temporarily unavailable."),
];

/// Well-known message for a Topsy error code, if there is one.
pub fn default_message(code: i64) -> Option<&'static str> {
    ERROR_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, msg)| *msg)
}

impl Error {
    /// The numeric code of this error.
    ///
    /// Transport errors carry the transport code, API errors the status the
    /// API reported. Malformed and empty responses are always 500.
    pub fn code(&self) -> i64 {
        match self {
            Error::Transport { code, .. } | Error::Api { code, .. } => *code,
            Error::MalformedResponse { .. } | Error::EmptyResponse => 500,
            Error::InvalidResource { .. } => 400,
        }
    }

    pub(crate) fn transport(code: i64, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = default_message(code).unwrap_or_default().to_string();
        }
        Error::Transport { code, message }
    }

    pub(crate) fn api(code: i64, message: String) -> Self {
        let message = if message.is_empty() {
            default_message(code).unwrap_or_default().to_string()
        } else {
            message
        };
        Error::Api { code, message }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedResponse {
            message: message.into(),
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            CODE_OPERATION_TIMEDOUT
        } else if err.is_connect() {
            CODE_COULDNT_CONNECT
        } else if err.is_redirect() {
            CODE_TOO_MANY_REDIRECTS
        } else if err.is_body() || err.is_decode() {
            CODE_RECV_ERROR
        } else if err.is_builder() || err.is_request() {
            CODE_URL_MALFORMAT
        } else {
            0
        };
        Error::transport(code, err.to_string())
    }
}
