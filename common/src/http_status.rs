//! HTTP status categorization for the request/response transport binding.
//!
//! The RPC body is authoritative, so clients only consult the status when a
//! response body cannot be decoded. Servers pick one of the constants below.

/// HTTP status code returned by an RPC endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpStatusCode(pub u16);

impl HttpStatusCode {
    pub const OK: Self = HttpStatusCode(200);
    pub const NOT_FOUND: Self = HttpStatusCode(404);
    pub const METHOD_NOT_ALLOWED: Self = HttpStatusCode(405);
    pub const INTERNAL_SERVER_ERROR: Self = HttpStatusCode(500);
    pub const SERVICE_UNAVAILABLE: Self = HttpStatusCode(503);

    /// Reason phrase for a status line. Codes outside the ones above get a
    /// class-level phrase.
    pub fn reason(&self) -> &'static str {
        match self.0 {
            200 => "OK",
            404 => "Not Found",
            405 => "Method Not Allowed",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ if self.is_success() => "Success",
            _ if self.is_client_error() => "Client Error",
            _ if self.is_server_error() => "Server Error",
            _ => "Unknown",
        }
    }

    /// 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    /// 4xx client errors (malformed request, wrong endpoint).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    /// 5xx server errors.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.0)
    }

    /// 503: the endpoint is up but its smart-card platform could not be built.
    pub fn is_unavailable(&self) -> bool {
        self.0 == 503
    }
}

impl From<u16> for HttpStatusCode {
    fn from(code: u16) -> Self {
        HttpStatusCode(code)
    }
}

impl std::fmt::Display for HttpStatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {}", self.0)
    }
}
