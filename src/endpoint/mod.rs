//! HTTP-shaped wrappers for the token endpoint, the end-user endpoint, and
//! the protected resource guard.
//!
//! The crate does not speak HTTP itself. The host server parses each
//! incoming request (method, `Authorization` header, decoded query string,
//! and decoded `application/x-www-form-urlencoded` body) into a [`Request`]
//! and maps the returned [`Response`] back onto its own response type. Both
//! types are deliberately plain data so that any server library can adapt
//! them without a trait dance.
//!
//! [`Request`]: struct.Request.html
//! [`Response`]: struct.Response.html

pub mod authorization;
pub mod format;
pub mod params;
pub mod query;
pub mod resource;
pub mod token;

#[cfg(test)]
mod tests;

use url::Url;

use self::query::NormalizedParameter;

/// Request methods the endpoints distinguish.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Method {
    /// HTTP GET.
    Get,
    /// HTTP POST.
    Post,
    /// HTTP PUT.
    Put,
    /// HTTP DELETE.
    Delete,
}

impl Method {
    /// Whether a request body is expected with this method.
    pub fn allows_body(self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

/// A fully parsed HTTP request as handed over by the host server.
///
/// `body` is `Some` exactly when the request carried an
/// `application/x-www-form-urlencoded` body; other content types must not be
/// decoded into it.
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    authorization: Option<String>,
    query: NormalizedParameter,
    body: Option<NormalizedParameter>,
}

impl Request {
    /// Start a request with the given method and no parameters.
    pub fn new(method: Method) -> Self {
        Request {
            method,
            authorization: None,
            query: NormalizedParameter::new(),
            body: None,
        }
    }

    /// Attach the raw value of the `Authorization` header.
    pub fn with_authorization(mut self, header: impl Into<String>) -> Self {
        self.authorization = Some(header.into());
        self
    }

    /// Attach decoded query parameters. Repeated keys poison the entry.
    pub fn with_query<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query = pairs.into_iter().collect();
        self
    }

    /// Attach a decoded form body. Repeated keys poison the entry.
    pub fn with_body<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.body = Some(pairs.into_iter().collect());
        self
    }

    pub(crate) fn method(&self) -> Method {
        self.method
    }

    pub(crate) fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    pub(crate) fn query(&self) -> &NormalizedParameter {
        &self.query
    }

    pub(crate) fn body(&self) -> Option<&NormalizedParameter> {
        self.body.as_ref()
    }
}

/// HTTP statuses the endpoints produce.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Status {
    /// 200.
    Ok,
    /// 302, a redirect to the client's redirection uri.
    Found,
    /// 400.
    BadRequest,
    /// 401.
    Unauthorized,
    /// 403.
    Forbidden,
    /// 405.
    MethodNotAllowed,
    /// 500.
    InternalServerError,
}

impl Status {
    /// The numeric status code.
    pub fn as_u16(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Found => 302,
            Status::BadRequest => 400,
            Status::Unauthorized => 401,
            Status::Forbidden => 403,
            Status::MethodNotAllowed => 405,
            Status::InternalServerError => 500,
        }
    }
}

/// The response the host server translates back onto the wire.
#[derive(Clone, Debug)]
pub struct Response {
    /// Status code of the response.
    pub status: Status,

    /// A `Location` header target, set on redirects.
    pub location: Option<Url>,

    /// A `WWW-Authenticate` challenge, set on 401/403 answers.
    pub www_authenticate: Option<String>,

    /// The media type of `body`.
    pub content_type: Option<String>,

    /// Whether the host must send `Cache-Control: no-store` and
    /// `Pragma: no-cache`, as required for token responses.
    pub no_store: bool,

    /// The encoded response body.
    pub body: Option<String>,
}

impl Response {
    /// A bare response with the given status.
    pub fn with_status(status: Status) -> Self {
        Response {
            status,
            location: None,
            www_authenticate: None,
            content_type: None,
            no_store: false,
            body: None,
        }
    }

    /// A response with a typed body.
    pub fn payload(status: Status, content_type: impl Into<String>, body: String) -> Self {
        Response {
            status,
            location: None,
            www_authenticate: None,
            content_type: Some(content_type.into()),
            no_store: false,
            body: Some(body),
        }
    }

    /// A redirect to the given target.
    pub fn redirect(url: Url) -> Self {
        Response {
            status: Status::Found,
            location: Some(url),
            www_authenticate: None,
            content_type: None,
            no_store: false,
            body: None,
        }
    }

    pub(crate) fn method_not_allowed() -> Self {
        Response::with_status(Status::MethodNotAllowed)
    }

    pub(crate) fn no_store(mut self) -> Self {
        self.no_store = true;
        self
    }

    /// Assemble the headers the host must set, ready to copy over.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if let Some(location) = &self.location {
            headers.push(("Location", location.to_string()));
        }
        if let Some(challenge) = &self.www_authenticate {
            headers.push(("WWW-Authenticate", challenge.clone()));
        }
        if let Some(content_type) = &self.content_type {
            headers.push(("Content-Type", content_type.clone()));
        }
        if self.no_store {
            headers.push(("Cache-Control", "no-store".to_string()));
            headers.push(("Pragma", "no-cache".to_string()));
        }
        headers
    }
}
