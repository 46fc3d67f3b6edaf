use super::{BuildStrategy, rest::RestRequest};
use crate::error::SocketError;
use reqwest::header::HeaderMap;

/// [`RestRequest`] [`BuildStrategy`] that adds a fixed set of headers to every request.
#[derive(Debug, Clone, Default)]
pub struct PublicHeaders {
    pub headers: HeaderMap,
}

impl PublicHeaders {
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }
}

impl BuildStrategy for PublicHeaders {
    fn build<Request>(
        &self,
        _: Request,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Request, SocketError>
    where
        Request: RestRequest,
    {
        builder
            .headers(self.headers.clone())
            .build()
            .map_err(SocketError::from)
    }
}
