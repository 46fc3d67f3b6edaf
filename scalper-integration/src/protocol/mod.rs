/// Http [`RestRequest`](http::rest::RestRequest) abstractions and a configurable
/// [`RestClient`](http::rest::client::RestClient).
pub mod http;
