use anyhow::Result;

/// Status and body of a completed GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Blocking HTTP transport used to reach the open-data portal.
pub trait HttpClient {
    fn get(&self, url: &str) -> Result<HttpResponse>;
}
