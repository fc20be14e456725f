use std::time::Duration;

use anyhow::Result;

use super::client::{HttpClient, HttpResponse};

pub struct BasicClient(reqwest::blocking::Client);

impl BasicClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self(client))
    }
}

impl HttpClient for BasicClient {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        let resp = self.0.get(url).send()?;
        let status = resp.status().as_u16();
        let body = resp.bytes()?.to_vec();
        Ok(HttpResponse { status, body })
    }
}
