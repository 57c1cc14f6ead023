use crate::{Error, Result, fetch::RangedFetcher};
use reqwest::{
    blocking::{Client, RequestBuilder},
    header,
};
use std::path::PathBuf;

pub const DEFAULT_ORACLE: &str = "127.0.0.1:10020";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/51.0.2704.103 Safari/537.36";

/// Everything a rip needs to know, passed down explicitly.
#[derive(Clone, Debug)]
pub struct Session {
    pub client: Client,
    /// Bearer token for catalog requests.
    pub token: Option<String>,
    /// Socket address of the decryption oracle.
    pub oracle: String,
    pub threads: usize,
    pub retries: u8,
    /// Root directory of ripped albums.
    pub output: PathBuf,
    pub codec: String,
    /// Whether progress bars are drawn.
    pub progress: bool,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn fetcher(&self) -> RangedFetcher {
        RangedFetcher::new(self.client.clone(), self.threads, self.retries)
    }

    /// GET request to the catalog, authorized when a token is set.
    pub fn catalog_request(&self, url: &str) -> RequestBuilder {
        let request = self.client.get(url);

        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

pub struct SessionBuilder {
    user_agent: String,
    token: Option<String>,
    oracle: String,
    threads: usize,
    retries: u8,
    output: PathBuf,
    codec: String,
    progress: bool,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            token: None,
            oracle: DEFAULT_ORACLE.to_owned(),
            threads: 10,
            retries: 5,
            output: PathBuf::from("."),
            codec: "alac".to_owned(),
            progress: false,
        }
    }
}

impl SessionBuilder {
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn oracle(mut self, oracle: impl Into<String>) -> Self {
        self.oracle = oracle.into();
        self
    }

    /// Number of parallel range requests, at least one.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Consumes the builder and returns a configured [`Session`].
    pub fn build(self) -> Result<Session> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT_ENCODING,
            header::HeaderValue::from_static("identity"),
        );

        let client = Client::builder()
            .user_agent(&self.user_agent)
            .default_headers(headers)
            .build()
            .map_err(Error::fetch)?;

        Ok(Session {
            client,
            token: self.token,
            oracle: self.oracle,
            threads: self.threads,
            retries: self.retries,
            output: self.output,
            codec: self.codec,
            progress: self.progress,
        })
    }
}
