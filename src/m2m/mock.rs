//! In-memory stand-in for the M2M API used by the unit tests.
use super::{ByteStream, M2mOps};
use anyhow::{anyhow, Result};
use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;

type Responder = Box<dyn Fn(&Value) -> Value>;

#[derive(Default)]
pub struct MockM2m {
    responders: HashMap<String, Responder>,
    files: HashMap<String, Vec<Vec<u8>>>,
    broken_files: HashMap<String, Vec<u8>>,
    pub posts: RefCell<Vec<(String, Value)>>,
    pub gets: RefCell<Vec<String>>,
}

impl MockM2m {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every POST to `endpoint` with the same document.
    pub fn respond(self, endpoint: &str, response: Value) -> Self {
        self.respond_with(endpoint, move |_| response.clone())
    }

    /// Answers POSTs to `endpoint` with a document built from the request payload.
    pub fn respond_with(mut self, endpoint: &str, f: impl Fn(&Value) -> Value + 'static) -> Self {
        self.responders.insert(endpoint.to_string(), Box::new(f));
        self
    }

    /// Serves `chunks` as the body of `url`.
    pub fn file(mut self, url: &str, chunks: Vec<Vec<u8>>) -> Self {
        self.files.insert(url.to_string(), chunks);
        self
    }

    /// Serves `chunk` from `url` and then fails mid-stream.
    pub fn broken_file(mut self, url: &str, chunk: Vec<u8>) -> Self {
        self.broken_files.insert(url.to_string(), chunk);
        self
    }

    pub fn post_count(&self, endpoint: &str) -> usize {
        self.posts
            .borrow()
            .iter()
            .filter(|(e, _)| e == endpoint)
            .count()
    }
}

impl M2mOps for MockM2m {
    async fn post(&self, endpoint: &str, payload: &Value) -> Result<Value> {
        self.posts
            .borrow_mut()
            .push((endpoint.to_string(), payload.clone()));
        let responder = self
            .responders
            .get(endpoint)
            .ok_or(anyhow!("HTTP status client error (404 Not Found) for {}", endpoint))?;
        Ok(responder(payload))
    }

    async fn get_stream(&self, url: &str) -> Result<ByteStream> {
        self.gets.borrow_mut().push(url.to_string());
        if let Some(chunk) = self.broken_files.get(url) {
            let items = vec![Ok(chunk.clone()), Err(anyhow!("connection reset"))];
            return Ok(stream::iter(items).boxed());
        }
        let chunks = self
            .files
            .get(url)
            .ok_or(anyhow!("HTTP status client error (404 Not Found) for {}", url))?
            .clone();
        Ok(stream::iter(chunks.into_iter().map(Ok::<_, anyhow::Error>)).boxed())
    }
}
