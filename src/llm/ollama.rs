use anyhow::{Context, Result};
use futures_util::{future, stream, Stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const GENERATION_FALLBACK: &str = "Error generating a response.";

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub text: String,
    pub fragments: usize,
    pub fell_back: bool,
}

impl GenerationResult {
    fn fallback() -> Self {
        Self {
            text: GENERATION_FALLBACK.to_string(),
            fragments: 0,
            fell_back: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl GenerationClient {
    /// `timeout` bounds connecting and each read of the stream, not the
    /// whole generation.
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .context("Failed to build Ollama HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn endpoint_generate(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    /// Always yields text; request failures become [`GENERATION_FALLBACK`].
    pub async fn generate(&self, prompt: &str) -> GenerationResult {
        match self.stream_generate(prompt).await {
            Ok((text, fragments)) => GenerationResult {
                text: text.trim().to_string(),
                fragments,
                fell_back: false,
            },
            Err(e) => {
                tracing::error!("Request error querying Ollama: {:#}", e);
                GenerationResult::fallback()
            }
        }
    }

    async fn stream_generate(&self, prompt: &str) -> Result<(String, usize)> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
        };

        let response = self
            .client
            .post(self.endpoint_generate())
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Ollama API error ({})", status);
        }

        decode_fragments(response.bytes_stream())
            .try_fold((String::new(), 0usize), |(mut text, count), fragment| {
                text.push_str(&fragment);
                future::ready(Ok::<_, reqwest::Error>((text, count + 1)))
            })
            .await
            .context("Ollama response stream failed")
    }
}

/// Incremental newline-delimited JSON decoder for `/api/generate` bodies.
#[derive(Debug, Default)]
pub struct FragmentDecoder {
    buffer: Vec<u8>,
}

impl FragmentDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut fragments = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            fragments.extend(decode_line(&line));
        }
        fragments
    }

    /// Decodes a trailing line that had no terminating newline.
    pub fn finish(&mut self) -> Vec<String> {
        let line = std::mem::take(&mut self.buffer);
        decode_line(&line).into_iter().collect()
    }
}

fn decode_line(line: &[u8]) -> Option<String> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_slice::<GenerateChunk>(line) {
        Ok(chunk) => {
            if let Some(error) = chunk.error {
                tracing::warn!(%error, "Ollama reported an error in stream");
            }
            chunk.response
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse JSON line: {}. Error: {}",
                String::from_utf8_lossy(line),
                e
            );
            None
        }
    }
}

/// Lazily maps a byte stream to the text fragments it carries, in arrival order.
pub fn decode_fragments<S, B, E>(bytes: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    let mut decoder = FragmentDecoder::default();
    bytes
        .map(Some)
        .chain(stream::once(future::ready(None)))
        .map(move |chunk| match chunk {
            Some(Ok(bytes)) => Ok(decoder.push(bytes.as_ref())),
            Some(Err(e)) => Err(e),
            None => Ok(decoder.finish()),
        })
        .flat_map(|decoded| match decoded {
            Ok(fragments) => stream::iter(fragments.into_iter().map(Ok)).left_stream(),
            Err(e) => stream::once(future::ready(Err(e))).right_stream(),
        })
}
