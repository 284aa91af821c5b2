use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::pipeline::Mode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLog {
    pub id: String,
    pub timestamp: String,
    pub mode: Mode,
    pub query: String,
    pub search_query: String,
    pub num_results: u32,
    pub num_context_items: u32,
    pub search_latency_ms: u64,
    pub generation_latency_ms: u64,
    pub total_latency_ms: u64,
    pub fragments: u32,
    pub fell_back: bool,
    pub response: String,
}

impl RunLog {
    pub fn summary(&self) -> String {
        format!(
            "Mode: {} | Results: {} | Context items: {} | Search: {}ms | Generation: {}ms ({} fragments{}) | Total: {:.1}s",
            self.mode,
            self.num_results,
            self.num_context_items,
            self.search_latency_ms,
            self.generation_latency_ms,
            self.fragments,
            if self.fell_back { ", fell back" } else { "" },
            self.total_latency_ms as f64 / 1000.0,
        )
    }
}

const RUNS_FILE: &str = "runs.jsonl";

/// Appends one JSON object per line to `<dir>/runs.jsonl`.
pub struct RunLogger {
    path: PathBuf,
}

impl RunLogger {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create run log directory {}", dir.display()))?;
        Ok(Self {
            path: dir.join(RUNS_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The record goes out in a single write so concurrent runs never
    /// interleave within a line.
    pub fn write(&self, run_log: &RunLog) -> Result<()> {
        let mut line = serde_json::to_vec(run_log).context("Failed to encode run log")?;
        line.push(b'\n');

        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(&line))
            .with_context(|| format!("Failed to append to {}", self.path.display()))
    }
}
