// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only sink for a job's combined output.

use std::io;
use std::path::{Path, PathBuf};

use conveyor_adapters::ProcessOutput;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;

/// Writes a job's stdout and stderr, line by line, to one log file.
///
/// Lines are written as they arrive, so the file can be read while the job
/// is still running. Each stream keeps its own order; lines from the two
/// streams interleave in arrival order. The file is appended to, never
/// truncated.
pub struct JobLogger {
    path: PathBuf,
}

impl JobLogger {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy both pipes into the log until each reaches end of file.
    ///
    /// Returns the number of lines written. Output that is not valid UTF-8
    /// is written through unchanged.
    pub async fn drain(&self, output: ProcessOutput) -> io::Result<u64> {
        let mut file = self.open().await?;
        let mut stdout = LineSource::new(output.stdout);
        let mut stderr = LineSource::new(output.stderr);
        let mut written = 0u64;

        while stdout.open || stderr.open {
            let line = tokio::select! {
                line = stdout.next(), if stdout.open => line?,
                line = stderr.next(), if stderr.open => line?,
            };
            if let Some(line) = line {
                file.write_all(&line).await?;
                written += 1;
            }
        }

        file.flush().await?;
        Ok(written)
    }

    /// Run [`drain`](Self::drain) on a background task.
    pub fn spawn_drain(self, output: ProcessOutput) -> JoinHandle<io::Result<u64>> {
        tokio::spawn(async move { self.drain(output).await })
    }

    async fn open(&self) -> io::Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
    }
}

/// One output pipe, read a line at a time.
struct LineSource<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    open: bool,
}

impl<R: AsyncRead + Unpin> LineSource<R> {
    fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
            open: true,
        }
    }

    /// Next complete line, newline-terminated.
    ///
    /// Cancel-safe: a partially read line stays in the buffer for the next
    /// call. Returns `None` once the pipe closes with nothing pending.
    async fn next(&mut self) -> io::Result<Option<Vec<u8>>> {
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            self.open = false;
            return Ok(None);
        }
        if read == 0 || self.buf.last() != Some(&b'\n') {
            // Final line without a trailing newline
            self.open = read != 0;
            self.buf.push(b'\n');
        }
        Ok(Some(std::mem::take(&mut self.buf)))
    }
}

#[cfg(test)]
#[path = "job_logger_tests.rs"]
mod tests;
