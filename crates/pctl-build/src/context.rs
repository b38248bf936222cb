use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use pctl_portainer::{ByteStream, ByteStreamSender};
use walkdir::WalkDir;

/// Preferred chunk size flowing through the archive pipe.
const CHUNK_SIZE: usize = 64 * 1024;
/// In-flight chunks before the producer blocks on the consumer.
pub(crate) const PIPE_DEPTH: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("context path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to read .dockerignore at {path}")]
    DockerignoreRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to walk build context: {source}")]
    Walk { source: walkdir::Error },

    #[error("failed to read metadata for {path}")]
    Metadata {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// `.dockerignore` patterns for one build context.
///
/// A path is excluded when any pattern matches it; the rules are
/// checked in order, first match wins:
/// 1. a pattern ending in `/` excludes that directory and its subtree
/// 2. a pattern containing `*` is a shell glob over the whole relative
///    path, where the wildcard never crosses a `/`
/// 3. exact match
/// 4. bare directory prefix (`pattern` or `pattern/...`)
#[derive(Debug, Clone, Default)]
pub struct IgnorePatterns {
    patterns: Vec<String>,
}

impl IgnorePatterns {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    /// Load patterns from `.dockerignore` in the context directory.
    /// Blank lines and `#` comments are dropped; everything else is
    /// taken verbatim.
    pub fn load(context_path: &Path) -> Result<Self, ContextError> {
        let path = context_path.join(".dockerignore");
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| ContextError::DockerignoreRead { path, source: e })?;

        let patterns = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_owned)
            .collect();

        Ok(Self { patterns })
    }

    /// Whether a slash-normalized relative path is excluded.
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| matches_pattern(rel_path, pattern))
    }
}

fn matches_pattern(rel_path: &str, pattern: &str) -> bool {
    // Directory pattern: the directory itself and everything below it.
    if let Some(dir) = pattern.strip_suffix('/') {
        return rel_path == dir || rel_path.starts_with(&format!("{dir}/"));
    }

    // Glob over the full relative path; `*` stays within one segment.
    if pattern.contains('*') {
        let options = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        return glob::Pattern::new(pattern)
            .map(|p| p.matches_with(rel_path, options))
            // An unparseable pattern matches nothing.
            .unwrap_or(false);
    }

    if rel_path == pattern {
        return true;
    }

    // Bare name used as a directory prefix.
    rel_path
        .strip_prefix(pattern)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Relative path with `/` separators regardless of platform.
pub(crate) fn relative_slash_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Walk a context depth-first, skipping ignored entries and never
/// descending into ignored directories.
pub(crate) fn walk_context(
    root: &Path,
    ignore: &IgnorePatterns,
) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> + use<> {
    let root = root.to_path_buf();
    let ignore = ignore.clone();
    WalkDir::new(root.clone())
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| !ignore.is_ignored(&relative_slash_path(&root, entry.path())))
}

/// Streams build contexts as tar archives.
pub struct ContextArchiver {
    warn_threshold_mb: i64,
}

impl ContextArchiver {
    pub fn new(warn_threshold_mb: i64) -> Self {
        Self { warn_threshold_mb }
    }

    /// Check that the context is a directory and its `.dockerignore`
    /// (when present) is readable.
    pub fn validate(&self, context_path: &Path) -> Result<(), ContextError> {
        if !context_path.is_dir() {
            return Err(ContextError::NotADirectory(context_path.to_path_buf()));
        }
        IgnorePatterns::load(context_path)?;
        Ok(())
    }

    /// Total size in bytes of the non-ignored regular files.
    pub fn estimate_size(&self, context_path: &Path) -> Result<u64, ContextError> {
        if !context_path.is_dir() {
            return Err(ContextError::NotADirectory(context_path.to_path_buf()));
        }
        let ignore = IgnorePatterns::load(context_path)?;

        let mut total = 0u64;
        for entry in walk_context(context_path, &ignore) {
            let entry = entry.map_err(|e| ContextError::Walk { source: e })?;
            if entry.file_type().is_file() {
                let metadata = entry.metadata().map_err(|e| ContextError::Metadata {
                    path: entry.path().to_path_buf(),
                    source: e.into(),
                })?;
                total += metadata.len();
            }
        }
        Ok(total)
    }

    /// Whether a context of `size` bytes crosses the warn threshold.
    pub fn exceeds_threshold(&self, size: u64) -> bool {
        self.warn_threshold_mb > 0 && size > (self.warn_threshold_mb as u64) * 1024 * 1024
    }

    /// Produce the context as a streamed tar archive.
    ///
    /// The writer runs on a blocking task feeding a bounded pipe, so
    /// producer and consumer overlap and the archive is never held in
    /// memory whole. A failure while archiving terminates the stream
    /// with an error, which fails the request consuming it.
    pub fn stream(&self, context_path: &Path) -> Result<ByteStream, ContextError> {
        if !context_path.is_dir() {
            return Err(ContextError::NotADirectory(context_path.to_path_buf()));
        }
        let ignore = IgnorePatterns::load(context_path)?;

        let root = context_path.to_path_buf();
        let (sender, stream) = ByteStream::channel(PIPE_DEPTH);

        tokio::task::spawn_blocking(move || {
            if let Err(err) = write_context_tar(&root, &ignore, sender.clone()) {
                tracing::debug!(context = %root.display(), error = %err, "context archive failed");
                sender.blocking_fail(err);
            }
        });

        Ok(stream)
    }
}

fn write_context_tar(
    root: &Path,
    ignore: &IgnorePatterns,
    sender: ByteStreamSender,
) -> io::Result<()> {
    let mut builder = tar::Builder::new(ChunkWriter::new(sender));
    builder.follow_symlinks(false);

    for entry in walk_context(root, ignore) {
        let entry = entry.map_err(io::Error::other)?;
        let rel = relative_slash_path(root, entry.path());
        builder.append_path_with_name(entry.path(), &rel)?;
    }

    let mut writer = builder.into_inner()?;
    writer.flush()
}

/// `io::Write` half of the archive pipe: buffers tar output into
/// fixed-size chunks and hands them to the bounded channel, blocking
/// when the consumer lags.
struct ChunkWriter {
    sender: ByteStreamSender,
    buf: Vec<u8>,
}

impl ChunkWriter {
    fn new(sender: ByteStreamSender) -> Self {
        Self {
            sender,
            buf: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::take(&mut self.buf));
        if self.sender.blocking_send(chunk) {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "archive consumer closed",
            ))
        }
    }
}

impl Write for ChunkWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        if self.buf.len() >= CHUNK_SIZE {
            self.send_buffered()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}
