use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::context::{ContextError, IgnorePatterns, relative_slash_path, walk_context};

/// Hex characters of the digest kept for tags. Short enough to read in
/// an image reference; a stale collision only costs a rebuild.
const HASH_LENGTH: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("failed to resolve context path {path}: {source}")]
    ResolveContext {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("failed to read Dockerfile for hashing: {source}")]
    ReadDockerfile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read {path} for hashing: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Derives deterministic content digests for build contexts.
pub struct ContentHasher;

impl ContentHasher {
    pub fn new() -> Self {
        Self
    }

    /// Hash a build context: the Dockerfile's declared path and bytes,
    /// the build arguments, and every non-ignored regular file's
    /// relative path and bytes.
    ///
    /// Two calls over semantically identical inputs return the same
    /// digest; a change to any of the above returns a different one.
    /// File paths are sorted before hashing so the result is
    /// independent of traversal order. An unreadable file is an error,
    /// not a silent omission.
    pub fn hash_build_context(
        &self,
        context_path: &Path,
        dockerfile: &str,
        build_args: &HashMap<String, String>,
    ) -> Result<String, HashError> {
        let context = std::path::absolute(context_path).map_err(|e| HashError::ResolveContext {
            path: context_path.to_path_buf(),
            source: e,
        })?;
        let ignore = IgnorePatterns::load(&context)?;

        let mut hasher = Sha256::new();

        // Dockerfile path always contributes; bytes only when readable,
        // so a context without its Dockerfile still hashes.
        let dockerfile_rel = if dockerfile.is_empty() {
            "Dockerfile"
        } else {
            dockerfile
        };
        hasher.update(b"DOCKERFILE_PATH:\n");
        hasher.update(dockerfile_rel.as_bytes());

        let dockerfile_path = context.join(dockerfile_rel);
        if let Ok(mut file) = std::fs::File::open(&dockerfile_path) {
            hasher.update(b"\nDOCKERFILE_CONTENTS:\n");
            std::io::copy(&mut file, &mut hasher).map_err(|e| HashError::ReadDockerfile {
                path: dockerfile_path,
                source: e,
            })?;
        }

        if !build_args.is_empty() {
            hasher.update(b"\nBUILD_ARGS:\n");
            let mut keys: Vec<&String> = build_args.keys().collect();
            keys.sort();
            for key in keys {
                hasher.update(key.as_bytes());
                hasher.update(b"=");
                hasher.update(build_args[key].as_bytes());
                hasher.update(b"\n");
            }
        }

        let mut files = Vec::new();
        for entry in walk_context(&context, &ignore) {
            let entry = entry.map_err(|e| ContextError::Walk { source: e })?;
            if entry.file_type().is_file() {
                files.push(relative_slash_path(&context, entry.path()));
            }
        }
        files.sort();

        for rel in &files {
            hasher.update(b"FILE:\n");
            hasher.update(rel.as_bytes());
            hasher.update(b"\n");

            let full = context.join(rel);
            let mut file = std::fs::File::open(&full).map_err(|e| HashError::ReadFile {
                path: full.clone(),
                source: e,
            })?;
            std::io::copy(&mut file, &mut hasher).map_err(|e| HashError::ReadFile {
                path: full,
                source: e,
            })?;
        }

        let digest = hex::encode(hasher.finalize());
        Ok(digest[..HASH_LENGTH].to_owned())
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}
