use crate::models::PathKind;
use std::future::Future;
use std::io::ErrorKind;
use std::pin::Pin;

pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<PathKind>> + Send + 'a>>;

/// Existence/kind check for a pinned path. `Ok(PathKind::Missing)` means the
/// path is gone; `Err` means the check itself could not be answered.
pub trait PathProbe: Send + Sync {
    fn stat<'a>(&'a self, path: &'a str) -> ProbeFuture<'a>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl PathProbe for FsProbe {
    fn stat<'a>(&'a self, path: &'a str) -> ProbeFuture<'a> {
        Box::pin(async move {
            match tokio::fs::metadata(path).await {
                Ok(metadata) if metadata.is_dir() => Ok(PathKind::Directory),
                Ok(_) => Ok(PathKind::File),
                Err(error) if error.kind() == ErrorKind::NotFound => Ok(PathKind::Missing),
                Err(error) => Err(anyhow::Error::new(error).context(format!("stat {path}"))),
            }
        })
    }
}
