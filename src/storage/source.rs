//! Where a graph comes from and where it is written back to

use crate::core::error::{Error, Result};
use crate::log_debug;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Location of a graph file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphSource {
    /// Local, writable file
    File(PathBuf),
    /// Remote resource; always read only
    Remote(String),
}

impl GraphSource {
    /// Interpret a command line argument or config value
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            GraphSource::Remote(location.to_string())
        } else {
            GraphSource::File(PathBuf::from(location))
        }
    }

    /// Remote sources can not be written
    pub fn is_read_only(&self) -> bool {
        matches!(self, GraphSource::Remote(_))
    }

    /// Name used in messages
    pub fn name(&self) -> String {
        self.to_string()
    }

    /// Local path, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            GraphSource::File(path) => Some(path),
            GraphSource::Remote(_) => None,
        }
    }

    /// Read the whole source. `Ok(None)` means a local file that does not exist yet.
    pub fn read(&self) -> Result<Option<String>> {
        match self {
            GraphSource::File(path) => match std::fs::read_to_string(path) {
                Ok(text) => Ok(Some(text)),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    log_debug!("{} does not exist yet, starting a new graph", path.display());
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            },
            GraphSource::Remote(url) => {
                log_debug!("Fetching remote graph {}", url);
                let response = reqwest::blocking::get(url.as_str())?.error_for_status()?;
                Ok(Some(response.text()?))
            }
        }
    }

    /// Replace the file contents
    pub fn write(&self, contents: &str) -> Result<()> {
        match self {
            GraphSource::File(path) => Ok(std::fs::write(path, contents)?),
            GraphSource::Remote(url) => Err(Error::permission(format!("{} is read only.", url))),
        }
    }

    /// Recovery snapshot location: `.<name>.draft` next to the file
    pub fn draft_path(&self) -> Option<PathBuf> {
        let path = self.path()?;
        let name = path.file_name()?.to_string_lossy();
        Some(path.with_file_name(format!(".{}.draft", name)))
    }

    /// Graph-description output location: `<file>.dot`
    pub fn dot_path(&self) -> Option<PathBuf> {
        self.with_suffix(".dot")
    }

    /// Assembly output location: `<file>.asm`
    pub fn asm_path(&self) -> Option<PathBuf> {
        self.with_suffix(".asm")
    }

    fn with_suffix(&self, suffix: &str) -> Option<PathBuf> {
        let mut name = self.path()?.as_os_str().to_owned();
        name.push(suffix);
        Some(PathBuf::from(name))
    }
}

impl fmt::Display for GraphSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphSource::File(path) => write!(f, "{}", path.display()),
            GraphSource::Remote(url) => f.write_str(url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_remote_and_read_only() {
        let source = GraphSource::parse("http://example.org/g.tg");
        assert!(source.is_read_only());
        assert!(source.draft_path().is_none());
        assert!(matches!(source.write("x"), Err(Error::Permission(_))));
    }

    #[test]
    fn draft_and_dot_paths_sit_beside_the_file() {
        let source = GraphSource::parse("notes/ideas.tg");
        assert!(!source.is_read_only());
        assert_eq!(source.draft_path().unwrap(), PathBuf::from("notes/.ideas.tg.draft"));
        assert_eq!(source.dot_path().unwrap(), PathBuf::from("notes/ideas.tg.dot"));
        assert_eq!(source.asm_path().unwrap(), PathBuf::from("notes/ideas.tg.asm"));
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let source = GraphSource::File(dir.path().join("new.tg"));
        assert!(source.read().unwrap().is_none());
        source.write("[0, \"\", []]\n").unwrap();
        assert_eq!(source.read().unwrap().as_deref(), Some("[0, \"\", []]\n"));
    }
}
