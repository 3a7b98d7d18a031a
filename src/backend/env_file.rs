//! `KEY=value` environment files
//!
//! Files are parsed into lines, edited by key and written back whole, so
//! comments, blank lines and unknown keys survive and values may change
//! length freely.

use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key holding the deployed version
pub const VERSION_KEY: &str = "VERSION";

#[derive(Debug, Error)]
pub enum EnvFileError {
    #[error("env file {0} does not exist")]
    NotFound(PathBuf),

    #[error("reading env file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("writing env file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Pair { key: String, value: String },
    Other(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    fn detect(contents: &str) -> Self {
        if contents.contains("\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Parsed env file preserving every line it does not understand
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    lines: Vec<Line>,
    line_ending: LineEnding,
    trailing_newline: bool,
}

impl EnvFile {
    pub fn parse(contents: &str) -> Self {
        let lines = contents
            .lines()
            .map(|line| {
                let trimmed = line.trim_start();
                if trimmed.starts_with('#') {
                    return Line::Other(line.to_string());
                }
                match line.split_once('=') {
                    Some((key, value)) if !key.trim().is_empty() => Line::Pair {
                        key: key.trim().to_string(),
                        value: value.to_string(),
                    },
                    _ => Line::Other(line.to_string()),
                }
            })
            .collect();

        Self {
            lines,
            line_ending: LineEnding::detect(contents),
            trailing_newline: contents.is_empty() || contents.ends_with('\n'),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            Line::Pair { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Set `key`, replacing the first occurrence or appending a new line.
    /// Returns whether the file changed.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let existing = self.lines.iter_mut().find_map(|line| match line {
            Line::Pair { key: k, value: v } if k == key => Some(v),
            _ => None,
        });
        if let Some(current) = existing {
            if current.as_str() == value {
                return false;
            }
            *current = value.to_string();
            return true;
        }
        self.lines.push(Line::Pair {
            key: key.to_string(),
            value: value.to_string(),
        });
        true
    }

    pub fn render(&self) -> String {
        let newline = self.line_ending.as_str();
        let mut out = self
            .lines
            .iter()
            .map(|line| match line {
                Line::Pair { key, value } => format!("{}={}", key, value),
                Line::Other(raw) => raw.clone(),
            })
            .collect::<Vec<_>>()
            .join(newline);
        if self.trailing_newline && !out.is_empty() {
            out.push_str(newline);
        }
        out
    }

    pub fn load(path: &Path) -> Result<Self, EnvFileError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(Self::parse(&contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(EnvFileError::NotFound(path.to_path_buf()))
            }
            Err(source) => Err(EnvFileError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Replace `path` atomically: write a sibling temp file, then rename it
    /// over the original, keeping the original permissions
    pub fn save(&self, path: &Path) -> Result<(), EnvFileError> {
        let write_error = |source| EnvFileError::Write {
            path: path.to_path_buf(),
            source,
        };

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;
        temp.write_all(self.render().as_bytes())
            .map_err(write_error)?;
        temp.as_file().sync_all().map_err(write_error)?;

        if let Ok(metadata) = std::fs::metadata(path) {
            temp.as_file()
                .set_permissions(metadata.permissions())
                .map_err(write_error)?;
        }

        temp.persist(path).map_err(|e| write_error(e.error))?;
        Ok(())
    }
}
