//! A module: the configuration files of one directory.

use crate::error::{IoResultExt, TofulintError, TofulintResult};
use crate::syntax::{Body, BodySchema, Expr, File};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Files larger than this are rejected rather than parsed.
const MAX_FILE_SIZE: u64 = 10_000_000;

/// Position of a module in the call tree; empty for the root module.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModulePath(Vec<String>);

impl ModulePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, name: &str) -> Self {
        let mut path = self.0.clone();
        path.push(name.to_string());
        Self(path)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "root");
        }
        let parts: Vec<String> = self.0.iter().map(|n| format!("module.{n}")).collect();
        write!(f, "{}", parts.join("."))
    }
}

#[derive(Debug, Clone)]
pub struct Module {
    dir: PathBuf,
    path: ModulePath,
    files: BTreeMap<String, File>,
}

impl Module {
    /// Read and parse `files` in parallel. Any unreadable or unparsable file fails the module.
    pub fn load(dir: &Path, path: ModulePath, files: &[PathBuf]) -> TofulintResult<Module> {
        let parsed = files
            .par_iter()
            .map(|file| read_and_parse(file))
            .collect::<TofulintResult<Vec<File>>>()?;

        Ok(Module {
            dir: dir.to_path_buf(),
            path,
            files: parsed.into_iter().map(|f| (f.name().to_string(), f)).collect(),
        })
    }

    /// Build a module from in-memory sources, keyed by file name.
    pub fn from_sources<I, N, S>(path: ModulePath, sources: I) -> TofulintResult<Module>
    where
        I: IntoIterator<Item = (N, S)>,
        N: AsRef<str>,
        S: AsRef<str>,
    {
        let mut files = BTreeMap::new();
        for (name, source) in sources {
            let file = File::parse(name.as_ref(), source.as_ref())?;
            files.insert(name.as_ref().to_string(), file);
        }
        Ok(Module {
            dir: PathBuf::from("."),
            path,
            files,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> &ModulePath {
        &self.path
    }

    pub fn files(&self) -> &BTreeMap<String, File> {
        &self.files
    }

    pub fn file(&self, name: &str) -> Option<&File> {
        self.files.get(name)
    }

    /// Schema content of every file, merged in file name order.
    pub fn content(&self, schema: &BodySchema) -> TofulintResult<Body> {
        let mut body = Body::default();
        for file in self.files.values() {
            body.merge(file.content(schema)?);
        }
        Ok(body)
    }

    pub fn walk_expressions<F: FnMut(&Expr)>(&self, mut f: F) {
        for file in self.files.values() {
            file.walk_expressions(&mut f);
        }
    }
}

fn read_and_parse(path: &Path) -> TofulintResult<File> {
    let size = fs::metadata(path).with_path(path)?.len();
    if size > MAX_FILE_SIZE {
        return Err(TofulintError::invalid_argument(format!(
            "{} is too large ({} bytes, max {})",
            path.display(),
            size,
            MAX_FILE_SIZE
        )));
    }

    let source = fs::read_to_string(path).with_path(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| TofulintError::invalid_argument(format!("{} has no file name", path.display())))?;
    File::parse(&name, &source)
}
