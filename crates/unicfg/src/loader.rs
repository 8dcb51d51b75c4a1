//! Assembling YAML fragments into one evaluated document.

use crate::error::{ConfigError, aggregate};
use crate::value::Value;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use unicfg_eval::{EvalError, EvalOptions, Evaluator};

/// Registered loader name.
pub const NAME: &str = "yaml";

static PATH_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r".*\.ya?ml$").unwrap());

/// A source of configuration documents, selected by file name.
pub trait ConfigLoader {
    /// Short name the loader is registered under.
    fn type_name(&self) -> &'static str;

    /// Whether the loader accepts a directory of files in one call.
    fn allow_dir(&self) -> bool;

    /// Files this loader claims.
    fn path_pattern(&self) -> &Regex;

    /// Stage a fragment that every subsequent load evaluates first.
    fn preload(&mut self, path: &str, data: &[u8]);

    /// Drop all staged fragments.
    fn clear(&mut self);

    /// Evaluate staged fragments and `files` into a single document.
    ///
    /// `files` maps a path relative to `root_dir` to the fragment bytes.
    fn load(
        &self,
        root_dir: &Path,
        files: &IndexMap<String, Vec<u8>>,
    ) -> Result<Value, ConfigError>;
}

/// Limits applied while evaluating fragments.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Deepest nesting accepted in a single fragment.
    pub max_depth: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_depth: EvalOptions::default().max_depth,
        }
    }
}

#[derive(Debug, Clone)]
struct Fragment {
    path: String,
    data: Vec<u8>,
}

/// Loader for YAML fragments with tag constraints.
///
/// Preloaded fragments are evaluated before the files of each load, in the
/// order they were staged.
#[derive(Debug, Default)]
pub struct Loader {
    options: LoadOptions,
    preloaded: Vec<Fragment>,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: LoadOptions) -> Self {
        Self {
            options,
            preloaded: Vec::new(),
        }
    }

    /// Number of fragments currently staged.
    pub fn preloaded_count(&self) -> usize {
        self.preloaded.len()
    }
}

impl ConfigLoader for Loader {
    fn type_name(&self) -> &'static str {
        NAME
    }

    fn allow_dir(&self) -> bool {
        true
    }

    fn path_pattern(&self) -> &Regex {
        &PATH_PATTERN
    }

    fn preload(&mut self, path: &str, data: &[u8]) {
        debug!(path, bytes = data.len(), "preloading fragment");
        self.preloaded.push(Fragment {
            path: path.to_string(),
            data: data.to_vec(),
        });
    }

    fn clear(&mut self) {
        self.preloaded.clear();
    }

    fn load(
        &self,
        root_dir: &Path,
        files: &IndexMap<String, Vec<u8>>,
    ) -> Result<Value, ConfigError> {
        debug!(
            root_dir = %root_dir.display(),
            preloaded = self.preloaded.len(),
            files = files.len(),
            "loading configuration"
        );

        let mut evaluator = Evaluator::new(EvalOptions {
            max_depth: self.options.max_depth,
        });

        let staged = self
            .preloaded
            .iter()
            .map(|fragment| (fragment.path.as_str(), fragment.data.as_slice()));
        let given = files.iter().map(|(path, data)| (path.as_str(), data.as_slice()));

        for (path, data) in staged.chain(given) {
            let name = root_dir.join(path).to_string_lossy().into_owned();
            if let Err(errors) = evaluator.add_fragment(&name, data) {
                warn!(path, errors = errors.len(), "fragment rejected");
                return Err(fragment_error(path, errors));
            }
        }

        match evaluator.evaluate() {
            Ok(tree) => Ok(Value::root(Arc::new(tree))),
            Err(errors) => {
                warn!(errors = errors.len(), "configuration evaluation failed");
                Err(aggregate(errors)
                    .unwrap_or_else(|| ConfigError::custom("configuration evaluation failed")))
            }
        }
    }
}

/// Wrap the problems found in one fragment, naming the fragment.
fn fragment_error(path: &str, errors: Vec<EvalError>) -> ConfigError {
    let source = aggregate(errors).unwrap_or_else(|| ConfigError::custom("fragment rejected"));
    ConfigError::Fragment {
        path: path.to_string(),
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Kind;

    fn files(entries: &[(&str, &str)]) -> IndexMap<String, Vec<u8>> {
        entries
            .iter()
            .map(|(path, data)| (path.to_string(), data.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn test_descriptor() {
        let loader = Loader::new();
        assert_eq!(loader.type_name(), "yaml");
        assert!(loader.allow_dir());
        assert!(loader.path_pattern().is_match("app.yaml"));
        assert!(loader.path_pattern().is_match("conf/app.yml"));
        assert!(!loader.path_pattern().is_match("app.json"));
        assert!(!loader.path_pattern().is_match("app.yaml.bak"));
    }

    #[test]
    fn test_load_merges_files_in_order() {
        let loader = Loader::new();
        let value = loader
            .load(
                Path::new(""),
                &files(&[
                    ("a.yaml", "server:\n  port: 80\n"),
                    ("b.yaml", "server:\n  host: example\n"),
                ]),
            )
            .unwrap();
        let server = value.lookup(["server"]).0;
        let labels: Vec<String> = server.fields().unwrap().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["port", "host"]);
    }

    #[test]
    fn test_empty_load_is_empty_struct() {
        let value = Loader::new().load(Path::new(""), &IndexMap::new()).unwrap();
        assert_eq!(value.kind(), Kind::Struct);
        assert_eq!(value.fields().unwrap().count(), 0);
    }

    #[test]
    fn test_preloaded_fragments_come_first() {
        let mut loader = Loader::new();
        loader.preload("defaults.yaml", b"name: base\nport: !int\n");
        let value = loader
            .load(Path::new(""), &files(&[("app.yaml", "port: 8080\n")]))
            .unwrap();
        assert_eq!(value.lookup(["port"]).0.i64().unwrap(), 8080);
        assert_eq!(value.lookup(["name"]).0.file(), Some("defaults.yaml"));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut loader = Loader::new();
        loader.preload("a.yaml", b"x: 1\n");
        loader.clear();
        loader.clear();
        assert_eq!(loader.preloaded_count(), 0);
        let value = loader.load(Path::new(""), &IndexMap::new()).unwrap();
        assert!(!value.lookup(["x"]).1);
    }

    #[test]
    fn test_source_file_joined_with_root_dir() {
        let value = Loader::new()
            .load(Path::new("conf"), &files(&[("app.yaml", "port: 1\n")]))
            .unwrap();
        let expected = Path::new("conf").join("app.yaml").to_string_lossy().into_owned();
        assert_eq!(value.lookup(["port"]).0.file(), Some(expected.as_str()));
    }

    #[test]
    fn test_parse_failure_names_fragment() {
        let err = Loader::new()
            .load(Path::new(""), &files(&[("ok.yaml", "a: 1\n"), ("bad.yaml", "a: [1, 2\n")]))
            .unwrap_err();
        match &err {
            ConfigError::Fragment { path, .. } => assert_eq!(path, "bad.yaml"),
            other => panic!("expected fragment error, got {:?}", other),
        }
        assert!(err.to_string().ends_with("(path: bad.yaml)"));
    }

    #[test]
    fn test_rejection_without_details_is_still_an_error() {
        let err = fragment_error("empty.yaml", Vec::new());
        match &err {
            ConfigError::Fragment { path, source } => {
                assert_eq!(path, "empty.yaml");
                assert!(matches!(**source, ConfigError::Custom(_)));
            }
            other => panic!("expected fragment error, got {:?}", other),
        }
        assert_eq!(err.to_string(), "fragment rejected (path: empty.yaml)");
    }

    #[test]
    fn test_tagged_mapping_rejects_fragment() {
        let err = Loader::new()
            .load(Path::new(""), &files(&[("tag.yaml", "a: !wat\n  x: 1\n")]))
            .unwrap_err();
        let ConfigError::Fragment { path, source } = &err else {
            panic!("expected fragment error, got {:?}", err);
        };
        assert_eq!(path, "tag.yaml");
        match &**source {
            ConfigError::Eval(inner) => {
                assert_eq!(inner.kind(), unicfg_eval::EvalErrorKind::InvalidTag);
                assert_eq!(inner.message(), "unknown tag !wat");
            }
            other => panic!("expected eval error, got {:?}", other),
        }
    }

    #[test]
    fn test_depth_limit_applies() {
        let loader = Loader::with_options(LoadOptions { max_depth: 2 });
        let err = loader
            .load(Path::new(""), &files(&[("deep.yaml", "a:\n  b:\n    c:\n      d: 1\n")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Fragment { .. }));
        assert!(err.to_string().contains("maximum depth"));
    }
}
