//! Lexical evidence about C translation units.
//!
//! Answers two questions about an implementation file without a compiler
//! front end: which names are defined with file-static storage, and which
//! names have any function-definition-shaped text at all. The default
//! classifier is regex based and knowingly imprecise: matches inside
//! comments, string literals or disabled preprocessor branches count too.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use moka::sync::Cache;
use regex::Regex;
use tracing::trace;

use crate::infra::io::read_source_lossy;

/// `static [inline] <anything but '('> name (`
const STATIC_PATTERN: &str = r"\bstatic\b\s+(?:inline\s+)?[^(]*?\b(\w+)\s*\(";

/// `<words, stars, spaces> name ( <no ';'> ) {` anchored at a line start
const DEFINITION_PATTERN: &str = r"(?m)^\s*[\w*\s]+\b(\w+)\s*\([^;]*\)\s*\{";

/// Pluggable visibility/definedness oracle for one translation unit.
pub trait LexicalClassifier: Send + Sync
{
    /// Names declared with file-static storage right before a parameter list.
    fn static_names(
        &self,
        text: &str,
    ) -> HashSet<String>;

    /// Names with any function-definition-shaped match, static or not.
    fn definition_names(
        &self,
        text: &str,
    ) -> HashSet<String>;
}

/// Regex-backed classifier for C sources
pub struct RegexClassifier
{
    static_re: Regex,
    definition_re: Regex,
}

impl RegexClassifier
{
    pub fn new() -> Result<Self>
    {
        Ok(Self {
            static_re: Regex::new(STATIC_PATTERN)?,
            definition_re: Regex::new(DEFINITION_PATTERN)?,
        })
    }

    fn first_groups(
        re: &Regex,
        text: &str,
    ) -> HashSet<String>
    {
        re.captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

impl LexicalClassifier for RegexClassifier
{
    fn static_names(
        &self,
        text: &str,
    ) -> HashSet<String>
    {
        Self::first_groups(&self.static_re, text)
    }

    fn definition_names(
        &self,
        text: &str,
    ) -> HashSet<String>
    {
        Self::first_groups(&self.definition_re, text)
    }
}

/// Both name sets for one file. Empty when the file could not be read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexicalEvidence
{
    pub static_names: HashSet<String>,
    pub definitions: HashSet<String>,
}

impl LexicalEvidence
{
    pub fn is_static(
        &self,
        name: &str,
    ) -> bool
    {
        self.static_names
            .contains(name)
    }

    pub fn is_defined(
        &self,
        name: &str,
    ) -> bool
    {
        self.definitions
            .contains(name)
    }
}

/// Reads implementation files below a source root and memoizes the
/// classifier's verdict per path for the lifetime of the scanner.
pub struct SourceScanner<C: LexicalClassifier = RegexClassifier>
{
    root: PathBuf,
    classifier: C,
    cache: Cache<PathBuf, Arc<LexicalEvidence>>,
}

impl SourceScanner<RegexClassifier>
{
    pub fn new(root: impl Into<PathBuf>) -> Result<Self>
    {
        Ok(Self::with_classifier(root, RegexClassifier::new()?))
    }
}

impl<C: LexicalClassifier> SourceScanner<C>
{
    pub fn with_classifier(
        root: impl Into<PathBuf>,
        classifier: C,
    ) -> Self
    {
        Self { root: root.into(), classifier, cache: Cache::new(100_000) }
    }

    pub fn root(&self) -> &Path
    {
        &self.root
    }

    /// Evidence for `impl_file` (relative to the root). Missing or unreadable
    /// files produce empty evidence, never an error.
    pub fn evidence(
        &self,
        impl_file: &str,
    ) -> Arc<LexicalEvidence>
    {
        let path = self.root.join(impl_file);
        self.cache.get_with(path.clone(), || {
            let Some(text) = read_source_lossy(&path)
            else
            {
                trace!(path = %path.display(), "no lexical evidence");
                return Arc::new(LexicalEvidence::default());
            };

            let evidence = LexicalEvidence {
                static_names: self.classifier.static_names(&text),
                definitions: self.classifier.definition_names(&text),
            };
            trace!(
                path = %path.display(),
                statics = evidence.static_names.len(),
                definitions = evidence.definitions.len(),
                "scanned"
            );
            Arc::new(evidence)
        })
    }

    /// Number of files scanned so far
    pub fn cached_files(&self) -> u64
    {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}
