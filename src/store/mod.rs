//! Fragment store: the collaborator the engine reads fragments from.
//!
//! `MemoryStore` keeps everything in insertion order; `FileStore`
//! persists a `MemoryStore` as one JSON document.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::{FolderTree, MemoryStore};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::json;

/// A stored, reusable code snippet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fragment
{
    /// Unique key
    pub label: String,
    pub body: String,
    /// Comma-joined keywords matched by synthesis
    pub keywords: String,
    pub scope: String,
    pub domain: String,
    /// Comma-joined tags
    pub tags: String,
    /// Editor snippet trigger
    pub prefix: String,
    /// Serialized placeholder list (`{0:x}, {1:y:<class 'int'>}`)
    pub placeholders: String,
    pub description: String,
}

impl Fragment
{
    pub fn new(label: impl Into<String>) -> Self
    {
        Self { label: label.into(), ..Self::default() }
    }

    /// Keywords split on `,`, trimmed, empties dropped
    pub fn keyword_list(&self) -> Vec<&str>
    {
        split_list(&self.keywords)
    }

    pub fn tag_list(&self) -> Vec<&str>
    {
        split_list(&self.tags)
    }

    /// Add a tag; false if already present
    pub fn add_tag(
        &mut self,
        tag: &str,
    ) -> bool
    {
        let tag = tag.trim();
        if tag.is_empty() || self.tag_list().contains(&tag)
        {
            return false;
        }

        let mut tags: Vec<&str> = self.tag_list();
        tags.push(tag);
        self.tags = tags.join(",");
        true
    }

    /// Remove a tag; false if absent
    pub fn remove_tag(
        &mut self,
        tag: &str,
    ) -> bool
    {
        let tag = tag.trim();
        let before = self.tag_list().len();
        let tags: Vec<&str> = self
            .tag_list()
            .into_iter()
            .filter(|t| *t != tag)
            .collect();

        if tags.len() == before
        {
            return false;
        }

        self.tags = tags.join(",");
        true
    }

    /// Editor-snippet view of the fragment
    pub fn snippet_json(&self) -> serde_json::Value
    {
        json!({
            "label": self.label,
            "prefix": self.prefix,
            "scope": self.scope,
            "body": self.body,
            "description": self.description,
        })
    }
}

fn split_list(s: &str) -> Vec<&str>
{
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Fields a filter term can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKey
{
    Label,
    Scope,
    Domain,
    Keyword,
    Tag,
}

impl FilterKey
{
    fn parse(key: &str) -> Option<Self>
    {
        match key
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "label" => Some(Self::Label),
            "scope" => Some(Self::Scope),
            "domain" => Some(Self::Domain),
            "keyword" | "keywords" => Some(Self::Keyword),
            "tag" | "tags" => Some(Self::Tag),
            _ => None,
        }
    }

    fn field<'f>(
        self,
        f: &'f Fragment,
    ) -> &'f str
    {
        match self
        {
            Self::Label => &f.label,
            Self::Scope => &f.scope,
            Self::Domain => &f.domain,
            Self::Keyword => &f.keywords,
            Self::Tag => &f.tags,
        }
    }
}

/// Conjunction of case-insensitive substring terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentFilter
{
    terms: Vec<(FilterKey, String)>,
}

impl FragmentFilter
{
    /// Parse `key:value[,key:value...]`. A term without a key matches
    /// the label; an empty predicate matches everything.
    pub fn parse(predicate: &str) -> Result<Self, StoreError>
    {
        let mut terms = Vec::new();

        for term in predicate.split(',')
        {
            let term = term.trim();
            if term.is_empty()
            {
                continue;
            }

            let (key, value) = match term.split_once(':')
            {
                Some((k, v)) => (
                    FilterKey::parse(k).ok_or_else(|| StoreError::Filter(format!("unknown key `{k}`")))?,
                    v,
                ),
                None => (FilterKey::Label, term),
            };
            terms.push((key, value.trim().to_lowercase()));
        }

        Ok(Self { terms })
    }

    /// Single keyword term; used for tokens that may contain `,` or `:`
    pub fn keyword(token: &str) -> Self
    {
        Self { terms: vec![(FilterKey::Keyword, token.to_lowercase())] }
    }

    pub fn matches(
        &self,
        f: &Fragment,
    ) -> bool
    {
        self.terms
            .iter()
            .all(|(key, value)| {
                key.field(f)
                    .to_lowercase()
                    .contains(value.as_str())
            })
    }
}

/// Store failures other than duplicate or missing labels.
#[derive(Debug, thiserror::Error)]
pub enum StoreError
{
    #[error("invalid filter: {0}")]
    Filter(String),

    #[error("folder operation rejected: {0}")]
    Folder(String),

    #[error("store i/o failed at {path}")]
    Io
    {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store file {path} is not valid JSON")]
    Json
    {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Fragment storage seen by the engine and the CLI.
pub trait FragmentStore
{
    /// Every fragment in store order
    fn fragments(&self) -> Vec<Fragment>;

    fn get(
        &self,
        label: &str,
    ) -> Option<Fragment>;

    fn filter(
        &self,
        filter: &FragmentFilter,
    ) -> Vec<Fragment>
    {
        self.fragments()
            .into_iter()
            .filter(|f| filter.matches(f))
            .collect()
    }

    /// Fragments matching a `key:value,...` predicate
    fn get_filtered_fragments(
        &self,
        predicate: &str,
    ) -> Result<Vec<Fragment>, StoreError>
    {
        Ok(self.filter(&FragmentFilter::parse(predicate)?))
    }

    /// Insert; false when the label is taken
    fn add_fragment(
        &mut self,
        fragment: Fragment,
    ) -> bool;

    /// Replace by label; false when the label is unknown
    fn update_fragment(
        &mut self,
        fragment: Fragment,
    ) -> bool;

    fn delete_fragment(
        &mut self,
        label: &str,
    ) -> bool;
}
