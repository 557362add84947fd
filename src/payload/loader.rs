//! Payload sets: fixed lists, or generators evaluated per input.

use crate::element::Element;
use crate::error::{AuditError, Result};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub type PayloadGenerator = Arc<dyn Fn(&Element, &str) -> Vec<String> + Send + Sync>;

#[derive(Clone)]
pub enum PayloadSet {
    Static {
        name: String,
        payloads: Arc<[String]>,
    },
    /// Called lazily with the element and the input name being mutated.
    Dynamic {
        name: String,
        generator: PayloadGenerator,
    },
}

impl PayloadSet {
    pub fn new<S: Into<String>>(name: impl Into<String>, payloads: impl IntoIterator<Item = S>) -> Self {
        PayloadSet::Static {
            name: name.into(),
            payloads: payloads.into_iter().map(Into::into).collect(),
        }
    }

    pub fn dynamic<F>(name: impl Into<String>, generator: F) -> Self
    where
        F: Fn(&Element, &str) -> Vec<String> + Send + Sync + 'static,
    {
        PayloadSet::Dynamic {
            name: name.into(),
            generator: Arc::new(generator),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PayloadSet::Static { name, .. } | PayloadSet::Dynamic { name, .. } => name,
        }
    }

    pub fn for_input(&self, element: &Element, input: &str) -> Arc<[String]> {
        match self {
            PayloadSet::Static { payloads, .. } => Arc::clone(payloads),
            PayloadSet::Dynamic { generator, .. } => generator(element, input).into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            PayloadSet::Static { name, payloads } if payloads.is_empty() => Err(AuditError::config(
                format!("payload set '{}' is empty", name),
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for PayloadSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadSet::Static { name, payloads } => f
                .debug_struct("Static")
                .field("name", name)
                .field("payloads", &payloads.len())
                .finish(),
            PayloadSet::Dynamic { name, .. } => {
                f.debug_struct("Dynamic").field("name", name).finish()
            }
        }
    }
}

/// One payload per non-empty line; the file name becomes the set name.
pub fn load_payloads<P: AsRef<Path>>(path: P) -> anyhow::Result<PayloadSet> {
    let content = fs::read_to_string(&path)?;
    let payloads: Vec<String> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.to_string())
        .collect();

    let name = path
        .as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "payloads".to_string());

    tracing::debug!("Loaded {} payloads from {}", payloads.len(), name);
    Ok(PayloadSet::new(name, payloads))
}
