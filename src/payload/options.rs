//! Audit options: how payloads are combined with inputs and which variants get generated.

use crate::element::ElementKind;
use crate::error::{AuditError, Result};
use crate::http::request::HttpRequest;
use crate::payload::mutation::Mutation;
use bitflags::bitflags;
use indexmap::IndexMap;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Marker replaced by the payload when the `PLACEHOLDER` format is used.
pub const PLACEHOLDER_MARKER: &str = "__GAUNTLET__";

bitflags! {
    /// How a payload is combined with an input's original value.
    ///
    /// Exactly one of the base flags (`STRAIGHT`, `APPEND`, `PLACEHOLDER`) may
    /// be set; `NULL` and `SEMICOLON` modify whichever base applies.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Format: u8 {
        const STRAIGHT = 1;
        const APPEND = 1 << 1;
        const PLACEHOLDER = 1 << 2;
        /// terminate the value with a NUL byte
        const NULL = 1 << 3;
        /// prefix the payload with a semicolon
        const SEMICOLON = 1 << 4;
    }
}

impl Format {
    pub const BASE: Format = Format::STRAIGHT.union(Format::APPEND).union(Format::PLACEHOLDER);

    /// Modifiers on their own imply `STRAIGHT`.
    pub fn normalized(self) -> Format {
        if self.intersection(Format::BASE).is_empty() {
            self | Format::STRAIGHT
        } else {
            self
        }
    }

    pub fn validate(self) -> Result<Format> {
        if self.is_empty() {
            return Err(AuditError::config("empty payload format"));
        }
        if self.intersection(Format::BASE).bits().count_ones() > 1 {
            return Err(AuditError::config(format!(
                "payload format {:?} combines more than one of STRAIGHT, APPEND, PLACEHOLDER",
                self
            )));
        }
        Ok(self.normalized())
    }
}

pub type MutationPredicate = Arc<dyn Fn(&Mutation) -> bool + Send + Sync>;

/// Derives further mutations from each generated one; they are audited alongside it.
pub type EachMutation = Arc<dyn Fn(&Mutation) -> Vec<Mutation> + Send + Sync>;

/// Early-exit rules: matching inputs or mutations are never generated.
#[derive(Clone)]
pub enum SkipLike {
    InputName(Regex),
    Mutation(MutationPredicate),
}

impl SkipLike {
    pub fn input_name(&self, name: &str) -> bool {
        match self {
            SkipLike::InputName(r) => r.is_match(name),
            SkipLike::Mutation(_) => false,
        }
    }

    pub fn mutation(&self, mutation: &Mutation) -> bool {
        match self {
            SkipLike::InputName(_) => false,
            SkipLike::Mutation(predicate) => predicate(mutation),
        }
    }
}

impl fmt::Debug for SkipLike {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipLike::InputName(r) => f.debug_tuple("InputName").field(&r.as_str()).finish(),
            SkipLike::Mutation(_) => f.write_str("Mutation(<fn>)"),
        }
    }
}

/// Extra request data applied to every submission of an audit.
#[derive(Debug, Clone, Default)]
pub struct SubmitOverrides {
    pub headers: IndexMap<String, String>,
    pub cookies: IndexMap<String, String>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
}

impl SubmitOverrides {
    pub fn apply(&self, request: &mut HttpRequest) {
        for (name, value) in &self.headers {
            request.set_header(name, value);
        }
        if !self.cookies.is_empty() {
            request.add_cookies(self.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        if let Some(ref body) = self.body {
            request.set_body(body.clone());
        }
        if self.timeout.is_some() {
            request.timeout = self.timeout;
        }
    }
}

#[derive(Clone)]
pub struct AuditOptions {
    pub format: Vec<Format>,
    pub elements: Vec<ElementKind>,
    pub skip_like: Vec<SkipLike>,
    pub each_mutation: Option<EachMutation>,
    pub submit: SubmitOverrides,
    /// also use each payload as an input name
    pub flip_param: bool,
    /// also add one synthetic input carrying the payload
    pub with_extra_parameter: bool,
    /// propagate mutated cookies into the page's links and forms
    pub extensively: bool,
    /// skip coverage dedup
    pub force: bool,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            format: vec![Format::STRAIGHT, Format::APPEND],
            elements: ElementKind::ALL.to_vec(),
            skip_like: Vec::new(),
            each_mutation: None,
            submit: SubmitOverrides::default(),
            flip_param: false,
            with_extra_parameter: false,
            extensively: false,
            force: false,
        }
    }
}

impl AuditOptions {
    pub fn with_format(mut self, format: impl IntoIterator<Item = Format>) -> Self {
        self.format = format.into_iter().collect();
        self
    }

    pub fn with_elements(mut self, elements: impl IntoIterator<Item = ElementKind>) -> Self {
        self.elements = elements.into_iter().collect();
        self
    }

    pub fn skip_mutations<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Mutation) -> bool + Send + Sync + 'static,
    {
        self.skip_like.push(SkipLike::Mutation(Arc::new(predicate)));
        self
    }

    /// Checked once per audit, before anything is generated or sent.
    pub fn validate(&self) -> Result<()> {
        if self.format.is_empty() {
            return Err(AuditError::config("no payload format given"));
        }
        for format in &self.format {
            format.validate()?;
        }
        if self.elements.is_empty() {
            return Err(AuditError::config("no element kinds selected"));
        }
        Ok(())
    }

    pub fn normalized_formats(&self) -> Vec<Format> {
        let mut formats: Vec<Format> = Vec::with_capacity(self.format.len());
        for format in self.format.iter().map(|f| f.normalized()) {
            if !formats.contains(&format) {
                formats.push(format);
            }
        }
        formats
    }

    pub fn covers(&self, kind: ElementKind) -> bool {
        self.elements.contains(&kind)
    }
}

impl fmt::Debug for AuditOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditOptions")
            .field("format", &self.format)
            .field("elements", &self.elements)
            .field("skip_like", &self.skip_like)
            .field("each_mutation", &self.each_mutation.as_ref().map(|_| "<fn>"))
            .field("submit", &self.submit)
            .field("flip_param", &self.flip_param)
            .field("with_extra_parameter", &self.with_extra_parameter)
            .field("extensively", &self.extensively)
            .field("force", &self.force)
            .finish()
    }
}
