//! Auditable elements: the injection points found on a page.
//!
//! An element is immutable once built. Mutating one means calling
//! `with_inputs`, which returns a new element sharing the original
//! `default_inputs` snapshot.

pub mod page;

use crate::fingerprint::persistent_hash_parts;
use crate::http::request::HttpRequest;
use indexmap::IndexMap;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use url::Url;

pub use page::{Page, PageOptions};

pub type Inputs = IndexMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Link,
    Form,
    Cookie,
    Header,
    #[serde(rename = "link_template")]
    LinkTemplate,
}

impl ElementKind {
    pub const ALL: [ElementKind; 5] = [
        ElementKind::Link,
        ElementKind::Form,
        ElementKind::Cookie,
        ElementKind::Header,
        ElementKind::LinkTemplate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Link => "link",
            ElementKind::Form => "form",
            ElementKind::Cookie => "cookie",
            ElementKind::Header => "header",
            ElementKind::LinkTemplate => "link_template",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific state. Only link templates carry anything extra.
#[derive(Debug, Clone)]
pub enum Variant {
    Link,
    Form,
    Cookie,
    Header,
    LinkTemplate(Arc<Regex>),
}

#[derive(Debug, Clone)]
pub struct Element {
    variant: Variant,
    action: Url,
    method: Method,
    inputs: Inputs,
    default_inputs: Arc<Inputs>,
    source: Option<String>,
}

impl Element {
    fn build(variant: Variant, action: Url, method: Method, inputs: Inputs) -> Self {
        Self {
            variant,
            action,
            method,
            default_inputs: Arc::new(inputs.clone()),
            inputs,
            source: None,
        }
    }

    /// A link whose query parameters are the inputs.
    pub fn link(url: &Url) -> Self {
        let inputs: Inputs = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self::build(Variant::Link, strip_query(url), Method::GET, inputs)
    }

    pub fn form(action: &Url, method: Method, inputs: Inputs) -> Self {
        let mut action = action.clone();
        action.set_fragment(None);
        if method == Method::GET {
            action.set_query(None);
        }
        Self::build(Variant::Form, action, method, inputs)
    }

    pub fn cookie(action: &Url, name: &str, value: &str) -> Self {
        let mut inputs = Inputs::new();
        inputs.insert(name.to_string(), value.to_string());
        Self::build(Variant::Cookie, strip_query(action), Method::GET, inputs)
    }

    pub fn header(action: &Url, name: &str, value: &str) -> Self {
        let mut inputs = Inputs::new();
        inputs.insert(name.to_string(), value.to_string());
        Self::build(Variant::Header, strip_query(action), Method::GET, inputs)
    }

    /// Inputs are the named groups of `template` matched against the full URL.
    /// Returns `None` when the template does not match or has no named groups.
    pub fn link_template(url: &Url, template: Arc<Regex>) -> Option<Self> {
        let captures = template.captures(url.as_str())?;
        let inputs: Inputs = template
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), decode_component(m.as_str())))
            })
            .collect();

        if inputs.is_empty() {
            return None;
        }

        let mut action = url.clone();
        action.set_fragment(None);
        Some(Self::build(
            Variant::LinkTemplate(template),
            action,
            Method::GET,
            inputs,
        ))
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ElementKind {
        match self.variant {
            Variant::Link => ElementKind::Link,
            Variant::Form => ElementKind::Form,
            Variant::Cookie => ElementKind::Cookie,
            Variant::Header => ElementKind::Header,
            Variant::LinkTemplate(_) => ElementKind::LinkTemplate,
        }
    }

    pub fn variant(&self) -> &Variant {
        &self.variant
    }

    pub fn action(&self) -> &Url {
        &self.action
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    pub fn default_inputs(&self) -> &Inputs {
        &self.default_inputs
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Action without query or fragment, the part of the URL that identifies the endpoint.
    pub fn action_key(&self) -> String {
        strip_query(&self.action).to_string()
    }

    pub fn sorted_input_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inputs.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Structural identity: kind, method, endpoint and the set of input names.
    pub fn identity(&self) -> u64 {
        persistent_hash_parts([
            self.kind().as_str().to_string(),
            self.method.as_str().to_string(),
            self.action_key(),
            self.sorted_input_names().join("&"),
        ])
    }

    /// A copy of this element carrying different inputs; defaults are shared.
    pub fn with_inputs(&self, inputs: Inputs) -> Self {
        Self {
            variant: self.variant.clone(),
            action: self.action.clone(),
            method: self.method.clone(),
            inputs,
            default_inputs: Arc::clone(&self.default_inputs),
            source: self.source.clone(),
        }
    }

    pub fn valid_input_name(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        match &self.variant {
            Variant::Link | Variant::Form => true,
            Variant::Cookie => !name
                .chars()
                .any(|c| c == '=' || c == ';' || c == ',' || c.is_whitespace() || c.is_control()),
            Variant::Header => name.bytes().all(is_token_byte),
            Variant::LinkTemplate(template) => template.capture_names().flatten().any(|n| n == name),
        }
    }

    pub fn valid_input_data(&self, data: &str) -> bool {
        match self.variant {
            Variant::Header => !data.chars().any(|c| c.is_control()),
            _ => true,
        }
    }

    /// The request that submits this element with its current inputs.
    pub fn to_request(&self) -> HttpRequest {
        match &self.variant {
            Variant::Link => HttpRequest::get(with_query(&self.action, &self.inputs)),
            Variant::Form if self.method == Method::GET => {
                HttpRequest::get(with_query(&self.action, &self.inputs))
            }
            Variant::Form => {
                let body = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(self.inputs.iter())
                    .finish();
                let mut req = HttpRequest::new(self.method.clone(), self.action.clone());
                req.set_body(body);
                req.set_header(CONTENT_TYPE.as_str(), "application/x-www-form-urlencoded");
                req
            }
            Variant::Cookie => {
                let mut req = HttpRequest::get(self.action.clone());
                req.add_cookies(self.inputs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
                req
            }
            Variant::Header => {
                let mut req = HttpRequest::get(self.action.clone());
                for (name, value) in &self.inputs {
                    if !req.set_header(name, value) {
                        tracing::debug!("Dropping unsendable header {:?}", name);
                    }
                }
                req
            }
            Variant::LinkTemplate(template) => {
                HttpRequest::get(fill_template(&self.action, template, &self.inputs))
            }
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind(), self.method, self.action)
    }
}

fn strip_query(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url
}

fn with_query(action: &Url, inputs: &Inputs) -> Url {
    let mut url = action.clone();
    if inputs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(inputs.iter());
    }
    url
}

fn decode_component(raw: &str) -> String {
    url::form_urlencoded::parse(format!("v={}", raw).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| raw.to_string())
}

/// Replace every named group span of `template` in `action` with the encoded input value.
fn fill_template(action: &Url, template: &Regex, inputs: &Inputs) -> Url {
    let original = action.as_str();
    let captures = match template.captures(original) {
        Some(c) => c,
        None => return action.clone(),
    };

    let mut spans: Vec<(usize, usize, String)> = template
        .capture_names()
        .flatten()
        .filter_map(|name| {
            let m = captures.name(name)?;
            let value = inputs.get(name)?;
            let encoded: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
            Some((m.start(), m.end(), encoded))
        })
        .collect();
    spans.sort_by_key(|(start, _, _)| *start);

    let mut filled = String::with_capacity(original.len());
    let mut cursor = 0;
    for (start, end, value) in spans {
        if start < cursor {
            continue;
        }
        filled.push_str(&original[cursor..start]);
        filled.push_str(&value);
        cursor = end;
    }
    filled.push_str(&original[cursor..]);

    Url::parse(&filled).unwrap_or_else(|_| action.clone())
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
