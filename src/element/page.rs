//! A fetched page and the elements found on it.

use crate::core::config::AuditConfig;
use crate::element::{Element, ElementKind, Inputs};
use crate::error::{compile_pattern, Result};
use crate::http::response::HttpResponse;
use indexmap::IndexMap;
use regex::Regex;
use reqwest::Method;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// What besides links and forms gets turned into elements.
#[derive(Debug, Clone, Default)]
pub struct PageOptions {
    pub audit_headers: IndexMap<String, String>,
    pub link_templates: Vec<Arc<Regex>>,
}

impl PageOptions {
    pub fn from_config(config: &AuditConfig) -> Result<Self> {
        let link_templates = config
            .link_templates
            .iter()
            .map(|p| compile_pattern(p).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            audit_headers: config.audit_headers.clone(),
            link_templates,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    elements: Vec<Element>,
}

impl Page {
    /// A page with a fixed set of elements, for callers that did their own parsing.
    pub fn new(url: Url, elements: Vec<Element>) -> Self {
        let mut page = Self {
            url,
            status: 200,
            headers: HashMap::new(),
            body: String::new(),
            elements: Vec::new(),
        };
        for element in elements {
            page.push(element);
        }
        page
    }

    pub fn parse(resp: &HttpResponse, options: &PageOptions) -> Self {
        let url = resp.url.clone();
        let body = resp.body_text();
        let mut page = Self {
            url: url.clone(),
            status: resp.status,
            headers: resp.headers.clone(),
            body,
            elements: Vec::new(),
        };

        let mut found = Vec::new();
        {
            let document = Html::parse_document(&page.body);

            if url.query().is_some() {
                found.push(Element::link(&url));
            }

            if let Ok(a_sel) = Selector::parse("a[href]") {
                for el in document.select(&a_sel) {
                    if let Some(href) = el.value().attr("href") {
                        if let Ok(target) = url.join(href) {
                            if target.query().is_some() {
                                found.push(Element::link(&target));
                            }
                            for template in &options.link_templates {
                                if let Some(t) = Element::link_template(&target, Arc::clone(template)) {
                                    found.push(t);
                                }
                            }
                        }
                    }
                }
            }

            if let Ok(form_sel) = Selector::parse("form") {
                for form in document.select(&form_sel) {
                    if let Some(element) = parse_form(&url, form) {
                        found.push(element);
                    }
                }
            }
        }

        if let Some(set_cookie) = resp.header("set-cookie") {
            for line in set_cookie.lines() {
                let pair = line.split(';').next().unwrap_or("");
                if let Some((name, value)) = pair.split_once('=') {
                    let name = name.trim();
                    if !name.is_empty() {
                        found.push(Element::cookie(&url, name, value.trim()));
                    }
                }
            }
        }

        for (name, value) in &options.audit_headers {
            found.push(Element::header(&url, name, value));
        }

        for element in found {
            page.push(element);
        }

        tracing::debug!("Parsed {} elements from {}", page.elements.len(), page.url);
        page
    }

    /// Adds an element unless one with the same identity is already present.
    pub fn push(&mut self, element: Element) -> bool {
        let id = element.identity();
        if self.elements.iter().any(|e| e.identity() == id) {
            return false;
        }
        self.elements.push(element);
        true
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn of_kind(&self, kind: ElementKind) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(move |e| e.kind() == kind)
    }

    pub fn links(&self) -> Vec<&Element> {
        self.of_kind(ElementKind::Link).collect()
    }

    pub fn forms(&self) -> Vec<&Element> {
        self.of_kind(ElementKind::Form).collect()
    }

    pub fn cookies(&self) -> Vec<&Element> {
        self.of_kind(ElementKind::Cookie).collect()
    }

    pub fn headers(&self) -> Vec<&Element> {
        self.of_kind(ElementKind::Header).collect()
    }
}

fn parse_form(page_url: &Url, form: ElementRef<'_>) -> Option<Element> {
    let action = form.value().attr("action").unwrap_or("");
    let action = if action.is_empty() {
        page_url.clone()
    } else {
        page_url.join(action).ok()?
    };
    let method = form
        .value()
        .attr("method")
        .map(|m| m.trim().to_ascii_uppercase())
        .and_then(|m| Method::from_bytes(m.as_bytes()).ok())
        .unwrap_or(Method::GET);

    let field_sel = Selector::parse("input[name], select[name], textarea[name]").ok()?;
    let option_sel = Selector::parse("option").ok()?;

    let mut inputs = Inputs::new();
    for field in form.select(&field_sel) {
        let attrs = field.value();
        let Some(name) = attrs.attr("name") else {
            continue;
        };
        let value = match attrs.name() {
            "textarea" => field.text().collect::<String>(),
            "select" => {
                let options: Vec<ElementRef<'_>> = field.select(&option_sel).collect();
                options
                    .iter()
                    .find(|o| o.value().attr("selected").is_some())
                    .or_else(|| options.first())
                    .map(|o| {
                        o.value()
                            .attr("value")
                            .map(str::to_string)
                            .unwrap_or_else(|| o.text().collect::<String>().trim().to_string())
                    })
                    .unwrap_or_default()
            }
            _ => attrs.attr("value").unwrap_or("").to_string(),
        };
        inputs.entry(name.to_string()).or_insert(value);
    }

    if inputs.is_empty() {
        return None;
    }

    Some(Element::form(&action, method, inputs).with_source(form.html()))
}
