//! Lazy mutation generation.
//!
//! `mutations` returns an iterator that owns everything it needs, so the same
//! element can be expanded by several checks at once. Order is: every
//! eligible input, every payload, every format; then flipped names; then the
//! extra parameter.

use crate::element::Element;
use crate::payload::loader::PayloadSet;
use crate::payload::mutation::{Mutation, EXTRA_NAME};
use crate::payload::options::{AuditOptions, Format, SkipLike};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Values,
    Flip,
    Extra,
    Done,
}

pub struct MutationIter {
    element: Element,
    payloads: PayloadSet,
    formats: Vec<Format>,
    skip_like: Vec<SkipLike>,
    flip_param: bool,
    with_extra_parameter: bool,
    names: Vec<String>,
    stage: Stage,
    name_idx: usize,
    payload_idx: usize,
    format_idx: usize,
    current: Option<Arc<[String]>>,
}

pub fn mutations(element: &Element, payloads: &PayloadSet, options: &AuditOptions) -> MutationIter {
    let names: Vec<String> = element
        .inputs()
        .keys()
        .filter(|name| element.valid_input_name(name))
        .filter(|name| !options.skip_like.iter().any(|s| s.input_name(name)))
        .cloned()
        .collect();

    let stage = if names.is_empty() { Stage::Done } else { Stage::Values };

    MutationIter {
        element: element.clone(),
        payloads: payloads.clone(),
        formats: options.normalized_formats(),
        skip_like: options.skip_like.clone(),
        flip_param: options.flip_param,
        with_extra_parameter: options.with_extra_parameter,
        names,
        stage,
        name_idx: 0,
        payload_idx: 0,
        format_idx: 0,
        current: None,
    }
}

impl MutationIter {
    fn skipped(&self, mutation: &Mutation) -> bool {
        self.skip_like.iter().any(|s| s.mutation(mutation))
    }

    fn advance(&mut self) {
        self.stage = match self.stage {
            Stage::Values if self.flip_param => Stage::Flip,
            Stage::Values | Stage::Flip
                if self.with_extra_parameter && self.element.valid_input_name(EXTRA_NAME) =>
            {
                Stage::Extra
            }
            _ => Stage::Done,
        };
        self.payload_idx = 0;
        self.current = None;
    }

    fn next_value(&mut self) -> Option<Option<Mutation>> {
        let name = match self.names.get(self.name_idx) {
            Some(n) => n.clone(),
            None => return None,
        };

        let payloads = match self.current {
            Some(ref p) => Arc::clone(p),
            None => {
                let p = self.payloads.for_input(&self.element, &name);
                self.current = Some(Arc::clone(&p));
                p
            }
        };

        if self.payload_idx >= payloads.len() || self.formats.is_empty() {
            self.name_idx += 1;
            self.payload_idx = 0;
            self.format_idx = 0;
            self.current = None;
            return Some(None);
        }

        let seed = &payloads[self.payload_idx];
        let format = self.formats[self.format_idx];

        self.format_idx += 1;
        if self.format_idx >= self.formats.len() {
            self.format_idx = 0;
            self.payload_idx += 1;
        }

        let mutation = Mutation::value(&self.element, &name, seed, format)
            .filter(|m| m.affected_input_value().is_some_and(|v| self.element.valid_input_data(v)));
        Some(mutation)
    }

    /// Payloads for the flip and extra stages, which have no real input name.
    fn stage_payloads(&mut self, input: &str) -> Arc<[String]> {
        match self.current {
            Some(ref p) => Arc::clone(p),
            None => {
                let p = self.payloads.for_input(&self.element, input);
                self.current = Some(Arc::clone(&p));
                p
            }
        }
    }
}

impl Iterator for MutationIter {
    type Item = Mutation;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let candidate = match self.stage {
                Stage::Done => return None,
                Stage::Values => match self.next_value() {
                    Some(candidate) => candidate,
                    None => {
                        self.advance();
                        continue;
                    }
                },
                Stage::Flip => {
                    let payloads = self.stage_payloads("");
                    let Some(seed) = payloads.get(self.payload_idx) else {
                        self.advance();
                        continue;
                    };
                    self.payload_idx += 1;
                    if self.element.valid_input_name(seed) && !self.element.inputs().contains_key(seed) {
                        Some(Mutation::flipped(&self.element, seed))
                    } else {
                        None
                    }
                }
                Stage::Extra => {
                    let payloads = self.stage_payloads(EXTRA_NAME);
                    let Some(seed) = payloads.get(self.payload_idx) else {
                        self.advance();
                        continue;
                    };
                    self.payload_idx += 1;
                    if self.element.valid_input_data(seed) {
                        Some(Mutation::extra_parameter(&self.element, seed))
                    } else {
                        None
                    }
                }
            };

            if let Some(mutation) = candidate {
                if !self.skipped(&mutation) {
                    return Some(mutation);
                }
            }
        }
    }
}
