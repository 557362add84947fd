//! A mutation is an element with one input rewritten to carry a payload.

use crate::element::{Element, ElementKind};
use crate::fingerprint::persistent_hash;
use crate::http::request::HttpRequest;
use crate::payload::injector::{format_value, inject_input};
use crate::payload::options::{Format, SubmitOverrides};
use std::fmt;

/// Value given to a flipped input, where the payload is the name.
pub const FLIPPED_VALUE: &str = "1";

/// Name of the synthetic input added by extra-parameter mutations.
pub const EXTRA_NAME: &str = "gauntlet_extra";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// payload injected into an existing input's value
    Value,
    /// payload used as the input name
    FlippedName,
    /// payload sent in a new, unexpected input
    ExtraParameter,
    /// a mutated cookie riding along with another element's submission
    Carried,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Value => "value",
            MutationKind::FlippedName => "flipped",
            MutationKind::ExtraParameter => "extra",
            MutationKind::Carried => "carried",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarriedCookie {
    pub name: String,
    pub original: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct Mutation {
    element: Element,
    kind: MutationKind,
    affected_input_name: String,
    seed: String,
    format: Format,
    carried: Option<CarriedCookie>,
    coverage_id: String,
}

impl Mutation {
    fn assemble(
        element: Element,
        kind: MutationKind,
        affected_input_name: String,
        seed: String,
        format: Format,
        carried: Option<CarriedCookie>,
    ) -> Self {
        let coverage_id = coverage_id(&element, kind, &affected_input_name, &seed, format);
        Self {
            element,
            kind,
            affected_input_name,
            seed,
            format,
            carried,
            coverage_id,
        }
    }

    /// Inject `seed` into `name`. `None` when the format does not apply to the value.
    pub fn value(element: &Element, name: &str, seed: &str, format: Format) -> Option<Self> {
        let original = element
            .default_inputs()
            .get(name)
            .or_else(|| element.inputs().get(name))
            .map(String::as_str)
            .unwrap_or("");
        let value = format_value(original, seed, format)?;
        let mutated = element.with_inputs(inject_input(element.inputs(), name, &value));
        Some(Self::assemble(
            mutated,
            MutationKind::Value,
            name.to_string(),
            seed.to_string(),
            format.normalized(),
            None,
        ))
    }

    pub fn flipped(element: &Element, seed: &str) -> Self {
        let mutated = element.with_inputs(inject_input(element.inputs(), seed, FLIPPED_VALUE));
        Self::assemble(
            mutated,
            MutationKind::FlippedName,
            seed.to_string(),
            seed.to_string(),
            Format::STRAIGHT,
            None,
        )
    }

    pub fn extra_parameter(element: &Element, seed: &str) -> Self {
        let mutated = element.with_inputs(inject_input(element.inputs(), EXTRA_NAME, seed));
        Self::assemble(
            mutated,
            MutationKind::ExtraParameter,
            EXTRA_NAME.to_string(),
            seed.to_string(),
            Format::STRAIGHT,
            None,
        )
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn affected_input_name(&self) -> &str {
        &self.affected_input_name
    }

    /// The value the affected input carries in this mutation.
    pub fn affected_input_value(&self) -> Option<&str> {
        match self.carried {
            Some(ref c) => Some(c.value.as_str()),
            None => self
                .element
                .inputs()
                .get(&self.affected_input_name)
                .map(String::as_str),
        }
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn carried_cookie(&self) -> Option<&CarriedCookie> {
        self.carried.as_ref()
    }

    pub fn coverage_id(&self) -> &str {
        &self.coverage_id
    }

    pub fn coverage_hash(&self) -> u64 {
        persistent_hash(&self.coverage_id)
    }

    /// The same test with a different payload.
    pub fn reseed(&self, seed: &str) -> Option<Self> {
        match self.kind {
            MutationKind::Value => {
                let parent = self.parent();
                Self::value(&parent, &self.affected_input_name, seed, self.format)
            }
            MutationKind::FlippedName => {
                let parent = self.parent();
                if !parent.valid_input_name(seed) || parent.inputs().contains_key(seed) {
                    return None;
                }
                Some(Self::flipped(&parent, seed))
            }
            MutationKind::ExtraParameter => Some(Self::extra_parameter(&self.parent(), seed)),
            MutationKind::Carried => {
                let carried = self.carried.as_ref()?;
                let value = format_value(&carried.original, seed, self.format)?;
                Some(Self::assemble(
                    self.element.clone(),
                    MutationKind::Carried,
                    self.affected_input_name.clone(),
                    seed.to_string(),
                    self.format,
                    Some(CarriedCookie {
                        value,
                        ..carried.clone()
                    }),
                ))
            }
        }
    }

    /// The affected input restored to its original value.
    pub fn control(&self) -> Option<Self> {
        let original = match self.carried {
            Some(ref c) => c.original.clone(),
            None => self
                .element
                .default_inputs()
                .get(&self.affected_input_name)?
                .clone(),
        };
        match self.kind {
            MutationKind::Value => Self::value(
                &self.parent(),
                &self.affected_input_name,
                &original,
                Format::STRAIGHT,
            ),
            MutationKind::Carried => {
                let mut control = self.reseed(&original)?;
                control.format = Format::STRAIGHT;
                if let Some(ref mut c) = control.carried {
                    c.value = original.clone();
                }
                control.coverage_id = coverage_id(
                    &control.element,
                    control.kind,
                    &control.affected_input_name,
                    &control.seed,
                    control.format,
                );
                Some(control)
            }
            _ => None,
        }
    }

    /// This cookie mutation sent along with `carrier`'s own submission.
    pub fn carried_by(&self, carrier: &Element) -> Option<Self> {
        if self.kind != MutationKind::Value || self.element.kind() != ElementKind::Cookie {
            return None;
        }
        if !matches!(carrier.kind(), ElementKind::Link | ElementKind::Form) {
            return None;
        }
        let value = self.affected_input_value()?.to_string();
        let original = self
            .element
            .default_inputs()
            .get(&self.affected_input_name)
            .cloned()
            .unwrap_or_default();

        Some(Self::assemble(
            carrier.clone(),
            MutationKind::Carried,
            self.affected_input_name.clone(),
            self.seed.clone(),
            self.format,
            Some(CarriedCookie {
                name: self.affected_input_name.clone(),
                original,
                value,
            }),
        ))
    }

    pub fn to_request(&self, overrides: &SubmitOverrides) -> HttpRequest {
        let mut request = self.element.to_request();
        if let Some(ref c) = self.carried {
            request.add_cookies([(c.name.as_str(), c.value.as_str())]);
        }
        overrides.apply(&mut request);
        request
    }

    /// The element this mutation was derived from, inputs reset to defaults.
    fn parent(&self) -> Element {
        let mut inputs = self.element.default_inputs().clone();
        // inputs added after parsing (flips, extras) are not part of the parent
        inputs.retain(|k, _| self.element.inputs().contains_key(k));
        self.element.with_inputs(inputs)
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} input '{}' ({}) with {:?}",
            self.element,
            self.affected_input_name,
            self.kind.as_str(),
            self.seed
        )
    }
}

/// Deterministic description of the test a mutation performs.
pub fn coverage_id(
    element: &Element,
    kind: MutationKind,
    affected_input_name: &str,
    seed: &str,
    format: Format,
) -> String {
    format!(
        "{}:{}:{}:{}:{}:{}:{}:{}",
        element.kind(),
        element.method(),
        element.action_key(),
        element.sorted_input_names().join("&"),
        affected_input_name,
        format.bits(),
        kind.as_str(),
        seed
    )
}
