//! Tag-driven handler resolution.
//!
//! A [`Dispatcher`] is an ordered table of `(name, handler)` pairs. A handler
//! matches a target when its name is the target's snake-cased tag or a whole
//! trailing `_`-segment run of it (`member_expression` matches
//! `static_member_expression`, `struct` never matches `construct`). Of all
//! matches the longest name wins. With no match the fallback runs, and
//! without a fallback resolution fails.
use std::borrow::Cow;

use crate::error::DispatchError;
use crate::ir::IrNode;
use crate::model::Value;
use crate::types::example::to_snake_case;
use crate::types::DyType;

/// Anything a handler can be chosen for.
pub trait Tagged {
    fn tag(&self) -> Cow<'_, str>;
}

impl Tagged for DyType {
    fn tag(&self) -> Cow<'_, str> { Cow::Borrowed(self.kind()) }
}

impl Tagged for IrNode {
    fn tag(&self) -> Cow<'_, str> { Cow::Borrowed(self.kind()) }
}

/// Plain values dispatch on their runtime shape.
impl Tagged for Value {
    fn tag(&self) -> Cow<'_, str> {
        match self {
            Value::Type(t) => t.tag(),
            Value::Node(n) => n.tag(),
            other => Cow::Borrowed(other.kind().name()),
        }
    }
}

impl Tagged for str {
    fn tag(&self) -> Cow<'_, str> { Cow::Borrowed(self) }
}

/// `tag` is `name`, or ends in `_name`.
fn tag_matches(tag: &str, name: &str) -> bool {
    match tag.strip_suffix(name) {
        Some("") => true,
        Some(rest) => rest.ends_with('_'),
        None => false,
    }
}

pub struct Dispatcher<H> {
    // kept sorted by name length, longest first; ties keep registration order
    handlers: Vec<(String, H)>,
    fallback: Option<H>,
}

impl<H> Default for Dispatcher<H> {
    fn default() -> Self {
        Self { handlers: Vec::new(), fallback: None }
    }
}

impl<H> Dispatcher<H> {
    pub fn new() -> Self { Self::default() }

    pub fn on(mut self, name: &str, handler: H) -> Self {
        let name = to_snake_case(name);
        let at = self.handlers.partition_point(|(n, _)| n.len() >= name.len());
        self.handlers.insert(at, (name, handler));
        self
    }

    pub fn otherwise(mut self, handler: H) -> Self {
        self.fallback = Some(handler);
        self
    }

    /// Handler names that match `tag`, most specific first.
    pub fn candidates<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let normalized = to_snake_case(tag);
        self.handlers
            .iter()
            .filter(move |(name, _)| tag_matches(&normalized, name))
            .map(|(name, _)| name.as_str())
    }

    pub fn resolve_tag(&self, tag: &str) -> Result<&H, DispatchError> {
        let normalized = to_snake_case(tag);
        self.handlers
            .iter()
            .find(|(name, _)| tag_matches(&normalized, name))
            .map(|(_, h)| h)
            .or(self.fallback.as_ref())
            .ok_or_else(|| DispatchError::NoHandler(tag.to_string()))
    }

    pub fn resolve<T: Tagged + ?Sized>(&self, target: &T) -> Result<&H, DispatchError> {
        self.resolve_tag(&target.tag())
    }

    /// The fallback handler, if any; for handlers that decline a target.
    pub fn fallback(&self) -> Option<&H> { self.fallback.as_ref() }
}
