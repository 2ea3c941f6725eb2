//! CSS selector matching for [`MemoryDom`](super::MemoryDom).
//!
//! Parsing is done by the `selectors` crate, the engine `scraper` is built
//! on; matching goes through an [`Element`] view over arena nodes. Selector
//! lists, combinators, attribute operators, quoted values with escapes and
//! structural pseudo-classes behave as in a browser. State pseudo-classes
//! such as `:hover` are rejected at parse time.

use std::fmt;

use cssparser::{ParserInput, ToCss, serialize_identifier, serialize_string};
use precomputed_hash::PrecomputedHash;
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::bloom::BloomFilter;
use selectors::context::{
    MatchingContext, MatchingForInvalidation, MatchingMode, NeedsSelectorFlags, QuirksMode,
    SelectorCaches,
};
use selectors::matching::{self, ElementSelectorFlags};
use selectors::parser::{self, ParseRelative, SelectorList, SelectorParseErrorKind};
use selectors::{Element, OpaqueElement};
use xxhash_rust::xxh3::xxh3_64;

use super::{Arena, Kind};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid selector {selector:?}: {reason}")]
pub struct SelectorParseError {
    selector: String,
    reason: String,
}

/// A parsed selector list.
#[derive(Debug, Clone)]
pub struct Selector {
    list: SelectorList<ArenaSelectors>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorParseError> {
        let mut parser_input = ParserInput::new(input);
        let mut parser = cssparser::Parser::new(&mut parser_input);
        SelectorList::parse(&SelectorParser, &mut parser, ParseRelative::No)
            .map(|list| Self { list })
            .map_err(|e| SelectorParseError {
                selector: input.to_string(),
                reason: format!("{:?}", e.kind),
            })
    }

    /// The element nodes among `candidates` that match, order preserved.
    pub(super) fn filter(&self, arena: &Arena, candidates: Vec<usize>) -> Vec<usize> {
        let mut caches = SelectorCaches::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut caches,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            MatchingForInvalidation::No,
        );
        candidates
            .into_iter()
            .filter(|&node| {
                if arena.tag(node).is_none() {
                    return false;
                }
                let element = ArenaElement { arena, node };
                self.list
                    .slice()
                    .iter()
                    .any(|s| matching::matches_selector(s, 0, None, &element, &mut context))
            })
            .collect()
    }
}

/// Selector implementation over plain strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaSelectors;

impl parser::SelectorImpl for ArenaSelectors {
    type ExtraMatchingData<'a> = ();
    type AttrValue = CssString;
    type Identifier = CssName;
    type LocalName = CssName;
    type NamespacePrefix = CssName;
    type NamespaceUrl = CssName;
    type BorrowedNamespaceUrl = CssName;
    type BorrowedLocalName = CssName;
    type NonTSPseudoClass = PseudoClass;
    type PseudoElement = PseudoElement;
}

struct SelectorParser;

impl<'i> parser::Parser<'i> for SelectorParser {
    type Impl = ArenaSelectors;
    type Error = SelectorParseErrorKind<'i>;
}

/// Quoted attribute value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CssString(String);

impl From<&str> for CssString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for CssString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ToCss for CssString {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        serialize_string(&self.0, dest)
    }
}

impl PrecomputedHash for CssString {
    fn precomputed_hash(&self) -> u32 {
        xxh3_64(self.0.as_bytes()) as u32
    }
}

/// Tag, attribute, id or class name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CssName(String);

impl From<&str> for CssName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for CssName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ToCss for CssName {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        serialize_identifier(&self.0, dest)
    }
}

impl PrecomputedHash for CssName {
    fn precomputed_hash(&self) -> u32 {
        xxh3_64(self.0.as_bytes()) as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoClass {}

impl parser::NonTSPseudoClass for PseudoClass {
    type Impl = ArenaSelectors;

    fn is_active_or_hover(&self) -> bool {
        match *self {}
    }

    fn is_user_action_state(&self) -> bool {
        match *self {}
    }
}

impl ToCss for PseudoClass {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoElement {}

impl parser::PseudoElement for PseudoElement {
    type Impl = ArenaSelectors;
}

impl ToCss for PseudoElement {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

/// An element node seen through the arena.
#[derive(Clone, Copy)]
struct ArenaElement<'a> {
    arena: &'a Arena,
    node: usize,
}

impl fmt::Debug for ArenaElement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaElement")
            .field("node", &self.node)
            .field("tag", &self.arena.tag(self.node))
            .finish()
    }
}

impl<'a> ArenaElement<'a> {
    fn at(&self, node: usize) -> Self {
        Self {
            arena: self.arena,
            node,
        }
    }

    fn siblings(&self) -> &'a [usize] {
        let arena = self.arena;
        match arena.nodes[self.node].parent {
            Some(parent) => arena.nodes[parent].children.as_slice(),
            None => &[],
        }
    }

    fn first_element<'n>(&self, mut nodes: impl Iterator<Item = &'n usize>) -> Option<Self> {
        nodes
            .find(|&&n| self.arena.tag(n).is_some())
            .map(|&n| self.at(n))
    }
}

impl Element for ArenaElement<'_> {
    type Impl = ArenaSelectors;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(&self.arena.nodes[self.node])
    }

    fn parent_element(&self) -> Option<Self> {
        let parent = self.arena.nodes[self.node].parent?;
        self.arena.tag(parent).map(|_| self.at(parent))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let siblings = self.siblings();
        let index = siblings.iter().position(|&n| n == self.node)?;
        self.first_element(siblings[..index].iter().rev())
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let siblings = self.siblings();
        let index = siblings.iter().position(|&n| n == self.node)?;
        self.first_element(siblings[index + 1..].iter())
    }

    fn first_element_child(&self) -> Option<Self> {
        self.first_element(self.arena.nodes[self.node].children.iter())
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, local_name: &CssName) -> bool {
        self.arena.tag(self.node) == Some(local_name.0.as_str())
    }

    fn has_namespace(&self, ns: &CssName) -> bool {
        ns.0 == HTML_NAMESPACE
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.arena.tag(self.node) == other.arena.tag(other.node)
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&CssName>,
        local_name: &CssName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        if let NamespaceConstraint::Specific(url) = ns {
            if !url.0.is_empty() {
                return false;
            }
        }
        self.arena
            .attr(self.node, &local_name.0)
            .is_some_and(|value| operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        pc: &PseudoClass,
        _context: &mut MatchingContext<ArenaSelectors>,
    ) -> bool {
        match *pc {}
    }

    fn match_pseudo_element(
        &self,
        pe: &PseudoElement,
        _context: &mut MatchingContext<ArenaSelectors>,
    ) -> bool {
        match *pe {}
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        matches!(self.arena.tag(self.node), Some("a" | "area"))
            && self.arena.attr(self.node, "href").is_some()
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &CssName, case_sensitivity: CaseSensitivity) -> bool {
        self.arena
            .attr(self.node, "id")
            .is_some_and(|have| case_sensitivity.eq(id.0.as_bytes(), have.as_bytes()))
    }

    fn has_class(&self, name: &CssName, case_sensitivity: CaseSensitivity) -> bool {
        self.arena.attr(self.node, "class").is_some_and(|classes| {
            classes
                .split_whitespace()
                .any(|have| case_sensitivity.eq(name.0.as_bytes(), have.as_bytes()))
        })
    }

    fn has_custom_state(&self, _name: &CssName) -> bool {
        false
    }

    fn imported_part(&self, _name: &CssName) -> Option<CssName> {
        None
    }

    fn is_part(&self, _name: &CssName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        !self.arena.nodes[self.node]
            .children
            .iter()
            .any(|&child| match &self.arena.nodes[child].kind {
                Kind::Element { .. } => true,
                Kind::Text(text) | Kind::Raw(text) => !text.is_empty(),
            })
    }

    fn is_root(&self) -> bool {
        self.node == self.arena.root
    }

    fn add_element_unique_hashes(&self, _filter: &mut BloomFilter) -> bool {
        false
    }
}
