//! Cleaning of submitted HTML before it is stored and sent for
//! translation.
//!
//! The input is parsed into a DOM, so markup tricks that fool pattern
//! matching (unclosed elements, odd casing, split attributes) are resolved
//! the way a browser would resolve them before anything is removed.

use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{parse_document, Attribute};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

const BLOCKED_ELEMENTS: [&str; 7] = [
    "script", "style", "iframe", "object", "embed", "frame", "frameset",
];
const URL_ATTRIBUTES: [&str; 4] = ["href", "src", "action", "formaction"];
const BLOCKED_SCHEMES: [&str; 2] = ["javascript:", "vbscript:"];

/// Removes active content from `raw` and normalises non-breaking spaces.
///
/// Returns `None` when nothing readable is left.
pub fn clean_text(raw: &str) -> Option<String> {
    let dom = parse(raw);
    let body = find_body(&dom.document)?;

    let mut visible = String::new();
    scrub(&body, &mut visible);
    if visible.trim().is_empty() {
        return None;
    }

    let mut buf = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..SerializeOpts::default()
    };
    serialize(&mut buf, &SerializableHandle::from(body), opts).ok()?;

    let html = String::from_utf8(buf).ok()?;
    Some(html.trim().to_string())
}

/// Readable text of `html` without markup or active content.
pub fn visible_text(html: &str) -> String {
    let dom = parse(html);
    let mut visible = String::new();
    if let Some(body) = find_body(&dom.document) {
        scrub(&body, &mut visible);
    }
    visible
}

fn parse(html: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(html)
}

fn element_name(node: &Handle) -> Option<&str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

fn child_element(parent: &Handle, name: &str) -> Option<Handle> {
    parent
        .children
        .borrow()
        .iter()
        .find(|child| element_name(child) == Some(name))
        .cloned()
}

fn find_body(document: &Handle) -> Option<Handle> {
    let html = child_element(document, "html")?;
    child_element(&html, "body")
}

fn is_blocked(node: &Handle) -> bool {
    element_name(node).is_some_and(|name| BLOCKED_ELEMENTS.contains(&name))
}

/// Drops blocked subtrees and unsafe attributes below `node`, rewrites
/// non-breaking spaces and appends the remaining text to `visible`.
fn scrub(node: &Handle, visible: &mut String) {
    node.children.borrow_mut().retain(|child| !is_blocked(child));

    for child in node.children.borrow().iter() {
        match &child.data {
            NodeData::Element { attrs, .. } => {
                scrub_attributes(&mut attrs.borrow_mut());
                scrub(child, visible);
            }
            NodeData::Text { contents } => {
                let mut contents = contents.borrow_mut();
                if contents.contains('\u{a0}') {
                    let replaced = contents.replace('\u{a0}', " ");
                    *contents = StrTendril::from_slice(&replaced);
                }
                visible.push_str(&contents);
            }
            _ => {}
        }
    }
}

fn scrub_attributes(attrs: &mut Vec<Attribute>) {
    attrs.retain(|attr| !attr.name.local.starts_with("on"));
    for attr in attrs.iter_mut() {
        if URL_ATTRIBUTES.contains(&&*attr.name.local) && has_blocked_scheme(&attr.value) {
            attr.value = StrTendril::from_slice("#");
        }
    }
}

/// Browsers ignore whitespace and control characters inside a scheme.
fn has_blocked_scheme(url: &str) -> bool {
    let compact: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    BLOCKED_SCHEMES.iter().any(|scheme| compact.starts_with(scheme))
}
