//! Page snapshots and the index system.
//!
//! A snapshot flattens the interactive elements of one page into a list in
//! document order. Position in that list is the element's index, which is how
//! every action addresses an element during one decision cycle.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;
use webcell_core::{Error, Result};

use super::driver::{NodeId, PageDriver, RawElement};

/// Axis-aligned rectangle in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Build from a CDP quad `[x1,y1, x2,y2, x3,y3, x4,y4]`.
    pub fn from_quad(quad: &[f64]) -> Option<Self> {
        if quad.len() < 8 {
            return None;
        }
        let xs = [quad[0], quad[2], quad[4], quad[6]];
        let ys = [quad[1], quad[3], quad[5], quad[7]];
        let min_x = xs.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_x = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min_y = ys.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_y = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// One interactive element of a snapshot. Shared behind `Arc` and never
/// mutated after the snapshot is built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementNode {
    pub tag: String,
    pub role: String,
    pub name: String,
    pub bounding_box: BoundingBox,
    pub attributes: HashMap<String, String>,
}

impl ElementNode {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    /// Checkboxes and radios are checked rather than clicked.
    pub fn is_toggle(&self) -> bool {
        matches!(self.attribute("type"), Some("checkbox") | Some("radio"))
    }
}

/// Roles an element may carry to be addressable.
pub const INTERACTIVE_ROLES: &[&str] = &[
    "button", "link", "textbox", "checkbox", "radio", "combobox",
    "listbox", "tab", "menuitem", "file-upload",
];

/// Map a backend role onto one of [`INTERACTIVE_ROLES`], or `None` if the
/// element is not addressable.
pub fn canonical_role(raw_role: &str, tag: &str, attributes: &HashMap<String, String>) -> Option<&'static str> {
    let tag = tag.to_ascii_lowercase();
    let input_type = attributes
        .get("type")
        .map(|t| t.to_ascii_lowercase())
        .unwrap_or_default();

    if tag == "input" && input_type == "file" {
        return Some("file-upload");
    }

    let role = match raw_role.to_ascii_lowercase().as_str() {
        "button" | "popupbutton" => "button",
        "link" => "link",
        "textbox" | "searchbox" | "textfield" | "textfieldwithcombobox" => "textbox",
        "checkbox" | "switch" => "checkbox",
        "radio" => "radio",
        "combobox" | "menulistpopup" | "select" => "combobox",
        "listbox" => "listbox",
        "tab" => "tab",
        "menuitem" | "menuitemcheckbox" | "menuitemradio" => "menuitem",
        _ => return None,
    };
    Some(role)
}

/// An element is addressable iff it is visible, has a non-empty box, and
/// carries an interactive role.
pub fn to_element_node(raw: &RawElement) -> Option<ElementNode> {
    if !raw.visible {
        return None;
    }
    let bounding_box = raw.bounding_box.filter(|b| !b.is_empty())?;
    let role = canonical_role(&raw.role, &raw.tag, &raw.attributes)?;
    Some(ElementNode {
        tag: raw.tag.to_ascii_lowercase(),
        role: role.to_string(),
        name: raw.name.trim().to_string(),
        bounding_box,
        attributes: raw.attributes.clone(),
    })
}

/// The addressable state of one page at one instant.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    page_id: String,
    nodes: Vec<Arc<ElementNode>>,
    selector_map: BTreeMap<usize, Arc<ElementNode>>,
    handles: Vec<NodeId>,
}

impl PageSnapshot {
    /// Assign indices `0..N` to the addressable elements, in the given order.
    pub fn from_elements(page_id: &str, raw: &[RawElement]) -> Self {
        let mut nodes = Vec::new();
        let mut handles = Vec::new();
        for element in raw {
            if let Some(node) = to_element_node(element) {
                nodes.push(Arc::new(node));
                handles.push(element.node_id);
            }
        }
        let selector_map = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (i, Arc::clone(node)))
            .collect();
        Self {
            page_id: page_id.to_string(),
            nodes,
            selector_map,
            handles,
        }
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    pub fn nodes(&self) -> &[Arc<ElementNode>] {
        &self.nodes
    }

    pub fn selector_map(&self) -> &BTreeMap<usize, Arc<ElementNode>> {
        &self.selector_map
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<ElementNode>> {
        self.selector_map.get(&index)
    }

    pub(crate) fn handle(&self, index: usize) -> Option<NodeId> {
        self.handles.get(index).copied()
    }

    /// One line per element, the observation text handed to the decision
    /// process.
    pub fn elements_to_string(&self) -> String {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| {
                let mut attrs: Vec<(&String, &String)> = node.attributes.iter().collect();
                attrs.sort();
                let attrs = attrs
                    .iter()
                    .map(|(k, v)| format!("'{}': '{}'", k, v))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "{} - Tag: {} Role: {} Name: {} attributes: {{{}}}",
                    index, node.tag, node.role, node.name, attrs
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Snapshot a live page. Fails with [`Error::Snapshot`] when the page is still
/// loading or the backend cannot enumerate its elements. No retry.
pub async fn build_snapshot(page: &dyn PageDriver) -> Result<PageSnapshot> {
    let state = page
        .ready_state()
        .await
        .map_err(|e| Error::Snapshot(format!("could not read page state: {}", e)))?;
    if !state.is_ready() {
        return Err(Error::Snapshot(format!(
            "page {} is not ready (state: {:?})",
            page.id(),
            state
        )));
    }

    let raw = page
        .elements()
        .await
        .map_err(|e| Error::Snapshot(format!("could not enumerate elements: {}", e)))?;

    let snapshot = PageSnapshot::from_elements(page.id(), &raw);
    debug!(page = page.id(), candidates = raw.len(), indexed = snapshot.len(), "Snapshot built");
    Ok(snapshot)
}

// ─── Accessibility tree parsing (CDP) ─────────────────────────────────

/// A node of `Accessibility.getFullAXTree`, flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct AxCandidate {
    pub backend_node_id: i64,
    pub role: String,
    pub name: String,
}

/// Flatten the CDP accessibility tree in pre-order (document order), keeping
/// non-ignored nodes that are backed by a DOM node.
pub fn parse_ax_candidates(cdp_response: &Value) -> Vec<AxCandidate> {
    let nodes = match cdp_response.get("nodes").and_then(|v| v.as_array()) {
        Some(arr) if !arr.is_empty() => arr,
        _ => return Vec::new(),
    };

    let mut node_map: HashMap<&str, &Value> = HashMap::new();
    for node in nodes {
        if let Some(id) = node.get("nodeId").and_then(|v| v.as_str()) {
            node_map.insert(id, node);
        }
    }

    let mut out = Vec::new();
    let root_id = nodes[0].get("nodeId").and_then(|v| v.as_str()).unwrap_or("");
    // Iterative pre-order walk; deep pages overflow a recursive one.
    let mut stack = vec![root_id];
    while let Some(id) = stack.pop() {
        let node = match node_map.remove(id) {
            Some(n) => n,
            None => continue,
        };

        let ignored = node.get("ignored").and_then(|v| v.as_bool()).unwrap_or(false);
        if !ignored {
            if let Some(backend_node_id) = node.get("backendDOMNodeId").and_then(|v| v.as_i64()) {
                out.push(AxCandidate {
                    backend_node_id,
                    role: get_ax_value(node, "role"),
                    name: get_ax_value(node, "name"),
                });
            }
        }

        if let Some(children) = node.get("childIds").and_then(|v| v.as_array()) {
            for child in children.iter().rev().filter_map(|c| c.as_str()) {
                stack.push(child);
            }
        }
    }
    out
}

fn get_ax_value(node: &Value, field: &str) -> String {
    node.get(field)
        .and_then(|v| {
            // CDP returns {type: "...", value: "..."} for role/name
            v.get("value")
                .and_then(|val| val.as_str())
                .or_else(|| v.as_str())
        })
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(node_id: NodeId, tag: &str, role: &str, name: &str) -> RawElement {
        RawElement {
            node_id,
            tag: tag.to_string(),
            role: role.to_string(),
            name: name.to_string(),
            bounding_box: Some(BoundingBox::new(0.0, 10.0 * node_id as f64, 80.0, 20.0)),
            attributes: HashMap::new(),
            visible: true,
        }
    }

    #[test]
    fn test_selector_map_is_dense_and_shares_nodes() {
        let elements = vec![
            raw(1, "a", "link", "Home"),
            raw(2, "div", "generic", "wrapper"),
            raw(3, "button", "button", "Search"),
            raw(4, "input", "textbox", "Query"),
        ];
        let snap = PageSnapshot::from_elements("page-1", &elements);

        assert_eq!(snap.len(), 3);
        let keys: Vec<usize> = snap.selector_map().keys().copied().collect();
        assert_eq!(keys, vec![0, 1, 2]);
        for (i, node) in snap.nodes().iter().enumerate() {
            assert!(Arc::ptr_eq(node, &snap.selector_map()[&i]));
        }
        assert_eq!(snap.handle(1), Some(3));
    }

    #[test]
    fn test_three_elements_in_document_order() {
        let elements = vec![
            raw(10, "button", "button", "First"),
            raw(11, "a", "link", "Second"),
            raw(12, "input", "checkbox", "Third"),
        ];
        let snap = PageSnapshot::from_elements("p", &elements);
        assert_eq!(snap.len(), 3);
        assert_eq!(snap.get(0).unwrap().name, "First");
        assert_eq!(snap.get(1).unwrap().name, "Second");
        assert_eq!(snap.get(2).unwrap().name, "Third");
        assert!(snap.get(3).is_none());
    }

    #[test]
    fn test_hidden_and_zero_area_elements_excluded() {
        let mut hidden = raw(1, "button", "button", "Hidden");
        hidden.visible = false;
        let mut flat = raw(2, "button", "button", "Flat");
        flat.bounding_box = Some(BoundingBox::new(0.0, 0.0, 100.0, 0.0));
        let mut unboxed = raw(3, "button", "button", "No box");
        unboxed.bounding_box = None;
        let shown = raw(4, "button", "button", "Shown");

        let snap = PageSnapshot::from_elements("p", &[hidden, flat, unboxed, shown]);
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.get(0).unwrap().name, "Shown");
    }

    #[test]
    fn test_canonical_role() {
        let none = HashMap::new();
        assert_eq!(canonical_role("searchbox", "input", &none), Some("textbox"));
        assert_eq!(canonical_role("MenuItemCheckBox", "div", &none), Some("menuitem"));
        assert_eq!(canonical_role("heading", "h1", &none), None);
        assert_eq!(canonical_role("StaticText", "", &none), None);

        let file: HashMap<String, String> = [("type".to_string(), "file".to_string())].into();
        assert_eq!(canonical_role("button", "INPUT", &file), Some("file-upload"));
    }

    #[test]
    fn test_is_toggle() {
        let mut el = raw(1, "input", "checkbox", "Agree");
        el.attributes.insert("type".into(), "checkbox".into());
        let node = to_element_node(&el).unwrap();
        assert!(node.is_toggle());

        let node = to_element_node(&raw(2, "button", "button", "Go")).unwrap();
        assert!(!node.is_toggle());
    }

    #[test]
    fn test_elements_to_string() {
        let mut el = raw(1, "input", "textbox", "Email");
        el.attributes.insert("type".into(), "email".into());
        el.attributes.insert("name".into(), "email".into());
        let snap = PageSnapshot::from_elements("p", &[el]);
        assert_eq!(
            snap.elements_to_string(),
            "0 - Tag: input Role: textbox Name: Email attributes: {'name': 'email', 'type': 'email'}"
        );
    }

    #[test]
    fn test_bounding_box_from_quad() {
        let b = BoundingBox::from_quad(&[10.0, 20.0, 110.0, 20.0, 110.0, 60.0, 10.0, 60.0]).unwrap();
        assert_eq!(b, BoundingBox::new(10.0, 20.0, 100.0, 40.0));
        assert_eq!(b.center(), (60.0, 40.0));
        assert!(BoundingBox::from_quad(&[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_parse_ax_candidates_preorder_skips_ignored() {
        let tree = json!({
            "nodes": [
                {"nodeId": "1", "role": {"value": "RootWebArea"}, "name": {"value": "Doc"},
                 "backendDOMNodeId": 100, "childIds": ["2", "3"]},
                {"nodeId": "2", "role": {"value": "generic"}, "backendDOMNodeId": 101,
                 "childIds": ["4"]},
                {"nodeId": "3", "role": {"value": "button"}, "name": {"value": "Later"},
                 "backendDOMNodeId": 103},
                {"nodeId": "4", "role": {"value": "link"}, "name": {"value": "Earlier"},
                 "backendDOMNodeId": 104},
                {"nodeId": "5", "ignored": true, "role": {"value": "button"},
                 "backendDOMNodeId": 105}
            ]
        });
        let got = parse_ax_candidates(&tree);
        let ids: Vec<i64> = got.iter().map(|c| c.backend_node_id).collect();
        assert_eq!(ids, vec![100, 101, 104, 103]);
        assert_eq!(got[2].name, "Earlier");
        assert_eq!(got[3].role, "button");
    }

    #[test]
    fn test_parse_ax_candidates_empty() {
        assert!(parse_ax_candidates(&json!({})).is_empty());
        assert!(parse_ax_candidates(&json!({"nodes": []})).is_empty());
    }
}
