//! Location model
//!
//! Root-relative addresses in a tree, and the path codec used to
//! translate coordinates between the semantic and presentation trees.
//! Paths count only "real" structure: text nodes and real elements count
//! as one sibling each, phantom-wrap elements are transparent and
//! contribute their real descendants, and other decorative nodes are
//! skipped entirely.

use std::fmt;
use std::str::FromStr;

use crate::errors::LocationError;
use crate::models::{NodeId, NodeKind, Presence, Tree};

/// One parsed path: child ordinals among real nodes, with an optional
/// final attribute segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    segments: Vec<usize>,
    attribute: Option<String>,
}

impl Path {
    /// The empty path, denoting the root itself
    pub fn root() -> Self {
        Path {
            segments: Vec::new(),
            attribute: None,
        }
    }

    pub fn segments(&self) -> &[usize] {
        &self.segments
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty() && self.attribute.is_none()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for seg in &self.segments {
            if !first {
                write!(f, "/")?;
            }
            write!(f, "{}", seg)?;
            first = false;
        }
        if let Some(name) = &self.attribute {
            if !first {
                write!(f, "/")?;
            }
            write!(f, "@{}", name)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Path::root());
        }
        let mut segments = Vec::new();
        let mut attribute = None;
        let parts: Vec<&str> = s.split('/').collect();
        for (i, part) in parts.iter().enumerate() {
            if let Some(name) = part.strip_prefix('@') {
                if name.is_empty() || i != parts.len() - 1 {
                    return Err(LocationError::MalformedPath(s.to_string()));
                }
                attribute = Some(name.to_string());
            } else if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
                segments.push(part.parse().map_err(|_| {
                    LocationError::MalformedPath(s.to_string())
                })?);
            } else {
                return Err(LocationError::MalformedPath(s.to_string()));
            }
        }
        Ok(Path {
            segments,
            attribute,
        })
    }
}

/// What a path resolves to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathTarget {
    Node(NodeId),
    /// The named attribute of an element
    Attribute(NodeId, String),
}

/// An immutable (root, node, offset) address.
///
/// With `attribute` set, the location is a point inside that
/// attribute's value on `node`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub root: NodeId,
    pub node: NodeId,
    pub attribute: Option<String>,
    pub offset: usize,
}

impl Location {
    /// Make a new location in the same tree as this one, keeping the
    /// root. Convenience mirroring `make_location`.
    pub fn make(&self, tree: &Tree, node: NodeId, offset: usize) -> Result<Location, LocationError> {
        make_location(tree, self.root, node, offset)
    }

    /// The (node, offset) pair, for callers that work without a root
    pub fn to_pair(&self) -> (NodeId, usize) {
        (self.node, self.offset)
    }

    /// A location may transiently carry an out-of-range offset; it is
    /// valid once the offset fits the node (or attribute value) length.
    pub fn is_valid(&self, tree: &Tree) -> bool {
        self.offset <= self.target_len(tree)
    }

    /// Copy with the offset clamped into range
    pub fn normalized(&self, tree: &Tree) -> Location {
        let len = self.target_len(tree);
        Location {
            offset: self.offset.min(len),
            ..self.clone()
        }
    }

    fn target_len(&self, tree: &Tree) -> usize {
        match &self.attribute {
            Some(name) => qualified_attribute(tree, self.node, name)
                .map(|v| v.chars().count())
                .unwrap_or(0),
            None => tree.node_len(self.node),
        }
    }
}

/// Makes a location. The root must have been marked on the tree and
/// `node` must live under it.
pub fn make_location(
    tree: &Tree,
    root: NodeId,
    node: NodeId,
    offset: usize,
) -> Result<Location, LocationError> {
    if !tree.is_marked_root(root) {
        return Err(LocationError::InvalidLocation(
            "root has not been marked as a root".to_string(),
        ));
    }
    if !tree.is_ancestor_or_self(root, node) {
        return Err(LocationError::InvalidLocation(
            "node not in root".to_string(),
        ));
    }
    Ok(Location {
        root,
        node,
        attribute: None,
        offset,
    })
}

/// Makes a location inside an attribute's value
pub fn make_attribute_location(
    tree: &Tree,
    root: NodeId,
    node: NodeId,
    name: &str,
    offset: usize,
) -> Result<Location, LocationError> {
    let mut loc = make_location(tree, root, node, offset)?;
    if qualified_attribute(tree, node, name).is_none() {
        return Err(LocationError::AttributeNotFound(name.to_string()));
    }
    loc.attribute = Some(name.to_string());
    Ok(loc)
}

/// How many real siblings a node stands for in path ordinals
pub fn real_weight(tree: &Tree, node: NodeId) -> usize {
    match tree.presence(node) {
        Presence::Real => 1,
        Presence::PhantomWrap => tree
            .children(node)
            .iter()
            .map(|&c| real_weight(tree, c))
            .sum(),
        Presence::Phantom | Presence::Placeholder => 0,
    }
}

/// Sum of real weights of the children preceding `node` under `parent`
fn count_before(tree: &Tree, parent: NodeId, node: NodeId) -> usize {
    tree.children(parent)
        .iter()
        .take_while(|&&c| c != node)
        .map(|&c| real_weight(tree, c))
        .sum()
}

fn check_addressable(tree: &Tree, root: NodeId, node: NodeId) -> Result<(), LocationError> {
    let mut cur = Some(node);
    while let Some(id) = cur {
        match tree.presence(id) {
            Presence::Placeholder => return Err(LocationError::PlaceholderNode),
            Presence::Phantom => {
                return Err(LocationError::InvalidLocation(
                    "phantom nodes have no path".to_string(),
                ))
            }
            // wrappers are transparent for their descendants, but have
            // no ordinal of their own
            Presence::PhantomWrap if id == node => {
                return Err(LocationError::InvalidLocation(
                    "phantom wrappers have no path".to_string(),
                ))
            }
            _ => {}
        }
        if id == root {
            return Ok(());
        }
        cur = tree.parent(id);
    }
    Err(LocationError::DetachedNode)
}

/// Computes the path of `node` relative to `root`.
///
/// Round-trip law: for any addressable node under a marked root,
/// `path_to_node(node_to_path(node))` finds the same node again.
pub fn node_to_path(tree: &Tree, root: NodeId, node: NodeId) -> Result<Path, LocationError> {
    check_addressable(tree, root, node)?;
    if node == root {
        return Ok(Path::root());
    }

    let mut segments = Vec::new();
    let mut cur = node;
    while cur != root {
        let mut child = cur;
        let mut parent = tree.parent(child).ok_or(LocationError::DetachedNode)?;
        let mut ordinal = count_before(tree, parent, child);
        // a wrapper's children share ordinal space with its siblings
        while tree.presence(parent) == Presence::PhantomWrap {
            child = parent;
            parent = tree.parent(child).ok_or(LocationError::DetachedNode)?;
            ordinal += count_before(tree, parent, child);
        }
        segments.push(ordinal);
        cur = parent;
    }
    segments.reverse();
    Ok(Path {
        segments,
        attribute: None,
    })
}

/// Path of an element's attribute: the element's path plus `@name`
pub fn attribute_to_path(
    tree: &Tree,
    root: NodeId,
    node: NodeId,
    name: &str,
) -> Result<Path, LocationError> {
    if qualified_attribute(tree, node, name).is_none() {
        return Err(LocationError::AttributeNotFound(name.to_string()));
    }
    let mut path = node_to_path(tree, root, node)?;
    path.attribute = Some(name.to_string());
    Ok(path)
}

/// Finds the child of `parent` at real ordinal `index`, looking through
/// phantom wrappers.
fn resolve_child(tree: &Tree, parent: NodeId, index: usize) -> Option<NodeId> {
    let mut skipped = 0;
    for &child in tree.children(parent) {
        let w = real_weight(tree, child);
        if index < skipped + w {
            return if tree.presence(child) == Presence::PhantomWrap {
                resolve_child(tree, child, index - skipped)
            } else {
                Some(child)
            };
        }
        skipped += w;
    }
    None
}

/// Recovers the target of a path relative to `root`. Absence (no node
/// at that ordinal) is not an error; a malformed path or a missing
/// `@name` attribute is.
pub fn path_to_node(
    tree: &Tree,
    root: NodeId,
    path: &Path,
) -> Result<Option<PathTarget>, LocationError> {
    let mut cur = root;
    for &seg in &path.segments {
        match resolve_child(tree, cur, seg) {
            Some(child) => cur = child,
            None => return Ok(None),
        }
    }
    match path.attribute() {
        Some(name) => {
            if tree.kind(cur) != NodeKind::Element
                || qualified_attribute(tree, cur, name).is_none()
            {
                return Err(LocationError::AttributeNotFound(name.to_string()));
            }
            Ok(Some(PathTarget::Attribute(cur, name.to_string())))
        }
        None => Ok(Some(PathTarget::Node(cur))),
    }
}

/// Parses a path string and resolves it in one step
pub fn resolve_path_str(
    tree: &Tree,
    root: NodeId,
    path: &str,
) -> Result<Option<PathTarget>, LocationError> {
    let parsed: Path = path.parse()?;
    path_to_node(tree, root, &parsed)
}

/// Looks up an attribute by its path-qualified name (`name` or
/// `prefix:name`).
pub fn qualified_attribute<'t>(tree: &'t Tree, node: NodeId, name: &str) -> Option<&'t str> {
    match name.split_once(':') {
        Some((ns, local)) => tree.attribute(node, Some(ns), local),
        None => tree.attribute(node, None, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Presence;

    /// doc -> note -> "hi", with an id attribute on note
    fn semantic_tree() -> (Tree, NodeId, NodeId, NodeId) {
        let mut tree = Tree::new();
        let root = tree.new_element("doc");
        tree.mark_root(root);
        let note = tree.new_element("note");
        let text = tree.new_text("hi");
        tree.attach(root, 0, note);
        tree.attach(note, 0, text);
        tree.set_attribute_raw(note, None, "id", Some("n1"));
        (tree, root, note, text)
    }

    /// Presentation shape: doc -> [phantom label, wrap(note), phantom sep]
    fn presentation_tree() -> (Tree, NodeId, NodeId, NodeId) {
        let mut tree = Tree::new();
        let root = tree.new_element("doc");
        tree.mark_root(root);
        let label = tree.new_element("label");
        tree.set_presence(label, Presence::Phantom);
        let wrap = tree.new_element("wrap");
        tree.set_presence(wrap, Presence::PhantomWrap);
        let note = tree.new_element("note");
        let text = tree.new_text("hi");
        let sep = tree.new_element("sep");
        tree.set_presence(sep, Presence::Phantom);
        tree.attach(root, 0, label);
        tree.attach(root, 1, wrap);
        tree.attach(root, 2, sep);
        tree.attach(wrap, 0, note);
        tree.attach(note, 0, text);
        (tree, root, note, text)
    }

    #[test]
    fn test_path_parse_and_display() {
        let p: Path = "0/2/@type".parse().unwrap();
        assert_eq!(p.segments(), &[0, 2]);
        assert_eq!(p.attribute(), Some("type"));
        assert_eq!(p.to_string(), "0/2/@type");

        let root: Path = "".parse().unwrap();
        assert!(root.is_root());
        assert_eq!(root.to_string(), "");
    }

    #[test]
    fn test_path_parse_rejects_garbage() {
        for bad in ["x", "0//1", "0/-1", "@", "0/@/1", "@a/0"] {
            assert!(matches!(
                bad.parse::<Path>(),
                Err(LocationError::MalformedPath(_))
            ));
        }
    }

    #[test]
    fn test_round_trip_semantic() {
        let (tree, root, note, text) = semantic_tree();
        for node in [root, note, text] {
            let path = node_to_path(&tree, root, node).unwrap();
            assert_eq!(
                path_to_node(&tree, root, &path).unwrap(),
                Some(PathTarget::Node(node))
            );
        }
        assert_eq!(node_to_path(&tree, root, text).unwrap().to_string(), "0/0");
    }

    #[test]
    fn test_phantoms_are_skipped_in_counting() {
        let (tree, root, note, text) = presentation_tree();
        // the phantom label and the transparent wrapper do not count
        assert_eq!(node_to_path(&tree, root, note).unwrap().to_string(), "0");
        assert_eq!(node_to_path(&tree, root, text).unwrap().to_string(), "0/0");
        assert_eq!(
            path_to_node(&tree, root, &"0".parse().unwrap()).unwrap(),
            Some(PathTarget::Node(note))
        );
    }

    #[test]
    fn test_phantom_and_placeholder_not_addressable() {
        let (mut tree, root, note, _) = presentation_tree();
        let ph = tree.new_text(" ");
        tree.set_presence(ph, Presence::Placeholder);
        tree.attach(note, 1, ph);
        assert_eq!(
            node_to_path(&tree, root, ph),
            Err(LocationError::PlaceholderNode)
        );

        let label = tree.children(root)[0];
        assert!(matches!(
            node_to_path(&tree, root, label),
            Err(LocationError::InvalidLocation(_))
        ));
    }

    #[test]
    fn test_detached_node_has_no_path() {
        let (mut tree, root, _, _) = semantic_tree();
        let stray = tree.new_element("stray");
        assert_eq!(
            node_to_path(&tree, root, stray),
            Err(LocationError::DetachedNode)
        );
    }

    #[test]
    fn test_attribute_paths() {
        let (tree, root, note, _) = semantic_tree();
        let path = attribute_to_path(&tree, root, note, "id").unwrap();
        assert_eq!(path.to_string(), "0/@id");
        assert_eq!(
            path_to_node(&tree, root, &path).unwrap(),
            Some(PathTarget::Attribute(note, "id".to_string()))
        );
        assert_eq!(
            attribute_to_path(&tree, root, note, "missing"),
            Err(LocationError::AttributeNotFound("missing".to_string()))
        );
        assert_eq!(
            path_to_node(&tree, root, &"0/@missing".parse().unwrap()),
            Err(LocationError::AttributeNotFound("missing".to_string()))
        );
    }

    #[test]
    fn test_absent_target_is_none_not_error() {
        let (tree, root, _, _) = semantic_tree();
        assert_eq!(path_to_node(&tree, root, &"7".parse().unwrap()).unwrap(), None);
    }

    #[test]
    fn test_make_location_checks() {
        let (mut tree, root, note, text) = semantic_tree();
        let loc = make_location(&tree, root, text, 2).unwrap();
        assert!(loc.is_valid(&tree));
        assert_eq!(loc, make_location(&tree, root, text, 2).unwrap());

        // out-of-range offsets are transiently allowed, then normalized
        let wild = make_location(&tree, root, text, 99).unwrap();
        assert!(!wild.is_valid(&tree));
        assert_eq!(wild.normalized(&tree).offset, 2);

        let unmarked = tree.new_element("other");
        assert!(matches!(
            make_location(&tree, unmarked, note, 0),
            Err(LocationError::InvalidLocation(_))
        ));
        let stray = tree.new_element("stray");
        assert!(matches!(
            make_location(&tree, root, stray, 0),
            Err(LocationError::InvalidLocation(_))
        ));
    }

    #[test]
    fn test_attribute_location_length() {
        let (tree, root, note, _) = semantic_tree();
        let loc = make_attribute_location(&tree, root, note, "id", 1).unwrap();
        assert!(loc.is_valid(&tree));
        let over = Location {
            offset: 10,
            ..loc.clone()
        };
        assert_eq!(over.normalized(&tree).offset, 2); // "n1"
    }
}
