use super::{ElementKey, ElementTree, NodeKey};

/// One step of [`ElementTree::iter_visible`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleEntry {
    pub key: ElementKey,
    /// The element or one of its containers is hidden.
    pub hidden: bool,
    /// The deepest visible element on the path from the walk's start to `key`.
    pub last_visible: Option<ElementKey>,
}

impl ElementTree {
    /// Depth-first walk: the node, its children (recursively), its ports, its edges, then the
    /// labels of every visited element right after that element's contents.
    pub fn iter_elements(&self, start: NodeKey) -> impl Iterator<Item = ElementKey> + use<> {
        let mut out = Vec::new();
        self.collect_elements(start.into(), &mut out);
        out.into_iter()
    }

    fn collect_elements(&self, key: ElementKey, out: &mut Vec<ElementKey>) {
        out.push(key);
        if let ElementKey::Node(node) = key {
            for child in self.children(node) {
                self.collect_elements((*child).into(), out);
            }
            for port in self.ports(node) {
                self.collect_elements((*port).into(), out);
            }
            for edge in self.edges(node) {
                self.collect_elements((*edge).into(), out);
            }
        }
        for label in self.labels(key) {
            self.collect_elements((*label).into(), out);
        }
    }

    /// Same order as [`iter_elements`](Self::iter_elements), tracking hidden state.
    ///
    /// The start node is always treated as visible.
    pub fn iter_visible(&self, start: NodeKey) -> impl Iterator<Item = VisibleEntry> + use<> {
        let mut out = Vec::new();
        self.collect_visible(start.into(), false, None, true, &mut out);
        out.into_iter()
    }

    fn collect_visible(
        &self,
        key: ElementKey,
        parent_hidden: bool,
        last_visible: Option<ElementKey>,
        is_start: bool,
        out: &mut Vec<VisibleEntry>,
    ) {
        let hidden = parent_hidden || (!is_start && self.data(key).is_hidden());
        let last_visible = if hidden { last_visible } else { Some(key) };
        out.push(VisibleEntry {
            key,
            hidden,
            last_visible,
        });
        if let ElementKey::Node(node) = key {
            for child in self.children(node) {
                self.collect_visible((*child).into(), hidden, last_visible, false, out);
            }
            for port in self.ports(node) {
                self.collect_visible((*port).into(), hidden, last_visible, false, out);
            }
            for edge in self.edges(node) {
                self.collect_visible((*edge).into(), hidden, last_visible, false, out);
            }
        }
        for label in self.labels(key) {
            self.collect_visible((*label).into(), hidden, last_visible, false, out);
        }
    }

    /// `(container, contained)` pairs in walk order.
    pub fn iter_hierarchy(&self, start: NodeKey) -> impl Iterator<Item = (ElementKey, ElementKey)> + use<> {
        let mut out = Vec::new();
        for key in self.iter_elements(start) {
            if let ElementKey::Node(node) = key {
                out.extend(self.children(node).iter().map(|c| (key, (*c).into())));
                out.extend(self.ports(node).iter().map(|p| (key, (*p).into())));
                out.extend(self.edges(node).iter().map(|e| (key, (*e).into())));
            }
            out.extend(self.labels(key).iter().map(|l| (key, (*l).into())));
        }
        out.into_iter()
    }
}
