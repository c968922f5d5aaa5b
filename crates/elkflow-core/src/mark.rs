use crate::index::HierarchicalIndex;
use crate::model::{ElementKey, ElementTree, Endpoint};
use crate::registry::Registry;
use crate::Result;
use indexmap::IndexSet;
use std::cell::RefCell;
use std::rc::Rc;

/// A change tag set ("new", "layout", "node.properties.hidden", ...).
pub type Flow = IndexSet<String>;

#[derive(Debug, Default)]
struct MarkState {
    value: Option<Rc<ElementTree>>,
    flow: Flow,
    registry: Registry,
    index: Option<Rc<HierarchicalIndex>>,
}

/// Shared slot holding the current element tree, the set of flow tags describing what changed,
/// and the registry that names its id-less elements.
///
/// Clones are handles to the same slot; pipes are wired together by sharing marks.
#[derive(Debug, Clone, Default)]
pub struct Mark {
    state: Rc<RefCell<MarkState>>,
}

impl Mark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(tree: ElementTree, flow: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mark = Self::new();
        mark.set_value(Some(Rc::new(tree)));
        mark.set_flow(flow);
        mark
    }

    pub fn ptr_eq(&self, other: &Mark) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    pub fn value(&self) -> Option<Rc<ElementTree>> {
        self.state.borrow().value.clone()
    }

    /// Replaces the value and drops the cached index.
    pub fn set_value(&self, value: Option<Rc<ElementTree>>) {
        let mut state = self.state.borrow_mut();
        state.value = value;
        state.index = None;
    }

    pub fn flow(&self) -> Flow {
        self.state.borrow().flow.clone()
    }

    pub fn set_flow(&self, flow: impl IntoIterator<Item = impl Into<String>>) {
        self.state.borrow_mut().flow = flow.into_iter().map(Into::into).collect();
    }

    pub fn extend_flow(&self, tags: impl IntoIterator<Item = impl Into<String>>) {
        self.state
            .borrow_mut()
            .flow
            .extend(tags.into_iter().map(Into::into));
    }

    pub fn registry(&self) -> Registry {
        self.state.borrow().registry.clone()
    }

    pub fn set_registry(&self, registry: Registry) {
        let mut state = self.state.borrow_mut();
        state.registry = registry;
        state.index = None;
    }

    /// Runs `f` with this mark's registry as the current context.
    pub fn in_context<R>(&self, f: impl FnOnce() -> R) -> R {
        self.registry().scope(f)
    }

    /// The index over the current value's root, built on first use.
    pub fn index(&self) -> Result<Option<Rc<HierarchicalIndex>>> {
        if let Some(index) = self.state.borrow().index.clone() {
            return Ok(Some(index));
        }
        let Some(tree) = self.value() else {
            return Ok(None);
        };
        let index = self.in_context(|| {
            let root = tree.root()?;
            HierarchicalIndex::build(&tree, root)
        })?;
        let index = Rc::new(index);
        self.state.borrow_mut().index = Some(index.clone());
        Ok(Some(index))
    }

    /// The id of `key` in the current value.
    pub fn to_id(&self, key: impl Into<ElementKey>) -> Result<Option<String>> {
        let key = key.into();
        let Some(tree) = self.value() else {
            return Ok(None);
        };
        self.in_context(|| tree.id_of(key)).map(Some)
    }

    /// Resolves a node or port id in the current value.
    pub fn from_id(&self, id: &str) -> Result<Option<Endpoint>> {
        match self.index()? {
            Some(index) => index.get_endpoint(id).map(Some),
            None => Ok(None),
        }
    }
}
