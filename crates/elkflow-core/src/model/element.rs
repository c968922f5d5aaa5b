use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ELK layout options (`org.eclipse.elk.*` keys to string values).
pub type LayoutOptions = IndexMap<String, String>;

/// Decorative shape reference carried in `properties.shape`.
///
/// Only `width`/`height` influence layout; the rest is passed through to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Properties {
    /// Whitespace separated class list.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub css_classes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Shape>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectable: Option<bool>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Properties {
    pub fn is_empty(&self) -> bool {
        self.css_classes.is_empty()
            && self.shape.is_none()
            && self.hidden.is_none()
            && self.selectable.is_none()
            && self.extra.is_empty()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden == Some(true)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.css_classes.split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Adds every whitespace separated class in `classes` that is not already present.
    pub fn add_class(&mut self, classes: &str) -> &mut Self {
        let mut current: Vec<String> = self.classes().map(str::to_string).collect();
        for class in classes.split_whitespace() {
            if !current.iter().any(|c| c == class) {
                current.push(class.to_string());
            }
        }
        self.css_classes = current.join(" ");
        self
    }

    pub fn remove_class(&mut self, classes: &str) -> &mut Self {
        let drop: Vec<&str> = classes.split_whitespace().collect();
        let kept: Vec<&str> = self.classes().filter(|c| !drop.contains(c)).collect();
        self.css_classes = kept.join(" ");
        self
    }

    /// Width and height of `shape`, when one is set.
    pub fn shape_size(&self) -> (Option<f64>, Option<f64>) {
        match &self.shape {
            Some(shape) => (shape.width, shape.height),
            None => (None, None),
        }
    }
}

/// Shared accessors over the element payloads stored in an [`ElementTree`](super::ElementTree).
pub trait ElementData {
    fn id(&self) -> Option<&str>;
    fn set_id(&mut self, id: Option<String>);
    fn properties(&self) -> &Properties;
    fn properties_mut(&mut self) -> &mut Properties;
    fn layout_options(&self) -> &LayoutOptions;
    fn layout_options_mut(&mut self) -> &mut LayoutOptions;

    fn is_hidden(&self) -> bool {
        self.properties().is_hidden()
    }

    fn add_class(&mut self, classes: &str) {
        self.properties_mut().add_class(classes);
    }

    fn remove_class(&mut self, classes: &str) {
        self.properties_mut().remove_class(classes);
    }
}

macro_rules! impl_element_data {
    ($ty:ty) => {
        impl ElementData for $ty {
            fn id(&self) -> Option<&str> {
                self.id.as_deref()
            }

            fn set_id(&mut self, id: Option<String>) {
                self.id = id;
            }

            fn properties(&self) -> &Properties {
                &self.properties
            }

            fn properties_mut(&mut self) -> &mut Properties {
                &mut self.properties
            }

            fn layout_options(&self) -> &LayoutOptions {
                &self.layout_options
            }

            fn layout_options_mut(&mut self) -> &mut LayoutOptions {
                &mut self.layout_options
            }
        }

        impl $ty {
            pub fn with_id(mut self, id: impl Into<String>) -> Self {
                self.id = Some(id.into());
                self
            }

            pub fn with_class(mut self, classes: &str) -> Self {
                self.properties.add_class(classes);
                self
            }

            pub fn with_layout_option(
                mut self,
                key: impl Into<String>,
                value: impl Into<String>,
            ) -> Self {
                self.layout_options.insert(key.into(), value.into());
                self
            }

            pub fn hidden(mut self, hidden: bool) -> Self {
                self.properties.hidden = Some(hidden);
                self
            }
        }
    };
}

macro_rules! impl_geometry {
    ($ty:ty) => {
        impl $ty {
            pub fn with_size(mut self, width: f64, height: f64) -> Self {
                self.width = Some(width);
                self.height = Some(height);
                self
            }

            pub fn with_position(mut self, x: f64, y: f64) -> Self {
                self.x = Some(x);
                self.y = Some(y);
                self
            }

            /// Explicit size, falling back to the size of `properties.shape`.
            pub fn effective_size(&self) -> (Option<f64>, Option<f64>) {
                let (sw, sh) = self.properties.shape_size();
                (self.width.or(sw), self.height.or(sh))
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub id: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub layout_options: LayoutOptions,
    pub properties: Properties,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Port {
    pub id: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub layout_options: LayoutOptions,
    pub properties: Properties,
}

impl Port {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Edge {
    pub id: Option<String>,
    pub layout_options: LayoutOptions,
    pub properties: Properties,
    /// Routing produced by the layout engine, kept verbatim.
    pub sections: Vec<Value>,
}

impl Edge {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub id: Option<String>,
    pub text: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub layout_options: LayoutOptions,
    pub properties: Properties,
}

impl Default for Label {
    fn default() -> Self {
        // An empty string excludes the label from node sizing, so the default is a single space.
        Self::new(" ")
    }
}

impl Label {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            x: None,
            y: None,
            width: None,
            height: None,
            layout_options: LayoutOptions::new(),
            properties: Properties::default(),
        }
    }
}

impl_element_data!(Node);
impl_element_data!(Port);
impl_element_data!(Edge);
impl_element_data!(Label);

impl_geometry!(Node);
impl_geometry!(Port);
impl_geometry!(Label);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_classes_behave_like_a_set() {
        let mut props = Properties::default();
        props.add_class("a b").add_class("b c");
        assert_eq!(props.css_classes, "a b c");
        props.remove_class("b");
        assert_eq!(props.css_classes, "a c");
        assert!(props.has_class("c"));
        assert!(!props.has_class("b"));
    }

    #[test]
    fn size_falls_back_to_shape() {
        let mut node = Node::new();
        node.properties.shape = Some(Shape {
            width: Some(30.0),
            height: Some(12.0),
            ..Shape::default()
        });
        assert_eq!(node.effective_size(), (Some(30.0), Some(12.0)));
        let node = node.with_size(5.0, 6.0);
        assert_eq!(node.effective_size(), (Some(5.0), Some(6.0)));
    }
}
