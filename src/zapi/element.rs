//! Generic tagged tree used for controller requests and responses
//!
//! Accessors return `Option` for absent children so decoders can treat a
//! missing optional node as "no data". [`Element::require`] is the only
//! accessor that fails, for nodes a decoder cannot do without.

use crate::error::{Error, Result};

/// One node of a request or response tree
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    content: Option<String>,
    children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Leaf element holding text content
    pub fn leaf(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    // -------------------------------------------------------------------------
    // Builders
    // -------------------------------------------------------------------------

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_child_content(self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.with_child(Element::leaf(name, content))
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = Some(content.into());
    }

    pub fn add_child(&mut self, child: Element) {
        self.children.push(child);
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First child named `name`
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children named `name`
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text content of the first child named `name`
    pub fn child_content(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(Element::content)
    }

    /// Walk a chain of first-children, `None` as soon as a link is absent
    pub fn path(&self, names: &[&str]) -> Option<&Element> {
        names
            .iter()
            .try_fold(self, |node, name| node.child(name))
    }

    /// Like [`Element::child`] but a missing node is a decode failure
    pub fn require(&self, name: &str, operation: &str) -> Result<&Element> {
        self.child(name).ok_or_else(|| {
            Error::malformed(
                operation,
                format!("required element <{}> missing under <{}>", name, self.name),
            )
        })
    }

    /// Text content of a required child
    pub fn require_content(&self, name: &str, operation: &str) -> Result<&str> {
        self.require(name, operation)?
            .content()
            .ok_or_else(|| Error::malformed(operation, format!("element <{}> is empty", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn vserver_tree() -> Element {
        Element::new("results")
            .with_attr("status", "passed")
            .with_child(
                Element::new("attributes").with_child(
                    Element::new("vserver-info")
                        .with_child_content("vserver-name", "vs0")
                        .with_child(
                            Element::new("vserver-aggr-info-list")
                                .with_child(
                                    Element::new("vserver-aggr-info")
                                        .with_child_content("aggr-name", "aggr1"),
                                )
                                .with_child(
                                    Element::new("vserver-aggr-info")
                                        .with_child_content("aggr-name", "aggr2"),
                                ),
                        ),
                ),
            )
    }

    #[test]
    fn test_path_and_children() {
        let tree = vserver_tree();
        let list = tree
            .path(&["attributes", "vserver-info", "vserver-aggr-info-list"])
            .unwrap();
        let names: Vec<_> = list
            .children_named("vserver-aggr-info")
            .filter_map(|a| a.child_content("aggr-name"))
            .collect();
        assert_eq!(names, vec!["aggr1", "aggr2"]);
        assert_eq!(tree.attr("status"), Some("passed"));
    }

    #[test]
    fn test_absent_nodes_are_none() {
        let tree = vserver_tree();
        assert!(tree.path(&["attributes", "missing", "deeper"]).is_none());
        assert!(tree.child_content("nothing").is_none());
        assert!(tree.attr("reason").is_none());
        assert_eq!(tree.path(&[]), Some(&tree));
    }

    #[test]
    fn test_require_reports_missing_node() {
        let tree = vserver_tree();
        assert!(tree.require("attributes", "vserver-get").is_ok());
        assert_matches!(
            tree.require("records", "vserver-get"),
            Err(Error::MalformedResponse { operation, .. }) if operation == "vserver-get"
        );
        let info = tree.path(&["attributes", "vserver-info"]).unwrap();
        assert_eq!(info.require_content("vserver-name", "op").unwrap(), "vs0");
        assert!(info.require_content("vserver-aggr-info-list", "op").is_err());
    }

    #[test]
    fn test_set_attr_overwrites() {
        let mut elem = Element::new("netapp").with_attr("version", "1.15");
        elem.set_attr("version", "1.21");
        assert_eq!(elem.attrs().len(), 1);
        assert_eq!(elem.attr("version"), Some("1.21"));
    }
}
