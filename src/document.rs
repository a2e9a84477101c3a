use crate::{ControlKind, NodeId, Result};

/// Tree-structured configuration document with path lookups.
///
/// Errors from these methods (a malformed path, a stale node id) are passed
/// through unchanged by the synchronization routines.
pub trait XmlTree {
    /// First node matched by `path` relative to `context`.
    fn select_single_node(&self, context: NodeId, path: &str) -> Result<Option<NodeId>>;

    /// Child elements of `context` with the given local name, in order.
    fn select_nodes(&self, context: NodeId, name: &str) -> Result<Vec<NodeId>>;

    fn text(&self, node: NodeId) -> Result<String>;

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<()>;

    /// Creates a `name` element and appends it as the last child of `parent`.
    fn append_element(&mut self, parent: NodeId, name: &str) -> Result<NodeId>;

    /// Get-or-insert of a direct child element.
    fn ensure_child(&mut self, parent: NodeId, name: &str) -> Result<NodeId>;

    /// Like [`XmlTree::ensure_child`] for every step of `path`.
    fn ensure_path(&mut self, context: NodeId, path: &str) -> Result<NodeId>;
}

/// Document of form controls addressed by element id.
pub trait ControlDocument {
    fn control_by_id(&self, id: &str) -> Option<NodeId>;

    fn tag_name(&self, control: NodeId) -> Result<&str>;

    /// The `type` attribute, for elements that carry one.
    fn input_type(&self, control: NodeId) -> Result<Option<&str>>;

    /// Current value, or `None` when the element has no value at all.
    fn value(&self, control: NodeId) -> Result<Option<String>>;

    fn set_value(&mut self, control: NodeId, value: &str) -> Result<()>;

    fn checked(&self, control: NodeId) -> Result<bool>;

    fn set_checked(&mut self, control: NodeId, checked: bool) -> Result<()>;

    fn control_kind(&self, control: NodeId) -> Result<ControlKind> {
        Ok(ControlKind::resolve(
            self.tag_name(control)?,
            self.input_type(control)?,
        ))
    }

    /// Kind-dispatched read, see [`ControlKind::read`].
    fn read_control_value(&self, control: NodeId) -> Result<Option<String>> {
        self.control_kind(control)?.read(self, control)
    }

    /// Kind-dispatched write, see [`ControlKind::write`].
    fn write_control_value(&mut self, control: NodeId, value: &str) -> Result<()> {
        self.control_kind(control)?.write(self, control, value)
    }
}
