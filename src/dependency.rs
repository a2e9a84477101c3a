use crate::document::XmlTree;
use crate::{NodeId, Result};

pub const STARTUP_DEPENDENCY_ELEMENT: &str = "startupDependency";
pub const NAMESPACE_ELEMENT: &str = "namespace";

/// Adds `namespace` to the startup dependencies of `config` unless it is
/// already listed. Returns `true` when a node was appended.
///
/// Namespaces are compared byte for byte.
pub fn add_dependency<X>(xml: &mut X, config: NodeId, namespace: &str) -> Result<bool>
where
    X: XmlTree + ?Sized,
{
    let container = xml.ensure_child(config, STARTUP_DEPENDENCY_ELEMENT)?;
    for existing in xml.select_nodes(container, NAMESPACE_ELEMENT)? {
        if xml.text(existing)? == namespace {
            return Ok(false);
        }
    }

    let node = xml.append_element(container, NAMESPACE_ELEMENT)?;
    xml.set_text(node, namespace)?;
    Ok(true)
}

/// Namespaces listed under `config`, in document order.
pub fn startup_dependencies<X>(xml: &X, config: NodeId) -> Result<Vec<String>>
where
    X: XmlTree + ?Sized,
{
    let Some(container) = xml
        .select_nodes(config, STARTUP_DEPENDENCY_ELEMENT)?
        .into_iter()
        .next()
    else {
        return Ok(Vec::new());
    };
    xml.select_nodes(container, NAMESPACE_ELEMENT)?
        .into_iter()
        .map(|node| xml.text(node))
        .collect()
}
