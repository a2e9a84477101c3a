use crate::document::XmlTree;
use crate::xml_path::{NameTest, XmlPath, apply_step, is_valid_name, local_part};
use crate::{Error, NodeId, Result, decode_character_references};

#[derive(Debug, Clone)]
enum XmlNodeType {
    Document,
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone)]
struct XmlElement {
    name: String,
    attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct XmlNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    node_type: XmlNodeType,
}

/// Arena-backed XML document with a single root element.
///
/// Detached and removed nodes stay in the arena; only nodes reachable from
/// the document node are serialized.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    nodes: Vec<XmlNode>,
    document: NodeId,
    root: NodeId,
}

impl XmlDocument {
    /// Creates a document holding only an empty `root_name` element.
    pub fn new(root_name: &str) -> Result<Self> {
        let mut doc = Self::empty();
        let root = doc.create_element(root_name)?;
        doc.attach(doc.document, root);
        doc.root = root;
        Ok(doc)
    }

    pub fn parse(src: &str) -> Result<Self> {
        let mut doc = Self::empty();
        let bytes = src.as_bytes();
        let mut stack = vec![doc.document];
        let mut root = None;
        let mut i = 0usize;

        while i < bytes.len() {
            if starts_with_at(bytes, i, b"<!--") {
                let end = find_subslice(bytes, i + 4, b"-->")
                    .ok_or_else(|| Error::XmlParse("unclosed comment".into()))?;
                i = end + 3;
                continue;
            }

            if starts_with_at(bytes, i, b"<![CDATA[") {
                let start = i + 9;
                let end = find_subslice(bytes, start, b"]]>")
                    .ok_or_else(|| Error::XmlParse("unclosed CDATA section".into()))?;
                let parent = open_element(&stack)
                    .ok_or_else(|| Error::XmlParse("CDATA outside the root element".into()))?;
                let text = src
                    .get(start..end)
                    .ok_or_else(|| Error::XmlParse("invalid CDATA section".into()))?;
                if !text.is_empty() {
                    doc.create_text(parent, text.to_string());
                }
                i = end + 3;
                continue;
            }

            if starts_with_at(bytes, i, b"<?") {
                let end = find_subslice(bytes, i + 2, b"?>")
                    .ok_or_else(|| Error::XmlParse("unclosed processing instruction".into()))?;
                i = end + 2;
                continue;
            }

            if starts_with_at(bytes, i, b"<!") {
                let end = find_subslice(bytes, i + 2, b">")
                    .ok_or_else(|| Error::XmlParse("unclosed declaration".into()))?;
                i = end + 1;
                continue;
            }

            if starts_with_at(bytes, i, b"</") {
                let (name, next) = parse_end_tag(src, i)?;
                let open = open_element(&stack)
                    .ok_or_else(|| Error::XmlParse(format!("unexpected end tag </{name}>")))?;
                let open_name = doc.name(open).unwrap_or_default();
                if open_name != name {
                    return Err(Error::XmlParse(format!(
                        "mismatched end tag: expected </{open_name}>, found </{name}>"
                    )));
                }
                doc.drop_layout_whitespace(open);
                stack.pop();
                i = next;
                continue;
            }

            if bytes[i] == b'<' {
                let (name, attrs, self_closing, next) = parse_start_tag(src, i)?;
                i = next;
                let parent = match open_element(&stack) {
                    Some(parent) => parent,
                    None if root.is_some() => {
                        return Err(Error::XmlParse(format!(
                            "second root element <{name}>"
                        )));
                    }
                    None => doc.document,
                };
                let node = doc.create_node(
                    Some(parent),
                    XmlNodeType::Element(XmlElement { name, attrs }),
                );
                if parent == doc.document {
                    root = Some(node);
                }
                if !self_closing {
                    stack.push(node);
                }
                continue;
            }

            let end = find_subslice(bytes, i, b"<").unwrap_or(bytes.len());
            let raw = src
                .get(i..end)
                .ok_or_else(|| Error::XmlParse("invalid character data".into()))?;
            match open_element(&stack) {
                Some(parent) => {
                    doc.create_text(parent, decode_character_references(raw));
                }
                None if raw.trim().is_empty() => {}
                None => {
                    return Err(Error::XmlParse("text outside the root element".into()));
                }
            }
            i = end;
        }

        if let Some(open) = open_element(&stack) {
            return Err(Error::XmlParse(format!(
                "unclosed element <{}>",
                doc.name(open).unwrap_or_default()
            )));
        }
        doc.root = root.ok_or_else(|| Error::XmlParse("missing root element".into()))?;
        Ok(doc)
    }

    fn empty() -> Self {
        let document = XmlNode {
            parent: None,
            children: Vec::new(),
            node_type: XmlNodeType::Document,
        };
        Self {
            nodes: vec![document],
            document: NodeId(0),
            root: NodeId(0),
        }
    }

    fn create_node(&mut self, parent: Option<NodeId>, node_type: XmlNodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(XmlNode {
            parent,
            children: Vec::new(),
            node_type,
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id.0].children.push(id);
        }
        id
    }

    fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.create_node(Some(parent), XmlNodeType::Text(text))
    }

    // Whitespace-only text is kept when it is the element's content and
    // dropped when it only separates child elements.
    fn drop_layout_whitespace(&mut self, element: NodeId) {
        if self.child_elements(element).is_empty() {
            return;
        }
        let nodes = &self.nodes;
        let layout = self.nodes[element.0]
            .children
            .iter()
            .copied()
            .filter(|child| {
                matches!(&nodes[child.0].node_type, XmlNodeType::Text(text) if text.trim().is_empty())
            })
            .collect::<Vec<_>>();
        for child in layout {
            self.detach(child);
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes[child.0].parent.take() {
            self.nodes[parent.0].children.retain(|id| *id != child);
        }
    }

    pub(crate) fn document_node(&self) -> NodeId {
        self.document
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, node: NodeId) -> Option<&XmlNode> {
        self.nodes.get(node.0)
    }

    fn element(&self, node: NodeId) -> Option<&XmlElement> {
        match &self.node(node)?.node_type {
            XmlNodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut XmlElement> {
        match &mut self.nodes.get_mut(node.0)?.node_type {
            XmlNodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    fn require_element(&self, node: NodeId) -> Result<&XmlElement> {
        self.element(node)
            .ok_or_else(|| Error::InvalidNode(format!("node {} is not an element", node.0)))
    }

    fn require_context(&self, node: NodeId) -> Result<()> {
        if node == self.document || self.element(node).is_some() {
            return Ok(());
        }
        Err(Error::InvalidNode(format!(
            "node {} cannot be used as a path context",
            node.0
        )))
    }

    pub fn name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|element| element.name.as_str())
    }

    pub fn local_name(&self, node: NodeId) -> Option<&str> {
        self.name(node).map(local_part)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    pub fn child_elements(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .filter(|child| self.element(*child).is_some())
            .collect()
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?
            .attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) -> Result<()> {
        if !is_valid_name(name)? {
            return Err(Error::InvalidName(name.to_string()));
        }
        let element = self
            .element_mut(node)
            .ok_or_else(|| Error::InvalidNode(format!("node {} is not an element", node.0)))?;
        match element.attrs.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => element.attrs.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text(&self, node: NodeId) -> Result<String> {
        let node_ref = self
            .node(node)
            .ok_or_else(|| Error::InvalidNode(format!("node {} does not exist", node.0)))?;
        let mut out = String::new();
        match &node_ref.node_type {
            XmlNodeType::Text(text) => out.push_str(text),
            _ => self.collect_text(node, &mut out),
        }
        Ok(out)
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        stacker::maybe_grow(64 * 1024, 2 * 1024 * 1024, || {
            for child in self.children(node) {
                match &self.nodes[child.0].node_type {
                    XmlNodeType::Text(text) => out.push_str(text),
                    XmlNodeType::Element(_) => self.collect_text(*child, out),
                    XmlNodeType::Document => {}
                }
            }
        })
    }

    /// Replaces every child of `node` with a single text node.
    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<()> {
        self.require_element(node)?;
        let unchanged = match self.nodes[node.0].children.as_slice() {
            [] => text.is_empty(),
            [only] => matches!(&self.nodes[only.0].node_type, XmlNodeType::Text(existing) if existing == text),
            _ => false,
        };
        if unchanged {
            return Ok(());
        }

        for child in std::mem::take(&mut self.nodes[node.0].children) {
            self.nodes[child.0].parent = None;
        }
        if !text.is_empty() {
            self.create_text(node, text.to_string());
        }
        Ok(())
    }

    /// Creates a detached element; attach it with [`XmlDocument::append_child`].
    pub fn create_element(&mut self, name: &str) -> Result<NodeId> {
        if !is_valid_name(name)? {
            return Err(Error::InvalidName(name.to_string()));
        }
        Ok(self.create_node(
            None,
            XmlNodeType::Element(XmlElement {
                name: name.to_string(),
                attrs: Vec::new(),
            }),
        ))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.require_element(parent)?;
        if self.node(child).is_none() {
            return Err(Error::InvalidNode(format!("node {} does not exist", child.0)));
        }
        if child == self.root {
            return Err(Error::InvalidNode("the root element cannot be moved".into()));
        }
        if child == self.document {
            return Err(Error::InvalidNode("the document node cannot be moved".into()));
        }
        if child == parent || self.is_descendant_of(parent, child) {
            return Err(Error::InvalidNode(format!(
                "node {} cannot be appended to its own descendant",
                child.0
            )));
        }
        self.detach(child);
        self.attach(parent, child);
        Ok(())
    }

    pub fn append_element(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        self.require_element(parent)?;
        let child = self.create_element(name)?;
        self.attach(parent, child);
        Ok(child)
    }

    fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = self.parent(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Returns the first child element matching `name`, appending one when
    /// there is none.
    pub fn ensure_child(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        if !is_valid_name(name)? {
            return Err(Error::InvalidName(name.to_string()));
        }
        self.require_context(parent)?;
        let test = NameTest::Name(name.to_string());
        let existing = self
            .child_elements(parent)
            .into_iter()
            .find(|child| self.name(*child).is_some_and(|child_name| test.matches(child_name)));
        match existing {
            Some(found) => Ok(found),
            None if parent == self.document => Err(Error::PathNotCreatable(format!(
                "document already has root <{}>",
                self.name(self.root).unwrap_or_default()
            ))),
            None => self.append_element(parent, name),
        }
    }

    /// Resolves `path` from `context`, creating every missing plain-name
    /// step along the way.
    pub fn ensure_path(&mut self, context: NodeId, path: &str) -> Result<NodeId> {
        self.require_context(context)?;
        let parsed = XmlPath::parse(path)?;
        let mut current = parsed.start(self, context);

        for step in &parsed.steps {
            if let Some(found) = apply_step(self, &[current], step).first() {
                current = *found;
                continue;
            }
            if current == self.document {
                return Err(Error::PathNotCreatable(format!(
                    "{path:?} does not match the root element"
                )));
            }
            let name = step.creatable_name().ok_or_else(|| {
                Error::PathNotCreatable(format!("{path:?} has a step that cannot be created"))
            })?;
            current = self.ensure_child(current, name)?;
        }

        if current == self.document {
            return Err(Error::PathNotCreatable(format!(
                "{path:?} resolves to the document node"
            )));
        }
        Ok(current)
    }

    pub fn select_single_node(&self, context: NodeId, path: &str) -> Result<Option<NodeId>> {
        Ok(self.select_all(context, path)?.into_iter().next())
    }

    /// Every node `path` matches from `context`, in document order.
    pub fn select_all(&self, context: NodeId, path: &str) -> Result<Vec<NodeId>> {
        self.require_context(context)?;
        let parsed = XmlPath::parse(path)?;
        Ok(parsed
            .evaluate(self, context)
            .into_iter()
            .filter(|node| *node != self.document)
            .collect())
    }

    /// Child elements of `context` whose name matches `name` (`*` matches all).
    pub fn select_nodes(&self, context: NodeId, name: &str) -> Result<Vec<NodeId>> {
        self.require_context(context)?;
        let test = match name {
            "*" => NameTest::Any,
            other if is_valid_name(other)? => NameTest::Name(other.to_string()),
            other => return Err(Error::InvalidName(other.to_string())),
        };
        Ok(self
            .child_elements(context)
            .into_iter()
            .filter(|child| self.name(*child).is_some_and(|child_name| test.matches(child_name)))
            .collect())
    }

    /// Serializes the root element.
    pub fn serialize(&self) -> String {
        self.dump_node(self.root)
    }

    pub fn dump_node(&self, node: NodeId) -> String {
        let mut out = String::new();
        if self.node(node).is_some() {
            self.write_node(node, &mut out);
        }
        out
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        stacker::maybe_grow(64 * 1024, 2 * 1024 * 1024, || {
            match &self.nodes[node.0].node_type {
                XmlNodeType::Document => {
                    for child in &self.nodes[node.0].children {
                        self.write_node(*child, out);
                    }
                }
                XmlNodeType::Text(text) => push_escaped_text(out, text),
                XmlNodeType::Element(element) => {
                    out.push('<');
                    out.push_str(&element.name);
                    for (key, value) in &element.attrs {
                        out.push(' ');
                        out.push_str(key);
                        out.push_str("=\"");
                        push_escaped_attr(out, value);
                        out.push('"');
                    }
                    let children = &self.nodes[node.0].children;
                    if children.is_empty() {
                        out.push_str("/>");
                        return;
                    }
                    out.push('>');
                    for child in children {
                        self.write_node(*child, out);
                    }
                    out.push_str("</");
                    out.push_str(&element.name);
                    out.push('>');
                }
            }
        })
    }
}

impl XmlTree for XmlDocument {
    fn select_single_node(&self, context: NodeId, path: &str) -> Result<Option<NodeId>> {
        XmlDocument::select_single_node(self, context, path)
    }

    fn select_nodes(&self, context: NodeId, name: &str) -> Result<Vec<NodeId>> {
        XmlDocument::select_nodes(self, context, name)
    }

    fn text(&self, node: NodeId) -> Result<String> {
        XmlDocument::text(self, node)
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<()> {
        XmlDocument::set_text(self, node, text)
    }

    fn append_element(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        XmlDocument::append_element(self, parent, name)
    }

    fn ensure_child(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        XmlDocument::ensure_child(self, parent, name)
    }

    fn ensure_path(&mut self, context: NodeId, path: &str) -> Result<NodeId> {
        XmlDocument::ensure_path(self, context, path)
    }
}

fn open_element(stack: &[NodeId]) -> Option<NodeId> {
    if stack.len() > 1 { stack.last().copied() } else { None }
}

fn parse_start_tag(src: &str, at: usize) -> Result<(String, Vec<(String, String)>, bool, usize)> {
    let bytes = src.as_bytes();
    let mut i = at + 1;
    let name = parse_name(src, &mut i)
        .ok_or_else(|| Error::XmlParse(format!("invalid start tag at byte {at}")))?;

    let mut attrs: Vec<(String, String)> = Vec::new();
    loop {
        let had_ws = skip_ws(bytes, &mut i);
        match bytes.get(i) {
            None => return Err(Error::XmlParse(format!("unclosed start tag <{name}>"))),
            Some(b'>') => return Ok((name, attrs, false, i + 1)),
            Some(b'/') if bytes.get(i + 1) == Some(&b'>') => {
                return Ok((name, attrs, true, i + 2));
            }
            Some(_) if !had_ws => {
                return Err(Error::XmlParse(format!(
                    "expected whitespace before attribute in <{name}>"
                )));
            }
            Some(_) => {}
        }

        let attr_name = parse_name(src, &mut i)
            .ok_or_else(|| Error::XmlParse(format!("invalid attribute in <{name}>")))?;
        skip_ws(bytes, &mut i);
        if bytes.get(i) != Some(&b'=') {
            return Err(Error::XmlParse(format!(
                "attribute {attr_name} in <{name}> has no value"
            )));
        }
        i += 1;
        skip_ws(bytes, &mut i);
        let value = parse_quoted_value(src, &mut i)?;
        if attrs.iter().any(|(key, _)| *key == attr_name) {
            return Err(Error::XmlParse(format!(
                "duplicate attribute {attr_name} in <{name}>"
            )));
        }
        attrs.push((attr_name, value));
    }
}

fn parse_end_tag(src: &str, at: usize) -> Result<(String, usize)> {
    let bytes = src.as_bytes();
    let mut i = at + 2;
    let name = parse_name(src, &mut i)
        .ok_or_else(|| Error::XmlParse(format!("invalid end tag at byte {at}")))?;
    skip_ws(bytes, &mut i);
    if bytes.get(i) != Some(&b'>') {
        return Err(Error::XmlParse(format!("unclosed end tag </{name}>")));
    }
    Ok((name, i + 1))
}

fn parse_name(src: &str, i: &mut usize) -> Option<String> {
    let bytes = src.as_bytes();
    let start = *i;
    while *i < bytes.len() && is_name_byte(bytes[*i]) {
        *i += 1;
    }
    let name = src.get(start..*i)?;
    if name.is_empty() || name.starts_with(|ch: char| ch.is_ascii_digit() || ch == '-' || ch == '.') {
        return None;
    }
    Some(name.to_string())
}

fn parse_quoted_value(src: &str, i: &mut usize) -> Result<String> {
    let bytes = src.as_bytes();
    let quote = match bytes.get(*i) {
        Some(b'"') => b'"',
        Some(b'\'') => b'\'',
        _ => return Err(Error::XmlParse("attribute values must be quoted".into())),
    };
    let start = *i + 1;
    let end = find_subslice(bytes, start, &[quote])
        .ok_or_else(|| Error::XmlParse("unclosed attribute value".into()))?;
    let raw = src
        .get(start..end)
        .ok_or_else(|| Error::XmlParse("invalid attribute value".into()))?;
    *i = end + 1;
    Ok(decode_character_references(raw))
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':') || b >= 0x80
}

fn skip_ws(bytes: &[u8], i: &mut usize) -> bool {
    let start = *i;
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
    *i > start
}

pub(crate) fn starts_with_at(bytes: &[u8], at: usize, needle: &[u8]) -> bool {
    bytes
        .get(at..at + needle.len())
        .is_some_and(|window| window == needle)
}

pub(crate) fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || from > bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

fn push_escaped_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
}

fn push_escaped_attr(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
}
