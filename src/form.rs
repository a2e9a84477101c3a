use std::collections::HashMap;

use crate::document::ControlDocument;
use crate::xml::{find_subslice, starts_with_at};
use crate::{Error, NodeId, Result, decode_character_references};

#[derive(Debug, Clone)]
enum FormNodeType {
    Document,
    Element(FormElement),
    Text(String),
}

#[derive(Debug, Clone)]
struct FormElement {
    tag_name: String,
    attrs: HashMap<String, String>,
    value: Option<String>,
    checked: bool,
}

#[derive(Debug, Clone)]
struct FormNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    node_type: FormNodeType,
}

/// Page markup reduced to what form synchronization needs: elements, ids,
/// and the live value/checked state of controls.
#[derive(Debug, Clone)]
pub struct FormDocument {
    nodes: Vec<FormNode>,
    root: NodeId,
    id_index: HashMap<String, NodeId>,
}

impl Default for FormDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl FormDocument {
    pub fn new() -> Self {
        let root = FormNode {
            parent: None,
            children: Vec::new(),
            node_type: FormNodeType::Document,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            id_index: HashMap::new(),
        }
    }

    pub fn from_html(html: &str) -> Result<Self> {
        let mut doc = Self::new();
        let mut stack = vec![doc.root];
        let bytes = html.as_bytes();
        let mut i = 0usize;

        while i < bytes.len() {
            if starts_with_at(bytes, i, b"<!--") {
                let end = find_subslice(bytes, i + 4, b"-->")
                    .ok_or_else(|| Error::HtmlParse("unclosed HTML comment".into()))?;
                i = end + 3;
                continue;
            }

            if bytes[i] == b'<' && bytes.get(i + 1).is_some_and(|next| *next == b'/') {
                let (tag, next) = parse_end_tag(html, i)?;
                i = next;
                let Some(depth) = stack
                    .iter()
                    .rposition(|node| doc.tag_name_of(*node).is_some_and(|open| open == tag))
                else {
                    continue;
                };
                stack.truncate(depth);
                continue;
            }

            if starts_with_at(bytes, i, b"<!") || starts_with_at(bytes, i, b"<?") {
                let end = find_subslice(bytes, i + 2, b">")
                    .ok_or_else(|| Error::HtmlParse("unclosed declaration".into()))?;
                i = end + 1;
                continue;
            }

            if bytes[i] == b'<' && bytes.get(i + 1).is_some_and(u8::is_ascii_alphabetic) {
                let (tag, attrs, self_closing, next) = parse_start_tag(html, i)?;
                i = next;

                if tag == "option" {
                    close_open_option(&doc, &mut stack);
                }

                let parent = *stack
                    .last()
                    .ok_or_else(|| Error::HtmlParse("missing parent element".into()))?;
                let node = doc.create_element(parent, tag.clone(), attrs);

                if is_raw_text_tag(&tag) {
                    let close = find_end_tag_ignore_case(bytes, i, tag.as_bytes())
                        .ok_or_else(|| Error::HtmlParse(format!("unclosed <{tag}>")))?;
                    let body = html
                        .get(i..close)
                        .ok_or_else(|| Error::HtmlParse(format!("invalid <{tag}> body")))?;
                    if !body.is_empty() {
                        let text = if tag == "textarea" {
                            decode_character_references(body.strip_prefix('\n').unwrap_or(body))
                        } else {
                            body.to_string()
                        };
                        doc.create_text(node, text);
                    }
                    let (_, after_close) = parse_end_tag(html, close)?;
                    i = after_close;
                    continue;
                }

                if !self_closing && !is_void_tag(&tag) {
                    stack.push(node);
                }
                continue;
            }

            let end = find_subslice(bytes, i + 1, b"<").unwrap_or(bytes.len());
            let text = html
                .get(i..end)
                .ok_or_else(|| Error::HtmlParse("invalid text content".into()))?;
            let parent = *stack
                .last()
                .ok_or_else(|| Error::HtmlParse("missing parent element".into()))?;
            doc.create_text(parent, decode_character_references(text));
            i = end;
        }

        doc.initialize_form_control_values()?;
        Ok(doc)
    }

    fn create_node(&mut self, parent: Option<NodeId>, node_type: FormNodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(FormNode {
            parent,
            children: Vec::new(),
            node_type,
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id.0].children.push(id);
        }
        id
    }

    fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: HashMap<String, String>,
    ) -> NodeId {
        let value = is_value_bearing_tag(&tag_name)
            .then(|| attrs.get("value").cloned().unwrap_or_default());
        let checked = attrs.contains_key("checked");
        let id_attr = attrs.get("id").cloned();
        let element = FormElement {
            tag_name,
            attrs,
            value,
            checked,
        };
        let id = self.create_node(Some(parent), FormNodeType::Element(element));
        if let Some(id_attr) = id_attr {
            self.id_index.entry(id_attr).or_insert(id);
        }
        id
    }

    fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.create_node(Some(parent), FormNodeType::Text(text))
    }

    fn initialize_form_control_values(&mut self) -> Result<()> {
        let elements = (0..self.nodes.len())
            .map(NodeId)
            .filter(|node| self.element(*node).is_some())
            .collect::<Vec<_>>();
        for node in elements {
            match self.tag_name_of(node) {
                Some("textarea") => {
                    let text = self.text_content(node);
                    self.require_element_mut(node)?.value = Some(text);
                }
                Some("select") => {
                    let value = self.select_value_from_options(node)?;
                    self.require_element_mut(node)?.value = Some(value);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn element(&self, node: NodeId) -> Option<&FormElement> {
        match &self.nodes.get(node.0)?.node_type {
            FormNodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    fn require_element(&self, node: NodeId) -> Result<&FormElement> {
        self.element(node)
            .ok_or_else(|| Error::InvalidNode(format!("node {} is not an element", node.0)))
    }

    fn require_element_mut(&mut self, node: NodeId) -> Result<&mut FormElement> {
        match self.nodes.get_mut(node.0).map(|node| &mut node.node_type) {
            Some(FormNodeType::Element(element)) => Ok(element),
            _ => Err(Error::InvalidNode(format!("node {} is not an element", node.0))),
        }
    }

    fn tag_name_of(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|element| element.tag_name.as_str())
    }

    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).copied()
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?
            .attrs
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        stacker::maybe_grow(64 * 1024, 2 * 1024 * 1024, || {
            let Some(node_ref) = self.nodes.get(node.0) else {
                return;
            };
            match &node_ref.node_type {
                FormNodeType::Text(text) => out.push_str(text),
                _ => {
                    for child in &node_ref.children {
                        self.collect_text(*child, out);
                    }
                }
            }
        })
    }

    fn collect_options(&self, node: NodeId, out: &mut Vec<NodeId>) {
        for child in &self.nodes[node.0].children {
            if self.tag_name_of(*child) == Some("option") {
                out.push(*child);
            }
            self.collect_options(*child, out);
        }
    }

    fn option_value(&self, option: NodeId) -> Result<String> {
        let element = self.require_element(option)?;
        match element.attrs.get("value") {
            Some(value) => Ok(value.clone()),
            None => Ok(self
                .text_content(option)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")),
        }
    }

    fn select_value_from_options(&self, select: NodeId) -> Result<String> {
        let mut options = Vec::new();
        self.collect_options(select, &mut options);
        let selected = options
            .iter()
            .copied()
            .find(|option| self.attr(*option, "selected").is_some())
            .or_else(|| options.first().copied());
        match selected {
            Some(option) => self.option_value(option),
            None => Ok(String::new()),
        }
    }

    /// Selects the first option whose value equals `requested` and clears
    /// the selection of every other option.
    fn set_select_value(&mut self, select: NodeId, requested: &str) -> Result<()> {
        let mut options = Vec::new();
        self.collect_options(select, &mut options);

        let mut matched = None;
        for option in &options {
            if matched.is_none() && self.option_value(*option)? == requested {
                matched = Some(*option);
            }
        }

        for option in options {
            let element = self.require_element_mut(option)?;
            if Some(option) == matched {
                element.attrs.insert("selected".to_string(), String::new());
            } else {
                element.attrs.remove("selected");
            }
        }

        let value = matched.map(|_| requested.to_string()).unwrap_or_default();
        self.require_element_mut(select)?.value = Some(value);
        Ok(())
    }

    pub fn dump_node(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        stacker::maybe_grow(64 * 1024, 2 * 1024 * 1024, || {
            let Some(node_ref) = self.nodes.get(node.0) else {
                return;
            };
            match &node_ref.node_type {
                FormNodeType::Document => {
                    for child in &node_ref.children {
                        self.write_node(*child, out);
                    }
                }
                FormNodeType::Text(text) => out.push_str(text),
                FormNodeType::Element(element) => {
                    let mut attrs = element.attrs.iter().collect::<Vec<_>>();
                    attrs.sort();
                    out.push('<');
                    out.push_str(&element.tag_name);
                    for (key, value) in attrs {
                        out.push(' ');
                        out.push_str(key);
                        out.push_str("=\"");
                        out.push_str(value);
                        out.push('"');
                    }
                    out.push('>');
                    if is_void_tag(&element.tag_name) {
                        return;
                    }
                    for child in &node_ref.children {
                        self.write_node(*child, out);
                    }
                    out.push_str("</");
                    out.push_str(&element.tag_name);
                    out.push('>');
                }
            }
        })
    }
}

impl ControlDocument for FormDocument {
    fn control_by_id(&self, id: &str) -> Option<NodeId> {
        self.by_id(id)
    }

    fn tag_name(&self, control: NodeId) -> Result<&str> {
        Ok(self.require_element(control)?.tag_name.as_str())
    }

    fn input_type(&self, control: NodeId) -> Result<Option<&str>> {
        Ok(self
            .require_element(control)?
            .attrs
            .get("type")
            .map(String::as_str))
    }

    fn value(&self, control: NodeId) -> Result<Option<String>> {
        let element = self.require_element(control)?;
        if element.tag_name == "option" {
            return self.option_value(control).map(Some);
        }
        Ok(element.value.clone())
    }

    fn set_value(&mut self, control: NodeId, value: &str) -> Result<()> {
        if self.tag_name_of(control) == Some("select") {
            return self.set_select_value(control, value);
        }
        self.require_element_mut(control)?.value = Some(value.to_string());
        Ok(())
    }

    fn checked(&self, control: NodeId) -> Result<bool> {
        Ok(self.require_element(control)?.checked)
    }

    fn set_checked(&mut self, control: NodeId, checked: bool) -> Result<()> {
        self.require_element_mut(control)?.checked = checked;
        Ok(())
    }
}

fn close_open_option(doc: &FormDocument, stack: &mut Vec<NodeId>) {
    if stack
        .last()
        .is_some_and(|top| doc.tag_name_of(*top) == Some("option"))
    {
        stack.pop();
    }
}

fn parse_start_tag(
    html: &str,
    at: usize,
) -> Result<(String, HashMap<String, String>, bool, usize)> {
    let bytes = html.as_bytes();
    let mut i = at + 1;
    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }
    let tag = html
        .get(tag_start..i)
        .ok_or_else(|| Error::HtmlParse("invalid tag name".into()))?
        .to_ascii_lowercase();

    let mut attrs = HashMap::new();
    let mut self_closing = false;

    loop {
        skip_ws(bytes, &mut i);
        if i >= bytes.len() {
            return Err(Error::HtmlParse(format!("unclosed start tag <{tag}>")));
        }
        if bytes[i] == b'>' {
            i += 1;
            break;
        }
        if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'>') {
            self_closing = true;
            i += 2;
            break;
        }
        if !is_attr_name_char(bytes[i]) {
            i += 1;
            continue;
        }

        let name_start = i;
        while i < bytes.len() && is_attr_name_char(bytes[i]) {
            i += 1;
        }
        let name = html
            .get(name_start..i)
            .ok_or_else(|| Error::HtmlParse("invalid attribute name".into()))?
            .to_ascii_lowercase();

        skip_ws(bytes, &mut i);
        let value = if bytes.get(i) == Some(&b'=') {
            i += 1;
            skip_ws(bytes, &mut i);
            parse_attr_value(html, &mut i)?
        } else {
            String::new()
        };
        attrs.entry(name).or_insert(value);
    }

    Ok((tag, attrs, self_closing, i))
}

fn parse_attr_value(html: &str, i: &mut usize) -> Result<String> {
    let bytes = html.as_bytes();
    match bytes.get(*i) {
        None => Err(Error::HtmlParse("missing attribute value".into())),
        Some(quote @ (b'\'' | b'"')) => {
            let start = *i + 1;
            let end = find_subslice(bytes, start, &[*quote])
                .ok_or_else(|| Error::HtmlParse("unclosed quoted attribute value".into()))?;
            let raw = html
                .get(start..end)
                .ok_or_else(|| Error::HtmlParse("invalid attribute value".into()))?;
            *i = end + 1;
            Ok(decode_character_references(raw))
        }
        Some(_) => {
            let start = *i;
            while *i < bytes.len()
                && !bytes[*i].is_ascii_whitespace()
                && bytes[*i] != b'>'
                && !(bytes[*i] == b'/' && bytes.get(*i + 1) == Some(&b'>'))
            {
                *i += 1;
            }
            let raw = html
                .get(start..*i)
                .ok_or_else(|| Error::HtmlParse("invalid attribute value".into()))?;
            Ok(decode_character_references(raw))
        }
    }
}

fn parse_end_tag(html: &str, at: usize) -> Result<(String, usize)> {
    let bytes = html.as_bytes();
    let mut i = at + 2;
    skip_ws(bytes, &mut i);
    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }
    let tag = html
        .get(tag_start..i)
        .ok_or_else(|| Error::HtmlParse("invalid end tag".into()))?
        .to_ascii_lowercase();
    let close = find_subslice(bytes, i, b">")
        .ok_or_else(|| Error::HtmlParse(format!("unclosed end tag </{tag}>")))?;
    Ok((tag, close + 1))
}

fn find_end_tag_ignore_case(bytes: &[u8], from: usize, tag: &[u8]) -> Option<usize> {
    let mut i = from;
    while let Some(open) = find_subslice(bytes, i, b"</") {
        let name_start = open + 2;
        let matches_tag = bytes
            .get(name_start..name_start + tag.len())
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(tag));
        let terminated = bytes
            .get(name_start + tag.len())
            .is_some_and(|next| next.is_ascii_whitespace() || *next == b'>');
        if matches_tag && terminated {
            return Some(open);
        }
        i = name_start;
    }
    None
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn is_tag_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn is_attr_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

fn is_raw_text_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "textarea" | "title")
}

fn is_value_bearing_tag(tag: &str) -> bool {
    matches!(tag, "input" | "textarea" | "select" | "button" | "output")
}

fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}
