use std::collections::HashSet;
use std::sync::OnceLock;

use crate::xml::XmlDocument;
use crate::{Error, NodeId, Result};

const NAME_PATTERN: &str = r"[\p{L}_][\p{L}\p{N}_.\-]*(?::[\p{L}_][\p{L}\p{N}_.\-]*)?";

fn step_regex() -> Result<&'static fancy_regex::Regex> {
    static STEP: OnceLock<std::result::Result<fancy_regex::Regex, String>> = OnceLock::new();
    STEP.get_or_init(|| {
        let pattern = format!(r"^(?P<test>\*|{NAME_PATTERN})(?:\[(?P<index>[1-9][0-9]*)\])?$");
        fancy_regex::Regex::new(&pattern).map_err(|err| err.to_string())
    })
    .as_ref()
    .map_err(|err| Error::InvalidPath(format!("step pattern failed to compile: {err}")))
}

fn name_regex() -> Result<&'static fancy_regex::Regex> {
    static NAME: OnceLock<std::result::Result<fancy_regex::Regex, String>> = OnceLock::new();
    NAME.get_or_init(|| {
        fancy_regex::Regex::new(&format!("^{NAME_PATTERN}$")).map_err(|err| err.to_string())
    })
    .as_ref()
    .map_err(|err| Error::InvalidName(format!("name pattern failed to compile: {err}")))
}

/// Checks `name` against the element-name grammar accepted in paths.
pub(crate) fn is_valid_name(name: &str) -> Result<bool> {
    name_regex()?
        .is_match(name)
        .map_err(|err| Error::InvalidName(format!("{name}: {err}")))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NameTest {
    Any,
    Name(String),
}

impl NameTest {
    /// Unprefixed names compare against the local part of the element name,
    /// prefixed names against the qualified name.
    pub(crate) fn matches(&self, element_name: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Name(name) if name.contains(':') => name == element_name,
            Self::Name(name) => local_part(element_name) == name,
        }
    }
}

pub(crate) fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathStep {
    Current,
    Parent,
    Element {
        test: NameTest,
        index: Option<usize>,
    },
}

impl PathStep {
    fn parse(raw: &str, path: &str) -> Result<Self> {
        match raw {
            "." => return Ok(Self::Current),
            ".." => return Ok(Self::Parent),
            "" => return Err(Error::InvalidPath(format!("empty step in {path:?}"))),
            _ => {}
        }

        let captures = step_regex()?
            .captures(raw)
            .map_err(|err| Error::InvalidPath(format!("{path:?}: {err}")))?
            .ok_or_else(|| Error::InvalidPath(format!("malformed step {raw:?} in {path:?}")))?;

        let test = match captures.name("test").map(|m| m.as_str()) {
            Some("*") => NameTest::Any,
            Some(name) => NameTest::Name(name.to_string()),
            None => return Err(Error::InvalidPath(format!("missing name in {path:?}"))),
        };
        let index = match captures.name("index") {
            Some(raw_index) => Some(raw_index.as_str().parse::<usize>().map_err(|_| {
                Error::InvalidPath(format!("index out of range in {path:?}"))
            })?),
            None => None,
        };
        Ok(Self::Element { test, index })
    }

    /// The name to create when this step does not resolve, if it has one.
    pub(crate) fn creatable_name(&self) -> Option<&str> {
        match self {
            Self::Element {
                test: NameTest::Name(name),
                index: None,
            } => Some(name),
            _ => None,
        }
    }
}

/// A parsed path expression.
///
/// ```text
/// path := ['/'] step ('/' step)*
/// step := '.' | '..' | '*' | name ['[' index ']']
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct XmlPath {
    pub(crate) absolute: bool,
    pub(crate) steps: Vec<PathStep>,
}

impl XmlPath {
    pub(crate) fn parse(src: &str) -> Result<Self> {
        let trimmed = src.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidPath("empty path".into()));
        }
        if trimmed.contains("//") {
            return Err(Error::InvalidPath(format!(
                "descendant axis is not supported: {src:?}"
            )));
        }

        let (absolute, body) = match trimmed.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        if body.is_empty() {
            return Err(Error::InvalidPath(format!("path selects no element: {src:?}")));
        }

        let steps = body
            .split('/')
            .map(|raw| PathStep::parse(raw.trim(), src))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { absolute, steps })
    }

    pub(crate) fn start(&self, doc: &XmlDocument, context: NodeId) -> NodeId {
        if self.absolute {
            doc.document_node()
        } else {
            context
        }
    }

    /// All matching nodes in document order.
    pub(crate) fn evaluate(&self, doc: &XmlDocument, context: NodeId) -> Vec<NodeId> {
        let mut current = vec![self.start(doc, context)];
        for step in &self.steps {
            current = apply_step(doc, &current, step);
            if current.is_empty() {
                break;
            }
        }
        current
    }
}

pub(crate) fn apply_step(doc: &XmlDocument, nodes: &[NodeId], step: &PathStep) -> Vec<NodeId> {
    match step {
        PathStep::Current => nodes.to_vec(),
        PathStep::Parent => {
            let mut seen = HashSet::new();
            nodes
                .iter()
                .filter_map(|node| doc.parent(*node))
                .filter(|parent| seen.insert(*parent))
                .collect()
        }
        PathStep::Element { test, index } => {
            let mut out = Vec::new();
            for node in nodes {
                let matched = doc
                    .child_elements(*node)
                    .into_iter()
                    .filter(|child| doc.name(*child).is_some_and(|name| test.matches(name)));
                match index {
                    Some(position) => out.extend(matched.skip(position - 1).take(1)),
                    None => out.extend(matched),
                }
            }
            out
        }
    }
}
