use crate::document::{ControlDocument, XmlTree};
use crate::{NodeId, Result};

/// Binds a form control to a location in the configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Element id in the form document.
    pub id: String,
    /// Path of the value element, relative to the context element.
    pub path: String,
    pub default: Option<String>,
}

impl FieldDescriptor {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// The fallback value, empty when no default is configured.
    pub fn default_value(&self) -> &str {
        self.default.as_deref().unwrap_or("")
    }
}

/// What happened to one descriptor during a copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    /// No control with the descriptor's id exists.
    Skipped { id: String },
    /// The value came from the source side.
    Copied { id: String, value: String },
    /// The source had no value and the default was used.
    Defaulted { id: String, value: String },
}

impl FieldOutcome {
    pub fn id(&self) -> &str {
        match self {
            Self::Skipped { id } | Self::Copied { id, .. } | Self::Defaulted { id, .. } => id,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Skipped { .. } => None,
            Self::Copied { value, .. } | Self::Defaulted { value, .. } => Some(value),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Loads control values from the configuration document.
///
/// A missing value element and an empty one both fall back to the
/// descriptor's default. Only the form is mutated.
pub fn copy_from_document_to_form<X, F>(
    descriptors: &[FieldDescriptor],
    xml: &X,
    context: NodeId,
    form: &mut F,
) -> Result<Vec<FieldOutcome>>
where
    X: XmlTree + ?Sized,
    F: ControlDocument + ?Sized,
{
    let mut outcomes = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let Some(control) = form.control_by_id(&descriptor.id) else {
            outcomes.push(FieldOutcome::Skipped {
                id: descriptor.id.clone(),
            });
            continue;
        };

        let stored = match xml.select_single_node(context, &descriptor.path)? {
            Some(node) => Some(xml.text(node)?),
            None => None,
        };
        let outcome = match stored.filter(|text| !text.is_empty()) {
            Some(value) => FieldOutcome::Copied {
                id: descriptor.id.clone(),
                value,
            },
            None => FieldOutcome::Defaulted {
                id: descriptor.id.clone(),
                value: descriptor.default_value().to_string(),
            },
        };

        if let Some(value) = outcome.value() {
            form.write_control_value(control, value)?;
        }
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Stores control values into the configuration document, creating
/// value elements that do not exist yet.
///
/// An empty control value is written as-is; the default only replaces a
/// control that has no value. Controls that are absent leave the document
/// untouched.
pub fn copy_from_form_to_document<X, F>(
    descriptors: &[FieldDescriptor],
    xml: &mut X,
    context: NodeId,
    form: &F,
) -> Result<Vec<FieldOutcome>>
where
    X: XmlTree + ?Sized,
    F: ControlDocument + ?Sized,
{
    let mut outcomes = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let Some(control) = form.control_by_id(&descriptor.id) else {
            outcomes.push(FieldOutcome::Skipped {
                id: descriptor.id.clone(),
            });
            continue;
        };

        let (value, defaulted) = match form.read_control_value(control)? {
            Some(value) => (value, false),
            None => (descriptor.default_value().to_string(), true),
        };

        let node = match xml.select_single_node(context, &descriptor.path)? {
            Some(node) => node,
            None => xml.ensure_path(context, &descriptor.path)?,
        };
        xml.set_text(node, &value)?;

        let id = descriptor.id.clone();
        outcomes.push(if defaulted {
            FieldOutcome::Defaulted { id, value }
        } else {
            FieldOutcome::Copied { id, value }
        });
    }
    Ok(outcomes)
}
