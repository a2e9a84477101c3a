use crate::document::ControlDocument;
use crate::{NodeId, Result};

pub const TOGGLE_ON: &str = "true";
pub const TOGGLE_OFF: &str = "false";

/// How a control's state maps to a string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// `<input type="checkbox">`: `"true"` / `"false"` against the checked state.
    Toggle,
    /// Everything else: the raw value.
    Text,
}

impl ControlKind {
    pub fn resolve(tag_name: &str, input_type: Option<&str>) -> Self {
        let is_checkbox = tag_name.eq_ignore_ascii_case("input")
            && input_type.is_some_and(|kind| kind.eq_ignore_ascii_case("checkbox"));
        if is_checkbox { Self::Toggle } else { Self::Text }
    }

    pub fn read<D>(self, doc: &D, control: NodeId) -> Result<Option<String>>
    where
        D: ControlDocument + ?Sized,
    {
        match self {
            Self::Toggle => {
                let value = if doc.checked(control)? { TOGGLE_ON } else { TOGGLE_OFF };
                Ok(Some(value.to_string()))
            }
            Self::Text => doc.value(control),
        }
    }

    pub fn write<D>(self, doc: &mut D, control: NodeId, value: &str) -> Result<()>
    where
        D: ControlDocument + ?Sized,
    {
        match self {
            Self::Toggle => doc.set_checked(control, value == TOGGLE_ON),
            Self::Text => doc.set_value(control, value),
        }
    }
}
