use crate::dependency::{add_dependency, startup_dependencies};
use crate::document::ControlDocument;
use crate::field_sync::{
    FieldDescriptor, FieldOutcome, copy_from_document_to_form, copy_from_form_to_document,
};
use crate::form::FormDocument;
use crate::trace::Trace;
use crate::xml::XmlDocument;
use crate::{Error, NodeId, Result, truncate_chars};

/// One console page: its form, the configuration document it edits, and
/// the element of that document the page's field paths are relative to.
#[derive(Debug, Clone)]
pub struct Console {
    form: FormDocument,
    config: XmlDocument,
    context: NodeId,
    trace: Trace,
}

impl Console {
    pub fn new(form_html: &str, config_xml: &str) -> Result<Self> {
        let form = FormDocument::from_html(form_html)?;
        let config = XmlDocument::parse(config_xml)?;
        Ok(Self::from_documents(form, config))
    }

    /// The configuration context starts at the root element.
    pub fn from_documents(form: FormDocument, config: XmlDocument) -> Self {
        let context = config.root();
        Self {
            form,
            config,
            context,
            trace: Trace::default(),
        }
    }

    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace.enable(enabled);
    }

    pub fn is_trace_enabled(&self) -> bool {
        self.trace.is_enabled()
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        self.trace.take_logs()
    }

    pub fn set_trace_stderr(&mut self, enabled: bool) {
        self.trace.set_stderr(enabled);
    }

    pub fn set_trace_sync(&mut self, enabled: bool) {
        self.trace.set_sync(enabled);
    }

    pub fn set_trace_dependency(&mut self, enabled: bool) {
        self.trace.set_dependency(enabled);
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        self.trace.set_log_limit(max_entries)
    }

    /// Moves the context to the element `path` selects from the root.
    pub fn set_config_context(&mut self, path: &str) -> Result<()> {
        let root = self.config.root();
        self.context = self
            .config
            .select_single_node(root, path)?
            .ok_or_else(|| Error::NodeNotFound(path.to_string()))?;
        Ok(())
    }

    pub fn config_context(&self) -> NodeId {
        self.context
    }

    pub fn form(&self) -> &FormDocument {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut FormDocument {
        &mut self.form
    }

    pub fn config(&self) -> &XmlDocument {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut XmlDocument {
        &mut self.config
    }

    pub fn into_documents(self) -> (FormDocument, XmlDocument) {
        (self.form, self.config)
    }

    /// Fills the form from the configuration document.
    pub fn load_fields(&mut self, descriptors: &[FieldDescriptor]) -> Result<Vec<FieldOutcome>> {
        let outcomes =
            copy_from_document_to_form(descriptors, &self.config, self.context, &mut self.form)?;
        self.trace_outcomes("load", "document", &outcomes);
        Ok(outcomes)
    }

    /// Writes the form back into the configuration document.
    pub fn save_fields(&mut self, descriptors: &[FieldDescriptor]) -> Result<Vec<FieldOutcome>> {
        let outcomes =
            copy_from_form_to_document(descriptors, &mut self.config, self.context, &self.form)?;
        self.trace_outcomes("save", "form", &outcomes);
        Ok(outcomes)
    }

    pub fn add_startup_dependency(&mut self, namespace: &str) -> Result<bool> {
        let added = add_dependency(&mut self.config, self.context, namespace)?;
        let state = if added { "added" } else { "present" };
        self.trace
            .dependency_line(format!("[dependency] {state} namespace={namespace}"));
        Ok(added)
    }

    pub fn startup_dependencies(&self) -> Result<Vec<String>> {
        startup_dependencies(&self.config, self.context)
    }

    fn trace_outcomes(&mut self, action: &str, source: &str, outcomes: &[FieldOutcome]) {
        for outcome in outcomes {
            let line = match outcome {
                FieldOutcome::Skipped { id } => {
                    format!("[sync] skip id={id} reason=no-control")
                }
                FieldOutcome::Copied { id, value } => {
                    format!("[sync] {action} id={id} value={value} source={source}")
                }
                FieldOutcome::Defaulted { id, value } => {
                    format!("[sync] {action} id={id} value={value} source=default")
                }
            };
            self.trace.sync_line(line);
        }
    }

    pub fn assert_value(&self, id: &str, expected: &str) -> Result<()> {
        let control = self.control(id)?;
        let actual = self.form.value(control)?.unwrap_or_default();
        if actual != expected {
            return Err(Error::AssertionFailed {
                target: format!("#{id}"),
                expected: expected.to_string(),
                actual,
                snippet: self.form_snippet(control),
            });
        }
        Ok(())
    }

    pub fn assert_checked(&self, id: &str, expected: bool) -> Result<()> {
        let control = self.control(id)?;
        let actual = self.form.checked(control)?;
        if actual != expected {
            return Err(Error::AssertionFailed {
                target: format!("#{id}"),
                expected: expected.to_string(),
                actual: actual.to_string(),
                snippet: self.form_snippet(control),
            });
        }
        Ok(())
    }

    pub fn assert_config_text(&self, path: &str, expected: &str) -> Result<()> {
        let node = self
            .config
            .select_single_node(self.context, path)?
            .ok_or_else(|| Error::NodeNotFound(path.to_string()))?;
        let actual = self.config.text(node)?;
        if actual != expected {
            return Err(Error::AssertionFailed {
                target: path.to_string(),
                expected: expected.to_string(),
                actual,
                snippet: truncate_chars(&self.config.dump_node(node), 200),
            });
        }
        Ok(())
    }

    pub fn dump_config(&self) -> String {
        self.config.serialize()
    }

    fn control(&self, id: &str) -> Result<NodeId> {
        self.form
            .by_id(id)
            .ok_or_else(|| Error::NodeNotFound(format!("#{id}")))
    }

    fn form_snippet(&self, node: NodeId) -> String {
        truncate_chars(&self.form.dump_node(node), 200)
    }
}
