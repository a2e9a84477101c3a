use super::*;

const FORM: &str = r#"
    <!DOCTYPE html>
    <form id="settings">
      <label for="port">Port</label>
      <input id="port" name="port" value="8080">
      <input id="enabled" type="checkbox" checked>
      <INPUT ID="verbose" TYPE="CHECKBOX">
      <input id="radio" type="radio" value="r1">
      <textarea id="notes">
first line &amp; more</textarea>
      <select id="mode">
        <option value="sync">Synchronous
        <option value="async" selected>Asynchronous
        <option>poll
      </select>
      <select id="empty"></select>
      <button id="save" type="submit">Save</button>
      <span id="status">idle</span>
    </form>
"#;

fn control(doc: &FormDocument, id: &str) -> Result<NodeId> {
    doc.by_id(id)
        .ok_or_else(|| Error::NodeNotFound(format!("#{id}")))
}

#[test]
fn initial_values_come_from_markup() -> Result<()> {
    let doc = FormDocument::from_html(FORM)?;
    assert_eq!(doc.value(control(&doc, "port")?)?, Some("8080".into()));
    assert_eq!(
        doc.value(control(&doc, "notes")?)?,
        Some("first line & more".into())
    );
    assert_eq!(doc.value(control(&doc, "mode")?)?, Some("async".into()));
    assert_eq!(doc.value(control(&doc, "empty")?)?, Some(String::new()));
    assert_eq!(doc.value(control(&doc, "save")?)?, Some(String::new()));
    assert!(doc.checked(control(&doc, "enabled")?)?);
    assert!(!doc.checked(control(&doc, "verbose")?)?);
    Ok(())
}

#[test]
fn elements_without_a_value_read_as_none_until_written() -> Result<()> {
    let mut doc = FormDocument::from_html(FORM)?;
    let status = control(&doc, "status")?;
    assert_eq!(doc.value(status)?, None);
    assert_eq!(doc.text_content(status), "idle");

    doc.set_value(status, "busy")?;
    assert_eq!(doc.value(status)?, Some("busy".into()));
    Ok(())
}

#[test]
fn control_kind_is_resolved_from_tag_and_type() -> Result<()> {
    let doc = FormDocument::from_html(FORM)?;
    assert_eq!(doc.control_kind(control(&doc, "enabled")?)?, ControlKind::Toggle);
    assert_eq!(doc.control_kind(control(&doc, "verbose")?)?, ControlKind::Toggle);
    for id in ["port", "radio", "notes", "mode", "save", "status"] {
        assert_eq!(
            doc.control_kind(control(&doc, id)?)?,
            ControlKind::Text,
            "{id}"
        );
    }
    Ok(())
}

#[test]
fn resolve_only_treats_checkbox_inputs_as_toggles() {
    assert_eq!(ControlKind::resolve("input", Some("checkbox")), ControlKind::Toggle);
    assert_eq!(ControlKind::resolve("Input", Some("CheckBox")), ControlKind::Toggle);
    assert_eq!(ControlKind::resolve("input", None), ControlKind::Text);
    assert_eq!(ControlKind::resolve("input", Some("radio")), ControlKind::Text);
    assert_eq!(ControlKind::resolve("button", Some("checkbox")), ControlKind::Text);
    assert_eq!(ControlKind::resolve("select", None), ControlKind::Text);
}

#[test]
fn toggle_reads_and_writes_literal_booleans() -> Result<()> {
    let mut doc = FormDocument::from_html(FORM)?;
    let enabled = control(&doc, "enabled")?;
    assert_eq!(doc.read_control_value(enabled)?, Some("true".into()));

    doc.write_control_value(enabled, "false")?;
    assert!(!doc.checked(enabled)?);
    assert_eq!(doc.read_control_value(enabled)?, Some("false".into()));

    doc.write_control_value(enabled, "true")?;
    assert!(doc.checked(enabled)?);

    doc.write_control_value(enabled, "TRUE")?;
    assert!(!doc.checked(enabled)?);
    Ok(())
}

#[test]
fn select_value_follows_matching_option() -> Result<()> {
    let mut doc = FormDocument::from_html(FORM)?;
    let mode = control(&doc, "mode")?;

    doc.write_control_value(mode, "poll")?;
    assert_eq!(doc.read_control_value(mode)?, Some("poll".into()));
    assert!(doc.dump_node(mode).contains("<option selected=\"\">poll"));

    doc.write_control_value(mode, "missing")?;
    assert_eq!(doc.read_control_value(mode)?, Some(String::new()));
    assert!(!doc.dump_node(mode).contains("selected"));
    Ok(())
}

#[test]
fn first_duplicate_id_wins() -> Result<()> {
    let doc = FormDocument::from_html(r#"<input id="x" value="1"><input id="x" value="2">"#)?;
    assert_eq!(doc.value(control(&doc, "x")?)?, Some("1".into()));
    Ok(())
}

#[test]
fn scripts_and_unknown_end_tags_do_not_break_parsing() -> Result<()> {
    let doc = FormDocument::from_html(
        r#"<div><script>if (a < b) { document.write("</div>"); }</script></p>
           <input id="after" value="ok"></div>"#,
    )?;
    assert_eq!(doc.value(control(&doc, "after")?)?, Some("ok".into()));
    Ok(())
}

#[test]
fn unquoted_and_boolean_attributes() -> Result<()> {
    let doc = FormDocument::from_html("<input id=plain value=abc disabled>")?;
    let plain = control(&doc, "plain")?;
    assert_eq!(doc.attr(plain, "value"), Some("abc"));
    assert_eq!(doc.attr(plain, "DISABLED"), Some(""));
    assert_eq!(doc.attr(plain, "missing"), None);
    Ok(())
}

#[test]
fn unquoted_value_stops_before_self_closing_slash() -> Result<()> {
    let doc = FormDocument::from_html("<input id=host value=db/><input id=path value=/srv/data />")?;
    let host = control(&doc, "host")?;
    assert_eq!(doc.read_control_value(host)?, Some("db".into()));
    let path = control(&doc, "path")?;
    assert_eq!(doc.read_control_value(path)?, Some("/srv/data".into()));
    Ok(())
}

#[test]
fn unterminated_markup_is_an_error() {
    for html in ["<input id='x", "<!-- open", "<textarea>never closed"] {
        assert!(
            matches!(FormDocument::from_html(html), Err(Error::HtmlParse(_))),
            "{html:?}"
        );
    }
}
