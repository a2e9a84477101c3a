use super::*;
use crate::xml_path::{NameTest, PathStep, XmlPath, is_valid_name};

const CONFIG: &str = r#"<bus:configuration>
  <Configuration>
    <drive id="1"><name>C</name></drive>
    <drive id="2"><name>D</name></drive>
    <bus:log>on</bus:log>
  </Configuration>
  <startupDependency><namespace>urn:a</namespace></startupDependency>
</bus:configuration>"#;

fn names(doc: &XmlDocument, nodes: &[NodeId]) -> Vec<String> {
    nodes
        .iter()
        .map(|node| doc.text(*node).unwrap_or_default())
        .collect()
}

#[test]
fn relative_paths_walk_child_elements() -> Result<()> {
    let doc = XmlDocument::parse(CONFIG)?;
    let names_found = doc.select_all(doc.root(), "Configuration/drive/name")?;
    assert_eq!(names(&doc, &names_found), vec!["C", "D"]);

    let first = doc.select_single_node(doc.root(), "Configuration/drive/name")?;
    assert_eq!(first, names_found.first().copied());
    Ok(())
}

#[test]
fn index_predicates_are_one_based_per_parent() -> Result<()> {
    let doc = XmlDocument::parse(CONFIG)?;
    let second = doc
        .select_single_node(doc.root(), "Configuration/drive[2]")?
        .ok_or_else(|| Error::NodeNotFound("drive[2]".into()))?;
    assert_eq!(doc.attr(second, "id"), Some("2"));
    assert_eq!(doc.select_single_node(doc.root(), "Configuration/drive[3]")?, None);
    Ok(())
}

#[test]
fn dot_dotdot_and_wildcard_steps() -> Result<()> {
    let doc = XmlDocument::parse(CONFIG)?;
    let configuration = doc
        .select_single_node(doc.root(), "Configuration")?
        .ok_or_else(|| Error::NodeNotFound("Configuration".into()))?;

    assert_eq!(
        doc.select_single_node(configuration, ".")?,
        Some(configuration)
    );
    assert_eq!(
        doc.select_single_node(configuration, "drive/..")?,
        Some(configuration)
    );
    assert_eq!(doc.select_all(configuration, "drive/..")?.len(), 1);

    let all = doc.select_all(configuration, "*")?;
    assert_eq!(all.len(), 3);
    let sibling = doc.select_single_node(configuration, "../startupDependency/namespace")?;
    assert_eq!(
        sibling.map(|node| doc.text(node)).transpose()?,
        Some("urn:a".to_string())
    );
    Ok(())
}

#[test]
fn absolute_paths_start_at_the_document() -> Result<()> {
    let doc = XmlDocument::parse(CONFIG)?;
    let name = doc
        .select_single_node(doc.root(), "Configuration")?
        .ok_or_else(|| Error::NodeNotFound("Configuration".into()))?;
    let found = doc.select_single_node(name, "/configuration/startupDependency")?;
    assert!(found.is_some());
    assert_eq!(doc.select_single_node(name, "/other")?, None);
    assert_eq!(doc.select_single_node(name, "/..")?, None);
    Ok(())
}

#[test]
fn prefixed_steps_match_qualified_names() -> Result<()> {
    let doc = XmlDocument::parse(CONFIG)?;
    assert!(doc.select_single_node(doc.root(), "Configuration/bus:log")?.is_some());
    assert!(doc.select_single_node(doc.root(), "Configuration/log")?.is_some());
    assert!(doc.select_single_node(doc.root(), "Configuration/x:log")?.is_none());
    Ok(())
}

#[test]
fn names_are_case_sensitive() -> Result<()> {
    let doc = XmlDocument::parse(CONFIG)?;
    assert!(doc.select_single_node(doc.root(), "configuration")?.is_none());
    Ok(())
}

#[test]
fn select_nodes_filters_direct_children_by_local_name() -> Result<()> {
    let doc = XmlDocument::parse(CONFIG)?;
    let configuration = doc
        .select_single_node(doc.root(), "Configuration")?
        .ok_or_else(|| Error::NodeNotFound("Configuration".into()))?;
    assert_eq!(doc.select_nodes(configuration, "drive")?.len(), 2);
    assert_eq!(doc.select_nodes(configuration, "log")?.len(), 1);
    assert_eq!(doc.select_nodes(configuration, "name")?.len(), 0);
    assert_eq!(doc.select_nodes(configuration, "*")?.len(), 3);
    assert!(matches!(
        doc.select_nodes(configuration, "drive/name"),
        Err(Error::InvalidName(_))
    ));
    Ok(())
}

#[test]
fn malformed_paths_are_rejected() -> Result<()> {
    let doc = XmlDocument::parse(CONFIG)?;
    for path in ["", "   ", "/", "a//b", "a/", "1a", "a[0]", "a[x]", "a b", "@id"] {
        match doc.select_single_node(doc.root(), path) {
            Err(Error::InvalidPath(_)) => {}
            other => panic!("{path:?}: expected InvalidPath, got {other:?}"),
        }
    }
    Ok(())
}

#[test]
fn parse_produces_typed_steps() -> Result<()> {
    let path = XmlPath::parse("/a/./../b:c[3]/*")?;
    assert!(path.absolute);
    assert_eq!(
        path.steps,
        vec![
            PathStep::Element {
                test: NameTest::Name("a".into()),
                index: None
            },
            PathStep::Current,
            PathStep::Parent,
            PathStep::Element {
                test: NameTest::Name("b:c".into()),
                index: Some(3)
            },
            PathStep::Element {
                test: NameTest::Any,
                index: None
            },
        ]
    );
    Ok(())
}

#[test]
fn name_grammar_accepts_unicode_letters() -> Result<()> {
    assert!(is_valid_name("größe")?);
    assert!(is_valid_name("_x-1.y")?);
    assert!(is_valid_name("p:local")?);
    assert!(!is_valid_name("p:")?);
    assert!(!is_valid_name("-x")?);
    assert!(!is_valid_name("a:b:c")?);
    Ok(())
}
