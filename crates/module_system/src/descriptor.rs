//! Parsing of library descriptors and latest-version metadata.
//!
//! Both documents are XML. Element lookup ignores namespaces so descriptors
//! with and without the usual `xmlns` declaration parse the same way.

use crate::error::ModuleSystemError;
use roxmltree::{Document, Node};
use std::collections::HashMap;

/// Prefix marking an unresolved `${placeholder}` token.
pub const PLACEHOLDER_PREFIX: &str = "${";

/// The parent declaration of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

/// One `<dependency>` entry of a descriptor, before version resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredDependency {
    pub group: String,
    pub artifact: String,
    pub version: Option<String>,
    pub scope: Option<String>,
    pub optional: bool,
}

impl DeclaredDependency {
    /// Whether this entry is needed at runtime by the declaring library.
    ///
    /// Test-only, non-compile scoped, optional and `junit` entries are not.
    pub fn is_runtime_required(&self) -> bool {
        let compile_scope = matches!(self.scope.as_deref(), None | Some("compile"));
        compile_scope && !self.optional && self.group != "junit"
    }

    /// Whether group or artifact still contain a placeholder token.
    pub fn has_unresolved_coordinate(&self) -> bool {
        self.group.contains(PLACEHOLDER_PREFIX) || self.artifact.contains(PLACEHOLDER_PREFIX)
    }
}

/// The parts of a library descriptor the resolver needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryDescriptor {
    pub parent: Option<ParentRef>,
    pub properties: HashMap<String, String>,
    pub dependencies: Vec<DeclaredDependency>,
}

impl LibraryDescriptor {
    pub fn parse(xml: &str) -> Result<Self, ModuleSystemError> {
        let document = Document::parse(xml)
            .map_err(|e| ModuleSystemError::Descriptor(format!("Failed to parse descriptor: {e}")))?;
        let project = document.root_element();
        if project.tag_name().name() != "project" {
            return Err(ModuleSystemError::Descriptor(format!(
                "Expected <project> root element, found <{}>",
                project.tag_name().name()
            )));
        }

        let parent = child(project, "parent").map(|parent| ParentRef {
            group: child_text(parent, "groupId").unwrap_or_default(),
            artifact: child_text(parent, "artifactId").unwrap_or_default(),
            version: child_text(parent, "version").unwrap_or_default(),
        });

        let properties = child(project, "properties")
            .map(|properties| {
                properties
                    .children()
                    .filter(Node::is_element)
                    .map(|property| {
                        (
                            property.tag_name().name().to_string(),
                            property.text().unwrap_or_default().trim().to_string(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        // Only direct dependencies; <dependencyManagement> entries are not edges.
        let dependencies = child(project, "dependencies")
            .map(|dependencies| {
                dependencies
                    .children()
                    .filter(|node| node.is_element() && node.tag_name().name() == "dependency")
                    .map(|dependency| DeclaredDependency {
                        group: child_text(dependency, "groupId").unwrap_or_default(),
                        artifact: child_text(dependency, "artifactId").unwrap_or_default(),
                        version: child_text(dependency, "version"),
                        scope: child_text(dependency, "scope"),
                        optional: child_text(dependency, "optional")
                            .map(|value| value.eq_ignore_ascii_case("true"))
                            .unwrap_or(false),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            parent,
            properties,
            dependencies,
        })
    }

    /// Resolves a `${name}` version through the declared property table.
    pub fn resolve_placeholder(&self, version: &str) -> Option<String> {
        let name = version
            .trim()
            .strip_prefix(PLACEHOLDER_PREFIX)?
            .strip_suffix('}')?;
        self.properties.get(name).cloned()
    }
}

/// Extracts `versioning.latest` from a latest-version metadata document.
///
/// Returns `Ok(None)` when the document has no such field.
pub fn parse_latest_version(xml: &str) -> Result<Option<String>, ModuleSystemError> {
    let document = Document::parse(xml)
        .map_err(|e| ModuleSystemError::Descriptor(format!("Failed to parse metadata: {e}")))?;
    Ok(child(document.root_element(), "versioning")
        .and_then(|versioning| child_text(versioning, "latest"))
        .filter(|latest| !latest.is_empty()))
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == name)
}

fn child_text(node: Node, name: &str) -> Option<String> {
    child(node, name)
        .and_then(|child| child.text())
        .map(|text| text.trim().to_string())
}
