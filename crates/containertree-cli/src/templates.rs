//! Built-in visualization templates. Each renders the `data.json` written
//! next to it.

/// Template used when `--template` is not given.
pub const DEFAULT_TEMPLATE: &str = "files_tree";

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct Template {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    pub html: &'static str,
}

pub const TEMPLATES: [Template; 2] = [
    Template {
        name: "files_tree",
        description: "Collapsible d3 tree of the filesystem",
        html: include_str!("../templates/files_tree.html"),
    },
    Template {
        name: "files_list",
        description: "Nested plain list with file sizes",
        html: include_str!("../templates/files_list.html"),
    },
];

#[must_use]
pub fn find(name: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.name == name)
}
