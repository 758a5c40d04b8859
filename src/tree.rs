//! Project-structure view of the declared manifest.
//!
//! Builds a directory tree from root-relative paths and renders it with
//! box-drawing characters for the artifact header.

use std::cmp::Ordering;
use std::collections::HashSet;

/// The type of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

/// A node in the manifest tree.
#[derive(Debug, Clone)]
pub struct FileNode {
    /// File or directory name (not full path).
    pub name: String,
    /// Root-relative path with `/` separators.
    pub path: String,
    pub kind: NodeKind,
    children: Vec<FileNode>,
}

impl FileNode {
    pub fn directory(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::Directory,
            children: Vec::new(),
        }
    }

    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::File,
            children: Vec::new(),
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn children(&self) -> &[FileNode] {
        &self.children
    }

    pub fn add_child(&mut self, child: FileNode) {
        self.children.push(child);
    }

    /// Find or create the child directory `name`.
    fn directory_mut(&mut self, name: &str, path: &str) -> &mut FileNode {
        let index = match self
            .children
            .iter()
            .position(|c| c.is_directory() && c.name == name)
        {
            Some(index) => index,
            None => {
                self.children.push(FileNode::directory(name, path));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    /// Sort children: directories first, then alphabetically.
    pub fn sort_children(&mut self) {
        self.children.sort_by(|a, b| match (a.kind, b.kind) {
            (NodeKind::Directory, NodeKind::File) => Ordering::Less,
            (NodeKind::File, NodeKind::Directory) => Ordering::Greater,
            _ => a.name.cmp(&b.name),
        });
        for child in &mut self.children {
            child.sort_children();
        }
    }

    pub fn file_count(&self) -> usize {
        match self.kind {
            NodeKind::File => 1,
            NodeKind::Directory => self.children.iter().map(|c| c.file_count()).sum(),
        }
    }
}

/// Build a sorted tree from root-relative `/`-separated paths.
pub fn build_from_paths<'a>(
    root_name: &str,
    paths: impl IntoIterator<Item = &'a str>,
) -> FileNode {
    let mut root = FileNode::directory(root_name, "");

    for path in paths {
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let Some((file_name, dirs)) = parts.split_last() else {
            continue;
        };

        let mut node = &mut root;
        let mut prefix = String::new();
        for dir in dirs {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(dir);
            node = node.directory_mut(dir, &prefix);
        }
        node.add_child(FileNode::file(*file_name, path));
    }

    root.sort_children();
    root
}

/// Options for rendering the tree.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Paths to mark as missing on disk.
    pub missing: HashSet<String>,
}

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const VERTICAL: &str = "│   ";
const SPACE: &str = "    ";

/// Render a tree with box-drawing characters.
///
/// # Examples
///
/// ```
/// use sluice::tree::{build_from_paths, render_tree, RenderOptions};
///
/// let root = build_from_paths("project", ["src/main.rs", "Cargo.toml"]);
/// let output = render_tree(&root, &RenderOptions::default());
/// assert!(output.contains("└── main.rs"));
/// ```
pub fn render_tree(root: &FileNode, options: &RenderOptions) -> String {
    let mut output = String::with_capacity(4096);
    render_node(&mut output, root, "", true, true, options);
    output
}

fn render_node(
    output: &mut String,
    node: &FileNode,
    prefix: &str,
    is_last: bool,
    is_root: bool,
    options: &RenderOptions,
) {
    let branch = if is_root {
        ""
    } else if is_last {
        LAST_BRANCH
    } else {
        BRANCH
    };

    output.push_str(prefix);
    output.push_str(branch);
    output.push_str(&node.name);
    if node.is_directory() {
        output.push('/');
    } else if options.missing.contains(&node.path) {
        output.push_str(" (missing)");
    }
    output.push('\n');

    let child_count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        let new_prefix = if is_root {
            String::new()
        } else {
            let continuation = if is_last { SPACE } else { VERTICAL };
            format!("{}{}", prefix, continuation)
        };
        render_node(output, child, &new_prefix, i == child_count - 1, false, options);
    }
}

/// Format number with thousands separators.
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_groups_directories() {
        let root = build_from_paths(
            "project",
            ["server/index.js", "README.md", "server/graphql/schema.js", "server/config.js"],
        );

        assert_eq!(root.file_count(), 4);
        let names: Vec<&str> = root.children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["server", "README.md"]);

        let server = &root.children()[0];
        let names: Vec<&str> = server.children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["graphql", "config.js", "index.js"]);
        assert_eq!(server.children()[0].path, "server/graphql");
    }

    #[test]
    fn test_render_nested() {
        let root = build_from_paths("project", ["src/lib.rs", "src/main.rs", "Cargo.toml"]);
        let output = render_tree(&root, &RenderOptions::default());

        let expected = "project/\n\
                        ├── src/\n\
                        │   ├── lib.rs\n\
                        │   └── main.rs\n\
                        └── Cargo.toml\n";
        assert_eq!(output, expected);
    }

    #[test]
    fn test_render_marks_missing() {
        let root = build_from_paths("p", ["x.ext", "y.ext"]);
        let options = RenderOptions {
            missing: ["y.ext".to_string()].into_iter().collect(),
        };
        let output = render_tree(&root, &options);
        assert!(output.contains("├── x.ext\n"));
        assert!(output.contains("└── y.ext (missing)\n"));
    }

    #[test]
    fn test_empty_paths_render_root_only() {
        let root = build_from_paths("p", std::iter::empty());
        assert_eq!(render_tree(&root, &RenderOptions::default()), "p/\n");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }
}
