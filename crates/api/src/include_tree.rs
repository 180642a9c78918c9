//! Include trees
//!
//! A sparse tree of navigation property names describing which related
//! entities a response should carry. For each child:
//!
//! - `Some(tree)` includes the navigation, restricted to `tree` beneath it
//! - `None` includes the navigation and everything beneath it
//! - an absent key excludes the navigation
//!
//! Keys are matched case-insensitively. Trees are written as comma-separated
//! dotted paths: `"AssignedTo.Company, CaseProducts.Product"`, with `*` as the
//! last segment meaning "everything beneath".

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncludeTree {
    /// Lowercased name -> (declared name, subtree)
    children: BTreeMap<String, (String, Option<IncludeTree>)>,
}

impl IncludeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse comma-separated dotted paths
    pub fn parse(paths: &str) -> Self {
        let mut tree = Self::new();
        for path in paths.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            tree.include(path);
        }
        tree
    }

    /// Include one dotted path, extending existing branches
    pub fn include(&mut self, path: &str) -> &mut Self {
        let segments: Vec<&str> = path
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        self.include_segments(&segments);
        self
    }

    fn include_segments(&mut self, segments: &[&str]) {
        let Some((first, rest)) = segments.split_first() else {
            return;
        };
        if *first == "*" {
            return;
        }
        let key = first.to_lowercase();
        let all_beneath = rest.first() == Some(&"*");
        let entry = self
            .children
            .entry(key)
            .or_insert_with(|| (first.to_string(), Some(IncludeTree::new())));
        if all_beneath {
            entry.1 = None;
            return;
        }
        if let Some(child) = entry.1.as_mut() {
            child.include_segments(rest);
        }
    }

    /// Include `name` and everything beneath it
    pub fn include_all(&mut self, name: &str) -> &mut Self {
        self.children
            .insert(name.to_lowercase(), (name.to_string(), None));
        self
    }

    /// Attach an explicit subtree under `name`
    pub fn with_child(mut self, name: &str, child: Option<IncludeTree>) -> Self {
        self.children
            .insert(name.to_lowercase(), (name.to_string(), child));
        self
    }

    /// `None` when excluded; `Some(None)` when everything beneath is included
    pub fn child(&self, name: &str) -> Option<Option<&IncludeTree>> {
        self.children
            .get(&name.to_lowercase())
            .map(|(_, child)| child.as_ref())
    }

    pub fn is_included(&self, name: &str) -> bool {
        self.children.contains_key(&name.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Declared names of the direct children
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.children.values().map(|(name, _)| name.as_str())
    }

    /// Union of two trees. "Everything beneath" absorbs any restriction.
    pub fn merge(&mut self, other: &IncludeTree) {
        for (key, (name, theirs)) in &other.children {
            match self.children.get_mut(key) {
                None => {
                    self.children
                        .insert(key.clone(), (name.clone(), theirs.clone()));
                }
                Some((_, ours)) => match theirs {
                    None => *ours = None,
                    Some(theirs) => {
                        if let Some(ours) = ours.as_mut() {
                            ours.merge(theirs);
                        }
                    }
                },
            }
        }
    }

    /// Every leaf path, dotted
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (name, child) in self.children.values() {
            match child {
                None => out.push(format!("{}.*", name)),
                Some(tree) if tree.is_empty() => out.push(name.clone()),
                Some(tree) => out.extend(
                    tree.paths()
                        .into_iter()
                        .map(|p| format!("{}.{}", name, p)),
                ),
            }
        }
        out
    }
}

impl fmt::Display for IncludeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.paths().join(", "))
    }
}

// ============================================================================
// IncludeScope
// ============================================================================

/// A position while walking an entity graph under an include tree
#[derive(Debug, Clone, Copy)]
pub enum IncludeScope<'a> {
    Tree(&'a IncludeTree),
    /// Everything beneath this point
    All,
}

impl<'a> IncludeScope<'a> {
    pub fn child(&self, name: &str) -> Option<IncludeScope<'a>> {
        match *self {
            IncludeScope::All => Some(IncludeScope::All),
            IncludeScope::Tree(tree) => tree.child(name).map(|child| match child {
                Some(sub) => IncludeScope::Tree(sub),
                None => IncludeScope::All,
            }),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, IncludeScope::All)
    }
}

impl<'a> From<&'a IncludeTree> for IncludeScope<'a> {
    fn from(tree: &'a IncludeTree) -> Self {
        IncludeScope::Tree(tree)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_nested_paths() {
        let tree = IncludeTree::parse("Case.AssignedTo.Company");
        let case = tree.child("Case").unwrap().unwrap();
        let assigned = case.child("AssignedTo").unwrap().unwrap();
        let company = assigned.child("Company").unwrap().unwrap();
        assert!(company.is_empty());
        assert!(assigned.child("CasesReported").is_none());
        assert_eq!(tree.paths(), vec!["Case.AssignedTo.Company".to_string()]);
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let tree = IncludeTree::parse("assignedto");
        assert!(tree.is_included("AssignedTo"));
        assert!(tree.is_included("ASSIGNEDTO"));
        assert_eq!(tree.names().collect::<Vec<_>>(), vec!["assignedto"]);
    }

    #[test]
    fn test_wildcard_includes_everything_beneath() {
        let tree = IncludeTree::parse("AssignedTo.*, ReportedBy");
        assert_eq!(tree.child("AssignedTo"), Some(None));
        let scope = IncludeScope::from(&tree);
        let assigned = scope.child("AssignedTo").unwrap();
        assert!(assigned.is_all());
        assert!(assigned.child("Company").unwrap().child("Employees").is_some());
        let reported = scope.child("ReportedBy").unwrap();
        assert!(reported.child("Company").is_none());
        assert!(scope.child("CaseProducts").is_none());
    }

    #[test]
    fn test_merge_widens_branches() {
        let mut tree = IncludeTree::parse("AssignedTo.Company, CaseProducts");
        tree.merge(&IncludeTree::parse("AssignedTo.CasesReported, CaseProducts.*, ReportedBy"));
        let assigned = tree.child("AssignedTo").unwrap().unwrap();
        assert!(assigned.is_included("Company"));
        assert!(assigned.is_included("CasesReported"));
        assert_eq!(tree.child("CaseProducts"), Some(None));
        assert!(tree.is_included("ReportedBy"));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let tree = IncludeTree::parse("AssignedTo.Company, CaseProducts.Product, ReportedBy.*");
        let reparsed = IncludeTree::parse(&tree.to_string());
        assert_eq!(tree, reparsed);
    }
}
