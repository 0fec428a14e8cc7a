//! A prefix trie keyed by path components.
//!
//! The mount table stores its entries here so that resolving a path is a
//! single walk down the trie, O(k) in the path depth.

use std::collections::BTreeMap;

use crate::VfsPath;

/// A prefix trie keyed by path components.
///
/// Each node optionally holds a value and has children indexed by component.
///
/// ```rust
/// use gitsalt_vfs::{PathTrie, vpath};
///
/// let mut trie: PathTrie<&str> = PathTrie::new();
/// trie.insert(&vpath!("/"), "root");
/// trie.insert(&vpath!("/grvfs"), "persistent");
///
/// let (value, suffix) = trie.find_ancestor(&vpath!("/grvfs/repo/HEAD")).unwrap();
/// assert_eq!(*value, "persistent");
/// assert_eq!(suffix, vpath!("/repo/HEAD"));
/// ```
#[derive(Debug, Clone)]
pub struct PathTrie<T> {
    value: Option<T>,
    children: BTreeMap<String, PathTrie<T>>,
}

impl<T> Default for PathTrie<T> {
    fn default() -> Self {
        Self {
            value: None,
            children: BTreeMap::new(),
        }
    }
}

impl<T> PathTrie<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create_node(&mut self, path: &VfsPath) -> &mut PathTrie<T> {
        let mut current = self;
        for component in &path.components {
            current = current.children.entry(component.clone()).or_default();
        }
        current
    }

    fn get_node(&self, path: &VfsPath) -> Option<&PathTrie<T>> {
        let mut current = self;
        for component in &path.components {
            current = current.children.get(component)?;
        }
        Some(current)
    }

    fn get_node_mut(&mut self, path: &VfsPath) -> Option<&mut PathTrie<T>> {
        let mut current = self;
        for component in &path.components {
            current = current.children.get_mut(component)?;
        }
        Some(current)
    }

    /// Insert a value at path. Returns previous value if any.
    pub fn insert(&mut self, path: &VfsPath, value: T) -> Option<T> {
        self.get_or_create_node(path).value.replace(value)
    }

    /// Remove and return value at exact path. Children remain, and branches
    /// left without any value are pruned.
    pub fn remove(&mut self, path: &VfsPath) -> Option<T> {
        let removed = self.get_node_mut(path)?.value.take();
        if removed.is_some() {
            self.prune(&path.components);
        }
        removed
    }

    fn prune(&mut self, components: &[String]) -> bool {
        if let Some((first, rest)) = components.split_first() {
            let empty_child = match self.children.get_mut(first) {
                Some(child) => child.prune(rest),
                None => false,
            };
            if empty_child {
                self.children.remove(first);
            }
        }
        self.value.is_none() && self.children.is_empty()
    }

    pub fn get(&self, path: &VfsPath) -> Option<&T> {
        self.get_node(path)?.value.as_ref()
    }

    pub fn get_mut(&mut self, path: &VfsPath) -> Option<&mut T> {
        self.get_node_mut(path)?.value.as_mut()
    }

    /// Count of values in trie (not nodes).
    pub fn len(&self) -> usize {
        let self_count = usize::from(self.value.is_some());
        let children_count: usize = self.children.values().map(PathTrie::len).sum();
        self_count + children_count
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.values().all(PathTrie::is_empty)
    }

    /// Find the deepest ancestor with a value.
    /// Returns (value_ref, remaining_suffix).
    pub fn find_ancestor(&self, path: &VfsPath) -> Option<(&T, VfsPath)> {
        let mut current = self;
        let mut last_value: Option<&T> = self.value.as_ref();
        let mut last_depth: usize = 0;

        for (depth, component) in path.components.iter().enumerate() {
            match current.children.get(component) {
                Some(child) => {
                    current = child;
                    if child.value.is_some() {
                        last_value = child.value.as_ref();
                        last_depth = depth + 1;
                    }
                }
                None => break,
            }
        }

        last_value.map(|v| {
            let suffix = VfsPath {
                components: path.components[last_depth..].to_vec(),
            };
            (v, suffix)
        })
    }

    /// Iterate over all (path, value) pairs in path order.
    pub fn iter(&self) -> PathTrieIter<'_, T> {
        PathTrieIter {
            stack: vec![(VfsPath::root(), self)],
        }
    }
}

/// Iterator over (VfsPath, &T) pairs in a PathTrie.
pub struct PathTrieIter<'a, T> {
    stack: Vec<(VfsPath, &'a PathTrie<T>)>,
}

impl<'a, T> Iterator for PathTrieIter<'a, T> {
    type Item = (VfsPath, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((path, node)) = self.stack.pop() {
            for (name, child) in node.children.iter().rev() {
                let mut components = path.components.clone();
                components.push(name.clone());
                self.stack.push((VfsPath { components }, child));
            }

            if let Some(ref value) = node.value {
                return Some((path, value));
            }
        }
        None
    }
}
