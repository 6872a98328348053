use std::collections::BTreeMap;

/// Character trie over the distinct vocabulary tokens.
#[derive(Debug, Default, Clone)]
pub struct Trie {
    root: TrieNode,
}

#[derive(Debug, Default, Clone)]
struct TrieNode {
    children: BTreeMap<char, TrieNode>,
    leaf: bool,
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: &str) {
        let mut node = &mut self.root;
        for c in token.chars() {
            node = node.children.entry(c).or_default();
        }
        node.leaf = true;
    }

    pub fn contains(&self, token: &str) -> bool {
        self.find(token).is_some_and(|node| node.leaf)
    }

    /// Every inserted token starting with `prefix`, in lexicographic order.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(node) = self.find(prefix) {
            let mut buffer = prefix.to_string();
            collect(node, &mut buffer, &mut out);
        }
        out
    }

    fn find(&self, prefix: &str) -> Option<&TrieNode> {
        prefix
            .chars()
            .try_fold(&self.root, |node, c| node.children.get(&c))
    }
}

fn collect(node: &TrieNode, buffer: &mut String, out: &mut Vec<String>) {
    if node.leaf {
        out.push(buffer.clone());
    }
    for (&c, child) in &node.children {
        buffer.push(c);
        collect(child, buffer, out);
        buffer.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie(tokens: &[&str]) -> Trie {
        let mut trie = Trie::new();
        for token in tokens {
            trie.insert(token);
        }
        trie
    }

    #[test]
    fn prefix_includes_exact_token() {
        let trie = trie(&["abc", "abcd", "xyz"]);

        assert_eq!(trie.with_prefix("abc"), vec!["abc", "abcd"]);
    }

    #[test]
    fn inner_nodes_are_not_tokens() {
        let trie = trie(&["abcd"]);

        assert!(!trie.contains("abc"));
        assert!(trie.contains("abcd"));
        assert_eq!(trie.with_prefix("abc"), vec!["abcd"]);
    }

    #[test]
    fn unknown_prefix_is_empty() {
        let trie = trie(&["abc"]);
        assert!(trie.with_prefix("abd").is_empty());
    }

    #[test]
    fn handles_multibyte_characters() {
        let trie = trie(&["café", "cafés", "cafe"]);
        assert_eq!(trie.with_prefix("caf"), vec!["cafe", "café", "cafés"]);
    }
}
