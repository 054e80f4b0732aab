use std::collections::BTreeMap;

use rustyline::completion::{Completer, Pair};
use rustyline::{Context, Helper, Highlighter, Hinter, Validator};

use crate::shell::executor::BUILTINS;
use crate::utils::path::list_executables;

/// 按字符建的前缀树
#[derive(Debug, Default)]
pub struct Trie {
    children: BTreeMap<char, Trie>,
    is_end: bool,
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, word: &str) {
        let mut node = self;
        for c in word.chars() {
            node = node.children.entry(c).or_default();
        }
        node.is_end = true;
    }

    #[cfg(test)]
    pub fn contains(&self, word: &str) -> bool {
        self.walk(word).map(|node| node.is_end).unwrap_or(false)
    }

    fn walk(&self, prefix: &str) -> Option<&Trie> {
        let mut node = self;
        for c in prefix.chars() {
            node = node.children.get(&c)?;
        }
        Some(node)
    }

    /// 所有以 prefix 开头的词，按字典序
    pub fn find_completion(&self, prefix: &str) -> Vec<String> {
        let mut found = Vec::new();
        if let Some(node) = self.walk(prefix) {
            node.collect(&mut prefix.to_string(), &mut found);
        }
        found
    }

    fn collect(&self, current: &mut String, found: &mut Vec<String>) {
        if self.is_end {
            found.push(current.clone());
        }
        for (c, child) in &self.children {
            current.push(*c);
            child.collect(current, found);
            current.pop();
        }
    }
}

/// 命令名补全：内建命令加上 PATH 里的可执行文件
#[derive(Helper, Hinter, Highlighter, Validator)]
pub struct CommandCompleter {
    trie: Trie,
}

impl CommandCompleter {
    pub fn new() -> Self {
        let mut trie = Trie::new();
        for name in BUILTINS.names() {
            trie.insert(name);
        }
        for name in list_executables() {
            trie.insert(&name);
        }
        Self { trie }
    }

    fn candidates(&self, line: &str, pos: usize) -> Option<(usize, Vec<Pair>)> {
        let head = line.get(..pos)?;
        // 只补全第一个词
        if head.trim_start().contains(char::is_whitespace) {
            return None;
        }
        let start = head.len() - head.trim_start().len();
        let prefix = &head[start..];
        if prefix.is_empty() {
            return None;
        }

        let matches = self.trie.find_completion(prefix);
        let pairs = if matches.len() == 1 {
            vec![Pair {
                display: matches[0].clone(),
                replacement: format!("{} ", matches[0]),
            }]
        } else {
            matches
                .into_iter()
                .map(|name| Pair {
                    display: name.clone(),
                    replacement: name,
                })
                .collect()
        };
        Some((start, pairs))
    }
}

impl Default for CommandCompleter {
    fn default() -> Self {
        Self::new()
    }
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(self.candidates(line, pos).unwrap_or((pos, Vec::new())))
    }
}
