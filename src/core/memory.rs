//! Purpose: In-process tree engine for tests, demos, and hosts without libaugeas.
//! Exports: `MemoryEngine`, `MemorySession`, `SNAPSHOT_FILE`.
//! Role: Implements the `Engine`/`Session` contract over a plain labelled tree.
//! Invariants: Paths are absolute `/`-separated steps: `label`, `*`, `label[n]`, `label[last()]`.
//! Invariants: Return codes follow the engine convention documented on `Session`.
//! Invariants: Persistence is a JSON snapshot at `<root>/augbridge-tree.json`.
use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::engine::{Engine, InitFlags, RawSpan, Session};

pub const SNAPSHOT_FILE: &str = "augbridge-tree.json";

#[derive(Clone, Debug, Default)]
pub struct MemoryEngine {
    opened: u64,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions handed out so far.
    pub fn opened(&self) -> u64 {
        self.opened
    }
}

impl Engine for MemoryEngine {
    type Session = MemorySession;

    fn init(&mut self, root: &str, loadpath: Option<&str>, flags: InitFlags) -> Option<MemorySession> {
        let root_dir = PathBuf::from(root);
        if !root_dir.is_dir() {
            tracing::warn!(root, "memory engine root is not a directory");
            return None;
        }
        let mut session = MemorySession {
            root_dir,
            loadpath: loadpath.map(str::to_string),
            flags,
            tree: Node::default(),
            last_error: RefCell::new(None),
        };
        if !flags.contains(InitFlags::NO_LOAD) && session.load() != 0 {
            tracing::warn!(root, "memory engine could not load snapshot");
            return None;
        }
        self.opened += 1;
        Some(session)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Node {
    #[serde(default)]
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<Node>,
    #[serde(skip)]
    span: Option<RawSpan>,
}

impl Node {
    fn labelled(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Self::default()
        }
    }

    fn subtree_size(&self) -> usize {
        1 + self.children.iter().map(Node::subtree_size).sum::<usize>()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Position {
    Nth(usize),
    Last,
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct Step {
    // `None` is the `*` wildcard.
    label: Option<String>,
    position: Option<Position>,
}

type Addr = Vec<usize>;

fn parse_path(path: &str) -> Result<Vec<Step>, String> {
    let Some(rest) = path.strip_prefix('/') else {
        return Err(format!("path must be absolute: {path}"));
    };
    let steps = parse_steps(rest)?;
    if steps.is_empty() {
        return Err("path must name at least one node".to_string());
    }
    Ok(steps)
}

fn parse_relative(sub: &str) -> Result<Vec<Step>, String> {
    if sub.is_empty() || sub == "." {
        return Ok(Vec::new());
    }
    if sub.starts_with('/') {
        return Err(format!("sub expression must be relative: {sub}"));
    }
    parse_steps(sub)
}

fn parse_steps(text: &str) -> Result<Vec<Step>, String> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split('/').map(parse_step).collect()
}

fn parse_step(segment: &str) -> Result<Step, String> {
    let (name, position) = match segment.find('[') {
        Some(open) => {
            let predicate = segment[open + 1..]
                .strip_suffix(']')
                .ok_or_else(|| format!("unterminated predicate in `{segment}`"))?;
            let position = match predicate {
                "last()" => Position::Last,
                digits => match digits.parse::<usize>() {
                    Ok(n) if n > 0 => Position::Nth(n),
                    _ => return Err(format!("unsupported predicate `[{predicate}]`")),
                },
            };
            (&segment[..open], Some(position))
        }
        None => (segment, None),
    };
    if name.is_empty() {
        return Err("empty path step".to_string());
    }
    if name.contains(']') {
        return Err(format!("stray `]` in `{segment}`"));
    }
    let label = if name == "*" {
        None
    } else {
        Some(name.to_string())
    };
    Ok(Step { label, position })
}

fn valid_label(label: &str) -> bool {
    !label.is_empty() && label != "*" && !label.contains(['/', '[', ']'])
}

#[derive(Debug)]
pub struct MemorySession {
    root_dir: PathBuf,
    loadpath: Option<String>,
    flags: InitFlags,
    tree: Node,
    last_error: RefCell<Option<String>>,
}

impl MemorySession {
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn loadpath(&self) -> Option<&str> {
        self.loadpath.as_deref()
    }

    pub fn flags(&self) -> InitFlags {
        self.flags
    }

    /// Record file position data for the single node matching `path`.
    ///
    /// Hosts that import trees from files use this so `span` can answer.
    pub fn attach_span(&mut self, path: &str, span: RawSpan) -> bool {
        let Ok(steps) = parse_path(path) else {
            return false;
        };
        match self.resolve(&[], &steps).as_slice() {
            [addr] => {
                let addr = addr.clone();
                self.node_mut(&addr).span = Some(span);
                true
            }
            _ => false,
        }
    }

    fn fail(&self, message: impl Into<String>) {
        *self.last_error.borrow_mut() = Some(message.into());
    }

    fn clear_error(&self) {
        *self.last_error.borrow_mut() = None;
    }

    fn snapshot_path(&self) -> PathBuf {
        self.root_dir.join(SNAPSHOT_FILE)
    }

    fn node(&self, addr: &[usize]) -> &Node {
        addr.iter().fold(&self.tree, |node, idx| &node.children[*idx])
    }

    fn node_mut(&mut self, addr: &[usize]) -> &mut Node {
        addr.iter()
            .fold(&mut self.tree, |node, idx| &mut node.children[*idx])
    }

    fn resolve(&self, origin: &[usize], steps: &[Step]) -> Vec<Addr> {
        let mut current: Vec<Addr> = vec![origin.to_vec()];
        for step in steps {
            let mut next = Vec::new();
            for addr in &current {
                let candidates = self.children_matching(addr, step);
                let picked: Vec<usize> = match step.position {
                    None => candidates,
                    Some(Position::Nth(n)) => candidates.get(n - 1).copied().into_iter().collect(),
                    Some(Position::Last) => candidates.last().copied().into_iter().collect(),
                };
                for idx in picked {
                    let mut child = addr.clone();
                    child.push(idx);
                    next.push(child);
                }
            }
            current = next;
        }
        current
    }

    fn children_matching(&self, addr: &[usize], step: &Step) -> Vec<usize> {
        self.node(addr)
            .children
            .iter()
            .enumerate()
            .filter(|(_, child)| step.label.as_ref().is_none_or(|label| *label == child.label))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Walk `steps` from `origin`, creating plain-label steps that match nothing.
    /// Nothing is created unless every missing step can be.
    fn ensure(&mut self, origin: &[usize], steps: &[Step]) -> Result<Addr, String> {
        let mut addr = origin.to_vec();
        let mut remaining = steps;
        while let Some((step, rest)) = remaining.split_first() {
            let found = self.resolve(&addr, std::slice::from_ref(step));
            match found.as_slice() {
                [only] => {
                    addr = only.clone();
                    remaining = rest;
                }
                [] => break,
                _ => return Err("path step matches multiple nodes".to_string()),
            }
        }

        let mut labels = Vec::with_capacity(remaining.len());
        for step in remaining {
            match (&step.label, step.position) {
                (Some(label), None) => labels.push(label.clone()),
                _ => {
                    return Err("cannot create node for wildcard or positional step".to_string());
                }
            }
        }
        for label in labels {
            let parent = self.node_mut(&addr);
            parent.children.push(Node::labelled(&label));
            addr.push(parent.children.len() - 1);
        }
        Ok(addr)
    }

    fn canonical_path(&self, addr: &[usize]) -> String {
        let mut out = String::new();
        let mut node = &self.tree;
        for idx in addr {
            let child = &node.children[*idx];
            let same: Vec<usize> = node
                .children
                .iter()
                .enumerate()
                .filter(|(_, sibling)| sibling.label == child.label)
                .map(|(pos, _)| pos)
                .collect();
            out.push('/');
            out.push_str(&child.label);
            if same.len() > 1 {
                let position = same.iter().take_while(|pos| **pos <= *idx).count();
                out.push_str(&format!("[{position}]"));
            }
            node = child;
        }
        out
    }

    fn matched(&self, path: &str) -> Result<Vec<Addr>, ()> {
        match parse_path(path) {
            Ok(steps) => Ok(self.resolve(&[], &steps)),
            Err(message) => {
                self.fail(message);
                Err(())
            }
        }
    }

    fn read_snapshot(&self) -> io::Result<Option<Node>> {
        match fs::read(self.snapshot_path()) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl Session for MemorySession {
    fn close(self) {
        tracing::debug!(root = %self.root_dir.display(), "memory session closed");
    }

    fn save(&mut self) -> i32 {
        self.clear_error();
        if self.flags.contains(InitFlags::SAVE_NOOP) {
            return 0;
        }
        let encoded = match serde_json::to_vec_pretty(&self.tree) {
            Ok(encoded) => encoded,
            Err(err) => {
                self.fail(format!("failed to encode tree: {err}"));
                return -1;
            }
        };
        match fs::write(self.snapshot_path(), encoded) {
            Ok(()) => 0,
            Err(err) => {
                self.fail(format!("failed to write {}: {err}", self.snapshot_path().display()));
                -1
            }
        }
    }

    fn load(&mut self) -> i32 {
        self.clear_error();
        match self.read_snapshot() {
            Ok(tree) => {
                self.tree = tree.unwrap_or_default();
                0
            }
            Err(err) => {
                self.fail(format!("failed to read {}: {err}", self.snapshot_path().display()));
                -1
            }
        }
    }

    fn get(&self, path: &str) -> (i32, Option<String>) {
        self.clear_error();
        let Ok(found) = self.matched(path) else {
            return (-1, None);
        };
        match found.as_slice() {
            [] => (0, None),
            [addr] => (1, self.node(addr).value.clone()),
            _ => {
                self.fail(format!("{} nodes match {path}", found.len()));
                (-1, None)
            }
        }
    }

    fn set(&mut self, path: &str, value: Option<&str>) -> i32 {
        self.clear_error();
        let steps = match parse_path(path) {
            Ok(steps) => steps,
            Err(message) => {
                self.fail(message);
                return -1;
            }
        };
        let found = self.resolve(&[], &steps);
        let addr = match found.as_slice() {
            [addr] => addr.clone(),
            [] => match self.ensure(&[], &steps) {
                Ok(addr) => addr,
                Err(message) => {
                    self.fail(message);
                    return -1;
                }
            },
            _ => {
                self.fail(format!("{} nodes match {path}", found.len()));
                return -1;
            }
        };
        self.node_mut(&addr).value = value.map(str::to_string);
        0
    }

    fn setm(&mut self, base: &str, sub: Option<&str>, value: &str) -> i32 {
        self.clear_error();
        let base_steps = match parse_path(base) {
            Ok(steps) => steps,
            Err(message) => {
                self.fail(message);
                return -1;
            }
        };
        let sub_steps = match parse_relative(sub.unwrap_or(".")) {
            Ok(steps) => steps,
            Err(message) => {
                self.fail(message);
                return -1;
            }
        };
        let mut changed = 0usize;
        for base_addr in self.resolve(&[], &base_steps) {
            let mut targets = self.resolve(&base_addr, &sub_steps);
            if targets.is_empty() {
                match self.ensure(&base_addr, &sub_steps) {
                    Ok(addr) => targets.push(addr),
                    Err(message) => {
                        self.fail(message);
                        return -1;
                    }
                }
            }
            for addr in &targets {
                self.node_mut(addr).value = Some(value.to_string());
            }
            changed += targets.len();
        }
        i32::try_from(changed).unwrap_or(i32::MAX)
    }

    fn insert(&mut self, path: &str, label: &str, before: bool) -> i32 {
        self.clear_error();
        if !valid_label(label) {
            self.fail(format!("invalid label `{label}`"));
            return -1;
        }
        let Ok(found) = self.matched(path) else {
            return -1;
        };
        let [addr] = found.as_slice() else {
            self.fail(format!("insert needs exactly one node, {} match {path}", found.len()));
            return -1;
        };
        let (parent, idx) = addr.split_at(addr.len() - 1);
        let at = if before { idx[0] } else { idx[0] + 1 };
        self.node_mut(parent).children.insert(at, Node::labelled(label));
        0
    }

    fn mv(&mut self, src: &str, dst: &str) -> i32 {
        self.clear_error();
        let Ok(found) = self.matched(src) else {
            return -1;
        };
        let [src_addr] = found.as_slice() else {
            self.fail(format!("move source must match one node, {} match {src}", found.len()));
            return -1;
        };
        let src_addr = src_addr.clone();
        let dst_steps = match parse_path(dst) {
            Ok(steps) => steps,
            Err(message) => {
                self.fail(message);
                return -1;
            }
        };

        let before = self.tree.clone();
        let dst_found = self.resolve(&[], &dst_steps);
        let dst_addr = match dst_found.as_slice() {
            [addr] => addr.clone(),
            [] => match self.ensure(&[], &dst_steps) {
                Ok(addr) => addr,
                Err(message) => {
                    self.fail(message);
                    return -1;
                }
            },
            _ => {
                self.fail(format!("{} nodes match destination {dst}", dst_found.len()));
                return -1;
            }
        };
        if dst_addr.starts_with(&src_addr) {
            self.tree = before;
            self.fail(format!("cannot move {src} into its own subtree"));
            return -1;
        }
        // Replacing an ancestor would drop the source from under its own parent.
        if src_addr.starts_with(&dst_addr) {
            self.tree = before;
            self.fail(format!("cannot move {src} onto its ancestor {dst}"));
            return -1;
        }

        let moved = self.node(&src_addr).clone();
        let target = self.node_mut(&dst_addr);
        target.value = moved.value;
        target.children = moved.children;
        target.span = None;
        let (parent, idx) = src_addr.split_at(src_addr.len() - 1);
        self.node_mut(parent).children.remove(idx[0]);
        0
    }

    fn rm(&mut self, path: &str) -> i32 {
        self.clear_error();
        let Ok(mut found) = self.matched(path) else {
            return -1;
        };
        found.sort_unstable();
        let mut roots: Vec<Addr> = Vec::new();
        for addr in found {
            if !roots.iter().any(|root| addr.starts_with(root)) {
                roots.push(addr);
            }
        }
        let removed: usize = roots
            .iter()
            .map(|addr| self.node(addr).subtree_size())
            .sum();
        for addr in roots.iter().rev() {
            let (parent, idx) = addr.split_at(addr.len() - 1);
            self.node_mut(parent).children.remove(idx[0]);
        }
        i32::try_from(removed).unwrap_or(i32::MAX)
    }

    fn rename(&mut self, src: &str, label: &str) -> i32 {
        self.clear_error();
        if !valid_label(label) {
            self.fail(format!("invalid label `{label}`"));
            return -1;
        }
        let Ok(found) = self.matched(src) else {
            return -1;
        };
        for addr in &found {
            self.node_mut(addr).label = label.to_string();
        }
        i32::try_from(found.len()).unwrap_or(i32::MAX)
    }

    fn matches(&self, path: &str) -> (i32, Vec<String>) {
        self.clear_error();
        let Ok(found) = self.matched(path) else {
            return (-1, Vec::new());
        };
        let paths: Vec<String> = found.iter().map(|addr| self.canonical_path(addr)).collect();
        (i32::try_from(paths.len()).unwrap_or(i32::MAX), paths)
    }

    fn span(&self, path: &str) -> (i32, Option<RawSpan>) {
        self.clear_error();
        let Ok(found) = self.matched(path) else {
            return (-1, None);
        };
        match found.as_slice() {
            [addr] => match &self.node(addr).span {
                Some(span) => (0, Some(span.clone())),
                None => {
                    self.fail(format!("no span info for {path}"));
                    (-1, None)
                }
            },
            _ => {
                self.fail(format!("span needs exactly one node, {} match {path}", found.len()));
                (-1, None)
            }
        }
    }

    fn error_message(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }
}
