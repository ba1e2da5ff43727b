//! Hierarchical memory accounting.
//!
//! Contexts form a tree. Leaves ([`LocalMemoryContext`]) are owned by exactly
//! one builder or processor and report absolute byte counts; every change is
//! propagated upward as a delta through [`AggregatedMemoryContext`] nodes.
//!
//! Children hold a weak back-reference to their parent that is used only for
//! rollup; parents track children weakly for reporting. Dropping a node
//! subtracts whatever it still holds from its ancestors.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{Result, StrataError};

struct MemoryNode {
    name: String,
    bytes: AtomicU64,
    limit: Option<u64>,
    parent: Option<Weak<MemoryNode>>,
    children: Mutex<Vec<Weak<MemoryNode>>>,
}

impl MemoryNode {
    fn new(name: String, limit: Option<u64>, parent: Option<&Arc<MemoryNode>>) -> Arc<Self> {
        let node = Arc::new(MemoryNode {
            name,
            bytes: AtomicU64::new(0),
            limit,
            parent: parent.map(Arc::downgrade),
            children: Mutex::new(Vec::new()),
        });
        if let Some(parent) = parent {
            let mut children = parent.children.lock();
            children.retain(|child| child.strong_count() > 0);
            children.push(Arc::downgrade(&node));
        }
        node
    }

    fn parent(&self) -> Option<Arc<MemoryNode>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    fn usage(&self) -> MemoryUsage {
        let children = self
            .children
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .map(|child| child.usage())
            .collect();
        MemoryUsage {
            name: self.name.clone(),
            bytes: self.bytes.load(Ordering::Acquire),
            limit: self.limit,
            children,
        }
    }
}

impl Drop for MemoryNode {
    fn drop(&mut self) {
        let bytes = *self.bytes.get_mut();
        if bytes > 0 {
            if let Some(parent) = self.parent() {
                release(&parent, bytes);
            }
        }
    }
}

/// Adds `delta` to `node` and its ancestors, enforcing every limit on the way.
///
/// On failure all partial additions are rolled back.
fn reserve(node: &Arc<MemoryNode>, delta: u64) -> Result<()> {
    let mut current = Some(Arc::clone(node));
    while let Some(n) = current {
        let total = n.bytes.fetch_add(delta, Ordering::AcqRel) + delta;
        if let Some(limit) = n.limit {
            if total > limit {
                n.bytes.fetch_sub(delta, Ordering::AcqRel);
                rollback(node, &n, delta);
                return Err(StrataError::ResourceExceeded {
                    context: n.name.clone(),
                    used: total,
                    limit,
                });
            }
        }
        current = n.parent();
    }
    Ok(())
}

/// Undoes `reserve` for the nodes from `start` up to (excluding) `failed`.
fn rollback(start: &Arc<MemoryNode>, failed: &Arc<MemoryNode>, delta: u64) {
    let mut current = Some(Arc::clone(start));
    while let Some(n) = current {
        if Arc::ptr_eq(&n, failed) {
            return;
        }
        n.bytes.fetch_sub(delta, Ordering::AcqRel);
        current = n.parent();
    }
}

/// Adds `delta` to `node` and its ancestors without checking limits.
fn force_reserve(node: &Arc<MemoryNode>, delta: u64) {
    let mut current = Some(Arc::clone(node));
    while let Some(n) = current {
        n.bytes.fetch_add(delta, Ordering::AcqRel);
        current = n.parent();
    }
}

fn release(node: &Arc<MemoryNode>, delta: u64) {
    let mut current = Some(Arc::clone(node));
    while let Some(n) = current {
        n.bytes.fetch_sub(delta, Ordering::AcqRel);
        current = n.parent();
    }
}

/// Point-in-time snapshot of a context subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryUsage {
    pub name: String,
    pub bytes: u64,
    pub limit: Option<u64>,
    pub children: Vec<MemoryUsage>,
}

/// Interior node of the accounting tree; aggregates everything below it.
///
/// Cloning yields another handle to the same node.
#[derive(Clone)]
pub struct AggregatedMemoryContext {
    node: Arc<MemoryNode>,
}

impl std::fmt::Debug for AggregatedMemoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatedMemoryContext")
            .field("name", &self.node.name)
            .field("bytes", &self.bytes())
            .field("limit", &self.node.limit)
            .finish()
    }
}

impl AggregatedMemoryContext {
    /// Creates an unlimited root context.
    #[must_use]
    pub fn new_root(name: impl Into<String>) -> Self {
        AggregatedMemoryContext {
            node: MemoryNode::new(name.into(), None, None),
        }
    }

    /// Creates a root context that rejects reservations above `limit` bytes.
    #[must_use]
    pub fn new_root_with_limit(name: impl Into<String>, limit: u64) -> Self {
        AggregatedMemoryContext {
            node: MemoryNode::new(name.into(), Some(limit), None),
        }
    }

    /// Creates an aggregated child.
    #[must_use]
    pub fn new_child(&self, name: impl Into<String>) -> Self {
        AggregatedMemoryContext {
            node: MemoryNode::new(name.into(), None, Some(&self.node)),
        }
    }

    /// Creates an aggregated child with its own limit.
    #[must_use]
    pub fn new_child_with_limit(&self, name: impl Into<String>, limit: u64) -> Self {
        AggregatedMemoryContext {
            node: MemoryNode::new(name.into(), Some(limit), Some(&self.node)),
        }
    }

    /// Creates a leaf context owned by a single builder or processor.
    #[must_use]
    pub fn new_local(&self, name: impl Into<String>) -> LocalMemoryContext {
        LocalMemoryContext {
            node: MemoryNode::new(name.into(), None, Some(&self.node)),
        }
    }

    /// Returns the context name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// Returns the total bytes reported by this subtree.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.node.bytes.load(Ordering::Acquire)
    }

    /// Returns the configured limit, if any.
    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        self.node.limit
    }

    /// Returns a snapshot of this subtree.
    #[must_use]
    pub fn usage(&self) -> MemoryUsage {
        self.node.usage()
    }

    /// Returns snapshots of the live direct children.
    #[must_use]
    pub fn children(&self) -> Vec<MemoryUsage> {
        self.node.usage().children
    }
}

/// Leaf of the accounting tree, owned by one writer.
///
/// Byte counts are absolute: reporting the same number twice is a no-op, so
/// re-reporting after a flush never double counts. Dropping the context
/// releases its bytes.
pub struct LocalMemoryContext {
    node: Arc<MemoryNode>,
}

impl std::fmt::Debug for LocalMemoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMemoryContext")
            .field("name", &self.node.name)
            .field("bytes", &self.bytes())
            .finish()
    }
}

impl LocalMemoryContext {
    /// Returns the context name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// Returns the bytes currently reported by this context.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.node.bytes.load(Ordering::Acquire)
    }

    /// Reports `bytes` without checking limits.
    pub fn set_bytes(&mut self, bytes: u64) {
        let current = self.bytes();
        if bytes > current {
            force_reserve(&self.node, bytes - current);
        } else if bytes < current {
            release(&self.node, current - bytes);
        }
    }

    /// Reports `bytes`, failing if any ancestor limit would be exceeded.
    ///
    /// Decreases always succeed. On failure the previous count is kept.
    ///
    /// # Errors
    ///
    /// Returns `ResourceExceeded` naming the context whose limit was hit.
    pub fn try_set_bytes(&mut self, bytes: u64) -> Result<()> {
        let current = self.bytes();
        if bytes > current {
            reserve(&self.node, bytes - current)
        } else {
            if bytes < current {
                release(&self.node, current - bytes);
            }
            Ok(())
        }
    }

    /// Adds `delta` bytes without checking limits.
    pub fn add_bytes(&mut self, delta: u64) {
        force_reserve(&self.node, delta);
    }

    /// Adds `delta` bytes, failing if any ancestor limit would be exceeded.
    ///
    /// # Errors
    ///
    /// Returns `ResourceExceeded` naming the context whose limit was hit.
    pub fn try_add_bytes(&mut self, delta: u64) -> Result<()> {
        reserve(&self.node, delta)
    }

    /// Releases all bytes and detaches the context.
    pub fn close(mut self) {
        self.set_bytes(0);
    }
}

impl Drop for LocalMemoryContext {
    fn drop(&mut self) {
        self.set_bytes(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollup_to_root() {
        let root = AggregatedMemoryContext::new_root("root");
        let worker = root.new_child("worker");
        let mut a = worker.new_local("a");
        let mut b = worker.new_local("b");

        a.set_bytes(100);
        b.set_bytes(50);
        assert_eq!(worker.bytes(), 150);
        assert_eq!(root.bytes(), 150);

        a.set_bytes(30);
        assert_eq!(root.bytes(), 80);

        drop(b);
        assert_eq!(root.bytes(), 30);
        a.close();
        assert_eq!(root.bytes(), 0);
    }

    #[test]
    fn test_set_bytes_is_absolute() {
        let root = AggregatedMemoryContext::new_root("root");
        let mut local = root.new_local("local");
        local.set_bytes(64);
        local.set_bytes(64);
        local.try_set_bytes(64).unwrap();
        assert_eq!(root.bytes(), 64);
    }

    #[test]
    fn test_limit_rolls_back_partial_reservation() {
        let root = AggregatedMemoryContext::new_root_with_limit("root", 100);
        let child = root.new_child("child");
        let mut local = child.new_local("local");

        local.try_set_bytes(60).unwrap();
        let err = local.try_set_bytes(120).unwrap_err();
        assert!(matches!(
            err,
            StrataError::ResourceExceeded { ref context, used: 120, limit: 100 } if context == "root"
        ));
        assert_eq!(local.bytes(), 60);
        assert_eq!(child.bytes(), 60);
        assert_eq!(root.bytes(), 60);

        local.try_set_bytes(10).unwrap();
        assert_eq!(root.bytes(), 10);
    }

    #[test]
    fn test_dropping_aggregated_child_releases_its_share() {
        let root = AggregatedMemoryContext::new_root("root");
        let child = root.new_child("child");
        let mut local = child.new_local("local");
        local.set_bytes(40);
        assert_eq!(root.bytes(), 40);

        drop(child);
        assert_eq!(root.bytes(), 0);
        drop(local);
        assert_eq!(root.bytes(), 0);
    }

    #[test]
    fn test_usage_snapshot() {
        let root = AggregatedMemoryContext::new_root("root");
        let mut local = root.new_local("processor");
        local.set_bytes(8);
        {
            let _short_lived = root.new_local("gone");
        }
        local.add_bytes(2);
        let usage = root.usage();
        assert_eq!(usage.bytes, 10);
        assert_eq!(usage.children.len(), 1);
        assert_eq!(root.children()[0].name, "processor");
    }
}
