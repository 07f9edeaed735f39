use std::io;

use log::{debug, info};
use ratatui::prelude::Rect;

use crate::pane::{Pane, Spawner};
use crate::platform::FdSet;
use crate::types::{Divider, FocusDir};

pub const MIN_PANE_DIM: u16 = 2;

/// Arena slot of a node. Slots are recycled, so ids held outside the tree
/// must be dropped when the node is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

pub struct Split {
    pub divider: Divider,
    /// Share of the parent's extent given to `children[0]`.
    pub ratio: f64,
    pub children: [NodeId; 2],
}

pub enum NodeKind {
    Pane(Box<Pane>),
    Split(Split),
}

pub struct Node {
    pub rect: Rect,
    pub parent: Option<NodeId>,
    /// User-visible pane number; 0 for splits.
    pub id: usize,
    pub kind: NodeKind,
}

impl Node {
    pub fn pane(&self) -> Option<&Pane> {
        match &self.kind {
            NodeKind::Pane(p) => Some(p),
            NodeKind::Split(_) => None,
        }
    }

    pub fn split(&self) -> Option<&Split> {
        match &self.kind {
            NodeKind::Split(s) => Some(s),
            NodeKind::Pane(_) => None,
        }
    }
}

/// Child geometries for a split of `rect`. A vertical divider takes one
/// column between the children; a horizontal one costs nothing since the
/// upper child's title bar doubles as the divider.
pub fn split_rects(rect: Rect, divider: Divider, ratio: f64) -> (Rect, Rect) {
    match divider {
        Divider::Vertical => {
            let w0 = ((rect.width as f64 * ratio) as u16).min(rect.width);
            let w1 = rect.width.saturating_sub(w0 + 1);
            (Rect { width: w0, ..rect }, Rect { x: rect.x + w0 + 1, width: w1, ..rect })
        }
        Divider::Horizontal => {
            let h0 = ((rect.height as f64 * ratio) as u16).min(rect.height);
            let h1 = rect.height - h0;
            (Rect { height: h0, ..rect }, Rect { y: rect.y + h0, height: h1, ..rect })
        }
    }
}

fn clamp_ratio(r: f64) -> f64 { r.clamp(0.01, 1.0) }

pub struct Layout {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    pub root: Option<NodeId>,
    pub view_root: Option<NodeId>,
    pub focused: Option<NodeId>,
    pub last_focused: Option<NodeId>,
    /// Host screen area; `view_root` is shaped to it.
    pub screen: Rect,
    pub scrollback: usize,
    pub tabstop: usize,
    /// Descriptors for `select`: stdin plus every pane's pty.
    pub fds: FdSet,
}

impl Layout {
    pub fn new(screen: Rect, scrollback: usize, tabstop: usize) -> Self {
        Layout {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            view_root: None,
            focused: None,
            last_focused: None,
            screen,
            scrollback,
            tabstop,
            fds: FdSet::new(),
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> { self.nodes.get(id.0).and_then(|n| n.as_ref()) }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> { self.nodes.get_mut(id.0).and_then(|n| n.as_mut()) }

    pub fn pane(&self, id: NodeId) -> Option<&Pane> { self.node(id).and_then(|n| n.pane()) }

    pub fn pane_mut(&mut self, id: NodeId) -> Option<&mut Pane> {
        match self.node_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Pane(p)) => Some(p),
            _ => None,
        }
    }

    pub fn focused_pane_mut(&mut self) -> Option<&mut Pane> {
        let f = self.focused?;
        self.pane_mut(f)
    }

    pub fn is_pane(&self, id: NodeId) -> bool { self.pane(id).is_some() }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> { self.node(id).and_then(|n| n.parent) }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Drop a node from the arena, clearing every non-owning reference to it.
    /// Dropping a pane closes its pty master.
    fn release(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        if let Some(fd) = node.pane().and_then(|p| p.pty.raw_fd()) {
            self.fds.remove(fd);
        }
        for r in [&mut self.focused, &mut self.last_focused, &mut self.view_root, &mut self.root] {
            if *r == Some(id) {
                *r = None;
            }
        }
        Some(node)
    }

    fn new_pane(&mut self, spawner: &dyn Spawner, rect: Rect, parent: Option<NodeId>) -> io::Result<NodeId> {
        let id = self.next_id();
        let pty = spawner.spawn(rect.height.saturating_sub(1), rect.width)?;
        let fd = pty.raw_fd();
        let pane = Pane::new(pty, spawner.program(), rect.height, rect.width, self.scrollback, self.tabstop);
        if let Some(fd) = fd {
            self.fds.insert(fd)?;
        }
        info!("spawned pane {id} pid={:?} {}x{}", pane.pid, rect.height.saturating_sub(1), rect.width);
        Ok(self.alloc(Node { rect, parent, id, kind: NodeKind::Pane(Box::new(pane)) }))
    }

    /// Create the first pane, covering the whole screen.
    pub fn bootstrap(&mut self, spawner: &dyn Spawner) -> io::Result<NodeId> {
        if self.screen.height < MIN_PANE_DIM || self.screen.width < MIN_PANE_DIM {
            return Err(io::Error::new(io::ErrorKind::Other, "terminal too small"));
        }
        let root = self.new_pane(spawner, self.screen, None)?;
        self.root = Some(root);
        self.view_root = Some(root);
        self.focus(root);
        Ok(root)
    }

    /// Split pane `target` in two. The new pane becomes the second child of
    /// a split that takes `target`'s place; focus is left alone. On error
    /// the tree is untouched.
    pub fn split(&mut self, target: NodeId, divider: Option<Divider>, ratio: Option<f64>, spawner: &dyn Spawner) -> io::Result<NodeId> {
        let node = self.node(target).filter(|n| n.pane().is_some()).ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "split target is not a pane"))?;
        let rect = node.rect;
        let parent = node.parent;
        let divider = divider.unwrap_or_else(|| {
            parent.and_then(|p| self.node(p)).and_then(|n| n.split()).map_or(Divider::Horizontal, |s| s.divider)
        });
        let ratio = clamp_ratio(ratio.unwrap_or(0.5));
        let (a, b) = split_rects(rect, divider, ratio);
        if a.width < MIN_PANE_DIM || a.height < MIN_PANE_DIM || b.width < MIN_PANE_DIM || b.height < MIN_PANE_DIM {
            return Err(io::Error::new(io::ErrorKind::Other, format!("pane too small to split ({}x{})", rect.height, rect.width)));
        }
        let v = self.new_pane(spawner, rect, None)?;
        let c = self.alloc(Node { rect, parent, id: 0, kind: NodeKind::Split(Split { divider, ratio, children: [target, v] }) });
        self.replace_child(parent, target, c);
        if self.view_root == Some(target) {
            self.view_root = Some(c);
        }
        for child in [target, v] {
            if let Some(n) = self.node_mut(child) {
                n.parent = Some(c);
            }
        }
        debug!("split {:?} with '{}' at {ratio:.2}", target, divider.symbol());
        self.reshape(c, rect);
        Ok(v)
    }

    fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: NodeId) {
        match parent {
            Some(p) => {
                if let Some(NodeKind::Split(s)) = self.node_mut(p).map(|n| &mut n.kind) {
                    for c in s.children.iter_mut() {
                        if *c == old {
                            *c = new;
                        }
                    }
                }
            }
            None => self.root = Some(new),
        }
    }

    /// The split that owns `target`: itself if it is a split, else its parent.
    fn enclosing_split(&self, target: NodeId) -> Option<NodeId> {
        if self.node(target)?.split().is_some() { Some(target) } else { self.parent(target) }
    }

    pub fn reorient(&mut self, target: NodeId) -> bool {
        let Some(s) = self.enclosing_split(target) else { return false };
        match self.node_mut(s).map(|n| &mut n.kind) {
            Some(NodeKind::Split(split)) => split.divider = split.divider.flip(),
            _ => return false,
        }
        self.relayout(s, true);
        true
    }

    /// Set the ratio of `target`'s parent split.
    pub fn resize(&mut self, target: NodeId, ratio: f64) -> bool {
        let Some(p) = self.parent(target) else { return false };
        match self.node_mut(p).map(|n| &mut n.kind) {
            Some(NodeKind::Split(split)) => split.ratio = clamp_ratio(ratio),
            _ => return false,
        }
        self.relayout(p, false);
        true
    }

    /// Give every pane along the split axis an equal share. The region is
    /// the largest run of same-orientation splits around `target`.
    pub fn equalize(&mut self, target: NodeId) -> bool {
        let Some(start) = self.enclosing_split(target) else { return false };
        let Some(divider) = self.node(start).and_then(|n| n.split()).map(|s| s.divider) else { return false };
        let mut top = start;
        while let Some(p) = self.parent(top) {
            match self.node(p).and_then(|n| n.split()) {
                Some(s) if s.divider == divider => top = p,
                _ => break,
            }
        }
        self.assign_equal_ratios(top, divider);
        self.relayout(top, false);
        true
    }

    /// Returns how many units `id` spans along the axis of `divider`.
    fn assign_equal_ratios(&mut self, id: NodeId, divider: Divider) -> usize {
        let children = match self.node(id).and_then(|n| n.split()) {
            Some(s) if s.divider == divider => s.children,
            _ => return 1,
        };
        let left = self.assign_equal_ratios(children[0], divider);
        let right = self.assign_equal_ratios(children[1], divider);
        if let Some(NodeKind::Split(s)) = self.node_mut(id).map(|n| &mut n.kind) {
            s.ratio = left as f64 / (left + right) as f64;
        }
        left + right
    }

    /// Remove a dead or killed pane; its sibling takes over the parent's
    /// area. Reaping the last pane empties the tree.
    pub fn reap(&mut self, leaf: NodeId) {
        if !self.is_pane(leaf) {
            return;
        }
        let Some(node) = self.node(leaf) else { return };
        let pane_id = node.id;
        let Some(parent) = node.parent else {
            info!("pane {pane_id} closed; no panes left");
            self.release(leaf);
            self.root = None;
            self.view_root = None;
            self.focused = None;
            self.last_focused = None;
            return;
        };
        let Some((sibling, grand, prect)) = self.node(parent).and_then(|p| {
            let s = p.split()?;
            let sibling = if s.children[0] == leaf { s.children[1] } else { s.children[0] };
            Some((sibling, p.parent, p.rect))
        }) else { return };
        info!("pane {pane_id} closed");
        let was_focused = self.focused == Some(leaf);
        let view_was_leaf = self.view_root == Some(leaf);
        let view_in_sibling = self.view_root.is_some_and(|v| self.contains(sibling, v));
        if self.view_root == Some(parent) {
            self.view_root = Some(sibling);
        }
        if let Some(n) = self.node_mut(sibling) {
            n.parent = grand;
        }
        self.replace_child(grand, parent, sibling);
        self.release(leaf);
        self.release(parent);
        if view_was_leaf {
            self.view_root = self.root;
        }
        if was_focused {
            self.focus(sibling);
        }
        if view_was_leaf || view_in_sibling || self.view_root == Some(sibling) {
            self.reshape_view();
        } else {
            self.reshape(sibling, prect);
        }
        self.keep_focus_in_view();
    }

    /// Move focus into the view when it has been left outside.
    fn keep_focus_in_view(&mut self) {
        let Some(view) = self.view_root else { return };
        if !self.focused.is_some_and(|f| self.contains(view, f)) {
            self.focus(view);
        }
    }

    /// Lay out `id` in `rect`. Panes whose size is unchanged are left alone.
    pub fn reshape(&mut self, id: NodeId, rect: Rect) { self.reshape_inner(id, rect, false) }

    fn reshape_inner(&mut self, id: NodeId, rect: Rect, force: bool) {
        let rect = Rect { height: rect.height.max(1), width: rect.width.max(1), ..rect };
        let tabstop = self.tabstop;
        let Some(node) = self.node_mut(id) else { return };
        let old = node.rect;
        node.rect = rect;
        let split = match &mut node.kind {
            NodeKind::Pane(p) => {
                let (lines, cols) = (p.screen().lines(), p.screen().cols());
                if force || old != rect || lines != rect.height.saturating_sub(1).max(1) || cols != rect.width {
                    p.resize(rect.height, rect.width, tabstop);
                }
                None
            }
            NodeKind::Split(s) => Some((s.children, s.divider, s.ratio)),
        };
        if let Some(([a, b], divider, ratio)) = split {
            let (ra, rb) = split_rects(rect, divider, ratio);
            self.reshape_inner(a, ra, force);
            self.reshape_inner(b, rb, force);
        }
    }

    /// Shape the zoomed subtree to the screen. Panes outside it keep their
    /// last geometry until the view widens again.
    pub fn reshape_view(&mut self) {
        if let Some(view) = self.view_root {
            let screen = self.screen;
            self.reshape(view, screen);
        }
    }

    /// Re-lay out `id` in its current rect after a ratio or orientation
    /// change. A split above the view only records the change; it takes
    /// effect once the view is widened to include it.
    fn relayout(&mut self, id: NodeId, force: bool) {
        if self.view_root.is_some_and(|v| v != id && self.contains(id, v)) {
            return;
        }
        if let Some(rect) = self.node(id).map(|n| n.rect) {
            self.reshape_inner(id, rect, force);
        }
    }

    /// Host terminal changed size.
    pub fn reshape_root(&mut self, screen: Rect) {
        self.screen = screen;
        self.reshape_view();
    }

    /// Zoom into `target`, keeping focus inside the new view.
    pub fn set_view(&mut self, target: NodeId) {
        if self.node(target).is_none() { return; }
        self.view_root = Some(target);
        self.reshape_view();
        self.keep_focus_in_view();
    }

    /// Leaf under cell `(y, x)` within `from`. Divider cells belong to the
    /// left or upper child.
    pub fn find_by_point(&self, from: NodeId, y: i32, x: i32) -> Option<NodeId> {
        let r = self.node(from)?.rect;
        let inside = y >= r.y as i32 && x >= r.x as i32 && y < (r.y + r.height) as i32 && x < (r.x + r.width) as i32;
        if !inside { return None; }
        let mut id = from;
        loop {
            let s = match &self.node(id)?.kind {
                NodeKind::Pane(_) => return Some(id),
                NodeKind::Split(s) => s,
            };
            let second = self.node(s.children[1])?.rect;
            let upper = match s.divider {
                Divider::Vertical => x >= second.x as i32,
                Divider::Horizontal => y >= second.y as i32,
            };
            id = s.children[upper as usize];
        }
    }

    /// Node with pane number `id`; 0 names the root.
    pub fn find_by_id(&self, id: usize) -> Option<NodeId> {
        if id == 0 {
            return self.root;
        }
        self.leaves().into_iter().find(|&n| self.node(n).is_some_and(|n| n.id == id))
    }

    /// Lowest positive pane number not in use, searched 128 ids at a time.
    pub fn next_id(&self) -> usize {
        let ids: Vec<usize> = self.leaves().into_iter().filter_map(|n| self.node(n).map(|n| n.id)).collect();
        let mut base = 1;
        loop {
            let mut used: u128 = 0;
            for &id in &ids {
                if id >= base && id < base + 128 {
                    used |= 1 << (id - base);
                }
            }
            if used != u128::MAX {
                return base + used.trailing_ones() as usize;
            }
            base += 128;
        }
    }

    /// Focus `id`, or the leftmost pane below it when it is a split.
    pub fn focus(&mut self, id: NodeId) {
        let mut id = id;
        loop {
            match self.node(id).map(|n| &n.kind) {
                Some(NodeKind::Split(s)) => id = s.children[0],
                Some(NodeKind::Pane(_)) => break,
                None => return,
            }
        }
        if self.focused != Some(id) {
            if self.focused.is_some() {
                self.last_focused = self.focused;
            }
            self.focused = Some(id);
        }
    }

    /// Directional moves look one cell past the focused pane's edge, at the
    /// middle of that edge, `count` times.
    pub fn focus_dir(&mut self, dir: FocusDir, count: u32) {
        if dir == FocusDir::Previous {
            if let Some(prev) = self.last_focused {
                self.focus(prev);
            }
            return;
        }
        let Some(view) = self.view_root else { return };
        for _ in 0..count.max(1) {
            let Some(r) = self.focused.and_then(|f| self.node(f)).map(|n| n.rect) else { return };
            let (y, x, h, w) = (r.y as i32, r.x as i32, r.height as i32, r.width as i32);
            let (py, px) = match dir {
                FocusDir::Up => (y - 1, x + w / 2),
                FocusDir::Down => (y + h, x + w / 2),
                FocusDir::Left => (y + h / 2, x - 1),
                FocusDir::Right => (y + h / 2, x + w + 1),
                FocusDir::Previous => return,
            };
            match self.find_by_point(view, py, px) {
                Some(t) => self.focus(t),
                None => break,
            }
        }
    }

    pub fn contains(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.parent(id) {
                Some(p) => id = p,
                None => return false,
            }
        }
    }

    /// Panes below `from` in depth-first order.
    pub fn leaves_from(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            match self.node(id).map(|n| &n.kind) {
                Some(NodeKind::Pane(_)) => out.push(id),
                Some(NodeKind::Split(s)) => {
                    stack.push(s.children[1]);
                    stack.push(s.children[0]);
                }
                None => {}
            }
        }
        out
    }

    pub fn leaves(&self) -> Vec<NodeId> { self.root.map(|r| self.leaves_from(r)).unwrap_or_default() }

    /// One `{rows}x{cols}@{y},{x}({cy},{cx})` entry per pane, focused one
    /// starred, joined by `; `.
    pub fn describe(&self) -> String {
        self.leaves()
            .into_iter()
            .filter_map(|id| {
                let n = self.node(id)?;
                let c = n.pane()?.screen().cursor;
                let star = if self.focused == Some(id) { "*" } else { "" };
                Some(format!("{star}{}x{}@{},{}({},{})", n.rect.height.saturating_sub(1), n.rect.width, n.rect.y, n.rect.x, c.y, c.x))
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pane::fake::FakeSpawner;

    fn layout(spawner: &FakeSpawner) -> Layout {
        let mut l = Layout::new(Rect::new(0, 0, 80, 24), 100, 8);
        l.bootstrap(spawner).unwrap();
        l
    }

    fn check_invariants(l: &Layout) {
        let Some(root) = l.root else {
            assert!(l.focused.is_none());
            return;
        };
        assert!(l.node(root).unwrap().parent.is_none());
        let view = l.view_root.unwrap();
        assert!(l.contains(root, view));
        let mut ids = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let n = l.node(id).unwrap();
            match &n.kind {
                NodeKind::Pane(p) => {
                    assert!(n.id > 0);
                    ids.push(n.id);
                    assert_eq!(p.vt.tabs.len(), n.rect.width as usize);
                    let s = p.screen();
                    assert!(s.off() <= s.tos());
                }
                NodeKind::Split(s) => {
                    assert_eq!(n.id, 0);
                    let a = l.node(s.children[0]).unwrap();
                    let b = l.node(s.children[1]).unwrap();
                    assert_eq!(a.parent, Some(id));
                    assert_eq!(b.parent, Some(id));
                    stack.extend(s.children);
                    // Only the view is guaranteed to be tiled.
                    if !l.contains(view, id) {
                        continue;
                    }
                    match s.divider {
                        Divider::Vertical => {
                            assert_eq!(a.rect.width + 1 + b.rect.width, n.rect.width);
                            assert_eq!(b.rect.x, a.rect.x + a.rect.width + 1);
                            assert_eq!((a.rect.y, a.rect.height), (n.rect.y, n.rect.height));
                            assert_eq!((b.rect.y, b.rect.height), (n.rect.y, n.rect.height));
                        }
                        Divider::Horizontal => {
                            assert_eq!(a.rect.height + b.rect.height, n.rect.height);
                            assert_eq!(b.rect.y, a.rect.y + a.rect.height);
                            assert_eq!((a.rect.x, a.rect.width), (n.rect.x, n.rect.width));
                            assert_eq!((b.rect.x, b.rect.width), (n.rect.x, n.rect.width));
                        }
                    }
                }
            }
        }
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
        assert!(l.focused.map_or(true, |f| l.is_pane(f)));
        assert!(l.last_focused.map_or(true, |f| l.is_pane(f)));
        assert!(l.focused.map_or(true, |f| l.contains(view, f)));
    }

    #[test]
    fn test_bootstrap() {
        let spawner = FakeSpawner::default();
        let l = layout(&spawner);
        assert_eq!(l.describe(), "*23x80@0,0(0,0)");
        assert_eq!(spawner.size(0), (23, 80));
        check_invariants(&l);
    }

    #[test]
    fn test_horizontal_split_then_move_down() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let root = l.root.unwrap();
        l.split(root, None, None, &spawner).unwrap();
        assert_eq!(l.describe(), "*11x80@0,0(0,0); 11x80@12,0(0,0)");
        l.focus_dir(FocusDir::Down, 1);
        assert_eq!(l.describe(), "11x80@0,0(0,0); *11x80@12,0(0,0)");
        check_invariants(&l);
    }

    #[test]
    fn test_nested_vertical_split_and_move_right() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let root = l.root.unwrap();
        let bottom = l.split(root, None, None, &spawner).unwrap();
        l.focus(bottom);
        l.split(bottom, Some(Divider::Vertical), None, &spawner).unwrap();
        assert_eq!(l.describe(), "11x80@0,0(0,0); *11x40@12,0(0,0); 11x39@12,41(0,0)");
        l.focus_dir(FocusDir::Right, 1);
        assert_eq!(l.describe(), "11x80@0,0(0,0); 11x40@12,0(0,0); *11x39@12,41(0,0)");
        l.focus_dir(FocusDir::Left, 1);
        assert_eq!(l.focused, Some(bottom));
        l.focus_dir(FocusDir::Up, 1);
        assert_eq!(l.focused, Some(root));
        check_invariants(&l);
    }

    #[test]
    fn test_split_then_reorient_matches_vertical_split() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let root = l.root.unwrap();
        let bottom = l.split(root, None, None, &spawner).unwrap();
        l.focus(bottom);
        let right = l.split(bottom, None, None, &spawner).unwrap();
        assert!(l.reorient(right));
        assert_eq!(l.describe(), "11x80@0,0(0,0); *11x40@12,0(0,0); 11x39@12,41(0,0)");
        check_invariants(&l);
    }

    #[test]
    fn test_split_inherits_parent_orientation() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let root = l.root.unwrap();
        let right = l.split(root, Some(Divider::Vertical), None, &spawner).unwrap();
        let third = l.split(right, None, None, &spawner).unwrap();
        let parent = l.parent(third).unwrap();
        assert_eq!(l.node(parent).unwrap().split().unwrap().divider, Divider::Vertical);
        check_invariants(&l);
    }

    #[test]
    fn test_split_with_ratio() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let root = l.root.unwrap();
        l.split(root, None, Some(0.25), &spawner).unwrap();
        assert_eq!(l.describe(), "*5x80@0,0(0,0); 17x80@6,0(0,0)");
        check_invariants(&l);
    }

    #[test]
    fn test_split_too_small_leaves_tree_unchanged() {
        let spawner = FakeSpawner::default();
        let mut l = Layout::new(Rect::new(0, 0, 80, 3), 100, 8);
        let root = l.bootstrap(&spawner).unwrap();
        assert!(l.split(root, None, None, &spawner).is_err());
        assert_eq!(l.describe(), "*2x80@0,0(0,0)");
        assert_eq!(spawner.spawned(), 1);
        let mut l = Layout::new(Rect::new(0, 0, 4, 24), 100, 8);
        let root = l.bootstrap(&spawner).unwrap();
        assert!(l.split(root, Some(Divider::Vertical), None, &spawner).is_err());
        check_invariants(&l);
    }

    #[test]
    fn test_spawn_failure_leaves_tree_unchanged() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let root = l.root.unwrap();
        spawner.set_fail(true);
        assert!(l.split(root, None, None, &spawner).is_err());
        assert_eq!(l.describe(), "*23x80@0,0(0,0)");
        assert_eq!(l.root, Some(root));
        check_invariants(&l);
    }

    #[test]
    fn test_split_then_reap_is_identity() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let root = l.root.unwrap();
        let bottom = l.split(root, None, None, &spawner).unwrap();
        l.focus(bottom);
        let right = l.split(bottom, Some(Divider::Vertical), None, &spawner).unwrap();
        let before = l.describe().replace('*', "");
        let extra = l.split(right, None, None, &spawner).unwrap();
        l.focus(extra);
        l.reap(extra);
        assert_eq!(l.describe().replace('*', ""), before);
        assert_eq!(l.focused, Some(right));
        assert_eq!(l.node(right).unwrap().id, 3);
        check_invariants(&l);
    }

    #[test]
    fn test_reap_collapses_to_single_pane() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let root = l.root.unwrap();
        let bottom = l.split(root, None, None, &spawner).unwrap();
        l.focus(bottom);
        l.reap(bottom);
        assert_eq!(l.describe(), "*23x80@0,0(0,0)");
        assert_eq!(l.root, Some(root));
        assert_eq!(l.focused, Some(root));
        l.reap(root);
        assert!(l.root.is_none());
        assert!(l.focused.is_none());
        assert_eq!(l.describe(), "");
    }

    #[test]
    fn test_reap_focus_descends_leftmost() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let root = l.root.unwrap();
        let bottom = l.split(root, None, None, &spawner).unwrap();
        let right = l.split(bottom, Some(Divider::Vertical), None, &spawner).unwrap();
        l.reap(root);
        assert_eq!(l.focused, Some(bottom));
        assert_eq!(l.describe(), "*23x40@0,0(0,0); 23x39@0,41(0,0)");
        assert_eq!(l.parent(right), l.root);
        check_invariants(&l);
    }

    #[test]
    fn test_reorient_involution() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let root = l.root.unwrap();
        l.split(root, None, None, &spawner).unwrap();
        let before = l.describe();
        assert!(l.reorient(root));
        assert_eq!(l.describe(), "*23x40@0,0(0,0); 23x39@0,41(0,0)");
        assert!(l.reorient(root));
        assert_eq!(l.describe(), before);
        check_invariants(&l);
    }

    #[test]
    fn test_reorient_single_pane_is_noop() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let root = l.root.unwrap();
        assert!(!l.reorient(root));
        assert!(!l.resize(root, 0.3));
        assert!(!l.equalize(root));
    }

    #[test]
    fn test_resize_sets_parent_ratio() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let root = l.root.unwrap();
        l.split(root, None, None, &spawner).unwrap();
        assert!(l.resize(root, 0.75));
        assert_eq!(l.describe(), "*17x80@0,0(0,0); 5x80@18,0(0,0)");
        assert!(l.resize(root, 0.0));
        let parent = l.parent(root).unwrap();
        assert_eq!(l.node(parent).unwrap().split().unwrap().ratio, 0.01);
    }

    #[test]
    fn test_equalize_chain() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let a = l.root.unwrap();
        let b = l.split(a, Some(Divider::Vertical), None, &spawner).unwrap();
        let c = l.split(b, None, None, &spawner).unwrap();
        let d = l.split(c, None, None, &spawner).unwrap();
        assert!(l.equalize(d));
        let ratios: Vec<f64> = [a, b, c].iter().map(|&n| l.node(l.parent(n).unwrap()).unwrap().split().unwrap().ratio).collect();
        assert_eq!(ratios, vec![0.25, 1.0 / 3.0, 0.5]);
        let widths: Vec<u16> = [a, b, c, d].iter().map(|&n| l.node(n).unwrap().rect.width).collect();
        assert_eq!(widths, vec![20, 19, 19, 19]);
        let describe = l.describe();
        assert!(l.equalize(a));
        assert_eq!(l.describe(), describe);
        check_invariants(&l);
    }

    #[test]
    fn test_equalize_stops_at_orientation_change() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let a = l.root.unwrap();
        let b = l.split(a, None, Some(0.8), &spawner).unwrap();
        let c = l.split(b, Some(Divider::Vertical), Some(0.2), &spawner).unwrap();
        assert!(l.equalize(c));
        let inner = l.parent(c).unwrap();
        let outer = l.parent(inner).unwrap();
        assert_eq!(l.node(inner).unwrap().split().unwrap().ratio, 0.5);
        assert_eq!(l.node(outer).unwrap().split().unwrap().ratio, 0.8);
    }

    #[test]
    fn test_find_by_point_divider_belongs_left() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let root = l.root.unwrap();
        let right = l.split(root, Some(Divider::Vertical), None, &spawner).unwrap();
        let top = l.root.unwrap();
        assert_eq!(l.find_by_point(top, 5, 40), Some(root));
        assert_eq!(l.find_by_point(top, 5, 41), Some(right));
        assert_eq!(l.find_by_point(top, 5, 80), None);
        assert_eq!(l.find_by_point(top, -1, 3), None);
        assert_eq!(l.find_by_point(top, 24, 3), None);
    }

    #[test]
    fn test_directional_move_with_count_and_edges() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let a = l.root.unwrap();
        let b = l.split(a, Some(Divider::Vertical), None, &spawner).unwrap();
        let c = l.split(b, None, None, &spawner).unwrap();
        let d = l.split(c, None, None, &spawner).unwrap();
        l.focus(a);
        l.focus_dir(FocusDir::Right, 3);
        assert_eq!(l.focused, Some(d));
        l.focus_dir(FocusDir::Right, 1);
        assert_eq!(l.focused, Some(d));
        l.focus_dir(FocusDir::Previous, 1);
        assert_eq!(l.focused, Some(c));
        l.focus_dir(FocusDir::Up, 1);
        assert_eq!(l.focused, Some(c));
        l.focus_dir(FocusDir::Left, 2);
        assert_eq!(l.focused, Some(a));
    }

    #[test]
    fn test_previous_after_free_is_noop() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let a = l.root.unwrap();
        let b = l.split(a, None, None, &spawner).unwrap();
        let c = l.split(b, None, None, &spawner).unwrap();
        l.focus(b);
        l.focus(c);
        assert_eq!(l.last_focused, Some(b));
        l.reap(b);
        assert_eq!(l.last_focused, None);
        l.focus_dir(FocusDir::Previous, 1);
        assert_eq!(l.focused, Some(c));
        check_invariants(&l);
    }

    #[test]
    fn test_ids_are_dense() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let a = l.root.unwrap();
        let b = l.split(a, None, None, &spawner).unwrap();
        let c = l.split(b, None, None, &spawner).unwrap();
        assert_eq!(l.node(c).unwrap().id, 3);
        l.reap(b);
        assert_eq!(l.next_id(), 2);
        let d = l.split(c, None, None, &spawner).unwrap();
        assert_eq!(l.node(d).unwrap().id, 2);
        assert_eq!(l.find_by_id(2), Some(d));
        assert_eq!(l.find_by_id(0), l.root);
        assert_eq!(l.find_by_id(9), None);
    }

    #[test]
    fn test_next_id_crosses_window() {
        let spawner = FakeSpawner::default();
        let mut l = Layout::new(Rect::new(0, 0, 10, 600), 0, 8);
        let first = l.bootstrap(&spawner).unwrap();
        for _ in 0..130 {
            let h = l.node(first).unwrap().rect.height as f64;
            l.split(first, Some(Divider::Horizontal), Some((h - 1.5) / h), &spawner).unwrap();
        }
        assert_eq!(l.leaves().len(), 131);
        assert_eq!(l.next_id(), 132);
        let victim = l.find_by_id(129).unwrap();
        l.reap(victim);
        assert_eq!(l.next_id(), 129);
        check_invariants(&l);
    }

    #[test]
    fn test_view_root_zoom_and_reset() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let root = l.root.unwrap();
        let bottom = l.split(root, None, None, &spawner).unwrap();
        l.focus(bottom);
        let right = l.split(bottom, Some(Divider::Vertical), None, &spawner).unwrap();
        let inner = l.parent(bottom).unwrap();
        l.set_view(inner);
        assert_eq!(l.node(bottom).unwrap().rect, Rect::new(0, 0, 40, 24));
        assert_eq!(l.node(right).unwrap().rect, Rect::new(41, 0, 39, 24));
        l.focus_dir(FocusDir::Up, 1);
        assert_eq!(l.focused, Some(bottom));
        l.set_view(l.root.unwrap());
        assert_eq!(l.node(bottom).unwrap().rect, Rect::new(0, 12, 40, 12));
        check_invariants(&l);
    }

    #[test]
    fn test_reap_inside_view_redirects_view() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let root = l.root.unwrap();
        let bottom = l.split(root, None, None, &spawner).unwrap();
        let right = l.split(bottom, Some(Divider::Vertical), None, &spawner).unwrap();
        let inner = l.parent(bottom).unwrap();
        l.set_view(inner);
        l.reap(right);
        assert_eq!(l.view_root, Some(bottom));
        assert_eq!(l.node(bottom).unwrap().rect, Rect::new(0, 0, 80, 24));
        l.set_view(bottom);
        l.reap(bottom);
        assert_eq!(l.view_root, l.root);
        assert_eq!(l.describe(), "*23x80@0,0(0,0)");
        check_invariants(&l);
    }

    #[test]
    fn test_host_resize_while_zoomed_keeps_view_content() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let a = l.root.unwrap();
        let b = l.split(a, None, None, &spawner).unwrap();
        l.set_view(b);
        assert_eq!(l.focused, Some(b));
        let text = (0..23).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\r\n");
        l.pane_mut(b).unwrap().feed(text.as_bytes());
        let snapshot = |l: &Layout| {
            let s = l.pane(b).unwrap().screen();
            (s.cursor, (0..s.lines()).map(|y| s.live_text(y)).collect::<Vec<_>>())
        };
        let before = snapshot(&l);
        assert_eq!(before.0.y, 22);
        assert_eq!(before.1[0], "line0");
        l.reshape_root(Rect::new(0, 0, 80, 24));
        assert_eq!(snapshot(&l), before);

        l.reshape_root(Rect::new(0, 0, 100, 30));
        assert_eq!(l.node(b).unwrap().rect, Rect::new(0, 0, 100, 30));
        assert_eq!(spawner.size(1), (29, 100));
        assert_eq!(l.node(a).unwrap().rect, Rect::new(0, 0, 80, 12));
        check_invariants(&l);

        l.set_view(l.root.unwrap());
        assert_eq!(l.node(a).unwrap().rect, Rect::new(0, 0, 100, 15));
        assert_eq!(l.node(b).unwrap().rect, Rect::new(0, 15, 100, 15));
        assert_eq!(spawner.size(0), (14, 100));
        check_invariants(&l);
    }

    #[test]
    fn test_reap_keeps_nested_zoom_full_screen() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let a = l.root.unwrap();
        let b = l.split(a, Some(Divider::Vertical), None, &spawner).unwrap();
        let c = l.split(b, Some(Divider::Horizontal), None, &spawner).unwrap();
        let d = l.split(c, Some(Divider::Vertical), None, &spawner).unwrap();
        let right = l.parent(b).unwrap();
        l.set_view(right);
        assert_eq!(l.focused, Some(b));

        l.reap(d);
        assert_eq!(l.view_root, Some(right));
        assert_eq!(l.node(right).unwrap().rect, Rect::new(0, 0, 80, 24));
        assert_eq!(l.node(c).unwrap().rect, Rect::new(0, 12, 80, 12));
        check_invariants(&l);

        let e = l.split(c, Some(Divider::Vertical), None, &spawner).unwrap();
        let inner = l.parent(e).unwrap();
        l.set_view(inner);
        assert_eq!(l.focused, Some(c));
        l.reap(a);
        assert_eq!(l.root, Some(right));
        assert_eq!(l.view_root, Some(inner));
        assert_eq!(l.node(inner).unwrap().rect, Rect::new(0, 0, 80, 24));
        assert_eq!(l.node(c).unwrap().rect, Rect::new(0, 0, 40, 24));
        assert_eq!(spawner.size(2), (23, 40));
        check_invariants(&l);

        l.set_view(right);
        assert_eq!(l.describe(), "11x80@0,0(0,0); *11x40@12,0(0,0); 11x39@12,41(0,0)");
        check_invariants(&l);
    }

    #[test]
    fn test_resize_above_view_waits_for_unzoom() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let a = l.root.unwrap();
        let b = l.split(a, None, None, &spawner).unwrap();
        l.set_view(b);
        assert!(l.resize(b, 0.25));
        assert!(l.reorient(b));
        assert_eq!(l.node(b).unwrap().rect, Rect::new(0, 0, 80, 24));
        assert_eq!(spawner.size(1), (23, 80));
        l.set_view(l.root.unwrap());
        assert_eq!(l.describe(), "23x20@0,0(0,0); *23x59@0,21(0,0)");
        check_invariants(&l);
    }

    #[test]
    fn test_reshape_root_tracks_screen() {
        let spawner = FakeSpawner::default();
        let mut l = layout(&spawner);
        let root = l.root.unwrap();
        l.split(root, Some(Divider::Vertical), None, &spawner).unwrap();
        l.reshape_root(Rect::new(0, 0, 100, 30));
        assert_eq!(l.describe(), "*29x50@0,0(0,0); 29x49@0,51(0,0)");
        assert_eq!(spawner.size(1), (29, 49));
        check_invariants(&l);
    }
}
