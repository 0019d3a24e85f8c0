use generational_arena::{Arena, Index};
use itertools::Itertools;
use tracing::instrument;

use crate::errors::{SceneError, SceneResult};
use crate::node::{SceneNode, Slot};

/// Arena-based scene tree for branching narratives.
///
/// Owns every `SceneNode` in a generational arena, plus a cursor marking the
/// scene currently being edited. The cursor is the implicit target of
/// insertions and removals. `scene_count` only ever grows; it is the source
/// of scene ids, so ids stay unique even after removals.
#[derive(Debug)]
pub struct SceneTree {
    arena: Arena<SceneNode>,
    root: Option<Index>,
    cursor: Option<Index>,
    scene_count: u32,
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneTree {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
            cursor: None,
            scene_count: 0,
        }
    }

    pub fn root(&self) -> Option<Index> {
        self.root
    }

    pub fn cursor(&self) -> Option<Index> {
        self.cursor
    }

    /// Total scenes ever created, also the last id handed out.
    pub fn scene_count(&self) -> u32 {
        self.scene_count
    }

    pub fn get(&self, idx: Index) -> Option<&SceneNode> {
        self.arena.get(idx)
    }

    pub fn get_mut(&mut self, idx: Index) -> Option<&mut SceneNode> {
        self.arena.get_mut(idx)
    }

    pub fn cursor_node(&self) -> Option<&SceneNode> {
        self.cursor.and_then(|idx| self.arena.get(idx))
    }

    /// Creates a new scene under the cursor and returns its id.
    ///
    /// The first scene ever added becomes the root and the cursor. Later
    /// scenes take the leftmost empty slot of the cursor; if the cursor
    /// already has three children the tree is left untouched.
    #[instrument(level = "debug", skip(self, description))]
    pub fn add_scene(&mut self, title: &str, description: &str) -> SceneResult<u32> {
        let Some(cursor) = self.cursor else {
            self.scene_count += 1;
            let id = self.scene_count;
            let idx = self.arena.insert(SceneNode::new(id, title, description));
            self.root = Some(idx);
            self.cursor = Some(idx);
            return Ok(id);
        };

        let cursor_node = self
            .arena
            .get(cursor)
            .ok_or_else(|| SceneError::NoSuchNode("cursor scene no longer exists".to_string()))?;
        if cursor_node.is_full() {
            return Err(SceneError::FullScene(format!(
                "scene {} already has three children",
                cursor_node.display_name()
            )));
        }

        self.scene_count += 1;
        let id = self.scene_count;
        let idx = self.arena.insert(SceneNode::new(id, title, description));
        if let Some(node) = self.arena.get_mut(cursor) {
            node.append_child(idx)?;
        }
        Ok(id)
    }

    /// Removes the cursor's child at `slot`, along with the child's whole
    /// subtree. After removing slot A or B the remaining children are shifted
    /// left by a single pass; removing C never shifts.
    #[instrument(level = "debug", skip(self))]
    pub fn remove_child(&mut self, slot: Slot) -> SceneResult<()> {
        let cursor = self
            .cursor
            .ok_or_else(|| SceneError::NoSuchNode("the tree has no scenes yet".to_string()))?;
        let child = self
            .arena
            .get(cursor)
            .and_then(|node| node.slot(slot))
            .ok_or_else(|| {
                SceneError::NoSuchNode(format!("no child at option {} to remove", slot))
            })?;

        if let Some(node) = self.arena.get_mut(cursor) {
            node.set_slot(slot, None);
        }
        self.free_subtree(child);
        if slot != Slot::C {
            self.shift_children(cursor);
        }
        Ok(())
    }

    /// Single left-shift pass: runs only when slot A is empty and slot B is
    /// occupied. A removal of B with A still occupied leaves the gap in
    /// place; forward navigation papers over it via the dense child view.
    fn shift_children(&mut self, parent: Index) {
        if let Some(node) = self.arena.get_mut(parent) {
            if node.slot(Slot::A).is_none() && node.slot(Slot::B).is_some() {
                node.set_slot(Slot::A, node.slot(Slot::B));
                node.set_slot(Slot::B, node.slot(Slot::C));
                node.set_slot(Slot::C, None);
            }
        }
    }

    /// Frees `start` and everything below it from the arena.
    fn free_subtree(&mut self, start: Index) {
        let mut stack = vec![start];
        let mut doomed = Vec::new();
        while let Some(idx) = stack.pop() {
            if let Some(node) = self.arena.get(idx) {
                stack.extend(node.children());
                doomed.push(idx);
            }
        }
        for idx in doomed {
            self.arena.remove(idx);
        }
    }

    /// Moves the cursor to its parent, located by a whole-tree search.
    #[instrument(level = "debug", skip(self))]
    pub fn move_cursor_back(&mut self) -> SceneResult<()> {
        let cursor = self
            .cursor
            .ok_or_else(|| SceneError::NoSuchNode("the tree has no scenes yet".to_string()))?;
        if Some(cursor) == self.root {
            return Err(SceneError::NoSuchNode(
                "already at the root; no parent exists".to_string(),
            ));
        }
        let parent = self
            .find_parent(cursor)
            .ok_or_else(|| SceneError::NoSuchNode("parent not found".to_string()))?;
        self.cursor = Some(parent);
        Ok(())
    }

    /// Moves the cursor to one of its children.
    ///
    /// The option letter indexes the *occupied* slots in order (A is the
    /// first occupied child, B the second, C the third), not the raw storage
    /// slots. After a removal left a gap at B, option "B" therefore selects
    /// the child stored in slot C.
    #[instrument(level = "debug", skip(self))]
    pub fn move_cursor_forward(&mut self, option: Slot) -> SceneResult<()> {
        let cursor = self
            .cursor
            .ok_or_else(|| SceneError::NoSuchNode("the tree has no scenes yet".to_string()))?;
        let options: Vec<Index> = self
            .arena
            .get(cursor)
            .map(|node| node.children().collect())
            .unwrap_or_default();
        if options.is_empty() {
            return Err(SceneError::NoSuchNode("no children available".to_string()));
        }
        let next = options.get(option.index()).copied().ok_or_else(|| {
            SceneError::NoSuchNode(format!("option {} does not exist", option))
        })?;
        self.cursor = Some(next);
        Ok(())
    }

    /// Relocates the cursor's subtree to become a child of the scene with
    /// `target_id`. The cursor keeps pointing at the moved scene.
    ///
    /// All checks run before any mutation: a rejected move leaves the tree
    /// exactly as it was. Unlike `remove_child`, detaching here performs no
    /// sibling shift. Moving a scene beneath itself is rejected outright,
    /// it would cut the subtree loose from the root.
    #[instrument(level = "debug", skip(self))]
    pub fn move_scene(&mut self, target_id: u32) -> SceneResult<()> {
        let cursor = self
            .cursor
            .ok_or_else(|| SceneError::NoSuchNode("the tree has no scenes yet".to_string()))?;
        if Some(cursor) == self.root {
            return Err(SceneError::NoSuchNode(
                "cannot move the root scene".to_string(),
            ));
        }
        let parent = self.find_parent(cursor).ok_or_else(|| {
            SceneError::NoSuchNode("could not find parent of the current scene".to_string())
        })?;
        let target = self.find_by_id(target_id).ok_or_else(|| {
            SceneError::NoSuchNode(format!("no scene with ID {} found", target_id))
        })?;
        if self.is_in_subtree(target, cursor) {
            return Err(SceneError::NoSuchNode(format!(
                "scene #{} lies within the scene being moved",
                target_id
            )));
        }
        let target_node = self
            .arena
            .get(target)
            .ok_or_else(|| SceneError::NoSuchNode("target scene no longer exists".to_string()))?;
        if target_node.is_full() {
            return Err(SceneError::FullScene(format!(
                "scene {} already has three children",
                target_node.display_name()
            )));
        }

        if let Some(parent_node) = self.arena.get_mut(parent) {
            for slot in Slot::ALL {
                if parent_node.slot(slot) == Some(cursor) {
                    parent_node.set_slot(slot, None);
                    break;
                }
            }
        }
        if let Some(target_node) = self.arena.get_mut(target) {
            target_node.append_child(cursor)?;
        }
        Ok(())
    }

    /// Titles along the unique root-to-cursor path, inclusive.
    /// Empty when the tree has no scenes.
    #[instrument(level = "debug", skip(self))]
    pub fn path_from_root(&self) -> Vec<String> {
        let (Some(root), Some(cursor)) = (self.root, self.cursor) else {
            return Vec::new();
        };
        let mut path = Vec::new();
        self.build_path(root, cursor, &mut path);
        path
    }

    fn build_path(&self, current: Index, goal: Index, path: &mut Vec<String>) -> bool {
        let Some(node) = self.arena.get(current) else {
            return false;
        };
        path.push(node.title().to_string());
        if current == goal {
            return true;
        }
        for child in node.children() {
            if self.build_path(child, goal, path) {
                return true;
            }
        }
        path.pop();
        false
    }

    /// Indented depth-first outline of the whole tree. Child lines carry
    /// their storage-slot label; the cursor line gets a trailing `*`.
    #[instrument(level = "debug", skip(self))]
    pub fn render_outline(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.root {
            self.build_outline(root, &mut out, 0, None);
        }
        out
    }

    fn build_outline(&self, idx: Index, out: &mut String, depth: usize, label: Option<char>) {
        let Some(node) = self.arena.get(idx) else {
            return;
        };
        for _ in 0..depth {
            out.push_str("    ");
        }
        if let Some(label) = label {
            out.push(label);
            out.push_str(") ");
        }
        out.push_str(&node.display_name());
        if Some(idx) == self.cursor {
            out.push_str(" *");
        }
        out.push('\n');
        for slot in Slot::ALL {
            if let Some(child) = node.slot(slot) {
                self.build_outline(child, out, depth + 1, Some(slot.label()));
            }
        }
    }

    /// Multi-line summary of the cursor scene: id, title, description and
    /// where it leads. Empty when the tree has no scenes.
    #[instrument(level = "debug", skip(self))]
    pub fn render_summary(&self) -> String {
        let Some(idx) = self.cursor else {
            return String::new();
        };
        let Some(node) = self.arena.get(idx) else {
            return String::new();
        };
        let mut out = format!(
            "Scene ID #{}\nTitle: {}\nScene: {}\n",
            node.id(),
            node.title(),
            node.description()
        );
        if node.is_ending() {
            out.push_str("Leads to: NONE\n");
        } else {
            let leads = node
                .children()
                .filter_map(|child| self.arena.get(child))
                .map(|child| format!("'{}' (#{})", child.title(), child.id()))
                .join(", ");
            out.push_str(&format!("Leads to: {}\n", leads));
        }
        out
    }

    /// Preorder traversal over the whole tree, slot order A, B, C.
    pub fn iter(&self) -> SceneIter {
        SceneIter::new(self)
    }

    /// Exhaustive search for the scene carrying `id`; first match wins.
    #[instrument(level = "trace", skip(self))]
    pub fn find_by_id(&self, id: u32) -> Option<Index> {
        self.iter().find(|(_, node)| node.id() == id).map(|(idx, _)| idx)
    }

    /// Exhaustive search for the parent of `child`. No back-pointers are
    /// stored; this walks the whole tree from the root.
    #[instrument(level = "trace", skip(self))]
    pub fn find_parent(&self, child: Index) -> Option<Index> {
        self.iter()
            .find(|(_, node)| node.children().any(|c| c == child))
            .map(|(idx, _)| idx)
    }

    /// True when `node` is `ancestor` itself or lies below it.
    fn is_in_subtree(&self, node: Index, ancestor: Index) -> bool {
        let mut stack = vec![ancestor];
        while let Some(idx) = stack.pop() {
            if idx == node {
                return true;
            }
            if let Some(n) = self.arena.get(idx) {
                stack.extend(n.children());
            }
        }
        false
    }
}

pub struct SceneIter<'a> {
    tree: &'a SceneTree,
    stack: Vec<Index>,
}

impl<'a> SceneIter<'a> {
    fn new(tree: &'a SceneTree) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = tree.root() {
            stack.push(root);
        }
        Self { tree, stack }
    }
}

impl<'a> Iterator for SceneIter<'a> {
    type Item = (Index, &'a SceneNode);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(current) = self.stack.pop() {
            if let Some(node) = self.tree.get(current) {
                // Push children in reverse so slot A comes out first
                let children: Vec<Index> = node.children().collect();
                for child in children.into_iter().rev() {
                    self.stack.push(child);
                }
                return Some((current, node));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Start (#1) *
    //     A) Left (#2)
    //     B) Mid (#3)
    //     C) Right (#4)
    fn three_child_tree() -> SceneTree {
        let mut tree = SceneTree::new();
        tree.add_scene("Start", "d0").unwrap();
        tree.add_scene("Left", "d1").unwrap();
        tree.add_scene("Mid", "d2").unwrap();
        tree.add_scene("Right", "d3").unwrap();
        tree
    }

    fn child_titles(tree: &SceneTree) -> Vec<String> {
        tree.cursor_node()
            .map(|node| {
                node.children()
                    .filter_map(|c| tree.get(c))
                    .map(|c| c.title().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_first_scene_becomes_root_and_cursor() {
        let mut tree = SceneTree::new();
        let id = tree.add_scene("Start", "d0").unwrap();
        assert_eq!(id, 1);
        assert_eq!(tree.root(), tree.cursor());
        assert_eq!(tree.cursor_node().unwrap().title(), "Start");
    }

    #[test]
    fn test_ids_are_sequential_and_never_reused() {
        let mut tree = three_child_tree();
        assert_eq!(tree.scene_count(), 4);

        tree.remove_child(Slot::A).unwrap();
        let id = tree.add_scene("New", "d").unwrap();
        assert_eq!(id, 5);
        assert_eq!(tree.scene_count(), 5);
    }

    #[test]
    fn test_add_scene_on_full_cursor_fails_without_mutation() {
        let mut tree = three_child_tree();
        let err = tree.add_scene("Overflow", "d").unwrap_err();
        assert!(matches!(err, SceneError::FullScene(_)));
        assert_eq!(tree.scene_count(), 4);
        assert_eq!(child_titles(&tree), vec!["Left", "Mid", "Right"]);
    }

    #[test]
    fn test_remove_a_shifts_children_left() {
        let mut tree = three_child_tree();
        tree.remove_child(Slot::A).unwrap();

        let cursor = tree.cursor_node().unwrap();
        let a = tree.get(cursor.slot(Slot::A).unwrap()).unwrap();
        let b = tree.get(cursor.slot(Slot::B).unwrap()).unwrap();
        assert_eq!(a.title(), "Mid");
        assert_eq!(b.title(), "Right");
        assert_eq!(cursor.slot(Slot::C), None);
    }

    #[test]
    fn test_remove_a_twice_leaves_last_child_in_slot_a() {
        let mut tree = three_child_tree();
        tree.remove_child(Slot::A).unwrap();
        tree.remove_child(Slot::A).unwrap();

        let cursor = tree.cursor_node().unwrap();
        let a = tree.get(cursor.slot(Slot::A).unwrap()).unwrap();
        assert_eq!(a.title(), "Right");
        assert_eq!(cursor.slot(Slot::B), None);
        assert_eq!(cursor.slot(Slot::C), None);
    }

    #[test]
    fn test_remove_b_with_a_occupied_leaves_gap() {
        // Single-pass shift only fires when slot A is empty, so removing B
        // leaves [Left, _, Right].
        let mut tree = three_child_tree();
        tree.remove_child(Slot::B).unwrap();

        let cursor = tree.cursor_node().unwrap();
        assert_eq!(tree.get(cursor.slot(Slot::A).unwrap()).unwrap().title(), "Left");
        assert_eq!(cursor.slot(Slot::B), None);
        assert_eq!(tree.get(cursor.slot(Slot::C).unwrap()).unwrap().title(), "Right");
    }

    #[test]
    fn test_remove_c_never_shifts() {
        let mut tree = three_child_tree();
        tree.remove_child(Slot::C).unwrap();
        assert_eq!(child_titles(&tree), vec!["Left", "Mid"]);

        let cursor = tree.cursor_node().unwrap();
        assert!(cursor.slot(Slot::A).is_some());
        assert!(cursor.slot(Slot::B).is_some());
        assert!(cursor.slot(Slot::C).is_none());
    }

    #[test]
    fn test_remove_empty_slot_fails_without_mutation() {
        let mut tree = three_child_tree();
        tree.remove_child(Slot::C).unwrap();

        let err = tree.remove_child(Slot::C).unwrap_err();
        assert!(matches!(err, SceneError::NoSuchNode(_)));
        assert_eq!(child_titles(&tree), vec!["Left", "Mid"]);
    }

    #[test]
    fn test_remove_frees_whole_subtree() {
        let mut tree = three_child_tree();
        tree.move_cursor_forward(Slot::A).unwrap();
        tree.add_scene("Grandchild", "d").unwrap();
        tree.move_cursor_back().unwrap();

        tree.remove_child(Slot::A).unwrap();
        let titles: Vec<&str> = tree.iter().map(|(_, n)| n.title()).collect();
        assert_eq!(titles, vec!["Start", "Mid", "Right"]);
        assert_eq!(tree.find_by_id(2), None);
        assert_eq!(tree.find_by_id(5), None);
    }

    #[test]
    fn test_forward_uses_dense_index_after_gap() {
        let mut tree = three_child_tree();
        tree.remove_child(Slot::B).unwrap();
        // Occupied slots are [A: Left, C: Right]; option B means the second
        // occupied child, i.e. Right.
        tree.move_cursor_forward(Slot::B).unwrap();
        assert_eq!(tree.cursor_node().unwrap().title(), "Right");
    }

    #[test]
    fn test_forward_past_last_option_fails() {
        let mut tree = three_child_tree();
        tree.remove_child(Slot::C).unwrap();
        let err = tree.move_cursor_forward(Slot::C).unwrap_err();
        assert!(matches!(err, SceneError::NoSuchNode(_)));
        assert_eq!(tree.cursor(), tree.root());
    }

    #[test]
    fn test_forward_on_ending_scene_fails() {
        let mut tree = SceneTree::new();
        tree.add_scene("Start", "d0").unwrap();
        let err = tree.move_cursor_forward(Slot::A).unwrap_err();
        assert!(matches!(err, SceneError::NoSuchNode(_)));
    }

    #[test]
    fn test_back_from_root_fails() {
        let mut tree = three_child_tree();
        tree.move_cursor_forward(Slot::A).unwrap();
        assert_eq!(tree.cursor_node().unwrap().title(), "Left");

        tree.move_cursor_back().unwrap();
        assert_eq!(tree.cursor(), tree.root());

        let err = tree.move_cursor_back().unwrap_err();
        assert!(matches!(err, SceneError::NoSuchNode(_)));
    }

    #[test]
    fn test_move_scene_relocates_subtree_once() {
        // Start (#1)
        //     A) Left (#2)
        //         A) Deep (#5)
        //     B) Mid (#3)
        //     C) Right (#4)
        let mut tree = three_child_tree();
        tree.move_cursor_forward(Slot::A).unwrap();
        tree.add_scene("Deep", "d").unwrap();

        // Move "Left" (with "Deep" below it) under "Right" (#4)
        tree.move_scene(4).unwrap();

        assert_eq!(tree.cursor_node().unwrap().title(), "Left");
        let right = tree.find_by_id(4).unwrap();
        let right_node = tree.get(right).unwrap();
        assert_eq!(right_node.slot(Slot::A), tree.cursor());

        // Exactly one occurrence of the moved scene in the whole tree
        let count = tree.iter().filter(|(_, n)| n.id() == 2).count();
        assert_eq!(count, 1);
        assert_eq!(tree.find_parent(tree.cursor().unwrap()), Some(right));

        // Old parent (root) no longer references it; no shift was run
        let root_node = tree.get(tree.root().unwrap()).unwrap();
        assert_eq!(root_node.slot(Slot::A), None);
        assert!(root_node.slot(Slot::B).is_some());
        assert!(root_node.slot(Slot::C).is_some());
    }

    #[test]
    fn test_move_scene_to_full_target_fails_without_detach() {
        let mut tree = three_child_tree();
        tree.move_cursor_forward(Slot::A).unwrap();
        // Root (#1) is full with Left, Mid, Right
        let err = tree.move_scene(1).unwrap_err();
        assert!(matches!(err, SceneError::FullScene(_)));

        // The cursor is still attached where it was
        let root_node = tree.get(tree.root().unwrap()).unwrap();
        assert_eq!(root_node.slot(Slot::A), tree.cursor());
    }

    #[test]
    fn test_move_scene_into_own_subtree_fails() {
        let mut tree = three_child_tree();
        tree.move_cursor_forward(Slot::A).unwrap();
        tree.add_scene("Deep", "d").unwrap();

        // Target #5 ("Deep") sits below the cursor ("Left")
        let err = tree.move_scene(5).unwrap_err();
        assert!(matches!(err, SceneError::NoSuchNode(_)));
        let root_node = tree.get(tree.root().unwrap()).unwrap();
        assert_eq!(root_node.slot(Slot::A), tree.cursor());
    }

    #[test]
    fn test_move_scene_of_root_fails() {
        let mut tree = three_child_tree();
        let err = tree.move_scene(2).unwrap_err();
        assert!(matches!(err, SceneError::NoSuchNode(_)));
    }

    #[test]
    fn test_move_scene_to_unknown_id_fails() {
        let mut tree = three_child_tree();
        tree.move_cursor_forward(Slot::A).unwrap();
        let err = tree.move_scene(99).unwrap_err();
        assert!(matches!(err, SceneError::NoSuchNode(_)));
    }

    #[test]
    fn test_path_from_root_on_root_is_single_element() {
        let tree = three_child_tree();
        assert_eq!(tree.path_from_root(), vec!["Start"]);
    }

    #[test]
    fn test_path_from_root_follows_cursor() {
        let mut tree = three_child_tree();
        tree.move_cursor_forward(Slot::B).unwrap();
        tree.add_scene("Deeper", "d").unwrap();
        tree.move_cursor_forward(Slot::A).unwrap();
        assert_eq!(tree.path_from_root(), vec!["Start", "Mid", "Deeper"]);
    }

    #[test]
    fn test_path_from_root_on_empty_tree_is_empty() {
        let tree = SceneTree::new();
        assert!(tree.path_from_root().is_empty());
    }

    #[test]
    fn test_render_outline_marks_cursor_and_labels_slots() {
        let tree = three_child_tree();
        let expected = "\
Start (#1) *
    A) Left (#2)
    B) Mid (#3)
    C) Right (#4)
";
        assert_eq!(tree.render_outline(), expected);
    }

    #[test]
    fn test_render_outline_keeps_storage_labels_after_gap() {
        let mut tree = three_child_tree();
        tree.remove_child(Slot::B).unwrap();
        let expected = "\
Start (#1) *
    A) Left (#2)
    C) Right (#4)
";
        assert_eq!(tree.render_outline(), expected);
    }

    #[test]
    fn test_render_summary_lists_children() {
        let tree = three_child_tree();
        let summary = tree.render_summary();
        assert!(summary.contains("Scene ID #1"));
        assert!(summary.contains("Title: Start"));
        assert!(summary.contains("Scene: d0"));
        assert!(summary.contains("Leads to: 'Left' (#2), 'Mid' (#3), 'Right' (#4)"));
    }

    #[test]
    fn test_render_summary_for_ending_scene() {
        let mut tree = three_child_tree();
        tree.move_cursor_forward(Slot::A).unwrap();
        assert!(tree.render_summary().contains("Leads to: NONE"));
    }

    #[test]
    fn test_iter_visits_preorder_slot_order() {
        let mut tree = three_child_tree();
        tree.move_cursor_forward(Slot::A).unwrap();
        tree.add_scene("Deep", "d").unwrap();
        tree.move_cursor_back().unwrap();

        let titles: Vec<&str> = tree.iter().map(|(_, n)| n.title()).collect();
        assert_eq!(titles, vec!["Start", "Left", "Deep", "Mid", "Right"]);
    }
}
