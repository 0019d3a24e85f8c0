use std::fmt;
use std::str::FromStr;

use generational_arena::Index;

use crate::errors::{SceneError, SceneResult};

/// One of the three fixed child positions a scene holds.
///
/// Slots are storage positions. Player-facing option letters map onto the
/// *occupied* slots in order, which is not always the same thing once
/// removals have left a gap (see `SceneTree::move_cursor_forward`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    A,
    B,
    C,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::A, Slot::B, Slot::C];

    /// Storage position of this slot (A=0, B=1, C=2).
    pub fn index(self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
            Slot::C => 2,
        }
    }

    pub fn label(self) -> char {
        match self {
            Slot::A => 'A',
            Slot::B => 'B',
            Slot::C => 'C',
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Slot {
    type Err = SceneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Slot::A),
            "B" => Ok(Slot::B),
            "C" => Ok(Slot::C),
            _ => Err(SceneError::NoSuchNode(format!(
                "invalid option '{}': must be 'A', 'B', or 'C'",
                s.trim()
            ))),
        }
    }
}

/// A single scene in the narrative tree.
///
/// Children live in the owning `SceneTree`'s arena; a node only stores their
/// indices in its three slots. There is no parent back-reference, parent
/// lookup is a whole-tree search on the tree.
#[derive(Debug)]
pub struct SceneNode {
    id: u32,
    title: String,
    description: String,
    slots: [Option<Index>; 3],
}

impl SceneNode {
    pub fn new(id: u32, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            slots: [None; 3],
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn slot(&self, slot: Slot) -> Option<Index> {
        self.slots[slot.index()]
    }

    /// Raw slot write, used by the tree for structural surgery
    /// (compaction and subtree relocation).
    pub fn set_slot(&mut self, slot: Slot, child: Option<Index>) {
        self.slots[slot.index()] = child;
    }

    /// Occupied slots in A/B/C order. This dense view is what forward
    /// navigation indexes into.
    pub fn children(&self) -> impl Iterator<Item = Index> + '_ {
        self.slots.iter().flatten().copied()
    }

    pub fn child_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Places `child` into the leftmost empty slot (A, then B, then C).
    pub fn append_child(&mut self, child: Index) -> SceneResult<()> {
        match self.slots.iter_mut().find(|s| s.is_none()) {
            Some(empty) => {
                *empty = Some(child);
                Ok(())
            }
            None => Err(SceneError::FullScene(format!(
                "no available child slots in scene #{}",
                self.id
            ))),
        }
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|s| s.is_some())
    }

    /// An ending scene terminates a play-through: no children at all.
    pub fn is_ending(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    /// Compact rendering: `title (#id)`.
    pub fn display_name(&self) -> String {
        format!("{} (#{})", self.title, self.id)
    }
}

impl fmt::Display for SceneNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
