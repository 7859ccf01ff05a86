//! Item stacks carried by projectiles and launchers.
//!
//! A projectile holds the stack it was fired from (returned on collection) and
//! optionally the weapon stack that launched it (for damage attribution).
//!
//! # Example
//!
//! ```
//! use ballista_common::ItemTypeId;
//! use ballista_kernel::item_stack::ItemStack;
//!
//! let mut quiver = ItemStack::new(ItemTypeId::new(7), 12);
//! let arrow = quiver.take_one();
//! assert_eq!(quiver.count(), 11);
//! assert_eq!(arrow.map(|s| s.count()), Some(1));
//! ```

use ballista_common::ItemTypeId;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Durability value type.
pub type Durability = u16;

/// Items without wear.
pub const NO_DURABILITY: Durability = 0;

/// A stack of identical items with optional durability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    item: ItemTypeId,
    count: u32,
    durability: Durability,
    max_durability: Durability,
}

impl ItemStack {
    /// Create a stack without durability.
    #[must_use]
    pub fn new(item: ItemTypeId, count: u32) -> Self {
        Self {
            item,
            count,
            durability: NO_DURABILITY,
            max_durability: NO_DURABILITY,
        }
    }

    /// Give the stack full durability of `max_durability`.
    #[must_use]
    pub fn with_durability(mut self, max_durability: Durability) -> Self {
        self.durability = max_durability;
        self.max_durability = max_durability;
        self
    }

    /// Item type.
    #[must_use]
    pub const fn item(&self) -> ItemTypeId {
        self.item
    }

    /// Number of items.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Check if no items remain.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Current durability.
    #[must_use]
    pub const fn durability(&self) -> Durability {
        self.durability
    }

    /// Check if the item wears out.
    #[must_use]
    pub const fn has_durability(&self) -> bool {
        self.max_durability != NO_DURABILITY
    }

    /// Wear the item down.
    ///
    /// Returns `true` if this broke the item.
    pub fn damage(&mut self, amount: Durability) -> bool {
        if !self.has_durability() || self.durability == 0 {
            return false;
        }

        self.durability = self.durability.saturating_sub(amount);
        let broke = self.durability == 0;
        if broke {
            trace!("Item {} broke", self.item);
        }
        broke
    }

    /// Split a single item off the stack.
    pub fn take_one(&mut self) -> Option<Self> {
        if self.is_empty() {
            return None;
        }
        self.count -= 1;
        trace!("Took one {}, {} remaining", self.item, self.count);
        Some(Self {
            count: 1,
            ..self.clone()
        })
    }
}
