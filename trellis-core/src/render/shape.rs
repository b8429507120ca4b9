//! Shape Classification
//!
//! Every virtual node carries a bitset describing what it is and what its
//! children are. The reconciler dispatches on these bits.

bitflags::bitflags! {
    /// What a virtual node is, combined with what its children are.
    ///
    /// A node has exactly one kind bit (`ELEMENT`, `TEXT` or
    /// `STATEFUL_COMPONENT`) and at most one children bit
    /// (`TEXT_CHILDREN` or `ARRAY_CHILDREN`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShapeFlags: u8 {
        const ELEMENT            = 1 << 0;
        const TEXT               = 1 << 1;
        const STATEFUL_COMPONENT = 1 << 2;
        const TEXT_CHILDREN      = 1 << 3;
        const ARRAY_CHILDREN     = 1 << 4;
    }
}

impl ShapeFlags {
    pub fn is_element(self) -> bool {
        self.contains(Self::ELEMENT)
    }

    pub fn is_text(self) -> bool {
        self.contains(Self::TEXT)
    }

    pub fn is_component(self) -> bool {
        self.contains(Self::STATEFUL_COMPONENT)
    }

    pub fn has_text_children(self) -> bool {
        self.contains(Self::TEXT_CHILDREN)
    }

    pub fn has_array_children(self) -> bool {
        self.contains(Self::ARRAY_CHILDREN)
    }
}
