/// One half of the double buffer.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum Slot {
    #[default]
    Even,
    Odd,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::Even, Slot::Odd];

    /// Array index for per-slot storage.
    pub fn index(self) -> usize {
        match self {
            Slot::Even => 0,
            Slot::Odd => 1,
        }
    }

    /// The slot not currently being recorded.
    pub fn other(self) -> Slot {
        match self {
            Slot::Even => Slot::Odd,
            Slot::Odd => Slot::Even,
        }
    }
}

/// Per-slot record of which commands were issued since the last begin.
///
/// A slot is only read back once it reached `Ended`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub(crate) enum SlotMark {
    #[default]
    Empty,
    Begun,
    Ended,
}

impl SlotMark {
    /// Mark after an `end` command: only a begun slot becomes readable.
    ///
    /// A second `end` on an already ended slot would pair the old start with
    /// a new end, so it drops the slot back to `Empty`.
    pub(crate) fn ended(self) -> SlotMark {
        match self {
            SlotMark::Begun => SlotMark::Ended,
            SlotMark::Empty | SlotMark::Ended => SlotMark::Empty,
        }
    }
}
