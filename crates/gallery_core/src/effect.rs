use crate::{PendingItem, ProgressReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Discover,
    Fetch { item: PendingItem, attempt: u32 },
    Record { item: PendingItem },
    Advance,
    Finish { report: ProgressReport },
}
