use crate::api::CardInfo;

/// The child's card picks for the current turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardSelection {
    pending: Vec<CardInfo>,
    confirmed: Vec<CardInfo>,
}

impl CardSelection {
    /// Cards picked but not yet confirmed
    pub fn pending(&self) -> &[CardInfo] {
        &self.pending
    }

    /// Cards confirmed by the last commit
    pub fn confirmed(&self) -> &[CardInfo] {
        &self.confirmed
    }

    /// A selection can be confirmed once at least one card is picked
    pub fn can_confirm(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Replace the interim picks with the server's view of them
    pub fn set_pending(&mut self, cards: Vec<CardInfo>) {
        self.pending = cards;
    }

    /// Move pending picks to confirmed; returns how many were confirmed
    pub fn commit(&mut self) -> usize {
        self.confirmed = std::mem::take(&mut self.pending);
        self.confirmed.len()
    }

    /// Undo the last commit so the picks can be confirmed again
    pub fn restore(&mut self) {
        if self.pending.is_empty() {
            self.pending = std::mem::take(&mut self.confirmed);
        }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.confirmed.clear();
    }
}
