use std::collections::BTreeMap;

use crate::model::Deck;

/// An ordered collection of decks, with room for nested folders.
///
/// Nesting is part of the document shape and round-trips through persistence;
/// the snapshot operations themselves only work at depth one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Folder {
    decks: Vec<Deck>,
    subfolders: BTreeMap<String, Folder>,
}

impl Folder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_contents(decks: Vec<Deck>, subfolders: BTreeMap<String, Folder>) -> Self {
        Self { decks, subfolders }
    }

    #[must_use]
    pub fn decks(&self) -> &[Deck] {
        &self.decks
    }

    #[must_use]
    pub fn subfolders(&self) -> &BTreeMap<String, Folder> {
        &self.subfolders
    }

    #[must_use]
    pub fn deck(&self, name: &str) -> Option<&Deck> {
        self.decks.iter().find(|d| d.name() == name)
    }

    #[must_use]
    pub fn deck_mut(&mut self, name: &str) -> Option<&mut Deck> {
        self.decks.iter_mut().find(|d| d.name() == name)
    }

    #[must_use]
    pub fn contains_deck(&self, name: &str) -> bool {
        self.deck(name).is_some()
    }

    /// Appends a deck, keeping import order.
    pub fn push_deck(&mut self, deck: Deck) {
        self.decks.push(deck);
    }

    /// Removes and returns the named deck, if present.
    pub fn remove_deck(&mut self, name: &str) -> Option<Deck> {
        let idx = self.decks.iter().position(|d| d.name() == name)?;
        Some(self.decks.remove(idx))
    }

    /// Moves every deck out of this folder.
    pub fn drain_decks(&mut self) -> Vec<Deck> {
        std::mem::take(&mut self.decks)
    }
}
