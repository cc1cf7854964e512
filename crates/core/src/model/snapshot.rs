use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{Deck, Folder};

/// The protected folder that always exists and absorbs orphaned decks.
pub const UNCATEGORIZED: &str = "Uncategorized";

const STARTER_FOLDERS: [&str; 5] = [
    "General Medicine",
    "Surgery",
    "Pediatrics",
    "Gynecology",
    UNCATEGORIZED,
];

const MIN_FONT_SCALE: f32 = 0.5;
const MAX_FONT_SCALE: f32 = 2.0;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SnapshotError {
    #[error("folder name cannot be empty")]
    EmptyFolderName,

    #[error("folder {0:?} already exists")]
    FolderExists(String),

    #[error("folder {0:?} does not exist")]
    FolderNotFound(String),

    #[error("the {UNCATEGORIZED:?} folder cannot be deleted or renamed")]
    ProtectedFolder,

    #[error("deck {0:?} already exists in this folder")]
    DeckExists(String),

    #[error("deck {0:?} does not exist in this folder")]
    DeckNotFound(String),
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// User display settings carried inside the snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    font_scale: f32,
}

impl Settings {
    #[must_use]
    pub fn font_scale(&self) -> f32 {
        self.font_scale
    }

    /// Sets the font scale, clamped to [0.5, 2.0].
    pub fn set_font_scale(&mut self, scale: f32) {
        self.font_scale = if scale.is_finite() {
            scale.clamp(MIN_FONT_SCALE, MAX_FONT_SCALE)
        } else {
            1.0
        };
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self { font_scale: 1.0 }
    }
}

//
// ─── OVERALL STATS ─────────────────────────────────────────────────────────────
//

/// Per-deck counters summed across the whole snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverallStats {
    pub total: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub attempted: u32,
    pub skipped: u32,
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// The complete state of folders, decks, and settings at one instant.
///
/// This is the unit of persistence and of reconciliation: the same shape is
/// written to the local cache, the remote store, and export files. All
/// mutation goes through the reconciliation engine's single entry point; the
/// methods here are the pure transformations it applies.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    folders: BTreeMap<String, Folder>,
    expanded: BTreeSet<String>,
    settings: Settings,
    last_updated: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// A minimal valid snapshot: just the protected folder.
    #[must_use]
    pub fn new() -> Self {
        let mut folders = BTreeMap::new();
        folders.insert(UNCATEGORIZED.to_owned(), Folder::new());
        Self {
            folders,
            expanded: BTreeSet::new(),
            settings: Settings::default(),
            last_updated: None,
        }
    }

    /// The default library handed to a brand-new user: five empty folders.
    #[must_use]
    pub fn starter() -> Self {
        let mut snapshot = Self::new();
        for name in STARTER_FOLDERS {
            snapshot.folders.entry(name.to_owned()).or_default();
        }
        snapshot
    }

    /// Rebuild a snapshot from its parts, restoring the protected folder if
    /// the source document lost it.
    #[must_use]
    pub fn from_parts(
        mut folders: BTreeMap<String, Folder>,
        expanded: BTreeSet<String>,
        settings: Settings,
        last_updated: Option<DateTime<Utc>>,
    ) -> Self {
        folders.entry(UNCATEGORIZED.to_owned()).or_default();
        Self {
            folders,
            expanded,
            settings,
            last_updated,
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn folders(&self) -> &BTreeMap<String, Folder> {
        &self.folders
    }

    #[must_use]
    pub fn folder(&self, name: &str) -> Option<&Folder> {
        self.folders.get(name)
    }

    #[must_use]
    pub fn expanded_folders(&self) -> &BTreeSet<String> {
        &self.expanded
    }

    #[must_use]
    pub fn is_expanded(&self, name: &str) -> bool {
        self.expanded.contains(name)
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    #[must_use]
    pub fn deck(&self, folder: &str, deck: &str) -> Option<&Deck> {
        self.folders.get(folder)?.deck(deck)
    }

    /// Stamp the snapshot as updated at the given instant.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = Some(now);
    }

    // ── Folder operations ──────────────────────────────────────────────────

    /// Creates an empty folder and expands it.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::EmptyFolderName` or `FolderExists`.
    pub fn create_folder(&mut self, name: &str) -> Result<(), SnapshotError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SnapshotError::EmptyFolderName);
        }
        if self.folders.contains_key(name) {
            return Err(SnapshotError::FolderExists(name.to_owned()));
        }
        self.folders.insert(name.to_owned(), Folder::new());
        self.expanded.insert(name.to_owned());
        Ok(())
    }

    /// Renames a folder, carrying the expanded flag over.
    ///
    /// # Errors
    ///
    /// Returns `ProtectedFolder` for the default folder, `FolderNotFound` if
    /// the source is missing, `FolderExists` on a name collision, or
    /// `EmptyFolderName`.
    pub fn rename_folder(&mut self, old: &str, new: &str) -> Result<(), SnapshotError> {
        let new = new.trim();
        if new.is_empty() {
            return Err(SnapshotError::EmptyFolderName);
        }
        if old == UNCATEGORIZED {
            return Err(SnapshotError::ProtectedFolder);
        }
        if old == new {
            return Ok(());
        }
        if !self.folders.contains_key(old) {
            return Err(SnapshotError::FolderNotFound(old.to_owned()));
        }
        if self.folders.contains_key(new) {
            return Err(SnapshotError::FolderExists(new.to_owned()));
        }

        let folder = self.folders.remove(old).unwrap_or_default();
        self.folders.insert(new.to_owned(), folder);
        if self.expanded.remove(old) {
            self.expanded.insert(new.to_owned());
        }
        Ok(())
    }

    /// Deletes a folder; its decks move to the protected folder,
    /// skipping any whose name is already taken there.
    ///
    /// # Errors
    ///
    /// Returns `ProtectedFolder` for the default folder or `FolderNotFound`.
    pub fn delete_folder(&mut self, name: &str) -> Result<(), SnapshotError> {
        if name == UNCATEGORIZED {
            return Err(SnapshotError::ProtectedFolder);
        }
        let mut folder = self
            .folders
            .remove(name)
            .ok_or_else(|| SnapshotError::FolderNotFound(name.to_owned()))?;
        self.expanded.remove(name);

        let fallback = self.folders.entry(UNCATEGORIZED.to_owned()).or_default();
        for deck in folder.drain_decks() {
            if !fallback.contains_deck(deck.name()) {
                fallback.push_deck(deck);
            }
        }
        Ok(())
    }

    pub fn toggle_folder(&mut self, name: &str) {
        if !self.expanded.remove(name) {
            self.expanded.insert(name.to_owned());
        }
    }

    pub fn expand_all(&mut self) {
        self.expanded = self.folders.keys().cloned().collect();
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    // ── Deck operations ────────────────────────────────────────────────────

    /// Adds a deck, creating the folder if needed and expanding it.
    ///
    /// # Errors
    ///
    /// Returns `DeckExists` when the folder already holds a deck of that name.
    pub fn add_deck(&mut self, folder: &str, deck: Deck) -> Result<(), SnapshotError> {
        let folder_name = if folder.trim().is_empty() {
            UNCATEGORIZED
        } else {
            folder.trim()
        };
        let target = self.folders.entry(folder_name.to_owned()).or_default();
        if target.contains_deck(deck.name()) {
            return Err(SnapshotError::DeckExists(deck.name().to_owned()));
        }
        target.push_deck(deck);
        self.expanded.insert(folder_name.to_owned());
        Ok(())
    }

    /// Removes a deck from a folder.
    ///
    /// # Errors
    ///
    /// Returns `FolderNotFound` or `DeckNotFound`.
    pub fn delete_deck(&mut self, folder: &str, deck: &str) -> Result<(), SnapshotError> {
        let target = self
            .folders
            .get_mut(folder)
            .ok_or_else(|| SnapshotError::FolderNotFound(folder.to_owned()))?;
        target
            .remove_deck(deck)
            .map(|_| ())
            .ok_or_else(|| SnapshotError::DeckNotFound(deck.to_owned()))
    }

    /// Applies a finished session's counts to a deck (monotonic-max policy).
    ///
    /// # Errors
    ///
    /// Returns `FolderNotFound` or `DeckNotFound`.
    pub fn record_deck_session(
        &mut self,
        folder: &str,
        deck: &str,
        correct: u32,
        incorrect: u32,
    ) -> Result<(), SnapshotError> {
        let target = self
            .folders
            .get_mut(folder)
            .ok_or_else(|| SnapshotError::FolderNotFound(folder.to_owned()))?;
        let deck = target
            .deck_mut(deck)
            .ok_or_else(|| SnapshotError::DeckNotFound(deck.to_owned()))?;
        deck.record_session(correct, incorrect);
        Ok(())
    }

    // ── Settings ───────────────────────────────────────────────────────────

    pub fn set_font_scale(&mut self, scale: f32) {
        self.settings.set_font_scale(scale);
    }

    // ── Merge ──────────────────────────────────────────────────────────────

    /// Additively merges a backup snapshot into this one.
    ///
    /// Missing folders are created; a deck is appended only when no deck of
    /// the same name exists in the target folder (name is the only
    /// de-duplication key, content is not inspected). Expanded-folder sets
    /// are unioned. Settings and timestamps of the incoming snapshot are
    /// ignored. Nothing is ever removed, so merging the same payload twice
    /// adds nothing the second time.
    pub fn merge(&mut self, incoming: Snapshot) {
        for (name, mut folder) in incoming.folders {
            let target = self.folders.entry(name).or_default();
            for deck in folder.drain_decks() {
                if !target.contains_deck(deck.name()) {
                    target.push_deck(deck);
                }
            }
        }
        self.expanded.extend(incoming.expanded);
    }

    // ── Queries ────────────────────────────────────────────────────────────

    /// Sums the per-deck counters across every folder.
    #[must_use]
    pub fn overall_stats(&self) -> OverallStats {
        let mut stats = OverallStats::default();
        for folder in self.folders.values() {
            for deck in folder.decks() {
                stats.total += deck.stats().total();
                stats.correct += deck.stats().correct();
                stats.incorrect += deck.stats().incorrect();
                stats.attempted += deck.stats().attempted();
            }
        }
        stats.skipped = stats.total.saturating_sub(stats.attempted);
        stats
    }

    /// Case-insensitive filter over folder names, deck names, prompts,
    /// option texts, and explanations. A matching folder keeps all of its
    /// decks; otherwise only matching decks survive. An empty query returns
    /// everything.
    #[must_use]
    pub fn search(&self, query: &str) -> BTreeMap<String, Folder> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.folders.clone();
        }

        let mut filtered = BTreeMap::new();
        for (name, folder) in &self.folders {
            if name.to_lowercase().contains(&query) {
                filtered.insert(name.clone(), folder.clone());
                continue;
            }
            let decks: Vec<Deck> = folder
                .decks()
                .iter()
                .filter(|deck| deck_matches(deck, &query))
                .cloned()
                .collect();
            if !decks.is_empty() {
                filtered.insert(
                    name.clone(),
                    Folder::with_contents(decks, folder.subfolders().clone()),
                );
            }
        }
        filtered
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

fn deck_matches(deck: &Deck, query: &str) -> bool {
    if deck.name().to_lowercase().contains(query) {
        return true;
    }
    deck.questions().iter().any(|q| {
        q.prompt().to_lowercase().contains(query)
            || q.explanation()
                .is_some_and(|e| e.to_lowercase().contains(query))
            || q.options()
                .iter()
                .any(|o| o.text().to_lowercase().contains(query))
    })
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
