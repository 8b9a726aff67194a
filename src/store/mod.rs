//! Persistence seam
//!
//! Handlers and commands talk to a [`Store`]; [`MemoryStore`] keeps the whole
//! dataset in process and can be seeded from, and flushed to, a snapshot file.
//! Library-year changes run under the store's write lock, so edits to
//! different forms of one year never overwrite each other. Two edits of the
//! same form are last-write-wins.

mod snapshot;

pub use snapshot::{load_snapshot, save_snapshot};

use parking_lot::RwLock;

use crate::error::{CealError, CealResult};
use crate::types::{
    CatalogEntry, InstitutionYear, Library, LibraryYear, ListKind, Snapshot, Subscription,
};

pub trait Store: Send + Sync {
    fn libraries(&self) -> Vec<Library>;
    fn library(&self, id: u32) -> CealResult<Library>;
    fn create_library(&self, name: &str, code: Option<String>) -> CealResult<Library>;

    /// Create the library-year if missing; the flag is true when it was created
    fn open_library_year(&self, library_id: u32, year: i32) -> CealResult<(LibraryYear, bool)>;
    fn library_year(&self, library_id: u32, year: i32) -> CealResult<LibraryYear>;
    fn library_year_by_id(&self, id: u32) -> CealResult<LibraryYear>;
    /// Apply `change` to one library-year while holding the write lock.
    ///
    /// `change` works on a copy of the row and also sees the rest of the
    /// dataset as it is under the lock. The row is only replaced when
    /// `change` returns `Ok`; the stored row is returned.
    fn update_library_year(
        &self,
        id: u32,
        change: &mut dyn FnMut(&mut LibraryYear, &Snapshot) -> CealResult<()>,
    ) -> CealResult<LibraryYear>;
    /// Library-years of one survey year joined to their libraries, sorted by name
    fn year_records(&self, year: i32) -> Vec<InstitutionYear>;

    fn catalog(&self, kind: ListKind) -> Vec<CatalogEntry>;
    fn catalog_entry(&self, kind: ListKind, id: u32) -> CealResult<CatalogEntry>;
    /// Assigns a fresh id, ignoring the one supplied
    fn insert_catalog_entry(&self, entry: CatalogEntry) -> CealResult<CatalogEntry>;
    fn update_catalog_entry(&self, entry: CatalogEntry) -> CealResult<CatalogEntry>;
    /// Also removes every subscription to the entry
    fn delete_catalog_entry(&self, kind: ListKind, id: u32) -> CealResult<()>;

    /// Returns false when the subscription already existed
    fn subscribe(&self, kind: ListKind, entry_id: u32, library_year_id: u32) -> CealResult<bool>;
    /// Returns false when there was nothing to remove
    fn unsubscribe(&self, kind: ListKind, entry_id: u32, library_year_id: u32)
        -> CealResult<bool>;
    fn subscribed_entries(&self, kind: ListKind, library_year_id: u32) -> Vec<CatalogEntry>;
    /// Library-year ids subscribed to an entry
    fn subscribers(&self, kind: ListKind, entry_id: u32) -> Vec<u32>;

    fn snapshot(&self) -> Snapshot;
}

/// In-process store guarded by a single lock
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            data: RwLock::new(snapshot),
        }
    }
}

fn next_id(ids: impl Iterator<Item = u32>) -> u32 {
    ids.max().unwrap_or(0) + 1
}

impl Store for MemoryStore {
    fn libraries(&self) -> Vec<Library> {
        let mut libraries = self.data.read().libraries.clone();
        libraries.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        libraries
    }

    fn library(&self, id: u32) -> CealResult<Library> {
        self.data
            .read()
            .library(id)
            .cloned()
            .ok_or_else(|| CealError::NotFound(format!("Library {id}")))
    }

    fn create_library(&self, name: &str, code: Option<String>) -> CealResult<Library> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CealError::Validation("Library name is required".to_string()));
        }

        let mut data = self.data.write();
        if data.libraries.iter().any(|l| l.name == name) {
            return Err(CealError::Validation(format!(
                "Library '{name}' already exists"
            )));
        }
        let library = Library {
            id: next_id(data.libraries.iter().map(|l| l.id)),
            name: name.to_string(),
            code,
        };
        data.libraries.push(library.clone());
        Ok(library)
    }

    fn open_library_year(&self, library_id: u32, year: i32) -> CealResult<(LibraryYear, bool)> {
        let mut data = self.data.write();
        if data.library(library_id).is_none() {
            return Err(CealError::NotFound(format!("Library {library_id}")));
        }
        if let Some(existing) = data
            .library_years
            .iter()
            .find(|ly| ly.library_id == library_id && ly.year == year)
        {
            return Ok((existing.clone(), false));
        }

        let library_year = LibraryYear::new(
            next_id(data.library_years.iter().map(|ly| ly.id)),
            library_id,
            year,
        );
        data.library_years.push(library_year.clone());
        Ok((library_year, true))
    }

    fn library_year(&self, library_id: u32, year: i32) -> CealResult<LibraryYear> {
        self.data
            .read()
            .library_years
            .iter()
            .find(|ly| ly.library_id == library_id && ly.year == year)
            .cloned()
            .ok_or_else(|| {
                CealError::NotFound(format!("Library {library_id} has no record for {year}"))
            })
    }

    fn library_year_by_id(&self, id: u32) -> CealResult<LibraryYear> {
        self.data
            .read()
            .library_years
            .iter()
            .find(|ly| ly.id == id)
            .cloned()
            .ok_or_else(|| CealError::NotFound(format!("Library year {id}")))
    }

    fn update_library_year(
        &self,
        id: u32,
        change: &mut dyn FnMut(&mut LibraryYear, &Snapshot) -> CealResult<()>,
    ) -> CealResult<LibraryYear> {
        let mut data = self.data.write();
        let index = data
            .library_years
            .iter()
            .position(|ly| ly.id == id)
            .ok_or_else(|| CealError::NotFound(format!("Library year {id}")))?;

        let mut library_year = data.library_years[index].clone();
        change(&mut library_year, &data)?;
        data.library_years[index] = library_year.clone();
        Ok(library_year)
    }

    fn year_records(&self, year: i32) -> Vec<InstitutionYear> {
        self.data.read().institution_years(year)
    }

    fn catalog(&self, kind: ListKind) -> Vec<CatalogEntry> {
        self.data
            .read()
            .catalog
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    fn catalog_entry(&self, kind: ListKind, id: u32) -> CealResult<CatalogEntry> {
        self.data
            .read()
            .catalog
            .iter()
            .find(|e| e.kind == kind && e.id == id)
            .cloned()
            .ok_or_else(|| CealError::NotFound(format!("{} entry {id}", kind.label())))
    }

    fn insert_catalog_entry(&self, mut entry: CatalogEntry) -> CealResult<CatalogEntry> {
        let mut data = self.data.write();
        entry.id = next_id(data.catalog.iter().map(|e| e.id));
        data.catalog.push(entry.clone());
        Ok(entry)
    }

    fn update_catalog_entry(&self, entry: CatalogEntry) -> CealResult<CatalogEntry> {
        let mut data = self.data.write();
        let slot = data
            .catalog
            .iter_mut()
            .find(|e| e.kind == entry.kind && e.id == entry.id)
            .ok_or_else(|| {
                CealError::NotFound(format!("{} entry {}", entry.kind.label(), entry.id))
            })?;
        *slot = entry.clone();
        Ok(entry)
    }

    fn delete_catalog_entry(&self, kind: ListKind, id: u32) -> CealResult<()> {
        let mut data = self.data.write();
        let before = data.catalog.len();
        data.catalog.retain(|e| !(e.kind == kind && e.id == id));
        if data.catalog.len() == before {
            return Err(CealError::NotFound(format!("{} entry {id}", kind.label())));
        }
        data.subscriptions
            .retain(|s| !(s.kind == kind && s.entry_id == id));
        Ok(())
    }

    fn subscribe(&self, kind: ListKind, entry_id: u32, library_year_id: u32) -> CealResult<bool> {
        let mut data = self.data.write();
        if !data.catalog.iter().any(|e| e.kind == kind && e.id == entry_id) {
            return Err(CealError::NotFound(format!("{} entry {entry_id}", kind.label())));
        }
        if !data.library_years.iter().any(|ly| ly.id == library_year_id) {
            return Err(CealError::NotFound(format!("Library year {library_year_id}")));
        }

        let subscription = Subscription {
            kind,
            entry_id,
            library_year_id,
        };
        if data.subscriptions.contains(&subscription) {
            return Ok(false);
        }
        data.subscriptions.push(subscription);
        Ok(true)
    }

    fn unsubscribe(
        &self,
        kind: ListKind,
        entry_id: u32,
        library_year_id: u32,
    ) -> CealResult<bool> {
        let mut data = self.data.write();
        let before = data.subscriptions.len();
        data.subscriptions.retain(|s| {
            !(s.kind == kind && s.entry_id == entry_id && s.library_year_id == library_year_id)
        });
        Ok(data.subscriptions.len() != before)
    }

    fn subscribed_entries(&self, kind: ListKind, library_year_id: u32) -> Vec<CatalogEntry> {
        self.data.read().subscribed_entries(kind, library_year_id)
    }

    fn subscribers(&self, kind: ListKind, entry_id: u32) -> Vec<u32> {
        self.data
            .read()
            .subscriptions
            .iter()
            .filter(|s| s.kind == kind && s.entry_id == entry_id)
            .map(|s| s.library_year_id)
            .collect()
    }

    fn snapshot(&self) -> Snapshot {
        self.data.read().clone()
    }
}
