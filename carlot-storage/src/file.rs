use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{Deserialize, Serialize};

use carlot_slo::{errors, Result};

use crate::{valid_car_id, Car, Status};

/// Whole-document snapshot written to disk on every save.
#[derive(Debug, Default, Deserialize, Serialize)]
struct Snapshot {
    cars: HashMap<String, Car>,
    statuses: HashMap<String, Status>,
}

/// Car and status store backed by a single JSON file.
///
/// The maps live behind one coarse mutex; writers win in arrival order.
/// Persistence is whole-document: [`FileStore::save`] serializes
/// everything to `data.json.new` and renames it over `data.json`, so a
/// crash mid-write never leaves a half-written data file behind.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: Mutex<Snapshot>,
}

impl FileStore {
    /// Creates a store persisting under `dir`, which must be an existing
    /// directory.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let info = fs::metadata(dir).map_err(errors::any)?;
        if !info.is_dir() {
            return Err(errors::bad_request(&format!(
                "'{}' is not a directory",
                dir.display()
            )));
        }
        Ok(Self {
            path: dir.join("data.json"),
            inner: Mutex::new(Snapshot::default()),
        })
    }

    /// Replaces the in-memory maps with the contents of the data file.
    /// A missing file leaves the store empty.
    pub fn load(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let raw = fs::read_to_string(&self.path).map_err(errors::any)?;
        let snapshot: Snapshot =
            serde_json::from_str(&raw).map_err(errors::any)?;
        tracing::info!(
            "loaded {} cars and {} statuses from {}",
            snapshot.cars.len(),
            snapshot.statuses.len(),
            self.path.display()
        );
        let mut inner = self.lock();
        *inner = snapshot;
        Ok(())
    }

    /// Serializes the maps to disk, atomically replacing the data file.
    /// On failure the in-memory state is untouched and remains
    /// authoritative.
    pub fn save(&self) -> Result<()> {
        let raw = {
            let inner = self.lock();
            serde_json::to_vec(&*inner).map_err(errors::any)?
        };
        let staging = self.path.with_extension("json.new");
        fs::write(&staging, raw).map_err(errors::any)?;
        fs::rename(&staging, &self.path).map_err(errors::any)?;
        Ok(())
    }

    /// IDs of all extant cars, in no particular order.
    pub fn car_ids(&self) -> Vec<String> {
        self.lock().cars.keys().cloned().collect()
    }

    pub fn get_car(&self, id: &str) -> Option<Car> {
        self.lock().cars.get(id).cloned()
    }

    /// Stores `car` at `id`, returning true if a car with that ID
    /// already existed. Any existing status is left alone. Rejects
    /// invalid IDs.
    pub fn set_car(&self, id: &str, car: Car) -> Result<bool> {
        if !valid_car_id(id) {
            return Err(errors::bad_request(&format!("invalid ID '{id}'")));
        }
        let mut inner = self.lock();
        Ok(inner.cars.insert(id.to_owned(), car).is_some())
    }

    /// Deletes the car and any associated status. Deleting an absent ID
    /// has no effect.
    pub fn delete_car(&self, id: &str) {
        let mut inner = self.lock();
        inner.cars.remove(id);
        inner.statuses.remove(id);
    }

    pub fn get_status(&self, id: &str) -> Option<Status> {
        self.lock().statuses.get(id).copied()
    }

    /// Overwrites the status for `id`, returning true if a status
    /// already existed. Errors if no such car exists.
    pub fn set_status(&self, id: &str, status: Status) -> Result<bool> {
        let mut inner = self.lock();
        if !inner.cars.contains_key(id) {
            return Err(errors::not_found(&format!(
                "cannot set status of non-existent car '{id}'"
            )));
        }
        Ok(inner.statuses.insert(id.to_owned(), status).is_some())
    }

    /// Next unused car ID. IDs are never reused while the highest one
    /// is still present.
    pub fn next_car_id(&self) -> String {
        let inner = self.lock();
        let mut max: Option<u64> = None;
        for id in inner.cars.keys() {
            if let Ok(n) = id.trim_start_matches("car").parse::<u64>() {
                max = Some(max.map_or(n, |m| m.max(n)));
            }
        }
        let mut next = match max {
            Some(n) => n + 1,
            None => return "car0".to_owned(),
        };
        loop {
            let id = format!("car{next}");
            if !inner.cars.contains_key(&id) {
                return id;
            }
            next += 1;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Snapshot> {
        // Lock poisoning only happens if another thread panicked while
        // holding the guard; the snapshot is still consistent then.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
