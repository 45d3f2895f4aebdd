//! Saved (reusable) crawl configurations
//!
//! A [`SavedJob`] stores everything needed to launch the same single-URL or
//! bulk crawl again, including the CSV content and an optional auth block.

use super::file::{quarantine, read_json_array, write_json_atomic};
use super::traits::{StorageError, StorageResult};
use crate::bulk::AuthBlock;
use crate::crawler::{CrawlMode, CrawlRequest, OutputFormat};
use crate::extract::{LinkTypeFilter, ScopeSelector};
use crate::state::now_local;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// How a saved job supplies its URLs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMethod {
    #[default]
    Single,
    Bulk,
}

fn default_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Txt]
}

/// A named crawl configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedJob {
    pub saved_job_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    #[serde(default)]
    pub input_method: InputMethod,
    #[serde(default)]
    pub mode: CrawlMode,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub csv_filename: Option<String>,
    #[serde(default)]
    pub csv_content: Option<String>,
    #[serde(default = "default_formats")]
    pub formats: Vec<OutputFormat>,
    #[serde(default)]
    pub scope_class: Option<String>,
    #[serde(default)]
    pub scope_id: Option<String>,
    #[serde(default)]
    pub download_images: bool,
    #[serde(default)]
    pub link_type: LinkTypeFilter,
    #[serde(default)]
    pub exclude_anchors: bool,
    #[serde(default)]
    pub combine_results: bool,
    #[serde(default)]
    pub auth: Option<AuthBlock>,
}

impl SavedJob {
    fn blank(name: &str, input_method: InputMethod) -> Self {
        let now = now_local();
        Self {
            saved_job_id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            description: String::new(),
            created_at: now,
            updated_at: now,
            input_method,
            mode: CrawlMode::Content,
            url: None,
            csv_filename: None,
            csv_content: None,
            formats: default_formats(),
            scope_class: None,
            scope_id: None,
            download_images: false,
            link_type: LinkTypeFilter::All,
            exclude_anchors: false,
            combine_results: false,
            auth: None,
        }
    }

    /// Captures a single-URL request
    pub fn single(name: &str, request: &CrawlRequest, auth: Option<AuthBlock>) -> Self {
        Self {
            mode: request.mode,
            url: Some(request.url.clone()),
            formats: request.formats.clone(),
            scope_class: request.scope.class.clone(),
            scope_id: request.scope.id.clone(),
            download_images: request.download_images,
            link_type: request.link_type,
            exclude_anchors: request.exclude_anchors,
            auth,
            ..Self::blank(name, InputMethod::Single)
        }
    }

    /// Captures a bulk crawl, CSV content included
    pub fn bulk(
        name: &str,
        csv_filename: &str,
        csv_content: String,
        combine_results: bool,
        auth: Option<AuthBlock>,
    ) -> Self {
        Self {
            csv_filename: Some(csv_filename.to_string()),
            csv_content: Some(csv_content),
            combine_results,
            auth,
            ..Self::blank(name, InputMethod::Bulk)
        }
    }

    /// Rebuilds the single-URL request this job describes
    ///
    /// Returns `None` for bulk jobs or when no URL was saved.
    pub fn to_request(&self) -> Option<CrawlRequest> {
        if self.input_method != InputMethod::Single {
            return None;
        }
        let url = self.url.as_ref()?;

        let mut request = CrawlRequest::new(url.clone());
        request.mode = self.mode;
        request.formats = self.formats.clone();
        request.scope = ScopeSelector::new(self.scope_class.clone(), self.scope_id.clone());
        request.download_images = self.download_images;
        request.link_type = self.link_type;
        request.exclude_anchors = self.exclude_anchors;
        if let Some(auth) = &self.auth {
            request.auth = auth.to_auth_config();
        }
        Some(request)
    }
}

/// File-backed collection of saved jobs
#[derive(Debug)]
pub struct SavedJobStore {
    path: PathBuf,
    jobs: Mutex<HashMap<String, SavedJob>>,
}

impl SavedJobStore {
    /// Opens the store; an unreadable file is moved aside
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut jobs = HashMap::new();

        match read_json_array(&path) {
            Ok(Some(records)) => {
                for record in records {
                    match serde_json::from_value::<SavedJob>(record) {
                        Ok(job) => {
                            jobs.insert(job.saved_job_id.clone(), job);
                        }
                        Err(e) => tracing::warn!("Skipping unreadable saved job: {}", e),
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                let moved = quarantine(&path)?;
                tracing::error!(
                    "Saved jobs file {} is unreadable ({}); moved to {}",
                    path.display(),
                    e,
                    moved.display()
                );
            }
        }

        tracing::debug!("Loaded {} saved jobs from {}", jobs.len(), path.display());
        Ok(Self {
            path,
            jobs: Mutex::new(jobs),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, HashMap<String, SavedJob>>> {
        self.jobs.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn persist(&self, jobs: &HashMap<String, SavedJob>) -> StorageResult<()> {
        let mut ordered: Vec<&SavedJob> = jobs.values().collect();
        ordered.sort_by_key(|job| job.created_at);
        write_json_atomic(&self.path, &ordered)
    }

    fn name_taken(jobs: &HashMap<String, SavedJob>, name: &str, except: Option<&str>) -> bool {
        let wanted = name.trim().to_lowercase();
        jobs.values().any(|job| {
            Some(job.saved_job_id.as_str()) != except && job.name.trim().to_lowercase() == wanted
        })
    }

    /// Stores a new saved job; names are unique, ignoring case
    pub fn create(&self, job: SavedJob) -> StorageResult<SavedJob> {
        let mut jobs = self.lock()?;
        if Self::name_taken(&jobs, &job.name, None) {
            return Err(StorageError::DuplicateName(job.name));
        }
        jobs.insert(job.saved_job_id.clone(), job.clone());
        if let Err(e) = self.persist(&jobs) {
            jobs.remove(&job.saved_job_id);
            return Err(e);
        }
        tracing::info!("Saved job '{}' ({})", job.name, job.saved_job_id);
        Ok(job)
    }

    /// Applies `edit` to a saved job
    ///
    /// The id and creation time cannot be changed; `updated_at` is stamped.
    pub fn update<F>(&self, saved_job_id: &str, edit: F) -> StorageResult<SavedJob>
    where
        F: FnOnce(&mut SavedJob),
    {
        let mut jobs = self.lock()?;
        let Some(current) = jobs.get(saved_job_id) else {
            return Err(StorageError::SavedJobNotFound(saved_job_id.to_string()));
        };

        let mut edited = current.clone();
        edit(&mut edited);
        edited.saved_job_id = current.saved_job_id.clone();
        edited.created_at = current.created_at;
        edited.updated_at = now_local();

        if Self::name_taken(&jobs, &edited.name, Some(saved_job_id)) {
            return Err(StorageError::DuplicateName(edited.name));
        }

        let previous = jobs.insert(saved_job_id.to_string(), edited.clone());
        if let Err(e) = self.persist(&jobs) {
            if let Some(previous) = previous {
                jobs.insert(saved_job_id.to_string(), previous);
            }
            return Err(e);
        }
        Ok(edited)
    }

    pub fn get(&self, saved_job_id: &str) -> StorageResult<Option<SavedJob>> {
        Ok(self.lock()?.get(saved_job_id).cloned())
    }

    /// All saved jobs, most recently updated first
    pub fn list(&self) -> StorageResult<Vec<SavedJob>> {
        let mut listed: Vec<SavedJob> = self.lock()?.values().cloned().collect();
        listed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(listed)
    }

    /// Case-insensitive lookup by trimmed name
    pub fn find_by_name(&self, name: &str) -> StorageResult<Option<SavedJob>> {
        let wanted = name.trim().to_lowercase();
        Ok(self
            .lock()?
            .values()
            .find(|job| job.name.trim().to_lowercase() == wanted)
            .cloned())
    }

    pub fn delete(&self, saved_job_id: &str) -> StorageResult<bool> {
        let mut jobs = self.lock()?;
        let Some(removed) = jobs.remove(saved_job_id) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&jobs) {
            jobs.insert(saved_job_id.to_string(), removed);
            return Err(e);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::AuthMethod;
    use tempfile::TempDir;

    fn request() -> CrawlRequest {
        let mut request = CrawlRequest::new("https://example.com/docs");
        request.mode = CrawlMode::Link;
        request.formats = vec![OutputFormat::Json];
        request.exclude_anchors = true;
        request
    }

    #[test]
    fn test_create_and_find_by_name() {
        let dir = TempDir::new().unwrap();
        let store = SavedJobStore::open(dir.path().join("saved.json")).unwrap();

        let job = store.create(SavedJob::single("Docs Links", &request(), None)).unwrap();
        let found = store.find_by_name("  docs links ").unwrap().unwrap();
        assert_eq!(found.saved_job_id, job.saved_job_id);
        assert!(store.find_by_name("other").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let dir = TempDir::new().unwrap();
        let store = SavedJobStore::open(dir.path().join("saved.json")).unwrap();

        store.create(SavedJob::single("Nightly", &request(), None)).unwrap();
        let err = store
            .create(SavedJob::single("nightly", &request(), None))
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateName(_)));
    }

    #[test]
    fn test_update_keeps_identity() {
        let dir = TempDir::new().unwrap();
        let store = SavedJobStore::open(dir.path().join("saved.json")).unwrap();
        let job = store.create(SavedJob::single("A", &request(), None)).unwrap();

        let updated = store
            .update(&job.saved_job_id, |j| {
                j.saved_job_id = "hijacked".to_string();
                j.description = "weekly export".to_string();
            })
            .unwrap();

        assert_eq!(updated.saved_job_id, job.saved_job_id);
        assert_eq!(updated.created_at, job.created_at);
        assert_eq!(updated.description, "weekly export");
        assert!(updated.updated_at >= job.updated_at);
        assert!(matches!(
            store.update("missing", |_| {}),
            Err(StorageError::SavedJobNotFound(_))
        ));
    }

    #[test]
    fn test_persisted_and_reloaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saved.json");
        let auth = AuthBlock {
            method: AuthMethod::Cookies,
            cookies: Some("session=abc".to_string()),
            ..AuthBlock::default()
        };

        {
            let store = SavedJobStore::open(&path).unwrap();
            store
                .create(SavedJob::bulk(
                    "Batch",
                    "urls.csv",
                    "url\nhttps://a.com\n".to_string(),
                    true,
                    Some(auth.clone()),
                ))
                .unwrap();
        }

        let store = SavedJobStore::open(&path).unwrap();
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].input_method, InputMethod::Bulk);
        assert!(listed[0].combine_results);
        assert_eq!(listed[0].auth, Some(auth));
        assert!(listed[0].to_request().is_none());
    }

    #[test]
    fn test_to_request_round_trip() {
        let saved = SavedJob::single("A", &request(), None);
        let rebuilt = saved.to_request().unwrap();
        assert_eq!(rebuilt.url, "https://example.com/docs");
        assert_eq!(rebuilt.mode, CrawlMode::Link);
        assert_eq!(rebuilt.formats, vec![OutputFormat::Json]);
        assert!(rebuilt.exclude_anchors);
    }

    #[test]
    fn test_failed_write_is_rolled_back() {
        let dir = TempDir::new().unwrap();
        let store = SavedJobStore::open(dir.path().join("saved.json")).unwrap();
        let job = store.create(SavedJob::single("A", &request(), None)).unwrap();
        std::fs::create_dir(dir.path().join("saved.json.tmp")).unwrap();

        assert!(store.create(SavedJob::single("B", &request(), None)).is_err());
        assert!(store.find_by_name("B").unwrap().is_none());

        assert!(store
            .update(&job.saved_job_id, |j| j.name = "Renamed".to_string())
            .is_err());
        assert_eq!(store.get(&job.saved_job_id).unwrap().unwrap().name, "A");

        assert!(store.delete(&job.saved_job_id).is_err());
        assert!(store.get(&job.saved_job_id).unwrap().is_some());
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let store = SavedJobStore::open(dir.path().join("saved.json")).unwrap();
        let job = store.create(SavedJob::single("A", &request(), None)).unwrap();
        assert!(store.delete(&job.saved_job_id).unwrap());
        assert!(!store.delete(&job.saved_job_id).unwrap());
        assert!(store.get(&job.saved_job_id).unwrap().is_none());
    }
}
