//! Scoped preview handles for files picked in the composer
//!
//! Every selected file gets a `preview://N` handle while it is shown. Handles
//! are released when the file is removed, the selection is cleared, the files
//! are handed to a publish request, or the preview is dropped.

use std::collections::HashSet;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::models::UploadFile;

#[derive(Debug, Default)]
struct RegistryState {
    next_id: u64,
    live: HashSet<u64>,
}

/// The set of live preview handles
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self) -> u64 {
        let mut state = self.state();
        state.next_id += 1;
        let id = state.next_id;
        state.live.insert(id);
        id
    }

    fn revoke(&self, id: u64) {
        self.state().live.remove(&id);
    }

    pub fn live_count(&self) -> usize {
        self.state().live.len()
    }

    pub fn is_live(&self, url: &str) -> bool {
        url.strip_prefix("preview://")
            .and_then(|id| id.parse::<u64>().ok())
            .is_some_and(|id| self.state().live.contains(&id))
    }
}

/// A file plus its live preview handle
#[derive(Debug)]
pub struct FilePreview {
    id: u64,
    url: String,
    file: UploadFile,
    registry: PreviewRegistry,
    released: bool,
}

impl FilePreview {
    pub fn new(registry: &PreviewRegistry, file: UploadFile) -> Self {
        let id = registry.register();
        Self {
            id,
            url: format!("preview://{id}"),
            file,
            registry: registry.clone(),
            released: false,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn file(&self) -> &UploadFile {
        &self.file
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Revoke the handle. Safe to call more than once.
    pub fn release(&mut self) {
        if !self.released {
            self.registry.revoke(self.id);
            self.released = true;
        }
    }

    /// Release the handle and keep the bytes
    pub fn into_file(mut self) -> UploadFile {
        self.release();
        mem::take(&mut self.file)
    }
}

impl Drop for FilePreview {
    fn drop(&mut self) {
        self.release();
    }
}

/// The files currently selected in the composer
#[derive(Debug, Default)]
pub struct PreviewSelection {
    registry: PreviewRegistry,
    items: Vec<FilePreview>,
}

impl PreviewSelection {
    pub fn new(registry: PreviewRegistry) -> Self {
        Self {
            registry,
            items: Vec::new(),
        }
    }

    /// Select a file; returns its preview url
    pub fn add(&mut self, file: UploadFile) -> String {
        let preview = FilePreview::new(&self.registry, file);
        let url = preview.url().to_string();
        self.items.push(preview);
        url
    }

    /// Deselect the file at `index`, releasing its handle
    pub fn remove(&mut self, index: usize) -> Option<UploadFile> {
        if index >= self.items.len() {
            return None;
        }
        Some(self.items.remove(index).into_file())
    }

    pub fn clear(&mut self) {
        for item in &mut self.items {
            item.release();
        }
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn urls(&self) -> Vec<&str> {
        self.items.iter().map(FilePreview::url).collect()
    }

    /// Hand the selected files over for publishing, releasing every handle
    pub fn into_files(mut self) -> Vec<UploadFile> {
        mem::take(&mut self.items)
            .into_iter()
            .map(FilePreview::into_file)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(name: &str) -> UploadFile {
        UploadFile::new(name, "image/png", vec![0u8, 1, 2])
    }

    #[test]
    fn release_is_idempotent() {
        let registry = PreviewRegistry::new();
        let mut preview = FilePreview::new(&registry, png("a.png"));
        let url = preview.url().to_string();
        assert!(registry.is_live(&url));

        preview.release();
        preview.release();
        assert!(preview.is_released());
        assert!(!registry.is_live(&url));
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn dropping_a_preview_releases_it() {
        let registry = PreviewRegistry::new();
        {
            let _preview = FilePreview::new(&registry, png("a.png"));
            assert_eq!(registry.live_count(), 1);
        }
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn handles_are_unique() {
        let registry = PreviewRegistry::new();
        let a = FilePreview::new(&registry, png("a.png"));
        let b = FilePreview::new(&registry, png("b.png"));
        assert_ne!(a.url(), b.url());
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn remove_releases_only_that_file() {
        let registry = PreviewRegistry::new();
        let mut selection = PreviewSelection::new(registry.clone());
        selection.add(png("a.png"));
        let kept = selection.add(png("b.png"));

        let removed = selection.remove(0).unwrap();
        assert_eq!(removed.file_name, "a.png");
        assert_eq!(removed.data.as_ref(), &[0u8, 1, 2]);
        assert_eq!(selection.urls(), vec![kept.as_str()]);
        assert_eq!(registry.live_count(), 1);

        assert!(selection.remove(5).is_none());
    }

    #[test]
    fn clear_and_handoff_release_everything() {
        let registry = PreviewRegistry::new();
        let mut selection = PreviewSelection::new(registry.clone());
        selection.add(png("a.png"));
        selection.add(png("b.png"));
        selection.clear();
        assert!(selection.is_empty());
        assert_eq!(registry.live_count(), 0);

        let mut selection = PreviewSelection::new(registry.clone());
        selection.add(png("c.png"));
        selection.add(png("d.png"));
        let files = selection.into_files();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].file_name, "d.png");
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn handed_off_images_publish_as_an_image_post() {
        use crate::domain::composer::{AuthoredPost, MediaKind, PostKind, build_request};
        use crate::models::Destination;
        use crate::session::Session;

        let registry = PreviewRegistry::new();
        let mut selection = PreviewSelection::new(registry.clone());
        selection.add(png("a.png"));
        selection.add(png("b.png"));

        let mut post = AuthoredPost::new("Two photos");
        post.media.image_files = selection.into_files();

        let request = build_request(
            &Session::new(1),
            &post,
            &Destination::new(4, "Shop", "facebook"),
        );
        assert_eq!(request.post_type, PostKind::Image);
        assert_eq!(request.media_type, MediaKind::Image);
        assert_eq!(request.files.len(), 2);
        assert_eq!(registry.live_count(), 0);
    }
}
