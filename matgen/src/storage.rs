//! Durable storage for generated material images.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Category directory generated images are stored under, per project
pub const MATERIALS_CATEGORY: &str = "materials";

/// Trait for material storage backends
#[async_trait]
pub trait MaterialStorage: Send + Sync {
    /// Store a generated image and return its path relative to the storage root,
    /// `{project_id}/materials/{file_name}`
    async fn save_material_image(&self, data: &[u8], mime_type: &str, project_id: &str) -> anyhow::Result<String>;

    /// Public URL of a stored file
    fn file_url(&self, project_id: &str, category: &str, file_name: &str) -> String;
}

// ============================================================================
// Local Filesystem Storage Implementation
// ============================================================================

/// Local filesystem storage backend. Files are served back by the `/files` route.
pub struct LocalMaterialStorage {
    base_path: PathBuf,
    public_base_url: Option<String>,
}

impl LocalMaterialStorage {
    pub fn new(base_path: PathBuf, public_base_url: Option<String>) -> Self {
        Self {
            base_path,
            public_base_url,
        }
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

/// `/files/{segments...}` with each segment percent-encoded.
fn files_path(segments: &[&str]) -> String {
    let mut url = Url::parse("http://localhost/files").expect("static URL is valid");
    if let Ok(mut path) = url.path_segments_mut() {
        path.extend(segments);
    }
    url.path().to_string()
}

/// A project id is used as a directory name, so it must be a single plain path component.
fn is_safe_component(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\', '\0'])
}

#[async_trait]
impl MaterialStorage for LocalMaterialStorage {
    async fn save_material_image(&self, data: &[u8], mime_type: &str, project_id: &str) -> anyhow::Result<String> {
        anyhow::ensure!(is_safe_component(project_id), "Invalid project id for storage: {project_id:?}");

        let file_name = format!("{}.{}", uuid::Uuid::new_v4().simple(), extension_for(mime_type));
        let relative_path = format!("{project_id}/{MATERIALS_CATEGORY}/{file_name}");

        let full_path = self.base_path.join(project_id).join(MATERIALS_CATEGORY).join(&file_name);

        // Ensure parent directory exists
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;

        Ok(relative_path)
    }

    fn file_url(&self, project_id: &str, category: &str, file_name: &str) -> String {
        let base = self.public_base_url.as_deref().unwrap_or("").trim_end_matches('/');
        format!("{base}{}", files_path(&[project_id, category, file_name]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_storage_saves_under_project_materials() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = LocalMaterialStorage::new(temp_dir.path().to_path_buf(), None);

        let relative = storage.save_material_image(b"jpeg bytes", "image/jpeg", "proj-1").await.unwrap();

        assert!(relative.starts_with("proj-1/materials/"));
        assert!(relative.ends_with(".jpg"));
        assert_eq!(std::fs::read(temp_dir.path().join(&relative)).unwrap(), b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_local_storage_names_are_unique() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = LocalMaterialStorage::new(temp_dir.path().to_path_buf(), None);

        let a = storage.save_material_image(b"a", "image/png", "p").await.unwrap();
        let b = storage.save_material_image(b"a", "image/png", "p").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_local_storage_rejects_unsafe_project_ids() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = LocalMaterialStorage::new(temp_dir.path().to_path_buf(), None);

        for id in ["..", "../other", "a/b", ""] {
            assert!(storage.save_material_image(b"x", "image/png", id).await.is_err(), "{id:?} should be rejected");
        }
    }

    #[test]
    fn test_file_url() {
        let relative = LocalMaterialStorage::new(PathBuf::from("uploads"), None);
        assert_eq!(relative.file_url("p1", "materials", "x.png"), "/files/p1/materials/x.png");

        let absolute = LocalMaterialStorage::new(PathBuf::from("uploads"), Some("https://cdn.example.com/".to_string()));
        assert_eq!(absolute.file_url("p1", "materials", "x.png"), "https://cdn.example.com/files/p1/materials/x.png");
    }

    #[test]
    fn test_file_url_encodes_segments() {
        let storage = LocalMaterialStorage::new(PathBuf::from("uploads"), None);
        assert_eq!(
            storage.file_url("my project?#", "materials", "a b.png"),
            "/files/my%20project%3F%23/materials/a%20b.png"
        );
    }

    #[tokio::test]
    async fn test_stored_file_reachable_at_encoded_url() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = LocalMaterialStorage::new(temp_dir.path().to_path_buf(), None);

        let relative = storage.save_material_image(b"x", "image/png", "my project").await.unwrap();
        let file_name = relative.rsplit('/').next().unwrap();

        assert!(relative.starts_with("my project/materials/"));
        assert_eq!(
            storage.file_url("my project", MATERIALS_CATEGORY, file_name),
            format!("/files/my%20project/materials/{file_name}")
        );
    }
}
