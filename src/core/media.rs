use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use image::RgbImage;
use tokio::fs as async_fs;
use uuid::Uuid;

const ORIGINAL_DIR: &str = "original";
const PROCESSED_DIR: &str = "processed";
const AVATAR_DIR: &str = "avatars";

/// Filesystem store for uploaded and generated media, rooted at the
/// configured media directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        for dir in [ORIGINAL_DIR, PROCESSED_DIR, AVATAR_DIR] {
            fs::create_dir_all(root.join(dir))
                .with_context(|| format!("failed to create media dir {:?}", root.join(dir)))?;
        }
        Ok(Self { root })
    }

    /// Store an uploaded original under a fresh UUID filename, keeping the
    /// upload's extension. Returns the stored filename.
    pub async fn store_original(&self, upload_name: &str, bytes: &[u8]) -> anyhow::Result<String> {
        let fname = uuid_filename(upload_name);
        let dest = self.root.join(ORIGINAL_DIR).join(&fname);
        async_fs::write(&dest, bytes)
            .await
            .with_context(|| format!("failed to write original image {dest:?}"))?;
        Ok(fname)
    }

    pub async fn load_original(&self, fname: &str) -> anyhow::Result<Vec<u8>> {
        let path = self.original_path(fname);
        async_fs::read(&path)
            .await
            .with_context(|| format!("failed to read original image {path:?}"))
    }

    /// Write the annotated image as a PNG next to the originals. The
    /// filename ties the output back to its record and source upload.
    pub fn store_processed(&self, record_id: i64, image: &RgbImage) -> anyhow::Result<String> {
        let fname = format!("processed_{record_id}.png");
        let dest = self.root.join(PROCESSED_DIR).join(&fname);
        image
            .save(&dest)
            .with_context(|| format!("failed to write processed image {dest:?}"))?;
        Ok(fname)
    }

    pub async fn store_avatar(&self, upload_name: &str, bytes: &[u8]) -> anyhow::Result<String> {
        let fname = uuid_filename(upload_name);
        let dest = self.root.join(AVATAR_DIR).join(&fname);
        async_fs::write(&dest, bytes)
            .await
            .with_context(|| format!("failed to write avatar {dest:?}"))?;
        Ok(fname)
    }

    pub fn original_path(&self, fname: &str) -> PathBuf {
        self.root.join(ORIGINAL_DIR).join(fname)
    }

    pub fn processed_path(&self, fname: &str) -> PathBuf {
        self.root.join(PROCESSED_DIR).join(fname)
    }
}

fn uuid_filename(upload_name: &str) -> String {
    match Path::new(upload_name).extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_lowercase()),
        None => Uuid::new_v4().to_string(),
    }
}
