use std::io::Cursor;

use image::{ImageBuffer, Rgb, RgbImage};
use tempfile::TempDir;

use spotter::core::db::{AppDb, NewUser};
use spotter::detection::{Detector, RawDetections};

/// Creates an AppDb backed by a temporary file.
/// Returns both the db and the temp directory (which must be kept alive).
pub async fn create_test_db() -> (AppDb, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let db = AppDb::connect(dir.path().join("test.db"))
        .await
        .expect("Failed to open test database");
    (db, dir)
}

/// Opens a second, plain connection to a test database created by
/// [`create_test_db`], for direct SQL such as backdating rows.
pub async fn raw_test_db(dir: &TempDir) -> sqlx::SqliteConnection {
    use sqlx::ConnectOptions;
    sqlx::sqlite::SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .connect()
        .await
        .expect("Failed to open raw connection")
}

/// Creates a MediaStore rooted in a temporary directory.
pub fn create_test_media() -> (spotter::core::media::MediaStore, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let media =
        spotter::core::media::MediaStore::new(dir.path()).expect("Failed to create media store");
    (media, dir)
}

/// Encodes a solid-color test image as JPEG bytes.
pub fn test_image_bytes(width: u32, height: u32) -> Vec<u8> {
    let img: RgbImage = ImageBuffer::from_fn(width, height, |_, _| Rgb([40u8, 120u8, 200u8]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .expect("Failed to encode test image");
    bytes
}

/// Creates a NewUser with a real password hash for "hunter2-hunter2".
pub fn make_new_user(username: &str, email: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: email.to_string(),
        password_hash: spotter::auth::hash_password("hunter2-hunter2")
            .expect("Failed to hash test password"),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        phone: String::new(),
        birth_date: None,
        city: String::new(),
        address: String::new(),
        newsletter: false,
        terms_accepted: true,
    }
}

/// A detector that returns a fixed set of detections, for exercising the
/// pipeline without a model file.
pub struct MockDetector {
    pub raw: RawDetections,
}

impl MockDetector {
    /// One confident dog detection in the middle of the frame.
    pub fn single_dog() -> Self {
        Self {
            raw: RawDetections {
                boxes: vec![[0.2, 0.3, 0.6, 0.7]],
                scores: vec![0.91],
                classes: vec![18],
            },
        }
    }

    pub fn empty() -> Self {
        Self {
            raw: RawDetections::default(),
        }
    }
}

impl Detector for MockDetector {
    fn detect(&self, _image: &image::RgbImage) -> anyhow::Result<RawDetections> {
        Ok(self.raw.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
