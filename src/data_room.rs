// 🗂️ Data Room - Document storage per business
// Local filesystem backend: <base>/<business_id>/<uuid><ext>

use crate::error::{CoreError, CoreResult};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Name as uploaded by the seller
    pub filename: String,

    /// Name on disk (UUID + original extension)
    pub stored_name: String,

    pub size: u64,

    pub sha256: String,

    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareableLink {
    pub shareable_link: String,
    pub expiry: DateTime<Utc>,
    pub recipient: String,
}

/// Sidecar metadata kept next to each stored blob
const META_SUFFIX: &str = ".meta.json";

pub struct DataRoom {
    base_path: PathBuf,
}

impl DataRoom {
    /// Create the data room, making the base directory if needed
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)
            .with_context(|| format!("Failed to create data room at {:?}", base_path))?;
        Ok(DataRoom { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn business_folder(&self, business_id: &str) -> Result<PathBuf> {
        validate_path_component("business_id", business_id)?;
        Ok(self.base_path.join(business_id))
    }

    /// Store a named byte blob under a business identifier
    pub fn upload_document(
        &self,
        business_id: &str,
        filename: &str,
        content: &[u8],
    ) -> Result<StoredDocument> {
        let folder = self.business_folder(business_id)?;
        fs::create_dir_all(&folder)
            .with_context(|| format!("Failed to create folder for business {}", business_id))?;

        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let stored_name = format!("{}{}", uuid::Uuid::new_v4(), extension);

        let document = StoredDocument {
            filename: filename.to_string(),
            stored_name: stored_name.clone(),
            size: content.len() as u64,
            sha256: format!("{:x}", Sha256::digest(content)),
            uploaded_at: Utc::now(),
        };

        write_blob(&folder, &document, content)?;

        tracing::info!(
            business_id,
            filename,
            stored_name = %stored_name,
            size = document.size,
            "document uploaded"
        );

        Ok(document)
    }

    /// List blobs for a business identifier, oldest upload first
    pub fn list_documents(&self, business_id: &str) -> Result<Vec<StoredDocument>> {
        let folder = self.business_folder(business_id)?;
        if !folder.exists() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        for entry in fs::read_dir(&folder)
            .with_context(|| format!("Failed to read folder {:?}", folder))?
        {
            let path = entry?.path();
            let is_meta = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(META_SUFFIX))
                .unwrap_or(false);
            if !is_meta {
                continue;
            }

            let raw = fs::read(&path).with_context(|| format!("Failed to read {:?}", path))?;
            let document: StoredDocument = serde_json::from_slice(&raw)
                .with_context(|| format!("Corrupt document metadata {:?}", path))?;
            documents.push(document);
        }

        documents.sort_by(|a, b| {
            a.uploaded_at
                .cmp(&b.uploaded_at)
                .then_with(|| a.stored_name.cmp(&b.stored_name))
        });

        Ok(documents)
    }

    /// Read back a stored blob
    pub fn read_document(&self, business_id: &str, stored_name: &str) -> Result<Vec<u8>> {
        validate_path_component("stored_name", stored_name)?;
        let path = self.business_folder(business_id)?.join(stored_name);
        fs::read(&path).with_context(|| format!("Failed to read document {:?}", path))
    }

    /// Mock presigned link; a real deployment would sign an object-store URL
    pub fn shareable_link(&self, recipient_id: &str, expiry_hours: i64) -> CoreResult<ShareableLink> {
        Ok(ShareableLink {
            shareable_link: format!("/api/documents/shared/{}", uuid::Uuid::new_v4()),
            expiry: share_link_expiry(expiry_hours)?,
            recipient: recipient_id.to_string(),
        })
    }
}

/// Blob then sidecar; a blob without its sidecar is never listed, so drop it on failure
fn write_blob(folder: &Path, document: &StoredDocument, content: &[u8]) -> Result<()> {
    let file_path = folder.join(&document.stored_name);
    fs::write(&file_path, content)
        .with_context(|| format!("Failed to write document {:?}", file_path))?;

    let meta_path = folder.join(format!("{}{}", document.stored_name, META_SUFFIX));
    let meta_written = serde_json::to_vec(document)
        .map_err(anyhow::Error::from)
        .and_then(|meta| {
            fs::write(&meta_path, meta)
                .with_context(|| format!("Failed to write document metadata {:?}", meta_path))
        });

    if let Err(err) = meta_written {
        let _ = fs::remove_file(&file_path);
        return Err(err);
    }
    Ok(())
}

/// Expiry timestamp `expiry_hours` from now; must be positive and representable
pub fn share_link_expiry(expiry_hours: i64) -> CoreResult<DateTime<Utc>> {
    if expiry_hours <= 0 {
        return Err(CoreError::invalid_input("expiry_hours", "must be positive"));
    }
    Duration::try_hours(expiry_hours)
        .and_then(|d| Utc::now().checked_add_signed(d))
        .ok_or_else(|| CoreError::invalid_input("expiry_hours", "out of range"))
}

/// Path-component names only: no separators, no `..`, not empty
fn validate_path_component(field: &str, value: &str) -> Result<(), CoreError> {
    if value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\'])
        || value.contains('\0')
    {
        return Err(CoreError::invalid_input(
            field,
            format!("'{}' is not a valid identifier", value),
        ));
    }
    Ok(())
}
