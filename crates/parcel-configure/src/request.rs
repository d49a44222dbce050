//! Configure requests
//!
//! A [`ConfigureRequest`] names the archive to stage, where to stage it,
//! which package operation to run and the correlation context handed to
//! every step.

use chrono::{DateTime, Utc};
use parcel_document::DocumentContext;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

/// Package operation, selecting which document inside the archive runs
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PackageOperation {
    #[default]
    Install,
    Uninstall,
    Validate,
}

impl PackageOperation {
    /// Conventional document file name for this operation
    pub fn document_name(&self) -> &'static str {
        match self {
            PackageOperation::Install => "install.json",
            PackageOperation::Uninstall => "uninstall.json",
            PackageOperation::Validate => "validate.json",
        }
    }
}

impl fmt::Display for PackageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PackageOperation::Install => "install",
            PackageOperation::Uninstall => "uninstall",
            PackageOperation::Validate => "validate",
        };
        f.write_str(s)
    }
}

impl FromStr for PackageOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "install" => Ok(PackageOperation::Install),
            "uninstall" => Ok(PackageOperation::Uninstall),
            "validate" => Ok(PackageOperation::Validate),
            other => Err(format!("unknown package operation: {}", other)),
        }
    }
}

/// A fresh staging directory under `root`
///
/// Each invocation gets its own directory so concurrent invocations never
/// share staging.
pub fn unique_staging_dir(root: &Path) -> PathBuf {
    root.join(format!("parcel-{}", Uuid::new_v4()))
}

/// One package-configure invocation
#[derive(Debug, Clone)]
pub struct ConfigureRequest {
    /// Package archive to extract
    pub archive: PathBuf,

    /// Directory the archive is extracted into; removed afterwards
    pub staging_dir: PathBuf,

    pub operation: PackageOperation,

    /// Overrides the operation's conventional document name
    pub document_name: Option<String>,

    pub bucket: String,
    pub key_prefix: String,
    pub message_id: String,
    pub document_id: String,

    /// Where step artifacts and `result.json` go; empty disables them
    pub orchestration_dir: PathBuf,

    /// Working directory for steps; the staging directory when unset
    pub working_dir: Option<PathBuf>,

    pub created_date: DateTime<Utc>,
}

impl ConfigureRequest {
    pub fn new(
        archive: impl Into<PathBuf>,
        staging_dir: impl Into<PathBuf>,
        operation: PackageOperation,
    ) -> Self {
        Self {
            archive: archive.into(),
            staging_dir: staging_dir.into(),
            operation,
            document_name: None,
            bucket: String::new(),
            key_prefix: String::new(),
            message_id: String::new(),
            document_id: Uuid::new_v4().to_string(),
            orchestration_dir: PathBuf::new(),
            working_dir: None,
            created_date: Utc::now(),
        }
    }

    pub fn with_document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = Some(name.into());
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self.key_prefix = key_prefix.into();
        self
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    pub fn with_document_id(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = document_id.into();
        self
    }

    pub fn with_orchestration_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.orchestration_dir = dir.into();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_created_date(mut self, created: DateTime<Utc>) -> Self {
        self.created_date = created;
        self
    }

    /// Path of the action document inside the staged tree
    pub fn document_path(&self) -> PathBuf {
        let name = self
            .document_name
            .as_deref()
            .unwrap_or_else(|| self.operation.document_name());
        self.staging_dir.join(name)
    }

    /// Effective default working directory for steps
    pub fn default_working_dir(&self) -> &Path {
        self.working_dir.as_deref().unwrap_or(&self.staging_dir)
    }

    /// Context shared by every step of the document
    pub fn document_context(&self) -> DocumentContext {
        DocumentContext::new(
            self.document_id.clone(),
            self.orchestration_dir.clone(),
            self.default_working_dir(),
        )
        .with_bucket(self.bucket.clone(), self.key_prefix.clone())
        .with_message_id(self.message_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_documents() {
        assert_eq!(PackageOperation::Install.document_name(), "install.json");
        assert_eq!(PackageOperation::Uninstall.document_name(), "uninstall.json");
        assert_eq!(PackageOperation::Validate.document_name(), "validate.json");
        assert_eq!("Validate".parse::<PackageOperation>(), Ok(PackageOperation::Validate));
        assert!("upgrade".parse::<PackageOperation>().is_err());
    }

    #[test]
    fn test_unique_staging_dirs_differ() {
        let root = Path::new("/var/lib/parcel/staging");
        let a = unique_staging_dir(root);
        let b = unique_staging_dir(root);

        assert_ne!(a, b);
        assert!(a.starts_with(root));
    }

    #[test]
    fn test_request_defaults() {
        let req = ConfigureRequest::new("/pkgs/a.zip", "/work/pkgA", PackageOperation::Install);

        assert_eq!(req.document_path(), PathBuf::from("/work/pkgA/install.json"));
        assert_eq!(req.default_working_dir(), Path::new("/work/pkgA"));
        assert!(Uuid::parse_str(&req.document_id).is_ok());
    }

    #[test]
    fn test_document_context() {
        let req = ConfigureRequest::new("/pkgs/a.zip", "/work/pkgA", PackageOperation::Uninstall)
            .with_document_name("remove.json")
            .with_bucket("pkg-bucket", "pkgs/a")
            .with_message_id("msg-1")
            .with_document_id("doc-1")
            .with_orchestration_dir("/orch/doc-1")
            .with_working_dir("/opt/a");

        assert_eq!(req.document_path(), PathBuf::from("/work/pkgA/remove.json"));

        let ctx = req.document_context();
        assert_eq!(ctx.document_id, "doc-1");
        assert_eq!(ctx.bucket, "pkg-bucket");
        assert_eq!(ctx.key_prefix, "pkgs/a");
        assert_eq!(ctx.message_id, "msg-1");
        assert_eq!(ctx.default_working_dir, PathBuf::from("/opt/a"));
        assert_eq!(ctx.orchestration_dir, PathBuf::from("/orch/doc-1"));
    }
}
