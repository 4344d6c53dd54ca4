//! Read side of the archive: what package.el fetches.
//!
//! - `archive-contents`, the index of every package ([`render_archive_contents`])
//! - `<name>-readme.txt`, a package's readme ([`readme_text`])
//! - `<name>-<version>.el` / `.tar`, the uploaded content

use regex::Regex;
use std::sync::{Arc, LazyLock};
use thiserror::Error;
use tracing::{debug, warn};

use crate::harvest::codec::decode_details;
use crate::harvest::traits::CodecError;
use crate::model::PackageDescriptor;
use crate::traits::{PackageStore, StoreError};

static CONTENTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\w-]+)-([\d.]+)\.(?:el|tar)$").expect("valid regex"));

const README_SUFFIX: &str = "-readme.txt";

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Invalid package request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

// ============================================================================
// Rendering
// ============================================================================

/// `"1.2.3"` → `(1 2 3)`
pub fn version_list(version: &str) -> String {
    format!("({})", version.split('.').collect::<Vec<_>>().join(" "))
}

/// Renders the requirements in an encoded details blob.
///
/// No requirements, or a blob that fails to decode, renders as `nil`.
pub fn required_list(details: &[u8]) -> String {
    let details = match decode_details(details) {
        Ok(details) => details,
        Err(e) => {
            warn!(error = %e, "Rendering undecodable details as nil");
            return "nil".to_string();
        }
    };
    if details.required.is_empty() {
        return "nil".to_string();
    }
    let parts: Vec<String> = details
        .required
        .iter()
        .map(|req| format!("({} {})", req.name, version_list(&req.version)))
        .collect();
    format!("({})", parts.join(" "))
}

fn lisp_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Renders the `archive-contents` file for the given packages.
pub fn render_archive_contents(packages: &[PackageDescriptor]) -> String {
    let mut out = String::from("(1 ");
    for pkg in packages {
        out.push_str(&format!(
            "\n({} . [{} {} {} {}])",
            pkg.name,
            version_list(&pkg.latest_version),
            required_list(&pkg.details),
            lisp_string(&pkg.description),
            pkg.kind.as_str()
        ));
    }
    out.push_str(")\n");
    out
}

/// Readme served for a package: its readme without carriage returns, or
/// the description when it has none.
pub fn readme_text(pkg: &PackageDescriptor) -> Result<String, CodecError> {
    let details = decode_details(&pkg.details)?;
    if details.readme.is_empty() {
        Ok(pkg.description.clone())
    } else {
        Ok(details.readme.replace('\r', ""))
    }
}

// ============================================================================
// Requests
// ============================================================================

/// A file requested under `/packages/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageRequest {
    Readme { name: String },
    Contents { name: String, version: String },
}

impl PackageRequest {
    /// Parses the last segment of a request path.
    pub fn parse(path: &str) -> Result<Self, IndexError> {
        let file = path.rsplit('/').next().unwrap_or(path);

        if let Some(name) = file.strip_suffix(README_SUFFIX) {
            if name.is_empty() {
                return Err(IndexError::InvalidRequest(file.to_string()));
            }
            return Ok(Self::Readme {
                name: name.to_string(),
            });
        }

        let caps = CONTENTS_RE
            .captures(file)
            .ok_or_else(|| IndexError::InvalidRequest(file.to_string()))?;
        Ok(Self::Contents {
            name: caps[1].to_string(),
            version: caps[2].to_string(),
        })
    }
}

/// Serves index, readme, and content requests from a store.
pub struct PackageIndex<S: PackageStore> {
    store: Arc<S>,
}

impl<S: PackageStore> PackageIndex<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn archive_contents(&self) -> Result<String, IndexError> {
        let packages = self.store.packages().await?;
        debug!(packages = packages.len(), "Rendering archive contents");
        Ok(render_archive_contents(&packages))
    }

    /// Body for a `/packages/<file>` request.
    pub async fn serve(&self, path: &str) -> Result<Vec<u8>, IndexError> {
        match PackageRequest::parse(path)? {
            PackageRequest::Readme { name } => {
                let pkg = self.store.package(&name).await?;
                Ok(readme_text(&pkg)?.into_bytes())
            }
            PackageRequest::Contents { name, version } => {
                let contents = self.store.contents(&name, &version).await?;
                Ok(contents.content)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::codec::encode_details;
    use crate::model::{DependencyRef, PackageDetails, PackageKind, StoredContents};
    use crate::store::MemoryStore;
    use std::time::SystemTime;

    fn descriptor(name: &str, version: &str, details: &PackageDetails) -> PackageDescriptor {
        PackageDescriptor {
            name: name.to_string(),
            description: format!("The {name} package"),
            latest_version: version.to_string(),
            author: String::new(),
            kind: PackageKind::Single,
            details: encode_details(details).unwrap(),
        }
    }

    #[test]
    fn test_version_list() {
        assert_eq!(version_list("0.1.2.3"), "(0 1 2 3)");
        assert_eq!(version_list("24"), "(24)");
    }

    #[test]
    fn test_required_list() {
        let details = PackageDetails {
            readme: String::new(),
            required: vec![
                DependencyRef::new("req1", "1.0.0"),
                DependencyRef::new("cl-lib", "0.5"),
            ],
        };
        assert_eq!(
            required_list(&encode_details(&details).unwrap()),
            "((req1 (1 0 0)) (cl-lib (0 5)))"
        );
        assert_eq!(
            required_list(&encode_details(&PackageDetails::default()).unwrap()),
            "nil"
        );
        assert_eq!(required_list(b"\xff\xff"), "nil");
    }

    #[test]
    fn test_render_archive_contents() {
        let foo = descriptor(
            "foo",
            "1.2",
            &PackageDetails {
                readme: String::new(),
                required: vec![DependencyRef::new("bar", "0.1")],
            },
        );
        let mut bar = descriptor("bar", "0.1", &PackageDetails::default());
        bar.description = "Says \"hi\"".to_string();
        bar.kind = PackageKind::Tar;

        let rendered = render_archive_contents(&[bar, foo]);
        assert_eq!(
            rendered,
            "(1 \n(bar . [(0 1) nil \"Says \\\"hi\\\"\" tar])\n(foo . [(1 2) ((bar (0 1))) \"The foo package\" single]))\n"
        );
        assert_eq!(render_archive_contents(&[]), "(1 )\n");
    }

    #[test]
    fn test_readme_text() {
        let with_readme = descriptor(
            "foo",
            "1.0",
            &PackageDetails {
                readme: "Line one\r\nLine two\r\n".to_string(),
                required: vec![],
            },
        );
        assert_eq!(readme_text(&with_readme).unwrap(), "Line one\nLine two\n");

        let without = descriptor("foo", "1.0", &PackageDetails::default());
        assert_eq!(readme_text(&without).unwrap(), "The foo package");
    }

    #[test]
    fn test_parse_requests() {
        assert_eq!(
            PackageRequest::parse("/packages/sample-test-readme.txt").unwrap(),
            PackageRequest::Readme {
                name: "sample-test".to_string()
            }
        );
        assert_eq!(
            PackageRequest::parse("/packages/sample-test-0.1.2.3.el").unwrap(),
            PackageRequest::Contents {
                name: "sample-test".to_string(),
                version: "0.1.2.3".to_string()
            }
        );
        assert_eq!(
            PackageRequest::parse("foo-2.0.tar").unwrap(),
            PackageRequest::Contents {
                name: "foo".to_string(),
                version: "2.0".to_string()
            }
        );
        assert!(PackageRequest::parse("/packages/-readme.txt").is_err());
        assert!(PackageRequest::parse("/packages/foo.el").is_err());
        assert!(PackageRequest::parse("/packages/foo-1.0.zip").is_err());
    }

    #[tokio::test]
    async fn test_serve_from_store() {
        let store = Arc::new(MemoryStore::new());
        let details = PackageDetails {
            readme: "Readme\r\n".to_string(),
            required: vec![],
        };
        store
            .publish(
                descriptor("foo", "1.0", &details),
                StoredContents {
                    version: "1.0".to_string(),
                    content: b";;; foo.el --- Foo".to_vec(),
                    upload_time: SystemTime::now(),
                },
            )
            .await
            .unwrap();

        let index = PackageIndex::new(store);
        assert_eq!(index.serve("/packages/foo-readme.txt").await.unwrap(), b"Readme\n");
        assert_eq!(
            index.serve("/packages/foo-1.0.el").await.unwrap(),
            b";;; foo.el --- Foo"
        );
        assert!(matches!(
            index.serve("/packages/foo-2.0.el").await,
            Err(IndexError::Store(StoreError::VersionNotFound { .. }))
        ));
        assert!(matches!(
            index.serve("/packages/nope").await,
            Err(IndexError::InvalidRequest(_))
        ));
        assert_eq!(
            index.archive_contents().await.unwrap(),
            "(1 \n(foo . [(1 0) nil \"The foo package\" single]))\n"
        );
    }
}
