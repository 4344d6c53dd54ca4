//! Single `.el` file uploads.
//!
//! The metadata lives in the conventional library header:
//!
//! ```text
//! ;;; foo.el --- Frobnicate the foos
//! ;; Author: Jane Doe <jane@example.com>
//! ;; Version: 1.2.3
//! ;; Package-Requires: ((bar "0.1") (baz "2.0"))
//! ;;; Commentary:
//! ;; Free-form text that becomes the readme.
//! ;;; Code:
//! ```
//!
//! The header is scanned line by line with patterns; the Lisp body is never
//! tokenized.

use regex::Regex;
use std::io::{BufRead, BufReader, Read};
use std::sync::LazyLock;
use tracing::debug;

use crate::harvest::codec::encode_details;
use crate::harvest::traits::{ExtractionError, PackageFormat};
use crate::model::{DependencyRef, PackageDescriptor, PackageDetails, PackageKind};

static NAME_DESCRIPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^;;; ([\w-]+)\.el --- (.*)").expect("valid regex"));
static PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^;; ([\w-]+): (.*)").expect("valid regex"));
static REQUIRES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\(([\w-]+) "([0-9.]+)"\)"#).expect("valid regex"));
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^;;; (.*):").expect("valid regex"));
static TEXT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^;;(?: (.*))?$").expect("valid regex"));

/// Handler for single-file uploads.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleFileFormat;

impl PackageFormat for SingleFileFormat {
    fn name(&self) -> &str {
        "single"
    }

    fn kind(&self) -> PackageKind {
        PackageKind::Single
    }

    fn can_handle(&self, file_name: &str, head: &[u8]) -> bool {
        file_name.ends_with(".el") || head.starts_with(b";;; ")
    }

    fn extract(&self, reader: &mut dyn Read) -> Result<PackageDescriptor, ExtractionError> {
        extract_header(BufReader::new(reader))
    }
}

/// Scans a library header into a descriptor.
///
/// # Errors
///
/// Returns [`ExtractionError::RequiredFieldMissing`] when the name,
/// version, or description could not be found, and
/// [`ExtractionError::Io`] when reading fails.
pub fn extract_header<R: BufRead>(mut reader: R) -> Result<PackageDescriptor, ExtractionError> {
    let mut scan = HeaderScan::default();
    let mut buf = Vec::new();
    let mut first = true;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if first {
            scan.first_line(line);
            first = false;
        } else {
            scan.line(line);
        }
    }

    scan.finish()
}

#[derive(Debug, Default)]
struct HeaderScan {
    descriptor: PackageDescriptor,
    details: PackageDetails,
    /// Lines of the commentary block currently being read
    commentary: Option<Vec<String>>,
}

impl HeaderScan {
    fn first_line(&mut self, line: &str) {
        if let Some(caps) = NAME_DESCRIPTION_RE.captures(line) {
            self.descriptor.name = caps[1].to_string();
            self.descriptor.description = caps[2].trim().to_string();
        }
    }

    fn line(&mut self, line: &str) {
        if let Some(caps) = HEADING_RE.captures(line) {
            self.close_commentary();
            if &caps[1] == "Commentary" {
                self.commentary = Some(Vec::new());
            }
            return;
        }

        if let Some(lines) = self.commentary.as_mut() {
            if let Some(caps) = TEXT_LINE_RE.captures(line) {
                let text = caps.get(1).map_or("", |m| m.as_str().trim());
                lines.push(text.to_string());
            }
            return;
        }

        let Some(caps) = PARAM_RE.captures(line) else {
            return;
        };
        let value = caps[2].trim();
        match caps[1].to_lowercase().as_str() {
            "author" => self.descriptor.author = value.to_string(),
            "version" => self.descriptor.latest_version = value.to_string(),
            "package-requires" => {
                self.details.required = REQUIRES_RE
                    .captures_iter(value)
                    .map(|req| DependencyRef::new(&req[1], &req[2]))
                    .collect();
            }
            _ => {}
        }
    }

    // Blank comment lines separate paragraphs; only those at the edges of
    // the block are dropped.
    fn close_commentary(&mut self) {
        let Some(lines) = self.commentary.take() else {
            return;
        };
        let Some(start) = lines.iter().position(|l| !l.is_empty()) else {
            return;
        };
        let end = lines.iter().rposition(|l| !l.is_empty()).unwrap_or(start);
        self.details.readme = lines[start..=end].join("\n") + "\n";
    }

    fn finish(mut self) -> Result<PackageDescriptor, ExtractionError> {
        self.close_commentary();

        let descriptor = &self.descriptor;
        if descriptor.name.is_empty()
            || descriptor.latest_version.is_empty()
            || descriptor.description.is_empty()
        {
            return Err(ExtractionError::RequiredFieldMissing {
                name: self.descriptor.name,
                version: self.descriptor.latest_version,
                description: self.descriptor.description,
            });
        }

        self.descriptor.kind = PackageKind::Single;
        self.descriptor.details = encode_details(&self.details)?;

        debug!(
            package = %self.descriptor.name,
            version = %self.descriptor.latest_version,
            requirements = self.details.required.len(),
            readme_bytes = self.details.readme.len(),
            "Scanned library header"
        );
        Ok(self.descriptor)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::codec::decode_details;

    const SAMPLE_HEADER: &str = ";;; sample-test.el --- A sample package
;;
;; Copyright (c) 2013 Andrew Hyatt
;;
;; Author: Andrew Hyatt <ahyatt@gmail.com>
;; Homepage: http://ignore.for.now
;; URL: http://also.ignored
;; Version: 0.1.2.3
;; Last-Updated: 19 Aug 2012
;; Keywords: fee, fi, fo, fum
;; Package-Requires: ((req1 \"1.0.0\") (req2 \"2.0.0\") (req3 \"3.0.0\"))
;;
;; Simplified BSD License
;;
;;; Commentary:
;;
;; This is the package commentary,
;; which spans multiple lines.
;;
;;; Code:
;;; Etc...
";

    fn extract(input: &str) -> Result<PackageDescriptor, ExtractionError> {
        extract_header(input.as_bytes())
    }

    #[test]
    fn test_complete_header() {
        let pkg = extract(SAMPLE_HEADER).unwrap();
        assert_eq!(pkg.name, "sample-test");
        assert_eq!(pkg.description, "A sample package");
        assert_eq!(pkg.latest_version, "0.1.2.3");
        assert_eq!(pkg.author, "Andrew Hyatt <ahyatt@gmail.com>");
        assert_eq!(pkg.kind, PackageKind::Single);

        let details = decode_details(&pkg.details).unwrap();
        assert_eq!(
            details.required,
            vec![
                DependencyRef::new("req1", "1.0.0"),
                DependencyRef::new("req2", "2.0.0"),
                DependencyRef::new("req3", "3.0.0"),
            ]
        );
        assert_eq!(
            details.readme,
            "This is the package commentary,\nwhich spans multiple lines.\n"
        );
    }

    #[test]
    fn test_empty_input_is_missing_fields() {
        let err = extract("").unwrap_err();
        assert!(matches!(err, ExtractionError::RequiredFieldMissing { .. }));
    }

    #[test]
    fn test_missing_version_reports_parsed_values() {
        let err = extract(";;; foo.el --- Foo things\n;; Author: Someone\n").unwrap_err();
        match err {
            ExtractionError::RequiredFieldMissing {
                name,
                version,
                description,
            } => {
                assert_eq!(name, "foo");
                assert_eq!(version, "");
                assert_eq!(description, "Foo things");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_lines_inside_commentary_are_kept() {
        let input = ";;; foo.el --- Foo
;; Version: 1.0
;;; Commentary:
;;
;; First paragraph.
;;
;; Second paragraph.
;;
;;
;;; Code:
";
        let details = decode_details(&extract(input).unwrap().details).unwrap();
        assert_eq!(details.readme, "First paragraph.\n\nSecond paragraph.\n");
    }

    #[test]
    fn test_commentary_only_blank_lines_leaves_readme_empty() {
        let input = ";;; foo.el --- Foo\n;; Version: 1.0\n;;; Commentary:\n;;\n;;\n;;; Code:\n";
        let details = decode_details(&extract(input).unwrap().details).unwrap();
        assert_eq!(details.readme, "");
    }

    #[test]
    fn test_commentary_ends_at_any_heading_and_skips_code() {
        let input = ";;; foo.el --- Foo
;;; Commentary:
;; Usage notes.
(defun not-a-comment ())
;;; Change Log:
;; 1.0 - first release
;; Version: 9.9
;;; Code:
;; Version: 1.0
";
        let pkg = extract(input).unwrap();
        let details = decode_details(&pkg.details).unwrap();
        assert_eq!(details.readme, "Usage notes.\n");
        assert_eq!(pkg.latest_version, "1.0");
    }

    #[test]
    fn test_package_requires_replaces_previous_value() {
        let input = ";;; foo.el --- Foo
;; Version: 1.0
;; Package-Requires: ((old \"0.1\"))
;; package-requires: ((emacs \"24.3\") (cl-lib \"0.5\"))
";
        let details = decode_details(&extract(input).unwrap().details).unwrap();
        assert_eq!(
            details.required,
            vec![
                DependencyRef::new("emacs", "24.3"),
                DependencyRef::new("cl-lib", "0.5"),
            ]
        );
    }

    #[test]
    fn test_crlf_and_missing_final_newline() {
        let input = ";;; foo.el --- Foo things  \r\n;; AUTHOR: Someone\r\n;; Version: 2.1";
        let pkg = extract(input).unwrap();
        assert_eq!(pkg.description, "Foo things");
        assert_eq!(pkg.author, "Someone");
        assert_eq!(pkg.latest_version, "2.1");
    }

    #[test]
    fn test_first_line_must_carry_name() {
        let input = ";; Version: 1.0\n;;; foo.el --- Foo\n";
        assert!(matches!(
            extract(input),
            Err(ExtractionError::RequiredFieldMissing { .. })
        ));
    }

    #[test]
    fn test_can_handle() {
        let format = SingleFileFormat;
        assert!(format.can_handle("foo.el", b""));
        assert!(format.can_handle("", b";;; foo.el --- Foo"));
        assert!(!format.can_handle("foo.tar", b"foo-1.0/"));
    }
}
