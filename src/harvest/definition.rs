//! Validating parser for `define-package` forms.
//!
//! A `-pkg.el` file holds exactly one form:
//!
//! ```text
//! (define-package NAME VERSION [DESCRIPTION [REQUIREMENTS]])
//! ```
//!
//! where REQUIREMENTS is `nil` or a quoted list of `(symbol "version")`
//! pairs. NAME and VERSION must agree with the identity the caller already
//! derived (from the archive directory). The parser stops at the first
//! violation and never reads past the form's closing paren.

use std::io::Read;
use tracing::debug;

use super::sexp::{Token, TokenKind, Tokenizer};
use super::traits::ExtractionError;
use crate::model::DependencyRef;

/// Fields a package definition contributes beyond the expected identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDefinition {
    pub description: String,
    pub required: Vec<DependencyRef>,
}

/// Parses one `define-package` form from `reader`.
///
/// `name` and `version` are the expected identity; a form declaring any
/// other value is rejected with [`ExtractionError::IdentityMismatch`].
///
/// # Errors
///
/// - [`ExtractionError::StructuralMismatch`] for a token of the wrong kind or
///   value, naming what was expected and where
/// - [`ExtractionError::IncompleteInput`] if the input stops inside a string
/// - [`ExtractionError::Io`] if reading fails before the form is complete
pub fn parse_package_definition<R: Read>(
    reader: R,
    name: &str,
    version: &str,
) -> Result<PackageDefinition, ExtractionError> {
    let definition = DefinitionParser {
        tokens: Tokenizer::new(reader),
        name,
        version,
    }
    .parse()?;

    debug!(
        package = name,
        version,
        requirements = definition.required.len(),
        "Parsed package definition"
    );
    Ok(definition)
}

struct DefinitionParser<'a, R> {
    tokens: Tokenizer<R>,
    name: &'a str,
    version: &'a str,
}

impl<R: Read> DefinitionParser<'_, R> {
    fn parse(mut self) -> Result<PackageDefinition, ExtractionError> {
        self.expect(TokenKind::OpenParen, "'(' opening the package definition")?;

        let head = self.tokens.next_token();
        if !head.is_symbol("define-package") {
            return Err(self.mismatch("symbol `define-package`", &head));
        }

        let declared = self.expect(TokenKind::String, "package name string")?;
        if declared.text != self.name {
            return Err(ExtractionError::IdentityMismatch {
                field: "name",
                declared: declared.text,
                expected: self.name.to_string(),
            });
        }

        let declared = self.expect(TokenKind::String, "package version string")?;
        if declared.text != self.version {
            return Err(ExtractionError::IdentityMismatch {
                field: "version",
                declared: declared.text,
                expected: self.version.to_string(),
            });
        }

        let mut definition = PackageDefinition::default();

        let token = self.tokens.next_token();
        match token.kind {
            TokenKind::CloseParen => return Ok(definition),
            TokenKind::String => definition.description = token.text,
            _ => return Err(self.mismatch("description string or ')'", &token)),
        }

        let token = self.tokens.next_token();
        match token.kind {
            TokenKind::CloseParen => return Ok(definition),
            // `nil` and an absent clause both mean no requirements.
            TokenKind::Symbol if token.is_symbol("nil") => {}
            TokenKind::OpenParen => {
                let quote = self.tokens.next_token();
                if !quote.is_symbol("quote") {
                    return Err(self.mismatch("quoted requirement list", &quote));
                }
                definition.required = self.requirements()?;
                self.expect(TokenKind::CloseParen, "')' closing the quoted requirement list")?;
            }
            _ => return Err(self.mismatch("requirement list, `nil` or ')'", &token)),
        }

        self.expect(TokenKind::CloseParen, "')' closing the package definition")?;
        Ok(definition)
    }

    fn requirements(&mut self) -> Result<Vec<DependencyRef>, ExtractionError> {
        self.expect(TokenKind::OpenParen, "'(' opening the requirement list")?;

        let mut required = Vec::new();
        loop {
            let token = self.tokens.next_token();
            match token.kind {
                TokenKind::CloseParen => return Ok(required),
                TokenKind::OpenParen => {
                    let name = self.expect(TokenKind::Symbol, "required package name symbol")?;
                    let version =
                        self.expect(TokenKind::String, "required package version string")?;
                    self.expect(
                        TokenKind::CloseParen,
                        "')' closing the 2-element requirement pair",
                    )?;
                    required.push(DependencyRef::new(name.text, version.text));
                }
                _ => return Err(self.mismatch("requirement pair or ')'", &token)),
            }
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ExtractionError> {
        let token = self.tokens.next_token();
        if token.kind == kind {
            Ok(token)
        } else {
            Err(self.mismatch(what, &token))
        }
    }

    /// Builds the error for an unexpected token.
    ///
    /// A premature end of input is reported by its cause when there is one: a
    /// failed read or a string left open.
    fn mismatch(&mut self, expected: &str, actual: &Token) -> ExtractionError {
        if actual.kind == TokenKind::EndOfInput {
            if let Some(e) = self.tokens.take_io_error() {
                return ExtractionError::Io(e);
            }
            if let Some(truncation) = self.tokens.truncated() {
                return ExtractionError::IncompleteInput {
                    fragment: truncation.fragment.to_string(),
                    offset: truncation.offset,
                };
            }
        }
        ExtractionError::StructuralMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
            offset: actual.offset,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
