use std::fmt;

/// String identifier selecting which signing strategy applies to a request,
/// e.g. `v4` or one of its presign variants like `v4-query`.
///
/// The empty identifier is reserved as the unsigned sentinel: it never maps
/// to a registered strategy and instructs the signer to skip signing
/// entirely for an operation.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SignatureVersion(String);

impl SignatureVersion {
    /// Create a signature version from an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The sentinel version that disables signing.
    ///
    /// A choose-signer listener answering with a blank identifier selects
    /// this sentinel, opting the operation out of signing.
    pub fn unsigned() -> Self {
        Self(String::new())
    }

    /// Whether this is the unsigned sentinel.
    pub fn is_unsigned(&self) -> bool {
        self.0.is_empty()
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the presign variant of this version by appending the variant
    /// suffix. Idempotent: an identifier already carrying the suffix is
    /// returned unchanged.
    pub fn with_variant(&self, variant: PresignVariant) -> Self {
        let suffix = variant.suffix();
        if self.0.ends_with(suffix) {
            self.clone()
        } else {
            Self(format!("{}{}", self.0, suffix))
        }
    }

    /// The base family of the identifier: the text before the first `-`.
    ///
    /// `v4-query` and `v4-presign-post` both belong to family `v4`.
    pub fn family(&self) -> &str {
        self.0.split('-').next().unwrap_or_default()
    }
}

impl fmt::Debug for SignatureVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unsigned() {
            f.write_str("SignatureVersion(unsigned)")
        } else {
            write!(f, "SignatureVersion({})", self.0)
        }
    }
}

impl fmt::Display for SignatureVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SignatureVersion {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Presign variants a base signature version can be specialized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresignVariant {
    /// Signature embedded in the url query string.
    Query,
    /// Signature returned as form fields for a POST upload.
    PostForm,
}

impl PresignVariant {
    /// The suffix appended to a base version identifier for this variant.
    pub fn suffix(&self) -> &'static str {
        match self {
            PresignVariant::Query => "-query",
            PresignVariant::PostForm => "-presign-post",
        }
    }
}
