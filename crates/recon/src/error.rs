use std::fmt;

/// Errors of a checker pass, generic over the catalog's own error type.
#[derive(Debug)]
pub enum CheckError<E> {
    /// The catalog schema lacks aggregate attributes (`Entity.attribute` list).
    Unsupported { missing: Vec<String> },
    /// A selector was given and no investigation matched it.
    NoSuchInvestigation(String),
    /// Summing dataset observations overflowed `i64` for this label.
    Overflow(String),
    /// A catalog query or update failed; the pass is aborted.
    Catalog(E),
}

impl<E: fmt::Display> fmt::Display for CheckError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported { missing } => write!(
                f,
                "this ICAT server does not support the size attributes in Datasets and Investigations (missing: {})",
                missing.join(", ")
            ),
            Self::NoSuchInvestigation(sel) => write!(f, "no investigation matches '{sel}'"),
            Self::Overflow(label) => write!(f, "{label}: file totals overflow a 64-bit integer"),
            Self::Catalog(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CheckError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Catalog(e) => Some(e),
            _ => None,
        }
    }
}
