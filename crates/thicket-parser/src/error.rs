/// Rejected parser configuration. Raised before any parsing work starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("included range {index} overlaps or precedes the range before it")]
    InvalidIncludedRanges { index: usize },

    #[error("unknown input encoding `{0}`")]
    UnknownEncoding(String),

    #[error("the previous tree was produced by a different language")]
    LanguageMismatch,

    #[error("no language has been assigned to the parser")]
    NoLanguage,
}
