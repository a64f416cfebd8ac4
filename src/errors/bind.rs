use crate::any::Key;

#[derive(thiserror::Error, Debug)]
pub enum BindErrorKind {
    #[error("Duplicated bind for {key}")]
    Duplicate { key: Key },
    #[error("Invalid binding configuration for {key}: {reason}")]
    InvalidConfiguration { key: Key, reason: &'static str },
}
