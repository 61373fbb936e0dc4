use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Technology / mask errors
    #[error("Unknown polling technology: {0}")]
    UnknownTechnology(String),

    #[error("Invalid technology mask: {mask:#x}")]
    InvalidTechMask { mask: u32 },

    // Screen state errors
    #[error("Invalid screen state code: {code}")]
    InvalidScreenState { code: u8 },

    // Tag errors
    #[error("Invalid tag UID length: {len}")]
    InvalidUidLength { len: usize },

    // Caller input errors
    #[error("Reader mode requested with an empty technology set")]
    EmptyReaderModeTechs,
}

pub type Result<T> = std::result::Result<T, Error>;
