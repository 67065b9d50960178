use crate::mapping::{AssetId, BundleId};
use crate::tasks::LoadTaskHandle;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "Asset {} not found in mapping.", _0)]
    AssetNotFound(AssetId),
    #[fail(display = "Bundle {} is not being loaded.", _0)]
    BundleNotTracked(BundleId),
    #[fail(display = "Loading task {} is invalid.", _0)]
    InvalidHandle(LoadTaskHandle),
    #[fail(display = "Mapping is malformed: {}", _0)]
    Malformed(String),
    #[fail(display = "{}", _0)]
    IO(::std::io::Error),
    #[fail(display = "{}", _0)]
    Json(::serde_json::Error),
}

pub type Result<T> = ::std::result::Result<T, Error>;

impl From<::std::io::Error> for Error {
    fn from(err: ::std::io::Error) -> Self {
        Error::IO(err)
    }
}

impl From<::serde_json::Error> for Error {
    fn from(err: ::serde_json::Error) -> Self {
        Error::Json(err)
    }
}
