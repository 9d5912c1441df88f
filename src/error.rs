//! Error types shared by the store, the loaders and the merge engine.

/// Errors produced while loading feeds or answering queries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A query matched nothing, or an upstream resource is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A static or real-time payload could not be understood.
    #[error("parse error in {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// Network or transport failure.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The very first static catalog load failed; there is no usable data yet.
    #[error("failed to load initial static GTFS data: {0}")]
    InitialLoad(#[source] Box<Error>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn parse(source_name: impl Into<String>, message: impl ToString) -> Self {
        Error::Parse {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status == reqwest::StatusCode::NOT_FOUND => {
                Error::NotFound(err.to_string())
            }
            _ => Error::Fetch(err.to_string()),
        }
    }
}

impl From<prost::DecodeError> for Error {
    fn from(err: prost::DecodeError) -> Self {
        Error::parse("GTFS-RT feed", err)
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::parse("GTFS CSV", err)
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::FileNotFound => Error::NotFound("file not found in archive".into()),
            other => Error::parse("GTFS archive", other),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(err.to_string()),
            _ => Error::Fetch(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::NotFound("route X".into());
        assert_eq!(err.to_string(), "not found: route X");

        let err = Error::parse("stops.txt", "missing required column: stop_lat");
        assert_eq!(
            err.to_string(),
            "parse error in stops.txt: missing required column: stop_lat"
        );

        let err = Error::InitialLoad(Box::new(Error::Fetch("HTTP 503".into())));
        assert_eq!(
            err.to_string(),
            "failed to load initial static GTFS data: fetch error: HTTP 503"
        );
    }

    #[test]
    fn io_not_found_maps_to_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "stops.txt");
        assert!(matches!(Error::from(io), Error::NotFound(_)));
    }

    #[test]
    fn decode_error_maps_to_parse() {
        use prost::Message;

        let err = crate::gtfs_rt::FeedMessage::decode(&[0xFF, 0xFE, 0x00, 0x01][..]).unwrap_err();
        assert!(matches!(Error::from(err), Error::Parse { .. }));
    }
}
