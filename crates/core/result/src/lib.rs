#[macro_use]
extern crate serde;

/// Result type with custom Error
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error information
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Error {
    /// Type of error and additional information
    #[serde(flatten)]
    pub error_type: ErrorType,

    /// Where this error occurred
    pub location: String,
}

/// Possible error types
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ErrorType {
    /// This error was not labeled :(
    LabelMe,

    // ? Authentication related errors
    Unauthenticated,

    // ? Request taxonomy
    NotFound,
    Forbidden,
    InvalidArgument {
        reason: String,
    },
    BadRequest {
        reason: String,
    },

    // ? General errors
    DatabaseError {
        operation: String,
        collection: String,
    },
    InternalError,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_type {
            ErrorType::LabelMe => write!(f, "This error has not been labelled."),
            ErrorType::Unauthenticated => write!(f, "Invalid or expired session token."),
            ErrorType::NotFound => write!(f, "The requested resource was not found."),
            ErrorType::Forbidden => write!(f, "You are not allowed to perform this action."),
            ErrorType::InvalidArgument { reason } => write!(f, "{reason}"),
            ErrorType::BadRequest { reason } => write!(f, "{reason}"),
            ErrorType::DatabaseError { .. } => write!(f, "An internal database error occurred."),
            ErrorType::InternalError => write!(f, "An internal error occurred."),
        }
    }
}

impl std::error::Error for Error {}

#[macro_export]
macro_rules! create_error {
    ( $error: ident $( $tt:tt )? ) => {
        $crate::Error {
            error_type: $crate::ErrorType::$error $( $tt )?,
            location: format!("{}:{}:{}", file!(), line!(), column!()),
        }
    };
}

#[macro_export]
macro_rules! create_database_error {
    ( $operation: expr, $collection: expr ) => {
        create_error!(DatabaseError {
            operation: $operation.to_string(),
            collection: $collection.to_string()
        })
    };
}

#[macro_export]
#[cfg(debug_assertions)]
macro_rules! query {
    ( $self: ident, $type: ident, $collection: expr, $($rest:expr),+ ) => {
        Ok($self.$type($collection, $($rest),+).await.unwrap())
    };
}

#[macro_export]
#[cfg(not(debug_assertions))]
macro_rules! query {
    ( $self: ident, $type: ident, $collection: expr, $($rest:expr),+ ) => {
        $self.$type($collection, $($rest),+).await
            .map_err(|_| create_database_error!(stringify!($type), $collection))
    };
}

#[cfg(test)]
mod tests {
    use crate::ErrorType;

    #[test]
    fn use_macro_to_construct_error() {
        let error = create_error!(LabelMe);
        assert!(matches!(error.error_type, ErrorType::LabelMe));
    }

    #[test]
    fn use_macro_to_construct_complex_error() {
        let error = create_error!(BadRequest {
            reason: "Message has already been deleted.".to_string()
        });

        assert!(matches!(error.error_type, ErrorType::BadRequest { .. }));
        assert_eq!(error.to_string(), "Message has already been deleted.");
    }

    #[test]
    fn errors_capture_their_location() {
        let error = create_error!(NotFound);
        assert!(error.location.contains("lib.rs"));
    }
}
