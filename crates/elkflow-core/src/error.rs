use crate::schema::SchemaError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Not unique: {what} ({count} matches)")]
    NotUnique { what: String, count: usize },

    #[error("Duplicate element id `{id}` ({count} elements)")]
    DuplicateId { id: String, count: usize },

    #[error("No registry context is active")]
    Registry,

    #[error("{element} already belongs to a different parent")]
    AlreadyParented { element: String },

    #[error("Adding {child} under {parent} would make the hierarchy cyclic")]
    HierarchyCycle { parent: String, child: String },

    #[error("Layout JSON failed validation: {}", format_schema_errors(.errors))]
    SchemaInvalid { errors: Vec<SchemaError> },

    #[error("Invalid element model: {message}")]
    InvalidModel { message: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidModel {
            message: message.into(),
        }
    }
}

fn format_schema_errors(errors: &[SchemaError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.path, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}
