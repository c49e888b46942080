use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid field name: {0}")]
    InvalidField(String),

    #[error("Range parameter '{key}' expects a number, got '{value}'")]
    InvalidRangeValue { key: String, value: String },

    #[error("Range parameter '{0}' does not name a field")]
    EmptyRangeField(String),
}
