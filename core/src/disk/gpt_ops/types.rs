// Common types for GPT operations

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GptError {
    IoError,
    InvalidHeader,
    TableFull,
}
