use thiserror::Error;

/// Errors reported by a saliency engine implementation
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine could not produce a usable saliency map
    #[error("Saliency computation failed")]
    ComputationFailed,
}

/// Failure of a single compute-and-validate attempt.
///
/// These never reach the client directly: the service retries them and only
/// surfaces the message of the last one inside [`SaliencyError::ProcessingExhausted`].
#[derive(Debug, Clone, Error)]
pub enum AttemptError {
    /// The engine reported failure
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The thresholded mask was empty or had too little variation
    #[error("Output is invalid. Retrying...")]
    InvalidOutput,

    /// Engine or binarizer output does not match the decoded image
    #[error("Saliency map is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// The mask could not be encoded as PNG
    #[error("Failed to encode mask: {message}")]
    Encode { message: String },

    /// The worker running the attempt panicked
    #[error("Saliency worker panicked: {message}")]
    Panicked { message: String },
}

/// Request-level errors returned by the saliency service.
///
/// Each variant maps to an HTTP status in the server layer.
#[derive(Debug, Clone, Error)]
pub enum SaliencyError {
    /// Filename extension is not .png, .jpg or .jpeg (HTTP 400)
    #[error("Invalid file format. Only PNG/JPEG allowed.")]
    InvalidFormat,

    /// The decoder rejected the uploaded bytes (HTTP 400)
    #[error("Error reading image: {message}")]
    DecodeError { message: String },

    /// The decoder produced an image with no pixels (HTTP 400)
    #[error("Failed to decode image. Please check the file.")]
    EmptyImage,

    /// Every attempt failed (HTTP 500)
    #[error("Processing failed after {attempts} attempts: {last_error}")]
    ProcessingExhausted { attempts: u32, last_error: String },

    /// The multipart request had no `file` field (HTTP 422)
    #[error("Field required: file")]
    MissingFile,

    /// The multipart body could not be read (HTTP 400)
    #[error("Invalid multipart body: {message}")]
    Multipart { message: String },

    /// The upload exceeded the configured body limit (HTTP 413)
    #[error("Upload too large: {message}")]
    UploadTooLarge { message: String },

    /// Unexpected failure outside the retry loop (HTTP 500)
    #[error("Internal error: {message}")]
    Internal { message: String },
}
