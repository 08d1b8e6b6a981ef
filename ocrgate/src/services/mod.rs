mod recognition;

pub use recognition::{
    format_seconds, ImageSource, RecognitionOutcome, RecognitionRequest, RecognitionService,
};
