//! Reporting of execution outcomes to the blueprint server.

pub mod reporter;

pub use reporter::{
    encode, format_timestamp, ConclusionEnvelope, DeliveryResult, OutcomeReporter,
    ScriptConclusion, TIMESTAMP_FORMAT,
};
