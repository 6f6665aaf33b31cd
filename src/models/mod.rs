pub mod board;
pub mod task;
pub mod user;

use serde::{Deserialize, Deserializer};

/// Distinguishes a missing field (`None`) from an explicit JSON `null`
/// (`Some(None)`) in patch payloads.
pub fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// Status id that marks a task or subtask as finished.
pub const DONE_STATUS: &str = "done";
