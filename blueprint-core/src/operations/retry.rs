use crate::Result;

/// Unique-constraint collisions are retried this many times in total.
pub(crate) const MAX_INSERT_ATTEMPTS: usize = 2;

/// Run `attempt` again once if it fails on a unique constraint; any other
/// error, or a second violation, is returned as is.
///
/// Immediate transactions keep the pre-checks and the inserts together, so
/// a violation means another writer got in outside of them.
pub(crate) fn retry_on_unique_violation<T, F>(what: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut tries = 1;
    loop {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(error) if error.is_unique_violation() && tries < MAX_INSERT_ATTEMPTS => {
                tracing::warn!("{} hit a unique constraint, retrying: {}", what, error);
                tries += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
