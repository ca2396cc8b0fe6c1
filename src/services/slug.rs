//! Unique slug allocation.
//!
//! `allocate_slug` tries `base`, `base-1`, `base-2`, ... until the lookup
//! reports no owner, or reports the entity being edited (`exclude_id`).
//! The lookup is a closure so the same algorithm serves topics and
//! categories, inside or outside a transaction.

use crate::error::AppResult;
use crate::utils::slugify;
use std::future::Future;

pub async fn allocate_slug<F, Fut>(
    title: &str,
    fallback: &str,
    exclude_id: Option<i32>,
    mut owner_of: F,
) -> AppResult<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = AppResult<Option<i32>>>,
{
    let mut base = slugify(title);
    if base.is_empty() {
        base = fallback.to_string();
    }

    let mut candidate = base.clone();
    let mut counter: u32 = 1;

    loop {
        match owner_of(candidate.clone()).await? {
            Some(owner) if Some(owner) != exclude_id => {
                candidate = format!("{base}-{counter}");
                counter += 1;
            }
            _ => break,
        }
    }

    if counter > 1 {
        tracing::debug!("Slug '{}' taken, allocated '{}'", base, candidate);
    }

    Ok(candidate)
}
