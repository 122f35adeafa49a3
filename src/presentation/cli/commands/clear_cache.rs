use colored::Colorize;

use crate::domain::ports::store::CacheStore;

/// Drops every cached source lookup.
///
/// # Errors
///
/// Returns an error if the store fails.
pub fn run_clear_cache(cache_store: &dyn CacheStore) -> anyhow::Result<()> {
    let removed = cache_store.cache_clear()?;
    println!(
        "{} {} cached lookup(s) removed",
        "✓".green().bold(),
        removed.to_string().bold()
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::in_memory_store::InMemoryStore;
    use colored::control;

    #[test]
    fn clear_reports_removed_count() {
        control::set_override(false);
        let store = InMemoryStore::new();
        store.cache_put("crt.sh", "example.com", "{}").expect("put");
        store.cache_put("dns", "example.com", "{}").expect("put");

        assert!(run_clear_cache(&store).is_ok());
        assert!(store
            .cache_get("crt.sh", "example.com")
            .expect("get")
            .is_none());
    }
}
