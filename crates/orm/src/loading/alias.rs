//! Alias allocation for compiled statements

/// Hands out a fresh alias per table reference within one compilation.
///
/// Aliases are the table's first letter plus a counter shared by all tables,
/// so `role`, `user`, `user` become `r0`, `u1`, `u2`.
#[derive(Debug, Default)]
pub struct AliasAllocator {
    next: usize,
}

impl AliasAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, table: &str) -> String {
        let prefix = table
            .chars()
            .find(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase())
            .unwrap_or('t');
        let alias = format!("{}{}", prefix, self.next);
        self.next += 1;
        alias
    }
}
