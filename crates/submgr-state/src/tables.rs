//! redb table definitions.

use redb::TableDefinition;

/// Subscribers keyed by subscriber id, JSON values.
pub const SUBSCRIBERS: TableDefinition<&str, &[u8]> = TableDefinition::new("subscribers");
