use redb::TableDefinition;

/// Stored credentials: slot name -> StoredCredential (msgpack)
pub const CREDENTIALS: TableDefinition<&str, &[u8]> = TableDefinition::new("credentials");

/// The single slot holding the active session token
pub const CURRENT_SLOT: &str = "current";
