/// Every schema transition this build knows, strictly increasing by version.
/// Gaps are versions that shipped in other branches or were withdrawn.
pub static SCHEMA_VERSIONS: &[MigrationStep] = &[
    MigrationStep::sql(1, "messages", V1_MESSAGES),
    MigrationStep::sql(2, "expiration_columns", V2_EXPIRATION_COLUMNS),
    MigrationStep::sql(3, "partial_indices", V3_PARTIAL_INDICES),
    MigrationStep::sql(4, "conversations", V4_CONVERSATIONS),
    MigrationStep::sql(6, "key_value_tables", V6_KEY_VALUE_TABLES),
    MigrationStep::sql(7, "sessions_text_id", V7_SESSIONS_TEXT_ID),
    MigrationStep::sql(8, "full_text_search", V8_FULL_TEXT_SEARCH),
    MigrationStep::sql(9, "legacy_attachment_downloads", V9_LEGACY_ATTACHMENT_DOWNLOADS),
    MigrationStep::sql(10, "unprocessed_columns", V10_UNPROCESSED_COLUMNS),
    MigrationStep::sql(11, "drop_groups", V11_DROP_GROUPS),
    MigrationStep::sql(12, "stickers", V12_STICKERS),
    MigrationStep::sql(13, "sticker_attempted_status", V13_STICKER_ATTEMPTED_STATUS),
    MigrationStep::sql(14, "emojis", V14_EMOJIS),
    MigrationStep::sql(15, "emojis_text_key", V15_EMOJIS_TEXT_KEY),
    MigrationStep::sql(16, "message_timer", V16_MESSAGE_TIMER),
    MigrationStep::code(17, "view_once", v17_view_once),
    MigrationStep::sql(18, "rebuild_fts", V18_REBUILD_FTS),
    MigrationStep::sql(19, "profile_names", V19_PROFILE_NAMES),
    MigrationStep::code(20, "conversation_ids", v20_conversation_ids),
    MigrationStep::sql(21, "message_counts", V21_MESSAGE_COUNTS),
    MigrationStep::sql(22, "unprocessed_source_uuid", V22_UNPROCESSED_SOURCE_UUID),
    MigrationStep::sql(23, "drop_fts_triggers", V23_DROP_FTS_TRIGGERS),
    MigrationStep::sql(24, "profile_last_fetched", V24_PROFILE_LAST_FETCHED),
    MigrationStep::sql(25, "messages_rowid", V25_MESSAGES_ROWID),
    MigrationStep::sql(26, "fts_update_on_body_change", V26_FTS_UPDATE_ON_BODY_CHANGE),
    MigrationStep::sql(27, "fts_null_bodies", V27_FTS_NULL_BODIES),
    MigrationStep::sql(28, "jobs", V28_JOBS),
    MigrationStep::sql(29, "reactions", V29_REACTIONS),
    MigrationStep::sql(30, "sender_keys", V30_SENDER_KEYS),
    MigrationStep::sql(31, "unprocessed_primary_key", V31_UNPROCESSED_PRIMARY_KEY),
    MigrationStep::sql(32, "server_guid", V32_SERVER_GUID),
    MigrationStep::sql(33, "generated_expires_at", V33_GENERATED_EXPIRES_AT),
    MigrationStep::sql(34, "missing_expiration_start", V34_MISSING_EXPIRATION_START_INDEX),
    MigrationStep::sql(35, "expiring_by_conversation", V35_EXPIRING_BY_CONVERSATION),
    MigrationStep::sql(36, "reverted", V36_REVERTED),
    MigrationStep::sql(37, "send_log", V37_SEND_LOG),
    MigrationStep::sql(38, "integer_source_device", V38_INTEGER_SOURCE_DEVICE),
    MigrationStep::sql(39, "read_status", V39_READ_STATUS),
    MigrationStep::sql(40, "group_call_rings", V40_GROUP_CALL_RINGS),
    MigrationStep::code(41, "uuid_keys", v41_uuid_keys),
    MigrationStep::sql(42, "stale_reactions", V42_STALE_REACTIONS),
    MigrationStep::code(43, "group_v2_uuids", v43_group_v2_uuids),
    MigrationStep::code(1040, "attachment_downloads", v1040_attachment_downloads),
    MigrationStep::sql(1060, "sync_tasks", V1060_SYNC_TASKS),
    MigrationStep::sql(1180, "download_source", V1180_DOWNLOAD_SOURCE),
    MigrationStep::sql(1200, "download_source_index", V1200_DOWNLOAD_SOURCE_INDEX),
    MigrationStep::code(1260, "sync_tasks_rowid", v1260_sync_tasks_rowid),
    MigrationStep::sql(1330, "sync_tasks_type_index", V1330_SYNC_TASKS_TYPE_INDEX),
    MigrationStep::sql(1360, "message_attachments", V1360_MESSAGE_ATTACHMENTS),
    MigrationStep::sql(1370, "message_attachment_indices", V1370_MESSAGE_ATTACHMENT_INDICES),
    MigrationStep::code(1420, "backup_download_stats", v1420_backup_download_stats),
];
