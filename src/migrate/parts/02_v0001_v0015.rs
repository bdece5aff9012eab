// v1: messages document table and the unprocessed envelope queue.
const V1_MESSAGES: &str = r#"
CREATE TABLE messages(
  id STRING PRIMARY KEY ASC,
  json TEXT,

  unread INTEGER,
  expires_at INTEGER,
  sent_at INTEGER,
  schemaVersion INTEGER,
  conversationId STRING,
  received_at INTEGER,
  source STRING,
  sourceDevice STRING,
  hasAttachments INTEGER,
  hasFileAttachments INTEGER,
  hasVisualMediaAttachments INTEGER
);

CREATE INDEX messages_unread ON messages (unread);
CREATE INDEX messages_expires_at ON messages (expires_at);
CREATE INDEX messages_receipt ON messages (sent_at);
CREATE INDEX messages_schemaVersion ON messages (schemaVersion);
CREATE INDEX messages_conversation ON messages (conversationId, received_at);
CREATE INDEX messages_duplicate_check ON messages (source, sourceDevice, sent_at);
CREATE INDEX messages_hasAttachments ON messages
  (conversationId, hasAttachments, received_at);
CREATE INDEX messages_hasFileAttachments ON messages
  (conversationId, hasFileAttachments, received_at);
CREATE INDEX messages_hasVisualMediaAttachments ON messages
  (conversationId, hasVisualMediaAttachments, received_at);

CREATE TABLE unprocessed(
  id STRING,
  timestamp INTEGER,
  json TEXT
);
CREATE INDEX unprocessed_id ON unprocessed (id);
CREATE INDEX unprocessed_timestamp ON unprocessed (timestamp);
"#;

// v2: promote expiration fields out of the JSON body.
const V2_EXPIRATION_COLUMNS: &str = r#"
ALTER TABLE messages ADD COLUMN expireTimer INTEGER;
ALTER TABLE messages ADD COLUMN expirationStartTimestamp INTEGER;
ALTER TABLE messages ADD COLUMN type STRING;

CREATE INDEX messages_expiring ON messages
  (expireTimer, expirationStartTimestamp, expires_at);

UPDATE messages SET
  expirationStartTimestamp = json_extract(json, '$.expirationStartTimestamp'),
  expireTimer = json_extract(json, '$.expireTimer'),
  type = json_extract(json, '$.type');
"#;

const V3_PARTIAL_INDICES: &str = r#"
DROP INDEX messages_expiring;
DROP INDEX messages_unread;

CREATE INDEX messages_without_timer ON messages
  (expireTimer, expires_at, type)
  WHERE expires_at IS NULL AND expireTimer IS NOT NULL;

CREATE INDEX messages_unread ON messages
  (conversationId, unread) WHERE unread IS NOT NULL;

ANALYZE;
"#;

const V4_CONVERSATIONS: &str = r#"
CREATE TABLE conversations(
  id STRING PRIMARY KEY ASC,
  json TEXT,

  active_at INTEGER,
  type STRING,
  members TEXT,
  name TEXT,
  profileName TEXT
);

CREATE INDEX conversations_active ON conversations
  (active_at) WHERE active_at IS NOT NULL;
CREATE INDEX conversations_type ON conversations
  (type) WHERE type IS NOT NULL;
"#;

// v5 was released and withdrawn; its number stays unused.

const V6_KEY_VALUE_TABLES: &str = r#"
CREATE TABLE sessions(
  id STRING PRIMARY KEY ASC,
  number STRING,
  json TEXT
);
CREATE INDEX sessions_number ON sessions (number) WHERE number IS NOT NULL;

CREATE TABLE groups(
  id STRING PRIMARY KEY ASC,
  json TEXT
);
CREATE TABLE identityKeys(
  id STRING PRIMARY KEY ASC,
  json TEXT
);
CREATE TABLE items(
  id STRING PRIMARY KEY ASC,
  json TEXT
);

CREATE TABLE preKeys(
  id INTEGER PRIMARY KEY ASC,
  json TEXT
);
CREATE TABLE signedPreKeys(
  id INTEGER PRIMARY KEY ASC,
  json TEXT
);
"#;

// v7: STRING affinity was coercing session ids to numbers; rebuild with TEXT.
const V7_SESSIONS_TEXT_ID: &str = r#"
DROP INDEX sessions_number;
ALTER TABLE sessions RENAME TO sessions_old;

CREATE TABLE sessions(
  id TEXT PRIMARY KEY,
  number TEXT,
  json TEXT
);
CREATE INDEX sessions_number ON sessions (number) WHERE number IS NOT NULL;

INSERT INTO sessions(id, number, json)
  SELECT '+' || id, number, json FROM sessions_old;

DROP TABLE sessions_old;
"#;

const V8_FULL_TEXT_SEARCH: &str = r#"
ALTER TABLE messages ADD COLUMN body TEXT;
UPDATE messages SET body = json_extract(json, '$.body');

CREATE VIRTUAL TABLE messages_fts USING fts5(id UNINDEXED, body);
INSERT INTO messages_fts(id, body) SELECT id, body FROM messages;

CREATE TRIGGER messages_on_insert AFTER INSERT ON messages BEGIN
  INSERT INTO messages_fts (id, body) VALUES (new.id, new.body);
END;
CREATE TRIGGER messages_on_delete AFTER DELETE ON messages BEGIN
  DELETE FROM messages_fts WHERE id = old.id;
END;
CREATE TRIGGER messages_on_update AFTER UPDATE ON messages BEGIN
  DELETE FROM messages_fts WHERE id = old.id;
  INSERT INTO messages_fts(id, body) VALUES (new.id, new.body);
END;
"#;

// v9: first-generation download queue, replaced wholesale by v1040.
const V9_LEGACY_ATTACHMENT_DOWNLOADS: &str = r#"
CREATE TABLE attachment_downloads(
  id STRING primary key,
  timestamp INTEGER,
  pending INTEGER,
  json TEXT
);

CREATE INDEX attachment_downloads_timestamp
  ON attachment_downloads (timestamp) WHERE pending = 0;
CREATE INDEX attachment_downloads_pending
  ON attachment_downloads (pending) WHERE pending != 0;
"#;

const V10_UNPROCESSED_COLUMNS: &str = r#"
DROP INDEX unprocessed_id;
DROP INDEX unprocessed_timestamp;
ALTER TABLE unprocessed RENAME TO unprocessed_old;

CREATE TABLE unprocessed(
  id STRING,
  timestamp INTEGER,
  version INTEGER,
  attempts INTEGER,
  envelope TEXT,
  decrypted TEXT,
  source TEXT,
  sourceDevice TEXT,
  serverTimestamp INTEGER
);
CREATE INDEX unprocessed_id ON unprocessed (id);
CREATE INDEX unprocessed_timestamp ON unprocessed (timestamp);

INSERT INTO unprocessed (
  id, timestamp, version, attempts, envelope, decrypted, source,
  sourceDevice, serverTimestamp
) SELECT
  id,
  timestamp,
  json_extract(json, '$.version'),
  json_extract(json, '$.attempts'),
  json_extract(json, '$.envelope'),
  json_extract(json, '$.decrypted'),
  json_extract(json, '$.source'),
  json_extract(json, '$.sourceDevice'),
  json_extract(json, '$.serverTimestamp')
FROM unprocessed_old;

DROP TABLE unprocessed_old;
"#;

const V11_DROP_GROUPS: &str = "DROP TABLE groups;";

const V12_STICKERS: &str = r#"
CREATE TABLE sticker_packs(
  id TEXT PRIMARY KEY,
  key TEXT NOT NULL,

  author STRING,
  coverStickerId INTEGER,
  createdAt INTEGER,
  downloadAttempts INTEGER,
  installedAt INTEGER,
  lastUsed INTEGER,
  status STRING,
  stickerCount INTEGER,
  title STRING
);

CREATE TABLE stickers(
  id INTEGER NOT NULL,
  packId TEXT NOT NULL,

  emoji STRING,
  height INTEGER,
  isCoverOnly INTEGER,
  lastUsed INTEGER,
  path STRING,
  width INTEGER,

  PRIMARY KEY (id, packId),
  CONSTRAINT stickers_fk
    FOREIGN KEY (packId)
    REFERENCES sticker_packs(id)
    ON DELETE CASCADE
);
CREATE INDEX stickers_recents ON stickers (lastUsed) WHERE lastUsed IS NOT NULL;

CREATE TABLE sticker_references(
  messageId STRING,
  packId TEXT,
  CONSTRAINT sticker_references_fk
    FOREIGN KEY(packId)
    REFERENCES sticker_packs(id)
    ON DELETE CASCADE
);
"#;

const V13_STICKER_ATTEMPTED_STATUS: &str =
    "ALTER TABLE sticker_packs ADD COLUMN attemptedStatus STRING;";

const V14_EMOJIS: &str = r#"
CREATE TABLE emojis(
  shortName STRING PRIMARY KEY,
  lastUsage INTEGER
);
CREATE INDEX emojis_lastUsage ON emojis (lastUsage);
"#;

// v15: same coercion problem as v7, this time for emoji short names.
const V15_EMOJIS_TEXT_KEY: &str = r#"
DROP INDEX emojis_lastUsage;
ALTER TABLE emojis RENAME TO emojis_old;

CREATE TABLE emojis(
  shortName TEXT PRIMARY KEY,
  lastUsage INTEGER
);
CREATE INDEX emojis_lastUsage ON emojis (lastUsage);

DELETE FROM emojis WHERE shortName = 1;
INSERT INTO emojis(shortName, lastUsage)
  SELECT shortName, lastUsage FROM emojis_old;

DROP TABLE emojis_old;
"#;
