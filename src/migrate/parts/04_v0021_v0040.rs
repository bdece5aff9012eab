const V21_MESSAGE_COUNTS: &str = r#"
UPDATE conversations
SET json = json_set(
  json,
  '$.messageCount',
  (SELECT count(*) FROM messages WHERE messages.conversationId = conversations.id)
);
UPDATE conversations
SET json = json_set(
  json,
  '$.sentMessageCount',
  (SELECT count(*) FROM messages
   WHERE messages.conversationId = conversations.id AND messages.type = 'outgoing')
);
"#;

const V22_UNPROCESSED_SOURCE_UUID: &str =
    "ALTER TABLE unprocessed ADD COLUMN sourceUuid STRING;";

const V23_DROP_FTS_TRIGGERS: &str = r#"
DROP TRIGGER messages_on_insert;
DROP TRIGGER messages_on_update;
DROP TRIGGER messages_on_delete;
"#;

const V24_PROFILE_LAST_FETCHED: &str =
    "ALTER TABLE conversations ADD COLUMN profileLastFetchedAt INTEGER;";

// v25: messages gets an integer rowid key so the FTS table can follow it.
const V25_MESSAGES_ROWID: &str = r#"
ALTER TABLE messages RENAME TO old_messages;

DROP INDEX IF EXISTS messages_expires_at;
DROP INDEX IF EXISTS messages_receipt;
DROP INDEX IF EXISTS messages_schemaVersion;
DROP INDEX IF EXISTS messages_conversation;
DROP INDEX IF EXISTS messages_duplicate_check;
DROP INDEX IF EXISTS messages_hasAttachments;
DROP INDEX IF EXISTS messages_hasFileAttachments;
DROP INDEX IF EXISTS messages_hasVisualMediaAttachments;
DROP INDEX IF EXISTS messages_without_timer;
DROP INDEX IF EXISTS messages_unread;
DROP INDEX IF EXISTS messages_view_once;
DROP INDEX IF EXISTS messages_sourceUuid;

CREATE TABLE messages(
  rowid INTEGER PRIMARY KEY ASC,
  id STRING UNIQUE,
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
  hasVisualMediaAttachments INTEGER,
  expireTimer INTEGER,
  expirationStartTimestamp INTEGER,
  type STRING,
  body TEXT,
  messageTimer INTEGER,
  messageTimerStart INTEGER,
  messageTimerExpiresAt INTEGER,
  isErased INTEGER,
  isViewOnce INTEGER,
  sourceUuid TEXT);

CREATE INDEX messages_id ON messages (id ASC);

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
CREATE INDEX messages_without_timer ON messages
  (expireTimer, expires_at, type)
  WHERE expires_at IS NULL AND expireTimer IS NOT NULL;
CREATE INDEX messages_unread ON messages
  (conversationId, unread) WHERE unread IS NOT NULL;
CREATE INDEX messages_view_once ON messages
  (isErased) WHERE isViewOnce = 1;
CREATE INDEX messages_sourceUuid on messages(sourceUuid);
CREATE INDEX messages_searchOrder on messages(received_at, sent_at);

DROP TABLE messages_fts;
CREATE VIRTUAL TABLE messages_fts USING fts5(body);

CREATE TRIGGER messages_on_insert AFTER INSERT ON messages
WHEN new.isViewOnce IS NULL OR new.isViewOnce != 1
BEGIN
  INSERT INTO messages_fts (rowid, body) VALUES (new.rowid, new.body);
END;
CREATE TRIGGER messages_on_delete AFTER DELETE ON messages BEGIN
  DELETE FROM messages_fts WHERE rowid = old.rowid;
END;
CREATE TRIGGER messages_on_update AFTER UPDATE ON messages
WHEN new.isViewOnce IS NULL OR new.isViewOnce != 1
BEGIN
  DELETE FROM messages_fts WHERE rowid = old.rowid;
  INSERT INTO messages_fts (rowid, body) VALUES (new.rowid, new.body);
END;

INSERT INTO messages
(
  id, json, unread, expires_at, sent_at, schemaVersion, conversationId,
  received_at, source, sourceDevice, hasAttachments, hasFileAttachments,
  hasVisualMediaAttachments, expireTimer, expirationStartTimestamp, type,
  body, messageTimer, messageTimerStart, messageTimerExpiresAt, isErased,
  isViewOnce, sourceUuid
)
SELECT
  id, json, unread, expires_at, sent_at, schemaVersion, conversationId,
  received_at, source, sourceDevice, hasAttachments, hasFileAttachments,
  hasVisualMediaAttachments, expireTimer, expirationStartTimestamp, type,
  body, messageTimer, messageTimerStart, messageTimerExpiresAt, isErased,
  isViewOnce, sourceUuid
FROM old_messages;

DROP TABLE old_messages;
"#;

const V26_FTS_UPDATE_ON_BODY_CHANGE: &str = r#"
DROP TRIGGER messages_on_insert;
DROP TRIGGER messages_on_update;

CREATE TRIGGER messages_on_insert AFTER INSERT ON messages
WHEN new.isViewOnce IS NULL OR new.isViewOnce != 1
BEGIN
  INSERT INTO messages_fts (rowid, body) VALUES (new.rowid, new.body);
END;

CREATE TRIGGER messages_on_update AFTER UPDATE ON messages
WHEN new.body != old.body AND
  (new.isViewOnce IS NULL OR new.isViewOnce != 1)
BEGIN
  DELETE FROM messages_fts WHERE rowid = old.rowid;
  INSERT INTO messages_fts (rowid, body) VALUES (new.rowid, new.body);
END;
"#;

const V27_FTS_NULL_BODIES: &str = r#"
DELETE FROM messages_fts WHERE rowid IN
  (SELECT rowid FROM messages WHERE body IS NULL);

DROP TRIGGER messages_on_update;

CREATE TRIGGER messages_on_update AFTER UPDATE ON messages
WHEN
  new.body IS NULL OR
  ((old.body IS NULL OR new.body != old.body) AND
   (new.isViewOnce IS NULL OR new.isViewOnce != 1))
BEGIN
  DELETE FROM messages_fts WHERE rowid = old.rowid;
  INSERT INTO messages_fts (rowid, body) VALUES (new.rowid, new.body);
END;

CREATE TRIGGER messages_on_view_once_update AFTER UPDATE ON messages
WHEN
  new.body IS NOT NULL AND new.isViewOnce = 1
BEGIN
  DELETE FROM messages_fts WHERE rowid = old.rowid;
END;
"#;

const V28_JOBS: &str = r#"
CREATE TABLE jobs(
  id TEXT PRIMARY KEY,
  queueType TEXT STRING NOT NULL,
  timestamp INTEGER NOT NULL,
  data STRING TEXT
);
CREATE INDEX jobs_timestamp ON jobs (timestamp);
"#;

const V29_REACTIONS: &str = r#"
CREATE TABLE reactions(
  conversationId STRING,
  emoji STRING,
  fromId STRING,
  messageReceivedAt INTEGER,
  targetAuthorUuid STRING,
  targetTimestamp INTEGER,
  unread INTEGER
);
CREATE INDEX reactions_unread ON reactions (unread, conversationId);
CREATE INDEX reaction_identifier ON reactions (emoji, targetAuthorUuid, targetTimestamp);
"#;

const V30_SENDER_KEYS: &str = r#"
CREATE TABLE senderKeys(
  id TEXT PRIMARY KEY NOT NULL,
  senderId TEXT NOT NULL,
  distributionId TEXT NOT NULL,
  data BLOB NOT NULL,
  lastUpdatedDate NUMBER NOT NULL
);
"#;

const V31_UNPROCESSED_PRIMARY_KEY: &str = r#"
DROP INDEX unprocessed_id;
DROP INDEX unprocessed_timestamp;
ALTER TABLE unprocessed RENAME TO unprocessed_old;

CREATE TABLE unprocessed(
  id STRING PRIMARY KEY ASC,
  timestamp INTEGER,
  version INTEGER,
  attempts INTEGER,
  envelope TEXT,
  decrypted TEXT,
  source TEXT,
  sourceDevice TEXT,
  serverTimestamp INTEGER,
  sourceUuid STRING
);
CREATE INDEX unprocessed_timestamp ON unprocessed (timestamp);

INSERT OR REPLACE INTO unprocessed
  (id, timestamp, version, attempts, envelope, decrypted, source,
   sourceDevice, serverTimestamp, sourceUuid)
SELECT
  id, timestamp, version, attempts, envelope, decrypted, source,
  sourceDevice, serverTimestamp, sourceUuid
FROM unprocessed_old;

DROP TABLE unprocessed_old;
"#;

const V32_SERVER_GUID: &str = r#"
ALTER TABLE messages ADD COLUMN serverGuid STRING NULL;
ALTER TABLE unprocessed ADD COLUMN serverGuid STRING NULL;
"#;

const V33_GENERATED_EXPIRES_AT: &str = r#"
DROP INDEX IF EXISTS messages_expires_at;
DROP INDEX IF EXISTS messages_without_timer;

ALTER TABLE messages
ADD COLUMN expiresAt INT
GENERATED ALWAYS
AS (expirationStartTimestamp + (expireTimer * 1000));

CREATE INDEX message_expires_at ON messages (expiresAt);

CREATE INDEX outgoing_messages_without_expiration_start_timestamp ON messages (
  expireTimer, expirationStartTimestamp, type
)
WHERE expireTimer IS NOT NULL AND expirationStartTimestamp IS NULL;
"#;

const V34_MISSING_EXPIRATION_START_INDEX: &str = r#"
DROP INDEX IF EXISTS outgoing_messages_without_expiration_start_timestamp;
CREATE INDEX messages_unexpectedly_missing_expiration_start_timestamp ON messages (
  expireTimer, expirationStartTimestamp, type
)
WHERE expireTimer IS NOT NULL AND expirationStartTimestamp IS NULL;
"#;

const V35_EXPIRING_BY_CONVERSATION: &str = r#"
CREATE INDEX expiring_message_by_conversation_and_received_at
ON messages (expirationStartTimestamp, expireTimer, conversationId, received_at);
"#;

// Shipped and reverted; only the version bump remains.
const V36_REVERTED: &str = "";

const V37_SEND_LOG: &str = r#"
CREATE TABLE sendLogPayloads(
  id INTEGER PRIMARY KEY ASC,
  timestamp INTEGER NOT NULL,
  contentHint INTEGER NOT NULL,
  proto BLOB NOT NULL
);
CREATE INDEX sendLogPayloadsByTimestamp ON sendLogPayloads (timestamp);

CREATE TABLE sendLogRecipients(
  payloadId INTEGER NOT NULL,
  recipientUuid STRING NOT NULL,
  deviceId INTEGER NOT NULL,
  PRIMARY KEY (payloadId, recipientUuid, deviceId),
  CONSTRAINT sendLogRecipientsForeignKey
    FOREIGN KEY (payloadId)
    REFERENCES sendLogPayloads(id)
    ON DELETE CASCADE
);
CREATE INDEX sendLogRecipientsByRecipient ON sendLogRecipients (recipientUuid, deviceId);

CREATE TABLE sendLogMessageIds(
  payloadId INTEGER NOT NULL,
  messageId STRING NOT NULL,
  PRIMARY KEY (payloadId, messageId),
  CONSTRAINT sendLogMessageIdsForeignKey
    FOREIGN KEY (payloadId)
    REFERENCES sendLogPayloads(id)
    ON DELETE CASCADE
);
CREATE INDEX sendLogMessageIdsByMessage ON sendLogMessageIds (messageId);

DROP TRIGGER messages_on_delete;
CREATE TRIGGER messages_on_delete AFTER DELETE ON messages BEGIN
  DELETE FROM messages_fts WHERE rowid = old.rowid;
  DELETE FROM sendLogPayloads WHERE id IN (
    SELECT payloadId FROM sendLogMessageIds WHERE messageId = old.id
  );
END;

ALTER TABLE reactions ADD column messageId STRING;
"#;

const V38_INTEGER_SOURCE_DEVICE: &str = r#"
DROP INDEX IF EXISTS messages_duplicate_check;

ALTER TABLE messages RENAME COLUMN sourceDevice TO deprecatedSourceDevice;
ALTER TABLE messages ADD COLUMN sourceDevice INTEGER;
UPDATE messages
SET
  sourceDevice = CAST(deprecatedSourceDevice AS INTEGER),
  deprecatedSourceDevice = NULL;

ALTER TABLE unprocessed RENAME COLUMN sourceDevice TO deprecatedSourceDevice;
ALTER TABLE unprocessed ADD COLUMN sourceDevice INTEGER;
UPDATE unprocessed
SET
  sourceDevice = CAST(deprecatedSourceDevice AS INTEGER),
  deprecatedSourceDevice = NULL;
"#;

const V39_READ_STATUS: &str = "ALTER TABLE messages RENAME COLUMN unread TO readStatus;";

const V40_GROUP_CALL_RINGS: &str = r#"
CREATE TABLE groupCallRings(
  ringId INTEGER PRIMARY KEY,
  isActive INTEGER NOT NULL,
  createdAt INTEGER NOT NULL
);
"#;
