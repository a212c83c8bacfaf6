//! Idempotent PostgreSQL schema, applied at startup.
//!
//! The unique constraints here are what make identity creation and credential
//! registration race-safe; the repository maps their violations to outcomes.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id              UUID PRIMARY KEY,
    username        TEXT NOT NULL,
    email           TEXT,
    name            TEXT,
    avatar_url      TEXT,
    email_verified  TIMESTAMPTZ,
    created_at      TIMESTAMPTZ NOT NULL,
    updated_at      TIMESTAMPTZ NOT NULL,
    CONSTRAINT users_username_key UNIQUE (username),
    CONSTRAINT users_email_key UNIQUE (email)
);

CREATE TABLE IF NOT EXISTS keys (
    id                TEXT PRIMARY KEY,
    user_id           UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    provider          TEXT NOT NULL,
    provider_user_id  TEXT NOT NULL,
    hashed_password   TEXT
);

CREATE INDEX IF NOT EXISTS keys_user_id_idx ON keys (user_id);

CREATE TABLE IF NOT EXISTS webauthn_credentials (
    id             UUID PRIMARY KEY,
    user_id        UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    credential_id  TEXT NOT NULL,
    public_key     TEXT NOT NULL,
    counter        BIGINT NOT NULL DEFAULT 0 CHECK (counter >= 0),
    device_type    TEXT NOT NULL,
    backed_up      BOOLEAN NOT NULL DEFAULT FALSE,
    transports     TEXT[],
    friendly_name  TEXT NOT NULL,
    created_at     TIMESTAMPTZ NOT NULL,
    updated_at     TIMESTAMPTZ NOT NULL,
    last_used_at   TIMESTAMPTZ,
    CONSTRAINT webauthn_credentials_credential_id_key UNIQUE (credential_id)
);

CREATE INDEX IF NOT EXISTS webauthn_credentials_user_id_idx ON webauthn_credentials (user_id);

CREATE TABLE IF NOT EXISTS verification_tokens (
    id          UUID PRIMARY KEY,
    user_id     UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token_hash  TEXT NOT NULL,
    kind        TEXT NOT NULL,
    email       TEXT,
    expires_at  TIMESTAMPTZ NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL
);

ALTER TABLE verification_tokens ADD COLUMN IF NOT EXISTS email TEXT;

CREATE INDEX IF NOT EXISTS verification_tokens_user_kind_idx ON verification_tokens (user_id, kind);
"#;
