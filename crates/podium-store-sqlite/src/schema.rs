//! SQL schema for the Podium SQLite store.
//!
//! Executed once at connection startup. Idempotent thanks to `CREATE TABLE
//! IF NOT EXISTS` and `INSERT OR IGNORE`; future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL plus the static apparatus seed.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS persons (
    person_id       TEXT PRIMARY KEY,
    full_name       TEXT NOT NULL,
    normalized_name TEXT NOT NULL UNIQUE,
    gender          TEXT,            -- 'm' | 'f' | NULL
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS clubs (
    club_id         TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    normalized_name TEXT NOT NULL UNIQUE,
    created_at      TEXT NOT NULL
);

-- One row per sighted (person, club) pairing. SQLite treats NULLs as
-- distinct in UNIQUE, so clubless uniqueness is enforced by the resolve
-- path (lookup with club_id IS NULL before insert).
CREATE TABLE IF NOT EXISTS athletes (
    athlete_id TEXT PRIMARY KEY,
    person_id  TEXT NOT NULL REFERENCES persons(person_id),
    club_id    TEXT REFERENCES clubs(club_id),
    created_at TEXT NOT NULL,
    UNIQUE (person_id, club_id)
);

CREATE TABLE IF NOT EXISTS meets (
    meet_id         TEXT PRIMARY KEY,
    source          TEXT NOT NULL,
    source_meet_id  TEXT NOT NULL,
    name            TEXT NOT NULL,
    normalized_name TEXT NOT NULL,
    start_date      TEXT,            -- ISO 8601 date
    year            INTEGER,
    location        TEXT,
    created_at      TEXT NOT NULL,
    UNIQUE (source, source_meet_id)
);

CREATE TABLE IF NOT EXISTS apparatus (
    apparatus_id TEXT PRIMARY KEY,   -- '{discipline}_{name}'
    name         TEXT NOT NULL,
    discipline   TEXT NOT NULL,      -- 'mag' | 'wag' | 'other'
    UNIQUE (name, discipline)
);

-- Performances are written only by the loader. No uniqueness constraint:
-- legitimate re-scores can share most key fields; duplication is prevented
-- logically on (meet_id, athlete_id, apparatus_id, session).
CREATE TABLE IF NOT EXISTS performances (
    performance_id TEXT PRIMARY KEY,
    athlete_id     TEXT NOT NULL REFERENCES athletes(athlete_id),
    apparatus_id   TEXT NOT NULL REFERENCES apparatus(apparatus_id),
    meet_id        TEXT NOT NULL REFERENCES meets(meet_id),
    level          TEXT,
    age            TEXT,
    gender         TEXT,
    session        TEXT,
    score_final    REAL,
    score_d        REAL,
    rank           INTEGER,
    metadata       TEXT NOT NULL DEFAULT '{}',
    recorded_at    TEXT NOT NULL
);

-- Append-only alias ledgers, consulted before any new identity is created.
-- A retired name is never re-materialized.
CREATE TABLE IF NOT EXISTS person_aliases (
    alias_normalized TEXT PRIMARY KEY,
    canonical_id     TEXT NOT NULL,
    recorded_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS club_aliases (
    alias_normalized TEXT PRIMARY KEY,
    canonical_id     TEXT NOT NULL,
    recorded_at      TEXT NOT NULL
);

-- Append-only idempotency ledger. A file is skipped only when both path and
-- content hash match; a corrected file under the same path reloads.
CREATE TABLE IF NOT EXISTS processed_files (
    path         TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    loaded_at    TEXT NOT NULL,
    PRIMARY KEY (path, content_hash)
);

CREATE INDEX IF NOT EXISTS performances_key_idx
    ON performances(meet_id, athlete_id, apparatus_id, session);
CREATE INDEX IF NOT EXISTS performances_athlete_idx ON performances(athlete_id);
CREATE INDEX IF NOT EXISTS athletes_person_idx ON athletes(person_id);
CREATE INDEX IF NOT EXISTS athletes_club_idx   ON athletes(club_id);
CREATE INDEX IF NOT EXISTS meets_unify_idx     ON meets(normalized_name, year);

INSERT OR IGNORE INTO apparatus (apparatus_id, name, discipline) VALUES
    ('mag_floor',          'floor',          'mag'),
    ('mag_pommel_horse',   'pommel_horse',   'mag'),
    ('mag_rings',          'rings',          'mag'),
    ('mag_vault',          'vault',          'mag'),
    ('mag_parallel_bars',  'parallel_bars',  'mag'),
    ('mag_horizontal_bar', 'horizontal_bar', 'mag'),
    ('wag_vault',          'vault',          'wag'),
    ('wag_uneven_bars',    'uneven_bars',    'wag'),
    ('wag_beam',           'beam',           'wag'),
    ('wag_floor',          'floor',          'wag'),
    ('other_vault',        'vault',          'other'),
    ('other_floor',        'floor',          'other');

PRAGMA user_version = 1;
";
