pub const SCHEMA_VERSION: i64 = 1;

pub const CURRENT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    username TEXT PRIMARY KEY NOT NULL,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'student' CHECK (role IN ('student', 'admin')),
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS profiles (
    username TEXT PRIMARY KEY NOT NULL,
    full_name TEXT NOT NULL,
    birth_date TEXT NOT NULL,
    weight_kg REAL NOT NULL CHECK (weight_kg >= 0),
    height_cm REAL NOT NULL CHECK (height_cm >= 0),
    medical_note TEXT NOT NULL DEFAULT '',
    weekly_target INTEGER NOT NULL CHECK (weekly_target BETWEEN 1 AND 7)
);

CREATE TABLE IF NOT EXISTS workouts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner TEXT NOT NULL,
    date TEXT NOT NULL,
    routine TEXT NOT NULL,
    exercise TEXT NOT NULL,
    reps INTEGER NOT NULL CHECK (reps >= 1),
    sets INTEGER NOT NULL CHECK (sets >= 1),
    weight_kg REAL NOT NULL CHECK (weight_kg >= 0)
);

CREATE INDEX IF NOT EXISTS idx_workouts_owner ON workouts (owner);

CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    author TEXT NOT NULL,
    body TEXT NOT NULL,
    date TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS user_sessions (
    id INTEGER PRIMARY KEY,
    username TEXT NOT NULL,
    token TEXT NOT NULL UNIQUE,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    expires_at TIMESTAMP NOT NULL,
    FOREIGN KEY (username) REFERENCES accounts (username)
);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY NOT NULL,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;
