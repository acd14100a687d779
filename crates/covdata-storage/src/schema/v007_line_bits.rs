//! Schema version 7: per-(file, context) line bitsets in `line_bits`.

pub const SCHEMA_SQL: &str = r#"
-- One row, recording the version of the schema in this file.
CREATE TABLE coverage_schema (
    version INTEGER
);

-- Key-value metadata.
--   has_arcs  '0' or '1': is this file recording arcs?
--   version   version of the writer that created the file
--   sys_argv  command line of the creating process (process debugging only)
--   when      creation time (process debugging only)
CREATE TABLE meta (
    key TEXT,
    value TEXT,
    UNIQUE (key)
);

-- A row per measured file. Paths are case-sensitive and stored as given.
CREATE TABLE file (
    id INTEGER PRIMARY KEY,
    path TEXT,
    UNIQUE (path)
);

-- A row per context. The empty string is the default context.
CREATE TABLE context (
    id INTEGER PRIMARY KEY,
    context TEXT,
    UNIQUE (context)
);

-- Line mode: a row per file per context, all executed lines in one numbits blob.
CREATE TABLE line_bits (
    file_id INTEGER,
    context_id INTEGER,
    numbits BLOB,
    FOREIGN KEY (file_id) REFERENCES file (id),
    FOREIGN KEY (context_id) REFERENCES context (id),
    UNIQUE (file_id, context_id)
);

-- Arc mode: a row per file per context per executed transition.
CREATE TABLE arc (
    file_id INTEGER,
    context_id INTEGER,
    fromno INTEGER,
    tono INTEGER,
    FOREIGN KEY (file_id) REFERENCES file (id),
    FOREIGN KEY (context_id) REFERENCES context (id),
    UNIQUE (file_id, context_id, fromno, tono)
);

-- The plugin that traced a file. No row: the built-in tracer.
CREATE TABLE tracer (
    file_id INTEGER PRIMARY KEY,
    tracer TEXT,
    FOREIGN KEY (file_id) REFERENCES file (id)
);
"#;
