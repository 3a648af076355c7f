use rusqlite::Connection;

// One nullable column per type-specific field; the application keeps
// exactly the columns of `kind` populated.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS blocks (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id    INTEGER NOT NULL,             -- FK -> users(id)
    kind        TEXT NOT NULL
                CHECK (kind IN ('note', 'link', 'photo', 'video', 'music', 'map', 'social')),
    sort        INTEGER NOT NULL DEFAULT 0,
    text        TEXT,                         -- note
    link_url    TEXT,                         -- link
    photo_url   TEXT,                         -- photo (opaque media ref)
    video_url   TEXT,                         -- video
    music_embed TEXT,                         -- music (url or embed markup)
    map_lat     REAL,                         -- map
    map_lng     REAL,                         -- map
    social_kind TEXT
                CHECK (social_kind IN ('telegram', 'vk', 'instagram')),
    social_url  TEXT,                         -- social
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,

    FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_blocks_owner_order ON blocks(owner_id, sort, id);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
