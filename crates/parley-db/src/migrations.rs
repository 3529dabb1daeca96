use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            email           TEXT NOT NULL UNIQUE,
            password        TEXT NOT NULL,
            first_name      TEXT NOT NULL,
            last_name       TEXT NOT NULL,
            profile_picture TEXT,
            bio             TEXT,
            active_status   INTEGER NOT NULL DEFAULT 0,
            account_status  TEXT NOT NULL DEFAULT 'enabled',
            created_at      TEXT NOT NULL
        );

        -- Message ids are the ordering key; sent_at is the sender's clock.
        CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation    TEXT NOT NULL,
            sender          TEXT NOT NULL,
            receiver        TEXT NOT NULL,
            text            TEXT,
            image_url       TEXT,
            sent_at         TEXT NOT NULL,
            status          TEXT NOT NULL,
            status_rank     INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation, id);
        CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender);
        CREATE INDEX IF NOT EXISTS idx_messages_receiver ON messages(receiver);

        CREATE TABLE IF NOT EXISTS posts (
            id          TEXT PRIMARY KEY,
            author      TEXT NOT NULL,
            author_name TEXT NOT NULL,
            text        TEXT,
            image_url   TEXT,
            video_url   TEXT,
            kind        TEXT NOT NULL DEFAULT 'regular',
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author, created_at);

        CREATE TABLE IF NOT EXISTS likes (
            post_id     TEXT NOT NULL REFERENCES posts(id),
            liker_key   TEXT NOT NULL,
            liker_name  TEXT NOT NULL,
            PRIMARY KEY (post_id, liker_key)
        );

        CREATE TABLE IF NOT EXISTS notifications (
            id          TEXT PRIMARY KEY,
            post_id     TEXT NOT NULL REFERENCES posts(id),
            recipient   TEXT NOT NULL,
            sender      TEXT NOT NULL,
            -- Liker key of the like that produced this notification.
            sender_key  TEXT NOT NULL,
            sender_name TEXT NOT NULL,
            message     TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            seen        INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_recipient
            ON notifications(recipient, created_at);

        CREATE TABLE IF NOT EXISTS follows (
            follower    TEXT NOT NULL,
            followee    TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            PRIMARY KEY (follower, followee)
        );

        CREATE INDEX IF NOT EXISTS idx_follows_followee ON follows(followee);

        CREATE TABLE IF NOT EXISTS preferences (
            user_id     TEXT PRIMARY KEY REFERENCES users(id),
            dark_mode   TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
