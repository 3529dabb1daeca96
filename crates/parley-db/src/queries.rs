use anyhow::{Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, params};
use uuid::Uuid;

use parley_chat::lifecycle;
use parley_chat::store::{MessageStore, NewMessage, NewUser, ProfileUpdate, UserStore};
use parley_chat::ConversationKey;
use parley_types::models::{AccountStatus, ConversationSummary, MessageRecord, MessageStatus, Theme, UserRecord};

use crate::Database;
use crate::models::{MessageRow, UserRow, format_ts};

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser, password_hash: &str) -> Result<UserRecord> {
        let record = UserRecord {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            profile_picture: user.profile_picture.clone(),
            bio: None,
            active_status: false,
            account_status: AccountStatus::Enabled,
            created_at: Utc::now(),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password, first_name, last_name, profile_picture, \
                 active_status, account_status, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8)",
                params![
                    record.id.to_string(),
                    record.email,
                    password_hash,
                    record.first_name,
                    record.last_name,
                    record.profile_picture,
                    record.account_status.as_str(),
                    format_ts(&record.created_at),
                ],
            )?;
            Ok(())
        })?;

        Ok(record)
    }

    /// The user and their password hash, for login.
    pub fn credentials_by_email(&self, email: &str) -> Result<Option<(UserRecord, String)>> {
        let row = self.with_conn(|conn| query_user(conn, "email", email))?;
        row.map(|row| {
            let hash = row.password.clone();
            Ok((row.into_record()?, hash))
        })
        .transpose()
    }

    pub fn set_account_status(&self, id: Uuid, status: AccountStatus) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET account_status = ?1 WHERE id = ?2",
                params![status.as_str(), id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }
}

impl UserStore for Database {
    fn user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        self.with_conn(|conn| query_user(conn, "email", email))?
            .map(UserRow::into_record)
            .transpose()
    }

    fn user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        self.with_conn(|conn| query_user(conn, "id", &id.to_string()))?
            .map(UserRow::into_record)
            .transpose()
    }

    fn set_active_status(&self, id: Uuid, active: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET active_status = ?1 WHERE id = ?2",
                params![active, id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    fn theme(&self, user_id: Uuid) -> Result<Option<Theme>> {
        let flag: Option<String> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT dark_mode FROM preferences WHERE user_id = ?1",
                [user_id.to_string()],
                |row| row.get(0),
            )
            .optional()
        })?;

        flag.map(|f| Theme::from_flag(&f).ok_or_else(|| anyhow!("corrupt dark_mode '{}' for {}", f, user_id)))
            .transpose()
    }

    fn set_theme(&self, user_id: Uuid, theme: Theme) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO preferences (user_id, dark_mode) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET dark_mode = excluded.dark_mode",
                params![user_id.to_string(), theme.as_flag()],
            )?;
            Ok(())
        })
    }

    fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Option<UserRecord>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET first_name = ?1, last_name = ?2, bio = ?3, profile_picture = ?4
                 WHERE id = ?5",
                params![
                    update.first_name,
                    update.last_name,
                    update.bio,
                    update.profile_picture,
                    id.to_string(),
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_user(conn, "id", &id.to_string())
        })?
        .map(UserRow::into_record)
        .transpose()
    }

    /// SQLite's LIKE is ASCII case-insensitive, so the prefix only needs its
    /// wildcards escaped.
    fn search_users(&self, prefix: &str) -> Result<Vec<UserRecord>> {
        let pattern = format!("{}%", escape_like(prefix));
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users
                 WHERE first_name LIKE ?1 ESCAPE '\\' OR last_name LIKE ?1 ESCAPE '\\'
                 ORDER BY first_name, last_name",
                UserRow::COLUMNS
            ))?;
            let rows = stmt
                .query_map([pattern], UserRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(UserRow::into_record).collect()
    }
}

// -- Messages --

impl MessageStore for Database {
    fn insert_message(&self, message: &NewMessage) -> Result<MessageRecord> {
        let status = lifecycle::INITIAL_STATUS;
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (conversation, sender, receiver, text, image_url, sent_at, status, status_rank)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    message.conversation.as_str(),
                    message.sender,
                    message.receiver,
                    message.text,
                    message.image_url,
                    format_ts(&message.timestamp),
                    status.as_str(),
                    status.rank(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        Ok(MessageRecord {
            id: u64::try_from(id)?,
            conversation: message.conversation.as_str().to_string(),
            sender: message.sender.clone(),
            receiver: message.receiver.clone(),
            text: message.text.clone(),
            image_url: message.image_url.clone(),
            timestamp: message.timestamp,
            status,
        })
    }

    fn messages(&self, conversation: &ConversationKey) -> Result<Vec<MessageRecord>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages WHERE conversation = ?1 ORDER BY id",
                MessageRow::COLUMNS
            ))?;
            let rows = stmt
                .query_map([conversation.as_str()], MessageRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(MessageRow::into_record).collect()
    }

    fn message(&self, conversation: &ConversationKey, id: u64) -> Result<Option<MessageRecord>> {
        let id = i64::try_from(id)?;
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM messages WHERE conversation = ?1 AND id = ?2",
                    MessageRow::COLUMNS
                ),
                params![conversation.as_str(), id],
                MessageRow::from_row,
            )
            .optional()
        })?
        .map(MessageRow::into_record)
        .transpose()
    }

    /// Conditional on rank, so a stale write can never move a message backwards.
    fn advance_status(&self, conversation: &ConversationKey, id: u64, to: MessageStatus) -> Result<bool> {
        let id = i64::try_from(id)?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET status = ?1, status_rank = ?2
                 WHERE conversation = ?3 AND id = ?4 AND status_rank < ?2",
                params![to.as_str(), to.rank(), conversation.as_str(), id],
            )?;
            Ok(changed > 0)
        })
    }

    fn delete_message(&self, conversation: &ConversationKey, id: u64, author: &str) -> Result<bool> {
        let id = i64::try_from(id)?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM messages WHERE conversation = ?1 AND id = ?2 AND sender = ?3",
                params![conversation.as_str(), id, author],
            )?;
            Ok(changed > 0)
        })
    }

    fn conversations_for(&self, participant: &str) -> Result<Vec<ConversationSummary>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.conversation, m.sender, m.receiver, m.text, m.image_url, m.sent_at, m.status,
                        (SELECT COUNT(*) FROM messages u
                         WHERE u.conversation = m.conversation AND u.receiver = ?1 AND u.status = ?2)
                 FROM messages m
                 JOIN (
                     SELECT conversation, MAX(id) AS last_id
                     FROM messages
                     WHERE sender = ?1 OR receiver = ?1
                     GROUP BY conversation
                 ) latest ON m.id = latest.last_id
                 ORDER BY m.id DESC",
            )?;
            let rows = stmt
                .query_map(params![participant, MessageStatus::Sent.as_str()], |row| {
                    Ok((MessageRow::from_row(row)?, row.get::<_, i64>(8)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter()
            .map(|(row, unread)| {
                let last = row.into_record()?;
                let peer = if last.sender == participant {
                    last.receiver.clone()
                } else {
                    last.sender.clone()
                };
                Ok(ConversationSummary {
                    conversation: last.conversation.clone(),
                    peer,
                    last_message: last,
                    unread: usize::try_from(unread)?,
                })
            })
            .collect()
    }
}

/// `column` is always one of our own literals, never user input.
fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users WHERE {} = ?1",
        UserRow::COLUMNS,
        column
    ))?;

    let row = stmt.query_row([value], UserRow::from_row).optional()?;
    Ok(row)
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
