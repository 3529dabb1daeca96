use anyhow::Result;
use rusqlite::{TransactionBehavior, params};
use uuid::Uuid;

use parley_chat::store::{NewPost, SocialStore, ToggleOutcome};
use parley_types::models::{FollowEdge, Like, Notification, Post};

use crate::Database;
use crate::models::{FollowRow, NotificationRow, PostRow, format_ts};
use crate::queries::OptionalExt;

impl Database {
    fn query_posts(&self, filter: &str, args: &[&dyn rusqlite::types::ToSql]) -> Result<Vec<Post>> {
        let rows = self.with_conn(|conn| {
            let sql = format!("{} {} ORDER BY p.created_at DESC", PostRow::SELECT, filter);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(args, PostRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(PostRow::into_record).collect()
    }

    fn query_follows(&self, column: &str, user: &str) -> Result<Vec<FollowEdge>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT follower, followee, created_at FROM follows WHERE {} = ?1 ORDER BY created_at",
                column
            ))?;
            let rows = stmt
                .query_map([user], FollowRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(FollowRow::into_record).collect()
    }
}

impl SocialStore for Database {
    fn insert_post(&self, post: &NewPost) -> Result<Post> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, author, author_name, text, image_url, video_url, kind, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.to_string(),
                    post.author,
                    post.author_name,
                    post.text,
                    post.image_url,
                    post.video_url,
                    post.kind.as_str(),
                    format_ts(&post.created_at),
                ],
            )?;
            Ok(())
        })?;

        Ok(Post {
            id,
            author: post.author.clone(),
            author_name: post.author_name.clone(),
            text: post.text.clone(),
            image_url: post.image_url.clone(),
            video_url: post.video_url.clone(),
            kind: post.kind,
            created_at: post.created_at,
            like_count: 0,
        })
    }

    fn post(&self, id: Uuid) -> Result<Option<Post>> {
        Ok(self
            .query_posts("WHERE p.id = ?1", &[&id.to_string()])?
            .into_iter()
            .next())
    }

    fn posts(&self) -> Result<Vec<Post>> {
        self.query_posts("", &[])
    }

    fn posts_by(&self, author: &str) -> Result<Vec<Post>> {
        self.query_posts("WHERE p.author = ?1", &[&author])
    }

    /// Delete-or-insert inside one immediate transaction: there is no read
    /// for a concurrent toggle to race against.
    fn toggle_like(&self, like: &Like, notification: &Notification) -> Result<ToggleOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let post_id = like.post_id.to_string();

            let removed = tx.execute(
                "DELETE FROM likes WHERE post_id = ?1 AND liker_key = ?2",
                params![post_id, like.liker_key],
            )?;

            // The notification goes with the like it announced, whichever
            // email that like was recorded under.
            let outcome = if removed > 0 {
                tx.execute(
                    "DELETE FROM notifications WHERE id IN (
                         SELECT id FROM notifications WHERE post_id = ?1 AND sender_key = ?2 LIMIT 1
                     )",
                    params![post_id, like.liker_key],
                )?;
                ToggleOutcome::Removed
            } else {
                tx.execute(
                    "INSERT INTO likes (post_id, liker_key, liker_name) VALUES (?1, ?2, ?3)",
                    params![post_id, like.liker_key, like.liker_name],
                )?;
                tx.execute(
                    "INSERT INTO notifications (id, post_id, recipient, sender, sender_key, sender_name, message,
                                                created_at, seen)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        notification.id.to_string(),
                        post_id,
                        notification.recipient,
                        notification.sender,
                        like.liker_key,
                        notification.sender_name,
                        notification.message,
                        format_ts(&notification.created_at),
                        notification.seen,
                    ],
                )?;
                ToggleOutcome::Added
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    fn likes(&self, post_id: Uuid) -> Result<Vec<Like>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT liker_key, liker_name FROM likes WHERE post_id = ?1 ORDER BY liker_key",
            )?;
            let likes = stmt
                .query_map([post_id.to_string()], |row| {
                    Ok(Like {
                        post_id,
                        liker_key: row.get(0)?,
                        liker_name: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(likes)
        })
    }

    fn notifications_for(&self, recipient: &str) -> Result<Vec<Notification>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM notifications WHERE recipient = ?1 ORDER BY created_at DESC",
                NotificationRow::COLUMNS
            ))?;
            let rows = stmt
                .query_map([recipient], NotificationRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(NotificationRow::into_record).collect()
    }

    fn notification(&self, id: Uuid) -> Result<Option<Notification>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM notifications WHERE id = ?1", NotificationRow::COLUMNS),
                [id.to_string()],
                NotificationRow::from_row,
            )
            .optional()
        })?
        .map(NotificationRow::into_record)
        .transpose()
    }

    fn mark_notification_seen(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET seen = 1 WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    fn delete_notification(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM notifications WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }

    fn toggle_follow(&self, edge: &FollowEdge) -> Result<ToggleOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let removed = tx.execute(
                "DELETE FROM follows WHERE follower = ?1 AND followee = ?2",
                params![edge.follower, edge.followee],
            )?;

            let outcome = if removed > 0 {
                ToggleOutcome::Removed
            } else {
                tx.execute(
                    "INSERT INTO follows (follower, followee, created_at) VALUES (?1, ?2, ?3)",
                    params![edge.follower, edge.followee, format_ts(&edge.created_at)],
                )?;
                ToggleOutcome::Added
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    fn followers(&self, user: &str) -> Result<Vec<FollowEdge>> {
        self.query_follows("followee", user)
    }

    fn following(&self, user: &str) -> Result<Vec<FollowEdge>> {
        self.query_follows("follower", user)
    }
}
