use crate::models::{ConnectionCredentials, MailConfig, Snapshot, TrackedPlaylist};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA: &str = include_str!("../db/schema.sql");

pub fn open_or_create(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    run_migrations(&conn)?;
    Ok(conn)
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// All configured upstream accounts, in id order.
pub fn list_connections(conn: &Connection) -> Result<Vec<ConnectionCredentials>> {
    let mut stmt =
        conn.prepare("SELECT id, client_id, client_secret FROM connection_credentials ORDER BY id")?;
    let rows = stmt.query_map([], |r| {
        Ok(ConnectionCredentials {
            id: r.get(0)?,
            client_id: r.get(1)?,
            client_secret: r.get(2)?,
        })
    })?;
    let mut v = Vec::new();
    for row in rows {
        v.push(row?);
    }
    Ok(v)
}

/// Tracked playlists of one connection, in id order. `last_state_json` is
/// deserialized here so callers only ever see typed snapshots.
pub fn list_tracked_playlists(conn: &Connection, connection_id: i64) -> Result<Vec<TrackedPlaylist>> {
    let mut stmt = conn.prepare(
        "SELECT id, external_playlist_id, last_state_json FROM playlists \
         WHERE connection_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![connection_id], |r| {
        Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, Option<String>>(2)?))
    })?;
    let mut v = Vec::new();
    for row in rows {
        let (id, external_id, state_json) = row?;
        let last_snapshot = match state_json {
            Some(s) => Some(
                serde_json::from_str(&s)
                    .with_context(|| format!("parsing stored snapshot for playlist {}", id))?,
            ),
            None => None,
        };
        v.push(TrackedPlaylist { id, external_id, last_snapshot });
    }
    Ok(v)
}

/// Replace the stored snapshot for a playlist. Runs unconditionally after
/// every successful fetch, before any notification attempt.
pub fn save_snapshot(conn: &Connection, playlist_id: i64, snapshot: &Snapshot) -> Result<()> {
    let json = serde_json::to_string(snapshot)?;
    let updated = conn.execute(
        "UPDATE playlists SET last_state_json = ?1 WHERE id = ?2",
        params![json, playlist_id],
    )?;
    if updated == 0 {
        anyhow::bail!("no tracked playlist with id {}", playlist_id);
    }
    Ok(())
}

/// Resolve subscriber addresses for a playlist through the group fan-out.
pub fn list_subscribers(conn: &Connection, playlist_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT m.email FROM playlists p \
         INNER JOIN playlist_groups pg ON p.id = pg.playlist_id \
         INNER JOIN group_members gm ON pg.group_id = gm.group_id \
         INNER JOIN members m ON m.id = gm.member_id \
         WHERE p.id = ?1 ORDER BY m.id",
    )?;
    let rows = stmt.query_map(params![playlist_id], |r| r.get::<_, String>(0))?;
    let mut v = Vec::new();
    for row in rows {
        v.push(row?);
    }
    Ok(v)
}

/// The single mail configuration row. An empty table is a valid outcome,
/// reported as None rather than an error.
pub fn load_mail_config(conn: &Connection) -> Result<Option<MailConfig>> {
    let mut stmt = conn.prepare(
        "SELECT email_sender, email_host, email_port, email_password FROM global_config LIMIT 1",
    )?;
    let row = stmt
        .query_row([], |r| {
            Ok(MailConfig {
                sender: r.get(0)?,
                host: r.get(1)?,
                port: r.get::<_, i64>(2)? as u16,
                password: r.get(3)?,
            })
        })
        .optional()?;
    Ok(row)
}

pub fn set_mail_config(conn: &Connection, mail: &MailConfig) -> Result<()> {
    conn.execute("DELETE FROM global_config", [])?;
    conn.execute(
        "INSERT INTO global_config (email_sender, email_host, email_port, email_password) \
         VALUES (?1, ?2, ?3, ?4)",
        params![mail.sender, mail.host, mail.port as i64, mail.password],
    )?;
    Ok(())
}

/// Register provider credentials; returns the new connection id.
pub fn add_connection(conn: &Connection, client_id: &str, client_secret: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO connection_credentials (client_id, client_secret) VALUES (?1, ?2)",
        params![client_id, client_secret],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Start watching an external playlist under a connection; returns the new
/// playlist id. The snapshot starts out absent ("never polled").
pub fn track_playlist(conn: &Connection, connection_id: i64, external_id: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO playlists (connection_id, external_playlist_id, last_state_json) \
         VALUES (?1, ?2, NULL)",
        params![connection_id, external_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Subscribe an email address to a playlist's digests. Reuses the member row
/// if the address is already known and the playlist's first group if one
/// exists, creating both otherwise.
pub fn subscribe_email(conn: &Connection, playlist_id: i64, email: &str) -> Result<()> {
    let member_id: i64 = {
        let existing = conn
            .query_row("SELECT id FROM members WHERE email = ?1", params![email], |r| r.get(0))
            .optional()?;
        match existing {
            Some(id) => id,
            None => {
                conn.execute("INSERT INTO members (email) VALUES (?1)", params![email])?;
                conn.last_insert_rowid()
            }
        }
    };

    let group_id: i64 = {
        let existing = conn
            .query_row(
                "SELECT group_id FROM playlist_groups WHERE playlist_id = ?1 ORDER BY group_id LIMIT 1",
                params![playlist_id],
                |r| r.get(0),
            )
            .optional()?;
        match existing {
            Some(id) => id,
            None => {
                let next: i64 = conn.query_row(
                    "SELECT COALESCE(MAX(group_id), 0) + 1 FROM playlist_groups",
                    [],
                    |r| r.get(0),
                )?;
                conn.execute(
                    "INSERT INTO playlist_groups (playlist_id, group_id) VALUES (?1, ?2)",
                    params![playlist_id, next],
                )?;
                next
            }
        }
    };

    conn.execute(
        "INSERT OR IGNORE INTO group_members (group_id, member_id) VALUES (?1, ?2)",
        params![group_id, member_id],
    )?;
    Ok(())
}

/// One row per tracked playlist for the status command.
pub fn playlist_overview(conn: &Connection) -> Result<Vec<(i64, i64, String, bool, usize)>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.connection_id, p.external_playlist_id, p.last_state_json IS NOT NULL \
         FROM playlists p ORDER BY p.id",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?, r.get::<_, String>(2)?, r.get::<_, bool>(3)?))
    })?;
    let mut v = Vec::new();
    for row in rows {
        let (id, connection_id, external_id, polled) = row?;
        let subscribers = list_subscribers(conn, id)?.len();
        v.push((id, connection_id, external_id, polled, subscribers));
    }
    Ok(v)
}
