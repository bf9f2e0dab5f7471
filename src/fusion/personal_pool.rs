//! Personal Search Pool: builds a restricted set of message
//! ids for personal/temporal/multi-entity questions before handing them to
//! `HybridRetriever::search_in_pool`.

use anyhow::Result;
use chrono::Utc;
use sqlx::{PgPool, Row};

/// `message_ids = pool-A ∪ pool-B`, per the known-user-id vs name-pattern
/// branches below.
pub async fn build_pool(
    db: &PgPool,
    chat_id: i64,
    user_id: Option<i64>,
    names: &[String],
    days: i64,
    self_cap: i64,
    mentions_cap: i64,
) -> Result<Vec<i64>> {
    let cutoff = Utc::now() - chrono::Duration::days(days);

    let mut pool = match user_id {
        Some(user_id) => self_authored_ids(db, chat_id, user_id, cutoff, self_cap).await?,
        None => name_authored_ids(db, chat_id, names, cutoff, self_cap).await?,
    };

    let mentions = match user_id {
        Some(user_id) => mentions_of_names_excluding_user(db, chat_id, names, user_id, mentions_cap).await?,
        None => mentions_of_names_excluding_names(db, chat_id, names, mentions_cap).await?,
    };

    pool.extend(mentions);
    pool.sort_unstable();
    pool.dedup();
    Ok(pool)
}

async fn self_authored_ids(
    db: &PgPool,
    chat_id: i64,
    user_id: i64,
    since: chrono::DateTime<Utc>,
    cap: i64,
) -> Result<Vec<i64>> {
    let rows = sqlx::query(
        r#"
        SELECT id FROM messages
        WHERE chat_id = $1 AND from_user_id = $2 AND date_utc >= $3
        ORDER BY date_utc DESC
        LIMIT $4
        "#,
    )
    .bind(chat_id)
    .bind(user_id)
    .bind(since)
    .bind(cap)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(|r| r.get("id")).collect())
}

async fn mentions_of_names_excluding_user(
    db: &PgPool,
    chat_id: i64,
    names: &[String],
    user_id: i64,
    cap: i64,
) -> Result<Vec<i64>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let mut query = sqlx::QueryBuilder::<sqlx::Postgres>::new(
        "SELECT id FROM messages WHERE chat_id = ",
    );
    query.push_bind(chat_id);
    query.push(" AND from_user_id <> ");
    query.push_bind(user_id);
    query.push(" AND (");
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            query.push(" OR ");
        }
        query.push("text ILIKE ");
        query.push_bind(format!("%{name}%"));
    }
    query.push(") ORDER BY date_utc DESC LIMIT ");
    query.push_bind(cap);

    let rows = query.build().fetch_all(db).await?;
    Ok(rows.into_iter().map(|r| r.get("id")).collect())
}

/// No stable user id: pool-A is messages whose own metadata identifies the
/// author as one of `names` (by display name or username), or whose
/// embedded chunk text begins with the `"Name: "` convention.
async fn name_authored_ids(
    db: &PgPool,
    chat_id: i64,
    names: &[String],
    since: chrono::DateTime<Utc>,
    cap: i64,
) -> Result<Vec<i64>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let mut query = sqlx::QueryBuilder::<sqlx::Postgres>::new(
        "SELECT id FROM messages WHERE chat_id = ",
    );
    query.push_bind(chat_id);
    query.push(" AND date_utc >= ");
    query.push_bind(since);
    query.push(" AND (");
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            query.push(" OR ");
        }
        query.push("display_name ILIKE ").push_bind(name.clone());
        query.push(" OR username ILIKE ").push_bind(name.clone());
    }
    query.push(") ORDER BY date_utc DESC LIMIT ");
    query.push_bind(cap);

    let rows = query.build().fetch_all(db).await?;
    let mut ids: Vec<i64> = rows.into_iter().map(|r| r.get("id")).collect();

    ids.extend(name_prefixed_chunk_ids(db, chat_id, names, since, cap).await?);
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Pool-A's other half: messages whose batch-grouped `chunk_text` begins
/// with `"Name: "` for one of `names`, joined back to `messages` only to
/// apply the same recency window and ordering as the metadata branch above.
async fn name_prefixed_chunk_ids(
    db: &PgPool,
    chat_id: i64,
    names: &[String],
    since: chrono::DateTime<Utc>,
    cap: i64,
) -> Result<Vec<i64>> {
    let mut query = sqlx::QueryBuilder::<sqlx::Postgres>::new(
        "SELECT me.message_id AS id FROM message_embeddings me \
         JOIN messages m ON m.chat_id = me.chat_id AND m.id = me.message_id \
         WHERE me.chat_id = ",
    );
    query.push_bind(chat_id);
    query.push(" AND m.date_utc >= ");
    query.push_bind(since);
    query.push(" AND (");
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            query.push(" OR ");
        }
        query.push("me.chunk_text ILIKE ");
        query.push_bind(format!("{name}: %"));
    }
    query.push(") ORDER BY m.date_utc DESC LIMIT ");
    query.push_bind(cap);

    let rows = query.build().fetch_all(db).await?;
    Ok(rows.into_iter().map(|r| r.get("id")).collect())
}

async fn mentions_of_names_excluding_names(
    db: &PgPool,
    chat_id: i64,
    names: &[String],
    cap: i64,
) -> Result<Vec<i64>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let mut query = sqlx::QueryBuilder::<sqlx::Postgres>::new(
        "SELECT id FROM messages WHERE chat_id = ",
    );
    query.push_bind(chat_id);
    query.push(" AND (");
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            query.push(" OR ");
        }
        query.push("text ILIKE ");
        query.push_bind(format!("%{name}%"));
    }
    query.push(") AND NOT (");
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            query.push(" OR ");
        }
        query.push("display_name ILIKE ").push_bind(name.clone());
        query.push(" OR username ILIKE ").push_bind(name.clone());
    }
    query.push(") ORDER BY date_utc DESC LIMIT ");
    query.push_bind(cap);

    let rows = query.build().fetch_all(db).await?;
    Ok(rows.into_iter().map(|r| r.get("id")).collect())
}
