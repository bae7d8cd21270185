mod common;

#[cfg(test)]
mod tests {
    use super::common::*;
    use serde_json::{Value, json};
    use sqlite_sessions::store::SessionStore;
    use sqlite_sessions::{Id, Session, SessionCookie};
    use time::macros::datetime;

    const TABLE: &str = "\"server_sessions\"";

    #[tokio::test]
    async fn test_reads_rows_written_by_other_hosts() {
        let (store, pool) = setup_store().await;
        let data = json!({
            "cookie": {
                "originalMaxAge": 86400000,
                "expires": "2030-06-01T12:00:00.000Z",
                "secure": false,
                "httpOnly": true,
                "path": "/",
                "sameSite": "lax"
            },
            "views": 3,
            "user": {"id": 1, "name": "Test User"}
        });

        sqlx::query("insert or replace into server_sessions values (?, ?, ?)")
            .bind("legacy")
            .bind(now_millis() + 60_000)
            .bind(data.to_string())
            .execute(&pool)
            .await
            .unwrap();

        let session = store.get(&Id::from("legacy")).await.unwrap().unwrap();
        assert_eq!(
            session.cookie.expires,
            Some(datetime!(2030-06-01 12:00 UTC))
        );
        assert!(session.cookie.max_age.is_none());
        assert_eq!(session.cookie.extra["sameSite"], json!("lax"));
        assert_eq!(session.get::<u32>("views").unwrap(), Some(3));
        assert_eq!(session.get::<TestUser>("user").unwrap(), Some(create_test_user()));
    }

    #[tokio::test]
    async fn test_stores_plain_json() {
        let (store, pool) = setup_store().await;
        let session_id = Id::default();
        let mut session = Session::new(
            SessionCookie::build()
                .max_age(5000)
                .expires(datetime!(2030-01-01 0:00 UTC)),
        );
        session.insert("user", &"a").unwrap();

        store.set(&session_id, &session).await.unwrap();

        let raw: String = sqlx::query_scalar(&format!(
            "select data from {TABLE} where session_id = ?"
        ))
        .bind(session_id.as_str())
        .fetch_one(&pool)
        .await
        .unwrap();
        let raw: Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(
            raw,
            json!({
                "cookie": {"maxAge": 5000, "expires": "2030-01-01T00:00:00Z"},
                "user": "a"
            })
        );
    }

    #[tokio::test]
    async fn test_unknown_cookie_members_survive_round_trip() {
        let (store, _pool) = setup_store().await;
        let session_id = Id::default();
        let session: Session = serde_json::from_value(json!({
            "cookie": {"maxAge": 60000, "domain": "example.com", "priority": "high"},
            "flash": ["saved"]
        }))
        .unwrap();

        store.set(&session_id, &session).await.unwrap();
        let fetched = store.get(&session_id).await.unwrap().unwrap();

        assert_eq!(fetched, session);
        assert_eq!(fetched.cookie.extra["domain"], json!("example.com"));
        assert_eq!(
            fetched.get::<Vec<String>>("flash").unwrap(),
            Some(vec!["saved".to_string()])
        );
    }

    #[tokio::test]
    async fn test_removed_members_are_not_persisted() {
        let (store, _pool) = setup_store().await;
        let session_id = Id::default();
        let mut session = create_test_session(Some(60_000));

        store.set(&session_id, &session).await.unwrap();
        session.remove("preferences");
        store.set(&session_id, &session).await.unwrap();

        let fetched = store.get(&session_id).await.unwrap().unwrap();
        assert!(!fetched.data().contains_key("preferences"));
        assert!(fetched.data().contains_key("user"));
    }

    async fn insert_row(pool: &sqlx::SqlitePool, session_id: &str, data: Value) {
        sqlx::query("insert or replace into server_sessions values (?, ?, ?)")
            .bind(session_id)
            .bind(now_millis() + 60_000)
            .bind(data.to_string())
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reads_fractional_max_age() {
        let (store, pool) = setup_store().await;
        insert_row(&pool, "fractional", json!({"cookie": {"maxAge": 5000.5}, "u": 1})).await;

        let session = store.get(&Id::from("fractional")).await.unwrap().unwrap();
        assert_eq!(session.cookie.max_age, Some(5000));
        assert_eq!(session.get::<u32>("u").unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_reads_epoch_and_date_only_expires() {
        let (store, pool) = setup_store().await;
        insert_row(&pool, "epoch", json!({"cookie": {"expires": 1_700_000_000_000_i64}})).await;
        insert_row(&pool, "date", json!({"cookie": {"expires": "2030-06-01"}})).await;

        let epoch = store.get(&Id::from("epoch")).await.unwrap().unwrap();
        assert_eq!(epoch.cookie.expires_millis(), Some(1_700_000_000_000));

        let date = store.get(&Id::from("date")).await.unwrap().unwrap();
        assert_eq!(date.cookie.expires, Some(datetime!(2030-06-01 0:00 UTC)));
    }

    #[tokio::test]
    async fn test_unreadable_expires_is_kept_but_ignored() {
        let (store, pool) = setup_store().await;
        insert_row(&pool, "odd", json!({"cookie": {"expires": "next tuesday"}})).await;
        let session_id = Id::from("odd");
        let before = stored_expiry(&pool, TABLE, "odd").await;

        let session = store.get(&session_id).await.unwrap().unwrap();
        assert!(session.cookie.expires.is_none());
        assert_eq!(session.cookie.extra["expires"], json!("next tuesday"));

        // No usable expiry, so touch leaves the stored one alone.
        assert!(store.touch(&session_id, Some(&session)).await.unwrap());
        assert_eq!(stored_expiry(&pool, TABLE, "odd").await, before);
    }

    #[tokio::test]
    async fn test_all_reads_mixed_host_rows() {
        let (store, pool) = setup_store().await;
        insert_row(&pool, "a", json!({"cookie": {"maxAge": 5000.5}})).await;
        insert_row(&pool, "b", json!({"cookie": {"expires": 1_700_000_000_000_i64}})).await;
        insert_row(&pool, "c", json!({"cookie": {"expires": "2030-06-01"}})).await;
        insert_row(&pool, "d", json!({"cookie": {"expires": "garbage"}, "n": 4})).await;

        let sessions = store.all().await.unwrap();
        assert_eq!(sessions.len(), 4);
    }
}
