//! Tests for users module
//!
//! These tests exercise the SQLite credential store against an in-memory
//! database.

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::auth::models::OAuthProvider;
    use crate::common::testing::memory_pool;
    use crate::common::Validator;
    use models::{AccountFilter, ListAccountsQuery, SortField, SortOrder};
    use validators::ListAccountsValidator;

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            password_hash: Some("$2b$04$placeholderplaceholderplaceholderplaceholderpla".to_string()),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_defaults() {
        let store = SqliteCredentialStore::new(memory_pool().await);

        let account = store.create(new_account("ada@example.com")).await.unwrap();

        assert!(account.id > 0);
        assert_eq!(account.email, "ada@example.com");
        assert_eq!(account.role, Role::User);
        assert!(account.is_active);
        assert!(account.refresh_token.is_none());
        assert!(account.created_at.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let store = SqliteCredentialStore::new(memory_pool().await);
        store.create(new_account("ada@example.com")).await.unwrap();

        let err = store
            .create(new_account("ada@example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::UniqueViolation));
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_sensitive() {
        let store = SqliteCredentialStore::new(memory_pool().await);
        store.create(new_account("Ada@Example.com")).await.unwrap();

        assert!(store.find_by_email("Ada@Example.com").await.unwrap().is_some());
        assert!(store.find_by_email("ada@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_provider_id_per_provider() {
        let store = SqliteCredentialStore::new(memory_pool().await);
        let created = store
            .create(NewAccount {
                email: "g@example.com".to_string(),
                google_id: Some("G1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let found = store
            .find_by_provider_id(OAuthProvider::Google, "G1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);

        assert!(store
            .find_by_provider_id(OAuthProvider::Facebook, "G1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_save_does_not_touch_refresh_token() {
        let store = SqliteCredentialStore::new(memory_pool().await);
        let account = store.create(new_account("ada@example.com")).await.unwrap();
        store
            .update_refresh_token(account.id, Some("current-token"))
            .await
            .unwrap();

        let mut stale = account.clone();
        stale.avatar = Some("https://cdn.example.com/a.png".to_string());
        stale.refresh_token = None;
        let saved = store.save(&stale).await.unwrap();

        assert_eq!(saved.avatar.as_deref(), Some("https://cdn.example.com/a.png"));
        assert_eq!(saved.refresh_token.as_deref(), Some("current-token"));
    }

    #[tokio::test]
    async fn test_update_refresh_token_overwrites_and_clears() {
        let store = SqliteCredentialStore::new(memory_pool().await);
        let account = store.create(new_account("ada@example.com")).await.unwrap();

        store.update_refresh_token(account.id, Some("one")).await.unwrap();
        store.update_refresh_token(account.id, Some("two")).await.unwrap();
        let current = store.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(current.refresh_token.as_deref(), Some("two"));

        store.update_refresh_token(account.id, None).await.unwrap();
        let cleared = store.find_by_id(account.id).await.unwrap().unwrap();
        assert!(cleared.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_soft_deleted_accounts_are_hidden_but_keep_email() {
        let store = SqliteCredentialStore::new(memory_pool().await);
        let account = store.create(new_account("ada@example.com")).await.unwrap();

        store.soft_delete(account.id).await.unwrap();

        assert!(store.find_by_id(account.id).await.unwrap().is_none());
        assert!(store.find_by_email("ada@example.com").await.unwrap().is_none());
        assert!(matches!(
            store.soft_delete(account.id).await.unwrap_err(),
            StoreError::NotFound
        ));
        assert!(matches!(
            store.create(new_account("ada@example.com")).await.unwrap_err(),
            StoreError::UniqueViolation
        ));
    }

    #[test]
    fn test_account_serialization_hides_secrets() {
        let account = Account {
            id: 7,
            email: "ada@example.com".to_string(),
            password_hash: Some("hash".to_string()),
            first_name: None,
            last_name: None,
            role: Role::Admin,
            google_id: None,
            facebook_id: None,
            avatar: None,
            is_active: true,
            refresh_token: Some("secret".to_string()),
            created_at: None,
            updated_at: None,
        };

        let json = serde_json::to_value(&account).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("refreshToken").is_none());
        assert_eq!(json["role"], "admin");
        assert_eq!(json["isActive"], true);
    }

    // ==================== Listing ====================

    #[tokio::test]
    async fn test_list_skips_deleted_and_reports_totals() {
        let store = SqliteCredentialStore::new(memory_pool().await);
        for email in ["a@example.com", "b@example.com", "c@example.com"] {
            store.create(new_account(email)).await.unwrap();
        }
        let gone = store.create(new_account("d@example.com")).await.unwrap();
        store.soft_delete(gone.id).await.unwrap();

        let filter = AccountFilter {
            limit: 2,
            sort_by: SortField::Email,
            sort_order: SortOrder::Asc,
            ..Default::default()
        };
        let page = store.list(&filter).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        let emails: Vec<_> = page.data.iter().map(|a| a.email.as_str()).collect();
        assert_eq!(emails, vec!["a@example.com", "b@example.com"]);

        let last = store
            .list(&AccountFilter { page: 2, ..filter })
            .await
            .unwrap();
        assert_eq!(last.data.len(), 1);
        assert_eq!(last.data[0].email, "c@example.com");
    }

    #[tokio::test]
    async fn test_list_search_and_role_filter() {
        let store = SqliteCredentialStore::new(memory_pool().await);
        store.create(new_account("ada@example.com")).await.unwrap();
        store
            .create(NewAccount {
                email: "root@example.com".to_string(),
                last_name: Some("Byron".to_string()),
                role: Role::Admin,
                ..Default::default()
            })
            .await
            .unwrap();

        let by_name = store
            .list(&AccountFilter {
                search: Some("byr".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_name.total, 1);
        assert_eq!(by_name.data[0].email, "root@example.com");

        let users = store
            .list(&AccountFilter {
                role: Some(Role::User),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(users.total, 1);
        assert_eq!(users.data[0].email, "ada@example.com");

        let none = store
            .list(&AccountFilter {
                search: Some("lovelace".to_string()),
                role: Some(Role::Admin),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(none.total, 0);
        assert_eq!(none.total_pages, 0);
        assert!(none.data.is_empty());
    }

    #[test]
    fn test_list_query_defaults_and_validation() {
        let filter = AccountFilter::from(&ListAccountsQuery::default());
        assert_eq!(filter, AccountFilter::default());
        assert_eq!(filter.page, 1);
        assert_eq!(filter.limit, 10);
        assert_eq!(filter.sort_by, SortField::CreatedAt);
        assert_eq!(filter.sort_order, SortOrder::Desc);

        let query = ListAccountsQuery {
            search: Some("  ".to_string()),
            page: Some("3".to_string()),
            limit: Some("20".to_string()),
            sort_by: Some("lastName".to_string()),
            sort_order: Some("asc".to_string()),
            ..Default::default()
        };
        assert!(ListAccountsValidator.validate(&query).is_valid);
        let filter = AccountFilter::from(&query);
        assert_eq!(filter.search, None);
        assert_eq!(filter.offset(), 40);
        assert_eq!(filter.sort_by.column(), "last_name");

        let bad = ListAccountsQuery {
            page: Some("0".to_string()),
            limit: Some("101".to_string()),
            sort_by: Some("passwordHash".to_string()),
            ..Default::default()
        };
        let result = ListAccountsValidator.validate(&bad);
        let fields: Vec<_> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["page", "limit", "sortBy"]);
    }
}
