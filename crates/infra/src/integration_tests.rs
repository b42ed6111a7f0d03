//! Integration tests for the full access-control pipeline.
//!
//! Tests: RoleBinder / UserDirectory → in-memory stores → TokenIssuer / Authorizer
//!
//! Verifies:
//! - Role edits and role disablement apply to the very next decision
//! - Credential failures are typed and collapse to one public message
//! - Concurrent readers never observe a partially replaced grant set

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};

    use backoffice_auth::permissions::{dashboard, products, roles, users};
    use backoffice_auth::{
        validate, Authorizer, Catalog, CreateRole, Decision, DeleteRole, DenialKind, DisableRole,
        EnableRole, Hs256Signer, NewUser, Permission, Role, RoleBinder, RoleOrder, RoleQuery,
        RoleStore, SortDirection, StoreError, TokenIssuer, TokenSettings, UpdateRole, UpdateUser,
        User, UserDirectory, UserOrder, UserQuery, UserStore,
    };
    use backoffice_core::{AuthFailure, DomainError, ExpectedVersion, FixedClock, RoleId, UserId};

    use crate::store::{InMemoryRoleStore, InMemoryUserStore};

    type Roles = Arc<InMemoryRoleStore>;
    type Users = Arc<InMemoryUserStore>;

    const PASSWORD: &str = "correct-horse";

    fn issued_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 8, 30, 0).unwrap()
    }

    fn token_settings() -> TokenSettings {
        TokenSettings::new("integration-test-signing-key-0123456789")
    }

    struct Harness {
        roles: Roles,
        users: Users,
        binder: RoleBinder<Roles, Users>,
        directory: UserDirectory<Users, Roles>,
        authorizer: Authorizer<Users, Roles>,
        issuer: TokenIssuer<Users, Roles>,
    }

    fn setup() -> Harness {
        backoffice_observability::init_for_tests();

        let roles: Roles = Arc::new(InMemoryRoleStore::new());
        let users: Users = Arc::new(InMemoryUserStore::new());
        Harness {
            binder: RoleBinder::new(roles.clone(), users.clone()),
            directory: UserDirectory::new(users.clone(), roles.clone()),
            authorizer: Authorizer::new(users.clone(), roles.clone()),
            issuer: TokenIssuer::new(
                users.clone(),
                roles.clone(),
                &token_settings(),
                Arc::new(FixedClock::new(issued_at())),
            )
            .unwrap(),
            roles,
            users,
        }
    }

    fn names(permissions: &[Permission]) -> Vec<String> {
        permissions.iter().map(|p| p.to_string()).collect()
    }

    fn create_role(name: &str, permissions: &[Permission]) -> CreateRole {
        CreateRole {
            name: name.to_string(),
            description: format!("{name} role"),
            permissions: names(permissions),
        }
    }

    fn new_user(email: &str, role_id: RoleId) -> NewUser {
        NewUser {
            email: email.to_string(),
            full_name: "Test User".to_string(),
            password: PASSWORD.to_string(),
            role_id,
        }
    }

    impl Harness {
        async fn role_with_user(&self, name: &str, permissions: &[Permission]) -> (Role, User) {
            let role = self.binder.create_role(create_role(name, permissions)).await.unwrap();
            let email = format!("{}@example.com", name.to_lowercase());
            let user = self.directory.create_user(new_user(&email, role.id)).await.unwrap();
            (role, user)
        }

        async fn decide(&self, user: &User, permission: &Permission) -> Decision {
            self.authorizer.authorize(Some(user.id), permission).await.unwrap()
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Role binding
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn support_role_scenario() {
        let h = setup();
        let catalog = Catalog::global();
        assert!(catalog.contains("Permissions.Roles.Edit"));
        assert!(catalog.contains("Permissions.Users.View"));

        let (role, user) = h.role_with_user("Support", &[users::VIEW]).await;
        assert_eq!(role.permissions, BTreeSet::from([users::VIEW]));

        assert!(!validate(catalog, &["Permissions.Users.View", "Permissions.Bogus.X"]));

        let updated = h
            .binder
            .update_role(UpdateRole {
                role_id: role.id,
                name: "Support".to_string(),
                description: "desc2".to_string(),
                permissions: names(&[roles::EDIT]),
            })
            .await
            .unwrap();
        assert_eq!(updated.description, "desc2");

        assert_eq!(h.decide(&user, &users::VIEW).await, Decision::Deny);
        assert_eq!(h.decide(&user, &roles::EDIT).await, Decision::Allow);
    }

    #[tokio::test]
    async fn create_role_rejects_bad_input() {
        let h = setup();

        let err = h
            .binder
            .create_role(CreateRole {
                name: "Support".into(),
                description: "desc".into(),
                permissions: vec!["Permissions.Users.View".into(), "Permissions.Bogus.X".into()],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = h.binder.create_role(create_role("Support", &[])).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = h
            .binder
            .create_role(create_role("   ", &[users::VIEW]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        assert!(h.roles.list_roles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_active_role_name_conflicts() {
        let h = setup();
        h.binder.create_role(create_role("Support", &[users::VIEW])).await.unwrap();

        let err = h
            .binder
            .create_role(create_role("support", &[roles::VIEW]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_role_is_idempotent() {
        let h = setup();
        let (role, _) = h.role_with_user("Support", &[users::VIEW]).await;

        let cmd = UpdateRole {
            role_id: role.id,
            name: "Support".into(),
            description: "desc2".into(),
            permissions: names(&[roles::EDIT, roles::VIEW, roles::EDIT]),
        };
        let once = h.binder.update_role(cmd.clone()).await.unwrap();
        let twice = h.binder.update_role(cmd).await.unwrap();

        assert_eq!(once.permissions, BTreeSet::from([roles::EDIT, roles::VIEW]));
        assert_eq!(once.permissions, twice.permissions);
        assert_eq!(once.version, twice.version);
    }

    #[tokio::test]
    async fn update_role_error_cases() {
        let h = setup();
        let (support, member) = h.role_with_user("Support", &[users::VIEW]).await;
        h.binder.create_role(create_role("Sales", &[products::VIEW])).await.unwrap();

        let rejected_sets = [
            vec!["Permissions.Users.View".to_string(), "Permissions.Bogus.X".to_string()],
            vec![],
        ];
        for permissions in rejected_sets {
            let err = h
                .binder
                .update_role(UpdateRole {
                    role_id: support.id,
                    name: "Support".into(),
                    description: "desc".into(),
                    permissions,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));

            let stored = h.roles.find_role_by_id(support.id).await.unwrap().unwrap();
            assert_eq!(stored, support);
            assert_eq!(h.decide(&member, &users::VIEW).await, Decision::Allow);
            assert_eq!(h.decide(&member, &roles::EDIT).await, Decision::Deny);
        }

        let missing = h
            .binder
            .update_role(UpdateRole {
                role_id: RoleId::new(),
                name: "Ghost".into(),
                description: "desc".into(),
                permissions: names(&[users::VIEW]),
            })
            .await
            .unwrap_err();
        assert!(matches!(missing, DomainError::NotFound(_)));

        let renamed = h
            .binder
            .update_role(UpdateRole {
                role_id: support.id,
                name: "SALES".into(),
                description: "desc".into(),
                permissions: names(&[users::VIEW]),
            })
            .await
            .unwrap_err();
        assert!(matches!(renamed, DomainError::Conflict(_)));

        h.binder.disable_role(DisableRole { role_id: support.id }).await.unwrap();
        let inactive = h
            .binder
            .update_role(UpdateRole {
                role_id: support.id,
                name: "Support".into(),
                description: "desc".into(),
                permissions: names(&[users::VIEW]),
            })
            .await
            .unwrap_err();
        assert!(matches!(inactive, DomainError::State(_)));
    }

    #[tokio::test]
    async fn stale_writer_gets_conflict() {
        let h = setup();
        let role = h.binder.create_role(create_role("Support", &[users::VIEW])).await.unwrap();

        h.binder.disable_role(DisableRole { role_id: role.id }).await.unwrap();

        let stale = Role {
            permissions: BTreeSet::from([roles::DELETE]),
            ..role.clone()
        };
        let err = h
            .roles
            .update_role(stale, ExpectedVersion::Exact(role.version))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));
        assert_eq!(DomainError::from(err).code(), "conflict");
    }

    #[tokio::test]
    async fn enable_disable_state_transitions() {
        let h = setup();
        let role = h.binder.create_role(create_role("Support", &[users::VIEW])).await.unwrap();

        let err = h.binder.enable_role(EnableRole { role_id: role.id }).await.unwrap_err();
        assert!(matches!(err, DomainError::State(_)));

        let disabled = h.binder.disable_role(DisableRole { role_id: role.id }).await.unwrap();
        assert!(!disabled.active);
        let err = h.binder.disable_role(DisableRole { role_id: role.id }).await.unwrap_err();
        assert!(matches!(err, DomainError::State(_)));

        // The name is free while disabled; re-enabling must not create a duplicate.
        let twin = h.binder.create_role(create_role("Support", &[roles::VIEW])).await.unwrap();
        let err = h.binder.enable_role(EnableRole { role_id: role.id }).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        h.binder.disable_role(DisableRole { role_id: twin.id }).await.unwrap();
        let enabled = h.binder.enable_role(EnableRole { role_id: role.id }).await.unwrap();
        assert!(enabled.active);

        let err = h
            .binder
            .enable_role(EnableRole { role_id: RoleId::new() })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_conflicts_iff_role_is_referenced() {
        let h = setup();
        let (held, user) = h.role_with_user("Support", &[users::VIEW]).await;
        let spare = h.binder.create_role(create_role("Spare", &[roles::VIEW])).await.unwrap();

        let err = h.binder.delete_role(DeleteRole { role_id: held.id }).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        h.binder.delete_role(DeleteRole { role_id: spare.id }).await.unwrap();
        assert!(h.roles.find_role_by_id(spare.id).await.unwrap().is_none());

        let err = h.binder.delete_role(DeleteRole { role_id: spare.id }).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        // Once nobody holds it, the role can go.
        let other = h.binder.create_role(create_role("Other", &[dashboard::VIEW])).await.unwrap();
        h.directory.change_role(user.id, other.id).await.unwrap();
        h.binder.delete_role(DeleteRole { role_id: held.id }).await.unwrap();
    }

    #[tokio::test]
    async fn list_roles_filters_sorts_and_pages() {
        let h = setup();
        for name in ["Support", "Sales", "Admin", "Auditor", "Supervisor"] {
            h.binder.create_role(create_role(name, &[users::VIEW])).await.unwrap();
        }

        let page = h
            .binder
            .list_roles(RoleQuery {
                filter: Some("SU".into()),
                ..RoleQuery::default()
            })
            .await
            .unwrap();
        let found: Vec<&str> = page.items.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(found, ["Supervisor", "Support"]);
        assert_eq!(page.total, 2);

        let page = h
            .binder
            .list_roles(RoleQuery {
                direction: SortDirection::Desc,
                page: 2,
                page_size: 2,
                ..RoleQuery::default()
            })
            .await
            .unwrap();
        let found: Vec<&str> = page.items.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(found, ["Sales", "Auditor"]);
        assert_eq!(page.total, 5);

        let page = h
            .binder
            .list_roles(RoleQuery {
                order_by: RoleOrder::Id,
                page_size: 1000,
                ..RoleQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.page_size, 100);
        assert!(page.items.windows(2).all(|w| w[0].id < w[1].id));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Authorization
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn authorize_matches_role_membership() {
        let h = setup();
        let granted = [users::VIEW, products::EDIT];
        let (_, user) = h.role_with_user("Support", &granted).await;

        for permission in Catalog::global().all_permissions() {
            let expected = if granted.contains(permission) {
                Decision::Allow
            } else {
                Decision::Deny
            };
            assert_eq!(h.decide(&user, permission).await, expected, "{permission}");
        }
    }

    #[tokio::test]
    async fn unresolvable_subjects_are_denied() {
        let h = setup();
        h.role_with_user("Support", &[users::VIEW]).await;

        let anonymous = h.authorizer.explain(None, &users::VIEW).await.unwrap();
        assert_eq!(anonymous.decision, Decision::Deny);
        assert_eq!(anonymous.denial, Some(DenialKind::AnonymousSubject));

        let unknown = h
            .authorizer
            .explain(Some(UserId::new(404)), &users::VIEW)
            .await
            .unwrap();
        assert_eq!(unknown.denial, Some(DenialKind::UnknownUser));

        let malformed = h
            .authorizer
            .authorize_claim(Some("not-a-number"), &users::VIEW)
            .await
            .unwrap();
        assert_eq!(malformed, Decision::Deny);
        let parsed = h.authorizer.authorize_claim(Some("1"), &users::VIEW).await.unwrap();
        assert_eq!(parsed, Decision::Allow);
    }

    #[tokio::test]
    async fn dangling_role_reference_is_denied() {
        let h = setup();
        // Bypass the directory's role check to simulate corrupted data.
        let orphan = h
            .users
            .create_user(new_user("orphan@example.com", RoleId::new()))
            .await
            .unwrap();

        let explanation = h.authorizer.explain(Some(orphan.id), &users::VIEW).await.unwrap();
        assert_eq!(explanation.decision, Decision::Deny);
        assert_eq!(explanation.denial, Some(DenialKind::DanglingRole));

        let err = h.issuer.issue_token("orphan@example.com", PASSWORD).await.unwrap_err();
        assert_eq!(err.code(), "integrity_violation");
        assert_eq!(err.public_message(), "internal error");
    }

    #[tokio::test]
    async fn disabling_role_denies_without_reissue() {
        let h = setup();
        let (role, user) = h.role_with_user("Support", &[users::VIEW, roles::VIEW]).await;
        let (issued, _) = h.issuer.issue_token(&user.email, PASSWORD).await.unwrap();

        assert_eq!(h.decide(&user, &users::VIEW).await, Decision::Allow);
        h.binder.disable_role(DisableRole { role_id: role.id }).await.unwrap();

        let claims = Hs256Signer::new(&token_settings())
            .unwrap()
            .verify(&issued.token, issued_at())
            .unwrap();
        for permission in [users::VIEW, roles::VIEW] {
            let decision = h.authorizer.authorize_claims(Some(&claims), &permission).await.unwrap();
            assert_eq!(decision, Decision::Deny);
        }
        let explanation = h.authorizer.explain(Some(user.id), &users::VIEW).await.unwrap();
        assert_eq!(explanation.denial, Some(DenialKind::InactiveRole));
    }

    #[tokio::test]
    async fn disabled_user_is_denied() {
        let h = setup();
        let (_, user) = h.role_with_user("Support", &[users::VIEW]).await;
        h.directory.disable_user(user.id).await.unwrap();

        let explanation = h.authorizer.explain(Some(user.id), &users::VIEW).await.unwrap();
        assert_eq!(explanation.denial, Some(DenialKind::InactiveUser));

        h.directory.enable_user(user.id).await.unwrap();
        assert_eq!(h.decide(&user, &users::VIEW).await, Decision::Allow);
    }

    #[tokio::test]
    async fn command_requirements_gate_binder_calls() {
        let h = setup();
        let (_, editor) = h.role_with_user("Editor", &[roles::EDIT]).await;
        let target = h.binder.create_role(create_role("Target", &[users::VIEW])).await.unwrap();

        let disable = DisableRole { role_id: target.id };
        let delete = DeleteRole { role_id: target.id };
        assert_eq!(
            h.authorizer.authorize_command(Some(editor.id), &disable).await.unwrap(),
            Decision::Allow
        );
        assert_eq!(
            h.authorizer.authorize_command(Some(editor.id), &delete).await.unwrap(),
            Decision::Deny
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_readers_never_see_mixed_grants() {
        let h = setup();
        let p1 = [users::VIEW, users::CREATE, users::EDIT];
        let p2 = [roles::VIEW, roles::EDIT];
        let (role, user) = h.role_with_user("Support", &p1).await;

        let before = names(&p1);
        let after = names(&p2);
        let mut sorted_before = before.clone();
        sorted_before.sort();
        let mut sorted_after = after.clone();
        sorted_after.sort();

        let user_id = user.id;
        let mut readers = Vec::new();
        for _ in 0..4 {
            let authorizer = h.authorizer.clone();
            let (sorted_before, sorted_after) = (sorted_before.clone(), sorted_after.clone());
            readers.push(tokio::spawn(async move {
                for _ in 0..200 {
                    let explanation =
                        authorizer.explain(Some(user_id), &users::VIEW).await.unwrap();
                    let allowed = explanation.decision == Decision::Allow;
                    let seen = explanation.subject.unwrap().effective_permissions;
                    assert!(
                        seen == sorted_before || seen == sorted_after,
                        "mixed grant set observed: {seen:?}"
                    );
                    assert_eq!(allowed, seen == sorted_before);
                    tokio::task::yield_now().await;
                }
            }));
        }

        for i in 0..51 {
            let permissions = if i % 2 == 0 { after.clone() } else { before.clone() };
            h.binder
                .update_role(UpdateRole {
                    role_id: role.id,
                    name: "Support".into(),
                    description: "desc".into(),
                    permissions,
                })
                .await
                .unwrap();
            tokio::task::yield_now().await;
        }

        for reader in readers {
            reader.await.unwrap();
        }

        // The last toggle lands on the second set.
        assert_eq!(h.decide(&user, &users::VIEW).await, Decision::Deny);
        assert_eq!(h.decide(&user, &roles::EDIT).await, Decision::Allow);
    }

    /// Role store that stalls before every write.
    struct SlowRoleStore {
        inner: Roles,
        delay: Duration,
    }

    #[async_trait]
    impl RoleStore for SlowRoleStore {
        async fn find_role_by_id(&self, role_id: RoleId) -> Result<Option<Role>, StoreError> {
            self.inner.find_role_by_id(role_id).await
        }

        async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
            self.inner.find_role_by_name(name).await
        }

        async fn create_role(&self, role: Role) -> Result<Role, StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.create_role(role).await
        }

        async fn update_role(
            &self,
            role: Role,
            expected_version: ExpectedVersion,
        ) -> Result<Role, StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.update_role(role, expected_version).await
        }

        async fn delete_role(&self, role_id: RoleId) -> Result<bool, StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.delete_role(role_id).await
        }

        async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
            self.inner.list_roles().await
        }
    }

    #[tokio::test]
    async fn cancelled_update_leaves_role_untouched() {
        let h = setup();
        let (role, user) = h.role_with_user("Support", &[users::VIEW]).await;

        let slow = RoleBinder::new(
            SlowRoleStore {
                inner: h.roles.clone(),
                delay: Duration::from_millis(200),
            },
            h.users.clone(),
        );
        let outcome = tokio::time::timeout(
            Duration::from_millis(10),
            slow.update_role(UpdateRole {
                role_id: role.id,
                name: "Support".into(),
                description: "desc".into(),
                permissions: names(&[roles::EDIT]),
            }),
        )
        .await;
        assert!(outcome.is_err(), "update should have been cancelled");

        let stored = h.roles.find_role_by_id(role.id).await.unwrap().unwrap();
        assert_eq!(stored, role);
        assert_eq!(h.decide(&user, &users::VIEW).await, Decision::Allow);
        assert_eq!(h.decide(&user, &roles::EDIT).await, Decision::Deny);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Token issuance
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn issue_token_carries_identity_only() -> anyhow::Result<()> {
        let h = setup();
        let (role, user) = h.role_with_user("Support", &[users::VIEW, roles::EDIT]).await;

        let (issued, summary) = h.issuer.issue_token(" Support@Example.com ", PASSWORD).await?;

        assert_eq!(issued.issued_at, issued_at());
        assert_eq!(issued.expires_at, issued_at() + chrono::Duration::minutes(60));
        assert_eq!(summary.user_id, user.id);
        assert_eq!(summary.role_id, role.id);
        assert_eq!(summary.role_name, "Support");
        assert_eq!(summary.permissions, role.permission_names());
        assert!(summary.is_verified);

        let claims = Hs256Signer::new(&token_settings())?
            .verify(&issued.token, issued_at() + chrono::Duration::minutes(1))?;
        assert_eq!(claims.uid, user.id);
        assert_eq!(claims.sub, user.username);
        assert_eq!(claims.role_id, role.id);
        assert_eq!(claims.full_name, user.full_name);
        assert_eq!(claims.jti, issued.token_id.to_string());
        assert_eq!(claims.nbf, claims.iat);
        assert_eq!(claims.exp - claims.iat, 3600);

        let raw = serde_json::to_value(&claims)?;
        let keys = raw.as_object().map(|o| o.len()).unwrap_or_default();
        assert_eq!(keys, 11);
        assert!(!raw.to_string().contains("Permissions."));
        Ok(())
    }

    #[tokio::test]
    async fn issue_token_failures_are_typed() {
        let h = setup();
        let (_, user) = h.role_with_user("Support", &[users::VIEW]).await;

        let err = h.issuer.issue_token("nobody@x.com", "pw").await.unwrap_err();
        assert_eq!(err, DomainError::Authentication(AuthFailure::NoAccount));

        let err = h.issuer.issue_token(&user.email, "wrong-password").await.unwrap_err();
        assert_eq!(err, DomainError::Authentication(AuthFailure::InvalidCredentials));

        h.directory.disable_user(user.id).await.unwrap();
        let err = h.issuer.issue_token(&user.email, PASSWORD).await.unwrap_err();
        assert_eq!(err, DomainError::Authentication(AuthFailure::InactiveAccount));
        assert_eq!(err.public_message(), "not authorized");
    }

    #[tokio::test]
    async fn issue_token_at_the_end_of_time_fails_cleanly() {
        let h = setup();
        let (_, user) = h.role_with_user("Support", &[users::VIEW]).await;

        let issuer = TokenIssuer::new(
            h.users.clone(),
            h.roles.clone(),
            &token_settings(),
            Arc::new(FixedClock::new(DateTime::<Utc>::MAX_UTC)),
        )
        .unwrap();
        let err = issuer.issue_token(&user.email, PASSWORD).await.unwrap_err();
        assert_eq!(err.code(), "signing_error");
        assert_eq!(err.public_message(), "internal error");
    }

    #[tokio::test]
    async fn issuer_refuses_unusable_settings() {
        let h = setup();
        let clock = || Arc::new(FixedClock::new(issued_at()));

        let empty_key = TokenSettings::new("");
        assert!(TokenIssuer::new(h.users.clone(), h.roles.clone(), &empty_key, clock()).is_err());

        let deserialized: TokenSettings = serde_json::from_str(r#"{"key":""}"#).unwrap();
        let issuer = TokenIssuer::new(h.users.clone(), h.roles.clone(), &deserialized, clock());
        assert!(issuer.is_err());

        let mut forever = token_settings();
        forever.duration_minutes = i64::MAX;
        let signer = Arc::new(Hs256Signer::new(&token_settings()).unwrap());
        assert!(
            TokenIssuer::with_signer(h.users.clone(), h.roles.clone(), &forever, signer, clock())
                .is_err()
        );
    }

    /// User store that counts password checks.
    struct CountingUserStore {
        inner: Users,
        real_checks: AtomicUsize,
        dummy_checks: AtomicUsize,
    }

    #[async_trait]
    impl UserStore for CountingUserStore {
        async fn find_user_by_id(&self, user_id: UserId) -> Result<Option<User>, StoreError> {
            self.inner.find_user_by_id(user_id).await
        }

        async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            self.inner.find_user_by_email(email).await
        }

        async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
            self.inner.create_user(new_user).await
        }

        async fn update_user(&self, user: User) -> Result<User, StoreError> {
            self.inner.update_user(user).await
        }

        async fn verify_password(&self, user: &User, password: &str) -> Result<bool, StoreError> {
            self.real_checks.fetch_add(1, Ordering::SeqCst);
            self.inner.verify_password(user, password).await
        }

        async fn verify_dummy_password(&self, password: &str) -> Result<(), StoreError> {
            self.dummy_checks.fetch_add(1, Ordering::SeqCst);
            self.inner.verify_dummy_password(password).await
        }

        async fn count_users_by_role(&self, role_id: RoleId) -> Result<usize, StoreError> {
            self.inner.count_users_by_role(role_id).await
        }

        async fn list_users(&self) -> Result<Vec<User>, StoreError> {
            self.inner.list_users().await
        }
    }

    #[tokio::test]
    async fn unknown_email_costs_a_password_check() {
        let h = setup();
        let (_, user) = h.role_with_user("Support", &[users::VIEW]).await;

        let counting = Arc::new(CountingUserStore {
            inner: h.users.clone(),
            real_checks: AtomicUsize::new(0),
            dummy_checks: AtomicUsize::new(0),
        });
        let issuer = TokenIssuer::new(
            counting.clone(),
            h.roles.clone(),
            &token_settings(),
            Arc::new(FixedClock::new(issued_at())),
        )
        .unwrap();

        let err = issuer.issue_token("nobody@example.com", PASSWORD).await.unwrap_err();
        assert_eq!(err, DomainError::Authentication(AuthFailure::NoAccount));
        assert_eq!(counting.dummy_checks.load(Ordering::SeqCst), 1);
        assert_eq!(counting.real_checks.load(Ordering::SeqCst), 0);

        let err = issuer.issue_token(&user.email, "wrong-password").await.unwrap_err();
        assert_eq!(err, DomainError::Authentication(AuthFailure::InvalidCredentials));
        assert_eq!(counting.dummy_checks.load(Ordering::SeqCst), 1);
        assert_eq!(counting.real_checks.load(Ordering::SeqCst), 1);
    }

    // ─────────────────────────────────────────────────────────────────────
    // User directory
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn directory_validates_and_guards_users() {
        let h = setup();
        let (role, user) = h.role_with_user("Support", &[users::VIEW]).await;

        let err = h
            .directory
            .create_user(new_user("SUPPORT@example.com", role.id))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let err = h
            .directory
            .create_user(new_user("new@example.com", RoleId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let err = h
            .directory
            .create_user(new_user("not-an-email", role.id))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = h.directory.enable_user(user.id).await.unwrap_err();
        assert!(matches!(err, DomainError::State(_)));

        assert_eq!(h.directory.get_user(user.id).await.unwrap(), user);
        let err = h.directory.get_user(UserId::new(404)).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let found = h.directory.find_by_email("  SUPPORT@Example.com").await.unwrap();
        assert_eq!(found, Some(user.clone()));
        assert_eq!(h.directory.find_by_email("nobody@example.com").await.unwrap(), None);

        let err = h.directory.change_role(user.id, RoleId::new()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
        let err = h.directory.change_role(UserId::new(404), role.id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn changing_role_applies_on_next_decision() {
        let h = setup();
        let (_, user) = h.role_with_user("Support", &[users::VIEW]).await;
        let admin = h
            .binder
            .create_role(create_role("Admin", Catalog::global().all_permissions()))
            .await
            .unwrap();

        assert_eq!(h.decide(&user, &roles::DELETE).await, Decision::Deny);
        let moved = h.directory.change_role(user.id, admin.id).await.unwrap();
        assert_eq!(moved.role_id, admin.id);
        assert_eq!(h.decide(&user, &roles::DELETE).await, Decision::Allow);
    }

    #[tokio::test]
    async fn update_user_renames_and_moves() {
        let h = setup();
        let (support, user) = h.role_with_user("Support", &[users::VIEW]).await;
        let admin = h
            .binder
            .create_role(create_role("Admin", &[users::VIEW, roles::DELETE]))
            .await
            .unwrap();

        let details = h
            .directory
            .update_user(UpdateUser {
                user_id: user.id,
                full_name: "  Jane Roe ".into(),
                role_id: admin.id,
            })
            .await
            .unwrap();
        assert_eq!(details.user.full_name, "Jane Roe");
        assert_eq!(details.user.role_id, admin.id);
        assert_eq!(details.role, admin);
        assert_eq!(h.decide(&user, &roles::DELETE).await, Decision::Allow);

        let err = h
            .directory
            .update_user(UpdateUser {
                user_id: UserId::new(404),
                full_name: "Jane Roe".into(),
                role_id: RoleId::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(ref m) if m.starts_with("user")));

        let err = h
            .directory
            .update_user(UpdateUser {
                user_id: user.id,
                full_name: "Jane Roe".into(),
                role_id: RoleId::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(ref m) if m.starts_with("role")));

        let err = h
            .directory
            .update_user(UpdateUser {
                user_id: user.id,
                full_name: "J".into(),
                role_id: support.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let stored = h.directory.get_user(user.id).await.unwrap();
        assert_eq!((stored.full_name.as_str(), stored.role_id), ("Jane Roe", admin.id));
    }

    #[tokio::test]
    async fn list_users_joins_roles_and_pages() {
        let h = setup();
        let support = h.binder.create_role(create_role("Support", &[users::VIEW])).await.unwrap();
        let admin = h.binder.create_role(create_role("Admin", &[roles::VIEW])).await.unwrap();

        for (email, full_name, role_id) in [
            ("carol@example.com", "Carol Jones", support.id),
            ("alice@example.com", "Alice Smith", admin.id),
            ("bob@example.com", "Bob Smith", support.id),
        ] {
            h.directory
                .create_user(NewUser {
                    full_name: full_name.to_string(),
                    ..new_user(email, role_id)
                })
                .await
                .unwrap();
        }
        let bob = h.directory.find_by_email("bob@example.com").await.unwrap().unwrap();
        h.directory.disable_user(bob.id).await.unwrap();
        // Left out of the listing: its role does not exist.
        h.users
            .create_user(new_user("orphan@example.com", RoleId::new()))
            .await
            .unwrap();

        let page = h.directory.list_users(UserQuery::default()).await.unwrap();
        let found: Vec<(&str, &str)> = page
            .items
            .iter()
            .map(|u| (u.full_name.as_str(), u.role_name.as_str()))
            .collect();
        assert_eq!(
            found,
            [
                ("Alice Smith", "Admin"),
                ("Bob Smith", "Support"),
                ("Carol Jones", "Support")
            ]
        );
        assert_eq!(page.total, 3);

        let page = h
            .directory
            .list_users(UserQuery {
                filter: Some("smith".into()),
                order_by: UserOrder::Role,
                direction: SortDirection::Desc,
                ..UserQuery::default()
            })
            .await
            .unwrap();
        let found: Vec<&str> = page.items.iter().map(|u| u.full_name.as_str()).collect();
        assert_eq!(found, ["Bob Smith", "Alice Smith"]);

        let page = h
            .directory
            .list_users(UserQuery {
                order_by: UserOrder::Active,
                page: 1,
                page_size: 1,
                ..UserQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, bob.id);
        assert!(!page.items[0].active);
        assert_eq!(page.total, 3);
    }
}
