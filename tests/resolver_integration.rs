//! Integration tests for the deployment resolver using wiremock
//!
//! A mock Cloud Controller serves the v2 resources the resolver walks, so
//! these tests pin down request order, short-circuiting and error reporting.

use boshdash::cf::auth::CfCredentials;
use boshdash::cf::{
    CfClient, ClientCredentials, DeploymentInfo, DeploymentResolver, ResolveError,
    ResolverOptions, SpaceSource,
};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{
    basic_auth, bearer_token, body_string_contains, method, path, path_regex,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEPLOYMENT: &str = "service-instance_abc-123";
const BINDINGS_PATH: &str = "/v2/service_instances/abc-123/service_bindings";

fn resolver(
    server: &MockServer,
    space_source: SpaceSource,
    concurrency: usize,
) -> DeploymentResolver {
    let client = CfClient::new(&server.uri(), None).expect("client");
    DeploymentResolver::new(
        client,
        ResolverOptions {
            space_source,
            app_lookup_concurrency: concurrency,
            ..Default::default()
        },
    )
    .expect("resolver")
}

fn entity(fields: Value) -> Value {
    json!({ "metadata": {}, "entity": fields })
}

fn bindings(app_guids: &[&str]) -> Value {
    json!({
        "total_results": app_guids.len(),
        "resources": app_guids
            .iter()
            .map(|guid| entity(json!({ "app_guid": guid })))
            .collect::<Vec<_>>()
    })
}

async fn mount_json(server: &MockServer, at: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_space_and_org(server: &MockServer) {
    mount_json(
        server,
        "/v2/spaces/space-9",
        entity(json!({ "name": "prod", "organization_guid": "org-7" })),
    )
    .await;
    mount_json(server, "/v2/organizations/org-7", entity(json!({ "name": "acme" }))).await;
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}

mod traversal_tests {
    use super::*;

    /// Single bound app resolves the whole chain
    #[tokio::test]
    async fn test_resolves_app_space_and_org() {
        let server = MockServer::start().await;

        mount_json(&server, BINDINGS_PATH, bindings(&["app-1"])).await;
        mount_json(
            &server,
            "/v2/apps/app-1",
            entity(json!({ "name": "billing-app", "space_guid": "space-9" })),
        )
        .await;
        mount_space_and_org(&server).await;

        let info = resolver(&server, SpaceSource::BoundApps, 4)
            .resolve(DEPLOYMENT)
            .await
            .expect("resolution should succeed");

        assert_eq!(
            info,
            DeploymentInfo {
                app_names: vec!["billing-app".to_string()],
                space_name: "prod".to_string(),
                org_name: "acme".to_string(),
            }
        );
        assert_eq!(request_count(&server).await, 4);
    }

    /// Names outside the convention are silently skipped
    #[tokio::test]
    async fn test_non_matching_name_makes_no_requests() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let info = resolver(&server, SpaceSource::BoundApps, 4)
            .resolve("cf-warden-diego")
            .await
            .expect("non-matching names are not errors");

        assert_eq!(info, DeploymentInfo::default());
        assert_eq!(request_count(&server).await, 0);
    }

    /// Results keep binding order even when later apps answer first
    #[tokio::test]
    async fn test_app_order_follows_bindings_not_completion() {
        let server = MockServer::start().await;

        mount_json(&server, BINDINGS_PATH, bindings(&["app-1", "app-2", "app-3"])).await;

        let apps = [
            ("app-1", "first", 400),
            ("app-2", "second", 0),
            ("app-3", "third", 150),
        ];
        for (guid, name, delay_ms) in apps {
            Mock::given(method("GET"))
                .and(path(format!("/v2/apps/{guid}")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(entity(json!({ "name": name, "space_guid": "space-9" })))
                        .set_delay(Duration::from_millis(delay_ms)),
                )
                .expect(1)
                .mount(&server)
                .await;
        }
        mount_space_and_org(&server).await;

        let info = resolver(&server, SpaceSource::BoundApps, 3)
            .resolve(DEPLOYMENT)
            .await
            .expect("resolution should succeed");

        assert_eq!(info.app_names, vec!["first", "second", "third"]);
        assert_eq!(info.space_name, "prod");
        assert_eq!(info.org_name, "acme");
    }

    /// The space comes from the last bound app
    #[tokio::test]
    async fn test_space_taken_from_last_app() {
        let server = MockServer::start().await;

        mount_json(&server, BINDINGS_PATH, bindings(&["app-1", "app-2"])).await;
        mount_json(
            &server,
            "/v2/apps/app-1",
            entity(json!({ "name": "a", "space_guid": "space-other" })),
        )
        .await;
        mount_json(
            &server,
            "/v2/apps/app-2",
            entity(json!({ "name": "b", "space_guid": "space-9" })),
        )
        .await;
        mount_space_and_org(&server).await;

        let info = resolver(&server, SpaceSource::BoundApps, 1)
            .resolve(DEPLOYMENT)
            .await
            .expect("resolution should succeed");

        assert_eq!(info.app_names, vec!["a", "b"]);
        assert_eq!(info.space_name, "prod");
    }

    /// Bound-apps mode cannot reach a space without an app
    #[tokio::test]
    async fn test_zero_bindings_from_bound_apps_is_empty() {
        let server = MockServer::start().await;

        mount_json(&server, BINDINGS_PATH, bindings(&[])).await;

        let info = resolver(&server, SpaceSource::BoundApps, 4)
            .resolve(DEPLOYMENT)
            .await
            .expect("resolution should succeed");

        assert!(info.app_names.is_empty());
        assert_eq!(info.space_name, "");
        assert_eq!(info.org_name, "");
        assert_eq!(request_count(&server).await, 1);
    }

    /// Service-instance mode resolves space and org without bindings
    #[tokio::test]
    async fn test_zero_bindings_from_service_instance_keeps_space_and_org() {
        let server = MockServer::start().await;

        mount_json(
            &server,
            "/v2/service_instances/abc-123",
            entity(json!({ "name": "orders-db", "space_guid": "space-9" })),
        )
        .await;
        mount_json(&server, BINDINGS_PATH, bindings(&[])).await;
        mount_space_and_org(&server).await;

        let info = resolver(&server, SpaceSource::ServiceInstance, 4)
            .resolve(DEPLOYMENT)
            .await
            .expect("resolution should succeed");

        assert!(info.app_names.is_empty());
        assert_eq!(info.space_name, "prod");
        assert_eq!(info.org_name, "acme");
    }

    /// Service-instance mode ignores the apps' space references
    #[tokio::test]
    async fn test_service_instance_space_wins_over_app_space() {
        let server = MockServer::start().await;

        mount_json(
            &server,
            "/v2/service_instances/abc-123",
            entity(json!({ "space_guid": "space-9" })),
        )
        .await;
        mount_json(&server, BINDINGS_PATH, bindings(&["app-1"])).await;
        mount_json(
            &server,
            "/v2/apps/app-1",
            entity(json!({ "name": "billing-app", "space_guid": "space-elsewhere" })),
        )
        .await;
        mount_space_and_org(&server).await;

        let info = resolver(&server, SpaceSource::ServiceInstance, 4)
            .resolve(DEPLOYMENT)
            .await
            .expect("resolution should succeed");

        assert_eq!(info.app_names, vec!["billing-app"]);
        assert_eq!(info.space_name, "prod");
    }

    /// An app without a space reference stops the walk after the apps
    #[tokio::test]
    async fn test_empty_space_guid_keeps_app_names_only() {
        let server = MockServer::start().await;

        mount_json(&server, BINDINGS_PATH, bindings(&["app-1"])).await;
        mount_json(
            &server,
            "/v2/apps/app-1",
            entity(json!({ "name": "billing-app", "space_guid": "" })),
        )
        .await;
        Mock::given(method("GET"))
            .and(path_regex("^/v2/(spaces|organizations)/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let info = resolver(&server, SpaceSource::BoundApps, 4)
            .resolve(DEPLOYMENT)
            .await
            .expect("resolution should succeed");

        assert_eq!(info.app_names, vec!["billing-app"]);
        assert_eq!(info.space_name, "");
        assert_eq!(info.org_name, "");
        assert_eq!(request_count(&server).await, 2);
    }

    /// A space without an organization reference keeps the space name
    #[tokio::test]
    async fn test_empty_organization_guid_keeps_space_name() {
        let server = MockServer::start().await;

        mount_json(&server, BINDINGS_PATH, bindings(&["app-1"])).await;
        mount_json(
            &server,
            "/v2/apps/app-1",
            entity(json!({ "name": "billing-app", "space_guid": "space-9" })),
        )
        .await;
        mount_json(
            &server,
            "/v2/spaces/space-9",
            entity(json!({ "name": "prod", "organization_guid": "" })),
        )
        .await;
        Mock::given(method("GET"))
            .and(path_regex("^/v2/organizations/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let info = resolver(&server, SpaceSource::BoundApps, 4)
            .resolve(DEPLOYMENT)
            .await
            .expect("resolution should succeed");

        assert_eq!(info.app_names, vec!["billing-app"]);
        assert_eq!(info.space_name, "prod");
        assert_eq!(info.org_name, "");
        assert_eq!(request_count(&server).await, 3);
    }

    /// The resolver output survives a JSON round trip unchanged
    #[tokio::test]
    async fn test_resolved_info_json_round_trip() {
        let server = MockServer::start().await;

        mount_json(&server, BINDINGS_PATH, bindings(&["app-1"])).await;
        mount_json(
            &server,
            "/v2/apps/app-1",
            entity(json!({ "name": "billing-app", "space_guid": "space-9" })),
        )
        .await;
        mount_space_and_org(&server).await;

        let info = resolver(&server, SpaceSource::BoundApps, 4)
            .resolve(DEPLOYMENT)
            .await
            .expect("resolution should succeed");

        let encoded = serde_json::to_string(&info).unwrap();
        let decoded: DeploymentInfo = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, info);
    }
}

mod failure_tests {
    use super::*;

    /// A 404 on the root lookup stops the traversal and names the path
    #[tokio::test]
    async fn test_root_not_found_aborts() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(BINDINGS_PATH))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_string(r#"{"code":60004,"error_code":"CF-ServiceInstanceNotFound"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = resolver(&server, SpaceSource::BoundApps, 4)
            .resolve(DEPLOYMENT)
            .await
            .expect_err("404 must surface");

        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            format!(
                "invalid response [404 Not Found] for GET {}: {}",
                BINDINGS_PATH, r#"{"code":60004,"error_code":"CF-ServiceInstanceNotFound"}"#
            )
        );
        assert_eq!(request_count(&server).await, 1);
    }

    /// In service-instance mode the root is the instance itself
    #[tokio::test]
    async fn test_instance_not_found_aborts_before_bindings() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/service_instances/abc-123"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
            .expect(1)
            .mount(&server)
            .await;

        let err = resolver(&server, SpaceSource::ServiceInstance, 4)
            .resolve(DEPLOYMENT)
            .await
            .expect_err("404 must surface");

        assert_eq!(err.path(), Some("/v2/service_instances/abc-123"));
        assert_eq!(request_count(&server).await, 1);
    }

    /// A failing app lookup aborts before the space is fetched
    #[tokio::test]
    async fn test_app_server_error_aborts() {
        let server = MockServer::start().await;

        mount_json(&server, BINDINGS_PATH, bindings(&["app-1"])).await;
        Mock::given(method("GET"))
            .and(path("/v2/apps/app-1"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/spaces/space-9"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = resolver(&server, SpaceSource::BoundApps, 4)
            .resolve(DEPLOYMENT)
            .await
            .expect_err("503 must surface");

        assert!(matches!(err, ResolveError::Unavailable { .. }));
        assert_eq!(err.status().map(|s| s.as_u16()), Some(503));
        assert_eq!(
            err.to_string(),
            "invalid response [503 Service Unavailable] for GET /v2/apps/app-1: maintenance"
        );
    }

    /// Malformed JSON is a decode failure, never an empty result
    #[tokio::test]
    async fn test_malformed_space_is_decode_error() {
        let server = MockServer::start().await;

        mount_json(&server, BINDINGS_PATH, bindings(&["app-1"])).await;
        mount_json(
            &server,
            "/v2/apps/app-1",
            entity(json!({ "name": "billing-app", "space_guid": "space-9" })),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/v2/spaces/space-9"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let err = resolver(&server, SpaceSource::BoundApps, 4)
            .resolve(DEPLOYMENT)
            .await
            .expect_err("bad JSON must surface");

        assert!(matches!(err, ResolveError::Decode { .. }));
        assert_eq!(err.path(), Some("/v2/spaces/space-9"));
    }

    /// A binding without an app reference cannot be followed
    #[tokio::test]
    async fn test_binding_missing_app_guid_is_decode_error() {
        let server = MockServer::start().await;

        mount_json(
            &server,
            BINDINGS_PATH,
            json!({ "resources": [ entity(json!({ "app_url": "/v2/apps/app-1" })) ] }),
        )
        .await;

        let err = resolver(&server, SpaceSource::BoundApps, 4)
            .resolve(DEPLOYMENT)
            .await
            .expect_err("missing app_guid must surface");

        assert!(matches!(err, ResolveError::Decode { .. }));
        assert_eq!(request_count(&server).await, 1);
    }

    /// A 200 without a resources list is not "no bindings"
    #[tokio::test]
    async fn test_bindings_without_resources_is_decode_error() {
        let server = MockServer::start().await;

        mount_json(
            &server,
            BINDINGS_PATH,
            json!({ "code": 10001, "description": "Unknown request" }),
        )
        .await;

        let err = resolver(&server, SpaceSource::BoundApps, 4)
            .resolve(DEPLOYMENT)
            .await
            .expect_err("missing resources must surface");

        assert!(matches!(err, ResolveError::Decode { .. }));
        assert_eq!(err.path(), Some(BINDINGS_PATH));
        assert_eq!(request_count(&server).await, 1);
    }

    /// Connection refused is a transport failure
    #[tokio::test]
    async fn test_unreachable_api_is_transport_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let client = CfClient::new(&format!("http://127.0.0.1:{port}"), None).unwrap();
        let resolver = DeploymentResolver::new(client, ResolverOptions::default()).unwrap();

        let err = resolver.resolve(DEPLOYMENT).await.expect_err("nothing listens");
        assert!(matches!(err, ResolveError::Transport { .. }));
        assert_eq!(err.path(), Some(BINDINGS_PATH));
    }
}

mod auth_tests {
    use super::*;

    fn credentials(server: &MockServer) -> ClientCredentials {
        ClientCredentials {
            token_url: format!("{}/oauth/token", server.uri()),
            client_id: "health".to_string(),
            client_secret: "s3cret".to_string(),
        }
    }

    /// Tokens are requested once and reused across resolutions
    #[tokio::test]
    async fn test_bearer_token_fetched_once_and_cached() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(basic_auth("health", "s3cret"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "cc-token",
                "token_type": "bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(BINDINGS_PATH))
            .and(bearer_token("cc-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bindings(&[])))
            .expect(2)
            .mount(&server)
            .await;

        let client = CfClient::new(&server.uri(), Some(credentials(&server))).unwrap();
        let resolver = DeploymentResolver::new(client, ResolverOptions::default()).unwrap();

        assert!(resolver.resolve(DEPLOYMENT).await.unwrap().is_empty());
        assert!(resolver.resolve(DEPLOYMENT).await.unwrap().is_empty());
    }

    /// A rejected token request fails before touching the API
    #[tokio::test]
    async fn test_token_rejection_is_auth_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = CfClient::new(&server.uri(), Some(credentials(&server))).unwrap();
        let resolver = DeploymentResolver::new(client, ResolverOptions::default()).unwrap();

        let err = resolver.resolve(DEPLOYMENT).await.expect_err("401 from UAA");
        assert!(matches!(err, ResolveError::Auth { .. }));
        assert!(err.to_string().contains("401"));
    }

    /// Concurrent callers on a cold cache share one token request
    #[tokio::test]
    async fn test_concurrent_callers_share_one_token_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "access_token": "cc-token", "expires_in": 3600 }))
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let tokens = CfCredentials::new(reqwest::Client::new(), credentials(&server));
        let results = futures::future::join_all((0..5).map(|_| tokens.get_token())).await;

        for token in results {
            assert_eq!(token.unwrap(), "cc-token");
        }
    }
}
