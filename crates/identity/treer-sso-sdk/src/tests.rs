//! Integration tests for the SSO client.

#[cfg(test)]
mod integration_tests {
    use crate::{
        HttpTransport, RequestOptions, SsoApi, SsoConfig, SsoError, SsoSettings, TransportError,
        TransportResponse, TransportResult, TreerSsoClient, UserInfo, get_user_info_by_code,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Request seen by the mock transport
    #[derive(Debug, Clone)]
    struct RecordedRequest {
        method: &'static str,
        url: String,
        options: RequestOptions,
    }

    /// Transport double replaying canned responses in order
    #[derive(Default)]
    struct MockTransport {
        responses: Mutex<VecDeque<TransportResult<TransportResponse>>>,
        requests: Mutex<Vec<RecordedRequest>>,
        close_calls: Mutex<usize>,
    }

    impl MockTransport {
        fn new() -> Self {
            Self::default()
        }

        fn respond(self, response: TransportResponse) -> Self {
            self.responses.lock().unwrap().push_back(Ok(response));
            self
        }

        fn fail(self, error: TransportError) -> Self {
            self.responses.lock().unwrap().push_back(Err(error));
            self
        }

        fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn close_calls(&self) -> usize {
            *self.close_calls.lock().unwrap()
        }

        fn next(
            &self,
            method: &'static str,
            url: &str,
            options: RequestOptions,
        ) -> TransportResult<TransportResponse> {
            self.requests.lock().unwrap().push(RecordedRequest {
                method,
                url: url.to_string(),
                options,
            });
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::unavailable("no canned response left")))
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn get(
            &self,
            url: &str,
            options: RequestOptions,
        ) -> TransportResult<TransportResponse> {
            self.next("GET", url, options)
        }

        async fn post(
            &self,
            url: &str,
            options: RequestOptions,
        ) -> TransportResult<TransportResponse> {
            self.next("POST", url, options)
        }

        async fn close(&self) {
            *self.close_calls.lock().unwrap() += 1;
        }
    }

    fn test_config(base_url: &str) -> SsoConfig {
        SsoSettings::builder()
            .client_id("mock_client_id")
            .client_secret("mock_secret")
            .base_url(base_url)
            .timeout(5)
            .build()
            .validate()
            .unwrap()
    }

    fn mock_client(transport: MockTransport) -> (TreerSsoClient, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        let client =
            TreerSsoClient::with_transport(test_config("https://sso.test/"), transport.clone());
        (client, transport)
    }

    /// Base URL of a local port nothing listens on
    fn closed_address() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    async fn setup_mock_sso_server() -> (MockServer, TreerSsoClient) {
        let mock_server = MockServer::start().await;
        let client = TreerSsoClient::new(test_config(&mock_server.uri()));
        (mock_server, client)
    }

    #[tokio::test]
    async fn test_token_exchange_success() {
        let (mock_server, client) = setup_mock_sso_server().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/oauth/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=auth123"))
            .and(body_string_contains("client_id=mock_client_id"))
            .and(body_string_contains("client_secret=mock_secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok123",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let token = client.get_access_token("auth123", None).await.unwrap();
        assert_eq!(token.access_token, "tok123");
        assert_eq!(token.expires_in, Some(3600));
        assert_eq!(token.authorization_header(), "Bearer tok123");
    }

    #[tokio::test]
    async fn test_token_exchange_invalid_code_400() {
        let (mock_server, client) = setup_mock_sso_server().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "invalid_code",
                "message": "bad code"
            })))
            .mount(&mock_server)
            .await;

        let err = client.get_access_token("bad", None).await.unwrap_err();
        assert!(matches!(err, SsoError::InvalidCode(_)));
        assert!(err.is_authentication());
        assert_eq!(err.code(), Some("invalid_code"));
        assert_eq!(err.message(), "bad code");
    }

    #[tokio::test]
    async fn test_token_exchange_400_without_json_uses_defaults() {
        let (mock_server, client) = setup_mock_sso_server().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Bad Request"))
            .mount(&mock_server)
            .await;

        let err = client.get_access_token("bad", None).await.unwrap_err();
        assert!(matches!(err, SsoError::InvalidCode(_)));
        assert_eq!(err.code(), Some("invalid_code"));
        assert_eq!(err.message(), "invalid authorization code");
    }

    #[tokio::test]
    async fn test_user_info_success() {
        let (mock_server, client) = setup_mock_sso_server().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/users/me"))
            .and(header("Authorization", "Bearer tok123"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "u1", "username": "alice"})),
            )
            .mount(&mock_server)
            .await;

        let user = client.get_user_info("tok123").await.unwrap();
        assert_eq!(user, UserInfo::new("u1", "alice"));
        assert!(user.profile.is_none());
        assert!(user.is_active);
    }

    #[tokio::test]
    async fn test_user_info_invalid_token_401() {
        let (mock_server, client) = setup_mock_sso_server().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/users/me"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({})))
            .mount(&mock_server)
            .await;

        let err = client.get_user_info("expired").await.unwrap_err();
        assert!(matches!(err, SsoError::InvalidToken(_)));
        assert!(err.is_authentication());
        assert_eq!(err.message(), "access token is invalid or expired");
        assert_eq!(err.code(), Some("invalid_token"));
    }

    #[tokio::test]
    async fn test_full_flow() {
        let (mock_server, client) = setup_mock_sso_server().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/oauth/token"))
            .and(body_string_contains("redirect_uri=https%3A%2F%2Fapp.example.com%2Fcallback"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok123",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v1/users/me"))
            .and(header("Authorization", "Bearer tok123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "code": "ok",
                "data": {
                    "id": "u1",
                    "username": "alice",
                    "email": "alice@example.com",
                    "profile": {"first_name": "Alice", "last_name": "Liddell"},
                    "created_at": "2024-01-15T10:30:00Z"
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let user = client
            .scoped(|client| {
                client.get_user_info_by_code("auth123", Some("https://app.example.com/callback"))
            })
            .await
            .unwrap();

        assert_eq!(user.id, "u1");
        assert_eq!(user.email.as_deref(), Some("alice@example.com"));
        assert_eq!(user.profile.unwrap().full_name(), "Alice Liddell");
        assert!(user.created_at.is_some());
    }

    #[tokio::test]
    async fn test_convenience_function() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/oauth/token"))
            .and(body_string_contains("client_id=conv_client"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-conv"})),
            )
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v1/users/me"))
            .and(header("Authorization", "Bearer tok-conv"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 7, "username": "bob"})),
            )
            .mount(&mock_server)
            .await;

        let base_url = format!("{}/", mock_server.uri());
        let user = get_user_info_by_code(
            "auth123",
            "conv_client",
            "conv_secret",
            Some(&base_url),
            None,
            Some(10),
        )
        .await
        .unwrap();

        assert_eq!(user.id, "7");
        assert_eq!(user.username, "bob");
    }

    #[tokio::test]
    async fn test_convenience_function_rejects_bad_config() {
        let result = get_user_info_by_code("code", "", "secret", None, None, None).await;
        assert!(matches!(result, Err(SsoError::Config(_))));

        let result =
            get_user_info_by_code("code", "id", "secret", Some("localhost"), None, None).await;
        assert!(matches!(result, Err(SsoError::Config(_))));

        let result = get_user_info_by_code("code", "id", "secret", None, None, Some(0)).await;
        assert!(matches!(result, Err(SsoError::Config(_))));
    }

    #[tokio::test]
    async fn test_malformed_token_body() {
        let (mock_server, client) = setup_mock_sso_server().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let err = client.get_access_token("code", None).await.unwrap_err();
        assert!(matches!(err, SsoError::Decode { .. }));
        assert!(!err.is_authentication());
    }

    #[tokio::test]
    async fn test_network_failure() {
        let client = TreerSsoClient::new(test_config(&closed_address()));

        let err = client.get_access_token("code", None).await.unwrap_err();
        assert!(matches!(err, SsoError::Network { .. }));

        let err = client.get_user_info("token").await.unwrap_err();
        assert!(matches!(err, SsoError::Network { .. }));
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/users/me"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(std::time::Duration::from_secs(3))
                    .set_body_json(json!({"id": "u1", "username": "alice"})),
            )
            .mount(&mock_server)
            .await;

        let config = SsoSettings::builder()
            .client_id("id")
            .client_secret("secret")
            .base_url(mock_server.uri())
            .timeout(1)
            .build()
            .validate()
            .unwrap();
        let client = TreerSsoClient::new(config);

        let err = client.get_user_info("tok").await.unwrap_err();
        assert!(matches!(err, SsoError::Network { .. }));
    }

    #[tokio::test]
    async fn test_mock_transport_full_flow() {
        let (client, transport) = mock_client(
            MockTransport::new()
                .respond(TransportResponse::json_body(
                    200,
                    &json!({"access_token": "tok123", "token_type": "Bearer", "expires_in": 3600}),
                ))
                .respond(TransportResponse::json_body(
                    200,
                    &json!({"id": "u1", "username": "alice"}),
                )),
        );

        let user = client.get_user_info_by_code("auth123", None).await.unwrap();
        assert_eq!(user, UserInfo::new("u1", "alice"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);

        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].url, "https://sso.test/api/v1/oauth/token");
        assert_eq!(
            requests[0].options.form_value("grant_type"),
            Some("authorization_code")
        );
        assert_eq!(requests[0].options.form_value("code"), Some("auth123"));
        assert_eq!(requests[0].options.form_value("redirect_uri"), None);

        assert_eq!(requests[1].method, "GET");
        assert_eq!(requests[1].url, "https://sso.test/api/v1/users/me");
        assert_eq!(
            requests[1].options.header_value("Authorization"),
            Some("Bearer tok123")
        );
    }

    #[tokio::test]
    async fn test_empty_redirect_uri_is_not_sent() {
        let (client, transport) = mock_client(MockTransport::new().respond(
            TransportResponse::json_body(200, &json!({"access_token": "tok"})),
        ));

        client.get_access_token("code", Some("")).await.unwrap();
        assert_eq!(transport.requests()[0].options.form_value("redirect_uri"), None);
    }

    #[tokio::test]
    async fn test_token_envelope_rejections() {
        let cases = [
            ("oauth.invalid_code", true),
            ("oauth.authorization_failed", true),
            ("oauth.client_disabled", false),
        ];

        for (code, is_invalid_code) in cases {
            let (client, _) = mock_client(MockTransport::new().respond(
                TransportResponse::json_body(
                    200,
                    &json!({
                        "success": false,
                        "code": code,
                        "message": "rejected",
                        "details": {"reason": code}
                    }),
                ),
            ));

            let err = client.get_access_token("code", None).await.unwrap_err();
            assert_eq!(matches!(err, SsoError::InvalidCode(_)), is_invalid_code, "{}", code);
            assert!(err.is_authentication());
            assert_eq!(err.code(), Some(code));
            assert_eq!(err.message(), "rejected");
            assert_eq!(err.details(), Some(&json!({"reason": code})));
        }
    }

    #[tokio::test]
    async fn test_token_envelope_without_code_defaults_to_unknown() {
        let (client, _) = mock_client(
            MockTransport::new().respond(TransportResponse::json_body(200, &json!({"success": false}))),
        );

        let err = client.get_access_token("code", None).await.unwrap_err();
        assert!(matches!(err, SsoError::Authentication(_)));
        assert_eq!(err.code(), Some("unknown"));
        assert_eq!(err.message(), "failed to obtain access token");
    }

    #[tokio::test]
    async fn test_token_envelope_with_null_success_is_rejection() {
        let (client, _) = mock_client(MockTransport::new().respond(TransportResponse::json_body(
            200,
            &json!({"success": null, "code": "oauth.invalid_code", "message": "expired"}),
        )));

        let err = client.get_access_token("code", None).await.unwrap_err();
        assert!(matches!(err, SsoError::InvalidCode(_)));
        assert_eq!(err.message(), "expired");
    }

    #[tokio::test]
    async fn test_token_with_loose_optional_fields_is_accepted() {
        let (client, _) = mock_client(MockTransport::new().respond(TransportResponse::json_body(
            200,
            &json!({"access_token": "tok", "token_type": null, "expires_in": "3600"}),
        )));

        let token = client.get_access_token("code", None).await.unwrap();
        assert_eq!(token.access_token, "tok");
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, Some(3600));
    }

    #[tokio::test]
    async fn test_token_missing_access_token() {
        let (client, _) = mock_client(
            MockTransport::new().respond(TransportResponse::json_body(200, &json!({"success": true}))),
        );

        let err = client.get_access_token("code", None).await.unwrap_err();
        assert!(matches!(err, SsoError::Sso(_)));
        assert_eq!(err.message(), "malformed response: missing access_token");
    }

    #[tokio::test]
    async fn test_token_other_status() {
        let (client, _) = mock_client(
            MockTransport::new().respond(TransportResponse::new(503, Some("text/plain"), "down")),
        );

        let err = client.get_access_token("code", None).await.unwrap_err();
        assert!(matches!(err, SsoError::Authentication(_)));
        assert_eq!(err.code(), Some("http_503"));
        assert!(err.message().contains("503"));
    }

    #[tokio::test]
    async fn test_user_info_business_error() {
        let (client, _) = mock_client(MockTransport::new().respond(
            TransportResponse::json_body(
                200,
                &json!({"success": false, "code": "user.disabled", "message": "user is disabled"}),
            ),
        ));

        let err = client.get_user_info("tok").await.unwrap_err();
        assert!(matches!(err, SsoError::Sso(_)));
        assert!(!err.is_authentication());
        assert_eq!(err.code(), Some("user.disabled"));
        assert_eq!(err.message(), "user is disabled");
    }

    #[tokio::test]
    async fn test_user_info_other_status() {
        let (client, _) = mock_client(
            MockTransport::new().respond(TransportResponse::json_body(500, &json!({"message": "boom"}))),
        );

        let err = client.get_user_info("tok").await.unwrap_err();
        assert!(matches!(err, SsoError::Sso(_)));
        assert_eq!(err.code(), Some("http_500"));
    }

    #[tokio::test]
    async fn test_user_info_401_with_server_message() {
        let (client, _) = mock_client(MockTransport::new().respond(TransportResponse::json_body(
            401,
            &json!({"code": "token.expired", "message": "token expired", "details": {"exp": 1}}),
        )));

        let err = client.get_user_info("tok").await.unwrap_err();
        assert!(matches!(err, SsoError::InvalidToken(_)));
        assert_eq!(err.code(), Some("token.expired"));
        assert_eq!(err.message(), "token expired");
        assert_eq!(err.details(), Some(&json!({"exp": 1})));
    }

    #[tokio::test]
    async fn test_user_info_invalid_payloads() {
        for body in [json!({"data": null}), json!({"username": "no-id"})] {
            let (client, _) =
                mock_client(MockTransport::new().respond(TransportResponse::json_body(200, &body)));

            let err = client.get_user_info("tok").await.unwrap_err();
            assert!(matches!(err, SsoError::Sso(_)), "{}", body);
            assert_eq!(err.code(), Some("invalid_payload"));
        }
    }

    #[tokio::test]
    async fn test_transport_errors_are_network_errors() {
        let (client, _) = mock_client(
            MockTransport::new().fail(TransportError::unavailable("connection reset")),
        );

        let err = client.get_user_info("tok").await.unwrap_err();
        assert!(matches!(err, SsoError::Network { .. }));
        assert!(err.message().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_first_step_error_stops_flow() {
        let (client, transport) = mock_client(MockTransport::new().respond(
            TransportResponse::json_body(400, &json!({"message": "code already used"})),
        ));

        let err = client.get_user_info_by_code("used", None).await.unwrap_err();
        assert!(matches!(err, SsoError::InvalidCode(_)));
        assert_eq!(err.message(), "code already used");
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_scoped_closes_on_success_and_error() {
        let (client, transport) = mock_client(
            MockTransport::new()
                .respond(TransportResponse::json_body(200, &json!({"access_token": "tok"})))
                .respond(TransportResponse::json_body(401, &json!({}))),
        );

        let result = client
            .scoped(|client| client.get_user_info_by_code("code", None))
            .await;
        assert!(matches!(result, Err(SsoError::InvalidToken(_))));
        assert_eq!(transport.close_calls(), 1);

        client.close().await;
        client.close().await;
        assert_eq!(transport.close_calls(), 3);
    }

    #[test]
    fn test_client_keeps_config() {
        let (client, _) = mock_client(MockTransport::new());
        assert_eq!(client.config().base_url(), "https://sso.test");
        assert_eq!(client.config().client_id(), "mock_client_id");

        tokio_test::block_on(client.close());
    }
}
