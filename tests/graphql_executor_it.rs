#![cfg(feature = "test")]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use jobber_graphql::{
	_preludet::*,
	config::ClientConfig,
	error::ErrorKind,
	graphql::{GraphQlExecutor, GraphQlRequest},
	http::ReqwestHttpClient,
};

const ACCESS_TOKEN: &str = "access-executor";
const GRAPHQL_PATH: &str = "/api/graphql";

fn build_executor(config: &ClientConfig) -> GraphQlExecutor {
	let http = ReqwestHttpClient::with_timeout(config.request_timeout)
		.expect("HTTP client should build for executor tests.");

	GraphQlExecutor::new(http, config, ACCESS_TOKEN)
}

#[tokio::test]
async fn execute_sends_headers_and_returns_data() {
	let server = MockServer::start_async().await;
	let config = mock_config(&server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(GRAPHQL_PATH)
				.header("authorization", format!("Bearer {ACCESS_TOKEN}"))
				.header("content-type", "application/json")
				.header("x-jobber-graphql-version", ClientConfig::DEFAULT_API_VERSION)
				.json_body(json!({
					"query": "query Clients($first: Int) { clients(first: $first) { nodes { id } } }",
					"variables": { "first": 5 },
					"operationName": "Clients"
				}));
			then.status(200).header("content-type", "application/json").json_body(json!({
				"data": { "clients": { "nodes": [{ "id": "c1" }] } },
				"extensions": { "cost": { "throttleStatus": {
					"currentlyAvailable": 9000, "maximumAvailable": 10000, "restoreRate": 500
				} } }
			}));
		})
		.await;
	let executor = build_executor(&config);
	let request = GraphQlRequest::new(
		"query Clients($first: Int) { clients(first: $first) { nodes { id } } }",
	)
	.with_variables(json!({ "first": 5 }))
	.with_operation_name("Clients");
	let data = executor.execute(&request).await.expect("Healthy response should succeed.");

	mock.assert_async().await;

	assert_eq!(data, json!({ "clients": { "nodes": [{ "id": "c1" }] } }));

	let throttle = executor.throttle_status().expect("Throttle snapshot should be recorded.");

	assert_eq!(throttle.currently_available, 9000);
	assert_eq!(throttle.maximum_available, 10000);
	assert_eq!(throttle.restore_rate, 500);
}

#[tokio::test]
async fn execute_maps_401_to_authentication() {
	let server = MockServer::start_async().await;
	let config = mock_config(&server.base_url());

	server
		.mock_async(|when, then| {
			when.method(POST).path(GRAPHQL_PATH);
			then.status(401).body("unauthorized");
		})
		.await;

	let err = build_executor(&config)
		.execute(&GraphQlRequest::new("{ account { id } }"))
		.await
		.expect_err("401 should fail.");

	assert_eq!(err.kind(), ErrorKind::Authentication);
	assert!(err.is_retryable_with_refresh());
	assert_eq!(err.context().get("status_code"), Some(&json!(401)));
}

#[tokio::test]
async fn execute_maps_server_errors_to_network() {
	let server = MockServer::start_async().await;
	let config = mock_config(&server.base_url());

	server
		.mock_async(|when, then| {
			when.method(POST).path(GRAPHQL_PATH);
			then.status(500).body("Internal Server Error");
		})
		.await;

	let err = build_executor(&config)
		.execute(&GraphQlRequest::new("{ account { id } }"))
		.await
		.expect_err("500 should fail.");

	assert_eq!(err.kind(), ErrorKind::Network);
	assert!(err.to_string().contains("HTTP 500: Internal Server Error"));

	let context = err.context();

	assert_eq!(context.get("status_code"), Some(&json!(500)));
	assert_eq!(context.get("response"), Some(&json!("Internal Server Error")));
}

#[tokio::test]
async fn execute_reports_timeouts() {
	let server = MockServer::start_async().await;
	let config = mock_config_builder(&server.base_url())
		.request_timeout(Duration::from_secs(1))
		.build()
		.expect("Config with short timeout should build.");

	server
		.mock_async(|when, then| {
			when.method(POST).path(GRAPHQL_PATH);
			then.status(200).delay(Duration::from_secs(3)).json_body(json!({ "data": {} }));
		})
		.await;

	let err = build_executor(&config)
		.execute(&GraphQlRequest::new("{ account { id } }"))
		.await
		.expect_err("Slow response should time out.");

	assert_eq!(err.kind(), ErrorKind::Network);
	assert_eq!(err.to_string(), "Request timeout after 1 seconds");
}

#[tokio::test]
async fn execute_rejects_non_json_body() {
	let server = MockServer::start_async().await;
	let config = mock_config(&server.base_url());

	server
		.mock_async(|when, then| {
			when.method(POST).path(GRAPHQL_PATH);
			then.status(200).body("<html>maintenance</html>");
		})
		.await;

	let err = build_executor(&config)
		.execute(&GraphQlRequest::new("{ account { id } }"))
		.await
		.expect_err("HTML should be rejected.");

	assert_eq!(err.kind(), ErrorKind::Network);
	assert!(err.to_string().starts_with("Invalid JSON response"));
}

#[tokio::test]
async fn execute_trips_rate_limit_with_wait_estimate() {
	let server = MockServer::start_async().await;
	let config = mock_config(&server.base_url());

	server
		.mock_async(|when, then| {
			when.method(POST).path(GRAPHQL_PATH);
			then.status(200).json_body(json!({
				"data": { "account": { "id": "a" } },
				"extensions": { "cost": { "throttleStatus": {
					"currentlyAvailable": 1000, "maximumAvailable": 10000, "restoreRate": 500
				} } }
			}));
		})
		.await;

	let executor = build_executor(&config);
	let err = executor
		.execute(&GraphQlRequest::new("{ account { id } }"))
		.await
		.expect_err("Low budget should trip the policy.");

	assert_eq!(err.kind(), ErrorKind::RateLimit);
	assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));

	let context = err.context();

	assert_eq!(context.get("wait_seconds"), Some(&json!(2.0)));
	assert_eq!(
		context.get("throttle_status"),
		Some(&json!({ "currentlyAvailable": 1000, "maximumAvailable": 10000, "restoreRate": 500 }))
	);
	assert_eq!(executor.throttle_status().map(|s| s.currently_available), Some(1000));
}

#[tokio::test]
async fn execute_surfaces_graphql_errors() {
	let server = MockServer::start_async().await;
	let config = mock_config(&server.base_url());

	server
		.mock_async(|when, then| {
			when.method(POST).path(GRAPHQL_PATH);
			then.status(200).json_body(json!({
				"data": null,
				"errors": [
					{ "message": "Field 'bogus' doesn't exist on type 'Client'" },
					{ "message": "second" }
				]
			}));
		})
		.await;

	let err = build_executor(&config)
		.execute(&GraphQlRequest::new("{ clients { bogus } }"))
		.await
		.expect_err("GraphQL errors should fail the call.");

	assert_eq!(err.kind(), ErrorKind::GraphQl);
	assert_eq!(
		err.to_string(),
		"GraphQL query failed: Field 'bogus' doesn't exist on type 'Client'"
	);

	let context = err.context();

	assert_eq!(context.get("errors").and_then(Value::as_array).map(Vec::len), Some(2));
	assert_eq!(context.get("query"), Some(&json!("{ clients { bogus } }")));
}

#[tokio::test]
async fn execute_requires_data_key() {
	let server = MockServer::start_async().await;
	let config = mock_config(&server.base_url());

	server
		.mock_async(|when, then| {
			when.method(POST).path(GRAPHQL_PATH);
			then.status(200).json_body(json!({ "extensions": {} }));
		})
		.await;

	let err = build_executor(&config)
		.execute(&GraphQlRequest::new("{ account { id } }"))
		.await
		.expect_err("Missing data should fail.");

	assert_eq!(err.kind(), ErrorKind::GraphQl);
	assert_eq!(err.to_string(), "Response missing 'data' field.");
}
