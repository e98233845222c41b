//! `ReqwestTransport` integration tests against a `wiremock` server

#[cfg(test)]
mod tests {
    use crate::common::fixtures::{BATCH_BOUNDARY, PartResponse, ResponseItem, batch_body};
    use odata_requestor::{
        ConfiguredModel, GroupLock, HttpMethod, HttpRequest, HttpTransport, ODataRequest,
        ReqwestTransport, Requestor, RequestorConfig, RequestorError,
    };
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> RequestorConfig {
        RequestorConfig::new(format!("{}/service/", server.uri()))
            .with_header("Accept-Language", "en")
    }

    fn connect(server: &MockServer) -> Requestor {
        let config = config(server);
        let model = Arc::new(ConfiguredModel::new(&config));
        Requestor::connect(config, model).unwrap()
    }

    #[tokio::test]
    async fn test_transport_reports_error_statuses_as_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/service/Missing"))
            .respond_with(
                ResponseTemplate::new(404)
                    .insert_header("Content-Type", "text/plain")
                    .set_body_string("not here"),
            )
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(&config(&server)).unwrap();
        let response = transport
            .send(HttpRequest {
                method: HttpMethod::Get,
                url: format!("{}/service/Missing", server.uri()),
                headers: Default::default(),
                body: None,
            })
            .await
            .unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.status_text, "Not Found");
        assert_eq!(response.header("content-type"), Some("text/plain"));
        assert_eq!(response.body.as_deref(), Some("not here"));
    }

    #[tokio::test]
    async fn test_transport_network_failure_is_error() {
        let config = RequestorConfig::new("http://127.0.0.1:9/service/");
        let transport = ReqwestTransport::new(&config).unwrap();

        let result = transport
            .send(HttpRequest {
                method: HttpMethod::Head,
                url: config.service_url.clone(),
                headers: Default::default(),
                body: None,
            })
            .await;

        assert!(matches!(result, Err(RequestorError::Network(_))));
    }

    #[tokio::test]
    async fn test_direct_request_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/service/Products('1')"))
            .and(header("OData-Version", "4.0"))
            .and(header("X-CSRF-Token", "Fetch"))
            .and(header("Accept-Language", "en"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("OData-Version", "4.0")
                    .insert_header("X-CSRF-Token", "server-token")
                    .insert_header("ETag", "W/\"1\"")
                    .set_body_json(json!({"ID": "1", "Name": "Pencil"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let requestor = connect(&server);
        let value = requestor
            .request(ODataRequest::get("Products('1')"), None)
            .unwrap()
            .await
            .unwrap();

        assert_eq!(value, json!({"ID": "1", "Name": "Pencil", "@odata.etag": "W/\"1\""}));
        assert_eq!(requestor.security_token(), "server-token");
    }

    #[tokio::test]
    async fn test_token_fetch_and_batch_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/service/"))
            .and(header("X-CSRF-Token", "Fetch"))
            .respond_with(ResponseTemplate::new(200).insert_header("X-CSRF-Token", "abc"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/service/$batch"))
            .and(header("X-CSRF-Token", "abc"))
            .and(body_string_contains("PATCH Products('1') HTTP/1.1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("OData-Version", "4.0")
                    .set_body_raw(
                        batch_body(&[
                            ResponseItem::Single(PartResponse::no_content()),
                            ResponseItem::Single(PartResponse::json(
                                200,
                                "OK",
                                json!({"value": [{"ID": "1"}]}),
                            )),
                        ]),
                        &format!("multipart/mixed; boundary={}", BATCH_BOUNDARY),
                    ),
            )
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/service/$batch"))
            .respond_with(ResponseTemplate::new(403).insert_header("X-CSRF-Token", "Required"))
            .with_priority(2)
            .mount(&server)
            .await;

        let requestor = connect(&server);
        let update = requestor
            .request(
                ODataRequest::patch("Products('1')")
                    .header("If-Match", "W/\"1\"")
                    .body(json!({"Name": "Pen"})),
                Some(&GroupLock::new("update")),
            )
            .unwrap();
        let read = requestor
            .request(ODataRequest::get("Products"), Some(&GroupLock::new("update")))
            .unwrap();

        requestor.submit_batch("update").await.unwrap();

        assert_eq!(update.await.unwrap(), json!({}));
        assert_eq!(read.await.unwrap(), json!({"value": [{"ID": "1"}]}));
        assert_eq!(requestor.security_token(), "abc");

        let received = server.received_requests().await.unwrap();
        let batches = received
            .iter()
            .filter(|request| request.url.path() == "/service/$batch")
            .count();
        assert_eq!(batches, 2);
    }

    #[tokio::test]
    async fn test_server_error_payload_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/service/Products('1')"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {"code": "LOCKED", "message": "Product is locked"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).insert_header("X-CSRF-Token", "abc"))
            .mount(&server)
            .await;

        let requestor = connect(&server);
        let error = requestor
            .request(ODataRequest::delete("Products('1')"), None)
            .unwrap()
            .await
            .unwrap_err();

        let communication = error.communication().unwrap();
        assert_eq!(communication.status, Some(409));
        assert_eq!(communication.message, "Product is locked");
        assert_eq!(communication.error.as_ref().unwrap()["code"], "LOCKED");
        assert_eq!(
            communication.request_url.as_deref(),
            Some(format!("{}/service/Products('1')", server.uri()).as_str())
        );
    }
}
