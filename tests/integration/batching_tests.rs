//! Batching integration tests
//!
//! Requests are queued per group, serialized by the multipart codec and settled from
//! a multipart response.

#[cfg(test)]
mod tests {
    use crate::common::fixtures::{
        PartResponse, ResponseItem, SERVICE_URL, batch_response, json_response,
    };
    use crate::common::{RecordingModel, ScriptedTransport};
    use odata_requestor::{
        GroupLock, HttpMethod, MultipartBatchCodec, ODataRequest, Requestor, RequestorConfig,
        RequestorError, SubmitMode,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn requestor(transport: Arc<ScriptedTransport>, model: Arc<RecordingModel>) -> Requestor {
        Requestor::new(
            RequestorConfig::new(SERVICE_URL).with_query_param("sap-client", "100"),
            transport,
            Arc::new(MultipartBatchCodec::new()),
            model,
        )
        .unwrap()
    }

    fn group(group_id: &str) -> GroupLock {
        GroupLock::new(group_id)
    }

    // ==================== Wire format ====================

    #[tokio::test]
    async fn test_batch_request_body() {
        let transport = ScriptedTransport::new(|_| {
            batch_response(&[
                ResponseItem::ChangeSet(vec![
                    PartResponse::json(201, "Created", json!({"ID": "1"})),
                    PartResponse::no_content(),
                ]),
                ResponseItem::Single(PartResponse::json(200, "OK", json!({"value": []}))),
            ])
        });
        let requestor = requestor(transport.clone(), RecordingModel::new());

        let read = requestor
            .request(ODataRequest::get("Products"), Some(&group("update")))
            .unwrap();
        let create = requestor
            .request(
                ODataRequest::post("Products").body(json!({"ID": "1", "@$ui5.transient": true})),
                Some(&group("update")),
            )
            .unwrap();
        let delete = requestor
            .request(
                ODataRequest::delete("Products('0')").header("If-Match", "*"),
                Some(&group("update")),
            )
            .unwrap();

        requestor.submit_batch("update").await.unwrap();

        // changes come before reads
        assert_eq!(create.await.unwrap(), json!({"ID": "1"}));
        assert_eq!(delete.await.unwrap(), json!({}));
        assert_eq!(read.await.unwrap(), json!({"value": []}));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let batch = &requests[0];
        assert_eq!(batch.url, format!("{}$batch?sap-client=100", SERVICE_URL));
        assert_eq!(batch.headers.get("MIME-Version"), Some("1.0"));
        let content_type = batch.headers.get("Content-Type").unwrap();
        assert!(content_type.starts_with("multipart/mixed; boundary=batch_"));

        let body = batch.body.as_deref().unwrap();
        let post = body.find("POST Products HTTP/1.1").unwrap();
        let delete = body.find("DELETE Products('0') HTTP/1.1").unwrap();
        let get = body.find("GET Products HTTP/1.1").unwrap();
        assert!(post < delete && delete < get);
        assert!(body.contains("Content-ID: 0.0"));
        assert!(body.contains("Content-ID: 1.0"));
        assert!(body.contains(r#"{"ID":"1"}"#));
        assert!(!body.contains("@$ui5"));
        assert!(body.contains("If-Match: *"));
    }

    #[tokio::test]
    async fn test_change_set_failure_spares_other_entries() {
        let transport = ScriptedTransport::new(|_| {
            batch_response(&[
                ResponseItem::ChangeSet(vec![PartResponse::json(
                    400,
                    "Bad Request",
                    json!({"error": {"code": "SY/530", "message": "Name is mandatory"}}),
                )]),
                ResponseItem::ChangeSet(vec![PartResponse::no_content()]),
                ResponseItem::Single(PartResponse::json(200, "OK", json!({"ID": "7"}))),
            ])
        });
        let requestor = requestor(transport, RecordingModel::new());

        let first = requestor
            .request(
                ODataRequest::post("Products").body(json!({"Name": ""})),
                Some(&group("update")),
            )
            .unwrap();
        let second = requestor
            .request(
                ODataRequest::patch("Products('1')").body(json!({"Price": "2"})),
                Some(&group("update")),
            )
            .unwrap();
        requestor.add_change_set("update");
        let third = requestor
            .request(ODataRequest::delete("Products('2')"), Some(&group("update")))
            .unwrap();
        let read = requestor
            .request(ODataRequest::get("Products('7')"), Some(&group("update")))
            .unwrap();

        requestor.submit_batch("update").await.unwrap();

        let error = first.await.unwrap_err();
        assert_eq!(error.status(), Some(400));
        assert_eq!(error.to_string(), "Name is mandatory");
        assert!(!error.is_canceled());

        let chained = second.await.unwrap_err();
        assert!(matches!(chained, RequestorError::PreviousRequestFailed { .. }));
        assert_eq!(chained.cause().unwrap().to_string(), "Name is mandatory");

        assert_eq!(third.await.unwrap(), json!({}));
        assert_eq!(read.await.unwrap(), json!({"ID": "7"}));
    }

    #[tokio::test]
    async fn test_merged_patch_sends_one_part() {
        let transport = ScriptedTransport::new(|_| {
            batch_response(&[ResponseItem::Single(
                PartResponse::json(200, "OK", json!({"Name": "A", "Price": "3"}))
                    .header("ETag", "W/\"2\""),
            )])
        });
        let requestor = requestor(transport.clone(), RecordingModel::new());

        let handles: Vec<_> = [json!({"Name": "A"}), json!({"Price": "3"})]
            .into_iter()
            .map(|body| {
                requestor
                    .request(
                        ODataRequest::patch("Products('1')")
                            .header("If-Match", "W/\"1\"")
                            .body(body),
                        Some(&group("update")),
                    )
                    .unwrap()
            })
            .collect();

        requestor.submit_batch("update").await.unwrap();

        let expected = json!({"Name": "A", "Price": "3", "@odata.etag": "W/\"2\""});
        for handle in handles {
            assert_eq!(handle.await.unwrap(), expected);
        }
        let body = transport.requests()[0].body.clone().unwrap();
        assert_eq!(body.matches("PATCH Products('1')").count(), 1);
        assert!(body.contains(r#"{"Name":"A","Price":"3"}"#));
    }

    #[tokio::test]
    async fn test_malformed_batch_response_fails_every_request() {
        let transport = ScriptedTransport::new(|_| {
            json_response(200, json!({})).with_header("Content-Type", "multipart/mixed")
        });
        let requestor = requestor(transport, RecordingModel::new());

        let read = requestor
            .request(ODataRequest::get("Products"), Some(&group("update")))
            .unwrap();

        let error = requestor.submit_batch("update").await.unwrap_err();
        assert!(matches!(error, RequestorError::BatchFormat(_)));
        let error = read.await.unwrap_err();
        assert!(matches!(error, RequestorError::BatchFailed { .. }));
        assert!(matches!(error.cause(), Some(RequestorError::BatchFormat(_))));
    }

    // ==================== Groups ====================

    #[tokio::test]
    async fn test_groups_are_independent() {
        let transport = ScriptedTransport::new(|_| {
            batch_response(&[ResponseItem::Single(PartResponse::json(
                200,
                "OK",
                json!({"value": []}),
            ))])
        });
        let model = RecordingModel::new();
        let requestor = requestor(transport.clone(), model.clone());

        let _first = requestor
            .request(ODataRequest::get("A"), Some(&group("one")))
            .unwrap();
        let second = requestor
            .request(ODataRequest::get("B"), Some(&group("two")))
            .unwrap();

        requestor.submit_batch("two").await.unwrap();
        assert_eq!(second.await.unwrap(), json!({"value": []}));
        assert!(transport.requests()[0].body.as_deref().unwrap().contains("GET B"));
        assert!(!transport.requests()[0].body.as_deref().unwrap().contains("GET A"));

        assert_eq!(
            *model.created_groups.lock(),
            vec!["one".to_string(), "two".to_string()]
        );
    }

    #[tokio::test]
    async fn test_configured_direct_group_sends_immediately() {
        let transport = ScriptedTransport::new(|_| json_response(200, json!({"ID": "1"})));
        let model = RecordingModel::with_modes(&[("immediate", SubmitMode::Direct)]);
        let requestor = requestor(transport.clone(), model.clone());

        let value = requestor
            .request(ODataRequest::get("Products('1')"), Some(&group("immediate")))
            .unwrap()
            .await
            .unwrap();

        assert_eq!(value, json!({"ID": "1"}));
        let requests = transport.requests();
        assert_eq!(requests[0].method, HttpMethod::Get);
        assert_eq!(requests[0].url, format!("{}Products('1')", SERVICE_URL));
        assert!(model.created_groups.lock().is_empty());
    }

    #[tokio::test]
    async fn test_relocated_changes_travel_with_target_group() {
        let transport = ScriptedTransport::new(|_| {
            batch_response(&[ResponseItem::Single(PartResponse::json(
                201,
                "Created",
                json!({"ID": "9"}),
            ))])
        });
        let requestor = requestor(transport.clone(), RecordingModel::new());
        let body = Arc::new(json!({"ID": "9"}));

        let create = requestor
            .request(
                ODataRequest::post("Products").body(body.clone()),
                Some(&group("$parked.update")),
            )
            .unwrap();
        assert!(requestor.has_pending_changes(Some("$parked.update"), None));

        requestor.relocate("$parked.update", &body, "update").unwrap();
        assert!(!requestor.has_pending_changes(Some("$parked.update"), None));
        assert!(requestor.has_pending_changes(Some("update"), None));

        requestor.submit_batch("update").await.unwrap();
        assert_eq!(create.await.unwrap(), json!({"ID": "9"}));
        assert!(!requestor.has_pending_changes(None, None));
    }

    #[tokio::test]
    async fn test_messages_from_batch_parts_are_reported() {
        let transport = ScriptedTransport::new(|_| {
            batch_response(&[ResponseItem::Single(
                PartResponse::json(200, "OK", json!({"ID": "1"})).header(
                    "sap-messages",
                    r#"[{"code":"W1","message":"Stock low","target":"Stock","numericSeverity":3}]"#,
                ),
            )])
        });
        let model = RecordingModel::new();
        let requestor = requestor(transport, model.clone());

        let read = requestor
            .request(ODataRequest::get("Products('1')"), Some(&group("update")))
            .unwrap();
        requestor.submit_batch("update").await.unwrap();
        read.await.unwrap();

        let bound = model.bound_messages.lock();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].0, "Products('1')");
        assert_eq!(bound[0].1["target"], "Stock");
        assert!(model.unbound_messages.lock().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_is_delegated_to_model() {
        let transport = ScriptedTransport::new(|_| json_response(200, json!({})));
        let requestor = requestor(transport, RecordingModel::new());

        let metadata = requestor.fetch_metadata("/Products/Name").await.unwrap();

        assert_eq!(metadata, json!({"$path": "/Products/Name"}));
    }
}
